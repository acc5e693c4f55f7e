//! LastRead store: per-user reading positions, keyed by the hash of the
//! user name and found by linear scan.
//!
//! Two names with the same hash share one record.

use tracing::debug;

use super::base::Base;
use crate::error::{JamError, Result};
use crate::format::lastread::LastReadRecord;
use crate::format::LASTREAD_RECORD_SIZE;
use crate::hash::jam_crc;

impl Base {
    /// Locate the record for `user_crc`, returning its byte offset.
    fn find_last_read(&mut self, user_crc: u32) -> Result<Option<(u64, LastReadRecord)>> {
        let data = self.files()?.lastread.read_all()?;
        let found = data
            .chunks_exact(LASTREAD_RECORD_SIZE)
            .enumerate()
            .find_map(|(i, chunk)| {
                let mut buf = [0u8; LASTREAD_RECORD_SIZE];
                buf.copy_from_slice(chunk);
                let rec = LastReadRecord::decode(&buf);
                (rec.user_crc == user_crc).then(|| ((i * LASTREAD_RECORD_SIZE) as u64, rec))
            });
        Ok(found)
    }

    /// Stored position for `user`, or `NotFound`.
    pub fn get_last_read(&mut self, user: &str) -> Result<LastReadRecord> {
        self.find_last_read(jam_crc(user))?
            .map(|(_, rec)| rec)
            .ok_or_else(|| JamError::NotFound(format!("no lastread record for '{user}'")))
    }

    /// Store a position for `user`, rewriting the existing record in place
    /// or appending a new one.
    ///
    /// The high-read mark never moves backwards: an existing record keeps
    /// the larger of its current and the requested value.
    pub fn set_last_read(
        &mut self,
        user: &str,
        last_read: u32,
        high_read: u32,
    ) -> Result<LastReadRecord> {
        let user_crc = jam_crc(user);
        self.with_lock(|base| {
            match base.find_last_read(user_crc)? {
                Some((offset, existing)) => {
                    let rec =
                        LastReadRecord::new(user_crc, last_read, high_read.max(existing.high_read));
                    base.files()?.lastread.write_at(offset, &rec.encode())?;
                    debug!(user, last_read, high_read = rec.high_read, "Updated lastread");
                    Ok(rec)
                }
                None => {
                    let rec = LastReadRecord::new(user_crc, last_read, high_read);
                    let file = &mut base.files()?.lastread;
                    // A torn tail from an interrupted append is overwritten.
                    let len = file.len()?;
                    let aligned = len - len % LASTREAD_RECORD_SIZE as u64;
                    file.write_at(aligned, &rec.encode())?;
                    debug!(user, last_read, high_read, "Created lastread");
                    Ok(rec)
                }
            }
        })
    }

    /// Next message `user` has not read, as an external number.
    ///
    /// Without a record everything is unread, so the first message is next.
    pub fn next_unread(&mut self, user: &str) -> Result<u32> {
        let count = self.message_count()?;
        let first = self.fixed.base_msg_num;
        let last = self.external_number(count);

        match self.find_last_read(jam_crc(user))? {
            None if count > 0 => Ok(first),
            None => Err(JamError::NotFound("base is empty".into())),
            Some((_, rec)) => {
                let next = rec.last_read.saturating_add(1).max(first);
                if count > 0 && next <= last {
                    Ok(next)
                } else {
                    Err(JamError::NotFound(format!("'{user}' has no unread messages")))
                }
            }
        }
    }

    /// Record that `user` read message `number`.
    pub fn mark_read(&mut self, user: &str, number: u32) -> Result<LastReadRecord> {
        // set_last_read keeps the larger high-read mark.
        self.set_last_read(user, number, number)
    }

    /// Messages after `user`'s last-read position, floored at zero.
    pub fn unread_count(&mut self, user: &str) -> Result<u32> {
        let count = self.message_count()?;
        let last_read = match self.find_last_read(jam_crc(user))? {
            Some((_, rec)) => rec.last_read,
            None => self.fixed.base_msg_num.saturating_sub(1),
        };
        let highest = if count == 0 {
            self.fixed.base_msg_num.saturating_sub(1)
        } else {
            self.external_number(count)
        };
        Ok(highest.saturating_sub(last_read))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> (tempfile::TempDir, Base) {
        let tmp = tempfile::tempdir().unwrap();
        let base = Base::open(tmp.path().join("lr")).unwrap();
        (tmp, base)
    }

    #[test]
    fn test_unknown_user_not_found() {
        let (_tmp, mut base) = open();
        assert!(matches!(
            base.get_last_read("nobody"),
            Err(JamError::NotFound(_))
        ));
    }

    #[test]
    fn test_set_then_get() {
        let (_tmp, mut base) = open();
        base.set_last_read("Alice", 3, 5).unwrap();
        base.set_last_read("Bob", 1, 1).unwrap();

        let alice = base.get_last_read("alice").unwrap();
        assert_eq!((alice.last_read, alice.high_read), (3, 5));
        assert_eq!(alice.user_crc, alice.user_id);

        // Rewritten in place, not appended.
        base.set_last_read("ALICE", 4, 6).unwrap();
        let len = std::fs::metadata(&base.paths().lastread).unwrap().len();
        assert_eq!(len, 2 * LASTREAD_RECORD_SIZE as u64);
        let alice = base.get_last_read("Alice").unwrap();
        assert_eq!((alice.last_read, alice.high_read), (4, 6));
    }

    #[test]
    fn test_mark_read_keeps_high_water() {
        let (_tmp, mut base) = open();
        base.mark_read("carol", 10).unwrap();
        base.mark_read("carol", 4).unwrap();
        let rec = base.get_last_read("carol").unwrap();
        assert_eq!(rec.last_read, 4);
        assert_eq!(rec.high_read, 10);
    }

    #[test]
    fn test_next_unread_on_empty_base() {
        let (_tmp, mut base) = open();
        assert!(matches!(base.next_unread("dave"), Err(JamError::NotFound(_))));
        assert_eq!(base.unread_count("dave").unwrap(), 0);
    }

    #[test]
    fn test_unread_count_never_negative() {
        let (_tmp, mut base) = open();
        // Last-read beyond the end, as after an external pack.
        base.set_last_read("erin", 50, 50).unwrap();
        assert_eq!(base.unread_count("erin").unwrap(), 0);
        assert!(matches!(base.next_unread("erin"), Err(JamError::NotFound(_))));
    }

    #[test]
    fn test_torn_tail_is_overwritten() {
        let (_tmp, mut base) = open();
        base.set_last_read("frank", 1, 1).unwrap();
        let path = base.paths().lastread.clone();
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.extend_from_slice(&[0xAA; 5]);
        std::fs::write(&path, bytes).unwrap();

        base.set_last_read("grace", 2, 2).unwrap();
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            2 * LASTREAD_RECORD_SIZE as u64
        );
        assert_eq!(base.get_last_read("grace").unwrap().last_read, 2);
    }
}
