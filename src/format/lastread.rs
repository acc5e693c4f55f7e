//! `.jlr` lastread records.

use byteorder::{ByteOrder, LittleEndian};

use super::LASTREAD_RECORD_SIZE;

/// A user's reading position within one base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct LastReadRecord {
    /// JAM hash of the user name.
    pub user_crc: u32,
    /// Kept equal to `user_crc`.
    pub user_id: u32,
    /// External number of the last message the user read.
    pub last_read: u32,
    /// Highest external number the user has ever read.
    pub high_read: u32,
}

impl LastReadRecord {
    pub fn new(user_crc: u32, last_read: u32, high_read: u32) -> Self {
        Self {
            user_crc,
            user_id: user_crc,
            last_read,
            high_read,
        }
    }

    pub fn encode(&self) -> [u8; LASTREAD_RECORD_SIZE] {
        let mut buf = [0u8; LASTREAD_RECORD_SIZE];
        LittleEndian::write_u32(&mut buf[..4], self.user_crc);
        LittleEndian::write_u32(&mut buf[4..8], self.user_id);
        LittleEndian::write_u32(&mut buf[8..12], self.last_read);
        LittleEndian::write_u32(&mut buf[12..16], self.high_read);
        buf
    }

    pub fn decode(buf: &[u8; LASTREAD_RECORD_SIZE]) -> Self {
        Self {
            user_crc: LittleEndian::read_u32(&buf[..4]),
            user_id: LittleEndian::read_u32(&buf[4..8]),
            last_read: LittleEndian::read_u32(&buf[8..12]),
            high_read: LittleEndian::read_u32(&buf[12..16]),
        }
    }
}
