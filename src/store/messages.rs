//! Message assembly: posting, reading and soft-deleting whole messages.
//!
//! A post touches the files in this order: text, header, index slot,
//! fixed header. An interrupted post therefore leaves either an orphan
//! header nobody indexes, or a readable message with a stale
//! `active_msgs`. Neither is treated as corruption.

use tracing::{debug, warn};

use super::base::Base;
use super::file::offset_u32;
use super::text::from_stored;
use crate::error::{JamError, Result};
use crate::format::index::IndexRecord;
use crate::format::message_header::{
    decode_subfields, HeaderFixed, MessageHeader, SubfieldKind,
};
use crate::format::{attr, MESSAGE_HEADER_SIZE};
use crate::hash::jam_crc;
use crate::model::message::Message;

impl Base {
    /// Post `msg` and return the slot it was stored in.
    ///
    /// The whole sequence runs under the base lock.
    pub fn write_message(&mut self, msg: &Message) -> Result<u32> {
        self.with_lock(|base| base.write_message_locked(msg))
    }

    fn write_message_locked(&mut self, msg: &Message) -> Result<u32> {
        let fixed_hdr = self.reload_fixed_header()?;
        let subfields = msg.subfields();

        let hash_of = |kind: SubfieldKind| {
            subfields
                .iter()
                .find(|s| s.kind == kind)
                .map(|s| jam_crc(&s.as_text()))
                .unwrap_or(crate::hash::EMPTY_HASH)
        };
        let msgid_crc = hash_of(SubfieldKind::MsgId);
        let reply_crc = hash_of(SubfieldKind::ReplyId);

        let (offset, txt_len) = self.write_stored_text(&msg.stored_text())?;

        let count = self.message_count()?;
        let slot = count + 1;
        let now = u32::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);

        let header = MessageHeader::new(
            HeaderFixed {
                revision: crate::format::REVISION,
                msgid_crc,
                reply_crc,
                date_written: u32::try_from(msg.date.timestamp()).unwrap_or(0),
                date_processed: now,
                message_number: slot.wrapping_add(fixed_hdr.base_msg_num).wrapping_sub(1),
                attribute: msg.attributes & !attr::DELETED,
                offset,
                txt_len,
                ..HeaderFixed::default()
            },
            subfields,
        );

        let files = self.files()?;
        let hdr_offset = files.header.append(&header.encode())?;
        let hdr_offset = offset_u32(hdr_offset, files.header.path())?;

        files.index.write_at(
            u64::from(count) * crate::format::INDEX_RECORD_SIZE as u64,
            &IndexRecord::Active {
                to_crc: jam_crc(&msg.to),
                hdr_offset,
            }
            .encode(),
        )?;

        self.fixed.active_msgs = self.fixed.active_msgs.wrapping_add(1);
        self.fixed.mod_counter = self.fixed.mod_counter.wrapping_add(1);
        self.flush_fixed_header()?;

        debug!(
            slot,
            number = header.fixed.message_number,
            hdr_offset,
            "Posted message"
        );
        Ok(slot)
    }

    /// Fixed section of message `n`'s header, without its subfields.
    pub fn read_fixed_message_header(&mut self, n: u32) -> Result<HeaderFixed> {
        let entry = self.read_index_record(n)?;
        self.read_fixed_at(entry.hdr_offset)
    }

    fn read_fixed_at(&mut self, hdr_offset: u32) -> Result<HeaderFixed> {
        let file = &mut self.files()?.header;
        let mut buf = [0u8; MESSAGE_HEADER_SIZE];
        file.read_at(u64::from(hdr_offset), &mut buf)?;
        HeaderFixed::decode(&buf).map_err(|reason| {
            JamError::invalid(file.path(), format!("header at {hdr_offset}: {reason}"))
        })
    }

    /// Full header of message `n`: fixed section plus subfields.
    pub fn read_message_header(&mut self, n: u32) -> Result<MessageHeader> {
        let entry = self.read_index_record(n)?;
        let fixed = self.read_fixed_at(entry.hdr_offset)?;

        let file = &mut self.files()?.header;
        let start = u64::from(entry.hdr_offset) + MESSAGE_HEADER_SIZE as u64;
        if start + u64::from(fixed.subfield_len) > file.len()? {
            return Err(JamError::invalid(
                file.path(),
                format!(
                    "header at {}: {} subfield bytes run past the end of the file",
                    entry.hdr_offset, fixed.subfield_len
                ),
            ));
        }
        let mut buf = vec![0u8; fixed.subfield_len as usize];
        file.read_at(start, &mut buf)?;
        let subfields = decode_subfields(&buf).map_err(|reason| {
            JamError::invalid(
                file.path(),
                format!("header at {}: {reason}", entry.hdr_offset),
            )
        })?;
        Ok(MessageHeader { fixed, subfields })
    }

    /// Read and assemble message `n`.
    pub fn read_message(&mut self, n: u32) -> Result<Message> {
        let header = self.read_message_header(n)?;
        let raw_text = self.read_stored_text(&header.fixed)?;
        let mut msg = Message::from_header(header, from_stored(&raw_text));
        msg.raw_text = raw_text;
        // The stored number may predate a base renumbering.
        msg.number = self.external_number(n);
        Ok(msg)
    }

    /// Soft-delete message `n`.
    ///
    /// Sets the deleted attribute and zeroes the text length in place. The
    /// text bytes stay in `.jdt` and the index slot stays live, so callers
    /// must check [`Message::is_deleted`] themselves. Deleting an already
    /// deleted message changes nothing.
    pub fn delete_message(&mut self, n: u32) -> Result<()> {
        self.with_lock(|base| {
            let entry = base.read_index_record(n)?;
            let mut fixed = base.read_fixed_at(entry.hdr_offset)?;
            if fixed.is_deleted() {
                debug!(slot = n, "Message already deleted");
                return Ok(());
            }
            fixed.attribute |= attr::DELETED;
            fixed.txt_len = 0;
            base.files()?
                .header
                .write_at(u64::from(entry.hdr_offset), &fixed.encode())?;

            let fixed_hdr = base.reload_fixed_header()?;
            if fixed_hdr.active_msgs == 0 {
                warn!(slot = n, "Active message count already zero");
            }
            base.fixed.active_msgs = fixed_hdr.active_msgs.saturating_sub(1);
            base.fixed.mod_counter = fixed_hdr.mod_counter.wrapping_add(1);
            base.flush_fixed_header()?;
            debug!(slot = n, "Deleted message");
            Ok(())
        })
    }

    /// Bump the read counter of message `n` and return the new value.
    pub fn increment_times_read(&mut self, n: u32) -> Result<u32> {
        self.with_lock(|base| {
            let entry = base.read_index_record(n)?;
            let mut fixed = base.read_fixed_at(entry.hdr_offset)?;
            fixed.times_read = fixed.times_read.saturating_add(1);
            base.files()?
                .header
                .write_at(u64::from(entry.hdr_offset), &fixed.encode())?;
            Ok(fixed.times_read)
        })
    }
}
