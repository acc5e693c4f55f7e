//! Index store: one fixed 8-byte slot per message ever written.

use super::base::Base;
use crate::error::{JamError, Result};
use crate::format::index::IndexRecord;
use crate::format::INDEX_RECORD_SIZE;

/// A live index slot resolved to its external message number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Slot position, `1..=count`.
    pub slot: u32,
    /// External message number (`slot + base_msg_num - 1`).
    pub number: u32,
    /// JAM hash of the recipient name.
    pub to_crc: u32,
    /// Offset of the message header inside `.jhr`.
    pub hdr_offset: u32,
}

impl Base {
    /// Number of slots in the index, deleted ones included.
    ///
    /// Derived from the index length, not from the fixed header's
    /// `active_msgs`, which is only advisory.
    pub fn message_count(&self) -> Result<u32> {
        let len = self.files_ref()?.index.len()?;
        Ok(u32::try_from(len / INDEX_RECORD_SIZE as u64).unwrap_or(u32::MAX))
    }

    /// Range of valid slot numbers, `1..=count`; empty for an empty base.
    pub fn message_numbers(&self) -> Result<std::ops::RangeInclusive<u32>> {
        Ok(1..=self.message_count()?)
    }

    /// External number of `slot`.
    pub fn external_number(&self, slot: u32) -> u32 {
        slot.wrapping_add(self.fixed.base_msg_num).wrapping_sub(1)
    }

    /// Slot holding external number `number`, if it lies within the base.
    pub fn slot_for_number(&self, number: u32) -> Result<Option<u32>> {
        let base = self.fixed.base_msg_num;
        if number < base {
            return Ok(None);
        }
        let slot = number - base + 1;
        Ok((slot <= self.message_count()?).then_some(slot))
    }

    /// Raw slot contents, tombstones included.
    pub fn read_index_slot(&mut self, n: u32) -> Result<IndexRecord> {
        let count = self.message_count()?;
        if n == 0 || n > count {
            return Err(JamError::InvalidMessage(n));
        }
        let mut buf = [0u8; INDEX_RECORD_SIZE];
        self.files()?
            .index
            .read_at(slot_offset(n), &mut buf)?;
        Ok(IndexRecord::decode(&buf))
    }

    /// Resolve slot `n`.
    ///
    /// Out of range is `InvalidMessage`; a tombstoned slot is `NotFound`.
    pub fn read_index_record(&mut self, n: u32) -> Result<IndexEntry> {
        match self.read_index_slot(n)? {
            IndexRecord::Active { to_crc, hdr_offset } => Ok(IndexEntry {
                slot: n,
                number: self.external_number(n),
                to_crc,
                hdr_offset,
            }),
            IndexRecord::Deleted => Err(JamError::NotFound(format!("message {n} is deleted"))),
        }
    }

    /// Overwrite slot `n`. `n = count + 1` appends a new slot.
    pub fn write_index_record(&mut self, n: u32, record: IndexRecord) -> Result<()> {
        self.with_lock(|base| {
            let count = base.message_count()?;
            if n == 0 || n > count.saturating_add(1) {
                return Err(JamError::InvalidMessage(n));
            }
            base.files()?
                .index
                .write_at(slot_offset(n), &record.encode())
        })
    }
}

fn slot_offset(n: u32) -> u64 {
    u64::from(n - 1) * INDEX_RECORD_SIZE as u64
}
