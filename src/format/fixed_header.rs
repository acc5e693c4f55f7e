//! The base-level fixed header at the start of the `.jhr` file.

use byteorder::{ByteOrder, LittleEndian};

use super::{FIXED_HEADER_SIZE, MAGIC};

/// Base-level counters shared by every message in the base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct FixedHeader {
    /// Creation time (Unix seconds).
    pub date_created: u32,
    /// Bumped on every mutation so other readers can detect changes.
    pub mod_counter: u32,
    /// Advisory count of non-deleted messages. May lag behind the index.
    pub active_msgs: u32,
    /// JAM hash of the base password, 0 when none is set.
    pub password_crc: u32,
    /// External number of slot 1.
    pub base_msg_num: u32,
}

impl FixedHeader {
    /// Header for a freshly created base.
    pub fn new(date_created: u32) -> Self {
        Self {
            date_created,
            mod_counter: 0,
            active_msgs: 0,
            password_crc: 0,
            base_msg_num: 1,
        }
    }

    /// Serialize to the full on-disk block, reserved area zeroed.
    pub fn encode(&self) -> [u8; FIXED_HEADER_SIZE] {
        let mut buf = [0u8; FIXED_HEADER_SIZE];
        buf[..4].copy_from_slice(MAGIC);
        LittleEndian::write_u32(&mut buf[4..8], self.date_created);
        LittleEndian::write_u32(&mut buf[8..12], self.mod_counter);
        LittleEndian::write_u32(&mut buf[12..16], self.active_msgs);
        LittleEndian::write_u32(&mut buf[16..20], self.password_crc);
        LittleEndian::write_u32(&mut buf[20..24], self.base_msg_num);
        buf
    }

    /// Parse and validate the signature.
    pub fn decode(buf: &[u8]) -> std::result::Result<Self, String> {
        if buf.len() < FIXED_HEADER_SIZE {
            return Err(format!(
                "Fixed header too short: expected {FIXED_HEADER_SIZE} bytes, found {}",
                buf.len()
            ));
        }
        if &buf[..4] != MAGIC {
            return Err("Invalid magic bytes in fixed header".into());
        }
        Ok(Self {
            date_created: LittleEndian::read_u32(&buf[4..8]),
            mod_counter: LittleEndian::read_u32(&buf[8..12]),
            active_msgs: LittleEndian::read_u32(&buf[12..16]),
            password_crc: LittleEndian::read_u32(&buf[16..20]),
            base_msg_num: LittleEndian::read_u32(&buf[20..24]),
        })
    }
}
