//! `.jdx` index records.

use byteorder::{ByteOrder, LittleEndian};

use super::INDEX_RECORD_SIZE;

/// Value of both fields of a deleted slot.
pub const TOMBSTONE: u32 = 0xFFFF_FFFF;

/// One slot of the index. The slot position is the message's place in the base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexRecord {
    /// A live slot pointing at a header record.
    Active {
        /// JAM hash of the lower-cased recipient name.
        to_crc: u32,
        /// Byte offset of the message header inside `.jhr`.
        hdr_offset: u32,
    },
    /// A slot logically removed without shrinking the file.
    Deleted,
}

impl IndexRecord {
    pub fn encode(&self) -> [u8; INDEX_RECORD_SIZE] {
        let (to_crc, hdr_offset) = match *self {
            Self::Active { to_crc, hdr_offset } => (to_crc, hdr_offset),
            Self::Deleted => (TOMBSTONE, TOMBSTONE),
        };
        let mut buf = [0u8; INDEX_RECORD_SIZE];
        LittleEndian::write_u32(&mut buf[..4], to_crc);
        LittleEndian::write_u32(&mut buf[4..], hdr_offset);
        buf
    }

    pub fn decode(buf: &[u8; INDEX_RECORD_SIZE]) -> Self {
        let to_crc = LittleEndian::read_u32(&buf[..4]);
        let hdr_offset = LittleEndian::read_u32(&buf[4..]);
        if to_crc == TOMBSTONE && hdr_offset == TOMBSTONE {
            Self::Deleted
        } else {
            Self::Active { to_crc, hdr_offset }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tombstone_bytes() {
        assert_eq!(IndexRecord::Deleted.encode(), [0xFF; 8]);
        assert_eq!(IndexRecord::decode(&[0xFF; 8]), IndexRecord::Deleted);
    }

    #[test]
    fn test_half_sentinel_is_active() {
        // Only both fields at all-ones mark a tombstone.
        let rec = IndexRecord::Active {
            to_crc: TOMBSTONE,
            hdr_offset: 1024,
        };
        assert_eq!(IndexRecord::decode(&rec.encode()), rec);
    }
}
