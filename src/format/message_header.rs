//! Message headers: a 76-byte fixed section followed by typed subfields.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ signature "JAM\0" │ revision u16 │ rsvd u16  │
//! │ subfield_len │ times_read │ msgid_crc        │
//! │ reply_crc │ reply_to │ reply_1st │ reply_next│
//! │ date_written │ date_received │ date_processed│
//! │ message_number │ attribute │ attribute2      │
//! │ offset │ txt_len │ password_crc │ cost       │
//! ├──────────────────────────────────────────────┤
//! │ lo_id u16 │ hi_id u16 │ len u32 │ data[len]  │ × n
//! └──────────────────────────────────────────────┘
//! ```
//!
//! `subfield_len` covers the 8-byte subfield headers as well as the data.

use std::io::{Cursor, Read};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

use super::{attr, MAGIC, MESSAGE_HEADER_SIZE, REVISION, SUBFIELD_HEADER_SIZE};

/// Category of a subfield (its `lo_id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubfieldKind {
    OriginAddress,
    DestinationAddress,
    SenderName,
    ReceiverName,
    MsgId,
    ReplyId,
    Subject,
    Pid,
    Trace,
    EnclosedFile,
    EnclosedFileAlias,
    FileRequest,
    EnclosedFileWildcard,
    IndirectFile,
    EmbeddedBinary,
    Kludge,
    SeenBy,
    Path,
    Flags,
    TzUtc,
    Unknown,
    /// Any id this crate does not name. Preserved as-is.
    Other(u16),
}

impl SubfieldKind {
    pub fn from_id(id: u16) -> Self {
        match id {
            0 => Self::OriginAddress,
            1 => Self::DestinationAddress,
            2 => Self::SenderName,
            3 => Self::ReceiverName,
            4 => Self::MsgId,
            5 => Self::ReplyId,
            6 => Self::Subject,
            7 => Self::Pid,
            8 => Self::Trace,
            9 => Self::EnclosedFile,
            10 => Self::EnclosedFileAlias,
            11 => Self::FileRequest,
            12 => Self::EnclosedFileWildcard,
            13 => Self::IndirectFile,
            1000 => Self::EmbeddedBinary,
            2000 => Self::Kludge,
            2001 => Self::SeenBy,
            2002 => Self::Path,
            2003 => Self::Flags,
            2004 => Self::TzUtc,
            0xFFFF => Self::Unknown,
            other => Self::Other(other),
        }
    }

    pub fn id(self) -> u16 {
        match self {
            Self::OriginAddress => 0,
            Self::DestinationAddress => 1,
            Self::SenderName => 2,
            Self::ReceiverName => 3,
            Self::MsgId => 4,
            Self::ReplyId => 5,
            Self::Subject => 6,
            Self::Pid => 7,
            Self::Trace => 8,
            Self::EnclosedFile => 9,
            Self::EnclosedFileAlias => 10,
            Self::FileRequest => 11,
            Self::EnclosedFileWildcard => 12,
            Self::IndirectFile => 13,
            Self::EmbeddedBinary => 1000,
            Self::Kludge => 2000,
            Self::SeenBy => 2001,
            Self::Path => 2002,
            Self::Flags => 2003,
            Self::TzUtc => 2004,
            Self::Unknown => 0xFFFF,
            Self::Other(id) => id,
        }
    }
}

/// A typed, variable-length metadata record attached to a message header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subfield {
    pub kind: SubfieldKind,
    /// The `hi_id` type extension; 0 for every standard subfield.
    pub ext_id: u16,
    pub data: Vec<u8>,
}

impl Subfield {
    pub fn new(kind: SubfieldKind, data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            ext_id: 0,
            data: data.into(),
        }
    }

    /// Convenience constructor for text subfields.
    pub fn text(kind: SubfieldKind, value: &str) -> Self {
        Self::new(kind, value.as_bytes())
    }

    /// Payload decoded as text (lossy for non-UTF-8 bytes).
    pub fn as_text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Bytes this subfield occupies on disk.
    pub fn encoded_len(&self) -> usize {
        SUBFIELD_HEADER_SIZE + self.data.len()
    }
}

/// The fixed section of a message header. This is the only part ever
/// rewritten in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct HeaderFixed {
    pub revision: u16,
    pub reserved: u16,
    /// Total encoded size of the subfields that follow.
    pub subfield_len: u32,
    pub times_read: u32,
    pub msgid_crc: u32,
    pub reply_crc: u32,
    /// Message number this message replies to.
    pub reply_to: u32,
    /// First reply to this message.
    pub reply_1st: u32,
    /// Next reply in the thread.
    pub reply_next: u32,
    pub date_written: u32,
    pub date_received: u32,
    pub date_processed: u32,
    /// External message number.
    pub message_number: u32,
    pub attribute: u32,
    pub attribute2: u32,
    /// Offset of the text inside `.jdt`.
    pub offset: u32,
    /// Length of the stored text in bytes.
    pub txt_len: u32,
    pub password_crc: u32,
    pub cost: u32,
}

impl HeaderFixed {
    pub fn is_deleted(&self) -> bool {
        self.attribute & attr::DELETED != 0
    }

    pub fn encode(&self) -> [u8; MESSAGE_HEADER_SIZE] {
        let mut buf = [0u8; MESSAGE_HEADER_SIZE];
        buf[..4].copy_from_slice(MAGIC);
        LittleEndian::write_u16(&mut buf[4..6], self.revision);
        LittleEndian::write_u16(&mut buf[6..8], self.reserved);
        let words = [
            self.subfield_len,
            self.times_read,
            self.msgid_crc,
            self.reply_crc,
            self.reply_to,
            self.reply_1st,
            self.reply_next,
            self.date_written,
            self.date_received,
            self.date_processed,
            self.message_number,
            self.attribute,
            self.attribute2,
            self.offset,
            self.txt_len,
            self.password_crc,
            self.cost,
        ];
        for (i, word) in words.iter().enumerate() {
            let at = 8 + i * 4;
            LittleEndian::write_u32(&mut buf[at..at + 4], *word);
        }
        buf
    }

    pub fn decode(buf: &[u8]) -> std::result::Result<Self, String> {
        if buf.len() < MESSAGE_HEADER_SIZE {
            return Err(format!(
                "Message header too short: expected {MESSAGE_HEADER_SIZE} bytes, found {}",
                buf.len()
            ));
        }
        if &buf[..4] != MAGIC {
            return Err("Invalid magic bytes in message header".into());
        }
        let word = |i: usize| LittleEndian::read_u32(&buf[8 + i * 4..12 + i * 4]);
        Ok(Self {
            revision: LittleEndian::read_u16(&buf[4..6]),
            reserved: LittleEndian::read_u16(&buf[6..8]),
            subfield_len: word(0),
            times_read: word(1),
            msgid_crc: word(2),
            reply_crc: word(3),
            reply_to: word(4),
            reply_1st: word(5),
            reply_next: word(6),
            date_written: word(7),
            date_received: word(8),
            date_processed: word(9),
            message_number: word(10),
            attribute: word(11),
            attribute2: word(12),
            offset: word(13),
            txt_len: word(14),
            password_crc: word(15),
            cost: word(16),
        })
    }
}

/// A complete message header: fixed section plus its subfields in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub fixed: HeaderFixed,
    pub subfields: Vec<Subfield>,
}

impl Default for MessageHeader {
    fn default() -> Self {
        Self {
            fixed: HeaderFixed {
                revision: REVISION,
                ..HeaderFixed::default()
            },
            subfields: Vec::new(),
        }
    }
}

impl MessageHeader {
    /// Build a header, setting `subfield_len` from `subfields`.
    pub fn new(fixed: HeaderFixed, subfields: Vec<Subfield>) -> Self {
        let mut header = Self { fixed, subfields };
        header.fixed.subfield_len = header.computed_subfield_len();
        header
    }

    /// Append a subfield and keep `subfield_len` in step.
    pub fn push(&mut self, subfield: Subfield) {
        self.subfields.push(subfield);
        self.fixed.subfield_len = self.computed_subfield_len();
    }

    /// First subfield of `kind`.
    pub fn first(&self, kind: SubfieldKind) -> Option<&Subfield> {
        self.subfields.iter().find(|s| s.kind == kind)
    }

    /// Every subfield of `kind`, in stored order.
    pub fn all(&self, kind: SubfieldKind) -> impl Iterator<Item = &Subfield> {
        self.subfields.iter().filter(move |s| s.kind == kind)
    }

    fn computed_subfield_len(&self) -> u32 {
        self.subfields.iter().map(|s| s.encoded_len() as u32).sum()
    }

    /// Total bytes this header occupies on disk.
    pub fn encoded_len(&self) -> usize {
        MESSAGE_HEADER_SIZE + self.computed_subfield_len() as usize
    }

    /// Serialize fixed section and subfields. The stored `subfield_len` is
    /// always the size of `subfields`.
    pub fn encode(&self) -> Vec<u8> {
        let mut fixed = self.fixed;
        fixed.subfield_len = self.computed_subfield_len();

        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&fixed.encode());
        for sf in &self.subfields {
            let mut head = [0u8; SUBFIELD_HEADER_SIZE];
            LittleEndian::write_u16(&mut head[..2], sf.kind.id());
            LittleEndian::write_u16(&mut head[2..4], sf.ext_id);
            LittleEndian::write_u32(&mut head[4..], sf.data.len() as u32);
            out.extend_from_slice(&head);
            out.extend_from_slice(&sf.data);
        }
        out
    }

    /// Parse a header from `buf`, which must start at the signature and
    /// hold at least `76 + subfield_len` bytes.
    pub fn decode(buf: &[u8]) -> std::result::Result<Self, String> {
        let fixed = HeaderFixed::decode(buf)?;
        let end = MESSAGE_HEADER_SIZE + fixed.subfield_len as usize;
        if buf.len() < end {
            return Err(format!(
                "Subfields truncated: header declares {} bytes, {} available",
                fixed.subfield_len,
                buf.len() - MESSAGE_HEADER_SIZE
            ));
        }
        let subfields = decode_subfields(&buf[MESSAGE_HEADER_SIZE..end])?;
        Ok(Self { fixed, subfields })
    }
}

/// Decode a packed run of subfields that must exactly fill `buf`.
pub fn decode_subfields(buf: &[u8]) -> std::result::Result<Vec<Subfield>, String> {
    let total = buf.len() as u64;
    let mut cursor = Cursor::new(buf);
    let mut subfields = Vec::new();

    while cursor.position() < total {
        let remaining = total - cursor.position();
        if remaining < SUBFIELD_HEADER_SIZE as u64 {
            return Err(format!("{remaining} trailing bytes after last subfield"));
        }
        let lo_id = read_u16(&mut cursor)?;
        let ext_id = read_u16(&mut cursor)?;
        let len = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| e.to_string())?;
        if u64::from(len) > total - cursor.position() {
            return Err(format!(
                "Subfield {lo_id} declares {len} bytes past the end of the header"
            ));
        }
        let mut data = vec![0u8; len as usize];
        cursor.read_exact(&mut data).map_err(|e| e.to_string())?;
        subfields.push(Subfield {
            kind: SubfieldKind::from_id(lo_id),
            ext_id,
            data,
        });
    }
    Ok(subfields)
}

fn read_u16(cursor: &mut Cursor<&[u8]>) -> std::result::Result<u16, String> {
    cursor
        .read_u16::<LittleEndian>()
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MessageHeader {
        let fixed = HeaderFixed {
            revision: REVISION,
            date_written: 1_700_000_000,
            message_number: 42,
            attribute: attr::LOCAL | attr::PRIVATE,
            offset: 128,
            txt_len: 11,
            ..HeaderFixed::default()
        };
        MessageHeader::new(
            fixed,
            vec![
                Subfield::text(SubfieldKind::SenderName, "Alice"),
                Subfield::text(SubfieldKind::ReceiverName, "Sysop"),
                Subfield::text(SubfieldKind::Kludge, "CHRS: UTF-8 4"),
                Subfield::text(SubfieldKind::Kludge, "TID: jamshell"),
            ],
        )
    }

    #[test]
    fn test_fixed_section_is_76_bytes() {
        assert_eq!(HeaderFixed::default().encode().len(), 76);
    }

    #[test]
    fn test_subfield_len_counts_headers() {
        let h = sample();
        assert_eq!(h.fixed.subfield_len, (8 + 5) + (8 + 5) + (8 + 13) + (8 + 13));
        assert_eq!(h.encode().len(), 76 + h.fixed.subfield_len as usize);
    }

    #[test]
    fn test_roundtrip_preserves_order_and_repeats() {
        let h = sample();
        let decoded = MessageHeader::decode(&h.encode()).unwrap();
        assert_eq!(decoded, h);
        let kludges: Vec<String> = decoded.all(SubfieldKind::Kludge).map(|s| s.as_text()).collect();
        assert_eq!(kludges, vec!["CHRS: UTF-8 4", "TID: jamshell"]);
    }

    #[test]
    fn test_unknown_ids_preserved() {
        let mut h = MessageHeader::default();
        h.push(Subfield {
            kind: SubfieldKind::from_id(4242),
            ext_id: 7,
            data: vec![1, 2, 3],
        });
        let decoded = MessageHeader::decode(&h.encode()).unwrap();
        assert_eq!(decoded.subfields[0].kind, SubfieldKind::Other(4242));
        assert_eq!(decoded.subfields[0].ext_id, 7);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = sample().encode();
        bytes[1] = b'X';
        assert!(MessageHeader::decode(&bytes).is_err());
    }

    #[test]
    fn test_truncated_subfields_rejected() {
        let bytes = sample().encode();
        assert!(MessageHeader::decode(&bytes[..bytes.len() - 3]).is_err());
    }

    #[test]
    fn test_overlong_subfield_rejected() {
        let mut bytes = sample().encode();
        // First subfield length field sits at 76 + 4.
        LittleEndian::write_u32(&mut bytes[80..84], 10_000);
        assert!(MessageHeader::decode(&bytes).is_err());
    }

    #[test]
    fn test_deleted_bit() {
        let mut fixed = HeaderFixed::default();
        assert!(!fixed.is_deleted());
        fixed.attribute |= attr::DELETED;
        assert!(fixed.is_deleted());
    }
}
