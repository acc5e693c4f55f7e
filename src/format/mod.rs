//! On-disk layout of a JAM message base.
//!
//! ```text
//! P.jhr  ┌──────────────────────────────────────┐
//!        │ FIXED HEADER (1024 bytes)            │
//!        │  signature: [u8; 4] = b"JAM\0"       │
//!        │  date_created, mod_counter,          │
//!        │  active_msgs, password_crc,          │
//!        │  base_msg_num: u32                   │
//!        │  (1000 reserved bytes)               │
//!        ├──────────────────────────────────────┤
//!        │ MESSAGE HEADER (76 bytes) + subfields│  repeated, append-only
//!        └──────────────────────────────────────┘
//! P.jdx  [to_crc: u32, hdr_offset: u32] per slot, 0xFFFFFFFF x2 = deleted
//! P.jdt  raw message text, CR line endings
//! P.jlr  [user_crc, user_id, last_read, high_read: u32] per user
//! ```
//!
//! All integers are little-endian.

pub mod fixed_header;
pub mod index;
pub mod lastread;
pub mod message_header;

/// Signature at the start of the fixed header and of every message header.
pub const MAGIC: &[u8; 4] = b"JAM\0";

/// Message header revision written by this crate.
pub const REVISION: u16 = 1;

/// Size of the base-level fixed header in bytes.
pub const FIXED_HEADER_SIZE: usize = 1024;

/// Size of the fixed section of a message header in bytes.
pub const MESSAGE_HEADER_SIZE: usize = 76;

/// Size of a subfield header (`lo_id`, `hi_id`, `length`).
pub const SUBFIELD_HEADER_SIZE: usize = 8;

/// Size of an index record.
pub const INDEX_RECORD_SIZE: usize = 8;

/// Size of a lastread record.
pub const LASTREAD_RECORD_SIZE: usize = 16;

/// File extension of the header file.
pub const EXT_HEADER: &str = "jhr";
/// File extension of the text file.
pub const EXT_TEXT: &str = "jdt";
/// File extension of the index file.
pub const EXT_INDEX: &str = "jdx";
/// File extension of the lastread file.
pub const EXT_LASTREAD: &str = "jlr";

/// Message attribute bits (the `attribute` word of a message header).
pub mod attr {
    pub const LOCAL: u32 = 0x0000_0001;
    pub const IN_TRANSIT: u32 = 0x0000_0002;
    pub const PRIVATE: u32 = 0x0000_0004;
    pub const READ: u32 = 0x0000_0008;
    pub const SENT: u32 = 0x0000_0010;
    pub const KILL_SENT: u32 = 0x0000_0020;
    pub const ARCHIVE_SENT: u32 = 0x0000_0040;
    pub const HOLD: u32 = 0x0000_0080;
    pub const CRASH: u32 = 0x0000_0100;
    pub const IMMEDIATE: u32 = 0x0000_0200;
    pub const DIRECT: u32 = 0x0000_0400;
    pub const GATE: u32 = 0x0000_0800;
    pub const FILE_REQUEST: u32 = 0x0000_1000;
    pub const FILE_ATTACH: u32 = 0x0000_2000;
    pub const TRUNC_FILE: u32 = 0x0000_4000;
    pub const KILL_FILE: u32 = 0x0000_8000;
    pub const RECEIPT_REQ: u32 = 0x0001_0000;
    pub const CONFIRM_REQ: u32 = 0x0002_0000;
    pub const ORPHAN: u32 = 0x0004_0000;
    pub const ENCRYPT: u32 = 0x0008_0000;
    pub const COMPRESS: u32 = 0x0010_0000;
    pub const ESCAPED: u32 = 0x0020_0000;
    pub const FPU: u32 = 0x0040_0000;
    pub const TYPE_LOCAL: u32 = 0x0080_0000;
    pub const TYPE_ECHO: u32 = 0x0100_0000;
    pub const TYPE_NET: u32 = 0x0200_0000;
    pub const NO_DISPLAY: u32 = 0x2000_0000;
    pub const LOCKED: u32 = 0x4000_0000;
    pub const DELETED: u32 = 0x8000_0000;

    /// Short labels used when listing messages.
    pub const NAMES: &[(u32, &str)] = &[
        (LOCAL, "local"),
        (IN_TRANSIT, "in-transit"),
        (PRIVATE, "private"),
        (READ, "read"),
        (SENT, "sent"),
        (KILL_SENT, "kill-sent"),
        (ARCHIVE_SENT, "archive-sent"),
        (HOLD, "hold"),
        (CRASH, "crash"),
        (IMMEDIATE, "immediate"),
        (DIRECT, "direct"),
        (GATE, "gate"),
        (FILE_REQUEST, "file-request"),
        (FILE_ATTACH, "file-attach"),
        (TRUNC_FILE, "trunc-file"),
        (KILL_FILE, "kill-file"),
        (RECEIPT_REQ, "receipt-req"),
        (CONFIRM_REQ, "confirm-req"),
        (ORPHAN, "orphan"),
        (ENCRYPT, "encrypt"),
        (COMPRESS, "compress"),
        (ESCAPED, "escaped"),
        (FPU, "fpu"),
        (TYPE_LOCAL, "type-local"),
        (TYPE_ECHO, "type-echo"),
        (TYPE_NET, "type-net"),
        (NO_DISPLAY, "no-display"),
        (LOCKED, "locked"),
        (DELETED, "deleted"),
    ];

    /// Names of every bit set in `attribute`.
    pub fn describe(attribute: u32) -> Vec<&'static str> {
        NAMES
            .iter()
            .filter(|(bit, _)| attribute & bit != 0)
            .map(|(_, name)| *name)
            .collect()
    }
}
