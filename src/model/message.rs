//! The assembled message view.

use chrono::{DateTime, Utc};

use super::address::FidoAddress;
use crate::format::attr;
use crate::format::message_header::{MessageHeader, Subfield, SubfieldKind};
use crate::store::text::{from_stored, to_stored};

/// One message as callers see it: decoded subfields, full text, and a
/// display timestamp.
///
/// This is **not** stored as-is. Writing decomposes it into a header,
/// subfields and a text blob; reading reassembles it. Empty strings mean
/// "subfield absent".
#[derive(Debug, Clone, serde::Serialize)]
pub struct Message {
    /// Raw header this message was decoded from (`None` before it is written).
    #[serde(skip)]
    pub header: Option<MessageHeader>,

    /// External message number (slot + base number - 1). 0 until written.
    pub number: u32,

    pub from: String,
    pub to: String,
    pub subject: String,

    /// Origin FTN address, as text.
    pub orig_addr: String,
    /// Destination FTN address, as text.
    pub dest_addr: String,

    /// `MSGID` kludge value.
    pub msgid: String,
    /// `REPLY` kludge value.
    pub reply_id: String,
    /// Producing program (`PID`).
    pub pid: String,

    /// `SEEN-BY` lines, one entry per subfield.
    pub seen_by: Vec<String>,
    /// `PATH` lines, one entry per subfield.
    pub path: Vec<String>,
    /// `FLAGS` kludge value.
    pub flags: String,
    /// `TZUTC` kludge value.
    pub timezone: String,
    /// Other kludge lines, opaque to this crate.
    pub kludges: Vec<String>,

    /// Body text with `\n` line endings.
    pub text: String,

    /// Body bytes exactly as read from `.jdt`: original charset, CR line
    /// ends. `write_message` stores these instead of `text` as long as
    /// `text` still decodes from them.
    #[serde(skip)]
    pub raw_text: Vec<u8>,

    /// Written date.
    pub date: DateTime<Utc>,

    /// Attribute bits (see [`crate::format::attr`]).
    pub attributes: u32,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            header: None,
            number: 0,
            from: String::new(),
            to: String::new(),
            subject: String::new(),
            orig_addr: String::new(),
            dest_addr: String::new(),
            msgid: String::new(),
            reply_id: String::new(),
            pid: String::new(),
            seen_by: Vec::new(),
            path: Vec::new(),
            flags: String::new(),
            timezone: String::new(),
            kludges: Vec::new(),
            text: String::new(),
            raw_text: Vec::new(),
            date: DateTime::UNIX_EPOCH,
            attributes: 0,
        }
    }
}

impl Message {
    /// A new local message dated now.
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            text: text.into(),
            date: Utc::now(),
            attributes: attr::LOCAL,
            ..Self::default()
        }
    }

    pub fn with_private(mut self) -> Self {
        self.attributes |= attr::PRIVATE;
        self
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    pub fn add_kludge(&mut self, line: impl Into<String>) {
        self.kludges.push(line.into());
    }

    pub fn add_seen_by(&mut self, line: impl Into<String>) {
        self.seen_by.push(line.into());
    }

    pub fn add_path(&mut self, line: impl Into<String>) {
        self.path.push(line.into());
    }

    pub fn is_deleted(&self) -> bool {
        self.attributes & attr::DELETED != 0
    }

    pub fn is_private(&self) -> bool {
        self.attributes & attr::PRIVATE != 0
    }

    /// Parsed origin address, if present and well-formed.
    pub fn origin(&self) -> Option<FidoAddress> {
        FidoAddress::parse(&self.orig_addr)
    }

    /// Parsed destination address, if present and well-formed.
    pub fn destination(&self) -> Option<FidoAddress> {
        FidoAddress::parse(&self.dest_addr)
    }

    /// Subfields for this message in the order they are written.
    ///
    /// One subfield per non-empty field; list fields emit one per entry.
    /// Subfields of `header` with no field here (trace, attached files,
    /// binary data, unknown ids) follow unchanged.
    pub fn subfields(&self) -> Vec<Subfield> {
        let singles = [
            (SubfieldKind::OriginAddress, &self.orig_addr),
            (SubfieldKind::DestinationAddress, &self.dest_addr),
            (SubfieldKind::SenderName, &self.from),
            (SubfieldKind::ReceiverName, &self.to),
            (SubfieldKind::MsgId, &self.msgid),
            (SubfieldKind::ReplyId, &self.reply_id),
            (SubfieldKind::Subject, &self.subject),
            (SubfieldKind::Pid, &self.pid),
            (SubfieldKind::Flags, &self.flags),
            (SubfieldKind::TzUtc, &self.timezone),
        ];
        let lists = [
            (SubfieldKind::Kludge, &self.kludges),
            (SubfieldKind::SeenBy, &self.seen_by),
            (SubfieldKind::Path, &self.path),
        ];

        let mut out: Vec<Subfield> = singles
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(kind, value)| Subfield::text(*kind, value))
            .collect();
        for (kind, lines) in lists {
            out.extend(lines.iter().map(|line| Subfield::text(kind, line)));
        }
        if let Some(header) = &self.header {
            out.extend(
                header
                    .subfields
                    .iter()
                    .filter(|sf| !has_field(sf.kind))
                    .cloned(),
            );
        }
        out
    }

    /// Stored form of the body: `raw_text` while `text` still matches it.
    pub fn stored_text(&self) -> Vec<u8> {
        if !self.raw_text.is_empty() && from_stored(&self.raw_text) == self.text {
            self.raw_text.clone()
        } else {
            to_stored(&self.text)
        }
    }

    /// Assemble a message from a decoded header and its text.
    pub fn from_header(header: MessageHeader, text: String) -> Self {
        let mut msg = Self {
            number: header.fixed.message_number,
            text,
            date: timestamp(header.fixed.date_written),
            attributes: header.fixed.attribute,
            ..Self::default()
        };

        for sf in &header.subfields {
            let value = sf.as_text();
            match sf.kind {
                SubfieldKind::OriginAddress => msg.orig_addr = value,
                SubfieldKind::DestinationAddress => msg.dest_addr = value,
                SubfieldKind::SenderName => msg.from = value,
                SubfieldKind::ReceiverName => msg.to = value,
                SubfieldKind::MsgId => msg.msgid = value,
                SubfieldKind::ReplyId => msg.reply_id = value,
                SubfieldKind::Subject => msg.subject = value,
                SubfieldKind::Pid => msg.pid = value,
                SubfieldKind::Flags => msg.flags = value,
                SubfieldKind::TzUtc => msg.timezone = value,
                SubfieldKind::Kludge => msg.kludges.push(value),
                SubfieldKind::SeenBy => msg.seen_by.push(value),
                SubfieldKind::Path => msg.path.push(value),
                // Files, trace and binary data stay reachable through `header`.
                _ => {}
            }
        }

        msg.header = Some(header);
        msg
    }
}

/// Whether `kind` maps onto a named `Message` field.
fn has_field(kind: SubfieldKind) -> bool {
    matches!(
        kind,
        SubfieldKind::OriginAddress
            | SubfieldKind::DestinationAddress
            | SubfieldKind::SenderName
            | SubfieldKind::ReceiverName
            | SubfieldKind::MsgId
            | SubfieldKind::ReplyId
            | SubfieldKind::Subject
            | SubfieldKind::Pid
            | SubfieldKind::Flags
            | SubfieldKind::TzUtc
            | SubfieldKind::Kludge
            | SubfieldKind::SeenBy
            | SubfieldKind::Path
    )
}

/// Convert a header timestamp to UTC, falling back to the epoch.
pub fn timestamp(secs: u32) -> DateTime<Utc> {
    DateTime::from_timestamp(i64::from(secs), 0).unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::message_header::HeaderFixed;

    #[test]
    fn test_subfield_order() {
        let mut msg = Message::new("Alice", "Sysop", "Hello", "hi");
        msg.orig_addr = "2:5020/1042".into();
        msg.msgid = "2:5020/1042 1234abcd".into();
        msg.add_kludge("CHRS: UTF-8 4");
        msg.add_seen_by("5020/1042");
        msg.add_path("5020/1042");

        let kinds: Vec<SubfieldKind> = msg.subfields().iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SubfieldKind::OriginAddress,
                SubfieldKind::SenderName,
                SubfieldKind::ReceiverName,
                SubfieldKind::MsgId,
                SubfieldKind::Subject,
                SubfieldKind::Kludge,
                SubfieldKind::SeenBy,
                SubfieldKind::Path,
            ]
        );
    }

    #[test]
    fn test_from_header_maps_fields() {
        let msg = Message::new("Alice", "Sysop", "Hello", "");
        let header = MessageHeader::new(
            HeaderFixed {
                message_number: 7,
                date_written: 86_400,
                attribute: attr::PRIVATE,
                ..HeaderFixed::default()
            },
            msg.subfields(),
        );
        let back = Message::from_header(header, "body".into());
        assert_eq!(back.number, 7);
        assert_eq!(back.from, "Alice");
        assert_eq!(back.to, "Sysop");
        assert_eq!(back.subject, "Hello");
        assert_eq!(back.text, "body");
        assert!(back.is_private());
        assert_eq!(back.date.timestamp(), 86_400);
        assert!(back.header.is_some());
    }

    #[test]
    fn test_unnamed_subfields_carried_over() {
        let trace = Subfield::text(SubfieldKind::Trace, "2:5020/1 @20240101");
        let blob = Subfield::new(SubfieldKind::Other(3000), vec![0u8, 0xFF]);
        let mut subfields = Message::new("Alice", "Bob", "Hi", "").subfields();
        subfields.push(trace.clone());
        subfields.push(blob.clone());

        let mut msg = Message::from_header(
            MessageHeader::new(HeaderFixed::default(), subfields),
            String::new(),
        );
        msg.subject = "Edited".into();

        let out = msg.subfields();
        assert_eq!(out.iter().filter(|s| s.kind == SubfieldKind::Subject).count(), 1);
        assert_eq!(out.iter().find(|s| s.kind == SubfieldKind::Subject).unwrap().as_text(), "Edited");
        assert_eq!(&out[out.len() - 2..], &[trace, blob]);
    }

    #[test]
    fn test_stored_text_prefers_raw_bytes() {
        let mut msg = Message {
            raw_text: vec![0xE0, 0x0D],
            text: from_stored(&[0xE0, 0x0D]),
            ..Message::default()
        };
        assert_eq!(msg.stored_text(), vec![0xE0, 0x0D]);

        msg.text = "rewritten\n".into();
        assert_eq!(msg.stored_text(), b"rewritten\r".to_vec());
    }

    #[test]
    fn test_origin_address() {
        let mut msg = Message::default();
        assert!(msg.origin().is_none());
        msg.orig_addr = "1:261/38".into();
        assert_eq!(msg.origin().unwrap().net, 261);
    }
}
