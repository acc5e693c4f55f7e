use jamshell::format::message_header::{HeaderFixed, MessageHeader, Subfield, SubfieldKind};
use jamshell::hash::jam_crc;
use jamshell::store::text::{from_stored, to_stored};
use proptest::prelude::*;

// Strategy for subfields with any id, including ones this crate does not name
fn arb_subfield() -> impl Strategy<Value = Subfield> {
    (
        any::<u16>(),
        any::<u16>(),
        prop::collection::vec(any::<u8>(), 0..64),
    )
        .prop_map(|(id, ext_id, data)| Subfield {
            kind: SubfieldKind::from_id(id),
            ext_id,
            data,
        })
}

fn arb_fixed() -> impl Strategy<Value = HeaderFixed> {
    (
        prop::array::uniform8(any::<u32>()),
        prop::array::uniform8(any::<u32>()),
    )
        .prop_map(|(a, b)| HeaderFixed {
            revision: 1,
            reserved: 0,
            subfield_len: 0,
            times_read: a[0],
            msgid_crc: a[1],
            reply_crc: a[2],
            reply_to: a[3],
            reply_1st: a[4],
            reply_next: a[5],
            date_written: a[6],
            date_received: a[7],
            date_processed: b[0],
            message_number: b[1],
            attribute: b[2],
            attribute2: b[3],
            offset: b[4],
            txt_len: b[5],
            password_crc: b[6],
            cost: b[7],
        })
}

proptest! {
    /// Property: a header built with `new` decodes to itself
    #[test]
    fn prop_header_survives_encoding(
        fixed in arb_fixed(),
        subfields in prop::collection::vec(arb_subfield(), 0..12),
    ) {
        let header = MessageHeader::new(fixed, subfields);
        let bytes = header.encode();
        prop_assert_eq!(bytes.len(), header.encoded_len());

        let decoded = MessageHeader::decode(&bytes).unwrap();
        prop_assert_eq!(decoded, header);
    }

    /// Property: decoding arbitrary bytes never panics
    #[test]
    fn prop_header_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = MessageHeader::decode(&bytes);
    }

    /// Property: hashing ignores ASCII case
    #[test]
    fn prop_hash_ignores_ascii_case(s in "[ -~]{0,300}") {
        prop_assert_eq!(jam_crc(&s), jam_crc(&s.to_ascii_lowercase()));
        prop_assert_eq!(jam_crc(&s), jam_crc(&s.to_ascii_uppercase()));
    }

    /// Property: LF text without CR comes back unchanged
    #[test]
    fn prop_text_line_endings(lines in prop::collection::vec("[^\r\n]{0,40}", 0..10)) {
        let text = lines.join("\n");
        let stored = to_stored(&text);
        prop_assert!(!stored.contains(&b'\n'));
        prop_assert_eq!(from_stored(&stored), text);
    }
}
