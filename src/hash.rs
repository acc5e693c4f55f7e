//! The JAM string hash.
//!
//! JAM keys recipients, lastread users and MSGID/REPLY values by a CRC-32
//! of the lower-cased text that is never post-inverted. That is the bitwise
//! complement of the standard (IEEE) CRC-32 that `crc32fast` computes.

/// Value of the hash for a field that carries no text.
pub const EMPTY_HASH: u32 = 0xFFFF_FFFF;

/// Compute the JAM hash of `text`. ASCII letters are folded to lower case
/// first, so `jam_crc("SysOp") == jam_crc("sysop")`.
pub fn jam_crc(text: &str) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = [0u8; 256];
    for chunk in text.as_bytes().chunks(buf.len()) {
        let lowered = &mut buf[..chunk.len()];
        lowered.copy_from_slice(chunk);
        lowered.make_ascii_lowercase();
        hasher.update(lowered);
    }
    !hasher.finalize()
}
