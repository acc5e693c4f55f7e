//! Text store: append-only message bodies addressed by (offset, length).

use tracing::debug;

use super::base::Base;
use super::file::offset_u32;
use crate::error::{JamError, Result};
use crate::format::message_header::HeaderFixed;

/// Convert host text to the stored form: every line ends in a bare CR.
pub fn to_stored(text: &str) -> Vec<u8> {
    text.replace("\r\n", "\n").replace('\n', "\r").into_bytes()
}

/// Convert stored bytes back to host text with `\n` line endings.
///
/// Bytes that are not UTF-8 (CP437, CP866 and other 8-bit charsets) become
/// U+FFFD; keep the stored bytes when they matter.
pub fn from_stored(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).replace('\r', "\n")
}

impl Base {
    /// Append `text` to `.jdt` and return `(offset, stored_length)`.
    pub fn write_message_text(&mut self, text: &str) -> Result<(u32, u32)> {
        self.write_stored_text(&to_stored(text))
    }

    /// Append bytes already in stored form (CR line ends) verbatim.
    pub fn write_stored_text(&mut self, stored: &[u8]) -> Result<(u32, u32)> {
        self.with_lock(|base| {
            let file = &mut base.files()?.text;
            let offset = file.append(stored)?;
            let end = offset + stored.len() as u64;
            offset_u32(end, file.path())?;
            debug!(offset, length = stored.len(), "Wrote message text");
            Ok((offset_u32(offset, file.path())?, stored.len() as u32))
        })
    }

    /// Read the text a header points at. A zero length never touches disk.
    pub fn read_message_text(&mut self, fixed: &HeaderFixed) -> Result<String> {
        Ok(from_stored(&self.read_stored_text(fixed)?))
    }

    /// The bytes a header points at, exactly as stored.
    pub fn read_stored_text(&mut self, fixed: &HeaderFixed) -> Result<Vec<u8>> {
        if fixed.txt_len == 0 {
            return Ok(Vec::new());
        }
        let file = &mut self.files()?.text;
        let end = u64::from(fixed.offset) + u64::from(fixed.txt_len);
        if end > file.len()? {
            return Err(JamError::invalid(
                file.path(),
                format!(
                    "Text at {}+{} runs past the end of the file",
                    fixed.offset, fixed.txt_len
                ),
            ));
        }
        let mut buf = vec![0u8; fixed.txt_len as usize];
        file.read_at(u64::from(fixed.offset), &mut buf)?;
        Ok(buf)
    }
}
