//! Sequential scans.
//!
//! Scans are stateless: each call walks the base from slot 1. A message
//! that cannot be read (deleted slot, bad header) is logged and skipped.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::filter::{Filter, TextField};
use crate::error::{JamError, Result};
use crate::model::message::Message;
use crate::store::Base;

/// Every message matching `pred`, in slot order.
pub fn scan_with(base: &mut Base, mut pred: impl FnMut(&Message) -> bool) -> Result<Vec<Message>> {
    let slots = base.message_numbers()?;
    let count = *slots.end();
    let mut out = Vec::new();
    let mut skipped = 0u32;

    for n in slots {
        match base.read_message(n) {
            Ok(msg) => {
                if pred(&msg) {
                    out.push(msg);
                }
            }
            Err(e) if skippable(&e) => {
                skipped += 1;
                warn!(slot = n, error = %e, "Skipping unreadable message");
            }
            Err(e) => return Err(e),
        }
    }

    debug!(count, matched = out.len(), skipped, "Scan finished");
    Ok(out)
}

/// Per-message failures, including a header or text cut short by EOF.
fn skippable(e: &JamError) -> bool {
    match e {
        JamError::Io { source, .. } => source.kind() == std::io::ErrorKind::UnexpectedEof,
        other => other.is_per_message(),
    }
}

/// Every message matching `filter`, in slot order.
pub fn scan(base: &mut Base, filter: &Filter) -> Result<Vec<Message>> {
    scan_with(base, |m| filter.matches(m))
}

/// First message matching `filter`, or `NotFound`.
pub fn find_first(base: &mut Base, filter: &Filter) -> Result<Message> {
    for n in base.message_numbers()? {
        match base.read_message(n) {
            Ok(msg) if filter.matches(&msg) => return Ok(msg),
            Ok(_) => {}
            Err(e) if skippable(&e) => {
                warn!(slot = n, error = %e, "Skipping unreadable message");
            }
            Err(e) => return Err(e),
        }
    }
    Err(JamError::NotFound("no message matches".into()))
}

/// Messages `user` has not read yet, deleted ones excluded.
pub fn unread_for(base: &mut Base, user: &str) -> Result<Vec<Message>> {
    let last_read = match base.get_last_read(user) {
        Ok(rec) => rec.last_read,
        Err(JamError::NotFound(_)) => 0,
        Err(e) => return Err(e),
    };
    scan(base, &Filter::UnreadAfter { last_read })
}

/// Messages written after `date`.
pub fn after_date(base: &mut Base, date: DateTime<Utc>) -> Result<Vec<Message>> {
    scan(base, &Filter::AfterDate(date))
}

/// Messages whose `field` contains `needle`, ignoring case.
pub fn search_text(base: &mut Base, field: TextField, needle: &str) -> Result<Vec<Message>> {
    scan(base, &Filter::text(field, needle))
}

/// Private messages addressed to `recipient`.
pub fn private_for(base: &mut Base, recipient: &str) -> Result<Vec<Message>> {
    scan(base, &Filter::private_for(recipient))
}

/// Replies to message `n`: messages whose REPLY equals its MSGID.
///
/// A target without a MSGID has no replies.
pub fn replies_to(base: &mut Base, n: u32) -> Result<Vec<Message>> {
    let target = base.read_message(n)?;
    if target.msgid.is_empty() {
        return Ok(Vec::new());
    }
    scan(base, &Filter::RepliesTo { msgid: target.msgid })
}
