//! Message predicates.
//!
//! A [`Filter`] decides from an assembled [`Message`] alone, so it never
//! touches disk. Filters that depend on base state (a user's lastread, a
//! target message's MSGID) capture that state when they are built.

use chrono::{DateTime, Utc};

use crate::model::message::Message;

/// Which text field a substring filter looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    From,
    To,
    Subject,
    /// Sender, recipient or subject.
    Any,
}

/// A predicate over messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Every message.
    All,
    /// Messages without the deleted attribute.
    NotDeleted,
    /// Not deleted and numbered above `last_read`.
    UnreadAfter { last_read: u32 },
    /// Written strictly after the given instant.
    AfterDate(DateTime<Utc>),
    /// Case-insensitive substring match. `needle` is stored lower-cased.
    Text { field: TextField, needle: String },
    /// Private messages addressed to `recipient` (case-insensitive).
    PrivateFor { recipient: String },
    /// Messages whose REPLY equals `msgid`.
    RepliesTo { msgid: String },
    /// Every inner filter matches.
    And(Vec<Filter>),
    /// At least one inner filter matches.
    Or(Vec<Filter>),
    /// The inner filter does not match.
    Not(Box<Filter>),
}

impl Filter {
    /// Substring filter; `needle` is lower-cased here.
    pub fn text(field: TextField, needle: &str) -> Self {
        Self::Text {
            field,
            needle: needle.to_lowercase(),
        }
    }

    pub fn private_for(recipient: &str) -> Self {
        Self::PrivateFor {
            recipient: recipient.to_string(),
        }
    }

    /// Combine with another filter, flattening nested `And`s.
    pub fn and(self, other: Filter) -> Self {
        match self {
            Self::And(mut inner) => {
                inner.push(other);
                Self::And(inner)
            }
            Self::All => other,
            first => Self::And(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Check whether `msg` satisfies this filter.
    pub fn matches(&self, msg: &Message) -> bool {
        match self {
            Self::All => true,
            Self::NotDeleted => !msg.is_deleted(),
            Self::UnreadAfter { last_read } => !msg.is_deleted() && msg.number > *last_read,
            Self::AfterDate(date) => msg.date > *date,
            Self::Text { field, needle } => match field {
                TextField::From => contains(&msg.from, needle),
                TextField::To => contains(&msg.to, needle),
                TextField::Subject => contains(&msg.subject, needle),
                TextField::Any => {
                    contains(&msg.from, needle)
                        || contains(&msg.to, needle)
                        || contains(&msg.subject, needle)
                }
            },
            Self::PrivateFor { recipient } => {
                msg.is_private() && msg.to.eq_ignore_ascii_case(recipient)
            }
            Self::RepliesTo { msgid } => !msgid.is_empty() && msg.reply_id == *msgid,
            Self::And(inner) => inner.iter().all(|f| f.matches(msg)),
            Self::Or(inner) => inner.iter().any(|f| f.matches(msg)),
            Self::Not(inner) => !inner.matches(msg),
        }
    }
}

/// Case-insensitive containment; `needle` is already lower-case.
fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::attr;
    use chrono::TimeZone;

    fn make(number: u32, from: &str, to: &str, subject: &str) -> Message {
        Message {
            number,
            from: from.to_string(),
            to: to.to_string(),
            subject: subject.to_string(),
            date: Utc.with_ymd_and_hms(2024, 1, number, 10, 0, 0).unwrap(),
            ..Message::default()
        }
    }

    #[test]
    fn test_text_is_case_insensitive() {
        let m = make(1, "Alice", "Sysop", "Budget Report");
        assert!(Filter::text(TextField::Subject, "BUDGET").matches(&m));
        assert!(Filter::text(TextField::From, "ali").matches(&m));
        assert!(!Filter::text(TextField::To, "alice").matches(&m));
        assert!(Filter::text(TextField::Any, "sysop").matches(&m));
    }

    #[test]
    fn test_unread_skips_deleted() {
        let mut m = make(5, "a", "b", "c");
        assert!(Filter::UnreadAfter { last_read: 4 }.matches(&m));
        assert!(!Filter::UnreadAfter { last_read: 5 }.matches(&m));
        m.attributes |= attr::DELETED;
        assert!(!Filter::UnreadAfter { last_read: 0 }.matches(&m));
    }

    #[test]
    fn test_private_for() {
        let mut m = make(1, "a", "Sysop", "c");
        assert!(!Filter::private_for("sysop").matches(&m));
        m.attributes |= attr::PRIVATE;
        assert!(Filter::private_for("SYSOP").matches(&m));
        assert!(!Filter::private_for("guest").matches(&m));
    }

    #[test]
    fn test_after_date() {
        let m = make(10, "a", "b", "c");
        let cutoff = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        assert!(Filter::AfterDate(cutoff).matches(&m));
        assert!(!Filter::AfterDate(m.date).matches(&m));
    }

    #[test]
    fn test_replies_to_needs_msgid() {
        let mut m = make(1, "a", "b", "c");
        assert!(!Filter::RepliesTo { msgid: String::new() }.matches(&m));
        m.reply_id = "1:2/3 abcd".into();
        assert!(Filter::RepliesTo {
            msgid: "1:2/3 abcd".into()
        }
        .matches(&m));
    }

    #[test]
    fn test_combinators() {
        let m = make(1, "Alice", "Bob", "Hello");
        let f = Filter::All
            .and(Filter::NotDeleted)
            .and(Filter::text(TextField::From, "alice"));
        assert!(matches!(f, Filter::And(ref v) if v.len() == 2));
        assert!(f.matches(&m));
        assert!(!f.clone().negate().matches(&m));
        assert!(Filter::Or(vec![
            Filter::text(TextField::Subject, "nope"),
            Filter::text(TextField::To, "bob"),
        ])
        .matches(&m));
    }
}
