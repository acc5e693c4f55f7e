//! Predicate-driven scans over a message base.
//!
//! There is no secondary index: every scan reads slots `1..=count` in order.
//! Cost is O(n), which suits bases of thousands of messages.

pub mod filter;
pub mod scanner;

pub use filter::{Filter, TextField};
pub use scanner::{
    after_date, find_first, private_for, replies_to, scan, scan_with, search_text, unread_for,
};
