//! The message base and its four backing stores.
//!
//! [`Base`] is split across files by store: lifecycle and the fixed header
//! in `base`, slots in `index`, bodies in `text`, reading positions in
//! `lastread`, and whole-message assembly in `messages`.

pub mod base;
mod file;
pub mod index;
pub mod lastread;
pub mod lock;
pub mod messages;
pub mod text;

pub use base::{Base, BasePaths, BaseStats};
pub use index::IndexEntry;
pub use lock::BaseLock;
