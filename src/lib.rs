//! `jamShell`: read and write JAM message bases.
//!
//! A JAM base is four files sharing one path prefix: headers (`.jhr`),
//! text (`.jdt`), index (`.jdx`) and lastread pointers (`.jlr`). This crate
//! opens and creates bases, posts, reads and soft-deletes messages, tracks
//! per-user reading positions, and scans messages by predicate.
//!
//! ```no_run
//! use jamshell::model::message::Message;
//! use jamshell::store::Base;
//!
//! let mut base = Base::open("/bbs/msgs/general")?;
//! let slot = base.write_message(&Message::new("Sysop", "All", "Welcome", "Hello!\n"))?;
//! let msg = base.read_message(slot)?;
//! base.mark_read("Sysop", msg.number)?;
//! base.close()?;
//! # Ok::<(), jamshell::error::JamError>(())
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod hash;
pub mod model;
pub mod search;
pub mod store;
