//! High-level values handed to and returned from a message base.

pub mod address;
pub mod message;
