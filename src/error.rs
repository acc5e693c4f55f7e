//! Centralized error types for jamshell.

use std::fmt::Write as _;
use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the jamshell library.
#[derive(Error, Debug)]
pub enum JamError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A file does not carry the JAM signature or a record is malformed.
    #[error("Invalid JAM data in '{path}': {reason}")]
    InvalidFormat { path: PathBuf, reason: String },

    /// The message number lies outside `1..=count`.
    #[error("Message number {0} is out of range")]
    InvalidMessage(u32),

    /// A deleted index slot, an absent lastread record, or an empty lookup.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The base was closed (or never opened) before the call.
    #[error("Message base is not open")]
    BaseNotOpen,

    /// One or more of the four files failed to flush on close.
    #[error("Failed to close message base: {}", describe_close_failures(.0))]
    Close(Vec<(PathBuf, std::io::Error)>),

    /// An offset or length no longer fits the format's 32-bit fields.
    #[error("File '{path}' exceeds the 4 GiB limit of the JAM format")]
    TooLarge { path: PathBuf },
}

/// Convenience alias for `Result<T, JamError>`.
pub type Result<T> = std::result::Result<T, JamError>;

impl JamError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an `InvalidFormat` variant.
    pub fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// `true` for errors that only concern one message, which scans skip over.
    pub fn is_per_message(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat { .. } | Self::NotFound(_) | Self::InvalidMessage(_)
        )
    }
}

/// Allow `?` on `std::io::Error` inside functions returning `JamError`
/// when no path context is available (rare; prefer `JamError::io`).
impl From<std::io::Error> for JamError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}

fn describe_close_failures(failures: &[(PathBuf, std::io::Error)]) -> String {
    let mut out = String::new();
    for (i, (path, err)) in failures.iter().enumerate() {
        if i > 0 {
            out.push_str("; ");
        }
        let _ = write!(out, "{}: {err}", path.display());
    }
    out
}
