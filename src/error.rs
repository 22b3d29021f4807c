//! Error types
//!
//! `Error` covers everything that can surface from opening or driving a
//! relay. Failures of individual fan-out consumers use
//! [`ConsumerError`](crate::registry::ConsumerError) instead, since they
//! never reach the caller of `open()`.

use std::io;

use crate::stream::StreamPhase;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for relay operations
#[derive(Debug)]
pub enum Error {
    /// Local or remote I/O failure
    Io(io::Error),
    /// HTTP transport failure while opening the remote source
    Http(reqwest::Error),
    /// Remote source answered with a non-success status code
    Status(u16),
    /// The operation was aborted by cancellation
    Cancelled,
    /// Operation not allowed in the current lifecycle phase
    InvalidState(StreamPhase),
    /// Relay exited before it ever became ready
    RelayEnded,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::Status(code) => write!(f, "Remote source returned status {}", code),
            Error::Cancelled => write!(f, "Operation cancelled"),
            Error::InvalidState(phase) => {
                write!(f, "Operation not allowed in phase {:?}", phase)
            }
            Error::RelayEnded => write!(f, "Relay ended before the stream became ready"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}
