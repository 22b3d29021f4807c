//! Consumer error types
//!
//! Errors that end one consumer's participation in the fan-out. They are
//! delivered only through that consumer's completion future.

use std::io;
use std::time::Duration;

/// Why a consumer stopped receiving data
#[derive(Debug)]
pub enum ConsumerError {
    /// Writing to the consumer's sink failed
    Write(io::Error),
    /// The consumer's own cancellation token fired
    Cancelled,
    /// A single write did not complete within the configured timeout
    TimedOut(Duration),
    /// The relay dropped the entry without resolving it
    RelayGone,
}

impl std::fmt::Display for ConsumerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsumerError::Write(e) => write!(f, "Consumer write failed: {}", e),
            ConsumerError::Cancelled => write!(f, "Consumer cancelled"),
            ConsumerError::TimedOut(after) => {
                write!(f, "Consumer write timed out after {:?}", after)
            }
            ConsumerError::RelayGone => write!(f, "Relay dropped the consumer"),
        }
    }
}

impl std::error::Error for ConsumerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConsumerError::Write(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ConsumerError {
    fn from(e: io::Error) -> Self {
        ConsumerError::Write(e)
    }
}
