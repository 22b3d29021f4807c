//! Live stream lifecycle
//!
//! [`LiveStream`] is the public face of a relay: it opens the remote source,
//! blocks until the first bytes are persisted, lets callers attach live
//! consumers, and tears everything down on close.

pub mod handle;
pub mod locator;
pub mod state;

pub use handle::{LiveStream, OpenedStream};
pub use locator::{LocalApiLocator, PlaybackLocator};
pub use state::{Completion, StreamPhase};
