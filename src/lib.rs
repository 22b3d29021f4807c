//! Resilient live stream relay
//!
//! `tuner-relay` pulls one continuous remote byte stream (a tuner feeding a
//! live broadcast over HTTP), persists it into a local temp buffer, and
//! broadcasts the same bytes to any number of consumers attached while the
//! stream is live.
//!
//! # Architecture
//!
//! ```text
//!   LiveStream::open()
//!         │ spawn
//!         ▼
//!   ┌─────────────┐  read   ┌──────────────┐  write   ┌──────────────────┐
//!   │ ByteSource  │ ──────► │ RelayEngine  │ ───────► │ temp buffer (.ts) │
//!   └─────────────┘ reopen  └──────┬───────┘          └──────────────────┘
//!                                  │ fan_out
//!                                  ▼
//!                       ┌────────────────────┐
//!                       │ ConsumerRegistry   │ ──► consumer sinks
//!                       └────────────────────┘
//! ```
//!
//! - `open()` returns once the first bytes are on disk, or with the error
//!   that prevented it.
//! - After that, connection failures are retried transparently.
//! - A failing consumer is removed without disturbing anything else.
//! - `close()` cancels the relay and resolves after the temp buffer has
//!   been closed and deleted (best effort).

pub mod error;
pub mod registry;
pub mod relay;
pub mod source;
pub mod stats;
pub mod storage;
pub mod stream;

pub use error::{Error, Result};
pub use registry::{ConsumerCompletion, ConsumerError, ConsumerId};
pub use relay::RelayConfig;
pub use source::{ByteSource, HttpSource, SourceReader};
pub use stats::RelayStatsSnapshot;
pub use storage::{BufferLocation, TempDirPaths, TempPathBuilder};
pub use stream::{
    Completion, LiveStream, LocalApiLocator, OpenedStream, PlaybackLocator, StreamPhase,
};
