//! Consumer registry for live fan-out
//!
//! The registry holds the secondary consumers attached to a relay and
//! delivers every chunk persisted to the primary sink to each of them.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<ConsumerRegistry>
//!                     ┌─────────────────────────┐
//!                     │ entries: Vec<           │
//!                     │   ConsumerEntry {       │
//!                     │     sink, cancel,       │
//!                     │     done: oneshot::Tx,  │
//!                     │   }                     │
//!                     │ >                       │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!   [RelayEngine]            [Consumer]              [Consumer]
//!   fan_out(chunk)           sink.write()            sink.write()
//!         │                       │                       │
//!         └──► write failure ──► entry removed ──► completion Err(e)
//! ```
//!
//! # Isolation
//!
//! Consumers are written one after another in attach order. A failure, a
//! timeout or the consumer's own cancellation removes only that entry; the
//! relay and every other consumer carry on.

pub mod entry;
pub mod error;
pub mod store;

pub use entry::{ConsumerCompletion, ConsumerEntry, ConsumerId, ConsumerSink};
pub use error::ConsumerError;
pub use store::ConsumerRegistry;
