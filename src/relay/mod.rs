//! Relay engine and its supporting pieces
//!
//! - [`RelayEngine`]: read/retry/fan-out loop plus teardown
//! - [`Readiness`]: one-shot gate resolved by the first persisted bytes
//! - [`RelayConfig`]: buffer size, delays and cleanup policy

pub mod config;
pub mod engine;
pub mod readiness;

pub use config::RelayConfig;
pub use engine::{RelayEngine, RelayExit};
pub use readiness::{Readiness, ReadinessWaiter};
