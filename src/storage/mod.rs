//! Local temp buffer storage
//!
//! Every relay instance persists its stream into one uniquely named temp
//! file. This module names that file, creates it, and deletes it again on
//! teardown with bounded retries.

pub mod buffer;
pub mod paths;

pub use buffer::{create_buffer, delete_with_retry, CleanupOutcome};
pub use paths::{BufferLocation, TempDirPaths, TempPathBuilder};
