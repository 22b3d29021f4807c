//! Relay configuration

use std::time::Duration;

/// Size of the working buffer moved from source to sinks
pub const DEFAULT_CHUNK_SIZE: usize = 81_920;

/// Relay configuration options
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Working buffer size for each read
    pub chunk_size: usize,

    /// Pause after a zero-byte read before reading again
    pub idle_read_delay: Duration,

    /// Pause before reopening the source after a post-readiness failure
    pub reconnect_delay: Duration,

    /// How often the readiness poller checks for the temp buffer on disk
    pub readiness_poll_interval: Duration,

    /// Delete attempts for the temp buffer on teardown
    pub cleanup_attempts: u32,

    /// Pause between delete attempts
    pub cleanup_retry_delay: Duration,

    /// Upper bound for one write to a consumer (None = wait indefinitely)
    pub consumer_write_timeout: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            idle_read_delay: Duration::from_millis(100),
            reconnect_delay: Duration::ZERO,
            readiness_poll_interval: Duration::from_millis(50),
            cleanup_attempts: 10,
            cleanup_retry_delay: Duration::from_secs(1),
            consumer_write_timeout: None,
        }
    }
}

impl RelayConfig {
    /// Set the working buffer size (at least one byte)
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Set the idle delay after zero-byte reads
    pub fn idle_read_delay(mut self, delay: Duration) -> Self {
        self.idle_read_delay = delay;
        self
    }

    /// Set the pause before reopening a failed source
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the readiness poll interval
    pub fn readiness_poll_interval(mut self, interval: Duration) -> Self {
        self.readiness_poll_interval = interval;
        self
    }

    /// Set cleanup retry policy (at least one attempt)
    pub fn cleanup(mut self, attempts: u32, retry_delay: Duration) -> Self {
        self.cleanup_attempts = attempts.max(1);
        self.cleanup_retry_delay = retry_delay;
        self
    }

    /// Bound every consumer write
    pub fn consumer_write_timeout(mut self, timeout: Duration) -> Self {
        self.consumer_write_timeout = Some(timeout);
        self
    }
}
