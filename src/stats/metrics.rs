//! Statistics for a relay instance

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters shared by the relay engine, the registry and the controller
#[derive(Debug)]
pub struct RelayStats {
    started_at: Instant,
    bytes_relayed: AtomicU64,
    chunks_relayed: AtomicU64,
    reconnects: AtomicU64,
    consumers_attached: AtomicU64,
    consumers_dropped: AtomicU64,
}

impl RelayStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            bytes_relayed: AtomicU64::new(0),
            chunks_relayed: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            consumers_attached: AtomicU64::new(0),
            consumers_dropped: AtomicU64::new(0),
        }
    }

    /// Record a chunk persisted to the primary sink
    pub fn record_chunk(&self, len: usize) {
        self.bytes_relayed.fetch_add(len as u64, Ordering::Relaxed);
        self.chunks_relayed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reopen of the source after a transient failure
    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a consumer joining the fan-out
    pub fn record_consumer_attached(&self) {
        self.consumers_attached.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a consumer removed because of its own failure
    pub fn record_consumer_dropped(&self) {
        self.consumers_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent-enough copy of the counters
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            bytes_relayed: self.bytes_relayed.load(Ordering::Relaxed),
            chunks_relayed: self.chunks_relayed.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            consumers_attached: self.consumers_attached.load(Ordering::Relaxed),
            consumers_dropped: self.consumers_dropped.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`RelayStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStatsSnapshot {
    /// Bytes written to the primary sink
    pub bytes_relayed: u64,
    /// Chunks written to the primary sink
    pub chunks_relayed: u64,
    /// Transparent reopens after readiness
    pub reconnects: u64,
    /// Consumers ever attached
    pub consumers_attached: u64,
    /// Consumers removed after a write failure or their own cancellation
    pub consumers_dropped: u64,
    /// Time since the stats were created
    pub uptime: Duration,
}

impl RelayStatsSnapshot {
    /// Average bitrate in bits per second over the whole uptime
    pub fn bitrate(&self) -> u64 {
        let secs = self.uptime.as_secs();
        if secs > 0 {
            (self.bytes_relayed * 8) / secs
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_zeroed() {
        let snapshot = RelayStats::new().snapshot();
        assert_eq!(snapshot.bytes_relayed, 0);
        assert_eq!(snapshot.chunks_relayed, 0);
        assert_eq!(snapshot.reconnects, 0);
        assert_eq!(snapshot.consumers_attached, 0);
        assert_eq!(snapshot.consumers_dropped, 0);
    }

    #[test]
    fn test_record() {
        let stats = RelayStats::new();
        stats.record_chunk(1000);
        stats.record_chunk(500);
        stats.record_reconnect();
        stats.record_consumer_attached();
        stats.record_consumer_attached();
        stats.record_consumer_dropped();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.bytes_relayed, 1500);
        assert_eq!(snapshot.chunks_relayed, 2);
        assert_eq!(snapshot.reconnects, 1);
        assert_eq!(snapshot.consumers_attached, 2);
        assert_eq!(snapshot.consumers_dropped, 1);
    }

    #[test]
    fn test_bitrate() {
        let snapshot = RelayStatsSnapshot {
            bytes_relayed: 1_000_000,
            uptime: Duration::from_secs(10),
            ..Default::default()
        };

        // 1,000,000 bytes * 8 bits / 10 seconds = 800,000 bps
        assert_eq!(snapshot.bitrate(), 800_000);
    }

    #[test]
    fn test_bitrate_zero_uptime() {
        let snapshot = RelayStatsSnapshot {
            bytes_relayed: 1_000_000,
            ..Default::default()
        };
        assert_eq!(snapshot.bitrate(), 0);
    }
}
