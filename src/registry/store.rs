//! Consumer registry implementation
//!
//! Holds every attached consumer and delivers chunks to them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use crate::stats::RelayStats;

use super::entry::{ConsumerCompletion, ConsumerEntry, ConsumerId};
use super::error::ConsumerError;

struct RegistryState {
    entries: Vec<ConsumerEntry>,
    next_id: u64,
    /// Set once the relay has terminated; later attaches resolve at once
    closed: bool,
}

/// Registry of live consumers
///
/// The lock is only held to push, take or merge entries, never across a
/// write. A fan-out pass takes the entries out, writes to them, and merges
/// the survivors back ahead of anything attached in the meantime. A
/// consumer is therefore either part of a whole pass or not part of it at
/// all, and attaching never waits on a slow consumer.
pub struct ConsumerRegistry {
    state: Mutex<RegistryState>,

    /// Attached consumers, including those taken out for an in-flight pass
    active: AtomicUsize,

    write_timeout: Option<Duration>,

    stats: Arc<RelayStats>,
}

impl ConsumerRegistry {
    /// Create an empty registry reporting into `stats`
    pub fn new(stats: Arc<RelayStats>) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                entries: Vec::new(),
                next_id: 1,
                closed: false,
            }),
            active: AtomicUsize::new(0),
            write_timeout: None,
            stats,
        }
    }

    /// Bound every consumer write by `timeout`
    pub fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Attach a consumer
    ///
    /// The returned future resolves once the consumer stops receiving data.
    /// If the relay has already ended it resolves immediately with `Ok(())`.
    pub fn attach<W>(&self, sink: W, cancel: CancellationToken) -> ConsumerCompletion
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let mut state = self.lock();

        let id = ConsumerId(state.next_id);
        state.next_id += 1;

        let (entry, completion) = ConsumerEntry::new(id, Box::new(sink), cancel);

        if state.closed {
            tracing::debug!(consumer = %id, "Consumer attached after relay ended");
            entry.finish(Ok(()));
            return completion;
        }

        state.entries.push(entry);
        self.active.fetch_add(1, Ordering::Relaxed);
        self.stats.record_consumer_attached();

        tracing::info!(
            consumer = %id,
            consumers = self.consumer_count(),
            "Consumer attached"
        );

        completion
    }

    /// Write `chunk` to every attached consumer
    ///
    /// A failing consumer is removed and its completion resolved with the
    /// error; the others are unaffected. If `cancel` fires mid-pass, the
    /// write in flight is abandoned and the remaining consumers are skipped.
    /// All of them stay registered until `finish_all`.
    ///
    /// Returns the number of consumers that received the chunk.
    pub async fn fan_out(&self, chunk: &[u8], cancel: &CancellationToken) -> usize {
        let taken = std::mem::take(&mut self.lock().entries);
        if taken.is_empty() {
            return 0;
        }

        let mut survivors = Vec::with_capacity(taken.len());
        let mut delivered = 0;
        let mut pending = taken.into_iter();

        for mut entry in pending.by_ref() {
            // A stalled sink must not hold the relay past its cancellation
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = entry.write(chunk, self.write_timeout) => Some(result),
            };

            match outcome {
                None => {
                    survivors.push(entry);
                    break;
                }
                Some(Ok(())) => {
                    delivered += 1;
                    survivors.push(entry);
                }
                Some(Err(e)) => self.remove(entry, e),
            }
        }
        survivors.extend(pending);

        let mut state = self.lock();
        survivors.append(&mut state.entries);
        state.entries = survivors;

        delivered
    }

    /// Resolve every remaining consumer with `Ok(())` and refuse new ones
    pub fn finish_all(&self) {
        let entries = {
            let mut state = self.lock();
            state.closed = true;
            std::mem::take(&mut state.entries)
        };

        if !entries.is_empty() {
            tracing::debug!(consumers = entries.len(), "Releasing consumers");
        }

        for entry in entries {
            self.active.fetch_sub(1, Ordering::Relaxed);
            entry.finish(Ok(()));
        }
    }

    /// Number of attached consumers
    pub fn consumer_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, entry: ConsumerEntry, error: ConsumerError) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        self.stats.record_consumer_dropped();

        match error {
            ConsumerError::Cancelled => tracing::debug!(
                consumer = %entry.id,
                attached_for = ?entry.attached_at.elapsed(),
                "Consumer cancelled, removing"
            ),
            ref e => tracing::warn!(
                consumer = %entry.id,
                bytes_written = entry.bytes_written,
                attached_for = ?entry.attached_at.elapsed(),
                error = %e,
                "Consumer write failed, removing"
            ),
        }

        entry.finish(Err(error));
    }
}

impl Default for ConsumerRegistry {
    fn default() -> Self {
        Self::new(Arc::new(RelayStats::new()))
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tokio::io::{AsyncReadExt, DuplexStream};

    use super::*;

    /// Sink that accepts nothing and never errors
    struct StalledSink;

    impl AsyncWrite for StalledSink {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Pending
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Pending
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    async fn read_n(reader: &mut DuplexStream, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        reader.read_exact(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_fan_out_to_all() {
        let registry = ConsumerRegistry::default();
        let cancel = CancellationToken::new();

        let (w1, mut r1) = tokio::io::duplex(1024);
        let (w2, mut r2) = tokio::io::duplex(1024);
        let _c1 = registry.attach(w1, CancellationToken::new());
        let _c2 = registry.attach(w2, CancellationToken::new());
        assert_eq!(registry.consumer_count(), 2);

        assert_eq!(registry.fan_out(b"chunk-1", &cancel).await, 2);
        assert_eq!(registry.fan_out(b"chunk-2", &cancel).await, 2);

        assert_eq!(read_n(&mut r1, 14).await, b"chunk-1chunk-2");
        assert_eq!(read_n(&mut r2, 14).await, b"chunk-1chunk-2");
    }

    #[tokio::test]
    async fn test_failing_consumer_isolated() {
        let stats = Arc::new(RelayStats::new());
        let registry = ConsumerRegistry::new(Arc::clone(&stats));
        let cancel = CancellationToken::new();

        let (healthy, mut healthy_rx) = tokio::io::duplex(1024);
        let (broken, broken_rx) = tokio::io::duplex(1024);
        drop(broken_rx);

        let healthy_done = registry.attach(healthy, CancellationToken::new());
        let broken_done = registry.attach(broken, CancellationToken::new());

        assert_eq!(registry.fan_out(b"abc", &cancel).await, 1);
        assert!(matches!(broken_done.await, Err(ConsumerError::Write(_))));
        assert_eq!(registry.consumer_count(), 1);
        assert_eq!(stats.snapshot().consumers_dropped, 1);

        assert_eq!(registry.fan_out(b"def", &cancel).await, 1);
        assert_eq!(read_n(&mut healthy_rx, 6).await, b"abcdef");

        registry.finish_all();
        assert!(healthy_done.await.is_ok());
    }

    #[tokio::test]
    async fn test_scripted_consumer_failure() {
        let registry = ConsumerRegistry::default();
        let cancel = CancellationToken::new();

        let player = tokio_test::io::Builder::new()
            .write(b"first")
            .write_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "player went away",
            ))
            .build();
        let done = registry.attach(player, CancellationToken::new());

        assert_eq!(registry.fan_out(b"first", &cancel).await, 1);
        assert_eq!(registry.fan_out(b"second", &cancel).await, 0);

        match done.await {
            Err(ConsumerError::Write(e)) => assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe),
            other => panic!("unexpected completion: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_consumer_removed() {
        let registry = ConsumerRegistry::default();
        let consumer_cancel = CancellationToken::new();

        let (writer, _reader) = tokio::io::duplex(1024);
        let done = registry.attach(writer, consumer_cancel.clone());

        consumer_cancel.cancel();
        assert_eq!(registry.fan_out(b"abc", &CancellationToken::new()).await, 0);

        assert!(matches!(done.await, Err(ConsumerError::Cancelled)));
        assert_eq!(registry.consumer_count(), 0);
    }

    #[tokio::test]
    async fn test_relay_cancel_skips_but_keeps_consumers() {
        let registry = ConsumerRegistry::default();
        let relay_cancel = CancellationToken::new();

        let (writer, _reader) = tokio::io::duplex(1024);
        let _done = registry.attach(writer, CancellationToken::new());

        relay_cancel.cancel();
        assert_eq!(registry.fan_out(b"abc", &relay_cancel).await, 0);
        assert_eq!(registry.consumer_count(), 1);
    }

    #[tokio::test]
    async fn test_relay_cancel_releases_stalled_consumer() {
        let registry = Arc::new(ConsumerRegistry::default());
        let relay_cancel = CancellationToken::new();

        let stalled = registry.attach(StalledSink, CancellationToken::new());
        let (writer, _reader) = tokio::io::duplex(1024);
        let _behind = registry.attach(writer, CancellationToken::new());

        let pass = tokio::spawn({
            let registry = Arc::clone(&registry);
            let relay_cancel = relay_cancel.clone();
            async move { registry.fan_out(b"abc", &relay_cancel).await }
        });

        tokio::task::yield_now().await;
        relay_cancel.cancel();

        let delivered = tokio::time::timeout(Duration::from_secs(3), pass)
            .await
            .expect("fan-out ignored relay cancellation")
            .unwrap();
        assert_eq!(delivered, 0);
        assert_eq!(registry.consumer_count(), 2);

        registry.finish_all();
        assert!(stalled.await.is_ok());
        assert_eq!(registry.consumer_count(), 0);
    }

    #[tokio::test]
    async fn test_attach_during_pass_waits_for_next_chunk() {
        let registry = Arc::new(ConsumerRegistry::default());
        let cancel = CancellationToken::new();

        // Room for half a chunk, so the pass parks on this consumer
        let (slow, mut slow_rx) = tokio::io::duplex(4);
        let _slow_done = registry.attach(slow, CancellationToken::new());

        let pass = tokio::spawn({
            let registry = Arc::clone(&registry);
            let cancel = cancel.clone();
            async move { registry.fan_out(b"chunk-01", &cancel).await }
        });

        // Bytes only flow once the pass has taken the entries out
        assert_eq!(read_n(&mut slow_rx, 1).await, b"c");

        let (late, mut late_rx) = tokio::io::duplex(1024);
        let _late_done = registry.attach(late, CancellationToken::new());
        assert_eq!(registry.consumer_count(), 2);

        assert_eq!(read_n(&mut slow_rx, 7).await, b"hunk-01");
        assert_eq!(pass.await.unwrap(), 1);
        assert_eq!(registry.consumer_count(), 2);

        assert_eq!(registry.fan_out(b"next", &cancel).await, 2);
        assert_eq!(read_n(&mut slow_rx, 4).await, b"next");
        assert_eq!(read_n(&mut late_rx, 4).await, b"next");

        registry.finish_all();
        let mut rest = Vec::new();
        late_rx.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_attach_after_finish() {
        let registry = ConsumerRegistry::default();
        registry.finish_all();

        let (writer, _reader) = tokio::io::duplex(1024);
        let done = registry.attach(writer, CancellationToken::new());

        assert!(done.await.is_ok());
        assert_eq!(registry.consumer_count(), 0);
    }

    #[tokio::test]
    async fn test_attach_order_preserved() {
        let registry = ConsumerRegistry::default();
        let cancel = CancellationToken::new();

        let mut readers = Vec::new();
        let mut completions = Vec::new();
        for _ in 0..3 {
            let (writer, reader) = tokio::io::duplex(1024);
            completions.push(registry.attach(writer, CancellationToken::new()));
            readers.push(reader);
        }

        let ids: Vec<ConsumerId> = completions.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec![ConsumerId(1), ConsumerId(2), ConsumerId(3)]);

        assert_eq!(registry.fan_out(b"x", &cancel).await, 3);
        for reader in readers.iter_mut() {
            assert_eq!(read_n(reader, 1).await, b"x");
        }
    }
}
