//! Consumer entry and completion types
//!
//! This module defines the per-consumer state owned by the registry and the
//! future handed back to the caller that attached it.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::error::ConsumerError;

/// Writable destination of a consumer
pub type ConsumerSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Identifier assigned to a consumer at attach time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(pub u64);

impl std::fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "consumer-{}", self.0)
    }
}

/// Entry for a single attached consumer
pub struct ConsumerEntry {
    pub id: ConsumerId,

    sink: ConsumerSink,

    /// Consumer-scoped cancellation, independent of the relay's token
    cancel: CancellationToken,

    done: oneshot::Sender<Result<(), ConsumerError>>,

    /// When the consumer joined; reported when it is removed
    pub attached_at: Instant,

    /// Bytes delivered to this consumer so far
    pub bytes_written: u64,
}

impl ConsumerEntry {
    pub(super) fn new(
        id: ConsumerId,
        sink: ConsumerSink,
        cancel: CancellationToken,
    ) -> (Self, ConsumerCompletion) {
        let (done, rx) = oneshot::channel();

        let entry = Self {
            id,
            sink,
            cancel,
            done,
            attached_at: Instant::now(),
            bytes_written: 0,
        };

        (entry, ConsumerCompletion { id, rx })
    }

    /// Write one chunk, honoring the consumer's own cancellation
    pub(super) async fn write(
        &mut self,
        chunk: &[u8],
        timeout: Option<Duration>,
    ) -> Result<(), ConsumerError> {
        let ConsumerEntry { sink, cancel, .. } = &mut *self;

        if cancel.is_cancelled() {
            return Err(ConsumerError::Cancelled);
        }

        let delivery = async {
            sink.write_all(chunk).await?;
            sink.flush().await
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ConsumerError::Cancelled),
            result = with_timeout(delivery, timeout) => result,
        };
        result?;

        self.bytes_written += chunk.len() as u64;
        Ok(())
    }

    /// Resolve the completion future and release the sink
    pub(super) fn finish(self, result: Result<(), ConsumerError>) {
        // The caller may have dropped its completion future
        let _ = self.done.send(result);
    }
}

async fn with_timeout<F>(delivery: F, timeout: Option<Duration>) -> Result<(), ConsumerError>
where
    F: Future<Output = std::io::Result<()>>,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, delivery).await {
            Ok(result) => result.map_err(ConsumerError::from),
            Err(_) => Err(ConsumerError::TimedOut(limit)),
        },
        None => delivery.await.map_err(ConsumerError::from),
    }
}

/// Resolves when the consumer stops receiving data
///
/// `Ok(())` means the relay ended while the consumer was still attached;
/// an error means the consumer was removed on its own.
#[derive(Debug)]
pub struct ConsumerCompletion {
    id: ConsumerId,
    rx: oneshot::Receiver<Result<(), ConsumerError>>,
}

impl ConsumerCompletion {
    /// Id of the consumer this future belongs to
    pub fn id(&self) -> ConsumerId {
        self.id
    }
}

impl Future for ConsumerCompletion {
    type Output = Result<(), ConsumerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ConsumerError::RelayGone)),
            Poll::Pending => Poll::Pending,
        }
    }
}
