//! One-shot readiness gate
//!
//! Resolves once: "ready" when the primary buffer received its first bytes,
//! or "failed" when the relay could not produce any. Two producers race to
//! resolve it, the engine after its first write and a poller watching for
//! the temp buffer on disk. The first one wins; later calls are no-ops.
//!
//! The engine spawns the poller and then resolves on the same turn, so with
//! the engine driving the gate the poller normally finds it resolved and
//! exits. It only resolves a gate that something else left pending.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Producer side of the readiness gate
#[derive(Debug)]
pub struct Readiness {
    resolved: AtomicBool,
    tx: Mutex<Option<oneshot::Sender<Result<()>>>>,
}

/// Consumer side of the readiness gate
#[derive(Debug)]
pub struct ReadinessWaiter {
    rx: oneshot::Receiver<Result<()>>,
}

impl Readiness {
    /// Create a gate and the waiter that observes it
    pub fn new() -> (Arc<Self>, ReadinessWaiter) {
        let (tx, rx) = oneshot::channel();
        let readiness = Arc::new(Self {
            resolved: AtomicBool::new(false),
            tx: Mutex::new(Some(tx)),
        });

        (readiness, ReadinessWaiter { rx })
    }

    /// Whether the gate has been resolved either way
    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    /// Resolve as ready; returns false if already resolved
    pub fn resolve(&self) -> bool {
        self.complete(Ok(()))
    }

    /// Resolve as failed; returns false if already resolved
    pub fn fail(&self, error: Error) -> bool {
        self.complete(Err(error))
    }

    fn complete(&self, result: Result<()>) -> bool {
        if self
            .resolved
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let tx = self
            .tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(tx) = tx {
            // Nobody may be waiting any more; that is fine
            let _ = tx.send(result);
        }
        true
    }
}

impl ReadinessWaiter {
    /// Wait for the gate to resolve
    pub async fn wait(self) -> Result<()> {
        self.rx.await.unwrap_or(Err(Error::RelayEnded))
    }
}

/// Resolve `readiness` as soon as `path` exists on disk
///
/// Stops without resolving when `cancel` fires first.
pub fn spawn_existence_poller(
    readiness: Arc<Readiness>,
    path: PathBuf,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if readiness.is_resolved() {
                return;
            }

            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                if readiness.resolve() {
                    tracing::debug!(path = %path.display(), "Readiness resolved by file poller");
                }
                return;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolves_once() {
        let (readiness, waiter) = Readiness::new();

        assert!(!readiness.is_resolved());
        assert!(readiness.resolve());
        assert!(!readiness.resolve());
        assert!(!readiness.fail(Error::Cancelled));
        assert!(readiness.is_resolved());

        assert!(waiter.wait().await.is_ok());
    }

    #[tokio::test]
    async fn test_fail_first_wins() {
        let (readiness, waiter) = Readiness::new();

        assert!(readiness.fail(Error::Status(404)));
        assert!(!readiness.resolve());

        assert!(matches!(waiter.wait().await, Err(Error::Status(404))));
    }

    #[tokio::test]
    async fn test_dropped_without_resolving() {
        let (readiness, waiter) = Readiness::new();
        drop(readiness);

        assert!(matches!(waiter.wait().await, Err(Error::RelayEnded)));
    }

    #[tokio::test]
    async fn test_poller_resolves_when_file_appears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.ts");
        let (readiness, waiter) = Readiness::new();

        let poller = spawn_existence_poller(
            Arc::clone(&readiness),
            path.clone(),
            Duration::from_millis(5),
            CancellationToken::new(),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!readiness.is_resolved());

        std::fs::write(&path, b"x").unwrap();
        poller.await.unwrap();

        assert!(waiter.wait().await.is_ok());
    }

    #[tokio::test]
    async fn test_poller_exits_when_engine_resolved_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.ts");
        std::fs::write(&path, b"x").unwrap();
        let (readiness, waiter) = Readiness::new();

        let poller = spawn_existence_poller(
            Arc::clone(&readiness),
            path,
            Duration::from_millis(5),
            CancellationToken::new(),
        );
        assert!(readiness.resolve());

        tokio::time::timeout(Duration::from_secs(1), poller)
            .await
            .unwrap()
            .unwrap();
        assert!(waiter.wait().await.is_ok());
    }

    #[tokio::test]
    async fn test_poller_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let (readiness, _waiter) = Readiness::new();
        let cancel = CancellationToken::new();

        let poller = spawn_existence_poller(
            Arc::clone(&readiness),
            dir.path().join("never.ts"),
            Duration::from_millis(5),
            cancel.clone(),
        );

        cancel.cancel();
        poller.await.unwrap();

        assert!(!readiness.is_resolved());
    }
}
