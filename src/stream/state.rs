//! Stream lifecycle state machine
//!
//! Tracks a relay instance from construction to full shutdown. Phases only
//! move forward: `Idle → Opening → Streaming → Closing → Closed`.

use std::future::IntoFuture;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use tokio::sync::watch;

use crate::error::{Error, Result};

/// Lifecycle phase of a live stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StreamPhase {
    /// Constructed, not opened yet
    Idle,
    /// Relay started, waiting for the first bytes
    Opening,
    /// First bytes persisted, relaying
    Streaming,
    /// Cancellation requested or relay failed, teardown in progress
    Closing,
    /// Background activity has fully exited
    Closed,
}

/// What `close()` has to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseAction {
    /// The relay is running and must be cancelled
    Cancel,
    /// Nothing was ever started; the stream is closed on the spot
    NeverOpened,
    /// Someone else already closed it
    AlreadyClosing,
}

/// Shared phase plus the overall-completion signal
#[derive(Debug)]
pub(crate) struct StreamLifecycle {
    phase: Mutex<StreamPhase>,
    done: watch::Sender<bool>,
}

impl StreamLifecycle {
    pub fn new() -> Self {
        let (done, _) = watch::channel(false);
        Self {
            phase: Mutex::new(StreamPhase::Idle),
            done,
        }
    }

    pub fn phase(&self) -> StreamPhase {
        *self.lock()
    }

    /// `Idle → Opening`
    pub fn begin_open(&self) -> Result<()> {
        let mut phase = self.lock();
        if *phase != StreamPhase::Idle {
            return Err(Error::InvalidState(*phase));
        }
        *phase = StreamPhase::Opening;
        Ok(())
    }

    /// `Opening → Streaming`; no-op if a close got in first
    pub fn mark_streaming(&self) {
        let mut phase = self.lock();
        if *phase == StreamPhase::Opening {
            *phase = StreamPhase::Streaming;
        }
    }

    /// `Opening → Closing` after the relay failed to become ready
    pub fn mark_failed(&self) {
        let mut phase = self.lock();
        if *phase == StreamPhase::Opening {
            *phase = StreamPhase::Closing;
        }
    }

    pub fn begin_close(&self) -> CloseAction {
        let mut phase = self.lock();
        match *phase {
            StreamPhase::Idle => {
                *phase = StreamPhase::Closed;
                CloseAction::NeverOpened
            }
            StreamPhase::Opening | StreamPhase::Streaming => {
                *phase = StreamPhase::Closing;
                CloseAction::Cancel
            }
            StreamPhase::Closing | StreamPhase::Closed => CloseAction::AlreadyClosing,
        }
    }

    /// Enter `Closed` and resolve the completion signal
    pub fn finish(&self) {
        *self.lock() = StreamPhase::Closed;
        self.done.send_replace(true);
    }

    pub fn completion(&self) -> Completion {
        Completion {
            rx: self.done.subscribe(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StreamPhase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolves once the relay has fully shut down, cleanup included
///
/// Every clone observes the same signal, so concurrent `close()` callers
/// all see the same outcome.
#[derive(Debug, Clone)]
pub struct Completion {
    rx: watch::Receiver<bool>,
}

impl Completion {
    /// Whether shutdown has already completed
    pub fn is_complete(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for shutdown to complete
    pub async fn wait(mut self) {
        // A dropped sender means the lifecycle is gone, which is as done as it gets
        let _ = self.rx.wait_for(|done| *done).await;
    }
}

impl IntoFuture for Completion {
    type Output = ();
    type IntoFuture = BoxFuture<'static, ()>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}
