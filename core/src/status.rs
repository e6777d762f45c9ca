//! Status Reporter
//!
//! A single-slot, last-write-wins notification. Pending statuses stay until they
//! are replaced; success and error statuses clear themselves after a delay.
//!
//! ```text
//!   publish(Pending)  ──▶ visible until replaced
//!   publish(Success)  ──▶ visible ──(success_clear)──▶ hidden
//!   publish(Error)    ──▶ visible ──(error_clear)────▶ hidden
//!
//!   every publish cancels the clear scheduled by the previous one
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use gridseal_config::StatusConfig;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusKind {
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub visible: bool,
    pub kind: StatusKind,
    pub message: String,
}

impl Status {
    pub fn hidden() -> Self {
        Self {
            visible: false,
            kind: StatusKind::Pending,
            message: String::new(),
        }
    }
}

/// A status change requested by an orchestrator transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub kind: StatusKind,
    pub message: String,
}

impl StatusUpdate {
    pub fn pending(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Pending,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            message: message.into(),
        }
    }
}

#[derive(Default)]
struct ClearState {
    generation: u64,
    scheduled: Option<CancellationToken>,
}

struct Inner {
    tx: watch::Sender<Status>,
    clear: Mutex<ClearState>,
}

impl Inner {
    fn clear_state(&self) -> MutexGuard<'_, ClearState> {
        self.clear.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct StatusReporter {
    inner: Arc<Inner>,
    success_clear: Duration,
    error_clear: Duration,
    shutdown: CancellationToken,
}

impl StatusReporter {
    pub fn new(config: &StatusConfig) -> Self {
        let (tx, _) = watch::channel(Status::hidden());
        Self {
            inner: Arc::new(Inner {
                tx,
                clear: Mutex::new(ClearState::default()),
            }),
            success_clear: Duration::from_millis(config.success_clear_ms),
            error_clear: Duration::from_millis(config.error_clear_ms),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn current(&self) -> Status {
        self.inner.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.inner.tx.subscribe()
    }

    pub fn pending(&self, message: impl Into<String>) {
        self.apply(StatusUpdate::pending(message));
    }

    pub fn success(&self, message: impl Into<String>) {
        self.apply(StatusUpdate::success(message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.apply(StatusUpdate::error(message));
    }

    /// Replace the current status.
    pub fn apply(&self, update: StatusUpdate) {
        let delay = match update.kind {
            StatusKind::Pending => None,
            StatusKind::Success => Some(self.success_clear),
            StatusKind::Error => Some(self.error_clear),
        };

        let mut state = self.inner.clear_state();
        state.generation += 1;
        if let Some(token) = state.scheduled.take() {
            token.cancel();
        }

        log::debug!("status {:?}: {}", update.kind, update.message);
        self.inner.tx.send_replace(Status {
            visible: true,
            kind: update.kind,
            message: update.message,
        });

        let Some(delay) = delay else {
            return;
        };
        if self.shutdown.is_cancelled() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::debug!("no runtime, status will not auto-clear");
            return;
        };

        let token = self.shutdown.child_token();
        state.scheduled = Some(token.clone());
        let generation = state.generation;
        let inner = Arc::clone(&self.inner);

        runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let mut state = inner.clear_state();
                    if state.generation == generation {
                        state.scheduled = None;
                        inner.tx.send_replace(Status::hidden());
                    }
                }
            }
        });
    }

    /// Hide the status now and drop any scheduled clear.
    pub fn clear(&self) {
        let mut state = self.inner.clear_state();
        state.generation += 1;
        if let Some(token) = state.scheduled.take() {
            token.cancel();
        }
        self.inner.tx.send_replace(Status::hidden());
    }

    /// Cancel every scheduled clear. Later terminal statuses no longer auto-clear.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for StatusReporter {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
