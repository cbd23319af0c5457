//! Service lifecycle driver.
//!
//! Grounded in `p2p/service.py`'s `BaseService`: `run()` awaits the
//! service's body, treats `OperationCancelled` as a clean (not erroneous)
//! unwind, unconditionally runs cleanup, then signals `finished`; `cancel()`
//! triggers the token and waits on `finished` up to a timeout, logging
//! rather than blocking forever if it never arrives.

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::cancel::CancelToken;
use crate::error::ServiceError;

/// Configuration for a [`ServiceHandle`].
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    /// How long `cancel` waits for `finished` before giving up and logging.
    pub wait_until_finished_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            wait_until_finished_timeout: Duration::from_secs(5),
        }
    }
}

/// The unit of work a [`ServiceHandle`] drives. Implementors provide the
/// long-running body and any teardown; the handle provides the surrounding
/// lifecycle (cancellation, finished tracking, timeout-bounded shutdown).
#[async_trait::async_trait]
pub trait ServiceRuntime: Send + Sync {
    /// The service's main body. Must bind any spawned work to `token` so
    /// that cancellation actually propagates, and should return promptly
    /// (within one scheduling opportunity) once `token` fires.
    async fn run_body(&self, token: CancelToken) -> Result<(), ServiceError>;

    /// Runs unconditionally after `run_body` returns, success or failure.
    async fn cleanup(&self) {}
}

/// Drives a [`ServiceRuntime`] through its lifecycle: run, track
/// completion, and support externally-triggered, timeout-bounded
/// cancellation.
pub struct ServiceHandle<S> {
    service: Arc<S>,
    token: CancelToken,
    config: ServiceConfig,
    is_finished: Arc<AtomicBool>,
    finished: Arc<Notify>,
}

impl<S> ServiceHandle<S>
where
    S: ServiceRuntime + 'static,
{
    pub fn new(service: Arc<S>, token: CancelToken, config: ServiceConfig) -> Self {
        Self {
            service,
            token,
            config,
            is_finished: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(Notify::new()),
        }
    }

    /// Runs the service to completion. Logs an error for any failure other
    /// than cancellation, always runs cleanup, then invokes `on_finished`
    /// if supplied.
    pub async fn run(&self, on_finished: Option<OnFinished>) {
        let result = self.service.run_body(self.token.clone()).await;
        match &result {
            Ok(()) => {}
            Err(ServiceError::Cancelled) => info!("service cancelled"),
            Err(err) => error!(error = %err, "service run body failed"),
        }

        self.service.cleanup().await;

        self.is_finished.store(true, AtomicOrdering::SeqCst);
        self.finished.notify_waiters();

        if let Some(cb) = on_finished {
            cb();
        }
    }

    /// Triggers this service's token, then waits up to
    /// `config.wait_until_finished_timeout` for `run` to observe it and
    /// finish. Logs and returns on timeout rather than blocking forever.
    pub async fn cancel(&self) {
        self.token.trigger();
        let deadline = tokio::time::Instant::now() + self.config.wait_until_finished_timeout;
        loop {
            if self.is_finished.load(AtomicOrdering::SeqCst) {
                return;
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                warn!("service did not finish within the configured timeout");
                return;
            }
            tokio::select! {
                _ = self.finished.notified() => {}
                _ = tokio::time::sleep(deadline - now) => {}
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.is_finished.load(AtomicOrdering::SeqCst)
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

/// A one-shot callback invoked after a service finishes running.
pub type OnFinished = Box<dyn FnOnce() + Send>;
