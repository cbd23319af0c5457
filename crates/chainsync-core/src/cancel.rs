//! Cooperative cancellation signal.
//!
//! Grounded in `p2p/service.py`'s `BaseService.cancel_token`: a token
//! wraps a `CancellationToken` of its own plus the set of parent tokens it
//! was `chain`ed from, so that `chain` is associative and firing any
//! ancestor trips the whole chain without spawning a background task per
//! link.

use std::future::Future;
use std::time::Duration;

use futures::future::{select_all, FutureExt};
use tokio_util::sync::CancellationToken;

use crate::error::CancelError;

/// A cooperative cancellation signal that can be chained from other tokens.
#[derive(Debug, Clone)]
pub struct CancelToken {
    own: CancellationToken,
    parents: Vec<CancellationToken>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Creates a fresh, untriggered token with no parents.
    pub fn new() -> Self {
        Self {
            own: CancellationToken::new(),
            parents: Vec::new(),
        }
    }

    /// Fires this token. Does not affect parents.
    pub fn trigger(&self) {
        self.own.cancel();
    }

    /// `true` if this token or any ancestor it was chained from has fired.
    pub fn triggered(&self) -> bool {
        self.own.is_cancelled() || self.parents.iter().any(CancellationToken::is_cancelled)
    }

    /// Resolves the first time this token or any ancestor fires.
    pub async fn cancelled(&self) {
        if self.triggered() {
            return;
        }
        let mut futs: Vec<_> = vec![self.own.cancelled().boxed()];
        futs.extend(self.parents.iter().map(|p| p.cancelled().boxed()));
        let _ = select_all(futs).await;
    }

    /// Produces a new token that fires when either `self` or `other` fires.
    ///
    /// The new token has its own fresh trigger and lists every ancestor of
    /// both `self` and `other` as a parent, so chaining stays associative
    /// without nested wrapper layers.
    pub fn chain(&self, other: &CancelToken) -> CancelToken {
        let mut parents = Vec::with_capacity(2 + self.parents.len() + other.parents.len());
        parents.push(self.own.clone());
        parents.extend(self.parents.iter().cloned());
        parents.push(other.own.clone());
        parents.extend(other.parents.iter().cloned());
        CancelToken {
            own: CancellationToken::new(),
            parents,
        }
    }

    /// Races `fut` against this token, returning the future's result if it
    /// wins, or [`CancelError::OperationCancelled`] if the token fires
    /// first.
    pub async fn wait<F: Future>(&self, fut: F) -> Result<F::Output, CancelError> {
        tokio::select! {
            result = fut => Ok(result),
            _ = self.cancelled() => Err(CancelError::OperationCancelled),
        }
    }

    /// Like [`CancelToken::wait`], but also fails with
    /// [`CancelError::Timeout`] if `timeout` elapses first.
    pub async fn wait_with<F: Future>(
        &self,
        fut: F,
        timeout: Duration,
    ) -> Result<F::Output, CancelError> {
        tokio::select! {
            result = fut => Ok(result),
            _ = self.cancelled() => Err(CancelError::OperationCancelled),
            _ = tokio::time::sleep(timeout) => Err(CancelError::Timeout),
        }
    }
}
