//! Error taxonomy for the chain sync core primitives.
//!
//! Each component gets its own error enum rather than one shared type, so
//! that a contract violation in the queue can never be confused for a
//! timeout in the request/response manager. See the propagation policy in
//! the top-level spec: contract violations propagate unchanged, transient
//! errors are recoverable by retry, and cancellation is never logged as an
//! error.

use thiserror::Error;

/// Errors returned by [`crate::queue::PrioritizedTaskQueue`].
#[derive(Debug, Error)]
pub enum QueueError {
    /// A task already present in the queue was submitted again via `add`.
    #[error("duplicate task: already present in the queue")]
    DuplicateTask,

    /// `complete` was called with a batch id that is not currently in-flight.
    #[error("unknown batch id {0:?}")]
    UnknownBatch(crate::queue::BatchId),

    /// `complete` was called with tasks that were not part of the batch.
    #[error("{0} task(s) in `completed` were not part of the batch")]
    UnknownTasks(usize),

    /// The injected order function produced a key that does not compare
    /// reflexively to itself (`k == k`, not `k < k`, not `k > k`).
    #[error("order function produced a non-reflexive priority key")]
    InvalidOrdering,

    /// The queue is empty and `get_nowait` was called.
    #[error("no tasks are available")]
    Empty,

    /// A suspended call observed a triggered [`crate::cancel::CancelToken`].
    #[error("operation cancelled")]
    Cancelled,
}

/// Errors returned by [`crate::prereq::PrerequisiteSet`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PrereqError {
    /// `finish` was called with a kind that was never declared.
    #[error("prerequisite kind was not declared for this task")]
    UnknownPrereq,

    /// `finish` was called twice for the same kind.
    #[error("prerequisite kind was already finished")]
    AlreadyFinished,
}

/// Errors returned by [`crate::prepare::OrderedTaskPreparation`].
#[derive(Debug, Error)]
pub enum PrepareError {
    /// `set_finished_dependency` was called more than once, or after
    /// `register_tasks`.
    #[error("the seed dependency was already primed")]
    AlreadyPrimed,

    /// `register_tasks` referenced a dependency id that is not known.
    #[error("dependency is not a known task")]
    UnknownDependency,

    /// An operation referenced a task id that is not known.
    #[error("task id is not known")]
    UnknownTask,

    /// Propagated from the task's [`PrerequisiteSet`](crate::prereq::PrerequisiteSet).
    #[error(transparent)]
    Prereq(#[from] PrereqError),

    /// A suspended call observed a triggered [`crate::cancel::CancelToken`].
    #[error("operation cancelled")]
    Cancelled,
}

/// Errors surfaced by [`crate::cancel::CancelToken`] and its combinators.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CancelError {
    /// The token fired before the awaited future completed.
    #[error("operation cancelled")]
    OperationCancelled,

    /// The configured timeout elapsed before the awaited future completed.
    #[error("operation timed out")]
    Timeout,
}

/// Errors returned by [`crate::request_response::RequestResponseManager`].
#[derive(Debug, Error)]
pub enum RequestResponseError {
    /// A second request was issued while one was still pending.
    #[error("a request is already in flight for this peer/message class")]
    AlreadyWaiting,

    /// `response_timeout` elapsed before a valid response arrived.
    #[error("timed out waiting for a response")]
    Timeout,

    /// The awaited response observed a triggered [`crate::cancel::CancelToken`].
    #[error("operation cancelled")]
    Cancelled,

    /// The peer's `send` failed.
    #[error("failed to send request to peer: {0}")]
    PeerSendFailed(String),
}

/// Errors returned by a [`crate::runtime::ServiceRuntime`] implementation's
/// `run_body`.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service observed a triggered [`crate::cancel::CancelToken`] and
    /// unwound cleanly.
    #[error("operation cancelled")]
    Cancelled,

    /// The service's run body failed for a reason of its own.
    #[error("service failed: {0}")]
    Failed(#[source] Box<dyn std::error::Error + Send + Sync>),
}
