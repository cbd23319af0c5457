//! Core synchronization and task-ordering primitives for an Ethereum-style
//! chain sync: a prioritized task queue and dependency-ordered task
//! preparation, plus the cancellation, service lifecycle, and
//! request/response scaffolding they're built on.
//!
//! This crate is deliberately narrow: it owns no wire format, no
//! persistence, and no concrete peer transport. Collaborators plug in
//! through the [`Clock`] trait and the traits exposed by
//! [`request_response`] and [`runtime`].

pub mod cancel;
pub mod clock;
pub mod error;
pub mod prepare;
pub mod prereq;
pub mod queue;
pub mod request_response;
pub mod runtime;
pub mod task;

pub use cancel::CancelToken;
pub use clock::{Clock, TokioClock};
pub use prepare::{OrderedTaskPreparation, PrepareConfig};
pub use prereq::PrerequisiteSet;
pub use queue::{BatchId, PrioritizedTaskQueue, QueueConfig};
pub use request_response::{Peer, RequestResponseConfig, RequestResponseManager};
pub use runtime::{OnFinished, ServiceConfig, ServiceHandle, ServiceRuntime};
pub use task::{SortableTask, SortableTaskFactory};
