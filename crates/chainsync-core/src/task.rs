//! Adapts arbitrary task values to a total order via an injected key
//! function, so they can live inside a [`std::collections::BinaryHeap`].
//!
//! Construction is bind-then-construct: a [`SortableTaskFactory`] is built
//! once from the order function, and every [`SortableTask`] it produces
//! shares that one ordering discipline. This mirrors a queue-per-flavor
//! design where a single `order_fn` is bound before any task is wrapped,
//! rather than each task carrying its own notion of how to compare itself.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::error::QueueError;

/// Produces [`SortableTask`]s for one priority discipline.
///
/// Cloning a factory shares the same sequence counter, so clones still
/// break ties FIFO relative to each other.
pub struct SortableTaskFactory<T, K, F> {
    order_fn: Arc<F>,
    sequence: Arc<AtomicU64>,
    _marker: std::marker::PhantomData<fn(&T) -> K>,
}

impl<T, K, F> Clone for SortableTaskFactory<T, K, F> {
    fn clone(&self) -> Self {
        Self {
            order_fn: self.order_fn.clone(),
            sequence: self.sequence.clone(),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T, K, F> SortableTaskFactory<T, K, F>
where
    K: PartialOrd,
    F: Fn(&T) -> K,
{
    pub fn new(order_fn: F) -> Self {
        Self {
            order_fn: Arc::new(order_fn),
            sequence: Arc::new(AtomicU64::new(0)),
            _marker: std::marker::PhantomData,
        }
    }

    /// Wraps a task, computing and validating its priority key.
    ///
    /// Fails with [`QueueError::InvalidOrdering`] if the key does not
    /// compare reflexively to itself -- the classic example being a `NaN`
    /// smuggled into an otherwise numeric key.
    pub fn wrap(&self, task: T) -> Result<SortableTask<T, K>, QueueError> {
        let key = (self.order_fn)(&task);
        let self_equal = key == key;
        let self_lt = key < key;
        let self_gt = key > key;
        if !self_equal || self_lt || self_gt {
            return Err(QueueError::InvalidOrdering);
        }
        let seq = self.sequence.fetch_add(1, AtomicOrdering::Relaxed);
        Ok(SortableTask { task, key, seq })
    }
}

/// A task paired with its precomputed priority key and insertion sequence.
///
/// Ordering delegates to the key; ties are broken by insertion sequence so
/// that equal-priority tasks come out FIFO. Equality compares keys only.
pub struct SortableTask<T, K> {
    task: T,
    key: K,
    seq: u64,
}

impl<T, K> SortableTask<T, K> {
    /// Consumes the wrapper, returning the original task.
    pub fn into_inner(self) -> T {
        self.task
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<T, K: PartialEq> PartialEq for SortableTask<T, K> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T, K: PartialEq> Eq for SortableTask<T, K> {}

impl<T, K: Ord> PartialOrd for SortableTask<T, K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, K: Ord> Ord for SortableTask<T, K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key).then_with(|| self.seq.cmp(&other.seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_and_orders_by_key() {
        let factory = SortableTaskFactory::new(|t: &i32| *t);
        let a = factory.wrap(5).unwrap();
        let b = factory.wrap(1).unwrap();
        assert!(b < a);
        assert_eq!(*a.task(), 5);
    }

    #[test]
    fn ties_break_fifo_by_insertion_sequence() {
        let factory = SortableTaskFactory::new(|_: &&str| 0);
        let first = factory.wrap("first").unwrap();
        let second = factory.wrap("second").unwrap();
        // Equal keys: sorts ascending by insertion sequence, so a queue
        // wrapping this in `Reverse` for a min-first heap pops `first`
        // before `second` -- FIFO among equal priorities.
        assert!(first < second);
    }

    #[test]
    fn rejects_nan_like_keys() {
        let factory = SortableTaskFactory::new(|t: &f64| *t);
        let err = factory.wrap(f64::NAN).unwrap_err();
        assert!(matches!(err, QueueError::InvalidOrdering));
    }

    #[test]
    fn equality_compares_keys_only() {
        let factory = SortableTaskFactory::new(|t: &(i32, &'static str)| t.0);
        let a = factory.wrap((1, "a")).unwrap();
        let b = factory.wrap((1, "b")).unwrap();
        assert_eq!(a, b);
    }
}
