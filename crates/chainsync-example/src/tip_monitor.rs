//! Produces candidate header ranges to fetch, in place of a real chain tip
//! monitor's log-watching / head-guessing logic.
//!
//! Does not reproduce `ShardTracker.fetch_candidate_head`'s race between
//! new-log arrival and an in-progress guess (spec.md §9's Open Question):
//! this monitor runs single-threaded against one `Vec` of known ranges, so
//! there is no concurrent guess to race against. A monitor that actually
//! watches for new peer announcements concurrently with guessing the tip
//! would need to pick one of the two fixes the spec allows.

use std::sync::Arc;

use chainsync_core::{CancelToken, PrioritizedTaskQueue};

use crate::error::HeaderSyncError;
use crate::header::HeaderRange;

type RangeQueue = PrioritizedTaskQueue<HeaderRange, u64, fn(&HeaderRange) -> u64>;

/// Feeds a fixed list of candidate ranges into the PTQ, highest-priority
/// (lowest `start`) first.
pub struct FakeTipMonitor {
    queue: Arc<RangeQueue>,
}

impl FakeTipMonitor {
    pub fn new(queue: Arc<RangeQueue>) -> Self {
        Self { queue }
    }

    pub async fn announce(&self, ranges: Vec<HeaderRange>, token: &CancelToken) -> Result<(), HeaderSyncError> {
        self.queue.add(ranges, token).await?;
        Ok(())
    }
}

pub fn new_range_queue(maxsize: usize) -> RangeQueue {
    PrioritizedTaskQueue::new(
        chainsync_core::QueueConfig { maxsize },
        (|r: &HeaderRange| r.start) as fn(&HeaderRange) -> u64,
    )
}
