//! Checks out candidate header ranges from the PTQ, fetches them from a
//! peer via a [`RequestResponseManager`], and feeds successfully fetched
//! headers into an [`OrderedTaskPreparation`] keyed by parent hash.

use std::sync::Arc;

use chainsync_core::{
    CancelToken, OrderedTaskPreparation, PrioritizedTaskQueue, RequestResponseManager, ServiceRuntime,
};
use tracing::{debug, warn};

use crate::error::HeaderSyncError;
use crate::header::{BlockHash, GetBlockHeaders, Header, HeaderRange};

/// The prerequisite kind every header task declares: exactly one, "the
/// header itself has been received".
pub const HEADERS_RECEIVED: &str = "headers_received";

type RangeQueue = PrioritizedTaskQueue<HeaderRange, u64, fn(&HeaderRange) -> u64>;
type HeaderOtp = OrderedTaskPreparation<
    Header,
    BlockHash,
    &'static str,
    fn(&Header) -> BlockHash,
    fn(&Header) -> BlockHash,
>;

pub fn new_header_otp(max_depth: u64) -> HeaderOtp {
    OrderedTaskPreparation::new(
        chainsync_core::PrepareConfig::new([HEADERS_RECEIVED].into_iter().collect())
            .with_max_depth(max_depth),
        (|h: &Header| h.hash) as fn(&Header) -> BlockHash,
        (|h: &Header| h.parent_hash) as fn(&Header) -> BlockHash,
    )
}

/// Dispatches `GetBlockHeaders` for checked-out ranges and hands successful
/// responses to the OTP. Ranges whose fetch fails are left off the
/// completed list, so the PTQ abandons them for another peer to retry.
pub struct HeaderFetchWorker<P: chainsync_core::Peer<GetBlockHeaders>> {
    ranges: Arc<RangeQueue>,
    otp: Arc<HeaderOtp>,
    manager: Arc<RequestResponseManager<P, GetBlockHeaders, Vec<Header>>>,
}

impl<P> HeaderFetchWorker<P>
where
    P: chainsync_core::Peer<GetBlockHeaders>,
{
    pub fn new(
        ranges: Arc<RangeQueue>,
        otp: Arc<HeaderOtp>,
        manager: Arc<RequestResponseManager<P, GetBlockHeaders, Vec<Header>>>,
    ) -> Self {
        Self { ranges, otp, manager }
    }

    /// Checks out one batch, fetches each range, and registers fetched
    /// headers with the OTP. Returns the number of ranges that succeeded.
    pub async fn run_once(&self, token: &CancelToken) -> Result<usize, HeaderSyncError> {
        let (batch_id, ranges) = self.ranges.get(None, token).await?;
        let mut completed = Vec::new();

        for range in ranges {
            match self.manager.call(GetBlockHeaders { range: range.clone() }, token).await {
                Ok(headers) => {
                    if let Err(err) = self.otp.register_tasks(headers.clone()).await {
                        warn!(?err, ?range, "failed to register fetched headers with OTP");
                        continue;
                    }
                    let ids = headers.iter().map(|h| h.hash).collect();
                    self.otp.finish_prereq(HEADERS_RECEIVED, ids).await?;
                    completed.push(range);
                }
                Err(err) => {
                    debug!(?err, ?range, "header fetch failed, leaving range for retry");
                }
            }
        }

        let count = completed.len();
        self.ranges.complete(batch_id, completed).await?;
        Ok(count)
    }
}

/// Runs [`HeaderFetchWorker::run_once`] in a loop bound to the service's
/// token, so it can be driven through a [`chainsync_core::ServiceHandle`]
/// alongside the tip monitor and persister.
#[async_trait::async_trait]
impl<P> ServiceRuntime for HeaderFetchWorker<P>
where
    P: chainsync_core::Peer<GetBlockHeaders> + Send + Sync + 'static,
{
    async fn run_body(&self, token: CancelToken) -> Result<(), chainsync_core::error::ServiceError> {
        loop {
            match self.run_once(&token).await {
                Ok(_) => {}
                Err(HeaderSyncError::Queue(chainsync_core::error::QueueError::Cancelled))
                | Err(HeaderSyncError::RequestResponse(
                    chainsync_core::error::RequestResponseError::Cancelled,
                )) => return Err(chainsync_core::error::ServiceError::Cancelled),
                Err(err) => {
                    return Err(chainsync_core::error::ServiceError::Failed(Box::new(err)));
                }
            }
        }
    }
}
