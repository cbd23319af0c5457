//! Drains the OTP's ready stream and writes headers to the external
//! database, in chain order.
//!
//! Grounded in `trinity/sync/light/chain.py`'s `_persist_headers`: get a
//! batch, `persist_chain`, log the new canonical head, then move on. The
//! OTP exposes no separate "ack" operation (spec.md §4.4); draining
//! `ready_tasks` is itself the acknowledgment, since a task is removed from
//! the ready queue the moment it is returned.

use std::sync::Arc;

use chainsync_core::{CancelToken, ServiceRuntime};
use tracing::info;

use crate::db::PersistentHeaderDB;
use crate::error::HeaderSyncError;
use crate::header::{BlockHash, Header};
use crate::worker::HEADERS_RECEIVED;

type HeaderOtp = chainsync_core::OrderedTaskPreparation<
    Header,
    BlockHash,
    &'static str,
    fn(&Header) -> BlockHash,
    fn(&Header) -> BlockHash,
>;

pub struct HeaderPersister<D> {
    otp: Arc<HeaderOtp>,
    db: Arc<D>,
}

impl<D> HeaderPersister<D>
where
    D: PersistentHeaderDB,
{
    pub fn new(otp: Arc<HeaderOtp>, db: Arc<D>) -> Self {
        Self { otp, db }
    }

    /// Drains one ready batch and persists it. Suspends until a batch is
    /// available.
    pub async fn persist_once(&self, token: &CancelToken) -> Result<usize, HeaderSyncError> {
        let headers = self.otp.ready_tasks(token).await?;
        let count = headers.len();
        self.db
            .persist_chain(headers)
            .await
            .map_err(HeaderSyncError::PersistFailed)?;
        let head = self.db.canonical_head().await;
        info!(head = head.number, hash = head.hash, "persisted headers");
        Ok(count)
    }
}

/// Runs [`HeaderPersister::persist_once`] in a loop until the token fires.
#[async_trait::async_trait]
impl<D> ServiceRuntime for HeaderPersister<D>
where
    D: PersistentHeaderDB + Send + Sync + 'static,
{
    async fn run_body(&self, token: CancelToken) -> Result<(), chainsync_core::error::ServiceError> {
        loop {
            match self.persist_once(&token).await {
                Ok(_) => {}
                Err(HeaderSyncError::Prepare(chainsync_core::error::PrepareError::Cancelled)) => {
                    return Err(chainsync_core::error::ServiceError::Cancelled);
                }
                Err(err) => return Err(chainsync_core::error::ServiceError::Failed(Box::new(err))),
            }
        }
    }
}
