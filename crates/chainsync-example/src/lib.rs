//! Illustrative header sync loop: a reference composition of
//! [`chainsync_core`]'s primitives, grounded in
//! `trinity/sync/light/chain.py`'s `LightChainSyncer`.
//!
//! - A [`FakeTipMonitor`] produces candidate header ranges into a PTQ.
//! - A [`HeaderFetchWorker`] checks out a batch, dispatches
//!   `GetBlockHeaders` via a [`chainsync_core::RequestResponseManager`] per
//!   peer, and either completes the batch or lets it abandon for another
//!   peer to retry.
//! - Fetched headers feed an OTP whose prerequisite is "headers received"
//!   and whose dependency is the parent hash, so `ready_tasks` yields
//!   headers in chain order.
//! - A [`HeaderPersister`] drains `ready_tasks` and writes to an external
//!   [`PersistentHeaderDB`].
//!
//! This crate does not reproduce the original's candidate-head race
//! (`ShardTracker.fetch_candidate_head`): `FakeTipMonitor` is
//! single-threaded, so the race the spec's design notes flag doesn't
//! arise here. A production tip monitor still has to pick one of the two
//! fixes the spec allows -- snapshot-and-reapply, or serializing guesses
//! against log ingestion -- before it can be run concurrently.

pub mod db;
pub mod error;
pub mod header;
pub mod persister;
pub mod tip_monitor;
pub mod worker;

pub use db::PersistentHeaderDB;
pub use error::HeaderSyncError;
pub use header::{BlockHash, GetBlockHeaders, Header, HeaderRange};
pub use persister::HeaderPersister;
pub use tip_monitor::FakeTipMonitor;
pub use worker::HeaderFetchWorker;
