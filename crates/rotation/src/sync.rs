//! Follow-graph synchronizer.
//!
//! Diffs the eligible set against the new winner's followers in fixed-size
//! batches, persists the should-unfollow flags for everyone who was not
//! already following (fatal: the flags are next cycle's unfollow trigger),
//! then bulk-follows the same set batch by batch, best-effort.

use std::sync::Arc;
use std::time::Duration;

use fameish_core::Address;
use fameish_chain::WinnerContract;
use fameish_identity::LensDirectory;
use fameish_store::EntrantStore;
use tracing::{info, warn};

use crate::RotationError;

/// Per-batch result of the bulk-follow phase.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub accounts: Vec<Address>,
    pub result: Result<(), String>,
}

/// What the synchronizer did this cycle.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// Accounts that were not yet following the winner, in diff order.
    pub not_following: Vec<Address>,
    /// One outcome per submitted bulk-follow batch.
    pub batches: Vec<BatchOutcome>,
}

pub struct FollowSynchronizer {
    contract: Arc<dyn WinnerContract>,
    directory: Arc<dyn LensDirectory>,
    store: Arc<dyn EntrantStore>,
    batch_size: usize,
    throttle: Duration,
}

impl FollowSynchronizer {
    pub fn new(
        contract: Arc<dyn WinnerContract>,
        directory: Arc<dyn LensDirectory>,
        store: Arc<dyn EntrantStore>,
        batch_size: usize,
        throttle: Duration,
    ) -> Self {
        Self {
            contract,
            directory,
            store,
            batch_size,
            throttle,
        }
    }

    pub async fn run(
        &self,
        winner: Address,
        eligible: &[Address],
    ) -> Result<SyncOutcome, RotationError> {
        let not_following = self.diff_followers(winner, eligible).await;
        info!(
            %winner,
            not_following = not_following.len(),
            "follow-status diff complete"
        );

        // The flags must land before any follow is submitted: following an
        // account without its future-unfollow record is the one
        // inconsistency this job refuses to create.
        self.store
            .mark_should_unfollow(&not_following)
            .map_err(RotationError::FlagPersistence)?;

        let batches = self.bulk_follow(&not_following).await;
        Ok(SyncOutcome {
            not_following,
            batches,
        })
    }

    /// Batched follow-status queries against the directory. A failed batch
    /// read is skipped (its accounts are left untouched this cycle).
    async fn diff_followers(&self, winner: Address, eligible: &[Address]) -> Vec<Address> {
        let mut not_following = Vec::new();
        for batch in eligible.chunks(self.batch_size) {
            let pairs: Vec<(Address, Address)> =
                batch.iter().map(|&follower| (follower, winner)).collect();
            match self.directory.follow_status(&pairs).await {
                Ok(statuses) => {
                    not_following.extend(
                        statuses
                            .iter()
                            .filter(|s| !s.is_following())
                            .map(|s| s.follower),
                    );
                }
                Err(e) => {
                    warn!(error = %e, batch = batch.len(), "follow-status batch failed, skipping");
                }
            }
            tokio::time::sleep(self.throttle).await;
        }
        not_following
    }

    /// Submit bulk-follow batches sequentially, confirming each before the
    /// next. Per-batch failures are recorded and the loop continues; the
    /// persisted flags are never rolled back.
    async fn bulk_follow(&self, accounts: &[Address]) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::new();
        for batch in accounts.chunks(self.batch_size) {
            let result = match self.contract.bulk_follow(batch).await {
                Ok(tx) => {
                    info!(hash = %tx.hash, accounts = batch.len(), "bulk follow confirmed");
                    Ok(())
                }
                Err(e) => {
                    warn!(error = %e, accounts = batch.len(), "bulk follow batch failed, continuing");
                    Err(e.to_string())
                }
            };
            outcomes.push(BatchOutcome {
                accounts: batch.to_vec(),
                result,
            });
            tokio::time::sleep(self.throttle).await;
        }
        outcomes
    }
}
