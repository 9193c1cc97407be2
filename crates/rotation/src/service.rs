//! The rotation job driver.
//!
//! Wires the four phase components and runs them strictly in sequence:
//! `LoadingSnapshot → Unfollowing → SelectingWinner → SynchronizingFollows`.
//! The unfollow phase is skippable; fatal failures come only from the
//! snapshot load, the selection/set-winner path, and the flag persistence
//! inside the synchronizer.

use std::sync::Arc;
use std::time::Duration;

use fameish_core::Address;
use fameish_chain::{SocialGraph, WinnerContract};
use fameish_identity::LensDirectory;
use fameish_storage::ContentStore;
use fameish_store::EntrantStore;
use tracing::{debug, info};

use crate::selector::WinnerSelector;
use crate::snapshot::Snapshot;
use crate::sync::{BatchOutcome, FollowSynchronizer};
use crate::unfollow::{UnfollowOutcome, UnfollowReconciler};
use crate::RotationError;

/// Phases of one rotation cycle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPhase {
    Idle,
    LoadingSnapshot,
    Unfollowing,
    SelectingWinner,
    SynchronizingFollows,
}

/// Tuning knobs for the cycle.
#[derive(Debug, Clone)]
pub struct RotationConfig {
    /// Accounts per follow-status query and per bulkFollow transaction.
    pub batch_size: usize,
    /// Delay between consecutive transactions/batches.
    pub throttle: Duration,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            throttle: Duration::from_millis(100),
        }
    }
}

/// Everything one completed cycle did, including per-item results of the
/// best-effort loops so callers and tests can assert on partial failures.
#[derive(Debug, Clone)]
pub struct RotationOutcome {
    /// `None` only for the empty-snapshot no-op cycle.
    pub winner: Option<Address>,
    pub entrant_count: usize,
    pub manifest_uri: Option<String>,
    pub unfollows: Vec<UnfollowOutcome>,
    pub marked_for_unfollow: Vec<Address>,
    pub follow_batches: Vec<BatchOutcome>,
}

impl RotationOutcome {
    fn no_entrants() -> Self {
        Self {
            winner: None,
            entrant_count: 0,
            manifest_uri: None,
            unfollows: Vec::new(),
            marked_for_unfollow: Vec::new(),
            follow_batches: Vec::new(),
        }
    }
}

/// The daily winner rotation job. All collaborators are injected; the job
/// holds no global state and can run back to back.
pub struct RotationJob {
    store: Arc<dyn EntrantStore>,
    reconciler: UnfollowReconciler,
    selector: WinnerSelector,
    synchronizer: FollowSynchronizer,
}

impl RotationJob {
    pub fn new(
        store: Arc<dyn EntrantStore>,
        contract: Arc<dyn WinnerContract>,
        graph: Arc<dyn SocialGraph>,
        directory: Arc<dyn LensDirectory>,
        content: Arc<dyn ContentStore>,
        config: RotationConfig,
    ) -> Self {
        let reconciler =
            UnfollowReconciler::new(contract.clone(), graph, config.throttle);
        let selector = WinnerSelector::new(contract.clone(), content);
        let synchronizer = FollowSynchronizer::new(
            contract,
            directory,
            store.clone(),
            config.batch_size,
            config.throttle,
        );
        Self {
            store,
            reconciler,
            selector,
            synchronizer,
        }
    }

    /// Run one full rotation cycle.
    pub async fn run(&self) -> Result<RotationOutcome, RotationError> {
        debug!(phase = ?RotationPhase::LoadingSnapshot, "rotation cycle starting");
        let snapshot = Snapshot::load(self.store.as_ref())?;
        if snapshot.is_empty() {
            info!("no eligible entrants, rotation cycle is a no-op");
            return Ok(RotationOutcome::no_entrants());
        }

        debug!(phase = ?RotationPhase::Unfollowing, "reconciling pending unfollows");
        let unfollows = self.reconciler.run(&snapshot.flagged_for_unfollow()).await;

        debug!(phase = ?RotationPhase::SelectingWinner, "selecting new winner");
        let selection = self.selector.run(&snapshot).await?;

        debug!(phase = ?RotationPhase::SynchronizingFollows, "synchronizing follow graph");
        let sync = self
            .synchronizer
            .run(selection.winner, &snapshot.addresses())
            .await?;

        let failed_batches = sync.batches.iter().filter(|b| b.result.is_err()).count();
        info!(
            winner = %selection.winner,
            entrants = snapshot.len(),
            marked = sync.not_following.len(),
            batches = sync.batches.len(),
            failed_batches,
            "rotation cycle complete"
        );

        Ok(RotationOutcome {
            winner: Some(selection.winner),
            entrant_count: snapshot.len(),
            manifest_uri: Some(selection.manifest_uri),
            unfollows,
            marked_for_unfollow: sync.not_following,
            follow_batches: sync.batches,
        })
    }
}
