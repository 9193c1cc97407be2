//! Unfollow reconciler.
//!
//! Entrants flagged by the previous cycle stop following the outgoing
//! winner before a new one is selected. The whole phase is best-effort: a
//! stale follow edge is cosmetic, so per-entrant failures are recorded and
//! the loop moves on.

use std::sync::Arc;
use std::time::Duration;

use fameish_core::Address;
use fameish_chain::{SocialGraph, WinnerContract};
use tracing::{info, warn};

/// Per-entrant result of the unfollow phase.
#[derive(Debug, Clone)]
pub struct UnfollowOutcome {
    pub account: Address,
    /// `Err` carries the failure rendered for the outcome list; the phase
    /// itself never fails.
    pub result: Result<(), String>,
}

pub struct UnfollowReconciler {
    contract: Arc<dyn WinnerContract>,
    graph: Arc<dyn SocialGraph>,
    throttle: Duration,
}

impl UnfollowReconciler {
    pub fn new(
        contract: Arc<dyn WinnerContract>,
        graph: Arc<dyn SocialGraph>,
        throttle: Duration,
    ) -> Self {
        Self {
            contract,
            graph,
            throttle,
        }
    }

    /// Unfollow the current winner for every flagged entrant, sequentially,
    /// confirming each transaction before the next.
    ///
    /// Skipped entirely (empty outcome list) when no winner is set or the
    /// winner read fails; there may simply not be a winner yet.
    pub async fn run(&self, flagged: &[Address]) -> Vec<UnfollowOutcome> {
        let current_winner = match self.contract.winner().await {
            Ok(Some(winner)) => winner,
            Ok(None) => {
                info!("no current winner, skipping unfollow phase");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "winner read failed, skipping unfollow phase");
                return Vec::new();
            }
        };

        info!(
            winner = %current_winner,
            accounts = flagged.len(),
            "unfollowing outgoing winner"
        );

        let mut outcomes = Vec::with_capacity(flagged.len());
        for &account in flagged {
            let result = match self.graph.unfollow_for(account, current_winner).await {
                Ok(tx) => {
                    info!(%account, hash = %tx.hash, "unfollowed outgoing winner");
                    Ok(())
                }
                Err(e) => {
                    warn!(%account, error = %e, "unfollow failed, continuing");
                    Err(e.to_string())
                }
            };
            outcomes.push(UnfollowOutcome { account, result });
            tokio::time::sleep(self.throttle).await;
        }
        outcomes
    }
}
