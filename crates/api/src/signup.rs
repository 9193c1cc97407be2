//! Signup verification pipeline.
//!
//! Runs gates 3 through 8 of a registration: claim consistency, score,
//! delegation, duplicate, follow prerequisites, persistence. Transport and
//! credential checks happen in the handler before this is reached, so tests
//! can drive the pipeline with constructed claims.

use std::sync::Arc;

use fameish_chain::{AccountDelegation, SocialGraph, WinnerContract};
use fameish_core::{Address, VerificationSource};
use fameish_identity::{IdentityClaims, LensDirectory};
use fameish_store::{Entrant, EntrantStore};
use tracing::{info, warn};

use crate::error::AppError;

/// Threshold and address parameters the pipeline checks against.
#[derive(Debug, Clone)]
pub struct SignupPolicy {
    /// The platform's own account, which every entrant must follow.
    pub platform_account: Address,
    pub reputation_contract: Address,
    pub min_account_score: u64,
    pub min_reputation_score: u64,
}

pub struct SignupPipeline {
    store: Arc<dyn EntrantStore>,
    contract: Arc<dyn WinnerContract>,
    graph: Arc<dyn SocialGraph>,
    delegation: Arc<dyn AccountDelegation>,
    directory: Arc<dyn LensDirectory>,
    policy: SignupPolicy,
}

impl SignupPipeline {
    pub fn new(
        store: Arc<dyn EntrantStore>,
        contract: Arc<dyn WinnerContract>,
        graph: Arc<dyn SocialGraph>,
        delegation: Arc<dyn AccountDelegation>,
        directory: Arc<dyn LensDirectory>,
        policy: SignupPolicy,
    ) -> Self {
        Self {
            store,
            contract,
            graph,
            delegation,
            directory,
            policy,
        }
    }

    /// Run every gate in order; any failure aborts with no record created.
    pub async fn register(
        &self,
        claims: &IdentityClaims,
        account: Address,
    ) -> Result<Entrant, AppError> {
        // A valid credential for account A must not register account B.
        if claims.account != account {
            return Err(AppError::Auth(
                "credential does not authorize this account".to_string(),
            ));
        }

        let info = self
            .directory
            .fetch_account(account)
            .await?
            .ok_or_else(|| AppError::Auth("unknown account".to_string()))?;

        let source = self.score_gate(&info).await?;

        let status = self
            .delegation
            .delegation_status(account, claims.signer, self.policy.platform_account)
            .await?;
        if !status.signer_can_execute {
            return Err(AppError::Auth(
                "credential signer is not a manager for this account".to_string(),
            ));
        }
        if !status.platform_can_execute {
            return Err(AppError::Auth(
                "platform is not a manager for this account".to_string(),
            ));
        }

        if self.store.find_by_account(account)?.is_some() {
            return Err(AppError::Conflict);
        }

        self.follow_gate(account).await?;

        let entrant = self.store.insert_entrant(account, source)?;
        info!(account = %account, source = ?source, "entrant registered");
        Ok(entrant)
    }

    /// Score gate with reputation fallback. A failed reputation read counts
    /// as a zero score rather than aborting the signup.
    async fn score_gate(
        &self,
        info: &fameish_identity::AccountInfo,
    ) -> Result<VerificationSource, AppError> {
        if info.score >= self.policy.min_account_score {
            return Ok(VerificationSource::AccountScore);
        }

        let reputation = match self
            .delegation
            .reputation_score(info.owner, info.address, self.policy.reputation_contract)
            .await
        {
            Ok(score) => score,
            Err(e) => {
                warn!(account = %info.address, error = %e, "reputation lookup failed");
                0
            }
        };
        if reputation >= self.policy.min_reputation_score {
            return Ok(VerificationSource::ReputationScore);
        }

        Err(AppError::Auth(format!(
            "account score {} and reputation {} are both below minimum",
            info.score, reputation
        )))
    }

    /// The entrant must already follow the platform account; if a winner is
    /// live and not yet followed, follow them now. This onboarding follow is
    /// a hard gate, not best effort.
    async fn follow_gate(&self, account: Address) -> Result<(), AppError> {
        let winner = self.contract.winner().await?;

        let follows_platform = self
            .graph
            .is_following(account, self.policy.platform_account)
            .await?;
        if !follows_platform {
            return Err(AppError::Auth(
                "account does not follow the platform".to_string(),
            ));
        }

        if let Some(winner) = winner {
            let follows_winner = self.graph.is_following(account, winner).await?;
            if !follows_winner {
                let outcome = self.contract.bulk_follow(&[account]).await?;
                info!(account = %account, winner = %winner, tx = %outcome.hash, "onboarding follow submitted");
            }
        }

        Ok(())
    }
}
