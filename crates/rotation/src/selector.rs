//! Random winner selector.
//!
//! Uploads the immutable entrant manifest, drives the on-chain random
//! selection, reads the committed index back, and sets the winner. Every
//! step here is fatal: no winner can be set without a committed selection.

use std::sync::Arc;

use fameish_core::Address;
use fameish_chain::WinnerContract;
use fameish_storage::ContentStore;
use tracing::info;

use crate::snapshot::Snapshot;
use crate::RotationError;

/// A committed winner selection.
#[derive(Debug, Clone)]
pub struct Selection {
    pub winner: Address,
    pub follower_index: u64,
    pub manifest_uri: String,
}

pub struct WinnerSelector {
    contract: Arc<dyn WinnerContract>,
    content: Arc<dyn ContentStore>,
}

impl WinnerSelector {
    pub fn new(contract: Arc<dyn WinnerContract>, content: Arc<dyn ContentStore>) -> Self {
        Self { contract, content }
    }

    /// Select and set the new winner for this cycle's snapshot.
    ///
    /// The index read back from the contract resolves against the same
    /// address vector the manifest was serialized from; the caller must
    /// have rejected an empty snapshot before getting here.
    pub async fn run(&self, snapshot: &Snapshot) -> Result<Selection, RotationError> {
        let eligible = snapshot.addresses();
        let manifest_uri = self.content.upload_manifest(&snapshot.manifest_csv()).await?;

        let tx = self
            .contract
            .select_random(eligible.len() as u64, &manifest_uri)
            .await
            .map_err(RotationError::Selection)?;
        info!(hash = %tx.hash, entrants = eligible.len(), "random selection committed");

        // Read the committed index back from the contract rather than
        // deriving it locally; the randomness outcome lives on-chain.
        let follower_index = self
            .contract
            .follower_index()
            .await
            .map_err(RotationError::Selection)?;
        let winner = *eligible
            .get(follower_index as usize)
            .ok_or(RotationError::IndexOutOfBounds {
                index: follower_index,
                len: eligible.len(),
            })?;
        info!(index = follower_index, %winner, "new winner resolved");

        let tx = self
            .contract
            .set_winner(winner)
            .await
            .map_err(RotationError::SetWinner)?;
        info!(hash = %tx.hash, %winner, "new winner set");

        Ok(Selection {
            winner,
            follower_index,
            manifest_uri,
        })
    }
}
