//! Fameish Rotation
//!
//! The daily winner rotation job: loads the eligibility snapshot,
//! reconciles pending unfollows against the outgoing winner, selects the
//! new winner through the on-chain randomness contract, and synchronizes
//! the follow graph toward the new winner.
//!
//! The job is strictly sequential and I/O bound; every transaction is
//! confirmed before the next one is submitted so the shared manager key
//! never races its own nonce.

pub mod selector;
pub mod service;
pub mod snapshot;
pub mod sync;
pub mod unfollow;

pub use selector::{Selection, WinnerSelector};
pub use service::{RotationConfig, RotationJob, RotationOutcome, RotationPhase};
pub use snapshot::Snapshot;
pub use sync::{BatchOutcome, FollowSynchronizer, SyncOutcome};
pub use unfollow::{UnfollowOutcome, UnfollowReconciler};

use fameish_chain::ChainError;
use fameish_storage::StorageError;
use fameish_store::StoreError;
use thiserror::Error;

/// Fatal rotation failures. Anything else in the cycle is best-effort and
/// reported through per-item outcome lists instead of errors.
#[derive(Error, Debug)]
pub enum RotationError {
    #[error("failed to load eligibility snapshot: {0}")]
    Snapshot(#[source] StoreError),
    #[error("manifest upload failed: {0}")]
    Upload(#[from] StorageError),
    #[error("winner selection failed: {0}")]
    Selection(#[source] ChainError),
    #[error("follower index {index} out of bounds for {len} entrants")]
    IndexOutOfBounds { index: u64, len: usize },
    #[error("failed to set winner: {0}")]
    SetWinner(#[source] ChainError),
    #[error("failed to persist unfollow flags: {0}")]
    FlagPersistence(#[source] StoreError),
}
