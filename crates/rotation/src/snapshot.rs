//! Eligibility snapshot: the set of entrants the whole cycle operates on.
//!
//! The snapshot is loaded once per cycle and its address ordering is the
//! single source of truth for the manifest CSV and the follower-index
//! resolution: the same vector, never re-queried.

use fameish_core::Address;
use fameish_store::{EligibleEntrant, EntrantStore};
use tracing::info;

use crate::RotationError;

/// One cycle's eligibility snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    entrants: Vec<EligibleEntrant>,
}

impl Snapshot {
    /// Load all eligible entrants from the record store. Fatal on read
    /// failure; without the snapshot no phase can make progress.
    pub fn load(store: &dyn EntrantStore) -> Result<Self, RotationError> {
        let entrants = store.eligible_entrants().map_err(RotationError::Snapshot)?;
        info!(entrants = entrants.len(), "eligibility snapshot loaded");
        Ok(Self { entrants })
    }

    #[cfg(test)]
    pub fn from_entrants(entrants: Vec<EligibleEntrant>) -> Self {
        Self { entrants }
    }

    pub fn is_empty(&self) -> bool {
        self.entrants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entrants.len()
    }

    /// All eligible addresses in snapshot order.
    pub fn addresses(&self) -> Vec<Address> {
        self.entrants.iter().map(|e| e.account).collect()
    }

    /// Addresses flagged for unfollow by the previous cycle.
    pub fn flagged_for_unfollow(&self) -> Vec<Address> {
        self.entrants
            .iter()
            .filter(|e| e.should_unfollow)
            .map(|e| e.account)
            .collect()
    }

    /// The entrant manifest: comma-joined addresses in snapshot order.
    pub fn manifest_csv(&self) -> String {
        self.addresses()
            .iter()
            .map(Address::to_hex)
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entrant(byte: u8, should_unfollow: bool) -> EligibleEntrant {
        EligibleEntrant {
            account: Address::from_bytes([byte; 20]),
            should_unfollow,
        }
    }

    #[test]
    fn test_manifest_preserves_snapshot_order() {
        let snapshot =
            Snapshot::from_entrants(vec![entrant(0x0b, false), entrant(0x0a, true)]);
        let csv = snapshot.manifest_csv();
        let addrs = snapshot.addresses();
        assert_eq!(
            csv,
            format!("{},{}", addrs[0].to_hex(), addrs[1].to_hex())
        );
    }

    #[test]
    fn test_flagged_subset() {
        let snapshot = Snapshot::from_entrants(vec![
            entrant(0x01, true),
            entrant(0x02, false),
            entrant(0x03, true),
        ]);
        assert_eq!(
            snapshot.flagged_for_unfollow(),
            vec![
                Address::from_bytes([0x01; 20]),
                Address::from_bytes([0x03; 20])
            ]
        );
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Snapshot::from_entrants(vec![]);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.manifest_csv(), "");
    }
}
