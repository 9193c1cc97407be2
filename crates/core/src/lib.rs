//! Fameish Core
//!
//! Shared primitives for the Fameish services: the EVM account address
//! newtype and the entrant verification source.

mod address;

pub use address::{Address, AddressParseError, ZERO_ADDRESS};

use serde::{Deserialize, Serialize};

/// Which gate satisfied the signup score check for an entrant.
///
/// Persisted with the entrant record for audit purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum VerificationSource {
    /// Protocol-native account score met the minimum.
    AccountScore = 0,
    /// External reputation score met the fallback minimum.
    ReputationScore = 1,
}

impl VerificationSource {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::AccountScore),
            1 => Some(Self::ReputationScore),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_source_from_u8() {
        assert_eq!(
            VerificationSource::from_u8(0),
            Some(VerificationSource::AccountScore)
        );
        assert_eq!(
            VerificationSource::from_u8(1),
            Some(VerificationSource::ReputationScore)
        );
        assert_eq!(VerificationSource::from_u8(2), None);
    }

    #[test]
    fn test_verification_source_repr() {
        assert_eq!(VerificationSource::AccountScore.as_u8(), 0);
        assert_eq!(VerificationSource::ReputationScore.as_u8(), 1);
    }
}
