//! 20-byte EVM account address with canonical lowercase rendering.
//!
//! Addresses arrive from request bodies, JWT claims, chain reads, and the
//! record store in mixed case. Parsing normalizes to raw bytes so equality
//! and hashing are case-insensitive by construction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// The zero address, used by the winner contract to mean "no winner set".
pub const ZERO_ADDRESS: Address = Address([0u8; 20]);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("address must start with 0x")]
    MissingPrefix,
    #[error("address must be 20 bytes, got {0} hex chars")]
    BadLength(usize),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

/// A 20-byte EVM account address.
///
/// Displays as canonical lowercase `0x`-prefixed hex. Two addresses that
/// differ only in the case of their hex rendering compare equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// True for the zero address (no winner sentinel).
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Canonical lowercase `0x`-prefixed hex string.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or(AddressParseError::MissingPrefix)?;
        if stripped.len() != 40 {
            return Err(AddressParseError::BadLength(stripped.len()));
        }
        let raw =
            hex::decode(stripped).map_err(|e| AddressParseError::InvalidHex(e.to_string()))?;
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&raw);
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        let lower: Address = "0xabcdef0123456789abcdef0123456789abcdef01"
            .parse()
            .unwrap();
        let upper: Address = "0xABCDEF0123456789ABCDEF0123456789ABCDEF01"
            .parse()
            .unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_display_is_lowercase() {
        let addr: Address = "0xABCDEF0123456789ABCDEF0123456789ABCDEF01"
            .parse()
            .unwrap();
        assert_eq!(addr.to_string(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(
            "abcdef0123456789abcdef0123456789abcdef01".parse::<Address>(),
            Err(AddressParseError::MissingPrefix)
        );
        assert_eq!(
            "0xabcd".parse::<Address>(),
            Err(AddressParseError::BadLength(4))
        );
        assert!(matches!(
            "0xzzcdef0123456789abcdef0123456789abcdef01".parse::<Address>(),
            Err(AddressParseError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_zero_address() {
        assert!(ZERO_ADDRESS.is_zero());
        let addr: Address = "0x0000000000000000000000000000000000000000"
            .parse()
            .unwrap();
        assert!(addr.is_zero());
        assert_eq!(addr, ZERO_ADDRESS);
    }

    #[test]
    fn test_serde_roundtrip() {
        let addr: Address = "0xAbCdEf0123456789abcdef0123456789abcdef01"
            .parse()
            .unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0xabcdef0123456789abcdef0123456789abcdef01\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
