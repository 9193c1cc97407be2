//! Custodial account-manager signer.
//!
//! Holds the platform's single shared signing key and produces signed
//! EIP-1559 raw transactions. Callers own the single-writer contract on
//! the nonce sequence: every receipt is awaited before the next submit.

use fameish_core::Address;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rlp::RlpStream;
use sha3::{Digest, Keccak256};

use crate::ChainError;

/// Fields of one EIP-1559 transaction to sign.
#[derive(Debug, Clone)]
pub struct TxRequest {
    pub to: Address,
    pub data: Vec<u8>,
    pub value: u64,
    pub nonce: u64,
    pub gas_limit: u64,
    pub max_fee_per_gas: u64,
    pub max_priority_fee_per_gas: u64,
}

/// The custodial manager wallet: secp256k1 key plus derived address.
pub struct ManagerSigner {
    key: SigningKey,
    address: Address,
    chain_id: u64,
}

impl ManagerSigner {
    /// Load the signer from a `0x`-prefixed hex private key.
    pub fn from_hex_key(hex_key: &str, chain_id: u64) -> Result<Self, ChainError> {
        let stripped = hex_key.strip_prefix("0x").unwrap_or(hex_key);
        let raw = hex::decode(stripped).map_err(|e| ChainError::InvalidKey(e.to_string()))?;
        let key =
            SigningKey::from_slice(&raw).map_err(|e| ChainError::InvalidKey(e.to_string()))?;
        let address = derive_address(&key);
        Ok(Self {
            key,
            address,
            chain_id,
        })
    }

    /// The manager's account address.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Sign `tx` and return the raw transaction bytes for
    /// `eth_sendRawTransaction` (type 0x02 envelope).
    pub fn sign(&self, tx: &TxRequest) -> Result<Vec<u8>, ChainError> {
        let unsigned = rlp_payload(self.chain_id, tx, None);
        let mut preimage = Vec::with_capacity(1 + unsigned.len());
        preimage.push(0x02);
        preimage.extend_from_slice(&unsigned);
        let digest = Keccak256::digest(&preimage);

        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| ChainError::InvalidKey(e.to_string()))?;
        let sig_bytes = signature.to_bytes();
        let r = trim_leading_zeros(&sig_bytes[..32]);
        let s = trim_leading_zeros(&sig_bytes[32..]);

        let signed = rlp_payload(
            self.chain_id,
            tx,
            Some((recovery_id.to_byte() as u64, r, s)),
        );
        let mut raw = Vec::with_capacity(1 + signed.len());
        raw.push(0x02);
        raw.extend_from_slice(&signed);
        Ok(raw)
    }
}

/// RLP body of an EIP-1559 transaction, with or without the signature.
fn rlp_payload(chain_id: u64, tx: &TxRequest, sig: Option<(u64, Vec<u8>, Vec<u8>)>) -> Vec<u8> {
    let mut stream = RlpStream::new();
    stream.begin_list(if sig.is_some() { 12 } else { 9 });
    stream.append(&chain_id);
    stream.append(&tx.nonce);
    stream.append(&tx.max_priority_fee_per_gas);
    stream.append(&tx.max_fee_per_gas);
    stream.append(&tx.gas_limit);
    stream.append(&tx.to.as_bytes().to_vec());
    stream.append(&tx.value);
    stream.append(&tx.data);
    stream.begin_list(0); // access list
    if let Some((y_parity, r, s)) = sig {
        stream.append(&y_parity);
        stream.append(&r);
        stream.append(&s);
    }
    stream.out().to_vec()
}

/// keccak-256 of the uncompressed public key, last 20 bytes.
fn derive_address(key: &SigningKey) -> Address {
    let point = key.verifying_key().to_encoded_point(false);
    let digest = Keccak256::digest(&point.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[12..]);
    Address::from_bytes(bytes)
}

/// Minimal big-endian encoding for signature scalars.
fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    fn sample_tx() -> TxRequest {
        TxRequest {
            to: Address::from_bytes([0x22; 20]),
            data: vec![0xde, 0xad, 0xbe, 0xef],
            value: 0,
            nonce: 5,
            gas_limit: 100_000,
            max_fee_per_gas: 2_000_000_000,
            max_priority_fee_per_gas: 1_000_000_000,
        }
    }

    #[test]
    fn test_address_derivation_known_key() {
        let signer = ManagerSigner::from_hex_key(KEY_ONE, 1).unwrap();
        assert_eq!(
            signer.address().to_hex(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_rejects_malformed_key() {
        assert!(ManagerSigner::from_hex_key("0xzz", 1).is_err());
        assert!(ManagerSigner::from_hex_key("0x00", 1).is_err());
    }

    #[test]
    fn test_signing_is_deterministic() {
        let signer = ManagerSigner::from_hex_key(KEY_ONE, 37111).unwrap();
        let tx = sample_tx();
        let a = signer.sign(&tx).unwrap();
        let b = signer.sign(&tx).unwrap();
        assert_eq!(a, b);
        // type-2 envelope
        assert_eq!(a[0], 0x02);
    }

    #[test]
    fn test_signed_payload_differs_per_nonce() {
        let signer = ManagerSigner::from_hex_key(KEY_ONE, 37111).unwrap();
        let mut tx = sample_tx();
        let first = signer.sign(&tx).unwrap();
        tx.nonce += 1;
        let second = signer.sign(&tx).unwrap();
        assert_ne!(first, second);
    }
}
