//! ABI calldata builders for the fixed contract interface.
//!
//! Each function produces the full calldata (4-byte selector + head/tail
//! encoded arguments) for one contract entry point, and the decoders read
//! single-word return values back out.

use fameish_core::Address;
use sha3::{Digest, Keccak256};

use crate::ChainError;

/// Argument tokens for head/tail ABI encoding.
enum Token {
    Address(Address),
    Uint(u64),
    Str(String),
    AddressArray(Vec<Address>),
    Bytes(Vec<u8>),
    BytesArray(Vec<Vec<u8>>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        matches!(
            self,
            Token::Str(_) | Token::AddressArray(_) | Token::Bytes(_) | Token::BytesArray(_)
        )
    }
}

/// First four bytes of the keccak-256 of the canonical signature.
fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&digest[..4]);
    sel
}

fn word_u64(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

fn word_address(addr: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(addr.as_bytes());
    word
}

/// Length-prefixed, right-padded byte payload.
fn padded_bytes(data: &[u8]) -> Vec<u8> {
    let mut out = word_u64(data.len() as u64).to_vec();
    out.extend_from_slice(data);
    let rem = data.len() % 32;
    if rem != 0 {
        out.extend(std::iter::repeat(0u8).take(32 - rem));
    }
    out
}

/// Tail payload for a dynamic token.
fn tail_payload(token: &Token) -> Vec<u8> {
    match token {
        Token::Str(s) => padded_bytes(s.as_bytes()),
        Token::Bytes(b) => padded_bytes(b),
        Token::AddressArray(addrs) => {
            let mut out = word_u64(addrs.len() as u64).to_vec();
            for addr in addrs {
                out.extend_from_slice(&word_address(addr));
            }
            out
        }
        Token::BytesArray(items) => {
            // Nested head/tail: per-element offsets, then each element's payload.
            let mut out = word_u64(items.len() as u64).to_vec();
            let mut tails: Vec<Vec<u8>> = Vec::with_capacity(items.len());
            let mut offset = 32 * items.len() as u64;
            for item in items {
                out.extend_from_slice(&word_u64(offset));
                let tail = padded_bytes(item);
                offset += tail.len() as u64;
                tails.push(tail);
            }
            for tail in tails {
                out.extend_from_slice(&tail);
            }
            out
        }
        Token::Address(_) | Token::Uint(_) => unreachable!("static token has no tail"),
    }
}

/// Head/tail encode a call: selector, then one head word per argument
/// (value or tail offset), then the dynamic tails.
fn encode_call(signature: &str, tokens: &[Token]) -> Vec<u8> {
    let mut head: Vec<u8> = Vec::with_capacity(4 + 32 * tokens.len());
    head.extend_from_slice(&selector(signature));

    let mut tail: Vec<u8> = Vec::new();
    let head_len = 32 * tokens.len() as u64;

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&word_u64(head_len + tail.len() as u64));
            tail.extend_from_slice(&tail_payload(token));
        } else {
            match token {
                Token::Address(addr) => head.extend_from_slice(&word_address(addr)),
                Token::Uint(v) => head.extend_from_slice(&word_u64(*v)),
                _ => unreachable!(),
            }
        }
    }

    head.extend_from_slice(&tail);
    head
}

// -- Fameish winner contract --

pub fn winner() -> Vec<u8> {
    encode_call("winner()", &[])
}

pub fn follower_index() -> Vec<u8> {
    encode_call("followerIndex()", &[])
}

pub fn select_random(count: u64, manifest_uri: &str) -> Vec<u8> {
    encode_call(
        "selectRandom(uint256,string)",
        &[Token::Uint(count), Token::Str(manifest_uri.to_string())],
    )
}

pub fn set_winner(winner: Address) -> Vec<u8> {
    encode_call("setWinner(address)", &[Token::Address(winner)])
}

pub fn bulk_follow(accounts: &[Address]) -> Vec<u8> {
    encode_call(
        "bulkFollow(address[])",
        &[Token::AddressArray(accounts.to_vec())],
    )
}

// -- Global graph --

pub fn is_following(follower: Address, followee: Address) -> Vec<u8> {
    encode_call(
        "isFollowing(address,address)",
        &[Token::Address(follower), Token::Address(followee)],
    )
}

/// `unfollow(follower, target, customGraphs, extraData)` with both dynamic
/// arguments empty, matching the platform's use of the default graph.
pub fn unfollow(follower: Address, target: Address) -> Vec<u8> {
    encode_call(
        "unfollow(address,address,address[],bytes[])",
        &[
            Token::Address(follower),
            Token::Address(target),
            Token::AddressArray(vec![]),
            Token::BytesArray(vec![]),
        ],
    )
}

// -- Lens smart account --

pub fn can_execute_transactions(executor: Address) -> Vec<u8> {
    encode_call(
        "canExecuteTransactions(address)",
        &[Token::Address(executor)],
    )
}

pub fn execute_transaction(target: Address, value: u64, data: &[u8]) -> Vec<u8> {
    encode_call(
        "executeTransaction(address,uint256,bytes)",
        &[
            Token::Address(target),
            Token::Uint(value),
            Token::Bytes(data.to_vec()),
        ],
    )
}

// -- Reputation contract --

/// `getScoreByAddress(owner, account)` returning the reputation score.
pub fn get_score_by_address(owner: Address, account: Address) -> Vec<u8> {
    encode_call(
        "getScoreByAddress(address,address)",
        &[Token::Address(owner), Token::Address(account)],
    )
}

// -- Return decoding --

/// Decode a single address return word.
pub fn decode_address(data: &[u8]) -> Result<Address, ChainError> {
    if data.len() < 32 {
        return Err(ChainError::Decode(format!(
            "expected 32-byte word, got {} bytes",
            data.len()
        )));
    }
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&data[12..32]);
    Ok(Address::from_bytes(bytes))
}

/// Decode a single uint return word. Values above `u64::MAX` are rejected;
/// no counter in this interface approaches that range.
pub fn decode_uint(data: &[u8]) -> Result<u64, ChainError> {
    if data.len() < 32 {
        return Err(ChainError::Decode(format!(
            "expected 32-byte word, got {} bytes",
            data.len()
        )));
    }
    if data[..24].iter().any(|&b| b != 0) {
        return Err(ChainError::Decode("uint overflows u64".into()));
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&data[24..32]);
    Ok(u64::from_be_bytes(raw))
}

/// Decode a single bool return word.
pub fn decode_bool(data: &[u8]) -> Result<bool, ChainError> {
    Ok(decode_uint(data)? != 0)
}
