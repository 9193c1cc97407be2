//! Fameish Chain Client
//!
//! Client for the fixed on-chain collaborator interface: the Fameish winner
//! contract, the global social graph, and Lens smart accounts. Builds ABI
//! calldata by hand, talks JSON-RPC over HTTP, and signs EIP-1559
//! transactions with the custodial account-manager key.
//!
//! The contract surface is exposed behind the [`WinnerContract`],
//! [`SocialGraph`], and [`AccountDelegation`] traits so workflows take
//! injected collaborators; [`DryRunChain`] is the scriptable recording
//! double used by tests.

pub mod calldata;
pub mod client;
pub mod dry_run;
pub mod rpc;
pub mod signer;

pub use client::{
    AccountDelegation, DelegationStatus, LensChain, SocialGraph, TxOutcome, WinnerContract,
};
pub use dry_run::{ChainCall, DryRunChain};
pub use rpc::RpcClient;
pub use signer::ManagerSigner;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("rpc transport error: {0}")]
    Transport(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed rpc response: {0}")]
    BadResponse(String),
    #[error("abi decode error: {0}")]
    Decode(String),
    #[error("invalid manager key: {0}")]
    InvalidKey(String),
    #[error("transaction {0} reverted")]
    Reverted(String),
    #[error("timed out waiting for receipt of {0}")]
    ReceiptTimeout(String),
}

impl From<reqwest::Error> for ChainError {
    fn from(e: reqwest::Error) -> Self {
        ChainError::Transport(e.to_string())
    }
}
