//! Typed contract surface over the JSON-RPC client.
//!
//! Workflows depend on the [`WinnerContract`], [`SocialGraph`], and
//! [`AccountDelegation`] traits; [`LensChain`] is the production
//! implementation that simulates (gas estimation), signs with the manager
//! key, submits, and waits for the receipt before returning.

use async_trait::async_trait;
use fameish_core::Address;
use serde_json::json;
use tracing::{debug, info};

use crate::calldata;
use crate::rpc::RpcClient;
use crate::signer::{ManagerSigner, TxRequest};
use crate::ChainError;

/// Receipt polls before giving up on a submitted transaction (500ms apart).
const RECEIPT_POLL_ATTEMPTS: u32 = 60;

/// Result of one confirmed transaction.
#[derive(Debug, Clone)]
pub struct TxOutcome {
    /// Transaction hash as returned by the node.
    pub hash: String,
}

/// Both halves of the delegation gate, read in one batched call.
#[derive(Debug, Clone, Copy)]
pub struct DelegationStatus {
    /// The credential's signer may transact for the account.
    pub signer_can_execute: bool,
    /// The platform contract may transact for the account.
    pub platform_can_execute: bool,
}

/// The Fameish winner contract.
#[async_trait]
pub trait WinnerContract: Send + Sync {
    /// Current winner; `None` when the zero address is set.
    async fn winner(&self) -> Result<Option<Address>, ChainError>;
    async fn follower_index(&self) -> Result<u64, ChainError>;
    /// Commit the random selection over `count` entrants, anchored to the
    /// uploaded manifest. Submitted and confirmed, never simulate-only.
    async fn select_random(&self, count: u64, manifest_uri: &str) -> Result<TxOutcome, ChainError>;
    async fn set_winner(&self, winner: Address) -> Result<TxOutcome, ChainError>;
    /// Follow the current winner on behalf of each listed account.
    async fn bulk_follow(&self, accounts: &[Address]) -> Result<TxOutcome, ChainError>;
}

/// The global social graph contract.
#[async_trait]
pub trait SocialGraph: Send + Sync {
    async fn is_following(
        &self,
        follower: Address,
        followee: Address,
    ) -> Result<bool, ChainError>;
    /// Remove the follow edge from `account` to `target`, executed through
    /// `account`'s own smart account by the custodial manager.
    async fn unfollow_for(&self, account: Address, target: Address)
        -> Result<TxOutcome, ChainError>;
}

/// Smart-account delegation checks.
#[async_trait]
pub trait AccountDelegation: Send + Sync {
    /// One batched read of `canExecuteTransactions` for the signer and for
    /// the platform contract against `account`'s smart account.
    async fn delegation_status(
        &self,
        account: Address,
        signer: Address,
        platform: Address,
    ) -> Result<DelegationStatus, ChainError>;
    /// Reputation score via `getScoreByAddress(owner, account)`.
    async fn reputation_score(
        &self,
        owner: Address,
        account: Address,
        reputation_contract: Address,
    ) -> Result<u64, ChainError>;
}

/// Production chain client: JSON-RPC reads plus manager-signed writes.
pub struct LensChain {
    rpc: RpcClient,
    signer: ManagerSigner,
    /// Fameish winner contract address.
    fameish: Address,
    /// Global graph contract address.
    graph: Address,
}

impl LensChain {
    pub fn new(rpc: RpcClient, signer: ManagerSigner, fameish: Address, graph: Address) -> Self {
        Self {
            rpc,
            signer,
            fameish,
            graph,
        }
    }

    /// The manager wallet address (the `from` of every write).
    pub fn manager_address(&self) -> Address {
        self.signer.address()
    }

    async fn read(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, ChainError> {
        self.rpc
            .eth_call(&to.to_hex(), &format!("0x{}", hex::encode(data)))
            .await
    }

    /// Simulate, sign, submit, and confirm one manager transaction.
    ///
    /// Simulation is gas estimation: a reverting call fails here before
    /// anything is signed. The receipt is awaited so the caller never races
    /// its own nonce.
    async fn submit(&self, to: Address, data: Vec<u8>) -> Result<TxOutcome, ChainError> {
        let from = self.signer.address().to_hex();
        let to_hex = to.to_hex();
        let data_hex = format!("0x{}", hex::encode(&data));

        let gas = self.rpc.estimate_gas(&from, &to_hex, &data_hex).await?;
        let gas_price = self.rpc.gas_price().await?;
        let nonce = self.rpc.transaction_count(&from).await?;

        let tx = TxRequest {
            to,
            data,
            value: 0,
            nonce,
            // headroom over the estimate; chain refunds the unused portion
            gas_limit: gas + gas / 5,
            max_fee_per_gas: gas_price * 2,
            max_priority_fee_per_gas: gas_price.min(1_500_000_000),
        };
        let raw = self.signer.sign(&tx)?;
        let hash = self.rpc.send_raw_transaction(&raw).await?;
        debug!(hash, nonce, gas, "transaction submitted");

        self.rpc
            .wait_for_receipt(&hash, RECEIPT_POLL_ATTEMPTS)
            .await?;
        info!(hash, to = %to_hex, "transaction confirmed");
        Ok(TxOutcome { hash })
    }
}

#[async_trait]
impl WinnerContract for LensChain {
    async fn winner(&self) -> Result<Option<Address>, ChainError> {
        let ret = self.read(self.fameish, calldata::winner()).await?;
        let addr = calldata::decode_address(&ret)?;
        Ok(if addr.is_zero() { None } else { Some(addr) })
    }

    async fn follower_index(&self) -> Result<u64, ChainError> {
        let ret = self.read(self.fameish, calldata::follower_index()).await?;
        calldata::decode_uint(&ret)
    }

    async fn select_random(&self, count: u64, manifest_uri: &str) -> Result<TxOutcome, ChainError> {
        self.submit(self.fameish, calldata::select_random(count, manifest_uri))
            .await
    }

    async fn set_winner(&self, winner: Address) -> Result<TxOutcome, ChainError> {
        self.submit(self.fameish, calldata::set_winner(winner)).await
    }

    async fn bulk_follow(&self, accounts: &[Address]) -> Result<TxOutcome, ChainError> {
        self.submit(self.fameish, calldata::bulk_follow(accounts))
            .await
    }
}

#[async_trait]
impl SocialGraph for LensChain {
    async fn is_following(
        &self,
        follower: Address,
        followee: Address,
    ) -> Result<bool, ChainError> {
        let ret = self
            .read(self.graph, calldata::is_following(follower, followee))
            .await?;
        calldata::decode_bool(&ret)
    }

    async fn unfollow_for(
        &self,
        account: Address,
        target: Address,
    ) -> Result<TxOutcome, ChainError> {
        // The unfollow is executed by the entrant's own smart account, with
        // the manager as the authorized transaction executor.
        let inner = calldata::unfollow(account, target);
        let wrapped = calldata::execute_transaction(self.graph, 0, &inner);
        self.submit(account, wrapped).await
    }
}

#[async_trait]
impl AccountDelegation for LensChain {
    async fn delegation_status(
        &self,
        account: Address,
        signer: Address,
        platform: Address,
    ) -> Result<DelegationStatus, ChainError> {
        let to = account.to_hex();
        let signer_call = format!(
            "0x{}",
            hex::encode(calldata::can_execute_transactions(signer))
        );
        let platform_call = format!(
            "0x{}",
            hex::encode(calldata::can_execute_transactions(platform))
        );
        let results = self
            .rpc
            .batch(&[
                ("eth_call", json!([{"to": to, "data": signer_call}, "latest"])),
                ("eth_call", json!([{"to": to, "data": platform_call}, "latest"])),
            ])
            .await?;

        let mut flags = [false; 2];
        for (slot, result) in results.into_iter().enumerate() {
            let value = result?;
            let raw = value
                .as_str()
                .ok_or_else(|| ChainError::BadResponse("eth_call result not a string".into()))?;
            let bytes = hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
                .map_err(|e| ChainError::BadResponse(e.to_string()))?;
            flags[slot] = calldata::decode_bool(&bytes)?;
        }
        Ok(DelegationStatus {
            signer_can_execute: flags[0],
            platform_can_execute: flags[1],
        })
    }

    async fn reputation_score(
        &self,
        owner: Address,
        account: Address,
        reputation_contract: Address,
    ) -> Result<u64, ChainError> {
        let ret = self
            .read(
                reputation_contract,
                calldata::get_score_by_address(owner, account),
            )
            .await?;
        calldata::decode_uint(&ret)
    }
}
