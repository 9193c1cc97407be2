//! Scriptable chain double for tests. Records every call and lets tests
//! pre-load contract state and inject per-call failures.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use fameish_core::Address;
use tracing::debug;

use crate::client::{AccountDelegation, DelegationStatus, SocialGraph, TxOutcome, WinnerContract};
use crate::ChainError;

/// One recorded interaction with the double.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainCall {
    Winner,
    FollowerIndex,
    SelectRandom { count: u64, manifest_uri: String },
    SetWinner(Address),
    BulkFollow(Vec<Address>),
    IsFollowing { follower: Address, followee: Address },
    UnfollowFor { account: Address, target: Address },
    DelegationStatus { account: Address, signer: Address, platform: Address },
    ReputationScore { owner: Address, account: Address },
}

#[derive(Default)]
struct DryRunState {
    winner: Option<Address>,
    follower_index: u64,
    following: HashSet<(Address, Address)>,
    /// (account, executor) pairs allowed by `canExecuteTransactions`.
    delegation: HashSet<(Address, Address)>,
    reputation: HashMap<Address, u64>,
    fail_winner_read: bool,
    fail_select_random: bool,
    fail_set_winner: bool,
    /// Bulk-follow submissions (by order, zero-based) that must fail.
    fail_bulk_follow_batches: HashSet<usize>,
    fail_unfollow_accounts: HashSet<Address>,
    bulk_follow_submissions: usize,
    tx_counter: usize,
    calls: Vec<ChainCall>,
}

/// Recording chain double implementing all three contract traits.
#[derive(Default)]
pub struct DryRunChain {
    state: Mutex<DryRunState>,
}

impl DryRunChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn rpc_error(message: &str) -> ChainError {
        ChainError::Rpc {
            code: -32000,
            message: message.to_string(),
        }
    }

    fn record(&self, call: ChainCall) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn next_tx(&self) -> TxOutcome {
        let mut state = self.state.lock().unwrap();
        state.tx_counter += 1;
        TxOutcome {
            hash: format!("0xdryrun{:04x}", state.tx_counter),
        }
    }

    // -- script API --

    pub fn set_winner_state(&self, winner: Option<Address>) {
        self.state.lock().unwrap().winner = winner;
    }

    pub fn set_follower_index(&self, index: u64) {
        self.state.lock().unwrap().follower_index = index;
    }

    pub fn add_following(&self, follower: Address, followee: Address) {
        self.state.lock().unwrap().following.insert((follower, followee));
    }

    pub fn allow_executor(&self, account: Address, executor: Address) {
        self.state.lock().unwrap().delegation.insert((account, executor));
    }

    pub fn set_reputation(&self, account: Address, score: u64) {
        self.state.lock().unwrap().reputation.insert(account, score);
    }

    pub fn fail_winner_read(&self) {
        self.state.lock().unwrap().fail_winner_read = true;
    }

    pub fn fail_select_random(&self) {
        self.state.lock().unwrap().fail_select_random = true;
    }

    pub fn fail_set_winner(&self) {
        self.state.lock().unwrap().fail_set_winner = true;
    }

    /// Fail the `n`th bulk-follow submission (zero-based, in order).
    pub fn fail_bulk_follow_batch(&self, n: usize) {
        self.state.lock().unwrap().fail_bulk_follow_batches.insert(n);
    }

    pub fn fail_unfollow(&self, account: Address) {
        self.state.lock().unwrap().fail_unfollow_accounts.insert(account);
    }

    // -- inspection API --

    pub fn calls(&self) -> Vec<ChainCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn winner_state(&self) -> Option<Address> {
        self.state.lock().unwrap().winner
    }

    pub fn is_following_state(&self, follower: Address, followee: Address) -> bool {
        self.state
            .lock()
            .unwrap()
            .following
            .contains(&(follower, followee))
    }
}

#[async_trait]
impl WinnerContract for DryRunChain {
    async fn winner(&self) -> Result<Option<Address>, ChainError> {
        self.record(ChainCall::Winner);
        let state = self.state.lock().unwrap();
        if state.fail_winner_read {
            return Err(Self::rpc_error("winner read failed"));
        }
        Ok(state.winner)
    }

    async fn follower_index(&self) -> Result<u64, ChainError> {
        self.record(ChainCall::FollowerIndex);
        Ok(self.state.lock().unwrap().follower_index)
    }

    async fn select_random(&self, count: u64, manifest_uri: &str) -> Result<TxOutcome, ChainError> {
        self.record(ChainCall::SelectRandom {
            count,
            manifest_uri: manifest_uri.to_string(),
        });
        if self.state.lock().unwrap().fail_select_random {
            return Err(Self::rpc_error("selectRandom reverted"));
        }
        debug!(count, manifest_uri, "dry-run: selectRandom");
        Ok(self.next_tx())
    }

    async fn set_winner(&self, winner: Address) -> Result<TxOutcome, ChainError> {
        self.record(ChainCall::SetWinner(winner));
        if self.state.lock().unwrap().fail_set_winner {
            return Err(Self::rpc_error("setWinner reverted"));
        }
        self.state.lock().unwrap().winner = Some(winner);
        Ok(self.next_tx())
    }

    async fn bulk_follow(&self, accounts: &[Address]) -> Result<TxOutcome, ChainError> {
        self.record(ChainCall::BulkFollow(accounts.to_vec()));
        let failed = {
            let mut state = self.state.lock().unwrap();
            let index = state.bulk_follow_submissions;
            state.bulk_follow_submissions += 1;
            state.fail_bulk_follow_batches.contains(&index)
        };
        if failed {
            return Err(Self::rpc_error("bulkFollow reverted"));
        }
        {
            let mut state = self.state.lock().unwrap();
            if let Some(winner) = state.winner {
                for account in accounts {
                    state.following.insert((*account, winner));
                }
            }
        }
        Ok(self.next_tx())
    }
}

#[async_trait]
impl SocialGraph for DryRunChain {
    async fn is_following(
        &self,
        follower: Address,
        followee: Address,
    ) -> Result<bool, ChainError> {
        self.record(ChainCall::IsFollowing { follower, followee });
        Ok(self
            .state
            .lock()
            .unwrap()
            .following
            .contains(&(follower, followee)))
    }

    async fn unfollow_for(
        &self,
        account: Address,
        target: Address,
    ) -> Result<TxOutcome, ChainError> {
        self.record(ChainCall::UnfollowFor { account, target });
        let mut state = self.state.lock().unwrap();
        if state.fail_unfollow_accounts.contains(&account) {
            return Err(Self::rpc_error("executeTransaction reverted"));
        }
        state.following.remove(&(account, target));
        drop(state);
        Ok(self.next_tx())
    }
}

#[async_trait]
impl AccountDelegation for DryRunChain {
    async fn delegation_status(
        &self,
        account: Address,
        signer: Address,
        platform: Address,
    ) -> Result<DelegationStatus, ChainError> {
        self.record(ChainCall::DelegationStatus {
            account,
            signer,
            platform,
        });
        let state = self.state.lock().unwrap();
        Ok(DelegationStatus {
            signer_can_execute: state.delegation.contains(&(account, signer)),
            platform_can_execute: state.delegation.contains(&(account, platform)),
        })
    }

    async fn reputation_score(
        &self,
        owner: Address,
        account: Address,
        _reputation_contract: Address,
    ) -> Result<u64, ChainError> {
        self.record(ChainCall::ReputationScore { owner, account });
        self.state
            .lock()
            .unwrap()
            .reputation
            .get(&account)
            .copied()
            .ok_or_else(|| Self::rpc_error("getScoreByAddress reverted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    #[tokio::test]
    async fn test_set_winner_updates_state() {
        let chain = DryRunChain::new();
        assert_eq!(chain.winner().await.unwrap(), None);
        chain.set_winner(addr(0x01)).await.unwrap();
        assert_eq!(chain.winner().await.unwrap(), Some(addr(0x01)));
    }

    #[tokio::test]
    async fn test_bulk_follow_failure_injection_by_order() {
        let chain = DryRunChain::new();
        chain.fail_bulk_follow_batch(1);
        assert!(chain.bulk_follow(&[addr(0x01)]).await.is_ok());
        assert!(chain.bulk_follow(&[addr(0x02)]).await.is_err());
        assert!(chain.bulk_follow(&[addr(0x03)]).await.is_ok());
    }

    #[tokio::test]
    async fn test_unfollow_removes_edge() {
        let chain = DryRunChain::new();
        chain.add_following(addr(0x01), addr(0x02));
        assert!(chain.is_following(addr(0x01), addr(0x02)).await.unwrap());
        chain.unfollow_for(addr(0x01), addr(0x02)).await.unwrap();
        assert!(!chain.is_following(addr(0x01), addr(0x02)).await.unwrap());
    }

    #[tokio::test]
    async fn test_records_calls_in_order() {
        let chain = DryRunChain::new();
        let _ = chain.winner().await;
        let _ = chain.follower_index().await;
        assert_eq!(
            chain.calls(),
            vec![ChainCall::Winner, ChainCall::FollowerIndex]
        );
    }
}
