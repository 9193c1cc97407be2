//! Lens directory API client.
//!
//! Two reads the pipelines need from the protocol's indexer: account
//! lookup (owner plus protocol-native score) and batched follow status,
//! which reports both the confirmed on-chain edge and the indexer's
//! optimistic view.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use fameish_core::Address;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::IdentityError;

/// Directory view of one Lens account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountInfo {
    pub address: Address,
    /// The EOA that owns the smart account (reputation lookups key on it).
    pub owner: Address,
    /// Protocol-native account score.
    pub score: u64,
}

/// Follow status for one (follower, account) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowStatus {
    pub follower: Address,
    /// Confirmed on-chain follow edge.
    pub on_chain: bool,
    /// Indexer's optimistic view (follow submitted, not yet confirmed).
    pub optimistic: bool,
}

impl FollowStatus {
    /// An account counts as following when either view says so.
    pub fn is_following(&self) -> bool {
        self.on_chain || self.optimistic
    }
}

/// Directory seam used by both core workflows.
#[async_trait]
pub trait LensDirectory: Send + Sync {
    /// Look up one account; `None` when the directory has no record of it.
    async fn fetch_account(&self, address: Address) -> Result<Option<AccountInfo>, IdentityError>;
    /// Follow status for each `(follower, account)` pair, in input order.
    async fn follow_status(
        &self,
        pairs: &[(Address, Address)],
    ) -> Result<Vec<FollowStatus>, IdentityError>;
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct AccountData {
    account: Option<AccountBody>,
}

#[derive(Debug, Deserialize)]
struct AccountBody {
    address: Address,
    owner: Address,
    score: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FollowStatusData {
    follow_status: Vec<FollowStatusBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FollowStatusBody {
    follower: Address,
    is_following: FollowFlags,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FollowFlags {
    on_chain: bool,
    optimistic: bool,
}

/// HTTP client for the Lens GraphQL API.
pub struct LensApiClient {
    http: reqwest::Client,
    url: String,
}

impl LensApiClient {
    pub fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }

    async fn query<T: for<'de> Deserialize<'de>>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, IdentityError> {
        let response: GraphQlResponse<T> = self
            .http
            .post(&self.url)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?
            .json()
            .await?;
        response
            .data
            .ok_or_else(|| IdentityError::Directory("response carried no data".into()))
    }
}

#[async_trait]
impl LensDirectory for LensApiClient {
    async fn fetch_account(&self, address: Address) -> Result<Option<AccountInfo>, IdentityError> {
        let data: AccountData = self
            .query(
                "query Account($request: AccountRequest!) {
                    account(request: $request) { address owner score }
                }",
                json!({ "request": { "address": address } }),
            )
            .await?;
        debug!(%address, found = data.account.is_some(), "directory account lookup");
        Ok(data.account.map(|body| AccountInfo {
            address: body.address,
            owner: body.owner,
            score: body.score,
        }))
    }

    async fn follow_status(
        &self,
        pairs: &[(Address, Address)],
    ) -> Result<Vec<FollowStatus>, IdentityError> {
        let request: Vec<_> = pairs
            .iter()
            .map(|(follower, account)| json!({ "follower": follower, "account": account }))
            .collect();
        let data: FollowStatusData = self
            .query(
                "query FollowStatus($request: FollowStatusRequest!) {
                    followStatus(request: $request) {
                        follower
                        isFollowing { onChain optimistic }
                    }
                }",
                json!({ "request": { "pairs": request } }),
            )
            .await?;
        Ok(data
            .follow_status
            .into_iter()
            .map(|body| FollowStatus {
                follower: body.follower,
                on_chain: body.is_following.on_chain,
                optimistic: body.is_following.optimistic,
            })
            .collect())
    }
}

/// Scriptable directory double.
#[derive(Default)]
pub struct StaticDirectory {
    accounts: Mutex<HashMap<Address, AccountInfo>>,
    on_chain: Mutex<HashSet<(Address, Address)>>,
    optimistic: Mutex<HashSet<(Address, Address)>>,
    fetches: Mutex<usize>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&self, info: AccountInfo) {
        self.accounts.lock().unwrap().insert(info.address, info);
    }

    pub fn set_following(&self, follower: Address, account: Address) {
        self.on_chain.lock().unwrap().insert((follower, account));
    }

    pub fn set_following_optimistic(&self, follower: Address, account: Address) {
        self.optimistic.lock().unwrap().insert((follower, account));
    }

    /// Number of account lookups served.
    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl LensDirectory for StaticDirectory {
    async fn fetch_account(&self, address: Address) -> Result<Option<AccountInfo>, IdentityError> {
        *self.fetches.lock().unwrap() += 1;
        Ok(self.accounts.lock().unwrap().get(&address).copied())
    }

    async fn follow_status(
        &self,
        pairs: &[(Address, Address)],
    ) -> Result<Vec<FollowStatus>, IdentityError> {
        let on_chain = self.on_chain.lock().unwrap();
        let optimistic = self.optimistic.lock().unwrap();
        Ok(pairs
            .iter()
            .map(|&(follower, account)| FollowStatus {
                follower,
                on_chain: on_chain.contains(&(follower, account)),
                optimistic: optimistic.contains(&(follower, account)),
            })
            .collect())
    }
}
