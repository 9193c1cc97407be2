//! Typed service configuration, resolved once at startup.
//!
//! Every value is read and parsed eagerly so a misconfigured deployment
//! dies at boot instead of on first use.

use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use fameish_core::Address;
use tracing::{info, warn};

/// Deployment environment. Production enables the edge-layer transport
/// gate on the signup endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: Environment,
    /// Chain RPC endpoint and chain id for manifest ACLs and signing.
    pub rpc_url: String,
    pub chain_id: u64,
    /// Fameish winner contract.
    pub fameish_contract: Address,
    /// Global social graph contract.
    pub graph_contract: Address,
    /// The platform's own designated account that every entrant follows.
    pub platform_account: Address,
    /// Reputation score contract for the signup fallback gate.
    pub reputation_contract: Address,
    pub min_account_score: u64,
    pub min_reputation_score: u64,
    /// Custodial account-manager private key (hex).
    pub manager_key: String,
    /// Shared secret for the cron trigger.
    pub cron_secret: String,
    /// Shared secret set by the upstream edge layer.
    pub edge_secret: String,
    /// Identity provider JWKS endpoint.
    pub jwks_uri: String,
    /// Lens directory GraphQL endpoint.
    pub lens_api_url: String,
    /// Immutable content storage endpoint.
    pub storage_url: String,
    pub db_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("FAMEISH_PORT", "3100"),
            environment: match var("FAMEISH_ENV").as_deref() {
                Ok("production") => Environment::Production,
                _ => Environment::Development,
            },
            rpc_url: require("LENS_RPC_URL"),
            chain_id: try_load("LENS_CHAIN_ID", "232"),
            fameish_contract: parse_require("FAMEISH_CONTRACT_ADDRESS"),
            graph_contract: parse_require("LENS_GLOBAL_GRAPH_ADDRESS"),
            platform_account: parse_require("FAMEISH_ACCOUNT_ADDRESS"),
            reputation_contract: parse_require("LENS_REP_ADDRESS"),
            min_account_score: try_load("LENS_MIN_ACCOUNT_SCORE", "50"),
            min_reputation_score: try_load("MIN_LENS_REP_SCORE", "100"),
            manager_key: require("LENS_ACCOUNT_MANAGER_PRIVATE_KEY"),
            cron_secret: require("CRON_SECRET"),
            edge_secret: require("MIDDLEWARE_SECRET"),
            jwks_uri: require("LENS_JWKS_URI"),
            lens_api_url: try_load("LENS_API_URL", "https://api.lens.xyz/graphql"),
            storage_url: try_load("LENS_STORAGE_URL", "https://api.grove.storage"),
            db_path: PathBuf::from(try_load::<String>("FAMEISH_DB_PATH", "fameish.db")),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| ())
}

fn require(key: &str) -> String {
    var(key)
        .map_err(|_| warn!("Required environment variable {key} not set"))
        .expect("Environment misconfigured!")
}

fn parse_require<T: FromStr>(key: &str) -> T
where
    T::Err: Display,
{
    require(key)
        .parse()
        .map_err(|e| warn!("Invalid {key} value: {e}"))
        .expect("Environment misconfigured!")
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| warn!("Invalid {key} value: {e}"))
        .expect("Environment misconfigured!")
}
