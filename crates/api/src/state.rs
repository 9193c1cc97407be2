//! Shared application state wired from the environment config.

use std::sync::Arc;

use fameish_chain::{
    AccountDelegation, LensChain, ManagerSigner, RpcClient, SocialGraph, WinnerContract,
};
use fameish_identity::{CredentialVerifier, LensApiClient, LensDirectory};
use fameish_rotation::{RotationConfig, RotationJob};
use fameish_storage::{ContentStore, GroveClient};
use fameish_store::{EntrantStore, SqliteStore};

use crate::config::Config;
use crate::signup::{SignupPipeline, SignupPolicy};

pub struct AppState {
    pub config: Config,
    pub verifier: CredentialVerifier,
    pub signup: SignupPipeline,
    store: Arc<dyn EntrantStore>,
    contract: Arc<dyn WinnerContract>,
    graph: Arc<dyn SocialGraph>,
    directory: Arc<dyn LensDirectory>,
    content: Arc<dyn ContentStore>,
}

impl AppState {
    /// Wire the production dependency graph. Panics on a malformed manager
    /// key or an unopenable database, both unrecoverable at startup.
    pub fn from_config(config: Config) -> Arc<Self> {
        let signer = ManagerSigner::from_hex_key(&config.manager_key, config.chain_id)
            .expect("Environment misconfigured!");
        let chain = Arc::new(LensChain::new(
            RpcClient::new(config.rpc_url.clone()),
            signer,
            config.fameish_contract,
            config.graph_contract,
        ));
        let store: Arc<dyn EntrantStore> = Arc::new(
            SqliteStore::open(config.db_path.as_ref()).expect("Environment misconfigured!"),
        );
        let directory: Arc<dyn LensDirectory> =
            Arc::new(LensApiClient::new(config.lens_api_url.clone()));
        let content: Arc<dyn ContentStore> =
            Arc::new(GroveClient::new(config.storage_url.clone(), config.chain_id));
        let verifier = CredentialVerifier::new(config.jwks_uri.clone());

        let contract: Arc<dyn WinnerContract> = chain.clone();
        let graph: Arc<dyn SocialGraph> = chain.clone();
        let delegation: Arc<dyn AccountDelegation> = chain;

        let signup = SignupPipeline::new(
            store.clone(),
            contract.clone(),
            graph.clone(),
            delegation,
            directory.clone(),
            SignupPolicy {
                platform_account: config.platform_account,
                reputation_contract: config.reputation_contract,
                min_account_score: config.min_account_score,
                min_reputation_score: config.min_reputation_score,
            },
        );

        Arc::new(Self {
            config,
            verifier,
            signup,
            store,
            contract,
            graph,
            directory,
            content,
        })
    }

    /// State over injected doubles, bypassing the environment.
    #[cfg(test)]
    pub(crate) fn for_tests(
        config: Config,
        store: Arc<dyn EntrantStore>,
        contract: Arc<dyn WinnerContract>,
        graph: Arc<dyn SocialGraph>,
        delegation: Arc<dyn AccountDelegation>,
        directory: Arc<dyn LensDirectory>,
        content: Arc<dyn ContentStore>,
    ) -> Arc<Self> {
        let verifier = CredentialVerifier::new(config.jwks_uri.clone());
        let signup = SignupPipeline::new(
            store.clone(),
            contract.clone(),
            graph.clone(),
            delegation,
            directory.clone(),
            SignupPolicy {
                platform_account: config.platform_account,
                reputation_contract: config.reputation_contract,
                min_account_score: config.min_account_score,
                min_reputation_score: config.min_reputation_score,
            },
        );
        Arc::new(Self {
            config,
            verifier,
            signup,
            store,
            contract,
            graph,
            directory,
            content,
        })
    }

    /// A fresh rotation job over the shared collaborators.
    pub fn rotation_job(&self) -> RotationJob {
        RotationJob::new(
            self.store.clone(),
            self.contract.clone(),
            self.graph.clone(),
            self.directory.clone(),
            self.content.clone(),
            RotationConfig::default(),
        )
    }
}
