use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use fameish_chain::{ChainCall, DryRunChain};
use fameish_core::{Address, VerificationSource};
use fameish_identity::{AccountInfo, IdentityClaims, StaticDirectory};
use fameish_storage::MemoryStore;
use fameish_store::{EntrantStore, SqliteStore};
use tower::ServiceExt;

use crate::config::{Config, Environment};
use crate::error::AppError;
use crate::router;
use crate::signup::{SignupPipeline, SignupPolicy};
use crate::state::AppState;

fn addr(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

const MIN_ACCOUNT_SCORE: u64 = 50;
const MIN_REPUTATION_SCORE: u64 = 100;

struct Harness {
    chain: Arc<DryRunChain>,
    directory: Arc<StaticDirectory>,
    store: Arc<SqliteStore>,
    pipeline: SignupPipeline,
    platform: Address,
}

impl Harness {
    fn new() -> Self {
        let chain = Arc::new(DryRunChain::new());
        let directory = Arc::new(StaticDirectory::new());
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let platform = addr(0xf0);
        let pipeline = SignupPipeline::new(
            store.clone(),
            chain.clone(),
            chain.clone(),
            chain.clone(),
            directory.clone(),
            SignupPolicy {
                platform_account: platform,
                reputation_contract: addr(0xf1),
                min_account_score: MIN_ACCOUNT_SCORE,
                min_reputation_score: MIN_REPUTATION_SCORE,
            },
        );
        Self {
            chain,
            directory,
            store,
            pipeline,
            platform,
        }
    }

    fn claims(&self, signer: Address, account: Address) -> IdentityClaims {
        IdentityClaims { signer, account }
    }

    fn config(&self, environment: Environment) -> Config {
        Config {
            port: 0,
            environment,
            rpc_url: "http://localhost:8545".into(),
            chain_id: 37111,
            fameish_contract: addr(0xfa),
            graph_contract: addr(0xfb),
            platform_account: self.platform,
            reputation_contract: addr(0xf1),
            min_account_score: MIN_ACCOUNT_SCORE,
            min_reputation_score: MIN_REPUTATION_SCORE,
            manager_key: "0x01".into(),
            cron_secret: "cron-secret".into(),
            edge_secret: "edge-secret".into(),
            jwks_uri: "http://localhost/jwks".into(),
            lens_api_url: "http://localhost/graphql".into(),
            storage_url: "http://localhost/storage".into(),
            db_path: PathBuf::from("unused.db"),
        }
    }

    /// The full router over this harness's doubles.
    fn app(&self, environment: Environment) -> axum::Router {
        let state = AppState::for_tests(
            self.config(environment),
            self.store.clone(),
            self.chain.clone(),
            self.chain.clone(),
            self.chain.clone(),
            self.directory.clone(),
            Arc::new(MemoryStore::new()),
        );
        router(state)
    }

    /// Script an account that would pass every gate on its protocol score.
    fn make_eligible(&self, account: Address, signer: Address, score: u64) {
        self.directory.add_account(AccountInfo {
            address: account,
            owner: addr(0xee),
            score,
        });
        self.chain.allow_executor(account, signer);
        self.chain.allow_executor(account, self.platform);
        self.chain.add_following(account, self.platform);
    }
}

#[tokio::test]
async fn test_happy_path_records_account_score_source() {
    let h = Harness::new();
    let (signer, account) = (addr(1), addr(2));
    h.make_eligible(account, signer, 80);

    let entrant = h
        .pipeline
        .register(&h.claims(signer, account), account)
        .await
        .unwrap();

    assert_eq!(entrant.account, account);
    assert_eq!(
        entrant.verification_source,
        Some(VerificationSource::AccountScore)
    );
    assert!(h.store.find_by_account(account).unwrap().is_some());
}

#[tokio::test]
async fn test_mismatched_claim_rejected_before_any_lookup() {
    let h = Harness::new();
    let (signer, account) = (addr(1), addr(2));
    h.make_eligible(account, signer, 80);

    let err = h
        .pipeline
        .register(&h.claims(signer, addr(3)), account)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Auth(_)));
    assert_eq!(h.chain.call_count(), 0);
    assert_eq!(h.directory.fetch_count(), 0);
    assert!(h.store.find_by_account(account).unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_account_rejected() {
    let h = Harness::new();
    let (signer, account) = (addr(1), addr(2));

    let err = h
        .pipeline
        .register(&h.claims(signer, account), account)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Auth(_)));
    assert_eq!(h.directory.fetch_count(), 1);
}

#[tokio::test]
async fn test_low_score_falls_back_to_reputation() {
    let h = Harness::new();
    let (signer, account) = (addr(1), addr(2));
    h.make_eligible(account, signer, 10);
    h.chain.set_reputation(account, 200);

    let entrant = h
        .pipeline
        .register(&h.claims(signer, account), account)
        .await
        .unwrap();

    assert_eq!(
        entrant.verification_source,
        Some(VerificationSource::ReputationScore)
    );
}

#[tokio::test]
async fn test_failed_reputation_read_counts_as_zero() {
    let h = Harness::new();
    let (signer, account) = (addr(1), addr(2));
    // Score below minimum and no reputation entry scripted, so the lookup
    // errors; the gate must treat that as zero and reject, not 500.
    h.make_eligible(account, signer, 10);

    let err = h
        .pipeline
        .register(&h.claims(signer, account), account)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Auth(_)));
    assert!(h.store.find_by_account(account).unwrap().is_none());
}

#[tokio::test]
async fn test_delegation_gate_requires_both_managers() {
    for keep_signer in [true, false] {
        let h = Harness::new();
        let (signer, account) = (addr(1), addr(2));
        h.directory.add_account(AccountInfo {
            address: account,
            owner: addr(0xee),
            score: 80,
        });
        if keep_signer {
            h.chain.allow_executor(account, signer);
        } else {
            h.chain.allow_executor(account, h.platform);
        }
        h.chain.add_following(account, h.platform);

        let err = h
            .pipeline
            .register(&h.claims(signer, account), account)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Auth(_)));
        assert!(h.store.find_by_account(account).unwrap().is_none());
    }
}

#[tokio::test]
async fn test_duplicate_signup_conflicts_and_keeps_one_record() {
    let h = Harness::new();
    let (signer, account) = (addr(1), addr(2));
    h.make_eligible(account, signer, 80);

    h.pipeline
        .register(&h.claims(signer, account), account)
        .await
        .unwrap();
    let err = h
        .pipeline
        .register(&h.claims(signer, account), account)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict));
    assert_eq!(h.store.record_count().unwrap(), 1);
}

#[tokio::test]
async fn test_must_already_follow_platform() {
    let h = Harness::new();
    let (signer, account) = (addr(1), addr(2));
    h.directory.add_account(AccountInfo {
        address: account,
        owner: addr(0xee),
        score: 80,
    });
    h.chain.allow_executor(account, signer);
    h.chain.allow_executor(account, h.platform);

    let err = h
        .pipeline
        .register(&h.claims(signer, account), account)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Auth(_)));
    assert!(h.store.find_by_account(account).unwrap().is_none());
}

#[tokio::test]
async fn test_onboarding_follow_submitted_for_live_winner() {
    let h = Harness::new();
    let (signer, account, winner) = (addr(1), addr(2), addr(9));
    h.make_eligible(account, signer, 80);
    h.chain.set_winner_state(Some(winner));

    h.pipeline
        .register(&h.claims(signer, account), account)
        .await
        .unwrap();

    assert!(h
        .chain
        .calls()
        .contains(&ChainCall::BulkFollow(vec![account])));
    assert!(h.chain.is_following_state(account, winner));
}

#[tokio::test]
async fn test_no_onboarding_follow_when_already_following_winner() {
    let h = Harness::new();
    let (signer, account, winner) = (addr(1), addr(2), addr(9));
    h.make_eligible(account, signer, 80);
    h.chain.set_winner_state(Some(winner));
    h.chain.add_following(account, winner);

    h.pipeline
        .register(&h.claims(signer, account), account)
        .await
        .unwrap();

    assert!(!h
        .chain
        .calls()
        .iter()
        .any(|c| matches!(c, ChainCall::BulkFollow(_))));
}

// -- handler layer --

fn trigger_request(auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri("/api/winner/new");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::empty()).unwrap()
}

fn signup_request(headers: &[(&str, &str)], body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/user")
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_trigger_rejects_wrong_secret() {
    let h = Harness::new();
    let response = h
        .app(Environment::Development)
        .oneshot(trigger_request(Some("Bearer wrong")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    // the rotation job never started
    assert_eq!(h.chain.call_count(), 0);
}

#[tokio::test]
async fn test_trigger_rejects_missing_authorization() {
    let h = Harness::new();
    let response = h
        .app(Environment::Development)
        .oneshot(trigger_request(None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(h.chain.call_count(), 0);
}

#[tokio::test]
async fn test_trigger_runs_rotation_with_valid_secret() {
    let h = Harness::new();
    let response = h
        .app(Environment::Development)
        .oneshot(trigger_request(Some("Bearer cron-secret")))
        .await
        .unwrap();

    // empty entrant table: the cycle is a no-op but still a success
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_signup_production_requires_edge_secret() {
    let h = Harness::new();
    let body = format!(r#"{{"account":"{}"}}"#, addr(2));
    let response = h
        .app(Environment::Production)
        .oneshot(signup_request(
            &[("authorization", "Bearer tok"), ("x-secret", "wrong")],
            &body,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(h.store.find_by_account(addr(2)).unwrap().is_none());
}

#[tokio::test]
async fn test_signup_production_requires_forwarded_identity() {
    let h = Harness::new();
    let body = format!(r#"{{"account":"{}"}}"#, addr(2));
    let response = h
        .app(Environment::Production)
        .oneshot(signup_request(
            &[
                ("authorization", "Bearer tok"),
                ("x-secret", "edge-secret"),
                ("x-user-sub", "0xabc"),
            ],
            &body,
        ))
        .await
        .unwrap();

    // x-user-act is missing
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signup_edge_gate_skipped_in_development() {
    let h = Harness::new();
    // No edge headers at all; the request gets past the transport gate and
    // fails on the malformed account instead.
    let response = h
        .app(Environment::Development)
        .oneshot(signup_request(
            &[("authorization", "Bearer tok")],
            r#"{"account":"not-an-address"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signup_rejects_malformed_account() {
    let h = Harness::new();
    let response = h
        .app(Environment::Development)
        .oneshot(signup_request(
            &[("authorization", "Bearer tok")],
            r#"{"account":"0x1234"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.chain.call_count(), 0);
}

#[tokio::test]
async fn test_signup_requires_bearer_token() {
    let h = Harness::new();
    let body = format!(r#"{{"account":"{}"}}"#, addr(2));
    let response = h
        .app(Environment::Development)
        .oneshot(signup_request(&[], &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_failed_onboarding_follow_is_a_hard_rejection() {
    let h = Harness::new();
    let (signer, account, winner) = (addr(1), addr(2), addr(9));
    h.make_eligible(account, signer, 80);
    h.chain.set_winner_state(Some(winner));
    h.chain.fail_bulk_follow_batch(0);

    let err = h
        .pipeline
        .register(&h.claims(signer, account), account)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Dependency(_)));
    assert!(h.store.find_by_account(account).unwrap().is_none());
}
