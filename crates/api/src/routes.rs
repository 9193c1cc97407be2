//! HTTP handlers for the rotation trigger and the signup endpoint.

use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Json},
};
use fameish_core::Address;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub account: String,
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Auth("missing bearer token".to_string()))
}

/// `GET /api/winner/new`, guarded by the scheduler's shared secret.
pub async fn rotate_winner(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let token = bearer_token(&headers)?;
    if token != state.config.cron_secret {
        return Err(AppError::Auth("bad trigger secret".to_string()));
    }

    let outcome = state.rotation_job().run().await.map_err(|e| {
        error!(error = %e, "rotation cycle failed");
        AppError::from(e)
    })?;
    info!(
        winner = ?outcome.winner,
        entrants = outcome.entrant_count,
        "rotation cycle finished"
    );
    Ok(Json(json!({ "success": true })))
}

/// `POST /api/user`: verify the caller's credential, then run the signup
/// pipeline for the claimed account.
pub async fn signup(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    if state.config.is_production() {
        edge_gate(&state, &headers)?;
    }

    let token = bearer_token(&headers)?;
    let account: Address = body
        .account
        .parse()
        .map_err(|e| AppError::Validation(format!("invalid account address: {e}")))?;

    let claims = state.verifier.verify(token).await?;
    let entrant = state.signup.register(&claims, account).await?;
    Ok(Json(json!({ "success": true, "user": entrant })))
}

/// In production an upstream edge layer has already verified the credential
/// once; require its shared secret and forwarded identity headers.
fn edge_gate(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let secret = headers.get("x-secret").and_then(|v| v.to_str().ok());
    if secret != Some(state.config.edge_secret.as_str()) {
        return Err(AppError::Auth("bad edge secret".to_string()));
    }
    if !headers.contains_key("x-user-sub") || !headers.contains_key("x-user-act") {
        return Err(AppError::Auth("missing forwarded identity".to_string()));
    }
    Ok(())
}
