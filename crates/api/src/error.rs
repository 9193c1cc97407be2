//! Error taxonomy for the HTTP surface.
//!
//! Every failing gate maps onto one of these; the status code falls out of
//! the variant, and the body is always structured JSON.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fameish_chain::ChainError;
use fameish_identity::IdentityError;
use fameish_rotation::RotationError;
use fameish_store::StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Auth(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("account already exists")]
    Conflict,

    #[error("dependency failure: {0}")]
    Dependency(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::Dependency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(json!({ "success": false, "error": self.to_string() })),
        )
            .into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(_) => AppError::Conflict,
            other => AppError::Dependency(other.to_string()),
        }
    }
}

impl From<ChainError> for AppError {
    fn from(e: ChainError) -> Self {
        AppError::Dependency(e.to_string())
    }
}

impl From<IdentityError> for AppError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::MalformedClaims(msg) => AppError::Forbidden(msg),
            IdentityError::Verification(msg) => AppError::Auth(msg),
            IdentityError::UnknownKey(kid) => AppError::Auth(format!("unknown signing key {kid:?}")),
            IdentityError::Directory(msg) => AppError::Dependency(msg),
        }
    }
}

impl From<RotationError> for AppError {
    fn from(e: RotationError) -> Self {
        AppError::Dependency(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Auth("x".into()).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Forbidden("x".into()).into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Validation("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Conflict.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Dependency("x".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_duplicate_is_conflict() {
        let err: AppError = StoreError::Duplicate("0xabc".into()).into();
        assert!(matches!(err, AppError::Conflict));
        let err: AppError = StoreError::Read("boom".into()).into();
        assert!(matches!(err, AppError::Dependency(_)));
    }

    #[test]
    fn test_identity_mapping() {
        let err: AppError = IdentityError::MalformedClaims("no sub".into()).into();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err: AppError = IdentityError::Verification("bad sig".into()).into();
        assert!(matches!(err, AppError::Auth(_)));
    }
}
