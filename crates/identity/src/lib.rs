//! Fameish Identity
//!
//! Identity-provider collaborators for the signup pipeline: bearer
//! credential verification against the provider's remote key set, and the
//! Lens directory API (account lookup, batched follow status).

mod credential;
mod directory;

pub use credential::{extract_claims, CredentialVerifier, IdentityClaims, TokenPayload};
pub use directory::{AccountInfo, FollowStatus, LensApiClient, LensDirectory, StaticDirectory};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    /// Credential failed signature or temporal validation. Fails closed.
    #[error("credential verification failed: {0}")]
    Verification(String),
    /// Structurally valid token carrying claims we cannot use.
    #[error("malformed credential claims: {0}")]
    MalformedClaims(String),
    #[error("no signing key for kid {0:?}")]
    UnknownKey(Option<String>),
    #[error("directory request failed: {0}")]
    Directory(String),
}

impl From<reqwest::Error> for IdentityError {
    fn from(e: reqwest::Error) -> Self {
        IdentityError::Directory(e.to_string())
    }
}
