//! Bearer credential verification.
//!
//! The identity provider issues JWTs whose `sub` is the signing key's
//! address and whose `act.sub` is the delegated Lens account. Verification
//! runs against the provider's remote JWKS; claims extraction is a pure
//! function so the mapping from raw payload to validated claims is
//! testable without any key material.

use fameish_core::Address;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::IdentityError;

/// Validated identity: who signed, and which account they act for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityClaims {
    /// The credential's signing key address (`sub`).
    pub signer: Address,
    /// The delegated account address (`act.sub`).
    pub account: Address,
}

/// Raw claim payload as decoded from the token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPayload {
    pub sub: Option<String>,
    pub act: Option<ActClaim>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActClaim {
    pub sub: Option<String>,
}

/// Pure mapping from a decoded payload to validated claims.
pub fn extract_claims(payload: &TokenPayload) -> Result<IdentityClaims, IdentityError> {
    let signer = payload
        .sub
        .as_deref()
        .ok_or_else(|| IdentityError::MalformedClaims("missing sub".into()))?;
    let account = payload
        .act
        .as_ref()
        .and_then(|act| act.sub.as_deref())
        .ok_or_else(|| IdentityError::MalformedClaims("missing act.sub".into()))?;

    Ok(IdentityClaims {
        signer: signer
            .parse()
            .map_err(|_| IdentityError::MalformedClaims(format!("sub is not an address: {signer}")))?,
        account: account.parse().map_err(|_| {
            IdentityError::MalformedClaims(format!("act.sub is not an address: {account}"))
        })?,
    })
}

/// Verifies bearer tokens against a remote JWKS, caching the key set and
/// refetching once when an unknown `kid` shows up (key rotation).
pub struct CredentialVerifier {
    http: reqwest::Client,
    jwks_uri: String,
    keys: RwLock<Option<JwkSet>>,
}

impl CredentialVerifier {
    pub fn new(jwks_uri: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            jwks_uri,
            keys: RwLock::new(None),
        }
    }

    async fn fetch_keys(&self) -> Result<JwkSet, IdentityError> {
        debug!(uri = %self.jwks_uri, "fetching identity provider key set");
        let set: JwkSet = self.http.get(&self.jwks_uri).send().await?.json().await?;
        *self.keys.write().await = Some(set.clone());
        Ok(set)
    }

    async fn key_for(&self, kid: Option<&str>) -> Result<DecodingKey, IdentityError> {
        let cached = self.keys.read().await.clone();
        let set = match cached {
            Some(set) => set,
            None => self.fetch_keys().await?,
        };
        let jwk = match kid {
            Some(kid) => set.find(kid).cloned(),
            None => set.keys.first().cloned(),
        };
        // Unknown kid may just mean the provider rotated keys since our
        // last fetch; refetch once before failing closed.
        let jwk = match jwk {
            Some(jwk) => jwk,
            None => {
                let set = self.fetch_keys().await?;
                match kid {
                    Some(kid) => set.find(kid).cloned(),
                    None => set.keys.first().cloned(),
                }
                .ok_or_else(|| IdentityError::UnknownKey(kid.map(str::to_string)))?
            }
        };
        DecodingKey::from_jwk(&jwk).map_err(|e| IdentityError::Verification(e.to_string()))
    }

    /// Verify `token` and extract its identity claims. Any verification
    /// failure is terminal for the request (fails closed).
    pub async fn verify(&self, token: &str) -> Result<IdentityClaims, IdentityError> {
        let header =
            decode_header(token).map_err(|e| IdentityError::Verification(e.to_string()))?;
        let key = self.key_for(header.kid.as_deref()).await?;

        let mut validation = Validation::new(header.alg);
        validation.algorithms = vec![Algorithm::RS256, Algorithm::ES256];
        validation.validate_aud = false;

        let data = decode::<TokenPayload>(token, &key, &validation).map_err(|e| {
            warn!(error = %e, "credential verification failed");
            IdentityError::Verification(e.to_string())
        })?;
        extract_claims(&data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNER: &str = "0x1111111111111111111111111111111111111111";
    const ACCOUNT: &str = "0x2222222222222222222222222222222222222222";

    fn payload(sub: Option<&str>, act_sub: Option<&str>) -> TokenPayload {
        TokenPayload {
            sub: sub.map(str::to_string),
            act: act_sub.map(|s| ActClaim {
                sub: Some(s.to_string()),
            }),
        }
    }

    #[test]
    fn test_extract_claims_happy_path() {
        let claims = extract_claims(&payload(Some(SIGNER), Some(ACCOUNT))).unwrap();
        assert_eq!(claims.signer, SIGNER.parse().unwrap());
        assert_eq!(claims.account, ACCOUNT.parse().unwrap());
    }

    #[test]
    fn test_extract_claims_missing_sub() {
        assert!(matches!(
            extract_claims(&payload(None, Some(ACCOUNT))),
            Err(IdentityError::MalformedClaims(_))
        ));
    }

    #[test]
    fn test_extract_claims_missing_act() {
        assert!(matches!(
            extract_claims(&payload(Some(SIGNER), None)),
            Err(IdentityError::MalformedClaims(_))
        ));
        let no_inner = TokenPayload {
            sub: Some(SIGNER.to_string()),
            act: Some(ActClaim { sub: None }),
        };
        assert!(matches!(
            extract_claims(&no_inner),
            Err(IdentityError::MalformedClaims(_))
        ));
    }

    #[test]
    fn test_extract_claims_non_address_sub() {
        assert!(matches!(
            extract_claims(&payload(Some("not-an-address"), Some(ACCOUNT))),
            Err(IdentityError::MalformedClaims(_))
        ));
    }

    #[test]
    fn test_claims_normalize_case() {
        let upper = SIGNER.to_uppercase().replace("0X", "0x");
        let claims = extract_claims(&payload(Some(&upper), Some(ACCOUNT))).unwrap();
        assert_eq!(claims.signer, SIGNER.parse().unwrap());
    }

    #[test]
    fn test_payload_deserializes_from_token_json() {
        let json = format!(r#"{{"sub":"{SIGNER}","act":{{"sub":"{ACCOUNT}"}},"iat":1}}"#);
        let payload: TokenPayload = serde_json::from_str(&json).unwrap();
        assert!(extract_claims(&payload).is_ok());
    }
}
