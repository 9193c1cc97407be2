//! Fameish Storage
//!
//! Client for the immutable content store that holds the per-cycle entrant
//! manifest. The manifest is write-once: uploaded under an immutable ACL,
//! referenced by content URI in the on-chain selection transaction, never
//! mutated.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("upload transport error: {0}")]
    Transport(String),
    #[error("upload rejected: status {0}")]
    Rejected(u16),
    #[error("upload returned no content URI")]
    MissingUri,
}

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        StorageError::Transport(e.to_string())
    }
}

/// Immutable content store seam.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Upload one CSV manifest; returns its content URI.
    async fn upload_manifest(&self, csv: &str) -> Result<String, StorageError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    uri: Option<String>,
}

/// HTTP client for a Grove-style storage API: POST the file body with an
/// immutable ACL scoped to the chain, read the content URI back.
pub struct GroveClient {
    http: reqwest::Client,
    base_url: String,
    chain_id: u64,
}

impl GroveClient {
    pub fn new(base_url: String, chain_id: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            chain_id,
        }
    }
}

#[async_trait]
impl ContentStore for GroveClient {
    async fn upload_manifest(&self, csv: &str) -> Result<String, StorageError> {
        debug!(bytes = csv.len(), "uploading entrant manifest");
        let response = self
            .http
            .post(&self.base_url)
            .query(&[("chain_id", self.chain_id.to_string())])
            .header("content-type", "text/csv")
            .header("x-acl", "immutable")
            .body(csv.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Rejected(status.as_u16()));
        }

        let body: UploadResponse = response.json().await?;
        let uri = body.uri.filter(|u| !u.is_empty()).ok_or(StorageError::MissingUri)?;
        info!(uri, "entrant manifest uploaded");
        Ok(uri)
    }
}

/// In-memory double: records every uploaded manifest and hands out
/// deterministic URIs.
#[derive(Default)]
pub struct MemoryStore {
    uploads: Mutex<Vec<String>>,
    fail_next: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next upload fail with [`StorageError::MissingUri`].
    pub fn fail_next_upload(&self) {
        *self.fail_next.lock().unwrap() = true;
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn upload_manifest(&self, csv: &str) -> Result<String, StorageError> {
        if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
            return Err(StorageError::MissingUri);
        }
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(csv.to_string());
        Ok(format!("lens://manifest/{}", uploads.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_records_uploads() {
        let store = MemoryStore::new();
        let uri = store.upload_manifest("0xaa,0xbb").await.unwrap();
        assert_eq!(uri, "lens://manifest/1");
        assert_eq!(store.uploads(), vec!["0xaa,0xbb".to_string()]);
    }

    #[tokio::test]
    async fn test_memory_store_failure_injection() {
        let store = MemoryStore::new();
        store.fail_next_upload();
        assert!(matches!(
            store.upload_manifest("0xaa").await,
            Err(StorageError::MissingUri)
        ));
        // one-shot: next upload succeeds
        assert!(store.upload_manifest("0xaa").await.is_ok());
    }
}
