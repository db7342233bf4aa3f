// Settlement-layer commitment relay.
//
// The bridge contract is reached through a relayer service that owns the
// settlement-chain wallet; this crate only hands it the commitment tuple.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use crate::error::{DaError, DaResult};
use crate::types::{Commitment, CommitmentRecord};
use crate::utils::now_millis;

#[async_trait]
pub trait CommitmentBridge: Send + Sync {
    /// Returns the settlement transaction id
    async fn post_commitment(&self, commitment: &Commitment) -> DaResult<String>;

    async fn get_commitment(&self, block_number: u64) -> DaResult<Option<CommitmentRecord>>;
}

/// HTTP relayer client: `POST {base}/commitments`, `GET {base}/commitments/{n}`
pub struct HttpBridge {
    base_url: String,
    api_key: Option<String>,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    tx_hash: String,
}

impl HttpBridge {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> DaResult<Self> {
        if base_url.trim().is_empty() {
            return Err(DaError::Bridge("relayer url is empty".to_string()));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DaError::Bridge(format!("failed to build http client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            http,
        })
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl CommitmentBridge for HttpBridge {
    async fn post_commitment(&self, commitment: &Commitment) -> DaResult<String> {
        let url = format!("{}/commitments", self.base_url);
        debug!("POST {} block={}", url, commitment.block_number);

        let response = self
            .request(self.http.post(&url).json(commitment))
            .send()
            .await
            .map_err(|e| DaError::Bridge(format!("post commitment: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DaError::Bridge(format!("post commitment: HTTP {status}: {body}")));
        }

        let body: PostResponse = response
            .json()
            .await
            .map_err(|e| DaError::Bridge(format!("post commitment: malformed response: {e}")))?;
        Ok(body.tx_hash)
    }

    async fn get_commitment(&self, block_number: u64) -> DaResult<Option<CommitmentRecord>> {
        let url = format!("{}/commitments/{}", self.base_url, block_number);
        let response = self
            .request(self.http.get(&url))
            .send()
            .await
            .map_err(|e| DaError::Bridge(format!("get commitment: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(DaError::Bridge(format!("get commitment: HTTP {}", response.status())));
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| DaError::Bridge(format!("get commitment: malformed response: {e}")))
    }
}

/// In-process bridge; one commitment per block number, never overwritten
#[derive(Default)]
pub struct MemoryBridge {
    commitments: Mutex<HashMap<u64, CommitmentRecord>>,
}

impl MemoryBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a stored commitment as verified
    pub fn verify(&self, block_number: u64) -> bool {
        let mut commitments = self.commitments.lock().unwrap_or_else(|p| p.into_inner());
        match commitments.get_mut(&block_number) {
            Some(record) => {
                record.verified = true;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl CommitmentBridge for MemoryBridge {
    async fn post_commitment(&self, commitment: &Commitment) -> DaResult<String> {
        let mut commitments = self.commitments.lock().unwrap_or_else(|p| p.into_inner());
        if commitments.contains_key(&commitment.block_number) {
            return Err(DaError::Bridge(format!(
                "commitment for block {} already posted",
                commitment.block_number
            )));
        }

        commitments.insert(
            commitment.block_number,
            CommitmentRecord {
                payload_hash: commitment.payload_hash.clone(),
                da_tx_ref: commitment.da_tx_ref.clone(),
                timestamp: now_millis(),
                verified: false,
            },
        );

        let mut hasher = blake3::Hasher::new();
        hasher.update(&commitment.block_number.to_le_bytes());
        hasher.update(commitment.payload_hash.as_bytes());
        hasher.update(commitment.da_tx_ref.as_str().as_bytes());
        Ok(format!("0x{}", hasher.finalize().to_hex()))
    }

    async fn get_commitment(&self, block_number: u64) -> DaResult<Option<CommitmentRecord>> {
        let commitments = self.commitments.lock().unwrap_or_else(|p| p.into_inner());
        Ok(commitments.get(&block_number).cloned())
    }
}
