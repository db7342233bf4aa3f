// JSON-RPC 2.0 over HTTP client for a DA gateway node
//
// Methods: system_chain, da_submitData, da_txStatus, chain_getBlock,
// chain_getHeader, chain_getFinalizedHead, da_balance.
// Transaction status is polled on a background task and pushed into the
// subscription channel, so callers see the same event stream as any other
// transport.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{DaTransport, TxSubscription};
use crate::error::{DaError, DaResult};
use crate::types::{BlockRef, DaBlock, DaHeader, SignedSubmission, TxRef, TxStatus};

#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub request_timeout: Duration,
    pub status_poll: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            status_poll: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResult {
    tx_hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum StatusResult {
    Ready,
    InBlock { block_hash: String },
    Finalized { block_hash: String },
    Rejected { reason: String },
    Unknown,
}

/// Outcome of a failed call, before it is mapped onto `DaError`
#[derive(Debug, Error)]
enum CallError {
    #[error("{method}: {reason}")]
    Transport { method: String, reason: String },

    /// The node answered with a JSON-RPC error object
    #[error("{method}: rpc error {code}: {message}")]
    Rpc { method: String, code: i64, message: String },
}

impl CallError {
    fn transport(method: &str, reason: impl Into<String>) -> Self {
        CallError::Transport {
            method: method.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<CallError> for DaError {
    fn from(e: CallError) -> Self {
        DaError::connection(e.to_string())
    }
}

#[derive(Clone)]
struct RpcClient {
    url: String,
    http: Client,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, CallError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!("→ {} {}", self.url, method);

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CallError::transport(method, e.to_string()))?;

        if !response.status().is_success() {
            return Err(CallError::transport(method, format!("HTTP {}", response.status())));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| CallError::transport(method, format!("malformed response: {e}")))?;

        if let Some(err) = body.error {
            return Err(CallError::Rpc {
                method: method.to_string(),
                code: err.code,
                message: err.message,
            });
        }

        serde_json::from_value(body.result.unwrap_or(Value::Null))
            .map_err(|e| CallError::transport(method, format!("unexpected result: {e}")))
    }
}

/// DA transport backed by a JSON-RPC gateway
pub struct JsonRpcTransport {
    client: RpcClient,
    status_poll: Duration,
}

impl JsonRpcTransport {
    pub fn new(url: &str, config: RpcConfig) -> DaResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DaError::connection(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client: RpcClient {
                url: url.to_string(),
                http,
                next_id: Arc::new(AtomicU64::new(1)),
            },
            status_poll: config.status_poll,
        })
    }
}

/// Polls `da_txStatus` until a terminal state or until nobody is listening
async fn watch_status(client: RpcClient, tx_ref: TxRef, poll: Duration, events: mpsc::Sender<TxStatus>) {
    let mut last: Option<TxStatus> = None;
    loop {
        let status = match client.call::<StatusResult>("da_txStatus", json!([tx_ref.as_str()])).await {
            Ok(StatusResult::Ready) => Some(TxStatus::Ready),
            Ok(StatusResult::InBlock { block_hash }) => Some(TxStatus::InBlock(BlockRef::new(block_hash))),
            Ok(StatusResult::Finalized { block_hash }) => Some(TxStatus::Finalized(BlockRef::new(block_hash))),
            Ok(StatusResult::Rejected { reason }) => Some(TxStatus::Rejected(reason)),
            Ok(StatusResult::Unknown) => None,
            Err(e) => {
                warn!("Status poll for {} failed: {}", tx_ref, e);
                None
            }
        };

        if let Some(status) = status {
            if last.as_ref() != Some(&status) {
                let terminal = matches!(status, TxStatus::Finalized(_) | TxStatus::Rejected(_));
                if events.send(status.clone()).await.is_err() || terminal {
                    return;
                }
                last = Some(status);
            }
        }

        if events.is_closed() {
            return;
        }
        tokio::time::sleep(poll).await;
    }
}

#[async_trait]
impl DaTransport for JsonRpcTransport {
    async fn chain_name(&self) -> DaResult<String> {
        Ok(self.client.call("system_chain", json!([])).await?)
    }

    async fn submit(&self, tx: SignedSubmission) -> DaResult<TxSubscription> {
        let params = json!({
            "app_id": tx.app_id,
            "data": format!("0x{}", hex::encode(&tx.data)),
            "signer": tx.signer,
            "signature": tx.signature,
        });
        let result: SubmitResult = self
            .client
            .call("da_submitData", params)
            .await
            .map_err(|e| match e {
                CallError::Rpc { .. } => DaError::submission(e.to_string()),
                other => other.into(),
            })?;

        let tx_ref = TxRef::new(result.tx_hash);
        let (sender, events) = mpsc::channel(8);
        tokio::spawn(watch_status(self.client.clone(), tx_ref.clone(), self.status_poll, sender));

        Ok(TxSubscription { tx_ref, events })
    }

    async fn block(&self, block_ref: &BlockRef) -> DaResult<Option<DaBlock>> {
        Ok(self.client.call("chain_getBlock", json!([block_ref.as_str()])).await?)
    }

    async fn header(&self, block_ref: &BlockRef) -> DaResult<Option<DaHeader>> {
        Ok(self.client.call("chain_getHeader", json!([block_ref.as_str()])).await?)
    }

    async fn finalized_head(&self) -> DaResult<BlockRef> {
        Ok(self.client.call("chain_getFinalizedHead", json!([])).await?)
    }

    async fn balance(&self, address: &str) -> DaResult<u128> {
        let raw: String = self.client.call("da_balance", json!([address])).await?;
        raw.parse()
            .map_err(|e| DaError::connection(format!("da_balance: bad amount {raw:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::tracker::{SubmissionTracker, TrackerConfig};
    use crate::da::EndpointConnector;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config() -> RpcConfig {
        RpcConfig {
            request_timeout: Duration::from_secs(5),
            status_poll: Duration::from_millis(10),
        }
    }

    fn signed(app_id: u32) -> SignedSubmission {
        SignedSubmission {
            app_id,
            data: b"payload".to_vec(),
            signer: "0xsigner".to_string(),
            signature: "0xsig".to_string(),
        }
    }

    fn ok(result: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": result}))
    }

    /// Mounts a `da_txStatus` answer served at most `times` times.
    /// Earlier mounts win while they still have uses left.
    async fn status_step(server: &MockServer, result: Value, times: u64) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "da_txStatus"})))
            .respond_with(ok(result))
            .up_to_n_times(times)
            .mount(server)
            .await;
    }

    async fn mount_submit(server: &MockServer, tx_hash: &str) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "da_submitData"})))
            .respond_with(ok(json!({"tx_hash": tx_hash})))
            .mount(server)
            .await;
    }

    #[test]
    fn test_status_result_decoding() {
        let s: StatusResult = serde_json::from_value(json!({"status": "in_block", "block_hash": "0xab"})).unwrap();
        assert!(matches!(s, StatusResult::InBlock { block_hash } if block_hash == "0xab"));

        let s: StatusResult = serde_json::from_value(json!({"status": "rejected", "reason": "nonce"})).unwrap();
        assert!(matches!(s, StatusResult::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_error() {
        let transport = JsonRpcTransport::new(
            "http://127.0.0.1:1",
            RpcConfig {
                request_timeout: Duration::from_secs(2),
                status_poll: Duration::from_millis(10),
            },
        )
        .unwrap();
        assert!(matches!(transport.chain_name().await, Err(DaError::Connection(_))));
    }

    #[tokio::test]
    async fn test_status_polling_forwards_each_change_once() {
        let server = MockServer::start().await;
        mount_submit(&server, "0xfeed").await;
        status_step(&server, json!({"status": "unknown"}), 1).await;
        status_step(&server, json!({"status": "ready"}), 3).await;
        status_step(&server, json!({"status": "in_block", "block_hash": "0xb1"}), 2).await;
        status_step(&server, json!({"status": "finalized", "block_hash": "0xb1"}), 1).await;

        let transport = JsonRpcTransport::new(&server.uri(), fast_config()).unwrap();
        let TxSubscription { tx_ref, mut events } = transport.submit(signed(3)).await.unwrap();
        assert_eq!(tx_ref, TxRef::new("0xfeed"));

        let mut seen = Vec::new();
        while let Some(status) = events.recv().await {
            seen.push(status);
        }
        assert_eq!(
            seen,
            vec![
                TxStatus::Ready,
                TxStatus::InBlock(BlockRef::new("0xb1")),
                TxStatus::Finalized(BlockRef::new("0xb1")),
            ]
        );
    }

    #[tokio::test]
    async fn test_rejected_status_ends_the_stream() {
        let server = MockServer::start().await;
        mount_submit(&server, "0xfeed").await;
        status_step(&server, json!({"status": "rejected", "reason": "bad nonce"}), 1).await;
        status_step(&server, json!({"status": "ready"}), 100).await;

        let transport = JsonRpcTransport::new(&server.uri(), fast_config()).unwrap();
        let mut sub = transport.submit(signed(0)).await.unwrap();

        assert_eq!(sub.events.recv().await, Some(TxStatus::Rejected("bad nonce".to_string())));
        assert_eq!(sub.events.recv().await, None);
    }

    #[tokio::test]
    async fn test_polling_stops_once_subscription_is_dropped() {
        let server = MockServer::start().await;
        mount_submit(&server, "0xfeed").await;
        status_step(&server, json!({"status": "ready"}), u64::MAX).await;

        let transport = JsonRpcTransport::new(&server.uri(), fast_config()).unwrap();
        let mut sub = transport.submit(signed(0)).await.unwrap();
        assert_eq!(sub.events.recv().await, Some(TxStatus::Ready));
        drop(sub);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let settled = server.received_requests().await.unwrap().len();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(server.received_requests().await.unwrap().len(), settled);
    }

    #[tokio::test]
    async fn test_broadcast_rpc_error_is_submission_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "da_submitData"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32010, "message": "insufficient fee"}
            })))
            .mount(&server)
            .await;

        let transport = JsonRpcTransport::new(&server.uri(), fast_config()).unwrap();
        let err = transport.submit(signed(0)).await.unwrap_err();
        assert!(matches!(err, DaError::Submission(ref msg) if msg.contains("insufficient fee")));
    }

    #[tokio::test]
    async fn test_broadcast_http_failure_is_connection_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let transport = JsonRpcTransport::new(&server.uri(), fast_config()).unwrap();
        assert!(matches!(transport.submit(signed(0)).await, Err(DaError::Connection(_))));
    }

    #[tokio::test]
    async fn test_tracker_submit_over_json_rpc() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "system_chain"})))
            .respond_with(ok(json!("testnet")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "da_submitData", "params": {"app_id": 7}})))
            .respond_with(ok(json!({"tx_hash": "0xfeed"})))
            .expect(1)
            .mount(&server)
            .await;
        status_step(&server, json!({"status": "ready"}), 2).await;
        status_step(&server, json!({"status": "in_block", "block_hash": "0xb1"}), 1).await;
        status_step(&server, json!({"status": "finalized", "block_hash": "0xb1"}), u64::MAX).await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "chain_getHeader", "params": ["0xb1"]})))
            .respond_with(ok(json!({"number": 42, "hash": "0xb1", "parent_hash": "0xb0"})))
            .mount(&server)
            .await;

        let session = Arc::new(Session::new(Arc::new(EndpointConnector::new(fast_config()))));
        session.connect(&server.uri(), "//Alice").await.unwrap();
        let tracker = SubmissionTracker::new(session.clone(), TrackerConfig::default());

        let record = tracker.submit(b"hello".to_vec(), 7).await.unwrap();
        assert_eq!(record.tx_ref, TxRef::new("0xfeed"));
        assert_eq!(record.block_ref, BlockRef::new("0xb1"));
        assert_eq!(record.block_height, 42);
        assert_eq!(record.payload, b"hello".to_vec());

        session.disconnect().await;
    }
}
