// Data availability network access
//
// `DaTransport` is the consumed DA protocol: publish, watch status, read
// blocks and the finalized head. `Connector` turns an endpoint string into a
// live transport; the session owns whatever it returns.

pub mod local;
pub mod rpc;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{DaError, DaResult};
use crate::types::{BlockRef, DaBlock, DaHeader, SignedSubmission, TxRef, TxStatus};

pub use local::{InclusionMode, LocalDaNetwork};
pub use rpc::{JsonRpcTransport, RpcConfig};

/// Pallet section of a publish-data extrinsic
pub const PUBLISH_SECTION: &str = "dataAvailability";
/// Method of a publish-data extrinsic
pub const PUBLISH_METHOD: &str = "submitData";

/// Handle on a broadcast transaction. Events arrive in lifecycle order; the
/// channel closes once the transport stops tracking it.
#[derive(Debug)]
pub struct TxSubscription {
    pub tx_ref: TxRef,
    pub events: mpsc::Receiver<TxStatus>,
}

#[async_trait]
pub trait DaTransport: Send + Sync {
    /// Chain name, also used as the reachability check on connect
    async fn chain_name(&self) -> DaResult<String>;

    /// Broadcast a signed publish transaction.
    /// Rejection at broadcast time is `DaError::Submission`.
    async fn submit(&self, tx: SignedSubmission) -> DaResult<TxSubscription>;

    async fn block(&self, block_ref: &BlockRef) -> DaResult<Option<DaBlock>>;

    async fn header(&self, block_ref: &BlockRef) -> DaResult<Option<DaHeader>>;

    async fn finalized_head(&self) -> DaResult<BlockRef>;

    async fn balance(&self, address: &str) -> DaResult<u128>;

    /// Release the link. Must be safe to call more than once.
    async fn close(&self) {}
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> DaResult<Arc<dyn DaTransport>>;
}

/// Routes `http(s)://` endpoints to JSON-RPC and `local://name` endpoints to
/// registered in-process networks.
#[derive(Default)]
pub struct EndpointConnector {
    rpc: RpcConfig,
    local: HashMap<String, Arc<LocalDaNetwork>>,
}

impl EndpointConnector {
    pub fn new(rpc: RpcConfig) -> Self {
        Self {
            rpc,
            local: HashMap::new(),
        }
    }

    pub fn with_local(mut self, network: Arc<LocalDaNetwork>) -> Self {
        self.local.insert(network.name().to_string(), network);
        self
    }
}

#[async_trait]
impl Connector for EndpointConnector {
    async fn connect(&self, endpoint: &str) -> DaResult<Arc<dyn DaTransport>> {
        if let Some(name) = endpoint.strip_prefix("local://") {
            let network = self
                .local
                .get(name)
                .ok_or_else(|| DaError::connection(format!("endpoint {endpoint} is unreachable")))?;
            return network.connect(endpoint).await;
        }

        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            let transport = JsonRpcTransport::new(endpoint, self.rpc.clone())?;
            return Ok(Arc::new(transport));
        }

        Err(DaError::connection(format!(
            "unsupported endpoint scheme: {endpoint} (expected http://, https:// or local://)"
        )))
    }
}
