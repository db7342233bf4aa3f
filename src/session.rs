// Exclusive connection to the DA network plus the signing identity.
//
// Status machine: Disconnected -> connect -> Connected -> disconnect -> Disconnected.
// Every data-plane call goes through `connection()`, which fails fast with
// `NotConnected` instead of connecting implicitly. Publish transactions are
// serialized through `submit_lock`; read queries only take the state lock
// long enough to clone the transport handle.

use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{info, warn};

use crate::crypto::Identity;
use crate::da::{Connector, DaTransport};
use crate::error::{DaError, DaResult};
use crate::types::BlockRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connected,
}

/// Live link, cloned out of the session for the duration of one call
#[derive(Clone)]
pub(crate) struct Connection {
    pub(crate) endpoint: String,
    pub(crate) transport: Arc<dyn DaTransport>,
    pub(crate) identity: Arc<Identity>,
}

pub struct Session {
    connector: Arc<dyn Connector>,
    state: RwLock<Option<Connection>>,
    submit_lock: Mutex<()>,
}

impl Session {
    /// Created empty; nothing is dialled until `connect`
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            state: RwLock::new(None),
            submit_lock: Mutex::new(()),
        }
    }

    pub async fn connect(&self, endpoint: &str, signing_seed: &str) -> DaResult<()> {
        info!("🔌 Connecting to DA network...");
        info!("   RPC: {}", endpoint);

        let identity = Identity::from_seed(signing_seed)?;
        let transport = self.connector.connect(endpoint).await?;
        let chain = match transport.chain_name().await {
            Ok(chain) => chain,
            Err(e) => {
                transport.close().await;
                return Err(match e {
                    DaError::Connection(msg) => DaError::Connection(msg),
                    other => DaError::connection(other.to_string()),
                });
            }
        };

        let mut state = self.state.write().await;
        if let Some(previous) = state.take() {
            warn!("Replacing existing connection to {}", previous.endpoint);
            previous.transport.close().await;
        }

        info!("✅ Connected to DA network");
        info!("   Chain: {}", chain);
        info!("   Account: {}", identity.address());

        *state = Some(Connection {
            endpoint: endpoint.to_string(),
            transport,
            identity: Arc::new(identity),
        });
        Ok(())
    }

    /// Idempotent; always ends Disconnected
    pub async fn disconnect(&self) {
        let previous = self.state.write().await.take();
        if let Some(conn) = previous {
            conn.transport.close().await;
            info!("👋 Disconnected from {}", conn.endpoint);
        }
    }

    pub async fn status(&self) -> SessionStatus {
        if self.state.read().await.is_some() {
            SessionStatus::Connected
        } else {
            SessionStatus::Disconnected
        }
    }

    pub async fn endpoint(&self) -> DaResult<String> {
        Ok(self.connection().await?.endpoint)
    }

    pub async fn current_address(&self) -> DaResult<String> {
        Ok(self.connection().await?.identity.address())
    }

    /// Height of the network's finalized head. Do not cache: it only grows.
    pub async fn query_finalized_height(&self) -> DaResult<u64> {
        let conn = self.connection().await?;
        let head = conn.transport.finalized_head().await?;
        let header = conn
            .transport
            .header(&head)
            .await?
            .ok_or_else(|| DaError::connection(format!("finalized head {head} has no header")))?;
        Ok(header.number)
    }

    pub async fn query_block_height(&self, block_ref: &BlockRef) -> DaResult<u64> {
        let conn = self.connection().await?;
        conn.transport
            .header(block_ref)
            .await?
            .map(|h| h.number)
            .ok_or_else(|| DaError::not_found(format!("block {block_ref}")))
    }

    pub async fn query_balance(&self) -> DaResult<u128> {
        let conn = self.connection().await?;
        conn.transport.balance(&conn.identity.address()).await
    }

    pub(crate) async fn connection(&self) -> DaResult<Connection> {
        self.state.read().await.clone().ok_or(DaError::NotConnected)
    }

    /// Held for the whole broadcast-to-inclusion window of one submission
    pub(crate) async fn lock_submissions(&self) -> MutexGuard<'_, ()> {
        self.submit_lock.lock().await
    }
}
