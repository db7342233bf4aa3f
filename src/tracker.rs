// Publish payloads and follow them through broadcast -> inclusion -> finality.
//
// Nothing here retries; a failed submit is reported once and the caller
// decides what to do next.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::da::{TxSubscription, PUBLISH_METHOD, PUBLISH_SECTION};
use crate::error::{DaError, DaResult};
use crate::session::Session;
use crate::types::{BlockRef, SubmissionRecord, TxStatus};

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub inclusion_timeout: Duration,
    pub finality_poll: Duration,
    pub finality_timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            inclusion_timeout: Duration::from_secs(120),
            finality_poll: Duration::from_secs(5),
            finality_timeout: Duration::from_secs(600),
        }
    }
}

pub struct SubmissionTracker {
    session: Arc<Session>,
    config: TrackerConfig,
}

impl SubmissionTracker {
    pub fn new(session: Arc<Session>, config: TrackerConfig) -> Self {
        Self { session, config }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Signs, broadcasts and waits for inclusion (or finalization, if the
    /// network reports that first). One submission in flight per session.
    pub async fn submit(&self, payload: Vec<u8>, channel_id: u32) -> DaResult<SubmissionRecord> {
        let conn = self.session.connection().await?;
        let _in_flight = self.session.lock_submissions().await;

        info!("📤 Submitting data to DA layer...");
        info!("   Data size: {} bytes", payload.len());
        info!("   App ID: {}", channel_id);

        let signed = conn.identity.sign_submission(channel_id, payload.clone());
        let TxSubscription { tx_ref, mut events } = conn.transport.submit(signed).await?;
        debug!("Broadcast accepted: {}", tx_ref);

        let wait = async {
            while let Some(status) = events.recv().await {
                info!("   Transaction status: {:?}", status);
                match status {
                    TxStatus::Ready => continue,
                    TxStatus::InBlock(block_ref) => {
                        info!("   ✅ Included in block: {}", block_ref);
                        return Ok(block_ref);
                    }
                    TxStatus::Finalized(block_ref) => {
                        info!("   🔒 Finalized in block: {}", block_ref);
                        return Ok(block_ref);
                    }
                    TxStatus::Rejected(reason) => {
                        return Err(DaError::submission(format!("{tx_ref} rejected: {reason}")));
                    }
                }
            }
            Err(DaError::submission(format!("status stream for {tx_ref} closed before inclusion")))
        };

        let block_ref = timeout(self.config.inclusion_timeout, wait)
            .await
            .map_err(|_| {
                DaError::submission(format!(
                    "no inclusion for {} within {:?}",
                    tx_ref, self.config.inclusion_timeout
                ))
            })??;

        let block_height = conn
            .transport
            .header(&block_ref)
            .await?
            .map(|h| h.number)
            .ok_or_else(|| DaError::submission(format!("inclusion block {block_ref} has no header")))?;

        info!("   Block number: {}", block_height);
        info!("   Extrinsic hash: {}", tx_ref);

        Ok(SubmissionRecord {
            payload,
            channel_id,
            tx_ref,
            block_ref,
            block_height,
        })
    }

    /// Payload of the first publish-data extrinsic in the block, if any.
    /// Linear scan; DA blocks are small.
    pub async fn fetch(&self, block_ref: &BlockRef) -> DaResult<Option<Vec<u8>>> {
        let conn = self.session.connection().await?;
        let block = conn
            .transport
            .block(block_ref)
            .await?
            .ok_or_else(|| DaError::not_found(format!("block {block_ref}")))?;

        Ok(block
            .extrinsics
            .into_iter()
            .find(|ext| ext.section == PUBLISH_SECTION && ext.method == PUBLISH_METHOD)
            .map(|ext| ext.data))
    }

    /// Finality policy: the block is final once its height is at or below
    /// the node's finalized head.
    pub async fn is_finalized(&self, block_ref: &BlockRef) -> DaResult<bool> {
        let height = self.session.query_block_height(block_ref).await?;
        let finalized = self.session.query_finalized_height().await?;
        let verdict = height <= finalized;

        info!(
            "   Data availability: {} (block #{}, finalized #{})",
            if verdict { "✅ Verified" } else { "⏳ Pending" },
            height,
            finalized
        );
        Ok(verdict)
    }

    /// Polls `is_finalized` until it holds or `finality_timeout` elapses
    pub async fn await_finalization(&self, record: &SubmissionRecord) -> DaResult<()> {
        let deadline = Instant::now() + self.config.finality_timeout;
        loop {
            if self.is_finalized(&record.block_ref).await? {
                info!("🔒 {} finalized in block #{}", record.tx_ref, record.block_height);
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!("Finality wait for {} timed out", record.tx_ref);
                return Err(DaError::submission(format!(
                    "{} not finalized within {:?}",
                    record.tx_ref, self.config.finality_timeout
                )));
            }
            sleep(self.config.finality_poll).await;
        }
    }
}
