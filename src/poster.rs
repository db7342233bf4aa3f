use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, error};

use crate::bridge::CommitmentBridge;
use crate::producer::BlockProducer;
use crate::storage::SubmissionLog;
use crate::tracker::SubmissionTracker;
use crate::types::{Commitment, L2Block, SubmissionRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosterState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PosterStats {
    pub cycles: u64,
    pub submitted: u64,
    pub failed: u64,
}

#[derive(Debug, Clone)]
pub struct PostingConfig {
    pub channel_id: u32,
    pub interval: Duration,
    pub error_backoff: Duration,
}

/// Drives produce → submit → relay → persist → sleep until stopped
pub struct PostingLoop {
    tracker: Arc<SubmissionTracker>,
    producer: Box<dyn BlockProducer>,
    bridge: Option<Arc<dyn CommitmentBridge>>,
    log: SubmissionLog,
    config: PostingConfig,
    state: PosterState,
}

impl PostingLoop {
    pub fn new(
        tracker: Arc<SubmissionTracker>,
        producer: Box<dyn BlockProducer>,
        bridge: Option<Arc<dyn CommitmentBridge>>,
        log: SubmissionLog,
        config: PostingConfig,
    ) -> Self {
        Self {
            tracker,
            producer,
            bridge,
            log,
            config,
            state: PosterState::Stopped,
        }
    }

    pub fn state(&self) -> PosterState {
        self.state
    }

    /// Runs until `stop` is cancelled. The signal is checked at the top of
    /// each cycle, so an in-flight submission always finishes (or times out).
    pub async fn run(&mut self, stop: CancellationToken) -> PosterStats {
        let mut stats = PosterStats::default();
        self.state = PosterState::Running;

        info!("🚀 Data poster started");
        info!("   Posting interval: {:?}", self.config.interval);
        info!("   App ID: {}", self.config.channel_id);

        while !stop.is_cancelled() {
            stats.cycles += 1;

            let pause = match self.post_next_block().await {
                Ok(record) => {
                    stats.submitted += 1;
                    info!("✅ Posted to DA: block #{} tx {}", record.block_height, record.tx_ref);
                    self.config.interval
                }
                Err(e) => {
                    stats.failed += 1;
                    error!("❌ Error posting block: {:#}", e);
                    self.config.error_backoff
                }
            };

            tokio::select! {
                _ = stop.cancelled() => {}
                _ = tokio::time::sleep(pause) => {}
            }
        }

        self.state = PosterState::Stopped;
        info!(
            "🛑 Data poster stopped after {} cycles ({} submitted, {} failed)",
            stats.cycles, stats.submitted, stats.failed
        );
        stats
    }

    /// One cycle. Relay and persistence failures are logged, not returned:
    /// the submission has already happened by then.
    async fn post_next_block(&mut self) -> anyhow::Result<SubmissionRecord> {
        info!("📦 Fetching latest L2 block...");
        let block = self.producer.next_block().await?;
        info!("   Block #{}", block.block_number);
        info!("   Transactions: {}", block.transactions.len());

        let payload = block.to_payload()?;
        let record = self.tracker.submit(payload, self.config.channel_id).await?;

        if let Some(bridge) = &self.bridge {
            relay_commitment(bridge.as_ref(), &block, &record).await;
        }

        if let Err(e) = self.log.append(block.block_number, &record) {
            error!("Failed to save submission record: {:#}", e);
        }

        Ok(record)
    }
}

/// Best-effort; never retried
async fn relay_commitment(bridge: &dyn CommitmentBridge, block: &L2Block, record: &SubmissionRecord) {
    let commitment = Commitment {
        block_number: block.block_number,
        payload_hash: block.data_hash.clone(),
        da_tx_ref: record.tx_ref.clone(),
    };
    match bridge.post_commitment(&commitment).await {
        Ok(tx) => info!("   📝 Posted commitment to settlement bridge: {}", tx),
        Err(e) => warn!("   ⚠️  Failed to post commitment to settlement bridge: {}", e),
    }
}
