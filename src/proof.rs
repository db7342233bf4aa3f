// Availability proofs over finalized payloads.
//
// Generation builds the chunk tree; verification only compares whole-payload
// hashes and does not replay the tree.

use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::info;

use crate::error::DaResult;
use crate::merkle::{self, keccak256, to_hex};
use crate::tracker::SubmissionTracker;
use crate::types::{BlockRef, DaProof};
use crate::utils::now_millis;

pub const DEFAULT_CHUNK_SIZE: usize = 32;

pub struct ProofEngine {
    tracker: Arc<SubmissionTracker>,
    chunk_size: NonZeroUsize,
}

impl ProofEngine {
    pub fn new(tracker: Arc<SubmissionTracker>, chunk_size: NonZeroUsize) -> Self {
        Self { tracker, chunk_size }
    }

    /// `Ok(None)` when the block is not final yet or carries no payload
    pub async fn generate_proof(&self, block_ref: &BlockRef) -> DaResult<Option<DaProof>> {
        info!("🔐 Generating DA proof...");
        info!("   Block hash: {}", block_ref);

        if !self.tracker.is_finalized(block_ref).await? {
            info!("   ⚠️  Data not yet finalized");
            return Ok(None);
        }

        let Some(payload) = self.tracker.fetch(block_ref).await? else {
            info!("   ❌ No data found in block");
            return Ok(None);
        };

        let block_number = self.tracker.session().query_block_height(block_ref).await?;
        let proof = build_proof(block_ref.clone(), block_number, &payload, self.chunk_size);

        info!("✅ Proof generated");
        info!("   Data hash: {}", proof.payload_hash);
        info!("   Merkle root: {}", proof.merkle_root);

        Ok(Some(proof))
    }

    /// Whole-payload hash equality only
    pub fn verify_proof(proof: &DaProof, payload: &[u8]) -> bool {
        to_hex(&keccak256(payload)) == proof.payload_hash
    }
}

pub fn build_proof(block_ref: BlockRef, block_number: u64, payload: &[u8], chunk_size: NonZeroUsize) -> DaProof {
    let tree = merkle::build(payload, chunk_size);
    DaProof {
        block_ref,
        block_number,
        payload_hash: to_hex(&keccak256(payload)),
        merkle_root: to_hex(&tree.root),
        merkle_proof: tree.path.iter().map(to_hex).collect(),
        timestamp: now_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::da::{EndpointConnector, LocalDaNetwork};
    use crate::session::Session;
    use crate::tracker::TrackerConfig;

    fn chunk32() -> NonZeroUsize {
        NonZeroUsize::new(DEFAULT_CHUNK_SIZE).unwrap()
    }

    async fn engine(network: &LocalDaNetwork) -> (Arc<SubmissionTracker>, ProofEngine) {
        let connector = EndpointConnector::default().with_local(Arc::new(network.clone()));
        let session = Arc::new(Session::new(Arc::new(connector)));
        session.connect("local://devnet", "//Alice").await.unwrap();
        let tracker = Arc::new(SubmissionTracker::new(session, TrackerConfig::default()));
        (tracker.clone(), ProofEngine::new(tracker, chunk32()))
    }

    #[test]
    fn test_abc_single_leaf_proof() {
        let proof = build_proof(BlockRef::new("0x01"), 1, b"abc", chunk32());
        assert_eq!(proof.merkle_root, to_hex(&keccak256(b"abc")));
        assert!(proof.merkle_proof.is_empty());
        assert!(ProofEngine::verify_proof(&proof, b"abc"));
        assert!(!ProofEngine::verify_proof(&proof, b"abd"));
    }

    #[test]
    fn test_proof_path_length_follows_pairings() {
        let payload = vec![1u8; 65];
        let proof = build_proof(BlockRef::new("0x01"), 1, &payload, chunk32());
        assert_eq!(proof.merkle_proof.len(), 2);
        assert!(ProofEngine::verify_proof(&proof, &payload));
    }

    #[tokio::test]
    async fn test_unfinalized_block_yields_none() {
        let network = LocalDaNetwork::new("devnet").with_finality_depth(3);
        let (tracker, engine) = engine(&network).await;

        let record = tracker.submit(b"pending".to_vec(), 0).await.unwrap();
        assert_eq!(engine.generate_proof(&record.block_ref).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_finalized_block_yields_verifiable_proof() {
        let network = LocalDaNetwork::new("devnet");
        let (tracker, engine) = engine(&network).await;

        let payload = br#"{"blockNumber":1,"transactions":["0x01","0x02"]}"#.to_vec();
        let record = tracker.submit(payload.clone(), 0).await.unwrap();

        let proof = engine.generate_proof(&record.block_ref).await.unwrap().unwrap();
        assert_eq!(proof.block_ref, record.block_ref);
        assert_eq!(proof.block_number, record.block_height);
        assert!(ProofEngine::verify_proof(&proof, &payload));
        assert!(!ProofEngine::verify_proof(&proof, b"something else"));
    }

    #[tokio::test]
    async fn test_block_without_payload_yields_none() {
        let network = LocalDaNetwork::new("devnet");
        let (_tracker, engine) = engine(&network).await;

        let empty = network.push_block(Vec::new());
        assert_eq!(engine.generate_proof(&empty).await.unwrap(), None);
    }
}
