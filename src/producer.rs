use async_trait::async_trait;
use rand::Rng;

use crate::merkle::{keccak256, to_hex};
use crate::types::L2Block;
use crate::utils::now_millis;

/// Source of execution-layer blocks ("get next block")
#[async_trait]
pub trait BlockProducer: Send {
    async fn next_block(&mut self) -> anyhow::Result<L2Block>;
}

/// Stand-in producer for running the poster without an execution layer.
/// Block numbers are sequential; transaction ids are random.
pub struct SyntheticProducer {
    next_number: u64,
}

impl SyntheticProducer {
    pub fn new(start_block: u64) -> Self {
        Self { next_number: start_block }
    }
}

#[async_trait]
impl BlockProducer for SyntheticProducer {
    async fn next_block(&mut self) -> anyhow::Result<L2Block> {
        let block_number = self.next_number;
        self.next_number += 1;

        let transactions: Vec<String> = {
            let mut rng = rand::thread_rng();
            let count = rng.gen_range(1..=10);
            (0..count)
                .map(|_| format!("0x{}", hex::encode(rng.gen::<[u8; 8]>())))
                .collect()
        };

        let state_root = to_hex(&keccak256(format!("state_{block_number}").as_bytes()));
        let data_hash = to_hex(&keccak256(&serde_json::to_vec(&transactions)?));

        Ok(L2Block {
            block_number,
            state_root,
            data_hash,
            timestamp: now_millis(),
            transactions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_synthetic_blocks_are_sequential() {
        let mut producer = SyntheticProducer::new(7);
        let a = producer.next_block().await.unwrap();
        let b = producer.next_block().await.unwrap();

        assert_eq!(a.block_number, 7);
        assert_eq!(b.block_number, 8);
        assert!(a.timestamp > 1_600_000_000_000);
        assert!((1..=10).contains(&a.transactions.len()));
        assert_eq!(a.state_root, to_hex(&keccak256(b"state_7")));
        assert_eq!(a.data_hash, to_hex(&keccak256(&serde_json::to_vec(&a.transactions).unwrap())));
    }
}
