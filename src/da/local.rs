// In-process DA ledger
//
// Behaves like a small single-author chain: genesis is finalized, every
// included batch of publish transactions becomes a new block, and the
// finalized head trails the best block by `finality_depth`. Used for the
// `local://` development endpoint and as the deterministic fixture in tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{Connector, DaTransport, TxSubscription, PUBLISH_METHOD, PUBLISH_SECTION};
use crate::crypto::verify_submission;
use crate::error::{DaError, DaResult};
use crate::types::{BlockRef, DaBlock, DaExtrinsic, DaHeader, SignedSubmission, TxRef, TxStatus};

const EVENT_BUFFER: usize = 8;

/// How the ledger reports and includes accepted transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InclusionMode {
    /// Included in a fresh block on submit: `Ready`, `InBlock`, later `Finalized`
    Immediate,
    /// Included on submit but only `Finalized` is reported
    Coalesced,
    /// Pooled until `produce_block` is called
    Manual,
}

struct Watcher {
    height: u64,
    block_ref: BlockRef,
    events: mpsc::Sender<TxStatus>,
}

struct Ledger {
    reachable: bool,
    mode: InclusionMode,
    finality_depth: u64,
    fee_per_byte: u128,
    blocks: Vec<DaBlock>,
    finalized: u64,
    pool: Vec<(DaExtrinsic, mpsc::Sender<TxStatus>)>,
    watchers: Vec<Watcher>,
    balances: HashMap<String, u128>,
    nonces: HashMap<String, u64>,
    accepted: usize,
}

/// Cheap to clone; clones share one ledger
#[derive(Clone)]
pub struct LocalDaNetwork {
    name: String,
    ledger: Arc<Mutex<Ledger>>,
}

impl LocalDaNetwork {
    pub fn new(name: impl Into<String>) -> Self {
        let genesis = DaBlock {
            header: DaHeader {
                number: 0,
                hash: BlockRef::new(format!("0x{}", "00".repeat(32))),
                parent_hash: BlockRef::new(format!("0x{}", "00".repeat(32))),
            },
            extrinsics: Vec::new(),
        };
        Self {
            name: name.into(),
            ledger: Arc::new(Mutex::new(Ledger {
                reachable: true,
                mode: InclusionMode::Immediate,
                finality_depth: 0,
                fee_per_byte: 0,
                blocks: vec![genesis],
                finalized: 0,
                pool: Vec::new(),
                watchers: Vec::new(),
                balances: HashMap::new(),
                nonces: HashMap::new(),
                accepted: 0,
            })),
        }
    }

    pub fn with_finality_depth(self, depth: u64) -> Self {
        self.ledger().finality_depth = depth;
        self
    }

    pub fn with_fee_per_byte(self, fee: u128) -> Self {
        self.ledger().fee_per_byte = fee;
        self
    }

    pub fn with_inclusion_mode(self, mode: InclusionMode) -> Self {
        self.ledger().mode = mode;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.ledger().reachable = reachable;
    }

    pub fn fund(&self, address: &str, amount: u128) {
        *self.ledger().balances.entry(address.to_string()).or_default() += amount;
    }

    /// Number of publish transactions accepted so far
    pub fn submission_count(&self) -> usize {
        self.ledger().accepted
    }

    pub fn best_height(&self) -> u64 {
        self.ledger().blocks.len() as u64 - 1
    }

    pub fn finalized_height(&self) -> u64 {
        self.ledger().finalized
    }

    /// Seals the pooled transactions into a new block
    pub fn produce_block(&self) -> BlockRef {
        let mut ledger = self.ledger();
        let pooled = std::mem::take(&mut ledger.pool);
        let (extrinsics, senders): (Vec<_>, Vec<_>) = pooled.into_iter().unzip();
        let block_ref = ledger.seal(extrinsics);
        let height = ledger.best();
        let mode = ledger.mode;
        for events in senders {
            if mode != InclusionMode::Coalesced {
                let _ = events.try_send(TxStatus::InBlock(block_ref.clone()));
            }
            ledger.watchers.push(Watcher {
                height,
                block_ref: block_ref.clone(),
                events,
            });
        }
        ledger.advance_finality();
        block_ref
    }

    /// Appends a block with arbitrary extrinsics, e.g. transfers
    pub fn push_block(&self, extrinsics: Vec<DaExtrinsic>) -> BlockRef {
        let mut ledger = self.ledger();
        let block_ref = ledger.seal(extrinsics);
        ledger.advance_finality();
        block_ref
    }

    /// Moves the finalized head forward (never past the best block, never back)
    pub fn finalize_to(&self, height: u64) {
        let mut ledger = self.ledger();
        let target = height.min(ledger.best());
        if target > ledger.finalized {
            ledger.finalized = target;
            ledger.notify_finalized();
        }
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_reachable(&self) -> DaResult<()> {
        if self.ledger().reachable {
            Ok(())
        } else {
            Err(DaError::connection(format!("local://{} is unreachable", self.name)))
        }
    }

    fn accept(&self, tx: SignedSubmission) -> DaResult<TxSubscription> {
        if !verify_submission(&tx) {
            return Err(DaError::submission("bad signature"));
        }

        let mut ledger = self.ledger();
        let fee = ledger.fee_per_byte * tx.data.len() as u128;
        let balance = ledger.balances.get(&tx.signer).copied().unwrap_or(0);
        if balance < fee {
            return Err(DaError::submission(format!(
                "insufficient balance: need {fee}, have {balance}"
            )));
        }
        ledger.balances.insert(tx.signer.clone(), balance - fee);

        let nonce = ledger.nonces.entry(tx.signer.clone()).or_default();
        let mut hasher = blake3::Hasher::new();
        hasher.update(tx.signer.as_bytes());
        hasher.update(&nonce.to_le_bytes());
        hasher.update(tx.signature.as_bytes());
        *nonce += 1;
        let tx_ref = TxRef::new(format!("0x{}", hasher.finalize().to_hex()));

        let (sender, events) = mpsc::channel(EVENT_BUFFER);
        if ledger.mode != InclusionMode::Coalesced {
            let _ = sender.try_send(TxStatus::Ready);
        }
        ledger.accepted += 1;
        ledger.pool.push((
            DaExtrinsic {
                section: PUBLISH_SECTION.to_string(),
                method: PUBLISH_METHOD.to_string(),
                app_id: tx.app_id,
                signer: tx.signer,
                data: tx.data,
            },
            sender,
        ));
        let mode = ledger.mode;
        drop(ledger);

        debug!("local://{} accepted {}", self.name, tx_ref);
        if mode != InclusionMode::Manual {
            self.produce_block();
        }

        Ok(TxSubscription { tx_ref, events })
    }

    fn find_block(&self, block_ref: &BlockRef) -> Option<DaBlock> {
        self.ledger()
            .blocks
            .iter()
            .find(|b| &b.header.hash == block_ref)
            .cloned()
    }
}

impl Ledger {
    fn best(&self) -> u64 {
        self.blocks.len() as u64 - 1
    }

    fn seal(&mut self, extrinsics: Vec<DaExtrinsic>) -> BlockRef {
        let parent = &self.blocks[self.blocks.len() - 1].header;
        let number = parent.number + 1;
        let mut hasher = blake3::Hasher::new();
        hasher.update(parent.hash.as_str().as_bytes());
        hasher.update(&number.to_le_bytes());
        for ext in &extrinsics {
            hasher.update(ext.signer.as_bytes());
            hasher.update(&ext.data);
        }
        let hash = BlockRef::new(format!("0x{}", hasher.finalize().to_hex()));
        let header = DaHeader {
            number,
            hash: hash.clone(),
            parent_hash: parent.hash.clone(),
        };
        self.blocks.push(DaBlock { header, extrinsics });
        hash
    }

    fn advance_finality(&mut self) {
        let target = self.best().saturating_sub(self.finality_depth);
        if target > self.finalized {
            self.finalized = target;
            info!("🔒 Local ledger finalized up to #{}", target);
        }
        self.notify_finalized();
    }

    fn notify_finalized(&mut self) {
        let finalized = self.finalized;
        self.watchers.retain(|w| {
            if w.height <= finalized {
                let _ = w.events.try_send(TxStatus::Finalized(w.block_ref.clone()));
                false
            } else {
                true
            }
        });
    }
}

#[async_trait]
impl Connector for LocalDaNetwork {
    async fn connect(&self, _endpoint: &str) -> DaResult<Arc<dyn DaTransport>> {
        self.ensure_reachable()?;
        Ok(Arc::new(LocalTransport {
            network: self.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

/// One connection to a `LocalDaNetwork`
struct LocalTransport {
    network: LocalDaNetwork,
    closed: AtomicBool,
}

impl LocalTransport {
    fn check(&self) -> DaResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DaError::connection("transport closed"));
        }
        self.network.ensure_reachable()
    }
}

#[async_trait]
impl DaTransport for LocalTransport {
    async fn chain_name(&self) -> DaResult<String> {
        self.check()?;
        Ok(format!("local-{}", self.network.name))
    }

    async fn submit(&self, tx: SignedSubmission) -> DaResult<TxSubscription> {
        self.check()?;
        self.network.accept(tx)
    }

    async fn block(&self, block_ref: &BlockRef) -> DaResult<Option<DaBlock>> {
        self.check()?;
        Ok(self.network.find_block(block_ref))
    }

    async fn header(&self, block_ref: &BlockRef) -> DaResult<Option<DaHeader>> {
        self.check()?;
        Ok(self.network.find_block(block_ref).map(|b| b.header))
    }

    async fn finalized_head(&self) -> DaResult<BlockRef> {
        self.check()?;
        let ledger = self.network.ledger();
        Ok(ledger.blocks[ledger.finalized as usize].header.hash.clone())
    }

    async fn balance(&self, address: &str) -> DaResult<u128> {
        self.check()?;
        Ok(self.network.ledger().balances.get(address).copied().unwrap_or(0))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
