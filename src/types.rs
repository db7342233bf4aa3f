use serde::{Serialize, Deserialize};
use std::fmt;

/// Opaque reference to a DA block (a `0x` block hash on the wire)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockRef(pub String);

/// Opaque reference to a DA transaction (extrinsic hash)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxRef(pub String);

impl BlockRef {
    pub fn new(s: impl Into<String>) -> Self {
        BlockRef(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TxRef {
    pub fn new(s: impl Into<String>) -> Self {
        TxRef(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One payload publication that reached inclusion. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    /// Raw payload, hex on the wire
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
    pub channel_id: u32,
    pub tx_ref: TxRef,
    pub block_ref: BlockRef,
    pub block_height: u64,
}

/// Block handed over by the execution layer. Only `data_hash` is read here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L2Block {
    pub block_number: u64,
    pub state_root: String,
    pub data_hash: String,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    pub transactions: Vec<String>,
}

impl L2Block {
    /// Serialized payload bytes published to the DA layer
    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Availability proof for a finalized payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaProof {
    pub block_ref: BlockRef,
    pub block_number: u64,
    pub payload_hash: String,
    pub merkle_root: String,
    pub merkle_proof: Vec<String>,
    /// Generation time, Unix milliseconds
    pub timestamp: i64,
}

/// Tuple relayed to the settlement bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub block_number: u64,
    pub payload_hash: String,
    pub da_tx_ref: TxRef,
}

/// What the bridge reports back for a block number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentRecord {
    pub payload_hash: String,
    pub da_tx_ref: TxRef,
    /// Unix milliseconds
    pub timestamp: i64,
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaHeader {
    pub number: u64,
    pub hash: BlockRef,
    pub parent_hash: BlockRef,
}

/// A single extrinsic as seen inside a DA block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaExtrinsic {
    pub section: String,
    pub method: String,
    pub app_id: u32,
    pub signer: String,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaBlock {
    pub header: DaHeader,
    pub extrinsics: Vec<DaExtrinsic>,
}

/// Lifecycle event for a broadcast transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Ready,
    InBlock(BlockRef),
    Finalized(BlockRef),
    Rejected(String),
}

/// Publish transaction signed by the session identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedSubmission {
    pub app_id: u32,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    pub signer: String,
    pub signature: String,
}

/// `0x`-prefixed hex on output, prefix optional on input
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}
