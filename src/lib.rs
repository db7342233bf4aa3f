// Publishes execution-layer blocks to a data-availability network, tracks
// them to finality, and produces availability proofs.
//
// PostingLoop ──► SubmissionTracker ──► Session ──► DaTransport
//      │                 ▲
//      │                 │
//      ▼            ProofEngine
// CommitmentBridge, SubmissionLog

pub mod bridge;
pub mod config;
pub mod crypto;
pub mod da;
pub mod error;
pub mod merkle;
pub mod poster;
pub mod producer;
pub mod proof;
pub mod session;
pub mod storage;
pub mod tracker;
pub mod types;
pub mod utils;

pub use error::{DaError, DaResult};
pub use proof::ProofEngine;
pub use session::{Session, SessionStatus};
pub use tracker::SubmissionTracker;
