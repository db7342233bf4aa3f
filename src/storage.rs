use anyhow::Context;
use serde::{Serialize, Deserialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::types::{BlockRef, SubmissionRecord, TxRef};
use crate::utils::iso_now;

/// One line of the audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub l2_block_number: u64,
    pub payload: String,
    pub channel_id: u32,
    pub tx_ref: TxRef,
    pub block_ref: BlockRef,
    pub da_block_number: u64,
    pub timestamp: String,
}

/// Append-only JSON-lines log of successful submissions. Never rewritten.
#[derive(Debug, Clone)]
pub struct SubmissionLog {
    path: PathBuf,
}

impl SubmissionLog {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save submission record
    pub fn append(&self, l2_block_number: u64, record: &SubmissionRecord) -> anyhow::Result<LogEntry> {
        let entry = LogEntry {
            l2_block_number,
            payload: format!("0x{}", hex::encode(&record.payload)),
            channel_id: record.channel_id,
            tx_ref: record.tx_ref.clone(),
            block_ref: record.block_ref.clone(),
            da_block_number: record.block_height,
            timestamp: iso_now(),
        };

        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        file.write_all(line.as_bytes())?;
        Ok(entry)
    }

    /// Entries in submission order; a missing file is an empty log
    pub fn read_all(&self) -> anyhow::Result<Vec<LogEntry>> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("opening {}", self.path.display())),
        };

        let mut entries = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(&line)
                .with_context(|| format!("{} line {}", self.path.display(), n + 1))?;
            entries.push(entry);
        }
        Ok(entries)
    }
}
