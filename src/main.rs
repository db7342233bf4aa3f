use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use da_poster::bridge::{CommitmentBridge, HttpBridge, MemoryBridge};
use da_poster::config::Config;
use da_poster::da::{EndpointConnector, LocalDaNetwork};
use da_poster::poster::PostingLoop;
use da_poster::producer::SyntheticProducer;
use da_poster::storage::SubmissionLog;
use da_poster::types::{BlockRef, DaProof};
use da_poster::utils::format_timestamp_millis;
use da_poster::{ProofEngine, Session, SubmissionTracker};

#[derive(Parser)]
#[command(name = "da-poster", version, about = "Publish L2 blocks to a DA network and prove their availability")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the posting loop until Ctrl-C
    Post,
    /// Submit one payload and print the submission record
    Submit {
        /// Payload text
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        data: Option<String>,
        /// Read the payload from a file instead
        #[arg(long)]
        file: Option<PathBuf>,
        /// Also wait until the inclusion block is finalized
        #[arg(long)]
        wait_finality: bool,
        /// Wait for finality, then print the availability proof
        #[arg(long)]
        prove: bool,
    },
    /// Generate an availability proof for a DA block.
    ///
    /// A `local://` ledger lives only as long as one process, so blocks
    /// from an earlier `submit` or `post` run are unknown here. Use
    /// `submit --prove` for a local round trip, or an http(s):// endpoint.
    Proof {
        block_ref: String,
    },
    /// Check a proof file against a payload
    Verify {
        proof: PathBuf,
        data: String,
    },
    /// Show the signing address, its balance and the finalized height
    Status,
    /// Read the commitment relayed for an L2 block number.
    ///
    /// A `memory://` bridge starts empty in every process and only answers
    /// for commitments posted by the same run.
    Commitment {
        block_number: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    info!("Loaded config: {:?}", config);

    match cli.command {
        Command::Post => run_poster(&config).await,
        Command::Submit { data, file, wait_finality, prove } => {
            let payload = match (data, file) {
                (_, Some(path)) => std::fs::read(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                (Some(text), None) => text.into_bytes(),
                (None, None) => bail!("either DATA or --file is required"),
            };
            submit_once(&config, payload, wait_finality || prove, prove).await
        }
        Command::Proof { block_ref } => generate_proof(&config, BlockRef::new(block_ref)).await,
        Command::Verify { proof, data } => verify(&proof, &data),
        Command::Status => status(&config).await,
        Command::Commitment { block_number } => commitment(&config, block_number).await,
    }
}

async fn connect(config: &Config) -> anyhow::Result<Arc<Session>> {
    let mut connector = EndpointConnector::new(config.rpc());
    if let Some(name) = config.network.endpoint.strip_prefix("local://") {
        warn!("Using in-process DA ledger {:?}; nothing is published to a real network", name);
        connector = connector.with_local(Arc::new(LocalDaNetwork::new(name)));
    }

    let session = Arc::new(Session::new(Arc::new(connector)));
    session
        .connect(&config.network.endpoint, &config.network.seed)
        .await
        .context("failed to connect to DA network")?;
    Ok(session)
}

fn build_bridge(config: &Config) -> anyhow::Result<Option<Arc<dyn CommitmentBridge>>> {
    if !config.bridge.enabled {
        return Ok(None);
    }
    let url = config.bridge.relayer_url.as_str();
    if url == "memory" || url.starts_with("memory://") {
        let bridge: Arc<dyn CommitmentBridge> = Arc::new(MemoryBridge::new());
        return Ok(Some(bridge));
    }
    let timeout = Duration::from_secs(config.network.request_timeout_secs);
    let bridge: Arc<dyn CommitmentBridge> = Arc::new(HttpBridge::new(url, config.bridge.api_key.clone(), timeout)?);
    Ok(Some(bridge))
}

async fn run_poster(config: &Config) -> anyhow::Result<()> {
    let session = connect(config).await?;
    let tracker = Arc::new(SubmissionTracker::new(session.clone(), config.tracker()));
    let log = SubmissionLog::open(&config.posting.log_path)?;

    let bridge = build_bridge(config)?;
    if bridge.is_none() {
        info!("📡 Commitment relay disabled");
    }

    let stop = CancellationToken::new();
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("🛑 Stop requested; finishing current cycle");
                stop.cancel();
            }
        });
    }

    let mut poster = PostingLoop::new(
        tracker,
        Box::new(SyntheticProducer::new(config.posting.start_block)),
        bridge,
        log,
        config.posting(),
    );
    poster.run(stop).await;

    session.disconnect().await;
    Ok(())
}

async fn submit_once(config: &Config, payload: Vec<u8>, wait_finality: bool, prove: bool) -> anyhow::Result<()> {
    let session = connect(config).await?;
    let tracker = Arc::new(SubmissionTracker::new(session.clone(), config.tracker()));

    let result = async {
        let record = tracker.submit(payload, config.network.app_id).await?;
        if wait_finality {
            tracker.await_finalization(&record).await?;
        }
        let proof = if prove {
            let engine = ProofEngine::new(tracker.clone(), config.chunk_size()?);
            engine.generate_proof(&record.block_ref).await?
        } else {
            None
        };
        anyhow::Ok((record, proof))
    }
    .await;
    session.disconnect().await;

    let (record, proof) = result?;
    println!("\n✅ Data submitted successfully!");
    println!("{}", serde_json::to_string_pretty(&record)?);
    if let Some(proof) = proof {
        println!("\n📋 Proof Details:");
        println!("{}", serde_json::to_string_pretty(&proof)?);
    }
    Ok(())
}

async fn generate_proof(config: &Config, block_ref: BlockRef) -> anyhow::Result<()> {
    if config.network.endpoint.starts_with("local://") {
        warn!("The local ledger starts empty in every process; only blocks from this run can be proven");
    }
    let session = connect(config).await?;
    let tracker = Arc::new(SubmissionTracker::new(session.clone(), config.tracker()));
    let engine = ProofEngine::new(tracker, config.chunk_size()?);

    let result = engine.generate_proof(&block_ref).await;
    session.disconnect().await;

    match result? {
        Some(proof) => {
            println!("\n📋 Proof Details:");
            println!("{}", serde_json::to_string_pretty(&proof)?);
            println!("   Generated: {}", format_timestamp_millis(proof.timestamp));
        }
        None => {
            println!("⏳ No proof yet for {block_ref}: the block is not finalized or carries no published data. Try again later.");
        }
    }
    Ok(())
}

fn verify(proof_path: &Path, data: &str) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(proof_path)
        .with_context(|| format!("reading {}", proof_path.display()))?;
    let proof: DaProof = serde_json::from_str(&raw).context("proof file is not a DA proof")?;

    if ProofEngine::verify_proof(&proof, data.as_bytes()) {
        println!("✅ Payload matches proof for block {}", proof.block_ref);
        Ok(())
    } else {
        bail!("payload hash does not match proof for block {}", proof.block_ref)
    }
}

async fn status(config: &Config) -> anyhow::Result<()> {
    let session = connect(config).await?;
    let result = async {
        let address = session.current_address().await?;
        let balance = session.query_balance().await?;
        let finalized = session.query_finalized_height().await?;
        anyhow::Ok((address, balance, finalized))
    }
    .await;
    session.disconnect().await;

    let (address, balance, finalized) = result?;
    println!("🔑 Account:   {address}");
    println!("💰 Balance:   {balance}");
    println!("🔒 Finalized: #{finalized}");
    Ok(())
}

async fn commitment(config: &Config, block_number: u64) -> anyhow::Result<()> {
    let Some(bridge) = build_bridge(config)? else {
        bail!("commitment relay is disabled (set bridge.enabled = true)");
    };
    if config.bridge.relayer_url.starts_with("memory") {
        warn!("The memory bridge starts empty in every process; use the relayer URL to read past commitments");
    }
    match bridge.get_commitment(block_number).await? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => println!("No commitment recorded for L2 block {block_number}"),
    }
    Ok(())
}
