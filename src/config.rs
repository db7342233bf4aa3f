use anyhow::{Context, bail};
use serde::Deserialize;
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use crate::da::RpcConfig;
use crate::poster::PostingConfig;
use crate::tracker::TrackerConfig;

/// Configuration loaded from config.toml, then overridden from the environment
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub submission: SubmissionConfig,
    pub proofs: ProofsConfig,
    pub posting: PostingSection,
    pub bridge: BridgeConfig,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub endpoint: String,
    pub app_id: u32,
    /// Prefer `DA_SEED` in the environment over putting this in a file
    pub seed: String,
    pub request_timeout_secs: u64,
    pub status_poll_millis: u64,
}

// Keeps the seed out of `info!("Loaded config: {:?}")`
impl std::fmt::Debug for NetworkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkConfig")
            .field("endpoint", &self.endpoint)
            .field("app_id", &self.app_id)
            .field("seed", &"<redacted>")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("status_poll_millis", &self.status_poll_millis)
            .finish()
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            endpoint: "local://devnet".to_string(),
            app_id: 0,
            seed: "//Alice".to_string(),
            request_timeout_secs: 30,
            status_poll_millis: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    pub inclusion_timeout_secs: u64,
    pub finality_poll_secs: u64,
    pub finality_timeout_secs: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            inclusion_timeout_secs: 120,
            finality_poll_secs: 5,
            finality_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProofsConfig {
    pub chunk_size: usize,
}

impl Default for ProofsConfig {
    fn default() -> Self {
        Self { chunk_size: 32 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostingSection {
    pub interval_secs: u64,
    pub error_backoff_secs: u64,
    pub log_path: String,
    pub start_block: u64,
}

impl Default for PostingSection {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            error_backoff_secs: 5,
            log_path: "data/submissions.jsonl".to_string(),
            start_block: 1,
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub enabled: bool,
    pub relayer_url: String,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("enabled", &self.enabled)
            .field("relayer_url", &self.relayer_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            relayer_url: "http://127.0.0.1:8080".to_string(),
            api_key: None,
        }
    }
}

impl Config {
    /// Reads `path`, applies `.env` / environment overrides, validates
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;

        let _ = dotenvy::dotenv();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(endpoint) = var("DA_ENDPOINT") {
            self.network.endpoint = endpoint;
        }
        if let Some(app_id) = var("DA_APP_ID") {
            self.network.app_id = app_id.parse().context("DA_APP_ID must be an integer")?;
        }
        if let Some(seed) = var("DA_SEED") {
            self.network.seed = seed;
        }
        if let Some(interval) = var("POSTING_INTERVAL_SECS") {
            self.posting.interval_secs = interval
                .parse()
                .context("POSTING_INTERVAL_SECS must be an integer")?;
        }
        if let Some(url) = var("BRIDGE_RELAYER_URL") {
            self.bridge.relayer_url = url;
        }
        if let Some(key) = var("BRIDGE_API_KEY") {
            self.bridge.api_key = Some(key);
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.proofs.chunk_size == 0 {
            bail!("proofs.chunk_size must be greater than zero");
        }
        let durations = [
            ("network.request_timeout_secs", self.network.request_timeout_secs),
            ("network.status_poll_millis", self.network.status_poll_millis),
            ("submission.inclusion_timeout_secs", self.submission.inclusion_timeout_secs),
            ("submission.finality_poll_secs", self.submission.finality_poll_secs),
            ("submission.finality_timeout_secs", self.submission.finality_timeout_secs),
            ("posting.interval_secs", self.posting.interval_secs),
            ("posting.error_backoff_secs", self.posting.error_backoff_secs),
        ];
        for (name, value) in durations {
            if value == 0 {
                bail!("{name} must be greater than zero");
            }
        }
        Ok(())
    }

    pub fn rpc(&self) -> RpcConfig {
        RpcConfig {
            request_timeout: Duration::from_secs(self.network.request_timeout_secs),
            status_poll: Duration::from_millis(self.network.status_poll_millis),
        }
    }

    pub fn tracker(&self) -> TrackerConfig {
        TrackerConfig {
            inclusion_timeout: Duration::from_secs(self.submission.inclusion_timeout_secs),
            finality_poll: Duration::from_secs(self.submission.finality_poll_secs),
            finality_timeout: Duration::from_secs(self.submission.finality_timeout_secs),
        }
    }

    pub fn posting(&self) -> PostingConfig {
        PostingConfig {
            channel_id: self.network.app_id,
            interval: Duration::from_secs(self.posting.interval_secs),
            error_backoff: Duration::from_secs(self.posting.error_backoff_secs),
        }
    }

    pub fn chunk_size(&self) -> anyhow::Result<NonZeroUsize> {
        NonZeroUsize::new(self.proofs.chunk_size).context("proofs.chunk_size must be greater than zero")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [network]
            endpoint = "http://127.0.0.1:9944"
            app_id = 7

            [proofs]
            chunk_size = 64
            "#,
        )
        .unwrap();

        assert_eq!(config.network.app_id, 7);
        assert_eq!(config.network.seed, "//Alice");
        assert_eq!(config.proofs.chunk_size, 64);
        assert_eq!(config.posting.interval_secs, 60);
        assert_eq!(config.tracker().inclusion_timeout, Duration::from_secs(120));
        assert!(!config.bridge.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DA_ENDPOINT", "https://gateway.example"),
            ("DA_APP_ID", "12"),
            ("DA_SEED", "//Bob"),
            ("POSTING_INTERVAL_SECS", "15"),
        ]);
        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.network.endpoint, "https://gateway.example");
        assert_eq!(config.posting().channel_id, 12);
        assert_eq!(config.network.seed, "//Bob");
        assert_eq!(config.posting().interval, Duration::from_secs(15));

        let bad: HashMap<&str, &str> = HashMap::from([("DA_APP_ID", "twelve")]);
        assert!(config.apply_env(|k| bad.get(k).map(|v| v.to_string())).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let mut config = Config::default();
        config.proofs.chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.submission.inclusion_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_seed() {
        let config = Config::default();
        assert!(!format!("{config:?}").contains("//Alice"));
    }
}
