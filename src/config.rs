use crate::functions::{MAX_BATCH_SIZE, MIN_BATCH_SIZE};
use crate::services::classifier::Extensions;
use crate::services::heuristics::DEFAULT_MAX_READ_BYTES;
use crate::services::{CritiqueClientConfig, DEFAULT_API_URL, DEFAULT_PROVIDER};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Service settings, read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub llm_api_key: Option<String>,
    pub llm_api_url: String,
    pub llm_provider: String,
    pub llm_timeout: Duration,
    pub snapshot_dir: PathBuf,
    /// `None` disables the snapshot reaper.
    pub snapshot_ttl: Option<Duration>,
    pub reaper_interval: Duration,
    pub max_read_bytes: u64,
    /// Files picked up when path analysis descends into a directory.
    pub path_analysis_extensions: Extensions,
    pub selection_warn: usize,
    pub selection_max: usize,
    pub default_batch_size: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|raw| raw.trim().parse::<u64>().ok());

        Self {
            bind_addr: lookup("CRITIC_BIND_ADDR")
                .and_then(|raw| SocketAddr::from_str(raw.trim()).ok())
                .unwrap_or(defaults.bind_addr),
            llm_api_key: lookup("LLM_API_KEY").filter(|key| !key.trim().is_empty()),
            llm_api_url: lookup("LLM_API_URL").unwrap_or(defaults.llm_api_url),
            llm_provider: lookup("LLM_PROVIDER").unwrap_or(defaults.llm_provider),
            llm_timeout: parsed("LLM_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.llm_timeout),
            snapshot_dir: lookup("CRITIC_SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_dir),
            snapshot_ttl: parsed("CRITIC_SNAPSHOT_TTL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            reaper_interval: parsed("CRITIC_REAPER_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.reaper_interval),
            max_read_bytes: parsed("CRITIC_MAX_READ_BYTES").unwrap_or(defaults.max_read_bytes),
            path_analysis_extensions: lookup("CRITIC_PATH_ANALYSIS_EXTENSIONS")
                .map(|raw| Extensions::new(raw.split(',').filter(|ext| !ext.trim().is_empty())))
                .filter(|exts| !exts.as_slice().is_empty())
                .unwrap_or(defaults.path_analysis_extensions),
            selection_warn: parsed("CRITIC_SELECTION_WARN")
                .map(|n| n as usize)
                .unwrap_or(defaults.selection_warn),
            selection_max: parsed("CRITIC_SELECTION_MAX")
                .map(|n| n as usize)
                .unwrap_or(defaults.selection_max),
            default_batch_size: parsed("CRITIC_DEFAULT_BATCH_SIZE")
                .map(|n| n as usize)
                .filter(|n| (MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(n))
                .unwrap_or(defaults.default_batch_size),
        }
    }

    /// Client settings, or `None` when no credential is configured.
    pub fn critique_client(&self) -> Option<CritiqueClientConfig> {
        self.llm_api_key.as_ref().map(|api_key| CritiqueClientConfig {
            api_key: api_key.clone(),
            api_url: self.llm_api_url.clone(),
            provider: self.llm_provider.clone(),
            timeout: self.llm_timeout,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            llm_api_key: None,
            llm_api_url: DEFAULT_API_URL.to_string(),
            llm_provider: DEFAULT_PROVIDER.to_string(),
            llm_timeout: Duration::from_secs(120),
            snapshot_dir: std::env::temp_dir(),
            snapshot_ttl: None,
            reaper_interval: Duration::from_secs(300),
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
            path_analysis_extensions: Extensions::path_analysis_default(),
            selection_warn: 50,
            selection_max: 200,
            default_batch_size: 20,
        }
    }
}
