use crate::error::Result;
use serde::Deserialize;
use std::fs;

/// Runtime configuration, loaded from `config.toml` when present.
/// Every section has working defaults so the pipeline runs without a file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enrichment: EnrichmentConfig,
    pub commit: CommitConfig,
    pub staging: StagingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Extraction service endpoint (POST, JSON in/out).
    pub endpoint: String,
    /// Per-call timeout; a slower call counts as a failed extraction.
    pub timeout_seconds: u64,
    /// Upper bound on in-flight extraction calls.
    pub max_in_flight: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommitConfig {
    /// Number of records submitted to the store per bulk_create call.
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Idle sessions older than this are swept.
    pub session_ttl_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enrichment: EnrichmentConfig::default(),
            commit: CommitConfig::default(),
            staging: StagingConfig::default(),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8808/extract".to_string(),
            timeout_seconds: 20,
            max_in_flight: 4,
        }
    }
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self { chunk_size: 25 }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            session_ttl_minutes: 30,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        match fs::read_to_string(config_path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(crate::error::IngestError::Config(format!(
                "failed to read config file '{}': {}",
                config_path, e
            ))),
        }
    }
}
