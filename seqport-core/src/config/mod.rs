//! Configuration types for Seqport

use crate::types::InputRetentionPolicy;
use crate::SeqportError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub demux: DemuxConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// What happens to original input files once their reads are captured
    #[serde(default)]
    pub retention: InputRetentionPolicy,
    /// gzip level used for merged outputs and compressed archives (0-9)
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemuxConfig {
    /// How far into the read a barcode may start
    #[serde(default = "default_max_offset")]
    pub max_offset: usize,
    #[serde(default = "default_max_mismatches")]
    pub max_mismatches: usize,
    #[serde(default = "default_max_deletions")]
    pub max_deletions: usize,
    /// Name used for the bucket of reads that match no configured combination
    #[serde(default = "default_unknowns_name")]
    pub unknowns_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root of the shared artifact cache; defaults to SEQPORT_CACHE_DIR
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Extensions (without the dot) that the sweep never deletes
    #[serde(default = "default_ignored_extensions")]
    pub ignored_extensions: Vec<String>,
    /// Keep `.gz`, `.gz.tbi` and `.gz.idx` siblings of expected VCFs
    #[serde(default = "default_allow_compressed_vcf")]
    pub allow_compressed_vcf: bool,
    #[serde(default)]
    pub dry_run: bool,
}

// Default value functions
fn default_compression_level() -> u32 { 6 }
fn default_max_offset() -> usize { 3 }
fn default_max_mismatches() -> usize { 1 }
fn default_max_deletions() -> usize { 0 }
fn default_unknowns_name() -> String { "unknowns".to_string() }
fn default_poll_interval_ms() -> u64 { 500 }
fn default_wait_timeout_secs() -> u64 { 3600 }
fn default_ignored_extensions() -> Vec<String> { vec!["log".to_string()] }
fn default_allow_compressed_vcf() -> bool { true }

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            retention: InputRetentionPolicy::default(),
            compression_level: default_compression_level(),
        }
    }
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            max_offset: default_max_offset(),
            max_mismatches: default_max_mismatches(),
            max_deletions: default_max_deletions(),
            unknowns_name: default_unknowns_name(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            poll_interval_ms: default_poll_interval_ms(),
            wait_timeout_secs: default_wait_timeout_secs(),
        }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            ignored_extensions: default_ignored_extensions(),
            allow_compressed_vcf: default_allow_compressed_vcf(),
            dry_run: false,
        }
    }
}

impl CacheConfig {
    /// Cache root, falling back to the environment-derived default
    pub fn resolved_root(&self) -> PathBuf {
        self.root
            .clone()
            .unwrap_or_else(crate::system::seqport_cache_dir)
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, SeqportError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| SeqportError::Configuration(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

/// Load the config at `path` if it exists, otherwise fall back to defaults
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<Config, SeqportError> {
    let path = path.as_ref();
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!("No config at {}, using defaults", path.display());
        Ok(Config::default())
    }
}

pub fn save_config<P: AsRef<Path>>(path: P, config: &Config) -> Result<(), SeqportError> {
    let contents = toml::to_string_pretty(config)
        .map_err(|e| SeqportError::Configuration(format!("Failed to serialize config: {}", e)))?;
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}
