//! Core utilities and types shared across all Seqport crates

pub mod config;
pub mod error;
pub mod system;
pub mod types;

// Re-export commonly used types
pub use config::{load_config, save_config, Config};
pub use error::{SeqportError, SeqportResult};

pub use types::{
    Container, ContainerId, DataFile, DataFileId, FileGroup, FilePair, InputRetentionPolicy,
    OutputFile, QualityMetric, ReadData, ReadDataId, Readset, ReadsetId, ReferenceLibrary, Run,
    RunId,
};

pub use system::{
    generate_utc_timestamp, seqport_cache_dir, seqport_config_path, seqport_home,
};

/// Version information for the Seqport project
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
