//! System-level helpers: directory discovery and timestamps

pub mod paths;

pub use paths::{generate_utc_timestamp, seqport_cache_dir, seqport_config_path, seqport_home};
