//! Catalog rows the reconciler and ingestion resolve files through

use super::ids::{ContainerId, DataFileId, ReadsetId, RunId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unit of storage ownership; each container has its own pipeline root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: ContainerId,
    pub name: String,
    #[serde(default)]
    pub parent: Option<ContainerId>,
    pub pipeline_root: PathBuf,
}

/// A file the catalog knows about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFile {
    pub id: DataFileId,
    pub container: ContainerId,
    pub path: PathBuf,
    #[serde(default)]
    pub run_id: Option<RunId>,
}

impl DataFile {
    pub fn file_name(&self) -> Option<String> {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    }
}

/// A reference genome with its derived annotation files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceLibrary {
    pub id: i64,
    pub container: ContainerId,
    pub name: String,
    pub fasta_file: DataFileId,
    #[serde(default)]
    pub tracks: Vec<DataFileId>,
    #[serde(default)]
    pub chain_files: Vec<DataFileId>,
}

/// A file produced by an analysis job and registered for downstream use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    pub id: i64,
    pub container: ContainerId,
    pub data_id: DataFileId,
    pub category: String,
    #[serde(default)]
    pub readset: Option<ReadsetId>,
}
