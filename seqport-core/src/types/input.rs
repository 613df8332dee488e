//! Request-time descriptors of raw sequencer files

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One raw input: a single-end FASTQ or a mate pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePair {
    #[serde(default)]
    pub platform_unit: Option<String>,
    #[serde(default)]
    pub center_name: Option<String>,
    pub file1: PathBuf,
    #[serde(default)]
    pub file2: Option<PathBuf>,
}

impl FilePair {
    pub fn single(file1: impl Into<PathBuf>) -> Self {
        Self {
            platform_unit: None,
            center_name: None,
            file1: file1.into(),
            file2: None,
        }
    }

    pub fn paired(file1: impl Into<PathBuf>, file2: impl Into<PathBuf>) -> Self {
        Self {
            file2: Some(file2.into()),
            ..Self::single(file1)
        }
    }

    pub fn with_platform_unit(mut self, platform_unit: impl Into<String>) -> Self {
        self.platform_unit = Some(platform_unit.into());
        self
    }

    pub fn with_center_name(mut self, center_name: impl Into<String>) -> Self {
        self.center_name = Some(center_name.into());
        self
    }

    pub fn is_paired(&self) -> bool {
        self.file2.is_some()
    }

    /// All files this pair consumes, mate 1 first
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.file1.as_path()).chain(self.file2.as_deref())
    }
}

/// Transient grouping of raw files that becomes exactly one readset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileGroup {
    pub name: String,
    #[serde(default)]
    pub file_pairs: Vec<FilePair>,
}

impl FileGroup {
    pub fn new(name: impl Into<String>, file_pairs: Vec<FilePair>) -> Self {
        Self {
            name: name.into(),
            file_pairs,
        }
    }

    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.file_pairs.iter().flat_map(|fp| fp.files())
    }
}
