//! Readset bookkeeping rows

use super::ids::{ContainerId, DataFileId, ReadDataId, ReadsetId, RunId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Logical sequencing sample, independent of how many files contributed to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Readset {
    pub id: ReadsetId,
    pub container: ContainerId,
    pub name: String,
    pub platform: String,
    #[serde(default)]
    pub sample_id: Option<String>,
    #[serde(default)]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub sample_date: Option<NaiveDate>,
    #[serde(default)]
    pub barcode5: Option<String>,
    #[serde(default)]
    pub barcode3: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// One physical file (pair) contributing reads to a readset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadData {
    pub id: ReadDataId,
    pub readset: ReadsetId,
    pub container: ContainerId,
    pub file_id1: DataFileId,
    #[serde(default)]
    pub file_id2: Option<DataFileId>,
    #[serde(default)]
    pub platform_unit: Option<String>,
    #[serde(default)]
    pub center_name: Option<String>,
    pub run_id: RunId,
    #[serde(default)]
    pub archived: bool,
}

impl ReadData {
    pub fn is_paired(&self) -> bool {
        self.file_id2.is_some()
    }

    pub fn file_ids(&self) -> impl Iterator<Item = DataFileId> {
        std::iter::once(self.file_id1).chain(self.file_id2)
    }
}

/// A single named quality value describing one file of a ReadData
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetric {
    pub readset: ReadsetId,
    pub read_data: ReadDataId,
    pub data_id: DataFileId,
    pub run_id: RunId,
    pub metric_name: String,
    pub value: f64,
}

/// One ingestion or analysis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub container: ContainerId,
    pub job_id: String,
    pub description: String,
    pub created: DateTime<Utc>,
}
