//! Job manifests consumed by downstream pipeline steps
//!
//! `sequenceImport.json` records what the job created and did to its inputs.
//! `sequenceSupport.json.gz` carries readset metadata and the barcode table so later steps need
//! not query the catalog.

use crate::retention::RetentionAction;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use seqport_bio::BarcodeTable;
use seqport_core::{
    ContainerId, InputRetentionPolicy, ReadDataId, Readset, ReadsetId, RunId, SeqportResult,
};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

pub const IMPORT_MANIFEST: &str = "sequenceImport.json";
pub const SUPPORT_MANIFEST: &str = "sequenceSupport.json.gz";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestReadData {
    pub id: ReadDataId,
    pub file1: PathBuf,
    #[serde(default)]
    pub file2: Option<PathBuf>,
    #[serde(default)]
    pub platform_unit: Option<String>,
    pub reads: u64,
    /// The files are the untouched originals and must not be relocated
    #[serde(default)]
    pub left_in_place: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestReadset {
    pub id: ReadsetId,
    pub name: String,
    pub read_data: Vec<ManifestReadData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestBucket {
    pub readset: String,
    #[serde(default)]
    pub barcode5: Option<String>,
    #[serde(default)]
    pub barcode3: Option<String>,
    pub reads: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDemultiplex {
    pub basename: String,
    pub total_reads: u64,
    pub unknown_reads: u64,
    #[serde(default)]
    pub unknowns_file: Option<PathBuf>,
    pub summary_file: PathBuf,
    pub buckets: Vec<ManifestBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportManifest {
    pub job_id: String,
    pub container: ContainerId,
    pub run_id: RunId,
    pub created: DateTime<Utc>,
    pub retention: InputRetentionPolicy,
    pub readsets: Vec<ManifestReadset>,
    pub retention_actions: Vec<RetentionAction>,
    #[serde(default)]
    pub demultiplex: Option<ManifestDemultiplex>,
}

impl ImportManifest {
    pub fn write(&self, dir: &Path) -> SeqportResult<PathBuf> {
        let path = dir.join(IMPORT_MANIFEST);
        write_atomically(&path, serde_json::to_string_pretty(self)?.as_bytes())?;
        Ok(path)
    }

    pub fn read(path: &Path) -> SeqportResult<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportManifest {
    pub readsets: Vec<Readset>,
    #[serde(default)]
    pub barcodes: Option<BarcodeTable>,
}

impl SupportManifest {
    pub fn write(&self, dir: &Path) -> SeqportResult<PathBuf> {
        let path = dir.join(SUPPORT_MANIFEST);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        serde_json::to_writer(&mut encoder, self)?;
        write_atomically(&path, &encoder.finish()?)?;
        Ok(path)
    }

    pub fn read(path: &Path) -> SeqportResult<Self> {
        let reader = GzDecoder::new(BufReader::new(File::open(path)?));
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Temp file, sync, rename
fn write_atomically(path: &Path, bytes: &[u8]) -> SeqportResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use seqport_core::ContainerId;

    #[test]
    fn test_support_manifest_is_gzipped_json() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = SupportManifest {
            readsets: vec![Readset {
                id: ReadsetId::new(3),
                container: ContainerId::new(1),
                name: "TestReadset1".to_string(),
                platform: "ILLUMINA".to_string(),
                sample_id: Some("S-1".to_string()),
                subject_id: None,
                sample_date: None,
                barcode5: Some("MID001".to_string()),
                barcode3: Some("MID002".to_string()),
                status: None,
            }],
            barcodes: Some(BarcodeTable::from_pairs([("MID001", "ACGAGTGCGT")]).unwrap()),
        };
        let path = manifest.write(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), SUPPORT_MANIFEST);

        let raw = fs::read(&path).unwrap();
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);
        assert_eq!(SupportManifest::read(&path).unwrap(), manifest);
    }

    #[test]
    fn test_import_manifest_uses_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = ImportManifest {
            job_id: "job-1".to_string(),
            container: ContainerId::new(1),
            run_id: RunId::new(2),
            created: Utc::now(),
            retention: InputRetentionPolicy::LeaveInPlace,
            readsets: Vec::new(),
            retention_actions: Vec::new(),
            demultiplex: None,
        };
        let path = manifest.write(dir.path()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"retentionActions\""));
        assert!(text.contains("\"leaveInPlace\""));
        assert_eq!(ImportManifest::read(&path).unwrap(), manifest);
    }
}
