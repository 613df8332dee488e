//! What an import job is asked to do

use anyhow::{Context, Result};
use chrono::NaiveDate;
use seqport_bio::{BarcodeEntry, BarcodeTable, DemuxTarget};
use seqport_core::{FileGroup, FilePair, InputRetentionPolicy, SeqportResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One readset to create, with its metadata and (outside demultiplexing) its input files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadsetRequest {
    pub name: String,
    #[serde(default = "default_platform")]
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
    pub file_pairs: Vec<FilePair>,
}

fn default_platform() -> String {
    "ILLUMINA".to_string()
}

impl ReadsetRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            platform: default_platform(),
            sample_id: None,
            subject_id: None,
            sample_date: None,
            barcode5: None,
            barcode3: None,
            file_pairs: Vec::new(),
        }
    }

    pub fn with_file_pairs(mut self, file_pairs: Vec<FilePair>) -> Self {
        self.file_pairs = file_pairs;
        self
    }

    pub fn with_barcodes(mut self, barcode5: Option<&str>, barcode3: Option<&str>) -> Self {
        self.barcode5 = barcode5.map(str::to_string);
        self.barcode3 = barcode3.map(str::to_string);
        self
    }

    pub fn with_sample(mut self, sample_id: impl Into<String>) -> Self {
        self.sample_id = Some(sample_id.into());
        self
    }

    pub fn file_group(&self) -> FileGroup {
        FileGroup::new(self.name.clone(), self.file_pairs.clone())
    }

    pub fn demux_target(&self) -> DemuxTarget {
        DemuxTarget::new(
            self.name.clone(),
            self.barcode5.as_deref(),
            self.barcode3.as_deref(),
        )
    }
}

/// A single barcoded input split across the request's readsets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemuxRequest {
    pub input: FilePair,
    /// Inline barcode definitions
    #[serde(default)]
    pub barcodes: Vec<BarcodeEntry>,
    /// Two-column barcode file, merged after the inline entries
    #[serde(default)]
    pub barcode_file: Option<PathBuf>,
}

impl DemuxRequest {
    pub fn new(input: FilePair, barcodes: Vec<BarcodeEntry>) -> Self {
        Self {
            input,
            barcodes,
            barcode_file: None,
        }
    }

    pub fn barcode_table(&self) -> SeqportResult<BarcodeTable> {
        let mut pairs: Vec<(String, String)> = self
            .barcodes
            .iter()
            .map(|b| (b.name.clone(), b.sequence.clone()))
            .collect();
        if let Some(path) = &self.barcode_file {
            let loaded = BarcodeTable::load_tsv(path)?;
            pairs.extend(
                loaded
                    .entries()
                    .iter()
                    .map(|b| (b.name.clone(), b.sequence.clone())),
            );
        }
        BarcodeTable::from_pairs(pairs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub readsets: Vec<ReadsetRequest>,
    /// Falls back to the configured policy when absent
    #[serde(default)]
    pub retention: Option<InputRetentionPolicy>,
    #[serde(default)]
    pub demultiplex: Option<DemuxRequest>,
}

impl ImportRequest {
    pub fn new(readsets: Vec<ReadsetRequest>) -> Self {
        Self {
            readsets,
            retention: None,
            demultiplex: None,
        }
    }

    pub fn with_retention(mut self, retention: InputRetentionPolicy) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn with_demultiplex(mut self, demultiplex: DemuxRequest) -> Self {
        self.demultiplex = Some(demultiplex);
        self
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read import request {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse import request {}", path.display()))
    }

    /// Every original input file the job consumes, in request order
    pub fn input_files(&self) -> Vec<&Path> {
        match &self.demultiplex {
            Some(demux) => demux.input.files().collect(),
            None => self
                .readsets
                .iter()
                .flat_map(|r| r.file_pairs.iter().flat_map(|fp| fp.files()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_json_request() {
        let json = r#"{
            "readsets": [
                {"name": "S1", "sampleId": "A-1",
                 "filePairs": [{"file1": "/in/a_R1.fastq", "file2": "/in/a_R2.fastq",
                                "platformUnit": "pu1", "centerName": "GQ"}]}
            ],
            "retention": "leaveInPlace"
        }"#;
        let request: ImportRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.retention, Some(InputRetentionPolicy::LeaveInPlace));
        assert_eq!(request.readsets[0].platform, "ILLUMINA");
        assert_eq!(request.readsets[0].sample_id.as_deref(), Some("A-1"));
        let pair = &request.readsets[0].file_pairs[0];
        assert_eq!(pair.platform_unit.as_deref(), Some("pu1"));
        assert_eq!(pair.center_name.as_deref(), Some("GQ"));
        assert_eq!(
            request.input_files(),
            vec![Path::new("/in/a_R1.fastq"), Path::new("/in/a_R2.fastq")]
        );
    }

    #[test]
    fn test_barcode_table_merges_inline_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("barcodes.txt");
        std::fs::write(&file, "# name\tsequence\nMID002\tACGCTCGACA\n").unwrap();

        let mut demux = DemuxRequest::new(
            FilePair::single("/in/pool.fastq"),
            vec![BarcodeEntry::new("MID001", "acgagtgcgt")],
        );
        demux.barcode_file = Some(file);
        let table = demux.barcode_table().unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("MID001"), Some("ACGAGTGCGT"));
    }
}
