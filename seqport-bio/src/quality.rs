//! Per-file read quality summary
//!
//! Every FASTQ file yields exactly [`QUALITY_METRIC_NAMES`].len() metrics, regardless of read
//! depth; a paired ReadData therefore carries twice as many.

use crate::fastq::{open_fastq, parse_error};
use rayon::prelude::*;
use seq_io::fastq::Record;
use seqport_core::SeqportResult;
use std::path::{Path, PathBuf};

/// Phred offset of Sanger / Illumina 1.8+ qualities
const PHRED_OFFSET: u8 = 33;

pub const QUALITY_METRIC_NAMES: [&str; 15] = [
    "Total Reads",
    "Total Bases",
    "Total MBases",
    "Min Read Length",
    "Max Read Length",
    "Mean Read Length",
    "Mean Quality Score",
    "Total Q10 Bases",
    "Total Q20 Bases",
    "Total Q30 Bases",
    "Total Q40 Bases",
    "Pct Q10",
    "Pct Q20",
    "Pct Q30",
    "Pct Q40",
];

const THRESHOLDS: [u8; 4] = [10, 20, 30, 40];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityStats {
    pub reads: u64,
    pub bases: u64,
    pub min_length: Option<usize>,
    pub max_length: usize,
    quality_sum: u64,
    at_or_above: [u64; 4],
}

impl QualityStats {
    pub fn add(&mut self, seq: &[u8], qual: &[u8]) {
        let len = seq.len();
        self.reads += 1;
        self.bases += len as u64;
        self.min_length = Some(self.min_length.map_or(len, |m| m.min(len)));
        self.max_length = self.max_length.max(len);

        for &q in qual {
            let score = q.saturating_sub(PHRED_OFFSET);
            self.quality_sum += score as u64;
            for (slot, threshold) in self.at_or_above.iter_mut().zip(THRESHOLDS) {
                if score >= threshold {
                    *slot += 1;
                }
            }
        }
    }

    fn pct(&self, count: u64) -> f64 {
        if self.bases == 0 {
            0.0
        } else {
            count as f64 * 100.0 / self.bases as f64
        }
    }

    /// Metric name/value pairs in [`QUALITY_METRIC_NAMES`] order
    pub fn to_metrics(&self) -> Vec<(&'static str, f64)> {
        let mean_length = if self.reads == 0 {
            0.0
        } else {
            self.bases as f64 / self.reads as f64
        };
        let mean_quality = if self.bases == 0 {
            0.0
        } else {
            self.quality_sum as f64 / self.bases as f64
        };

        let values = [
            self.reads as f64,
            self.bases as f64,
            self.bases as f64 / 1_000_000.0,
            self.min_length.unwrap_or(0) as f64,
            self.max_length as f64,
            mean_length,
            mean_quality,
            self.at_or_above[0] as f64,
            self.at_or_above[1] as f64,
            self.at_or_above[2] as f64,
            self.at_or_above[3] as f64,
            self.pct(self.at_or_above[0]),
            self.pct(self.at_or_above[1]),
            self.pct(self.at_or_above[2]),
            self.pct(self.at_or_above[3]),
        ];

        QUALITY_METRIC_NAMES.into_iter().zip(values).collect()
    }
}

/// Single pass over a FASTQ file
pub fn compute_file_metrics(path: &Path) -> SeqportResult<QualityStats> {
    let mut reader = open_fastq(path)?;
    let mut stats = QualityStats::default();
    while let Some(record) = reader.next() {
        let record = record.map_err(|e| parse_error(path, e))?;
        stats.add(record.seq(), record.qual());
    }
    tracing::debug!("{}: {} reads, {} bases", path.display(), stats.reads, stats.bases);
    Ok(stats)
}

/// Metrics for several files at once, results in input order
pub fn compute_metrics_parallel(paths: &[PathBuf]) -> SeqportResult<Vec<QualityStats>> {
    paths
        .par_iter()
        .map(|path| compute_file_metrics(path))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqport_test::{write_fastq, TestRead};

    #[test]
    fn test_metric_cardinality_is_fixed() {
        assert_eq!(QualityStats::default().to_metrics().len(), 15);

        let mut stats = QualityStats::default();
        for _ in 0..1000 {
            stats.add(b"ACGT", b"IIII");
        }
        assert_eq!(stats.to_metrics().len(), 15);
    }

    #[test]
    fn test_metric_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.fastq");
        // '+' = Q10, '5' = Q20, '?' = Q30, 'I' = Q40
        write_fastq(
            &path,
            &[
                TestRead::new("a", "ACGT").with_qual("+5?I"),
                TestRead::new("b", "AC").with_qual("II"),
            ],
        )
        .unwrap();

        let stats = compute_file_metrics(&path).unwrap();
        let metrics: std::collections::HashMap<_, _> = stats.to_metrics().into_iter().collect();

        assert_eq!(metrics["Total Reads"], 2.0);
        assert_eq!(metrics["Total Bases"], 6.0);
        assert_eq!(metrics["Min Read Length"], 2.0);
        assert_eq!(metrics["Max Read Length"], 4.0);
        assert_eq!(metrics["Mean Read Length"], 3.0);
        assert_eq!(metrics["Total Q10 Bases"], 6.0);
        assert_eq!(metrics["Total Q30 Bases"], 4.0);
        assert_eq!(metrics["Total Q40 Bases"], 3.0);
        assert!((metrics["Pct Q40"] - 50.0).abs() < 1e-9);
        assert!((metrics["Mean Quality Score"] - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_parallel_metrics_keep_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..4)
            .map(|i| {
                let path = dir.path().join(format!("f{}.fastq", i));
                seqport_test::write_random_fastq(&path, 10 * (i + 1), 25, i as u64).unwrap();
                path
            })
            .collect();

        let stats = compute_metrics_parallel(&paths).unwrap();
        let reads: Vec<u64> = stats.iter().map(|s| s.reads).collect();
        assert_eq!(reads, vec![10, 20, 30, 40]);
    }
}
