//! Barcode summary and unknowns metrics files

use super::DemuxBucket;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use seqport_core::{SeqportError, SeqportResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// One line of `<basename>.barcode-summary.txt.gz`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub readset: String,
    pub barcode5: String,
    pub barcode3: String,
    pub reads: u64,
    pub pct: f64,
}

fn csv_error(path: &Path, err: csv::Error) -> SeqportError {
    SeqportError::Serialization(format!("{}: {}", path.display(), err))
}

fn pct(reads: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        // two decimals, as printed
        (reads as f64 * 10_000.0 / total as f64).round() / 100.0
    }
}

fn row(bucket: &DemuxBucket, total: u64) -> SummaryRow {
    SummaryRow {
        readset: bucket.readset_name.clone(),
        barcode5: bucket.barcode5.clone().unwrap_or_else(|| "-".to_string()),
        barcode3: bucket.barcode3.clone().unwrap_or_else(|| "-".to_string()),
        reads: bucket.reads,
        pct: pct(bucket.reads, total),
    }
}

/// Tab-separated, gzipped: one row per target, then the unknowns and a total row
pub(super) fn write_barcode_summary(
    path: &Path,
    buckets: &[DemuxBucket],
    unknowns: &DemuxBucket,
    total: u64,
) -> SeqportResult<()> {
    let encoder = GzEncoder::new(File::create(path)?, Compression::default());
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(encoder);

    let total_row = SummaryRow {
        readset: "total".to_string(),
        barcode5: "-".to_string(),
        barcode3: "-".to_string(),
        reads: total,
        pct: pct(total, total),
    };
    for entry in buckets
        .iter()
        .chain(std::iter::once(unknowns))
        .map(|b| row(b, total))
        .chain(std::iter::once(total_row))
    {
        writer.serialize(entry).map_err(|e| csv_error(path, e))?;
    }

    let encoder = writer
        .into_inner()
        .map_err(|e| SeqportError::Serialization(format!("{}: {}", path.display(), e)))?;
    encoder.finish()?.sync_all()?;
    Ok(())
}

pub fn read_barcode_summary(path: &Path) -> SeqportResult<Vec<SummaryRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(MultiGzDecoder::new(File::open(path)?));
    reader
        .deserialize()
        .map(|row| row.map_err(|e| csv_error(path, e)))
        .collect()
}

/// Barcode combinations seen among unassigned reads, most frequent first
pub(super) fn write_unknowns_metrics(
    path: &Path,
    unmatched: &HashMap<(Option<String>, Option<String>), u64>,
    unknown_reads: u64,
) -> SeqportResult<()> {
    let mut observed: Vec<_> = unmatched.iter().collect();
    observed.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    let mut out = std::io::BufWriter::new(File::create(path)?);
    writeln!(out, "#unknownReads\t{}", unknown_reads)?;
    writeln!(out, "barcode5\tbarcode3\treads")?;
    for ((five, three), count) in observed {
        writeln!(
            out,
            "{}\t{}\t{}",
            five.as_deref().unwrap_or("-"),
            three.as_deref().unwrap_or("-"),
            count
        )?;
    }
    let file = out.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(name: &str, reads: u64) -> DemuxBucket {
        DemuxBucket {
            readset_name: name.to_string(),
            barcode5: Some("MID001".to_string()),
            barcode3: None,
            reads,
            file1: None,
            file2: None,
        }
    }

    #[test]
    fn test_summary_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.barcode-summary.txt.gz");
        let mut unknowns = bucket("unknowns", 1);
        unknowns.barcode5 = None;

        write_barcode_summary(&path, &[bucket("rs", 3)], &unknowns, 4).unwrap();
        let rows = read_barcode_summary(&path).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].readset, "rs");
        assert_eq!(rows[0].barcode3, "-");
        assert_eq!(rows[0].pct, 75.0);
        assert_eq!(rows[1].readset, "unknowns");
        assert_eq!(rows[2].reads, 4);
    }

    #[test]
    fn test_unknowns_metrics_sorted_by_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("u.metrics");
        let mut unmatched = HashMap::new();
        unmatched.insert((None, None), 5);
        unmatched.insert((Some("MID005".to_string()), Some("MID006".to_string())), 9);

        write_unknowns_metrics(&path, &unmatched, 14).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "#unknownReads\t14");
        assert_eq!(lines[2], "MID005\tMID006\t9");
        assert_eq!(lines[3], "-\t-\t5");
    }
}
