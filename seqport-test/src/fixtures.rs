//! FASTQ fixtures and data generators

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// A FASTQ record for fixtures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRead {
    pub name: String,
    pub seq: String,
    pub qual: String,
}

impl TestRead {
    /// Read with a uniform quality string
    pub fn new(name: impl Into<String>, seq: impl Into<String>) -> Self {
        let seq = seq.into();
        let qual = "I".repeat(seq.len());
        Self {
            name: name.into(),
            seq,
            qual,
        }
    }

    pub fn with_qual(mut self, qual: impl Into<String>) -> Self {
        self.qual = qual.into();
        self
    }

    pub fn to_fastq(&self) -> String {
        format!("@{}\n{}\n+\n{}\n", self.name, self.seq, self.qual)
    }
}

/// Generate random reads; deterministic for a given seed
pub fn generate_reads(prefix: &str, count: usize, length: usize, seed: u64) -> Vec<TestRead> {
    let mut rng = StdRng::seed_from_u64(seed);
    let bases = ['A', 'C', 'G', 'T'];

    (0..count)
        .map(|i| {
            let seq: String = (0..length).map(|_| bases[rng.gen_range(0..4)]).collect();
            let qual: String = (0..length)
                .map(|_| (b'!' + rng.gen_range(2..41u8)) as char)
                .collect();
            TestRead::new(format!("{}_{}", prefix, i), seq).with_qual(qual)
        })
        .collect()
}

/// Write reads as FASTQ; gzip-compressed when the path ends in `.gz`
pub fn write_fastq(path: &Path, reads: &[TestRead]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer: Box<dyn Write> = if is_gz(path) {
        Box::new(GzEncoder::new(BufWriter::new(file), Compression::fast()))
    } else {
        Box::new(BufWriter::new(file))
    };
    for read in reads {
        writer.write_all(read.to_fastq().as_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_random_fastq(path: &Path, count: usize, length: usize, seed: u64) -> Result<()> {
    let prefix = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "read".to_string());
    write_fastq(path, &generate_reads(&prefix, count, length, seed))
}

/// Count records independently of the code under test (4 lines per record)
pub fn count_fastq_records(path: &Path) -> Result<usize> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let reader: Box<dyn Read> = if is_gz(path) {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let lines = BufReader::new(reader)
        .lines()
        .filter(|l| l.as_ref().map(|l| !l.is_empty()).unwrap_or(true))
        .count();
    Ok(lines / 4)
}

fn is_gz(path: &Path) -> bool {
    path.extension().map(|e| e == "gz").unwrap_or(false)
}
