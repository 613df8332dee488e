//! Barcode demultiplexing
//!
//! One input (single-end file or mate pair) is split into one output per configured
//! (readset, barcode5, barcode3) combination plus a single unknowns bucket. Every read lands in
//! exactly one bucket. Reads are written untrimmed.
//!
//! The 5' barcode is searched at the start of mate 1. The 3' barcode is searched at the start of
//! mate 2 for paired input, otherwise at the start of the reverse complement of mate 1.

mod matcher;
mod report;

pub use matcher::{BarcodeHit, BarcodeMatcher, OffsetMismatchMatcher};
pub use report::{read_barcode_summary, SummaryRow};

use crate::fastq::{fastq_basename, open_fastq, parse_error, safe_file_name, FastqSink};
use seq_io::fastq::Record;
use seqport_core::config::DemuxConfig;
use seqport_core::{FilePair, SeqportError, SeqportResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// A named barcode sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodeEntry {
    pub name: String,
    pub sequence: String,
}

impl BarcodeEntry {
    pub fn new(name: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sequence: sequence.into().to_ascii_uppercase(),
        }
    }
}

/// Barcode name to sequence lookup, in load order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodeTable {
    entries: Vec<BarcodeEntry>,
}

impl BarcodeTable {
    pub fn from_pairs<N, S>(pairs: impl IntoIterator<Item = (N, S)>) -> SeqportResult<Self>
    where
        N: Into<String>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for (name, sequence) in pairs {
            table.insert(BarcodeEntry::new(name, sequence))?;
        }
        Ok(table)
    }

    /// Load a two-column `name<TAB>sequence` file; `#` starts a comment line
    pub fn load_tsv(path: &Path) -> SeqportResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| {
                SeqportError::Configuration(format!(
                    "Unable to read barcode table {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let mut table = Self::default();
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                SeqportError::Parse(format!("{}: {}", path.display(), e))
            })?;
            match (record.get(0), record.get(1)) {
                (Some(name), Some(sequence)) if !name.is_empty() => {
                    table.insert(BarcodeEntry::new(name, sequence))?;
                }
                _ => {
                    return Err(SeqportError::Parse(format!(
                        "{}: record {} is not a name/sequence pair",
                        path.display(),
                        line + 1
                    )))
                }
            }
        }
        tracing::debug!("Loaded {} barcodes from {}", table.len(), path.display());
        Ok(table)
    }

    fn insert(&mut self, entry: BarcodeEntry) -> SeqportResult<()> {
        if entry.sequence.is_empty()
            || !entry
                .sequence
                .bytes()
                .all(|b| matches!(b, b'A' | b'C' | b'G' | b'T' | b'N'))
        {
            return Err(SeqportError::Parse(format!(
                "Barcode {} has an invalid sequence '{}'",
                entry.name, entry.sequence
            )));
        }
        if self.contains(&entry.name) {
            return Err(SeqportError::Configuration(format!(
                "Barcode {} is defined more than once",
                entry.name
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.sequence.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn entries(&self) -> &[BarcodeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One configured barcode combination and the readset its reads belong to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemuxTarget {
    pub readset_name: String,
    #[serde(default)]
    pub barcode5: Option<String>,
    #[serde(default)]
    pub barcode3: Option<String>,
}

impl DemuxTarget {
    pub fn new(
        readset_name: impl Into<String>,
        barcode5: Option<&str>,
        barcode3: Option<&str>,
    ) -> Self {
        Self {
            readset_name: readset_name.into(),
            barcode5: barcode5.map(str::to_string),
            barcode3: barcode3.map(str::to_string),
        }
    }

    pub fn barcodes(&self) -> impl Iterator<Item = &str> {
        self.barcode5.as_deref().into_iter().chain(self.barcode3.as_deref())
    }
}

/// Output of one bucket. Empty configured buckets have no files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemuxBucket {
    pub readset_name: String,
    pub barcode5: Option<String>,
    pub barcode3: Option<String>,
    pub reads: u64,
    pub file1: Option<PathBuf>,
    pub file2: Option<PathBuf>,
}

impl DemuxBucket {
    pub fn is_empty(&self) -> bool {
        self.reads == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemuxSummary {
    pub basename: String,
    pub total_reads: u64,
    /// One entry per configured target, in configuration order
    pub buckets: Vec<DemuxBucket>,
    pub unknowns: DemuxBucket,
    pub summary_file: PathBuf,
    pub metrics_file: PathBuf,
}

impl DemuxSummary {
    pub fn matched_reads(&self) -> u64 {
        self.buckets.iter().map(|b| b.reads).sum()
    }

    pub fn bucket(&self, readset_name: &str) -> Option<&DemuxBucket> {
        self.buckets.iter().find(|b| b.readset_name == readset_name)
    }
}

pub struct Demultiplexer {
    table: BarcodeTable,
    targets: Vec<DemuxTarget>,
    matcher: Box<dyn BarcodeMatcher>,
    unknowns_name: String,
    compression_level: u32,
}

/// Every bucket, unknowns included, needs its own output file once names are sanitized
pub fn check_bucket_names(targets: &[DemuxTarget], unknowns_name: &str) -> SeqportResult<()> {
    let unknowns = safe_file_name(unknowns_name);
    let mut seen: HashMap<String, &str> = HashMap::new();
    for target in targets {
        let safe = safe_file_name(&target.readset_name);
        if safe == unknowns {
            return Err(SeqportError::Configuration(format!(
                "Readset {} would share its output files with the {} bucket",
                target.readset_name, unknowns_name
            )));
        }
        if let Some(previous) = seen.insert(safe, &target.readset_name) {
            if previous != target.readset_name {
                return Err(SeqportError::Configuration(format!(
                    "Readsets {} and {} would share output files",
                    previous, target.readset_name
                )));
            }
        }
    }
    Ok(())
}

impl std::fmt::Debug for Demultiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Demultiplexer")
            .field("targets", &self.targets)
            .field("barcodes", &self.table.len())
            .field("unknowns_name", &self.unknowns_name)
            .finish()
    }
}

impl Demultiplexer {
    /// Validate the targets against the table. Unknown barcodes, duplicate combinations and
    /// readset names whose output files would collide are configuration errors.
    pub fn new(table: BarcodeTable, targets: Vec<DemuxTarget>) -> SeqportResult<Self> {
        Self::with_buckets(table, targets, DemuxConfig::default().unknowns_name)
    }

    fn with_buckets(
        table: BarcodeTable,
        targets: Vec<DemuxTarget>,
        unknowns_name: String,
    ) -> SeqportResult<Self> {
        if targets.is_empty() {
            return Err(SeqportError::Configuration(
                "Demultiplexing requires at least one barcode combination".to_string(),
            ));
        }

        let mut names = HashSet::new();
        let mut combinations = HashSet::new();
        for target in &targets {
            if target.readset_name.trim().is_empty() {
                return Err(SeqportError::Configuration(
                    "Demultiplexing target has an empty readset name".to_string(),
                ));
            }
            if target.barcode5.is_none() && target.barcode3.is_none() {
                return Err(SeqportError::Configuration(format!(
                    "Readset {} has neither a 5' nor a 3' barcode",
                    target.readset_name
                )));
            }
            if let Some(missing) = target.barcodes().find(|b| !table.contains(b)) {
                return Err(SeqportError::Configuration(format!(
                    "Readset {} references unknown barcode {}",
                    target.readset_name, missing
                )));
            }
            if !names.insert(target.readset_name.as_str()) {
                return Err(SeqportError::Configuration(format!(
                    "Readset {} is listed more than once",
                    target.readset_name
                )));
            }
            if !combinations.insert((target.barcode5.as_deref(), target.barcode3.as_deref())) {
                return Err(SeqportError::Configuration(format!(
                    "Barcode combination of readset {} is used by another readset",
                    target.readset_name
                )));
            }
        }

        check_bucket_names(&targets, &unknowns_name)?;

        Ok(Self {
            table,
            targets,
            matcher: Box::new(OffsetMismatchMatcher::default()),
            unknowns_name,
            compression_level: 6,
        })
    }

    pub fn from_config(
        table: BarcodeTable,
        targets: Vec<DemuxTarget>,
        config: &DemuxConfig,
    ) -> SeqportResult<Self> {
        Ok(
            Self::with_buckets(table, targets, config.unknowns_name.clone())?.with_matcher(
                OffsetMismatchMatcher::new(
                    config.max_offset,
                    config.max_mismatches,
                    config.max_deletions,
                ),
            ),
        )
    }

    pub fn with_matcher(mut self, matcher: impl BarcodeMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn with_unknowns_name(mut self, name: impl Into<String>) -> Self {
        self.unknowns_name = name.into();
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    pub fn targets(&self) -> &[DemuxTarget] {
        &self.targets
    }

    pub fn table(&self) -> &BarcodeTable {
        &self.table
    }

    /// Target index for the observed barcodes: exact combination first, then a 5'-only target,
    /// then a 3'-only target
    fn route(&self, five: Option<&str>, three: Option<&str>) -> Option<usize> {
        let find = |b5: Option<&str>, b3: Option<&str>| {
            self.targets
                .iter()
                .position(|t| t.barcode5.as_deref() == b5 && t.barcode3.as_deref() == b3)
        };
        if five.is_some() && three.is_some() {
            if let Some(index) = find(five, three) {
                return Some(index);
            }
        }
        if five.is_some() {
            if let Some(index) = find(five, None) {
                return Some(index);
            }
        }
        if three.is_some() {
            return find(None, three);
        }
        None
    }

    fn bucket_path(out_dir: &Path, basename: &str, bucket: &str, mate: u8) -> PathBuf {
        out_dir.join(format!("{}_{}_R{}.fastq.gz", basename, safe_file_name(bucket), mate))
    }

    fn open_sinks(
        &self,
        out_dir: &Path,
        basename: &str,
        name: &str,
        paired: bool,
    ) -> SeqportResult<(FastqSink, Option<FastqSink>)> {
        let sink1 = FastqSink::create(
            &Self::bucket_path(out_dir, basename, name, 1),
            self.compression_level,
        )?;
        let sink2 = if paired {
            Some(FastqSink::create(
                &Self::bucket_path(out_dir, basename, name, 2),
                self.compression_level,
            )?)
        } else {
            None
        };
        Ok((sink1, sink2))
    }

    /// Split `input` into per-target outputs under `out_dir`, write the barcode summary and the
    /// unknowns metrics. All outputs are synced before this returns.
    pub fn run(&self, input: &FilePair, out_dir: &Path) -> SeqportResult<DemuxSummary> {
        check_bucket_names(&self.targets, &self.unknowns_name)?;
        std::fs::create_dir_all(out_dir)?;
        let basename = fastq_basename(&input.file1);
        let paired = input.is_paired();
        let candidates = self.table.entries();

        let mut sinks = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            sinks.push(self.open_sinks(out_dir, &basename, &target.readset_name, paired)?);
        }
        let mut unknown_sinks = self.open_sinks(out_dir, &basename, &self.unknowns_name, paired)?;
        let mut unmatched: HashMap<(Option<String>, Option<String>), u64> = HashMap::new();
        let mut total = 0u64;

        let mut reader1 = open_fastq(&input.file1)?;
        let mut reader2 = match &input.file2 {
            Some(file2) => Some(open_fastq(file2)?),
            None => None,
        };

        while let Some(record1) = reader1.next() {
            let record1 = record1.map_err(|e| parse_error(&input.file1, e))?;
            total += 1;

            let record2 = match (&mut reader2, &input.file2) {
                (Some(reader), Some(file2)) => match reader.next() {
                    Some(record) => Some(record.map_err(|e| parse_error(file2, e))?),
                    None => {
                        return Err(SeqportError::InvalidInput(format!(
                            "{} has fewer reads than {}",
                            file2.display(),
                            input.file1.display()
                        )))
                    }
                },
                _ => None,
            };

            let hit5 = self.matcher.best_match(record1.seq(), candidates);
            let hit3 = match &record2 {
                Some(mate) => self.matcher.best_match(mate.seq(), candidates),
                None => self
                    .matcher
                    .best_match(&reverse_complement(record1.seq()), candidates),
            };
            let five = hit5.as_ref().map(|h| h.name.as_str());
            let three = hit3.as_ref().map(|h| h.name.as_str());

            let (sink1, sink2) = match self.route(five, three) {
                Some(index) => &mut sinks[index],
                None => {
                    *unmatched
                        .entry((five.map(str::to_string), three.map(str::to_string)))
                        .or_insert(0) += 1;
                    &mut unknown_sinks
                }
            };
            sink1.write_record(&record1)?;
            if let (Some(sink2), Some(mate)) = (sink2.as_mut(), record2.as_ref()) {
                sink2.write_record(mate)?;
            }
        }

        if let (Some(reader), Some(file2)) = (reader2.as_mut(), &input.file2) {
            if reader.next().is_some() {
                return Err(SeqportError::InvalidInput(format!(
                    "{} has more reads than {}",
                    file2.display(),
                    input.file1.display()
                )));
            }
        }

        let mut buckets = Vec::with_capacity(self.targets.len());
        for (target, (sink1, sink2)) in self.targets.iter().zip(sinks) {
            let (reads, file1, file2) = finish_bucket(sink1, sink2, true)?;
            if reads == 0 {
                tracing::warn!(
                    "No reads matched {} ({}/{}); no readset will be created",
                    target.readset_name,
                    target.barcode5.as_deref().unwrap_or("-"),
                    target.barcode3.as_deref().unwrap_or("-")
                );
            }
            buckets.push(DemuxBucket {
                readset_name: target.readset_name.clone(),
                barcode5: target.barcode5.clone(),
                barcode3: target.barcode3.clone(),
                reads,
                file1,
                file2,
            });
        }

        let (unknown_reads, unknown_file1, unknown_file2) =
            finish_bucket(unknown_sinks.0, unknown_sinks.1, false)?;
        let unknowns = DemuxBucket {
            readset_name: self.unknowns_name.clone(),
            barcode5: None,
            barcode3: None,
            reads: unknown_reads,
            file1: unknown_file1,
            file2: unknown_file2,
        };

        let summary_file = out_dir.join(format!("{}.barcode-summary.txt.gz", basename));
        report::write_barcode_summary(&summary_file, &buckets, &unknowns, total)?;

        let metrics_file = match &unknowns.file1 {
            Some(file1) => PathBuf::from(format!("{}.metrics", file1.display())),
            None => out_dir.join(format!("{}_{}.metrics", basename, self.unknowns_name)),
        };
        report::write_unknowns_metrics(&metrics_file, &unmatched, unknown_reads)?;

        let summary = DemuxSummary {
            basename,
            total_reads: total,
            buckets,
            unknowns,
            summary_file,
            metrics_file,
        };
        debug_assert_eq!(
            summary.matched_reads() + summary.unknowns.reads,
            summary.total_reads
        );
        tracing::info!(
            "Demultiplexed {} reads from {}: {} matched, {} unknown",
            summary.total_reads,
            input.file1.display(),
            summary.matched_reads(),
            summary.unknowns.reads
        );
        Ok(summary)
    }
}

/// Finish both mates of a bucket; with `drop_empty` an empty bucket loses its files
fn finish_bucket(
    sink1: FastqSink,
    sink2: Option<FastqSink>,
    drop_empty: bool,
) -> SeqportResult<(u64, Option<PathBuf>, Option<PathBuf>)> {
    let path1 = sink1.path().to_path_buf();
    let path2 = sink2.as_ref().map(|s| s.path().to_path_buf());
    let reads = sink1.finish()?;
    if let Some(sink2) = sink2 {
        sink2.finish()?;
    }

    if reads == 0 && drop_empty {
        for path in std::iter::once(&path1).chain(path2.as_ref()) {
            std::fs::remove_file(path)?;
        }
        return Ok((0, None, None));
    }
    Ok((reads, Some(path1), path2))
}

pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&b| match b.to_ascii_uppercase() {
            b'A' => b'T',
            b'T' => b'A',
            b'C' => b'G',
            b'G' => b'C',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fastq::count_reads;
    use pretty_assertions::assert_eq;
    use seqport_test::{write_fastq, BarcodedReadFactory, TestRead, TEST_BARCODES};

    fn table() -> BarcodeTable {
        BarcodeTable::from_pairs(TEST_BARCODES.iter().copied()).unwrap()
    }

    #[test]
    fn test_unknown_barcode_is_configuration_error() {
        let err = Demultiplexer::new(
            table(),
            vec![DemuxTarget::new("rs", Some("MID001"), Some("MID999"))],
        )
        .unwrap_err();
        assert!(err.is_fatal_configuration());
    }

    #[test]
    fn test_duplicate_combination_rejected() {
        let err = Demultiplexer::new(
            table(),
            vec![
                DemuxTarget::new("a", Some("MID001"), Some("MID002")),
                DemuxTarget::new("b", Some("MID001"), Some("MID002")),
            ],
        )
        .unwrap_err();
        assert!(err.is_fatal_configuration());
    }

    #[test]
    fn test_bucket_file_names_must_not_collide() {
        let err = Demultiplexer::new(
            table(),
            vec![
                DemuxTarget::new("unknowns", Some("MID001"), None),
                DemuxTarget::new("S1", Some("MID002"), None),
            ],
        )
        .unwrap_err();
        assert!(err.is_fatal_configuration());
        assert!(err.to_string().contains("unknowns"));

        let err = Demultiplexer::new(
            table(),
            vec![
                DemuxTarget::new("S 1", Some("MID001"), None),
                DemuxTarget::new("S_1", Some("MID002"), None),
            ],
        )
        .unwrap_err();
        assert!(err.is_fatal_configuration());

        let config = DemuxConfig {
            unknowns_name: "unassigned".to_string(),
            ..DemuxConfig::default()
        };
        let targets = vec![DemuxTarget::new("unknowns", Some("MID001"), None)];
        assert!(Demultiplexer::from_config(table(), targets, &config).is_ok());

        let renamed = Demultiplexer::new(
            table(),
            vec![DemuxTarget::new("unassigned", Some("MID001"), None)],
        )
        .unwrap()
        .with_unknowns_name("unassigned");
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("pool.fastq");
        write_fastq(&input, &[]).unwrap();
        let err = renamed.run(&FilePair::single(&input), dir.path()).unwrap_err();
        assert!(err.is_fatal_configuration());
    }

    #[test]
    fn test_routing_falls_back_to_single_end_targets() {
        let demux = Demultiplexer::new(
            table(),
            vec![
                DemuxTarget::new("both", Some("MID001"), Some("MID002")),
                DemuxTarget::new("five", Some("MID003"), None),
                DemuxTarget::new("three", None, Some("MID004")),
            ],
        )
        .unwrap();

        assert_eq!(demux.route(Some("MID001"), Some("MID002")), Some(0));
        assert_eq!(demux.route(Some("MID003"), Some("MID006")), Some(1));
        assert_eq!(demux.route(None, Some("MID004")), Some(2));
        assert_eq!(demux.route(Some("MID001"), None), None);
        assert_eq!(demux.route(None, None), None);
    }

    #[test]
    fn test_small_partition_and_empty_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let mut factory = BarcodedReadFactory::new(11, 40);
        let mut reads: Vec<TestRead> = Vec::new();
        reads.extend((0..5).map(|_| factory.read(Some("MID001"), Some("MID002"))));
        reads.extend((0..3).map(|_| factory.unbarcoded()));
        let input = dir.path().join("pool.fastq");
        write_fastq(&input, &reads).unwrap();

        let demux = Demultiplexer::new(
            table(),
            vec![
                DemuxTarget::new("hit", Some("MID001"), Some("MID002")),
                DemuxTarget::new("miss", Some("MID003"), Some("MID004")),
            ],
        )
        .unwrap();
        let summary = demux
            .run(&FilePair::single(&input), &dir.path().join("out"))
            .unwrap();

        assert_eq!(summary.total_reads, 8);
        assert_eq!(summary.bucket("hit").unwrap().reads, 5);
        assert_eq!(summary.unknowns.reads, 3);

        let miss = summary.bucket("miss").unwrap();
        assert!(miss.is_empty());
        assert_eq!(miss.file1, None);
        assert!(!dir.path().join("out/pool_miss_R1.fastq.gz").exists());

        let hit_file = summary.bucket("hit").unwrap().file1.clone().unwrap();
        assert_eq!(count_reads(&hit_file).unwrap(), 5);
        assert!(summary.summary_file.exists());
        assert!(summary.metrics_file.exists());
        assert!(summary
            .metrics_file
            .to_string_lossy()
            .ends_with("pool_unknowns_R1.fastq.gz.metrics"));
    }

    #[test]
    fn test_paired_input_uses_mate_two_for_three_prime() {
        let dir = tempfile::tempdir().unwrap();
        let bc5 = "ACGAGTGCGT";
        let bc3 = "ACGCTCGACA";
        let r1 = dir.path().join("p_R1.fastq");
        let r2 = dir.path().join("p_R2.fastq");
        write_fastq(
            &r1,
            &[
                TestRead::new("a", format!("{}{}", bc5, "T".repeat(30))),
                TestRead::new("b", format!("{}{}", bc5, "T".repeat(30))),
            ],
        )
        .unwrap();
        write_fastq(
            &r2,
            &[
                TestRead::new("a", format!("{}{}", bc3, "G".repeat(30))),
                TestRead::new("b", "G".repeat(40)),
            ],
        )
        .unwrap();

        let demux = Demultiplexer::new(
            table(),
            vec![DemuxTarget::new("rs", Some("MID001"), Some("MID002"))],
        )
        .unwrap();
        let summary = demux
            .run(&FilePair::paired(&r1, &r2), &dir.path().join("out"))
            .unwrap();

        let bucket = summary.bucket("rs").unwrap();
        assert_eq!(bucket.reads, 1);
        assert!(bucket.file2.is_some());
        assert_eq!(summary.unknowns.reads, 1);
        assert_eq!(count_reads(summary.unknowns.file2.as_ref().unwrap()).unwrap(), 1);
    }

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement(b"AACGTN"), b"NACGTT".to_vec());
    }
}
