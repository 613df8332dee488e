//! Sequence-level building blocks for readset ingestion
//!
//! FASTQ IO, per-file quality metrics, platform-unit grouping, merging and demultiplexing.

pub mod demux;
pub mod fastq;
pub mod grouping;
pub mod merge;
pub mod quality;

pub use demux::{
    check_bucket_names, read_barcode_summary, reverse_complement, BarcodeEntry, BarcodeHit,
    BarcodeMatcher, BarcodeTable, DemuxBucket, DemuxSummary, DemuxTarget, Demultiplexer,
    OffsetMismatchMatcher, SummaryRow,
};
pub use fastq::{count_reads, fastq_basename, open_fastq, safe_file_name, FastqSink};
pub use grouping::group_by_platform_unit;
pub use merge::{MergedOutput, Merger};
pub use quality::{compute_file_metrics, compute_metrics_parallel, QualityStats, QUALITY_METRIC_NAMES};
