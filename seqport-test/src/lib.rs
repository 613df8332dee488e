//! Test utilities for the Seqport workspace
//!
//! Common helpers shared by the integration tests of every Seqport crate:
//!
//! - **Test Environment**: isolated directory trees (inputs, job work directory, pipeline root,
//!   cache root) with automatic cleanup
//! - **Fixtures**: deterministic FASTQ generation, plain or gzipped
//! - **Barcodes**: reads carrying 5'/3' barcodes for demultiplexing tests

pub mod barcodes;
pub mod environment;
pub mod fixtures;

pub use barcodes::{reverse_complement, BarcodedReadFactory, TEST_BARCODES};
pub use environment::TestEnvironment;
pub use fixtures::{count_fastq_records, generate_reads, write_fastq, write_random_fastq, TestRead};

pub use anyhow::{Context, Result};
pub use tempfile;

/// Initialize test logging (safe to call from every test)
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .try_init();
}
