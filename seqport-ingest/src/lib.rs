//! Readset ingestion for Seqport
//!
//! Turns raw sequencer files into readsets: validate the request, merge or demultiplex into the
//! job's work directory, register catalog rows, apply the input retention policy and write the
//! job manifests.

pub mod import;
pub mod job;
pub mod manifest;
pub mod request;
pub mod retention;
pub mod validate;
pub mod writer;

pub use import::{ImportJob, ImportOutcome};
pub use job::JobContext;
pub use manifest::{ImportManifest, SupportManifest, IMPORT_MANIFEST, SUPPORT_MANIFEST};
pub use request::{DemuxRequest, ImportRequest, ReadsetRequest};
pub use retention::{PreparedInput, RetentionAction, RetentionExecutor, RETAINED_DIR};
pub use validate::{find_problems, validate_request};
pub use writer::{ReadDataFiles, ReadsetCatalogWriter};
