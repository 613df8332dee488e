/// Core types shared across all Seqport modules
pub mod catalog;
pub mod ids;
pub mod input;
pub mod readset;
pub mod retention;

pub use catalog::{Container, DataFile, OutputFile, ReferenceLibrary};
pub use ids::{ContainerId, DataFileId, ReadDataId, ReadsetId, RunId};
pub use input::{FileGroup, FilePair};
pub use readset::{QualityMetric, ReadData, Readset, Run};
pub use retention::InputRetentionPolicy;
