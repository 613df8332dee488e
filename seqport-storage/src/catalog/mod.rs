/// The authoritative record of readsets, their files, and everything the reconciler must keep
///
/// Insert methods ignore the id carried by the row and return the row with the id the catalog
/// assigned.
mod memory;

pub use memory::InMemoryCatalog;

use seqport_core::{
    Container, ContainerId, DataFile, DataFileId, OutputFile, QualityMetric, ReadData, ReadDataId,
    Readset, ReadsetId, ReferenceLibrary, Run, RunId, SeqportResult,
};

pub trait Catalog: Send + Sync {
    // Containers
    fn insert_container(&self, container: Container) -> SeqportResult<Container>;
    fn container(&self, id: ContainerId) -> SeqportResult<Container>;
    fn child_containers(&self, id: ContainerId) -> SeqportResult<Vec<Container>>;

    // Runs and files
    fn register_run(&self, run: Run) -> SeqportResult<Run>;
    fn run(&self, id: RunId) -> SeqportResult<Run>;
    fn register_data_file(&self, file: DataFile) -> SeqportResult<DataFile>;
    fn data_file(&self, id: DataFileId) -> SeqportResult<DataFile>;

    // Readsets
    fn insert_readset(&self, readset: Readset) -> SeqportResult<Readset>;
    fn readset(&self, id: ReadsetId) -> SeqportResult<Readset>;
    fn readsets(&self, container: ContainerId) -> SeqportResult<Vec<Readset>>;
    /// Removes the readset with its ReadData, metrics and output files
    fn delete_readset(&self, id: ReadsetId) -> SeqportResult<()>;

    fn insert_read_data(&self, read_data: ReadData) -> SeqportResult<ReadData>;
    fn read_data(&self, id: ReadDataId) -> SeqportResult<ReadData>;
    fn read_data_for_readset(&self, readset: ReadsetId) -> SeqportResult<Vec<ReadData>>;
    fn read_data_in_container(&self, container: ContainerId) -> SeqportResult<Vec<ReadData>>;

    fn insert_metrics(&self, metrics: Vec<QualityMetric>) -> SeqportResult<()>;
    fn metrics_for_readset(&self, readset: ReadsetId) -> SeqportResult<Vec<QualityMetric>>;

    // Other artifact owners
    fn insert_reference_library(&self, library: ReferenceLibrary)
        -> SeqportResult<ReferenceLibrary>;
    fn reference_libraries(&self, container: ContainerId) -> SeqportResult<Vec<ReferenceLibrary>>;
    fn insert_output_file(&self, output: OutputFile) -> SeqportResult<OutputFile>;
    fn output_files(&self, container: ContainerId) -> SeqportResult<Vec<OutputFile>>;
}
