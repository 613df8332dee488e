/// Catalog kept in memory, optionally persisted as a JSON snapshot
use super::Catalog;
use parking_lot::RwLock;
use seqport_core::{
    Container, ContainerId, DataFile, DataFileId, OutputFile, QualityMetric, ReadData, ReadDataId,
    Readset, ReadsetId, ReferenceLibrary, Run, RunId, SeqportError, SeqportResult,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogState {
    next_id: i64,
    containers: BTreeMap<i64, Container>,
    runs: BTreeMap<i64, Run>,
    data_files: BTreeMap<i64, DataFile>,
    readsets: BTreeMap<i64, Readset>,
    read_data: BTreeMap<i64, ReadData>,
    metrics: Vec<QualityMetric>,
    reference_libraries: BTreeMap<i64, ReferenceLibrary>,
    output_files: BTreeMap<i64, OutputFile>,
}

impl CatalogState {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn require_container(&self, id: ContainerId) -> SeqportResult<()> {
        if self.containers.contains_key(&id.value()) {
            Ok(())
        } else {
            Err(SeqportError::Catalog(format!("No container with id {}", id)))
        }
    }
}

fn missing(what: &str, id: impl std::fmt::Display) -> SeqportError {
    SeqportError::NotFound(format!("{} {}", what, id))
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> SeqportResult<Self> {
        let contents = fs::read_to_string(path)?;
        let state: CatalogState = serde_json::from_str(&contents)?;
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Load `path` if it exists, otherwise start empty
    pub fn open(path: &Path) -> SeqportResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No catalog at {}, starting empty", path.display());
            Ok(Self::new())
        }
    }

    /// Write a snapshot (temp file, then rename)
    pub fn save(&self, path: &Path) -> SeqportResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = {
            let state = self.state.read();
            serde_json::to_string_pretty(&*state)?
        };
        let temp_path = path.with_extension("tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }
}

impl Catalog for InMemoryCatalog {
    fn insert_container(&self, mut container: Container) -> SeqportResult<Container> {
        let mut state = self.state.write();
        if let Some(parent) = container.parent {
            state.require_container(parent)?;
        }
        // containers keep caller-chosen ids so pipeline roots stay addressable
        if container.id.value() <= 0 || state.containers.contains_key(&container.id.value()) {
            container.id = ContainerId::new(state.allocate());
        } else {
            state.next_id = state.next_id.max(container.id.value());
        }
        state
            .containers
            .insert(container.id.value(), container.clone());
        Ok(container)
    }

    fn container(&self, id: ContainerId) -> SeqportResult<Container> {
        self.state
            .read()
            .containers
            .get(&id.value())
            .cloned()
            .ok_or_else(|| missing("container", id))
    }

    fn child_containers(&self, id: ContainerId) -> SeqportResult<Vec<Container>> {
        Ok(self
            .state
            .read()
            .containers
            .values()
            .filter(|c| c.parent == Some(id))
            .cloned()
            .collect())
    }

    fn register_run(&self, mut run: Run) -> SeqportResult<Run> {
        let mut state = self.state.write();
        state.require_container(run.container)?;
        run.id = RunId::new(state.allocate());
        state.runs.insert(run.id.value(), run.clone());
        Ok(run)
    }

    fn run(&self, id: RunId) -> SeqportResult<Run> {
        self.state
            .read()
            .runs
            .get(&id.value())
            .cloned()
            .ok_or_else(|| missing("run", id))
    }

    fn register_data_file(&self, mut file: DataFile) -> SeqportResult<DataFile> {
        let mut state = self.state.write();
        state.require_container(file.container)?;
        file.id = DataFileId::new(state.allocate());
        state.data_files.insert(file.id.value(), file.clone());
        Ok(file)
    }

    fn data_file(&self, id: DataFileId) -> SeqportResult<DataFile> {
        self.state
            .read()
            .data_files
            .get(&id.value())
            .cloned()
            .ok_or_else(|| missing("data file", id))
    }

    fn insert_readset(&self, mut readset: Readset) -> SeqportResult<Readset> {
        let mut state = self.state.write();
        state.require_container(readset.container)?;
        readset.id = ReadsetId::new(state.allocate());
        state.readsets.insert(readset.id.value(), readset.clone());
        Ok(readset)
    }

    fn readset(&self, id: ReadsetId) -> SeqportResult<Readset> {
        self.state
            .read()
            .readsets
            .get(&id.value())
            .cloned()
            .ok_or_else(|| missing("readset", id))
    }

    fn readsets(&self, container: ContainerId) -> SeqportResult<Vec<Readset>> {
        Ok(self
            .state
            .read()
            .readsets
            .values()
            .filter(|r| r.container == container)
            .cloned()
            .collect())
    }

    fn delete_readset(&self, id: ReadsetId) -> SeqportResult<()> {
        let mut state = self.state.write();
        if state.readsets.remove(&id.value()).is_none() {
            return Err(missing("readset", id));
        }
        state.read_data.retain(|_, rd| rd.readset != id);
        state.metrics.retain(|m| m.readset != id);
        state.output_files.retain(|_, o| o.readset != Some(id));
        tracing::debug!("Deleted readset {} and its dependent rows", id);
        Ok(())
    }

    fn insert_read_data(&self, mut read_data: ReadData) -> SeqportResult<ReadData> {
        let mut state = self.state.write();
        if !state.readsets.contains_key(&read_data.readset.value()) {
            return Err(SeqportError::Catalog(format!(
                "ReadData references unknown readset {}",
                read_data.readset
            )));
        }
        for file in read_data.file_ids() {
            if !state.data_files.contains_key(&file.value()) {
                return Err(SeqportError::Catalog(format!(
                    "ReadData references unknown data file {}",
                    file
                )));
            }
        }
        read_data.id = ReadDataId::new(state.allocate());
        state.read_data.insert(read_data.id.value(), read_data.clone());
        Ok(read_data)
    }

    fn read_data(&self, id: ReadDataId) -> SeqportResult<ReadData> {
        self.state
            .read()
            .read_data
            .get(&id.value())
            .cloned()
            .ok_or_else(|| missing("read data", id))
    }

    fn read_data_for_readset(&self, readset: ReadsetId) -> SeqportResult<Vec<ReadData>> {
        Ok(self
            .state
            .read()
            .read_data
            .values()
            .filter(|rd| rd.readset == readset)
            .cloned()
            .collect())
    }

    fn read_data_in_container(&self, container: ContainerId) -> SeqportResult<Vec<ReadData>> {
        Ok(self
            .state
            .read()
            .read_data
            .values()
            .filter(|rd| rd.container == container)
            .cloned()
            .collect())
    }

    fn insert_metrics(&self, metrics: Vec<QualityMetric>) -> SeqportResult<()> {
        let mut state = self.state.write();
        if let Some(orphan) = metrics
            .iter()
            .find(|m| !state.read_data.contains_key(&m.read_data.value()))
        {
            return Err(SeqportError::Catalog(format!(
                "Metric {} references unknown read data {}",
                orphan.metric_name, orphan.read_data
            )));
        }
        state.metrics.extend(metrics);
        Ok(())
    }

    fn metrics_for_readset(&self, readset: ReadsetId) -> SeqportResult<Vec<QualityMetric>> {
        Ok(self
            .state
            .read()
            .metrics
            .iter()
            .filter(|m| m.readset == readset)
            .cloned()
            .collect())
    }

    fn insert_reference_library(
        &self,
        mut library: ReferenceLibrary,
    ) -> SeqportResult<ReferenceLibrary> {
        let mut state = self.state.write();
        state.require_container(library.container)?;
        library.id = state.allocate();
        state
            .reference_libraries
            .insert(library.id, library.clone());
        Ok(library)
    }

    fn reference_libraries(&self, container: ContainerId) -> SeqportResult<Vec<ReferenceLibrary>> {
        Ok(self
            .state
            .read()
            .reference_libraries
            .values()
            .filter(|l| l.container == container)
            .cloned()
            .collect())
    }

    fn insert_output_file(&self, mut output: OutputFile) -> SeqportResult<OutputFile> {
        let mut state = self.state.write();
        state.require_container(output.container)?;
        output.id = state.allocate();
        state.output_files.insert(output.id, output.clone());
        Ok(output)
    }

    fn output_files(&self, container: ContainerId) -> SeqportResult<Vec<OutputFile>> {
        Ok(self
            .state
            .read()
            .output_files
            .values()
            .filter(|o| o.container == container)
            .cloned()
            .collect())
    }
}
