/// Persisting readsets, their ReadData and quality metrics
use crate::job::JobContext;
use crate::request::ReadsetRequest;
use seqport_bio::QualityStats;
use seqport_core::{
    ContainerId, DataFile, DataFileId, QualityMetric, ReadData, ReadDataId, Readset, ReadsetId,
    Run, RunId, SeqportError, SeqportResult,
};
use seqport_storage::Catalog;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Files of one ReadData about to be registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadDataFiles {
    pub file1: PathBuf,
    pub file2: Option<PathBuf>,
    pub platform_unit: Option<String>,
    pub center_name: Option<String>,
}

impl ReadDataFiles {
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.file1.as_path()).chain(self.file2.as_deref())
    }
}

/// Writes the rows of one import run and can undo them.
///
/// Readsets created through the writer are remembered; [`ReadsetCatalogWriter::rollback`]
/// deletes them again, which cascades to their ReadData and metrics.
pub struct ReadsetCatalogWriter<'a> {
    catalog: &'a dyn Catalog,
    container: ContainerId,
    run: Run,
    created: Vec<ReadsetId>,
}

impl<'a> ReadsetCatalogWriter<'a> {
    /// Register the run every row written afterwards belongs to
    pub fn begin(
        catalog: &'a dyn Catalog,
        ctx: &JobContext,
        description: &str,
    ) -> SeqportResult<Self> {
        let run = catalog.register_run(Run {
            id: RunId::new(0),
            container: ctx.container().id,
            job_id: ctx.job_id().to_string(),
            description: description.to_string(),
            created: chrono::Utc::now(),
        })?;
        debug!("Registered run {} for job {}", run.id, run.job_id);
        Ok(Self {
            catalog,
            container: ctx.container().id,
            run,
            created: Vec::new(),
        })
    }

    pub fn run(&self) -> &Run {
        &self.run
    }

    pub fn create_readset(&mut self, request: &ReadsetRequest) -> SeqportResult<Readset> {
        let readset = self.catalog.insert_readset(Readset {
            id: ReadsetId::new(0),
            container: self.container,
            name: request.name.clone(),
            platform: request.platform.clone(),
            sample_id: request.sample_id.clone(),
            subject_id: request.subject_id.clone(),
            sample_date: request.sample_date,
            barcode5: request.barcode5.clone(),
            barcode3: request.barcode3.clone(),
            status: None,
        })?;
        self.created.push(readset.id);
        Ok(readset)
    }

    fn register_file(&self, path: &Path) -> SeqportResult<DataFileId> {
        Ok(self
            .catalog
            .register_data_file(DataFile {
                id: DataFileId::new(0),
                container: self.container,
                path: path.to_path_buf(),
                run_id: Some(self.run.id),
            })?
            .id)
    }

    /// Register the files of one ReadData, the row itself and one metric set per file
    pub fn add_read_data(
        &mut self,
        readset: &Readset,
        files: &ReadDataFiles,
        stats: &[QualityStats],
    ) -> SeqportResult<ReadData> {
        let file_count = files.paths().count();
        if stats.len() != file_count {
            return Err(SeqportError::InvalidInput(format!(
                "{} metric set(s) for {} file(s) of readset {}",
                stats.len(),
                file_count,
                readset.name
            )));
        }

        let file_id1 = self.register_file(&files.file1)?;
        let file_id2 = match &files.file2 {
            Some(path) => Some(self.register_file(path)?),
            None => None,
        };
        let read_data = self.catalog.insert_read_data(ReadData {
            id: ReadDataId::new(0),
            readset: readset.id,
            container: self.container,
            file_id1,
            file_id2,
            platform_unit: files.platform_unit.clone(),
            center_name: files.center_name.clone(),
            run_id: self.run.id,
            archived: false,
        })?;

        let (readset_id, read_data_id, run_id) = (readset.id, read_data.id, self.run.id);
        let metrics: Vec<QualityMetric> = read_data
            .file_ids()
            .zip(stats)
            .flat_map(|(data_id, stats)| {
                stats
                    .to_metrics()
                    .into_iter()
                    .map(move |(name, value)| QualityMetric {
                        readset: readset_id,
                        read_data: read_data_id,
                        data_id,
                        run_id,
                        metric_name: name.to_string(),
                        value,
                    })
            })
            .collect();
        debug!(
            "ReadData {} of {}: {} metric rows",
            read_data.id,
            readset.name,
            metrics.len()
        );
        self.catalog.insert_metrics(metrics)?;
        Ok(read_data)
    }

    /// Keep everything written so far
    pub fn commit(self) -> Run {
        info!(
            "Run {} committed {} readset(s)",
            self.run.id,
            self.created.len()
        );
        self.run
    }

    /// Delete every readset this writer created
    pub fn rollback(self) {
        for id in self.created.iter().rev() {
            if let Err(e) = self.catalog.delete_readset(*id) {
                warn!("Rollback could not delete readset {}: {}", id, e);
            }
        }
        warn!(
            "Rolled back {} readset(s) of run {}",
            self.created.len(),
            self.run.id
        );
    }
}
