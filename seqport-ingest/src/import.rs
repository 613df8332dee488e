/// The sequence import job: validate, materialize, register, retain, record
use crate::job::JobContext;
use crate::manifest::{
    ImportManifest, ManifestBucket, ManifestDemultiplex, ManifestReadData, ManifestReadset,
    SupportManifest,
};
use crate::request::ImportRequest;
use crate::retention::{PreparedInput, RetentionAction, RetentionExecutor};
use crate::validate::{merged_basename, validate_request};
use crate::writer::{ReadDataFiles, ReadsetCatalogWriter};
use anyhow::{Context, Result};
use seqport_bio::{
    compute_metrics_parallel, group_by_platform_unit, BarcodeTable, DemuxSummary, Demultiplexer,
    Merger, QualityStats,
};
use seqport_core::config::{Config, DemuxConfig, IngestConfig};
use seqport_core::{InputRetentionPolicy, ReadData, Readset, Run};
use seqport_storage::Catalog;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const RUN_DESCRIPTION: &str = "Sequence Import";

/// Everything an import created or changed
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub run: Run,
    pub readsets: Vec<Readset>,
    pub read_data: Vec<ReadData>,
    pub retention: Vec<RetentionAction>,
    pub demultiplex: Option<DemuxSummary>,
    /// Requested readsets that received no reads and were therefore not created
    pub empty_readsets: Vec<String>,
    pub manifest: PathBuf,
    pub support_manifest: PathBuf,
}

impl ImportOutcome {
    pub fn read_data_for(&self, readset: &str) -> Vec<&ReadData> {
        let Some(readset) = self.readsets.iter().find(|r| r.name == readset) else {
            return Vec::new();
        };
        self.read_data
            .iter()
            .filter(|rd| rd.readset == readset.id)
            .collect()
    }
}

/// One ReadData waiting to be registered
#[derive(Debug)]
struct PlannedReadData {
    readset: usize,
    files: ReadDataFiles,
    left_in_place: bool,
}

/// Outputs of step 2, all durable
#[derive(Debug, Default)]
struct Materialized {
    planned: Vec<PlannedReadData>,
    inputs: Vec<PreparedInput>,
    demultiplex: Option<DemuxSummary>,
    empty_readsets: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ImportJob {
    ingest: IngestConfig,
    demux: DemuxConfig,
}

impl ImportJob {
    pub fn new(config: &Config) -> Self {
        Self::with_configs(config.ingest.clone(), config.demux.clone())
    }

    pub fn with_configs(ingest: IngestConfig, demux: DemuxConfig) -> Self {
        Self { ingest, demux }
    }

    /// Run the whole job. Configuration problems fail before anything is written; a failure
    /// while writing catalog rows removes the rows written so far.
    pub fn run(
        &self,
        ctx: &JobContext,
        request: &ImportRequest,
        catalog: &dyn Catalog,
    ) -> Result<ImportOutcome> {
        let _entered = ctx.span().enter();
        let policy = request.retention.unwrap_or(self.ingest.retention);

        let barcodes = request
            .demultiplex
            .as_ref()
            .map(|d| d.barcode_table())
            .transpose()
            .context("Failed to load the barcode table")?;
        validate_request(request, barcodes.as_ref(), &self.demux)
            .context("Import request is invalid")?;
        info!(
            "Importing {} readset(s), retention {}",
            request.readsets.len(),
            policy
        );

        std::fs::create_dir_all(ctx.work_dir()).with_context(|| {
            format!("Failed to create work directory {}", ctx.work_dir().display())
        })?;
        let executor = RetentionExecutor::new(policy, ctx.work_dir())
            .with_compression_level(self.ingest.compression_level);

        let materialized = match (&request.demultiplex, barcodes.clone()) {
            (Some(demux), Some(table)) => {
                self.demultiplex(ctx, request, &demux.input, table, &executor)?
            }
            _ => self.merge_groups(ctx, request, &executor)?,
        };

        let paths: Vec<PathBuf> = materialized
            .planned
            .iter()
            .flat_map(|p| p.files.paths().map(Path::to_path_buf))
            .collect();
        let stats = compute_metrics_parallel(&paths).context("Failed to compute read metrics")?;

        let (run, readsets, read_data) =
            self.register(ctx, request, catalog, &materialized, stats)?;

        let retention: Vec<RetentionAction> = materialized
            .inputs
            .iter()
            .map(|input| executor.apply(input))
            .collect();

        let manifest = build_manifest(
            ctx,
            &run,
            policy,
            &readsets,
            &read_data,
            &materialized,
            &retention,
        )
        .write(ctx.work_dir())
        .context("Failed to write the import manifest")?;
        let support_manifest = SupportManifest {
            readsets: readsets.clone(),
            barcodes,
        }
        .write(ctx.work_dir())
        .context("Failed to write the support manifest")?;

        info!(
            "Import finished: {} readset(s), {} ReadData",
            readsets.len(),
            read_data.len()
        );
        Ok(ImportOutcome {
            run,
            readsets,
            read_data: read_data.into_iter().map(|(rd, _)| rd).collect(),
            retention,
            demultiplex: materialized.demultiplex,
            empty_readsets: materialized.empty_readsets,
            manifest,
            support_manifest,
        })
    }

    /// One ReadData per platform-unit partition: merged when it has several members, passed
    /// through otherwise
    fn merge_groups(
        &self,
        ctx: &JobContext,
        request: &ImportRequest,
        executor: &RetentionExecutor,
    ) -> Result<Materialized> {
        let merger = Merger::new(self.ingest.compression_level);
        let left_in_place = executor.policy() == InputRetentionPolicy::LeaveInPlace;
        let mut out = Materialized::default();

        for (index, readset) in request.readsets.iter().enumerate() {
            for partition in group_by_platform_unit(&readset.file_group()) {
                let platform_unit = partition[0].platform_unit.clone();
                let center_name = partition.iter().find_map(|fp| fp.center_name.clone());

                if partition.len() > 1 {
                    let basename = merged_basename(&readset.name, platform_unit.as_deref());
                    let merged = merger
                        .merge(&partition, ctx.work_dir(), &basename)
                        .with_context(|| format!("Failed to merge inputs of {}", readset.name))?;
                    for file in partition.iter().flat_map(|fp| fp.files()) {
                        out.inputs.push(executor.prepare(file, false)?);
                    }
                    out.planned.push(PlannedReadData {
                        readset: index,
                        files: ReadDataFiles {
                            file1: merged.file1,
                            file2: merged.file2,
                            platform_unit,
                            center_name,
                        },
                        left_in_place: false,
                    });
                } else {
                    let pair = &partition[0];
                    let file1 = executor.prepare(&pair.file1, true)?;
                    let file2 = pair
                        .file2
                        .as_deref()
                        .map(|f| executor.prepare(f, true))
                        .transpose()?;
                    out.planned.push(PlannedReadData {
                        readset: index,
                        files: ReadDataFiles {
                            file1: file1.reference().to_path_buf(),
                            file2: file2.as_ref().map(|f| f.reference().to_path_buf()),
                            platform_unit,
                            center_name,
                        },
                        left_in_place,
                    });
                    out.inputs.push(file1);
                    out.inputs.extend(file2);
                }
            }
        }
        Ok(out)
    }

    /// Split the pooled input; every non-empty bucket becomes one ReadData of its readset
    fn demultiplex(
        &self,
        ctx: &JobContext,
        request: &ImportRequest,
        input: &seqport_core::FilePair,
        table: BarcodeTable,
        executor: &RetentionExecutor,
    ) -> Result<Materialized> {
        let targets = request.readsets.iter().map(|r| r.demux_target()).collect();
        let demultiplexer = Demultiplexer::from_config(table, targets, &self.demux)
            .context("Invalid demultiplexing setup")?
            .with_compression_level(self.ingest.compression_level);
        let summary = demultiplexer
            .run(input, ctx.work_dir())
            .with_context(|| format!("Failed to demultiplex {}", input.file1.display()))?;

        let mut out = Materialized::default();
        for (index, bucket) in summary.buckets.iter().enumerate() {
            match (&bucket.file1, bucket.is_empty()) {
                (Some(file1), false) => out.planned.push(PlannedReadData {
                    readset: index,
                    files: ReadDataFiles {
                        file1: file1.clone(),
                        file2: bucket.file2.clone(),
                        platform_unit: input.platform_unit.clone(),
                        center_name: input.center_name.clone(),
                    },
                    left_in_place: false,
                }),
                _ => {
                    warn!(
                        "No reads matched {}; the readset is not created",
                        bucket.readset_name
                    );
                    out.empty_readsets.push(bucket.readset_name.clone());
                }
            }
        }
        for file in input.files() {
            out.inputs.push(executor.prepare(file, false)?);
        }
        out.demultiplex = Some(summary);
        Ok(out)
    }

    /// Step 3: all rows or none
    #[allow(clippy::type_complexity)]
    fn register(
        &self,
        ctx: &JobContext,
        request: &ImportRequest,
        catalog: &dyn Catalog,
        materialized: &Materialized,
        stats: Vec<QualityStats>,
    ) -> Result<(Run, Vec<Readset>, Vec<(ReadData, u64)>)> {
        let mut writer = ReadsetCatalogWriter::begin(catalog, ctx, RUN_DESCRIPTION)
            .context("Failed to register the import run")?;

        let write_all = || -> Result<(Vec<Readset>, Vec<(ReadData, u64)>)> {
            let mut created: Vec<Option<Readset>> = vec![None; request.readsets.len()];
            let mut read_data = Vec::with_capacity(materialized.planned.len());
            let mut stats = stats.into_iter();

            for planned in &materialized.planned {
                let readset = match &created[planned.readset] {
                    Some(readset) => readset.clone(),
                    None => {
                        let readset = writer.create_readset(&request.readsets[planned.readset])?;
                        created[planned.readset] = Some(readset.clone());
                        readset
                    }
                };
                let file_stats: Vec<QualityStats> =
                    stats.by_ref().take(planned.files.paths().count()).collect();
                let reads = file_stats.first().map(|s| s.reads).unwrap_or(0);
                let row = writer.add_read_data(&readset, &planned.files, &file_stats)?;
                read_data.push((row, reads));
            }
            Ok((created.into_iter().flatten().collect(), read_data))
        };

        match write_all() {
            Ok((readsets, read_data)) => Ok((writer.commit(), readsets, read_data)),
            Err(e) => {
                writer.rollback();
                Err(e.context("Failed to write catalog rows; the job's rows were rolled back"))
            }
        }
    }
}

fn build_manifest(
    ctx: &JobContext,
    run: &Run,
    policy: InputRetentionPolicy,
    readsets: &[Readset],
    read_data: &[(ReadData, u64)],
    materialized: &Materialized,
    retention: &[RetentionAction],
) -> ImportManifest {
    let readsets = readsets
        .iter()
        .map(|readset| ManifestReadset {
            id: readset.id,
            name: readset.name.clone(),
            read_data: read_data
                .iter()
                .zip(&materialized.planned)
                .filter(|((rd, _), _)| rd.readset == readset.id)
                .map(|((rd, reads), planned)| ManifestReadData {
                    id: rd.id,
                    file1: planned.files.file1.clone(),
                    file2: planned.files.file2.clone(),
                    platform_unit: rd.platform_unit.clone(),
                    reads: *reads,
                    left_in_place: planned.left_in_place,
                })
                .collect(),
        })
        .collect();

    let demultiplex = materialized.demultiplex.as_ref().map(|summary| ManifestDemultiplex {
        basename: summary.basename.clone(),
        total_reads: summary.total_reads,
        unknown_reads: summary.unknowns.reads,
        unknowns_file: summary.unknowns.file1.clone(),
        summary_file: summary.summary_file.clone(),
        buckets: summary
            .buckets
            .iter()
            .map(|b| ManifestBucket {
                readset: b.readset_name.clone(),
                barcode5: b.barcode5.clone(),
                barcode3: b.barcode3.clone(),
                reads: b.reads,
            })
            .collect(),
    });

    ImportManifest {
        job_id: ctx.job_id().to_string(),
        container: ctx.container().id,
        run_id: run.id,
        created: run.created,
        retention: policy,
        readsets,
        retention_actions: retention.to_vec(),
        demultiplex,
    }
}
