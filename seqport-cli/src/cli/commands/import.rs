use crate::cli::output::*;
use crate::cli::Session;
use anyhow::{Context, Result};
use clap::Args;
use comfy_table::Cell;
use seqport_core::{seqport_home, ContainerId, InputRetentionPolicy};
use seqport_ingest::{ImportJob, ImportOutcome, ImportRequest, JobContext};
use seqport_storage::Catalog;
use std::path::PathBuf;

#[derive(Args)]
pub struct ImportArgs {
    /// Import request (JSON: readsets, optional demultiplex section, optional retention)
    #[arg(value_name = "REQUEST")]
    pub request: PathBuf,

    /// Catalog container that will own the readsets
    #[arg(short, long)]
    pub container: i64,

    /// Job work directory (defaults to $SEQPORT_HOME/work/<job id>)
    #[arg(short, long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Job identifier recorded in logs and manifests (generated when omitted)
    #[arg(long)]
    pub job_id: Option<String>,

    /// Override the retention policy: none, compress, delete, leaveInPlace
    #[arg(long, value_name = "POLICY")]
    pub retention: Option<InputRetentionPolicy>,
}

pub fn run(args: ImportArgs, session: &Session) -> Result<()> {
    let config = session.config()?;
    let mut request = ImportRequest::load(&args.request)?;
    if let Some(policy) = args.retention {
        request = request.with_retention(policy);
    }

    let catalog = session.open_catalog()?;
    let container = catalog
        .container(ContainerId::new(args.container))
        .with_context(|| format!("Unknown container {}", args.container))?;

    let job_id = args
        .job_id
        .unwrap_or_else(|| default_job_id(&container.name));
    let work_dir = args
        .work_dir
        .unwrap_or_else(|| seqport_home().join("work").join(&job_id));
    let ctx = JobContext::new(job_id, container, work_dir);

    action(&format!(
        "Importing {} readset(s) into {} (job {})",
        request.readsets.len(),
        ctx.container().name,
        ctx.job_id()
    ));

    let result = ImportJob::new(&config).run(&ctx, &request, &catalog);

    // Rows committed before a late failure must survive in the snapshot
    session.save_catalog(&catalog)?;
    let outcome = result?;

    print_outcome(&outcome);
    success(&format!(
        "Import complete, manifest written to {}",
        outcome.manifest.display()
    ));
    Ok(())
}

fn default_job_id(container: &str) -> String {
    format!(
        "import-{}-{}",
        container.to_lowercase().replace(char::is_whitespace, "_"),
        seqport_core::generate_utc_timestamp()
    )
}

fn print_outcome(outcome: &ImportOutcome) {
    section_header("Readsets");
    let mut table = create_standard_table();
    table.set_header(vec![
        header_cell("Id"),
        header_cell("Name"),
        header_cell("Sample"),
        header_cell("ReadData"),
        header_cell("Platform units"),
    ]);
    for readset in &outcome.readsets {
        let read_data = outcome.read_data_for(&readset.name);
        let units: Vec<&str> = read_data
            .iter()
            .map(|rd| rd.platform_unit.as_deref().unwrap_or("-"))
            .collect();
        table.add_row(vec![
            Cell::new(readset.id),
            Cell::new(&readset.name),
            Cell::new(readset.sample_id.as_deref().unwrap_or("-")),
            Cell::new(read_data.len()),
            Cell::new(units.join(", ")),
        ]);
    }
    println!("{}", table);

    for name in &outcome.empty_readsets {
        warning(&format!("{} received no reads and was not created", name));
    }

    if let Some(summary) = &outcome.demultiplex {
        section_header("Demultiplexing");
        tree_item(false, "Total reads", Some(&summary.total_reads.to_string()));
        for bucket in &summary.buckets {
            tree_item(false, &bucket.readset_name, Some(&bucket.reads.to_string()));
        }
        tree_item(true, "Unknown", Some(&summary.unknowns.reads.to_string()));
    }

    let deleted = outcome.retention.iter().filter(|a| a.deleted).count();
    let retained = outcome
        .retention
        .iter()
        .filter(|a| a.retained.is_some())
        .count();
    info(&format!(
        "Run {}: {} input(s), {} archived or relocated, {} deleted",
        outcome.run.id,
        outcome.retention.len(),
        retained,
        deleted
    ));
}
