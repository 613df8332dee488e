/// Garbage collection of pipeline directories
///
/// Walks the container tree and removes, per artifact class:
/// - sequence files no ReadData points at
/// - reference library files outside the catalog-derived layout
/// - analysis outputs no OutputFile row references
use crate::cli::output::*;
use crate::cli::Session;
use anyhow::Result;
use clap::Args;
use comfy_table::Cell;
use indicatif::{ProgressBar, ProgressStyle};
use seqport_core::ContainerId;
use seqport_storage::{ArtifactClassRegistry, ArtifactReconciler, ReconcileReport, SidecarRules};
use std::time::Duration;

#[derive(Debug, Args)]
pub struct GcArgs {
    /// Container to sweep (child containers are included)
    #[arg(short, long)]
    pub container: i64,

    /// Dry run - show what would be removed without actually removing
    #[arg(long)]
    pub dry_run: bool,

    /// Additional file extensions never to delete (without the dot)
    #[arg(long = "ignore-ext", value_name = "EXT")]
    pub ignore_extensions: Vec<String>,

    /// Print every deleted and missing path
    #[arg(long)]
    pub list: bool,
}

pub fn run(args: GcArgs, session: &Session) -> Result<()> {
    let config = session.config()?;
    let catalog = session.open_catalog()?;

    let mut reconciler_config = config.reconciler.clone();
    reconciler_config
        .ignored_extensions
        .extend(args.ignore_extensions.iter().cloned());
    reconciler_config.dry_run |= args.dry_run;

    let registry = ArtifactClassRegistry::with_defaults();
    let sidecars = SidecarRules::from_config(&reconciler_config);
    let reconciler =
        ArtifactReconciler::new(&catalog, &registry, &sidecars).with_config(&reconciler_config);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(format!(
        "Sweeping container {} ({})",
        args.container,
        registry.names().join(", ")
    ));
    let report = reconciler.reconcile(ContainerId::new(args.container));
    pb.finish_and_clear();

    print_report(&report, args.list);
    Ok(())
}

fn print_report(report: &ReconcileReport, list: bool) {
    section_header("Garbage Collection Results");

    let mut table = create_standard_table();
    table.set_header(vec![
        header_cell("Container"),
        header_cell("Class"),
        header_cell("Deleted"),
        header_cell("Missing"),
        header_cell("Freed"),
        header_cell("Errors"),
    ]);
    for class in &report.classes {
        table.add_row(vec![
            Cell::new(class.container),
            Cell::new(&class.class),
            Cell::new(class.deleted.len()),
            Cell::new(class.missing.len()),
            Cell::new(format_size(class.bytes_freed)),
            Cell::new(class.errors.len()),
        ]);
    }
    println!("{}", table);

    if list {
        for path in report.deleted() {
            println!("  - {}", path.display());
        }
        for path in report.missing() {
            println!("  ? {}", path.display());
        }
    }

    for message in report
        .errors
        .iter()
        .chain(report.classes.iter().flat_map(|c| c.errors.iter()))
    {
        error(message);
    }

    let deleted = report.deleted().count();
    let missing = report.missing().count();
    if report.dry_run {
        warning(&format!(
            "Dry run: {} path(s) would be removed, freeing {}",
            deleted,
            format_size(report.bytes_freed())
        ));
    } else {
        success(&format!(
            "Removed {} path(s), freed {}",
            deleted,
            format_size(report.bytes_freed())
        ));
    }
    if missing > 0 {
        warning(&format!(
            "{} catalog-referenced file(s) are missing on disk",
            missing
        ));
    }
}
