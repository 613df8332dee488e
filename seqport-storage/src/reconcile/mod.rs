/// Garbage collection of on-disk artifacts against the catalog
///
/// For every container (and, recursively, its children) each registered artifact class lists its
/// root directory and deletes whatever the catalog does not expect there. Directory listings are
/// read lazily and compared with the expected set; nothing on disk is collected up front.
/// Catalog-referenced files that are missing are logged, never recreated.
///
/// The sweep is best-effort: failures are logged and recorded in the report, never returned.
mod classes;
mod expected;
mod sidecars;

pub use classes::{
    ArtifactClass, ArtifactClassRegistry, ReferenceLibrariesClass, SequenceOutputsClass,
    SequencesClass,
};
pub use expected::{ExpectedEntry, ExpectedSet};
pub use sidecars::SidecarRules;

use crate::catalog::Catalog;
use seqport_core::config::ReconcilerConfig;
use seqport_core::{Container, ContainerId};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// What one class sweep of one container did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassReport {
    pub container: ContainerId,
    pub class: String,
    pub root: PathBuf,
    pub deleted: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
    pub bytes_freed: u64,
    pub errors: Vec<String>,
}

impl ClassReport {
    fn new(container: ContainerId, class: &str, root: PathBuf) -> Self {
        Self {
            container,
            class: class.to_string(),
            root,
            deleted: Vec::new(),
            missing: Vec::new(),
            bytes_freed: 0,
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub dry_run: bool,
    pub classes: Vec<ClassReport>,
    /// Failures that prevented a container or class from being swept at all
    pub errors: Vec<String>,
}

impl ReconcileReport {
    pub fn deleted(&self) -> impl Iterator<Item = &Path> {
        self.classes
            .iter()
            .flat_map(|c| c.deleted.iter().map(PathBuf::as_path))
    }

    pub fn missing(&self) -> impl Iterator<Item = &Path> {
        self.classes
            .iter()
            .flat_map(|c| c.missing.iter().map(PathBuf::as_path))
    }

    pub fn bytes_freed(&self) -> u64 {
        self.classes.iter().map(|c| c.bytes_freed).sum()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len() + self.classes.iter().map(|c| c.errors.len()).sum::<usize>()
    }
}

pub struct ArtifactReconciler<'a> {
    catalog: &'a dyn Catalog,
    registry: &'a ArtifactClassRegistry,
    sidecars: &'a SidecarRules,
    ignored_extensions: Vec<String>,
    dry_run: bool,
}

impl<'a> ArtifactReconciler<'a> {
    pub fn new(
        catalog: &'a dyn Catalog,
        registry: &'a ArtifactClassRegistry,
        sidecars: &'a SidecarRules,
    ) -> Self {
        let defaults = ReconcilerConfig::default();
        Self {
            catalog,
            registry,
            sidecars,
            ignored_extensions: defaults.ignored_extensions,
            dry_run: defaults.dry_run,
        }
    }

    pub fn with_config(mut self, config: &ReconcilerConfig) -> Self {
        self.ignored_extensions = config.ignored_extensions.clone();
        self.dry_run = config.dry_run;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sweep `container` and all of its descendants
    pub fn reconcile(&self, container: ContainerId) -> ReconcileReport {
        let mut report = ReconcileReport {
            dry_run: self.dry_run,
            ..Default::default()
        };
        let mut pending = vec![container];

        while let Some(id) = pending.pop() {
            let container = match self.catalog.container(id) {
                Ok(container) => container,
                Err(e) => {
                    error!("Cannot reconcile container {}: {}", id, e);
                    report.errors.push(format!("container {}: {}", id, e));
                    continue;
                }
            };

            self.reconcile_container(&container, &mut report);

            match self.catalog.child_containers(id) {
                Ok(children) => pending.extend(children.iter().rev().map(|c| c.id)),
                Err(e) => {
                    error!("Cannot list children of container {}: {}", id, e);
                    report.errors.push(format!("children of {}: {}", id, e));
                }
            }
        }

        info!(
            "Reconciliation {}: {} deleted, {} missing, {} bytes {}",
            if self.dry_run { "(dry run) done" } else { "done" },
            report.deleted().count(),
            report.missing().count(),
            report.bytes_freed(),
            if self.dry_run { "reclaimable" } else { "freed" }
        );
        report
    }

    fn reconcile_container(&self, container: &Container, report: &mut ReconcileReport) {
        debug!(
            "Reconciling container {} ({})",
            container.name,
            container.pipeline_root.display()
        );
        for class in self.registry.iter() {
            let root = class.root(container);
            let mut class_report = ClassReport::new(container.id, class.name(), root.clone());

            match class.expected(self.catalog, container, self.sidecars) {
                Ok(expected) => self.sweep_dir(&root, &expected, &mut class_report),
                Err(e) => {
                    // an incomplete expected set would delete live files
                    error!(
                        "Skipping {} in container {}: {}",
                        class.name(),
                        container.name,
                        e
                    );
                    class_report.errors.push(e.to_string());
                }
            }
            report.classes.push(class_report);
        }
    }

    fn is_ignored(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| {
                let ext = ext.to_string_lossy();
                self.ignored_extensions
                    .iter()
                    .any(|ignored| ignored.trim_start_matches('.').eq_ignore_ascii_case(&ext))
            })
            .unwrap_or(false)
    }

    fn sweep_dir(&self, dir: &Path, expected: &ExpectedSet, report: &mut ClassReport) {
        for (name, entry) in expected.iter() {
            let path = dir.join(name);
            match entry {
                ExpectedEntry::File { required: true } if !path.exists() => {
                    record_missing(&path, report);
                }
                ExpectedEntry::Directory(sub) if !path.is_dir() => {
                    report_missing_below(&path, sub, report);
                }
                _ => {}
            }
        }

        let listing = match fs::read_dir(dir) {
            Ok(listing) => listing,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!("Cannot list {}: {}", dir.display(), e);
                report.errors.push(format!("{}: {}", dir.display(), e));
                return;
            }
        };

        for entry in listing {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    report.errors.push(format!("{}: {}", dir.display(), e));
                    continue;
                }
            };
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);

            match expected.get(&name) {
                Some(ExpectedEntry::Directory(sub)) if is_dir => self.sweep_dir(&path, sub, report),
                Some(_) => {}
                None if self.is_ignored(&path) => {
                    debug!("Ignoring {}", path.display());
                }
                None => self.delete_orphan(&path, is_dir, report),
            }
        }
    }

    fn delete_orphan(&self, path: &Path, is_dir: bool, report: &mut ClassReport) {
        let size = disk_usage(path);
        if self.dry_run {
            info!("Would delete orphan {} ({} bytes)", path.display(), size);
        } else {
            let result = if is_dir {
                fs::remove_dir_all(path)
            } else {
                fs::remove_file(path)
            };
            if let Err(e) = result {
                warn!("Failed to delete orphan {}: {}", path.display(), e);
                report.errors.push(format!("{}: {}", path.display(), e));
                return;
            }
            info!("Deleted orphan {} ({} bytes)", path.display(), size);
        }
        report.deleted.push(path.to_path_buf());
        report.bytes_freed += size;
    }
}

fn record_missing(path: &Path, report: &mut ClassReport) {
    error!(
        "File referenced by the catalog is missing: {}",
        path.display()
    );
    report.missing.push(path.to_path_buf());
}

fn report_missing_below(dir: &Path, expected: &ExpectedSet, report: &mut ClassReport) {
    for (name, entry) in expected.iter() {
        let path = dir.join(name);
        match entry {
            ExpectedEntry::File { required: true } if !path.exists() => {
                record_missing(&path, report)
            }
            ExpectedEntry::Directory(sub) => report_missing_below(&path, sub, report),
            _ => {}
        }
    }
}

/// Bytes used by a file or everything beneath a directory
pub fn disk_usage(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum()
}
