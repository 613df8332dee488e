/// Artifact classes: which directory each kind of artifact lives in, and what the catalog says
/// belongs there
use super::expected::ExpectedSet;
use super::sidecars::SidecarRules;
use crate::catalog::Catalog;
use seqport_core::{Container, DataFileId, SeqportResult};
use std::path::{Path, PathBuf};
use tracing::debug;

pub trait ArtifactClass: Send + Sync {
    fn name(&self) -> &str;

    /// Directory swept for this class
    fn root(&self, container: &Container) -> PathBuf;

    /// What the catalog asserts should exist under [`ArtifactClass::root`]
    fn expected(
        &self,
        catalog: &dyn Catalog,
        container: &Container,
        sidecars: &SidecarRules,
    ) -> SeqportResult<ExpectedSet>;
}

/// Classes swept by the reconciler, in registration order
#[derive(Default)]
pub struct ArtifactClassRegistry {
    classes: Vec<Box<dyn ArtifactClass>>,
}

impl ArtifactClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw sequence dumps, reference libraries and pipeline outputs
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(SequencesClass);
        registry.register(ReferenceLibrariesClass);
        registry.register(SequenceOutputsClass);
        registry
    }

    pub fn register(&mut self, class: impl ArtifactClass + 'static) {
        self.classes.push(Box::new(class));
    }

    pub fn get(&self, name: &str) -> Option<&dyn ArtifactClass> {
        self.classes
            .iter()
            .find(|c| c.name() == name)
            .map(|c| &**c)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn ArtifactClass> {
        self.classes.iter().map(|c| &**c)
    }

    pub fn names(&self) -> Vec<&str> {
        self.classes.iter().map(|c| c.name()).collect()
    }
}

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// Expect `path` (and its sidecars) if it lies under `root`
fn expect_under_root(
    set: &mut ExpectedSet,
    root: &Path,
    path: &Path,
    sidecars: Option<&SidecarRules>,
) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    set.insert_file(relative, true);
    if let (Some(rules), Some(name)) = (sidecars, file_name_of(relative)) {
        for sidecar in rules.sidecars_for(&name) {
            set.insert_file(&relative.with_file_name(sidecar), false);
        }
    }
    true
}

/// FASTQ files of the container's ReadData, under `<pipelineRoot>/.sequences`
pub struct SequencesClass;

impl ArtifactClass for SequencesClass {
    fn name(&self) -> &str {
        "sequences"
    }

    fn root(&self, container: &Container) -> PathBuf {
        container.pipeline_root.join(".sequences")
    }

    fn expected(
        &self,
        catalog: &dyn Catalog,
        container: &Container,
        _sidecars: &SidecarRules,
    ) -> SeqportResult<ExpectedSet> {
        let root = self.root(container);
        let mut set = ExpectedSet::new();
        for read_data in catalog.read_data_in_container(container.id)? {
            for file_id in read_data.file_ids() {
                let file = catalog.data_file(file_id)?;
                if !expect_under_root(&mut set, &root, &file.path, None) {
                    debug!("{} lives outside {}", file.path.display(), root.display());
                }
            }
        }
        Ok(set)
    }
}

/// One directory per reference library under `<pipelineRoot>/.referenceLibraries`
pub struct ReferenceLibrariesClass;

impl ReferenceLibrariesClass {
    fn expect_named(
        catalog: &dyn Catalog,
        dir: &mut ExpectedSet,
        files: &[DataFileId],
        sidecars: Option<&SidecarRules>,
    ) -> SeqportResult<()> {
        for id in files {
            let file = catalog.data_file(*id)?;
            let Some(name) = file.file_name() else { continue };
            dir.insert_file(Path::new(&name), true);
            if let Some(rules) = sidecars {
                for sidecar in rules.sidecars_for(&name) {
                    dir.insert_file(Path::new(&sidecar), false);
                }
            }
        }
        Ok(())
    }
}

impl ArtifactClass for ReferenceLibrariesClass {
    fn name(&self) -> &str {
        "referenceLibraries"
    }

    fn root(&self, container: &Container) -> PathBuf {
        container.pipeline_root.join(".referenceLibraries")
    }

    fn expected(
        &self,
        catalog: &dyn Catalog,
        container: &Container,
        sidecars: &SidecarRules,
    ) -> SeqportResult<ExpectedSet> {
        let mut set = ExpectedSet::new();
        for library in catalog.reference_libraries(container.id)? {
            let fasta = catalog.data_file(library.fasta_file)?;
            let dir = set.directory(&library.id.to_string());

            if let Some(name) = fasta.file_name() {
                let stem = fasta_stem(&name);
                dir.insert_file(Path::new(&name), true);
                dir.insert_file(Path::new(&format!("{}.fai", name)), false);
                dir.insert_file(Path::new(&format!("{}.idKey.txt", stem)), false);
                dir.insert_file(Path::new(&format!("{}.dict", stem)), false);
            }
            dir.insert_whole("alignerIndexes");
            Self::expect_named(catalog, dir.directory("tracks"), &library.tracks, Some(sidecars))?;
            Self::expect_named(catalog, dir.directory("chainFiles"), &library.chain_files, None)?;
        }
        Ok(set)
    }
}

/// FASTA name without its (possibly compressed) extension
fn fasta_stem(name: &str) -> &str {
    let name = name.strip_suffix(".gz").unwrap_or(name);
    [".fasta", ".fna", ".fa"]
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .unwrap_or(name)
}

/// Registered pipeline outputs under `<pipelineRoot>/sequenceOutputs`
pub struct SequenceOutputsClass;

impl ArtifactClass for SequenceOutputsClass {
    fn name(&self) -> &str {
        "sequenceOutputs"
    }

    fn root(&self, container: &Container) -> PathBuf {
        container.pipeline_root.join("sequenceOutputs")
    }

    fn expected(
        &self,
        catalog: &dyn Catalog,
        container: &Container,
        sidecars: &SidecarRules,
    ) -> SeqportResult<ExpectedSet> {
        let root = self.root(container);
        let mut set = ExpectedSet::new();
        for output in catalog.output_files(container.id)? {
            let file = catalog.data_file(output.data_id)?;
            if !expect_under_root(&mut set, &root, &file.path, Some(sidecars)) {
                debug!(
                    "Output {} lives outside {}",
                    file.path.display(),
                    root.display()
                );
            }
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fasta_stem() {
        assert_eq!(fasta_stem("hg19.fasta"), "hg19");
        assert_eq!(fasta_stem("mac.fa.gz"), "mac");
        assert_eq!(fasta_stem("plain"), "plain");
    }

    #[test]
    fn test_default_registry() {
        let registry = ArtifactClassRegistry::with_defaults();
        assert_eq!(
            registry.names(),
            vec!["sequences", "referenceLibraries", "sequenceOutputs"]
        );
        assert!(registry.get("referenceLibraries").is_some());
        assert!(registry.get("bogus").is_none());
    }
}
