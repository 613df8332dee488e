/// Applying the input retention policy in two phases
///
/// [`RetentionExecutor::prepare`] writes whatever copy of an input must outlive it (a gzip
/// archive, or a relocated pass-through file) and runs while outputs are being materialized.
/// [`RetentionExecutor::apply`] performs the destructive part and runs only after every output
/// and catalog row is durable.
use flate2::write::GzEncoder;
use flate2::Compression;
use seqport_bio::fastq::is_gzipped;
use seqport_core::{InputRetentionPolicy, SeqportError, SeqportResult};
use seqport_storage::{Commit, DoneMarker, StagedArtifact};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const MARKER_SUFFIX: &str = ".done";

/// Subdirectory of the work directory holding archives and relocated inputs, apart from the
/// merged and demultiplexed outputs
pub const RETAINED_DIR: &str = "retained";

/// What happened to one original input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionAction {
    pub original: PathBuf,
    pub policy: InputRetentionPolicy,
    /// Archive or relocated copy kept under the work directory
    #[serde(default)]
    pub retained: Option<PathBuf>,
    pub deleted: bool,
    #[serde(default)]
    pub left_in_place: bool,
}

/// An input whose surviving copy, if any, is already durable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedInput {
    pub original: PathBuf,
    pub retained: Option<PathBuf>,
}

impl PreparedInput {
    /// The path a pass-through ReadData should reference
    pub fn reference(&self) -> &Path {
        self.retained.as_deref().unwrap_or(&self.original)
    }
}

#[derive(Debug, Clone)]
pub struct RetentionExecutor {
    policy: InputRetentionPolicy,
    work_dir: PathBuf,
    compression_level: u32,
}

impl RetentionExecutor {
    pub fn new(policy: InputRetentionPolicy, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            policy,
            work_dir: work_dir.into(),
            compression_level: 6,
        }
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    pub fn policy(&self) -> InputRetentionPolicy {
        self.policy
    }

    /// Stage the copy of `original` the policy keeps.
    ///
    /// `passthrough` marks inputs referenced directly by a ReadData (singleton groups); under
    /// `delete` those are relocated into the work directory instead of being lost. Copies land in
    /// [`RETAINED_DIR`] and an existing file there is only reused when its marker names
    /// `original`.
    pub fn prepare(&self, original: &Path, passthrough: bool) -> SeqportResult<PreparedInput> {
        let retained = match self.policy {
            InputRetentionPolicy::Compress => Some(self.archive(original)?),
            InputRetentionPolicy::Delete if passthrough => Some(self.relocate(original)?),
            InputRetentionPolicy::Delete
            | InputRetentionPolicy::None
            | InputRetentionPolicy::LeaveInPlace => None,
        };
        Ok(PreparedInput {
            original: original.to_path_buf(),
            retained,
        })
    }

    pub fn retained_dir(&self) -> PathBuf {
        self.work_dir.join(RETAINED_DIR)
    }

    fn retained_target(&self, original: &Path, name: String) -> Option<PathBuf> {
        if is_inside(original, &self.work_dir) {
            debug!("{} already lives in the work directory", original.display());
            return None;
        }
        Some(self.retained_dir().join(name))
    }

    /// Publish the copy of `original` at `target`, reusing only a copy made from the same input
    fn commit_retained<F>(&self, original: &Path, target: &Path, build: F) -> SeqportResult<()>
    where
        F: FnOnce(&Path) -> SeqportResult<()>,
    {
        let label = original.display().to_string();
        let staged = StagedArtifact::with_marker_suffix(target, MARKER_SUFFIX).with_label(&label);
        if target.exists() && !staged.is_done() {
            return Err(SeqportError::Configuration(format!(
                "{} already exists and was not retained from {}",
                target.display(),
                original.display()
            )));
        }
        match staged.commit_with(build)? {
            Commit::Built => Ok(()),
            Commit::AlreadyDone | Commit::Adopted => {
                let marker = DoneMarker::read(staged.marker())?;
                if marker.label.as_deref() == Some(label.as_str()) {
                    debug!("Reusing {} for {}", target.display(), original.display());
                    Ok(())
                } else {
                    Err(SeqportError::Configuration(format!(
                        "{} was retained from {}, not {}",
                        target.display(),
                        marker.label.as_deref().unwrap_or("an unknown input"),
                        original.display()
                    )))
                }
            }
        }
    }

    fn file_name(original: &Path) -> SeqportResult<String> {
        original
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                SeqportError::InvalidInput(format!("Not a file: {}", original.display()))
            })
    }

    /// Gzip `original` into the retained directory; gzipped inputs are copied verbatim
    fn archive(&self, original: &Path) -> SeqportResult<PathBuf> {
        let name = Self::file_name(original)?;
        let gzipped = is_gzipped(original)?;
        let name = if gzipped { name } else { format!("{}.gz", name) };
        let Some(target) = self.retained_target(original, name) else {
            return Ok(original.to_path_buf());
        };

        let level = self.compression_level;
        self.commit_retained(original, &target, |staging| {
            if gzipped {
                fs::copy(original, staging)?;
                return Ok(());
            }
            let mut reader = BufReader::new(File::open(original)?);
            let mut encoder =
                GzEncoder::new(BufWriter::new(File::create(staging)?), Compression::new(level));
            io::copy(&mut reader, &mut encoder)?;
            let file = encoder.finish()?.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
            Ok(())
        })?;
        debug!("Archived {} as {}", original.display(), target.display());
        Ok(target)
    }

    fn relocate(&self, original: &Path) -> SeqportResult<PathBuf> {
        let name = Self::file_name(original)?;
        let Some(target) = self.retained_target(original, name) else {
            return Ok(original.to_path_buf());
        };
        self.commit_retained(original, &target, |staging| {
            fs::copy(original, staging)?;
            File::open(staging)?.sync_all()?;
            Ok(())
        })?;
        debug!("Relocated {} to {}", original.display(), target.display());
        Ok(target)
    }

    /// Carry out the destructive part of the policy. Never fails: an original that cannot be
    /// removed is logged and reported as not deleted.
    pub fn apply(&self, prepared: &PreparedInput) -> RetentionAction {
        let original = &prepared.original;
        let mut action = RetentionAction {
            original: original.clone(),
            policy: self.policy,
            retained: prepared.retained.clone(),
            deleted: false,
            left_in_place: self.policy == InputRetentionPolicy::LeaveInPlace,
        };

        let keeps_original = prepared.retained.as_deref() == Some(original.as_path());
        if !self.policy.deletes_original() || keeps_original {
            return action;
        }
        match fs::remove_file(original) {
            Ok(()) => {
                info!("Deleted input {} ({})", original.display(), self.policy);
                action.deleted = true;
            }
            Err(e) => warn!("Unable to delete input {}: {}", original.display(), e),
        }
        action
    }
}

fn is_inside(path: &Path, dir: &Path) -> bool {
    match (fs::canonicalize(path), fs::canonicalize(dir)) {
        (Ok(path), Ok(dir)) => path.starts_with(dir),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn setup() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in").join("reads.fastq");
        fs::create_dir_all(input.parent().unwrap()).unwrap();
        fs::write(&input, "@r1\nACGT\n+\nIIII\n").unwrap();
        let work = dir.path().join("work");
        (dir, input, work)
    }

    #[test]
    fn test_compress_archives_then_deletes() {
        let (_dir, input, work) = setup();
        let executor = RetentionExecutor::new(InputRetentionPolicy::Compress, &work);

        let prepared = executor.prepare(&input, false).unwrap();
        let archive = work.join(RETAINED_DIR).join("reads.fastq.gz");
        assert_eq!(prepared.retained.as_deref(), Some(archive.as_path()));
        assert!(input.exists(), "nothing is deleted while preparing");

        let action = executor.apply(&prepared);
        assert!(action.deleted);
        assert!(!input.exists());

        let mut text = String::new();
        flate2::read::GzDecoder::new(File::open(&archive).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "@r1\nACGT\n+\nIIII\n");
    }

    #[test]
    fn test_delete_relocates_passthrough_only() {
        let (_dir, input, work) = setup();
        let executor = RetentionExecutor::new(InputRetentionPolicy::Delete, &work);

        let merged_member = executor.prepare(&input, false).unwrap();
        assert_eq!(merged_member.retained, None);
        assert_eq!(merged_member.reference(), input.as_path());

        let passthrough = executor.prepare(&input, true).unwrap();
        let relocated = work.join(RETAINED_DIR).join("reads.fastq");
        assert_eq!(passthrough.reference(), relocated.as_path());
        assert!(executor.apply(&passthrough).deleted);
        assert!(relocated.exists());
    }

    #[test]
    fn test_non_destructive_policies() {
        let (_dir, input, work) = setup();
        for policy in [InputRetentionPolicy::None, InputRetentionPolicy::LeaveInPlace] {
            let executor = RetentionExecutor::new(policy, &work);
            let prepared = executor.prepare(&input, true).unwrap();
            let action = executor.apply(&prepared);
            assert!(!action.deleted);
            assert_eq!(action.left_in_place, policy == InputRetentionPolicy::LeaveInPlace);
            assert!(input.exists());
        }
        assert!(!work.exists());
    }

    #[test]
    fn test_input_already_in_work_dir_is_kept() {
        let (_dir, _input, work) = setup();
        fs::create_dir_all(&work).unwrap();
        let local = work.join("local.fastq.gz");
        let mut encoder = GzEncoder::new(File::create(&local).unwrap(), Compression::default());
        io::Write::write_all(&mut encoder, b"@r\nA\n+\nI\n").unwrap();
        encoder.finish().unwrap();

        let executor = RetentionExecutor::new(InputRetentionPolicy::Compress, &work);
        let prepared = executor.prepare(&local, true).unwrap();
        assert_eq!(prepared.reference(), local.as_path());
        assert!(!executor.apply(&prepared).deleted);
        assert!(local.exists());
    }

    #[test]
    fn test_archive_never_reuses_a_foreign_file() {
        let (dir, input, work) = setup();
        let executor = RetentionExecutor::new(InputRetentionPolicy::Compress, &work);
        let archive = work.join(RETAINED_DIR).join("reads.fastq.gz");
        fs::create_dir_all(archive.parent().unwrap()).unwrap();
        fs::write(&archive, b"someone else's output").unwrap();

        let err = executor.prepare(&input, false).unwrap_err();
        assert!(err.is_fatal_configuration());
        assert_eq!(fs::read(&archive).unwrap(), b"someone else's output");
        assert!(input.exists());

        fs::remove_file(&archive).unwrap();
        let other = dir.path().join("elsewhere").join("reads.fastq");
        fs::create_dir_all(other.parent().unwrap()).unwrap();
        fs::write(&other, "@x\nA\n+\nI\n").unwrap();
        executor.prepare(&other, false).unwrap();
        assert!(executor.prepare(&input, false).is_err());

        let again = executor.prepare(&other, false).unwrap();
        assert_eq!(again.retained.as_deref(), Some(archive.as_path()));
    }
}
