/// Job-local copies of shared inputs
///
/// Several shards of one job may ask for the same file in the same work directory. The first to
/// create `<file>.copyLock` copies; the rest wait for `<file>.copyDone`.
use super::ArtifactCache;
use crate::staged::{append_suffix, current_host, Commit, StagedArtifact};
use seqport_core::{SeqportError, SeqportResult};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DONE_SUFFIX: &str = ".copyDone";
const LOCK_SUFFIX: &str = ".copyLock";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCopy {
    pub path: PathBuf,
    pub marker: PathBuf,
    /// Whether this call performed the copy
    pub copied: bool,
}

/// Removes the claim file when the copier finishes, successfully or not
struct CopyClaim {
    path: PathBuf,
}

impl CopyClaim {
    fn try_acquire(path: &Path) -> std::io::Result<Option<Self>> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                writeln!(file, "{}\n{}", std::process::id(), current_host())?;
                file.sync_all()?;
                Ok(Some(Self {
                    path: path.to_path_buf(),
                }))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Drop for CopyClaim {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Remove an abandoned claim. Another waiter removing it first is fine; any other failure
/// would leave the claim in place forever.
fn take_over_claim(lock: &Path) -> SeqportResult<()> {
    match fs::remove_file(lock) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Claim {} was already removed", lock.display());
            Ok(())
        }
        Err(e) => {
            warn!("Unable to remove stale copy claim {}: {}", lock.display(), e);
            Err(e.into())
        }
    }
}

impl ArtifactCache {
    /// Copy `source` into `dest_dir` at most once per destination.
    ///
    /// A copy whose `.copyDone` marker exists is reused as is. If another task holds the claim
    /// this blocks until its marker appears; a claim that outlives the wait timeout is treated
    /// as abandoned and taken over.
    pub fn copy_locally(&self, source: &Path, dest_dir: &Path) -> SeqportResult<LocalCopy> {
        let name = source.file_name().ok_or_else(|| {
            SeqportError::InvalidInput(format!("Not a file: {}", source.display()))
        })?;
        if !source.is_file() {
            return Err(SeqportError::MissingArtifact(source.to_path_buf()));
        }

        let dest = dest_dir.join(name);
        let staged = StagedArtifact::with_marker_suffix(&dest, DONE_SUFFIX)
            .with_label(source.display().to_string());
        let lock = append_suffix(&dest, LOCK_SUFFIX);
        let result = |copied: bool| LocalCopy {
            path: dest.clone(),
            marker: staged.marker().to_path_buf(),
            copied,
        };

        if staged.is_done() {
            debug!("{} already copied", dest.display());
            return Ok(result(false));
        }
        fs::create_dir_all(dest_dir)?;

        loop {
            match CopyClaim::try_acquire(&lock)? {
                Some(_claim) => {
                    let commit = staged.commit_with(|staging| {
                        fs::copy(source, staging)?;
                        Ok(())
                    })?;
                    if commit == Commit::Built {
                        info!("Copied {} to {}", source.display(), dest.display());
                    }
                    return Ok(result(commit == Commit::Built));
                }
                None => {
                    debug!("Waiting for another task to copy {}", dest.display());
                    if staged.wait_until_done(self.poll_interval, self.wait_timeout) {
                        return Ok(result(false));
                    }
                    warn!(
                        "Copy claim {} is older than {:?}; taking it over",
                        lock.display(),
                        self.wait_timeout
                    );
                    take_over_claim(&lock)?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_copy_then_skip() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("shared").join("ref.fasta");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, b">chr1\nACGT\n").unwrap();
        let work = dir.path().join("work");
        let cache = ArtifactCache::new(dir.path().join("cache"));

        let first = cache.copy_locally(&source, &work).unwrap();
        assert!(first.copied);
        assert_eq!(fs::read(&first.path).unwrap(), b">chr1\nACGT\n");
        assert!(work.join("ref.fasta.copyDone").exists());
        assert!(!work.join("ref.fasta.copyLock").exists());

        let second = cache.copy_locally(&source, &work).unwrap();
        assert!(!second.copied);
    }

    #[test]
    fn test_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path());
        let err = cache
            .copy_locally(&dir.path().join("absent.bam"), dir.path())
            .unwrap_err();
        assert!(matches!(err, SeqportError::MissingArtifact(_)));
    }

    #[test]
    fn test_waits_for_other_shard() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.fastq");
        fs::write(&source, b"@r\nA\n+\nI\n").unwrap();
        let work = dir.path().join("work");
        fs::create_dir_all(&work).unwrap();

        // another shard holds the claim and finishes shortly
        fs::write(work.join("in.fastq.copyLock"), b"1\nother-host\n").unwrap();
        let finisher = {
            let work = work.clone();
            let source = source.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                fs::copy(&source, work.join("in.fastq")).unwrap();
                fs::write(work.join("in.fastq.copyDone"), b"{}").unwrap();
            })
        };

        let cache = ArtifactCache::new(dir.path().join("cache"))
            .with_polling(Duration::from_millis(10), Duration::from_secs(10));
        let copy = cache.copy_locally(&source, &work).unwrap();
        finisher.join().unwrap();

        assert!(!copy.copied);
        assert!(copy.path.exists());
    }

    #[test]
    fn test_stale_claim_is_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.fastq");
        fs::write(&source, b"@r\nA\n+\nI\n").unwrap();
        let work = dir.path().join("work");
        fs::create_dir_all(&work).unwrap();
        fs::write(work.join("in.fastq.copyLock"), b"999999\ncrashed-host\n").unwrap();

        let cache = ArtifactCache::new(dir.path().join("cache"))
            .with_polling(Duration::from_millis(5), Duration::from_millis(40));
        let copy = cache.copy_locally(&source, &work).unwrap();

        assert!(copy.copied);
        assert!(work.join("in.fastq.copyDone").exists());
        assert!(!work.join("in.fastq.copyLock").exists());
    }

    #[test]
    fn test_stale_claim_that_cannot_be_removed_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.fastq");
        fs::write(&source, b"@r\nA\n+\nI\n").unwrap();
        let work = dir.path().join("work");
        let claim = work.join("in.fastq.copyLock");
        fs::create_dir_all(&claim).unwrap();
        fs::write(claim.join("held"), b"").unwrap();

        let cache = ArtifactCache::new(dir.path().join("cache"))
            .with_polling(Duration::from_millis(5), Duration::from_millis(20));
        let err = cache.copy_locally(&source, &work).unwrap_err();

        assert!(matches!(err, SeqportError::Io(_)), "{:?}", err);
        assert!(claim.exists());
        assert!(!work.join("in.fastq").exists());
    }

    #[test]
    fn test_claim_removed_by_another_waiter() {
        let dir = tempfile::tempdir().unwrap();
        assert!(take_over_claim(&dir.path().join("gone.copyLock")).is_ok());
    }
}
