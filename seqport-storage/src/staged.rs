/// Stage, rename, mark: the publication primitive behind every derived artifact
///
/// An artifact is built at a private staging path next to its target, moved into place with a
/// single rename (or hard link, for files), and only then given its done-marker. A reader that
/// sees the marker therefore always sees a complete artifact. Two builders racing for the same
/// target never corrupt it: the loser discards its staging output and adopts the winner's.
use chrono::{DateTime, Utc};
use seqport_core::{SeqportError, SeqportResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How a commit ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// The marker already existed; the builder was not invoked
    AlreadyDone,
    /// This call built and published the artifact
    Built,
    /// Another builder published first; its artifact was adopted
    Adopted,
}

/// Contents of a done-marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoneMarker {
    #[serde(default)]
    pub label: Option<String>,
    pub host: String,
    pub pid: u32,
    pub created: DateTime<Utc>,
}

impl DoneMarker {
    fn current(label: Option<String>) -> Self {
        Self {
            label,
            host: current_host(),
            pid: std::process::id(),
            created: Utc::now(),
        }
    }

    pub fn read(path: &Path) -> SeqportResult<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

pub(crate) fn current_host() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[derive(Debug, Clone)]
pub struct StagedArtifact {
    target: PathBuf,
    marker: PathBuf,
    label: Option<String>,
}

impl StagedArtifact {
    pub fn new(target: impl Into<PathBuf>, marker: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            marker: marker.into(),
            label: None,
        }
    }

    /// Marker is the target path with `suffix` appended, e.g. `x.bam` + `.copyDone`
    pub fn with_marker_suffix(target: impl Into<PathBuf>, suffix: &str) -> Self {
        let target = target.into();
        let marker = append_suffix(&target, suffix);
        Self::new(target, marker)
    }

    /// Free-form text recorded in the marker
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn marker(&self) -> &Path {
        &self.marker
    }

    pub fn is_done(&self) -> bool {
        self.marker.exists()
    }

    fn staging_path(&self) -> SeqportResult<PathBuf> {
        let name = self
            .target
            .file_name()
            .ok_or_else(|| {
                SeqportError::InvalidInput(format!(
                    "Artifact target has no file name: {}",
                    self.target.display()
                ))
            })?
            .to_string_lossy();
        let staging = format!(".{}.staging-{}", name, uuid::Uuid::new_v4().simple());
        Ok(match self.target.parent() {
            Some(parent) => parent.join(staging),
            None => PathBuf::from(staging),
        })
    }

    /// Build the artifact unless it is already done.
    ///
    /// `build` receives a path that does not exist yet and must create a file or directory
    /// there. On builder failure the staging output is removed and the error returned; the
    /// target and marker are left untouched.
    pub fn commit_with<F>(&self, build: F) -> SeqportResult<Commit>
    where
        F: FnOnce(&Path) -> SeqportResult<()>,
    {
        if self.is_done() {
            debug!("{} is already done", self.target.display());
            return Ok(Commit::AlreadyDone);
        }

        let staging = self.staging_path()?;
        if let Some(parent) = staging.parent() {
            fs::create_dir_all(parent)?;
        }

        if let Err(e) = build(&staging) {
            remove_path(&staging);
            return Err(e);
        }
        if fs::symlink_metadata(&staging).is_err() {
            return Err(SeqportError::Other(format!(
                "Builder produced nothing for {}",
                self.target.display()
            )));
        }

        match publish(&staging, &self.target) {
            Ok(()) => {
                self.write_marker()?;
                debug!("Published {}", self.target.display());
                Ok(Commit::Built)
            }
            Err(e) if self.target.exists() => {
                warn!(
                    "Lost the race to publish {} ({}); adopting the existing artifact",
                    self.target.display(),
                    e
                );
                remove_path(&staging);
                if !self.is_done() {
                    self.write_marker()?;
                }
                Ok(Commit::Adopted)
            }
            Err(e) => {
                remove_path(&staging);
                Err(e.into())
            }
        }
    }

    /// Write the marker atomically (temp file, then rename)
    pub fn write_marker(&self) -> SeqportResult<()> {
        let marker = DoneMarker::current(self.label.clone());
        let temp_path = append_suffix(
            &self.marker,
            &format!(".tmp-{}", uuid::Uuid::new_v4().simple()),
        );
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(serde_json::to_string_pretty(&marker)?.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, &self.marker)?;
        Ok(())
    }

    /// Block until the marker appears. Returns false on timeout.
    pub fn wait_until_done(&self, poll_interval: Duration, timeout: Duration) -> bool {
        let started = Instant::now();
        loop {
            if self.is_done() {
                return true;
            }
            if started.elapsed() >= timeout {
                return false;
            }
            std::thread::sleep(poll_interval.min(timeout.saturating_sub(started.elapsed())));
        }
    }
}

/// Move `staging` to `target` without replacing an existing target.
///
/// Directories rely on rename refusing a non-empty destination; files are hard linked, which
/// fails if the target exists.
fn publish(staging: &Path, target: &Path) -> std::io::Result<()> {
    if staging.is_dir() {
        return fs::rename(staging, target);
    }
    match fs::hard_link(staging, target) {
        Ok(()) => fs::remove_file(staging),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(e),
        // no hard links on this filesystem
        Err(_) if !target.exists() => fs::rename(staging, target),
        Err(e) => Err(e),
    }
}

pub(crate) fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

/// Best-effort removal of a file or directory tree
pub(crate) fn remove_path(path: &Path) {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(_) => return,
    };
    if let Err(e) = result {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}
