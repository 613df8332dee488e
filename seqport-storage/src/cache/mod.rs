/// Shared cache of expensive derived artifacts (aligner indexes, normalized inputs)
///
/// Entries live at `<root>/<owner>/<tool>/<fingerprint>/` and are valid only once the sibling
/// `<fingerprint>.done` marker exists. Nothing is evicted automatically.
mod copy;

pub use copy::LocalCopy;

use crate::staged::{Commit, DoneMarker, StagedArtifact};
use seqport_core::config::CacheConfig;
use seqport_core::{SeqportError, SeqportResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const MARKER_SUFFIX: &str = ".done";

/// Identity of a cached artifact: who owns it, what produced it, and from which inputs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub owner: String,
    pub tool: String,
    pub fingerprint: String,
}

impl CacheKey {
    pub fn new(
        owner: impl Into<String>,
        tool: impl Into<String>,
        fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            tool: tool.into(),
            fingerprint: fingerprint.into(),
        }
    }

    /// Key whose fingerprint is derived from the given inputs
    pub fn from_inputs<I, T>(owner: impl Into<String>, tool: impl Into<String>, inputs: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        Self::new(owner, tool, Self::fingerprint_of(inputs))
    }

    /// SHA-256 over the length-prefixed inputs, hex encoded
    pub fn fingerprint_of<I, T>(inputs: I) -> String
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut hasher = Sha256::new();
        for input in inputs {
            let bytes = input.as_ref();
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
        hex::encode(hasher.finalize())
    }

    fn validate(&self) -> SeqportResult<()> {
        for (what, value) in [
            ("owner", &self.owner),
            ("tool", &self.tool),
            ("fingerprint", &self.fingerprint),
        ] {
            if value.is_empty()
                || value == "."
                || value == ".."
                || value.contains('/')
                || value.contains('\\')
            {
                return Err(SeqportError::InvalidInput(format!(
                    "Cache key {} '{}' is not a valid path component",
                    what, value
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.tool, self.fingerprint)
    }
}

/// A complete cache entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    pub key: CacheKey,
    pub location: PathBuf,
    pub marker: PathBuf,
    /// Whether this call ran the builder
    pub built: bool,
}

/// Entry found while listing the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryStatus {
    pub key: CacheKey,
    pub location: PathBuf,
    pub done: Option<DoneMarker>,
    pub size_bytes: u64,
}

impl CacheEntryStatus {
    pub fn is_done(&self) -> bool {
        self.done.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl ArtifactCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let defaults = CacheConfig::default();
        Self {
            root: root.into(),
            poll_interval: Duration::from_millis(defaults.poll_interval_ms),
            wait_timeout: Duration::from_secs(defaults.wait_timeout_secs),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.resolved_root())
            .with_polling(
                Duration::from_millis(config.poll_interval_ms),
                Duration::from_secs(config.wait_timeout_secs),
            )
    }

    pub fn with_polling(mut self, poll_interval: Duration, wait_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.wait_timeout = wait_timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn location(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(&key.owner)
            .join(&key.tool)
            .join(&key.fingerprint)
    }

    pub fn marker(&self, key: &CacheKey) -> PathBuf {
        crate::staged::append_suffix(&self.location(key), MARKER_SUFFIX)
    }

    fn staged(&self, key: &CacheKey) -> StagedArtifact {
        StagedArtifact::new(self.location(key), self.marker(key)).with_label(key.to_string())
    }

    /// The entry for `key`, if it is complete
    pub fn get(&self, key: &CacheKey) -> Option<CachedArtifact> {
        let staged = self.staged(key);
        staged.is_done().then(|| CachedArtifact {
            key: key.clone(),
            location: staged.target().to_path_buf(),
            marker: staged.marker().to_path_buf(),
            built: false,
        })
    }

    /// Return the artifact for `key`, building it first if no complete entry exists.
    ///
    /// `build` receives an empty staging directory to fill. Concurrent callers with the same
    /// key may each build; exactly one result is published and every caller gets its location.
    pub fn populate<F>(&self, key: &CacheKey, build: F) -> SeqportResult<CachedArtifact>
    where
        F: FnOnce(&Path) -> SeqportResult<()>,
    {
        key.validate()?;
        let staged = self.staged(key);
        let commit = staged.commit_with(|staging| {
            fs::create_dir_all(staging)?;
            build(staging)
        })?;

        match commit {
            Commit::Built => info!("Built cache entry {}", key),
            Commit::Adopted => info!("Reusing cache entry {} built concurrently", key),
            Commit::AlreadyDone => debug!("Cache hit for {}", key),
        }

        Ok(CachedArtifact {
            key: key.clone(),
            location: staged.target().to_path_buf(),
            marker: staged.marker().to_path_buf(),
            built: commit == Commit::Built,
        })
    }

    /// Remove an entry. The marker goes first so readers never trust a half-deleted entry.
    pub fn invalidate(&self, key: &CacheKey) -> SeqportResult<bool> {
        key.validate()?;
        let marker = self.marker(key);
        let location = self.location(key);
        let existed = marker.exists() || location.exists();

        if marker.exists() {
            fs::remove_file(&marker)?;
        }
        if location.is_dir() {
            fs::remove_dir_all(&location)?;
        } else if location.exists() {
            fs::remove_file(&location)?;
        }

        if existed {
            info!("Invalidated cache entry {}", key);
        }
        Ok(existed)
    }

    /// Every entry under the root, complete or not
    pub fn entries(&self) -> SeqportResult<Vec<CacheEntryStatus>> {
        let mut entries = Vec::new();
        if !self.root.exists() {
            return Ok(entries);
        }

        for owner in subdirectories(&self.root)? {
            for tool in subdirectories(&owner)? {
                for location in subdirectories(&tool)? {
                    let key = CacheKey::new(
                        file_name(&owner),
                        file_name(&tool),
                        file_name(&location),
                    );
                    let marker = crate::staged::append_suffix(&location, MARKER_SUFFIX);
                    let done = if marker.exists() {
                        DoneMarker::read(&marker).ok()
                    } else {
                        None
                    };
                    entries.push(CacheEntryStatus {
                        key,
                        size_bytes: crate::reconcile::disk_usage(&location),
                        location,
                        done,
                    });
                }
            }
        }
        entries.sort_by(|a, b| a.key.to_string().cmp(&b.key.to_string()));
        Ok(entries)
    }
}

/// Visible subdirectories; staging directories are hidden and skipped
fn subdirectories(dir: &Path) -> SeqportResult<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() && !entry.file_name().to_string_lossy().starts_with('.') {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
