//! Test environment management
//!
//! Provides isolated directory trees with automatic cleanup using RAII. Paths are handed to
//! the code under test explicitly; no environment variables are touched.

use anyhow::{Context, Result};
use seqport_core::{Container, ContainerId};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestEnvironment {
    temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::with_prefix("seqport-test")
            .context("Failed to create temporary directory")?;

        for sub in ["input", "work", "pipeline", "cache"] {
            std::fs::create_dir_all(temp_dir.path().join(sub))?;
        }

        Ok(Self { temp_dir })
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Where raw "sequencer output" fixtures are written
    pub fn input_dir(&self) -> PathBuf {
        self.root().join("input")
    }

    /// Job work (analysis) directory
    pub fn work_dir(&self) -> PathBuf {
        self.root().join("work")
    }

    pub fn pipeline_root(&self) -> PathBuf {
        self.root().join("pipeline")
    }

    pub fn cache_root(&self) -> PathBuf {
        self.root().join("cache")
    }

    pub fn input_path(&self, name: &str) -> PathBuf {
        self.input_dir().join(name)
    }

    /// A top-level container rooted at this environment's pipeline root
    pub fn container(&self) -> Container {
        Container {
            id: ContainerId::new(1),
            name: "TestContainer".to_string(),
            parent: None,
            pipeline_root: self.pipeline_root(),
        }
    }
}
