pub mod commands;
pub mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use seqport_core::config::{load_config_or_default, Config};
use seqport_core::{seqport_config_path, seqport_home};
use seqport_storage::InMemoryCatalog;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "seqport",
    version,
    about = "Sequence readset ingestion and artifact lifecycle management",
    long_about = "Seqport turns raw FASTQ deliveries into catalogued readsets (merging lanes, \
                  demultiplexing pools, applying input retention), shares expensive derived \
                  artifacts through a marker-guarded cache and removes on-disk files the \
                  catalog no longer references."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Number of threads to use (0 = all available)
    #[arg(short = 'j', long, default_value = "0", global = true)]
    pub threads: usize,

    /// Configuration file (defaults to $SEQPORT_HOME/seqport.toml)
    #[arg(long, global = true, value_name = "PATH", env = "SEQPORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Catalog snapshot (defaults to $SEQPORT_HOME/catalog.json)
    #[arg(long, global = true, value_name = "PATH", env = "SEQPORT_CATALOG")]
    pub catalog: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import FASTQ files as readsets
    Import(commands::import::ImportArgs),

    /// Delete files the catalog no longer references
    Gc(commands::gc::GcArgs),

    /// Inspect and manage the shared artifact cache
    Cache(commands::cache::CacheArgs),

    /// Register and inspect catalog containers
    Container(commands::container::ContainerArgs),

    /// Show or initialize configuration
    Config(commands::config::ConfigArgs),
}

/// Resolved locations shared by every command
#[derive(Debug, Clone)]
pub struct Session {
    pub config_path: PathBuf,
    pub catalog_path: PathBuf,
}

impl Session {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            config_path: cli.config.clone().unwrap_or_else(seqport_config_path),
            catalog_path: cli
                .catalog
                .clone()
                .unwrap_or_else(|| seqport_home().join("catalog.json")),
        }
    }

    /// Loaded on demand so `config init` works next to a broken file
    pub fn config(&self) -> Result<Config> {
        load_config_or_default(&self.config_path)
            .with_context(|| format!("Failed to load config {}", self.config_path.display()))
    }

    pub fn open_catalog(&self) -> Result<InMemoryCatalog> {
        debug!("Opening catalog {}", self.catalog_path.display());
        InMemoryCatalog::open(&self.catalog_path)
            .with_context(|| format!("Failed to open catalog {}", self.catalog_path.display()))
    }

    pub fn save_catalog(&self, catalog: &InMemoryCatalog) -> Result<()> {
        debug!("Saving catalog {}", self.catalog_path.display());
        catalog
            .save(&self.catalog_path)
            .with_context(|| format!("Failed to save catalog {}", self.catalog_path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;
    use seqport_core::{Container, ContainerId};
    use seqport_storage::Catalog;
    use serial_test::serial;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "seqport",
            "gc",
            "--container",
            "3",
            "--dry-run",
            "-vv",
            "--catalog",
            "/tmp/catalog.json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let session = Session::from_cli(&cli);
        assert_eq!(session.catalog_path, PathBuf::from("/tmp/catalog.json"));
        match cli.command {
            Commands::Gc(args) => {
                assert_eq!(args.container, 3);
                assert!(args.dry_run);
            }
            _ => panic!("expected gc"),
        }
    }

    #[test]
    #[serial]
    fn test_session_defaults_live_under_seqport_home() {
        let home = tempfile::tempdir().unwrap();
        std::env::set_var("SEQPORT_HOME", home.path());
        std::env::remove_var("SEQPORT_CONFIG");
        std::env::remove_var("SEQPORT_CATALOG");

        let cli = Cli::try_parse_from(["seqport", "config", "path"]).unwrap();
        let session = Session::from_cli(&cli);
        assert_eq!(session.config_path, home.path().join("seqport.toml"));
        assert_eq!(session.catalog_path, home.path().join("catalog.json"));
        assert_eq!(session.config().unwrap().demux.unknowns_name, "unknowns");

        let catalog = session.open_catalog().unwrap();
        catalog
            .insert_container(Container {
                id: ContainerId::new(4),
                name: "Lab".to_string(),
                parent: None,
                pipeline_root: home.path().join("pipeline"),
            })
            .unwrap();
        session.save_catalog(&catalog).unwrap();
        let reopened = session.open_catalog().unwrap();
        assert_eq!(reopened.container(ContainerId::new(4)).unwrap().name, "Lab");

        std::env::remove_var("SEQPORT_HOME");
    }
}
