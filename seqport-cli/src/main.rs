use clap::Parser;
use colored::*;
use std::process;
use tracing_subscriber::EnvFilter;

mod cli;

use crate::cli::{Cli, Commands, Session};
use seqport_core::SeqportError;

fn main() {
    let cli = Cli::parse();

    // SEQPORT_LOG wins over -v
    let log_level = std::env::var("SEQPORT_LOG").unwrap_or_else(|_| {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
        .to_string()
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);

        let exit_code = match e.downcast_ref::<SeqportError>() {
            Some(SeqportError::Configuration(_)) => 2,
            Some(SeqportError::Io(_)) => 3,
            Some(SeqportError::Parse(_)) => 4,
            Some(SeqportError::Catalog(_)) => 5,
            _ => 1,
        };
        process::exit(exit_code);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let num_threads = if cli.threads == 0 {
        num_cpus::get()
    } else {
        cli.threads
    };

    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .map_err(|e| anyhow::anyhow!("Failed to initialize thread pool: {}", e))?;

    if cli.verbose > 0 {
        eprintln!("Using {} threads", num_threads);
    }

    let session = Session::from_cli(&cli);

    match cli.command {
        Commands::Import(args) => crate::cli::commands::import::run(args, &session),
        Commands::Gc(args) => crate::cli::commands::gc::run(args, &session),
        Commands::Cache(args) => crate::cli::commands::cache::run(args, &session),
        Commands::Container(args) => crate::cli::commands::container::run(args, &session),
        Commands::Config(args) => crate::cli::commands::config::run(args, &session),
    }
}
