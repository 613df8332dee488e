use crate::cli::output::*;
use crate::cli::Session;
use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use seqport_core::config::{save_config, Config};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,

    /// Write a configuration file with every default spelled out
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the configuration file location
    Path,
}

pub fn run(args: ConfigArgs, session: &Session) -> Result<()> {
    match args.command {
        ConfigCommands::Show => {
            let config = session.config()?;
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            print!("{}", rendered);
        }
        ConfigCommands::Init { force } => {
            let path = &session.config_path;
            if path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            save_config(path, &Config::default())?;
            success(&format!("Wrote default configuration to {}", path.display()));
        }
        ConfigCommands::Path => {
            println!("{}", session.config_path.display());
        }
    }
    Ok(())
}
