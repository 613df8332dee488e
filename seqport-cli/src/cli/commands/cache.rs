use crate::cli::output::*;
use crate::cli::Session;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::Cell;
use seqport_storage::{ArtifactCache, CacheKey};
use std::path::PathBuf;

#[derive(Args)]
pub struct CacheArgs {
    /// Cache root (overrides [cache].root and SEQPORT_CACHE_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CacheCommands,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// List cache entries and whether they are complete
    Status {
        /// Only show entries owned by this owner
        #[arg(long)]
        owner: Option<String>,
    },

    /// Remove one entry (marker first, then contents)
    Invalidate {
        owner: String,
        tool: String,
        fingerprint: String,
    },

    /// Copy a file into a job directory once, even with concurrent callers
    Copy {
        source: PathBuf,
        #[arg(value_name = "DEST_DIR")]
        dest_dir: PathBuf,
    },
}

pub fn run(args: CacheArgs, session: &Session) -> Result<()> {
    let mut cache_config = session.config()?.cache;
    if let Some(root) = args.root {
        cache_config.root = Some(root);
    }
    let cache = ArtifactCache::from_config(&cache_config);

    match args.command {
        CacheCommands::Status { owner } => status(&cache, owner.as_deref()),
        CacheCommands::Invalidate {
            owner,
            tool,
            fingerprint,
        } => {
            let key = CacheKey::new(owner, tool, fingerprint);
            if cache.invalidate(&key)? {
                success(&format!("Invalidated {}", key));
            } else {
                empty(&format!("No entry for {}", key));
            }
            Ok(())
        }
        CacheCommands::Copy { source, dest_dir } => {
            let copy = cache.copy_locally(&source, &dest_dir).with_context(|| {
                format!("Failed to copy {} to {}", source.display(), dest_dir.display())
            })?;
            if copy.copied {
                success(&format!("Copied to {}", copy.path.display()));
            } else {
                info(&format!("Already present at {}", copy.path.display()));
            }
            Ok(())
        }
    }
}

fn status(cache: &ArtifactCache, owner: Option<&str>) -> Result<()> {
    let entries: Vec<_> = cache
        .entries()?
        .into_iter()
        .filter(|e| owner.map_or(true, |o| e.key.owner == o))
        .collect();

    section_header(&format!("Cache at {}", cache.root().display()));
    if entries.is_empty() {
        empty("No cache entries");
        return Ok(());
    }

    let mut table = create_standard_table();
    table.set_header(vec![
        header_cell("Owner"),
        header_cell("Tool"),
        header_cell("Fingerprint"),
        header_cell("State"),
        header_cell("Size"),
        header_cell("Built"),
    ]);
    for entry in &entries {
        let (state, built) = match &entry.done {
            Some(marker) => (
                "complete".to_string(),
                format!("{} on {}", marker.created.format("%Y-%m-%d %H:%M:%S"), marker.host),
            ),
            None => ("incomplete".to_string(), "-".to_string()),
        };
        table.add_row(vec![
            Cell::new(&entry.key.owner),
            Cell::new(&entry.key.tool),
            Cell::new(&entry.key.fingerprint),
            Cell::new(state),
            Cell::new(format_size(entry.size_bytes)),
            Cell::new(built),
        ]);
    }
    println!("{}", table);

    let incomplete = entries.iter().filter(|e| !e.is_done()).count();
    if incomplete > 0 {
        warning(&format!(
            "{} incomplete entr{} (in progress or abandoned)",
            incomplete,
            if incomplete == 1 { "y" } else { "ies" }
        ));
    }
    Ok(())
}
