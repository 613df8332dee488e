use crate::cli::output::*;
use crate::cli::Session;
use anyhow::Result;
use clap::{Args, Subcommand};
use seqport_core::{Container, ContainerId};
use seqport_storage::Catalog;
use std::path::PathBuf;

#[derive(Args)]
pub struct ContainerArgs {
    #[command(subcommand)]
    pub command: ContainerCommands,
}

#[derive(Subcommand)]
pub enum ContainerCommands {
    /// Register a container and print its id
    Add {
        name: String,

        /// Directory holding the container's .sequences, .referenceLibraries and sequenceOutputs
        #[arg(long, value_name = "DIR")]
        pipeline_root: PathBuf,

        #[arg(long)]
        parent: Option<i64>,
    },

    /// Show a container, its children and what the catalog records for it
    Show { id: i64 },
}

pub fn run(args: ContainerArgs, session: &Session) -> Result<()> {
    let catalog = session.open_catalog()?;

    match args.command {
        ContainerCommands::Add {
            name,
            pipeline_root,
            parent,
        } => {
            let container = catalog.insert_container(Container {
                id: ContainerId::new(0),
                name,
                parent: parent.map(ContainerId::new),
                pipeline_root,
            })?;
            session.save_catalog(&catalog)?;
            success(&format!(
                "Registered container {} with id {}",
                container.name, container.id
            ));
            println!("{}", container.id);
        }
        ContainerCommands::Show { id } => {
            let id = ContainerId::new(id);
            let container = catalog.container(id)?;
            let children = catalog.child_containers(id)?;

            section_header(&format!("{} ({})", container.name, container.id));
            tree_item(
                false,
                "Pipeline root",
                Some(&container.pipeline_root.display().to_string()),
            );
            tree_item(
                false,
                "Readsets",
                Some(&catalog.readsets(id)?.len().to_string()),
            );
            tree_item(
                false,
                "ReadData",
                Some(&catalog.read_data_in_container(id)?.len().to_string()),
            );
            tree_item(
                false,
                "Reference libraries",
                Some(&catalog.reference_libraries(id)?.len().to_string()),
            );
            tree_item(
                false,
                "Output files",
                Some(&catalog.output_files(id)?.len().to_string()),
            );
            let names: Vec<String> = children
                .iter()
                .map(|c| format!("{} ({})", c.name, c.id))
                .collect();
            let children = if names.is_empty() {
                "-".to_string()
            } else {
                names.join(", ")
            };
            tree_item(true, "Children", Some(&children));
        }
    }
    Ok(())
}
