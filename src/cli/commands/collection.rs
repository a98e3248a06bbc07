use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::Pipeline;

#[derive(Debug, Subcommand)]
pub enum CollectionCommand {
    /// Drop every stored chunk and recreate the collection
    Reset {
        /// Collection to reset (defaults to the configured one)
        #[arg(long)]
        name: Option<String>,

        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        force: bool,
    },

    /// Show the collection's size and dimension
    Info,
}

pub async fn handle_collection(
    cmd: CollectionCommand,
    config: &Config,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let formatter = get_formatter(format);
    let pipeline = Pipeline::new(config)?;

    match cmd {
        CollectionCommand::Reset { name, force } => {
            let name = name.unwrap_or_else(|| config.storage.collection.clone());

            if !force {
                println!("This will delete ALL chunks in '{}'. Continue? [y/N]", name);
                let mut input = String::new();
                std::io::stdin().read_line(&mut input)?;
                if !input.trim().eq_ignore_ascii_case("y") {
                    print!("{}", formatter.format_message("Cancelled."));
                    return Ok(());
                }
            }

            if verbose {
                eprintln!("Resetting collection {name}...");
            }
            pipeline
                .store()
                .reset(&name)
                .await
                .context("failed to reset collection")?;
            print!(
                "{}",
                formatter.format_message(&format!("Collection '{}' has been reset.", name))
            );
        }
        CollectionCommand::Info => {
            let info = pipeline
                .store()
                .collection_info()
                .await
                .context("failed to open collection")?;
            print!("{}", formatter.format_collection(&info));
        }
    }

    Ok(())
}
