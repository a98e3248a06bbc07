//! Command-line front end.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Split, embed and search plain-text documents.
#[derive(Debug, Parser)]
#[command(name = "docrag")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(
        long,
        short = 'c',
        global = true,
        env = "DOCRAG_CONFIG",
        help = "Path to a config file"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Split and store a file or every text file under a directory
    Ingest(commands::IngestArgs),

    /// Retrieve the chunks most similar to a query
    Query(commands::QueryArgs),

    /// Inspect or reset the collection
    #[command(subcommand)]
    Collection(commands::CollectionCommand),

    /// Check the embedding endpoint, storage and host resources
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
