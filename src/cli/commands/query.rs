use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::time::Instant;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat, SearchResults};
use crate::services::Pipeline;
use crate::utils::{validate_k, validate_query};

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[arg(required = true, help = "Query text")]
    pub query: String,

    #[arg(short = 'k', long, help = "Number of chunks to return (1-20)")]
    pub k: Option<usize>,

    #[arg(long, help = "Write the operation history as JSON to this file")]
    pub metrics_out: Option<PathBuf>,
}

pub async fn handle_query(
    args: QueryArgs,
    config: &Config,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let query = validate_query(&args.query)?;
    let k = args.k.unwrap_or(config.search.default_k);
    validate_k(k)?;

    let formatter = get_formatter(format);
    let start_time = Instant::now();

    if verbose {
        eprintln!("Query: \"{query}\"");
        eprintln!("  k: {k}");
        eprintln!("  Collection: {}", config.storage.collection);
    }

    let pipeline = Pipeline::new(config)?;
    let results = pipeline.query(query, k).await?;

    let duration_ms = start_time.elapsed().as_millis() as u64;
    if verbose {
        if pipeline.embedder().is_degraded() {
            eprintln!("  Query embedded with fallback vectors");
        }
        eprintln!("  Total: {duration_ms}ms");
        eprintln!();
    }

    let search_results = SearchResults::new(query.to_string(), results, duration_ms);
    print!("{}", formatter.format_search_results(&search_results));

    if let Some(ref out) = args.metrics_out {
        pipeline
            .monitor()
            .export(out)
            .with_context(|| format!("failed to write metrics to {}", out.display()))?;
    }

    Ok(())
}
