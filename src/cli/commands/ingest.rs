//! Ingest command implementation.

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

use crate::cli::output::{IngestStats, IngestedFile, get_formatter};
use crate::error::{IngestError, SplitError};
use crate::models::{Config, OutputFormat, default_chunk_overlap};
use crate::services::Pipeline;
use crate::utils::{document_name, is_text_file, read_file_content, validate_chunk_params};

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// File or directory to ingest
    #[arg(required = true)]
    pub path: PathBuf,

    /// Target chunk length in characters (100-4000)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Characters shared by consecutive chunks (at least 50)
    #[arg(long)]
    pub chunk_overlap: Option<usize>,

    /// File patterns to exclude (can be specified multiple times)
    #[arg(long, short = 'e')]
    pub exclude: Vec<String>,

    /// Drop the collection before ingesting
    #[arg(long)]
    pub reset: bool,

    /// Write the operation history as JSON to this file
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,
}

pub async fn handle_ingest(
    args: IngestArgs,
    config: &Config,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let chunk_size = args.chunk_size.unwrap_or(config.indexing.chunk_size);
    let chunk_overlap = match (args.chunk_overlap, args.chunk_size) {
        (Some(overlap), _) => overlap,
        (None, Some(size)) => default_chunk_overlap(size),
        (None, None) => config.indexing.effective_overlap(),
    };
    validate_chunk_params(chunk_size, chunk_overlap)?;

    let path = args.path.canonicalize().context("invalid path")?;
    let files = collect_files(&path, &args.exclude, &config.indexing.exclude_patterns)?;

    if files.is_empty() {
        print!("{}", formatter.format_message("No files found to ingest."));
        return Ok(());
    }

    if verbose {
        eprintln!("Found {} files to process", files.len());
        eprintln!("  Chunk size: {chunk_size}, overlap: {chunk_overlap}");
    }

    let pipeline = Pipeline::connect(config).await?;
    if args.reset {
        pipeline
            .store()
            .reset(&config.storage.collection)
            .await
            .context("failed to reset collection")?;
    }

    let pb = ProgressBar::new(files.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let mut stats = IngestStats {
        files_scanned: files.len() as u64,
        ..Default::default()
    };

    for file_path in &files {
        pb.inc(1);

        if !is_text_file(file_path) {
            stats.files_skipped += 1;
            continue;
        }

        let content = match read_file_content(file_path, config.indexing.max_file_size) {
            Ok(c) => c,
            Err(e) => {
                if verbose {
                    pb.println(format!("Skipping {}: {}", file_path.display(), e));
                }
                stats.files_skipped += 1;
                continue;
            }
        };

        let filename = document_name(file_path);
        match pipeline
            .ingest(&content, &filename, chunk_size, chunk_overlap)
            .await
        {
            Ok((count, summary)) => {
                stats.files_ingested += 1;
                stats.chunks_created += count as u64;
                stats.files.push(IngestedFile {
                    filename,
                    chunks: count,
                    document_type: summary.document_type.to_string(),
                    average_chunk_size: summary.average_chunk_size,
                });
            }
            Err(IngestError::Split(SplitError::EmptyResult { .. })) => {
                stats.files_skipped += 1;
            }
            Err(e @ IngestError::Store(_)) => {
                pb.finish_and_clear();
                return Err(e).context(format!("failed to store {}", file_path.display()));
            }
            Err(e) => {
                tracing::warn!(file = %file_path.display(), error = %e, "ingestion failed");
                stats.files_failed += 1;
            }
        }
    }

    pb.finish_and_clear();
    stats.fallback_batches = pipeline.embedder().fallback_batches();
    stats.duration_ms = start_time.elapsed().as_millis() as u64;
    print!("{}", formatter.format_ingest_stats(&stats));

    if let Some(ref out) = args.metrics_out {
        pipeline
            .monitor()
            .export(out)
            .with_context(|| format!("failed to write metrics to {}", out.display()))?;
    }

    Ok(())
}

fn collect_files(path: &Path, exclude: &[String], default_exclude: &[String]) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let patterns: Vec<glob::Pattern> = exclude
        .iter()
        .chain(default_exclude.iter())
        .map(|p| glob::Pattern::new(p).with_context(|| format!("invalid exclude pattern: {p}")))
        .collect::<Result<_>>()?;

    let mut files = Vec::new();
    for entry in WalkDir::new(path).follow_links(false).sort_by_file_name() {
        let entry = entry.context("failed to read directory entry")?;
        let entry_path = entry.path();

        if !entry_path.is_file() {
            continue;
        }

        let path_str = entry_path.to_string_lossy();
        if !patterns.iter().any(|p| p.matches(&path_str)) {
            files.push(entry_path.to_path_buf());
        }
    }

    Ok(files)
}
