use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::models::{OutputFormat, SearchResults};
use crate::services::{CollectionInfo, MetricsSummary, StoreStatus, SystemSnapshot};

const PREVIEW_CHARS: usize = 200;

pub trait Formatter {
    fn format_search_results(&self, results: &SearchResults) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_ingest_stats(&self, stats: &IngestStats) -> String;
    fn format_collection(&self, info: &CollectionInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub embedding_url: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub embedding_reachable: bool,
    /// Probe outcome as shown to the user.
    pub embedding_probe: String,
    pub store: StoreStatus,
    pub collection: Option<CollectionInfo>,
    pub metrics: Option<MetricsSummary>,
    pub system: SystemSnapshot,
}

/// Per-file line of an ingest report.
#[derive(Debug, Clone, Serialize)]
pub struct IngestedFile {
    pub filename: String,
    pub chunks: usize,
    pub document_type: String,
    pub average_chunk_size: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub files_scanned: u64,
    pub files_ingested: u64,
    pub files_skipped: u64,
    pub files_failed: u64,
    pub chunks_created: u64,
    /// Embedding batches that used fallback vectors.
    pub fallback_batches: u64,
    pub duration_ms: u64,
    pub files: Vec<IngestedFile>,
}

fn preview(content: &str) -> String {
    let head: String = content.chars().take(PREVIEW_CHARS).collect();
    if content.chars().count() > PREVIEW_CHARS {
        format!("{}...", head)
    } else {
        head
    }
}

fn score_label(score: Option<f32>) -> String {
    score.map_or_else(|| "n/a".to_string(), |s| format!("{:.3}", s))
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_search_results(&self, results: &SearchResults) -> String {
        if results.is_empty() {
            return format!("No results found for: {}\n", results.query);
        }

        let mut output = String::new();
        writeln!(output, "Results for: \"{}\"", results.query).unwrap();
        writeln!(
            output,
            "Found {} chunks in {}ms\n",
            results.len(),
            results.duration_ms
        )
        .unwrap();

        for (i, result) in results.results.iter().enumerate() {
            let info = &result.chunk_info;
            writeln!(
                output,
                "{}. [Score: {}] {}",
                i + 1,
                score_label(result.relevance_score),
                result.filename()
            )
            .unwrap();
            writeln!(
                output,
                "   Chunk {}/{} ({})",
                info.chunk_id + 1,
                info.total_chunks,
                info.position
            )
            .unwrap();
            if !info.keywords.is_empty() {
                writeln!(output, "   Keywords: {}", info.keywords.join(", ")).unwrap();
            }
            writeln!(output, "   ---").unwrap();
            for line in preview(&result.content).lines() {
                writeln!(output, "   {}", line).unwrap();
            }
            writeln!(output).unwrap();
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        let embedding_state = if status.embedding_reachable {
            "[REACHABLE]"
        } else {
            "[FALLBACK]"
        };
        writeln!(output, "Embedding:     {}", embedding_state).unwrap();
        writeln!(output, "  URL:         {}", status.embedding_url).unwrap();
        writeln!(output, "  Model:       {}", status.embedding_model).unwrap();
        writeln!(output, "  Dimension:   {}", status.embedding_dimension).unwrap();
        if !status.embedding_reachable {
            writeln!(output, "  Probe:       {}", status.embedding_probe).unwrap();
        }
        writeln!(output).unwrap();

        writeln!(output, "Vector Store:  {}", status.store).unwrap();
        if let Some(ref info) = status.collection {
            writeln!(output, "  Collection:  {}", info.name).unwrap();
            writeln!(output, "  Chunks:      {}", info.count).unwrap();
            writeln!(output, "  Dimension:   {}", info.dimension).unwrap();
        }
        writeln!(output).unwrap();

        if let Some(ref m) = status.metrics {
            writeln!(output, "Operations:    {}", m.total_operations).unwrap();
            writeln!(output, "  Success:     {:.1}%", m.success_rate).unwrap();
            writeln!(output, "  Avg Latency: {:.1}ms", m.avg_duration_ms).unwrap();
            writeln!(output).unwrap();
        }

        let sys = &status.system;
        writeln!(output, "System").unwrap();
        writeln!(output, "  CPU:         {:.1}%", sys.cpu_percent).unwrap();
        writeln!(
            output,
            "  Memory:      {:.1}% ({:.2} GB free)",
            sys.memory_percent, sys.memory_available_gb
        )
        .unwrap();
        writeln!(output, "  Disk:        {:.1}%", sys.disk_usage_percent).unwrap();

        output
    }

    fn format_ingest_stats(&self, stats: &IngestStats) -> String {
        let mut output = String::new();
        writeln!(output, "Ingestion Complete").unwrap();
        writeln!(output, "------------------").unwrap();
        for file in &stats.files {
            writeln!(
                output,
                "  {} -> {} chunks ({}, avg {:.0} chars)",
                file.filename, file.chunks, file.document_type, file.average_chunk_size
            )
            .unwrap();
        }
        if !stats.files.is_empty() {
            writeln!(output).unwrap();
        }
        writeln!(output, "Files scanned: {}", stats.files_scanned).unwrap();
        writeln!(output, "Files ingested: {}", stats.files_ingested).unwrap();
        writeln!(output, "Files skipped: {}", stats.files_skipped).unwrap();
        if stats.files_failed > 0 {
            writeln!(output, "Files failed: {}", stats.files_failed).unwrap();
        }
        writeln!(output, "Chunks created: {}", stats.chunks_created).unwrap();
        if stats.fallback_batches > 0 {
            writeln!(output, "Fallback batches: {}", stats.fallback_batches).unwrap();
        }
        writeln!(output, "Duration: {}ms", stats.duration_ms).unwrap();
        output
    }

    fn format_collection(&self, info: &CollectionInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Collection: {}", info.name).unwrap();
        writeln!(output, "  Chunks:    {}", info.count).unwrap();
        writeln!(output, "  Dimension: {}", info.dimension).unwrap();
        writeln!(output, "  Created:   {}", info.created_at).unwrap();
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn to_json<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        match rendered {
            Ok(json) => format!("{}\n", json),
            Err(e) => format!("{{\"error\":\"serialization failed: {}\"}}\n", e),
        }
    }
}

impl Formatter for JsonFormatter {
    fn format_search_results(&self, results: &SearchResults) -> String {
        self.to_json(results)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.to_json(status)
    }

    fn format_ingest_stats(&self, stats: &IngestStats) -> String {
        self.to_json(stats)
    }

    fn format_collection(&self, info: &CollectionInfo) -> String {
        self.to_json(info)
    }

    fn format_message(&self, message: &str) -> String {
        self.to_json(&serde_json::json!({ "message": message }))
    }

    fn format_error(&self, error: &str) -> String {
        self.to_json(&serde_json::json!({ "error": error }))
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_search_results(&self, results: &SearchResults) -> String {
        let mut output = String::new();
        writeln!(output, "# Results: {}\n", results.query).unwrap();

        if results.is_empty() {
            writeln!(output, "_No results found._").unwrap();
            return output;
        }

        writeln!(
            output,
            "Found **{}** chunks in {}ms\n",
            results.len(),
            results.duration_ms
        )
        .unwrap();

        for (i, result) in results.results.iter().enumerate() {
            let info = &result.chunk_info;
            writeln!(
                output,
                "## {}. {} (score: {})\n",
                i + 1,
                result.filename(),
                score_label(result.relevance_score)
            )
            .unwrap();
            writeln!(
                output,
                "- **Chunk:** {}/{} ({})",
                info.chunk_id + 1,
                info.total_chunks,
                info.position
            )
            .unwrap();
            if !info.keywords.is_empty() {
                writeln!(output, "- **Keywords:** {}", info.keywords.join(", ")).unwrap();
            }
            writeln!(output).unwrap();
            writeln!(output, "```").unwrap();
            writeln!(output, "{}", preview(&result.content)).unwrap();
            writeln!(output, "```\n").unwrap();
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "# Status\n").unwrap();
        writeln!(output, "| Component | Status | Details |").unwrap();
        writeln!(output, "|-----------|--------|---------|").unwrap();

        let embedding_state = if status.embedding_reachable {
            "✅ Reachable"
        } else {
            "⚠️ Fallback"
        };
        writeln!(
            output,
            "| Embedding | {} | {} ({}d) |",
            embedding_state, status.embedding_model, status.embedding_dimension
        )
        .unwrap();

        let (store_state, details) = match status.collection {
            Some(ref info) => ("✅ Ready", format!("{}: {} chunks", info.name, info.count)),
            None => ("❌ Unavailable", status.store.to_string()),
        };
        writeln!(output, "| Vector Store | {} | {} |", store_state, details).unwrap();

        let sys = &status.system;
        writeln!(
            output,
            "| System | CPU {:.1}% | Memory {:.1}%, Disk {:.1}% |",
            sys.cpu_percent, sys.memory_percent, sys.disk_usage_percent
        )
        .unwrap();

        output
    }

    fn format_ingest_stats(&self, stats: &IngestStats) -> String {
        let mut output = String::new();
        writeln!(output, "# Ingestion Complete\n").unwrap();
        if !stats.files.is_empty() {
            writeln!(output, "| File | Chunks | Type | Avg Size |").unwrap();
            writeln!(output, "|------|--------|------|----------|").unwrap();
            for file in &stats.files {
                writeln!(
                    output,
                    "| {} | {} | {} | {:.0} |",
                    file.filename, file.chunks, file.document_type, file.average_chunk_size
                )
                .unwrap();
            }
            writeln!(output).unwrap();
        }
        writeln!(output, "- **Files scanned:** {}", stats.files_scanned).unwrap();
        writeln!(output, "- **Files ingested:** {}", stats.files_ingested).unwrap();
        writeln!(output, "- **Files skipped:** {}", stats.files_skipped).unwrap();
        writeln!(output, "- **Files failed:** {}", stats.files_failed).unwrap();
        writeln!(output, "- **Chunks created:** {}", stats.chunks_created).unwrap();
        writeln!(output, "- **Duration:** {}ms", stats.duration_ms).unwrap();
        output
    }

    fn format_collection(&self, info: &CollectionInfo) -> String {
        let mut output = String::new();
        writeln!(output, "# Collection `{}`\n", info.name).unwrap();
        writeln!(output, "- **Chunks:** {}", info.count).unwrap();
        writeln!(output, "- **Dimension:** {}", info.dimension).unwrap();
        writeln!(output, "- **Created:** {}", info.created_at).unwrap();
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}
