//! Search-related models for queries and results.

use serde::{Deserialize, Serialize};

use super::metadata::{Metadata, split_list};

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
    /// Documentation-friendly Markdown format
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// Chunk placement details surfaced with every search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub position: String,
    pub total_chunks: i64,
    pub chunk_id: i64,
    pub has_structure: bool,
    pub keywords: Vec<String>,
}

impl ChunkInfo {
    /// Derive chunk info from stored metadata, defaulting missing keys.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            position: metadata
                .get("chunk_position")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string(),
            total_chunks: metadata
                .get("total_chunks")
                .and_then(|v| v.as_i64())
                .unwrap_or(0),
            chunk_id: metadata.get("chunk_id").and_then(|v| v.as_i64()).unwrap_or(0),
            has_structure: metadata
                .get("contains_structure")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            keywords: metadata
                .get("keywords")
                .and_then(|v| v.as_str())
                .map(split_list)
                .unwrap_or_default(),
        }
    }
}

/// A single search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Chunk content
    pub content: String,

    /// Stored metadata of the chunk
    pub metadata: Metadata,

    /// Cosine similarity to the query, when the backend reports one
    pub relevance_score: Option<f32>,

    pub chunk_info: ChunkInfo,
}

impl SearchResult {
    pub fn new(content: String, metadata: Metadata, relevance_score: Option<f32>) -> Self {
        let chunk_info = ChunkInfo::from_metadata(&metadata);
        Self {
            content,
            metadata,
            relevance_score,
            chunk_info,
        }
    }

    /// File the chunk came from, if recorded.
    pub fn filename(&self) -> &str {
        self.metadata
            .get("filename")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
    }
}

/// Collection of search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    /// Query that was executed
    pub query: String,

    /// Matching results
    pub results: Vec<SearchResult>,

    /// Query execution time in milliseconds
    pub duration_ms: u64,
}

impl SearchResults {
    /// Create a new search results container.
    pub fn new(query: String, results: Vec<SearchResult>, duration_ms: u64) -> Self {
        Self {
            query,
            results,
            duration_ms,
        }
    }

    /// Check if there are no results.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Get the number of results.
    pub fn len(&self) -> usize {
        self.results.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetadataValue;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "md".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
    }

    #[test]
    fn test_chunk_info_from_metadata() {
        let mut metadata = Metadata::new();
        metadata.insert("chunk_position".into(), MetadataValue::Str("end".into()));
        metadata.insert("total_chunks".into(), MetadataValue::Int(4));
        metadata.insert("chunk_id".into(), MetadataValue::Int(3));
        metadata.insert("contains_structure".into(), MetadataValue::Bool(true));
        metadata.insert("keywords".into(), MetadataValue::Str("clause, article".into()));

        let info = ChunkInfo::from_metadata(&metadata);
        assert_eq!(info.position, "end");
        assert_eq!(info.total_chunks, 4);
        assert_eq!(info.chunk_id, 3);
        assert!(info.has_structure);
        assert_eq!(info.keywords, vec!["clause", "article"]);
    }

    #[test]
    fn test_chunk_info_defaults() {
        let info = ChunkInfo::from_metadata(&Metadata::new());
        assert_eq!(info.position, "unknown");
        assert_eq!(info.total_chunks, 0);
        assert!(!info.has_structure);
        assert!(info.keywords.is_empty());
    }

    #[test]
    fn test_search_results() {
        let results = SearchResults::new("test".to_string(), vec![], 50);
        assert!(results.is_empty());
        assert_eq!(results.duration_ms, 50);
    }
}
