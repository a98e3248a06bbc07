mod config;
mod document;
mod metadata;
mod search;

pub use config::{
    Config, DEFAULT_CHUNK_SIZE, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_DIMENSION,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDING_URL, DEFAULT_K_DOCUMENTS, DEFAULT_MAX_HISTORY,
    EMBEDDING_BATCH_SIZE, EmbeddingConfig, IndexingConfig, MAX_CHUNK_SIZE, MAX_K_DOCUMENTS,
    MIN_CHUNK_OVERLAP, MIN_CHUNK_SIZE, MIN_K_DOCUMENTS, MonitorConfig, SearchConfig,
    StorageConfig, default_chunk_overlap,
};
pub use document::{AddSummary, Chunk, ChunkPosition, DocumentType};
pub use metadata::{LIST_DELIMITER, Metadata, MetadataValue, sanitize, split_list};
pub use search::{ChunkInfo, OutputFormat, SearchResult, SearchResults};
