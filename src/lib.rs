pub mod cli;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod utils;

pub use cli::{Cli, Commands};
pub use error::{EmbeddingError, IngestError, SplitError, ValidationError, VectorStoreError};
pub use models::{Chunk, Config, DocumentType, OutputFormat, SearchResult};
pub use services::{EmbeddingService, PerformanceMonitor, Pipeline, TypeDetector, VectorStore};
