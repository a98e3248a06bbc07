pub mod chunker;
pub mod detector;
pub mod embedding;
pub mod monitor;
pub mod pipeline;
pub mod vector_store;

pub use chunker::{TextChunker, separators_for};
pub use detector::TypeDetector;
pub use embedding::{
    EmbeddingBackend, EmbeddingService, HashEmbeddingBackend, HttpEmbeddingBackend, ProbeStatus,
};
pub use monitor::{MeasureGuard, MetricsSummary, OperationRecord, PerformanceMonitor, SystemSnapshot};
pub use pipeline::Pipeline;
pub use vector_store::{
    CollectionInfo, Retriever, SqliteBackend, StoreStatus, VectorBackend, VectorStore,
};
