//! Ingestion and query entry points.

use std::sync::Arc;

use crate::error::{EmbeddingError, IngestError, ValidationError};
use crate::models::{AddSummary, Config, SearchResult};
use crate::services::chunker::TextChunker;
use crate::services::embedding::{EmbeddingService, ProbeStatus};
use crate::services::monitor::PerformanceMonitor;
use crate::services::vector_store::VectorStore;

/// Wires chunking, embedding and storage together.
///
/// All components share one [`PerformanceMonitor`].
#[derive(Debug)]
pub struct Pipeline {
    chunker: TextChunker,
    store: Arc<VectorStore>,
    monitor: Arc<PerformanceMonitor>,
}

impl Pipeline {
    /// Build the pipeline from configuration without touching the network.
    pub fn new(config: &Config) -> Result<Self, EmbeddingError> {
        let monitor = Arc::new(PerformanceMonitor::new(config.monitor.max_history));
        let embedder = Arc::new(EmbeddingService::new(&config.embedding, monitor.clone())?);
        Ok(Self::with_embedder(config, embedder, monitor))
    }

    /// Build the pipeline and log whether the embedding endpoint answers.
    pub async fn connect(config: &Config) -> Result<Self, EmbeddingError> {
        let pipeline = Self::new(config)?;
        match pipeline.probe().await {
            ProbeStatus::Reachable => {
                tracing::info!(url = %config.embedding.url, "embedding service reachable")
            }
            status => tracing::warn!(
                url = %config.embedding.url,
                %status,
                "embedding service not reachable, fallback vectors will be used"
            ),
        }
        Ok(pipeline)
    }

    /// Build the pipeline around an existing embedding service.
    pub fn with_embedder(
        config: &Config,
        embedder: Arc<EmbeddingService>,
        monitor: Arc<PerformanceMonitor>,
    ) -> Self {
        let store = Arc::new(VectorStore::new(&config.storage, embedder, monitor.clone()));
        Self {
            chunker: TextChunker::new(monitor.clone()),
            store,
            monitor,
        }
    }

    /// Split `raw_text` and store its chunks.
    pub async fn ingest(
        &self,
        raw_text: &str,
        filename: &str,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<(usize, AddSummary), IngestError> {
        let chunks = self
            .chunker
            .split(raw_text, filename, chunk_size, chunk_overlap)?;
        let (count, summary) = self.store.add(chunks).await?;
        tracing::info!(
            filename,
            chunks = count,
            document_type = %summary.document_type,
            "document ingested"
        );
        Ok((count, summary))
    }

    /// The `k` stored chunks most similar to `text`.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<SearchResult>, ValidationError> {
        self.store.search(text, k).await
    }

    pub async fn probe(&self) -> ProbeStatus {
        self.store.embedder().probe().await
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<EmbeddingService> {
        self.store.embedder()
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SplitError, VectorStoreError};
    use crate::models::{DocumentType, StorageConfig};
    use crate::services::embedding::HashEmbeddingBackend;

    fn pipeline(dir: &std::path::Path) -> Pipeline {
        let config = Config {
            storage: StorageConfig {
                path: dir.to_path_buf(),
                collection: "pipeline_test".to_string(),
            },
            ..Default::default()
        };
        let monitor = Arc::new(PerformanceMonitor::default());
        let embedder = Arc::new(EmbeddingService::with_backend(
            Arc::new(HashEmbeddingBackend::new(16)),
            monitor.clone(),
        ));
        Pipeline::with_embedder(&config, embedder, monitor)
    }

    #[tokio::test]
    async fn test_ingest_then_query() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());
        let text = "Article 3. Chaque clause du contrat est opposable. \
                    Le locataire respecte l'alinéa 2 de l'article 5.";

        let (count, summary) = pipeline.ingest(text, "bail.txt", 500, 50).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(summary.document_type, DocumentType::Legal);

        let results = pipeline.query("clause du contrat", 3).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].filename(), "bail.txt");
        assert_eq!(results[0].chunk_info.position, "start");
    }

    #[tokio::test]
    async fn test_ingest_errors() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());

        assert!(matches!(
            pipeline.ingest("some text", "a.txt", 50, 10).await,
            Err(IngestError::Split(SplitError::Validation(_)))
        ));
        assert!(matches!(
            pipeline.ingest("   ", "a.txt", 200, 50).await,
            Err(IngestError::Split(SplitError::EmptyResult { .. }))
        ));
    }

    #[tokio::test]
    async fn test_ingest_surfaces_storage_failure() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let pipeline = pipeline(file.path());
        assert!(matches!(
            pipeline.ingest("Some plain text to store.", "a.txt", 200, 50).await,
            Err(IngestError::Store(VectorStoreError::StorageInit(_)))
        ));
    }

    #[tokio::test]
    async fn test_stages_share_monitor() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());
        pipeline
            .ingest("Plain words for the monitor.", "m.txt", 200, 50)
            .await
            .unwrap();

        let monitor = pipeline.monitor();
        for op in ["split_document", "embed_documents", "add_documents"] {
            assert!(monitor.summary(Some(op), None).is_some(), "missing {op}");
        }
        assert!(pipeline.probe().await.is_reachable());
    }
}
