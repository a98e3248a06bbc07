//! Persistent vector collections.
//!
//! [`VectorStore`] owns one collection at a time: it opens lazily, sanitizes
//! chunk metadata on the way in, embeds contents through the shared
//! [`EmbeddingService`] and answers similarity queries. Storage itself sits
//! behind the [`VectorBackend`] trait.

mod sqlite;

pub use sqlite::{DATABASE_FILE, SqliteBackend};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{ValidationError, VectorStoreError};
use crate::models::{AddSummary, Chunk, Metadata, SearchResult, StorageConfig, sanitize};
use crate::services::embedding::EmbeddingService;
use crate::services::monitor::PerformanceMonitor;
use crate::utils::{RetryConfig, validate_k, validate_query, with_retry};

/// A record ready to be persisted.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    pub embedding: Vec<f32>,
}

/// A stored record with its similarity to a query.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub content: String,
    pub metadata: Metadata,
    pub score: f32,
}

/// Collection details for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub dimension: usize,
    pub count: u64,
    pub created_at: String,
}

/// Storage engine for collections of embedded records.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Open the named collection, creating it if absent.
    ///
    /// A collection created with another dimension is a
    /// [`VectorStoreError::StorageInit`] error.
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
    ) -> Result<CollectionInfo, VectorStoreError>;

    /// Delete the named collection. Returns whether it existed.
    async fn drop_collection(&self, name: &str) -> Result<bool, VectorStoreError>;

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>, VectorStoreError>;

    /// Insert or replace records (keyed by id) in a single transaction.
    async fn upsert(
        &self,
        collection: &str,
        records: Vec<StoredRecord>,
    ) -> Result<usize, VectorStoreError>;

    /// Up to `limit` records ordered by descending similarity.
    async fn query(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, VectorStoreError>;
}

/// Lifecycle state as seen from outside the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum StoreStatus {
    Unopened,
    Ready {
        storage_path: PathBuf,
        collection: String,
    },
    /// The last open attempt failed; the next operation retries.
    Failed { error: String },
}

impl std::fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreStatus::Unopened => write!(f, "not opened"),
            StoreStatus::Ready {
                storage_path,
                collection,
            } => write!(f, "ready ({} in {})", collection, storage_path.display()),
            StoreStatus::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

struct OpenStore {
    storage_path: PathBuf,
    collection: String,
    backend: Arc<dyn VectorBackend>,
}

enum StoreState {
    Unopened,
    Ready(OpenStore),
    Failed(String),
}

impl StoreState {
    fn open_store(&self) -> Result<&OpenStore, VectorStoreError> {
        match self {
            StoreState::Ready(store) => Ok(store),
            _ => Err(VectorStoreError::NotOpen),
        }
    }
}

/// Owner of one persistent collection.
///
/// Mutations (`open`, `reset`, `add`) hold the write lock; searches share
/// the read lock, so a reset never interleaves with a running search.
pub struct VectorStore {
    storage_path: PathBuf,
    collection: String,
    embedder: Arc<EmbeddingService>,
    monitor: Arc<PerformanceMonitor>,
    state: RwLock<StoreState>,
}

impl VectorStore {
    pub fn new(
        config: &StorageConfig,
        embedder: Arc<EmbeddingService>,
        monitor: Arc<PerformanceMonitor>,
    ) -> Self {
        Self {
            storage_path: config.path.clone(),
            collection: config.collection.clone(),
            embedder,
            monitor,
            state: RwLock::new(StoreState::Unopened),
        }
    }

    /// Open `collection` under `storage_path`, creating both if absent.
    ///
    /// Reopening the collection that is already open is a no-op.
    pub async fn open(&self, storage_path: &Path, collection: &str) -> Result<(), VectorStoreError> {
        self.monitor
            .measure("open_store", async {
                let mut state = self.state.write().await;
                if let StoreState::Ready(open) = &*state {
                    if open.storage_path == storage_path && open.collection == collection {
                        return Ok(());
                    }
                }
                self.connect_into(&mut state, storage_path, collection).await
            })
            .await
    }

    /// Open the configured collection unless the store is already open.
    pub async fn ensure_open(&self) -> Result<(), VectorStoreError> {
        if matches!(*self.state.read().await, StoreState::Ready(_)) {
            return Ok(());
        }

        let mut state = self.state.write().await;
        if matches!(*state, StoreState::Ready(_)) {
            return Ok(());
        }
        let (path, collection) = (self.storage_path.clone(), self.collection.clone());
        self.connect_into(&mut state, &path, &collection).await
    }

    async fn connect_into(
        &self,
        state: &mut StoreState,
        storage_path: &Path,
        collection: &str,
    ) -> Result<(), VectorStoreError> {
        match self.connect(storage_path, collection).await {
            Ok(open) => {
                *state = StoreState::Ready(open);
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    storage_path = %storage_path.display(),
                    collection,
                    error = %e,
                    "failed to open vector store"
                );
                *state = StoreState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn connect(&self, storage_path: &Path, collection: &str) -> Result<OpenStore, VectorStoreError> {
        let backend = SqliteBackend::open(storage_path).await?;
        let info = backend
            .ensure_collection(collection, self.embedder.dimension())
            .await
            .map_err(into_storage_init)?;

        tracing::info!(
            storage_path = %storage_path.display(),
            collection = %info.name,
            records = info.count,
            "vector store ready"
        );
        Ok(OpenStore {
            storage_path: storage_path.to_path_buf(),
            collection: info.name,
            backend: Arc::new(backend),
        })
    }

    /// Drop `collection` if it exists, recreate it empty, and bind the
    /// store to it. Resetting twice leaves the same empty collection.
    pub async fn reset(&self, collection: &str) -> Result<(), VectorStoreError> {
        self.monitor
            .measure("reset_collection", async {
                let mut state = self.state.write().await;

                let (storage_path, backend) = match &*state {
                    StoreState::Ready(open) => (open.storage_path.clone(), Arc::clone(&open.backend)),
                    _ => {
                        let backend: Arc<dyn VectorBackend> =
                            Arc::new(SqliteBackend::open(&self.storage_path).await?);
                        (self.storage_path.clone(), backend)
                    }
                };

                let existed = backend.drop_collection(collection).await?;
                backend
                    .ensure_collection(collection, self.embedder.dimension())
                    .await
                    .map_err(into_storage_init)?;

                tracing::info!(collection, existed, "collection reset");
                *state = StoreState::Ready(OpenStore {
                    storage_path,
                    collection: collection.to_string(),
                    backend,
                });
                Ok(())
            })
            .await
    }

    /// Embed and persist `chunks`.
    ///
    /// An empty batch fails before any I/O. Storage-init failures surface.
    pub async fn add(&self, chunks: Vec<Chunk>) -> Result<(usize, AddSummary), VectorStoreError> {
        if chunks.is_empty() {
            return Err(VectorStoreError::EmptyBatch);
        }

        self.monitor
            .measure("add_documents", async {
                self.ensure_open().await?;

                let contents: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
                let embeddings = self.embedder.embed_many(&contents).await;

                let records: Vec<StoredRecord> = chunks
                    .iter()
                    .zip(embeddings)
                    .map(|(chunk, embedding)| StoredRecord {
                        id: chunk.record_id(),
                        content: chunk.content.clone(),
                        metadata: sanitize(&chunk.metadata()),
                        embedding,
                    })
                    .collect();

                let state = self.state.write().await;
                let open = state.open_store()?;
                let retry = RetryConfig::new(3).with_initial_delay(Duration::from_millis(50));
                let count = with_retry(&retry, || open.backend.upsert(&open.collection, records.clone()))
                    .await
                    .into_result()?;

                let summary = AddSummary::from_chunks(&chunks);
                tracing::info!(
                    collection = %open.collection,
                    count,
                    document_type = %summary.document_type,
                    "chunks added"
                );
                Ok((count, summary))
            })
            .await
    }

    /// Top-`k` chunks most similar to `query`.
    ///
    /// Invalid input is rejected; internal failures are logged, recorded and
    /// answered with an empty list.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>, ValidationError> {
        let query = validate_query(query)?;
        validate_k(k)?;

        match self.monitor.measure("search", self.search_inner(query, k)).await {
            Ok(results) => Ok(results),
            Err(e) => {
                tracing::warn!(error = %e, k, "search failed, returning no results");
                Ok(Vec::new())
            }
        }
    }

    async fn search_inner(&self, query: &str, k: usize) -> Result<Vec<SearchResult>, VectorStoreError> {
        self.ensure_open().await?;
        let vector = self.embedder.embed_one(query).await;

        let state = self.state.read().await;
        let open = state.open_store()?;
        let hits = open.backend.query(&open.collection, vector, k).await?;

        Ok(hits
            .into_iter()
            .map(|hit| SearchResult::new(hit.content, hit.metadata, Some(hit.score)))
            .collect())
    }

    /// A retriever bound to this store with a fixed `k`.
    ///
    /// Unlike [`search`](Self::search), open failures surface here.
    pub async fn retriever(self: &Arc<Self>, k: usize) -> Result<Retriever, VectorStoreError> {
        validate_k(k)?;
        self.monitor.measure("create_retriever", self.ensure_open()).await?;
        Ok(Retriever {
            store: Arc::clone(self),
            k,
        })
    }

    /// Details of the open collection.
    pub async fn collection_info(&self) -> Result<CollectionInfo, VectorStoreError> {
        self.ensure_open().await?;
        let state = self.state.read().await;
        let open = state.open_store()?;
        open.backend
            .collection_info(&open.collection)
            .await?
            .ok_or_else(|| {
                VectorStoreError::CollectionError(format!("collection not found: {}", open.collection))
            })
    }

    pub async fn status(&self) -> StoreStatus {
        match &*self.state.read().await {
            StoreState::Unopened => StoreStatus::Unopened,
            StoreState::Ready(open) => StoreStatus::Ready {
                storage_path: open.storage_path.clone(),
                collection: open.collection.clone(),
            },
            StoreState::Failed(error) => StoreStatus::Failed {
                error: error.clone(),
            },
        }
    }

    pub fn embedder(&self) -> &Arc<EmbeddingService> {
        &self.embedder
    }
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("storage_path", &self.storage_path)
            .field("collection", &self.collection)
            .finish()
    }
}

fn into_storage_init(error: VectorStoreError) -> VectorStoreError {
    match error {
        VectorStoreError::StorageInit(_) => error,
        other => VectorStoreError::StorageInit(other.to_string()),
    }
}

/// Similarity search with a fixed result count.
#[derive(Debug, Clone)]
pub struct Retriever {
    store: Arc<VectorStore>,
    k: usize,
}

impl Retriever {
    pub fn k(&self) -> usize {
        self.k
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>, ValidationError> {
        self.store.search(query, self.k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbeddingError;
    use crate::models::{ChunkPosition, DocumentType};
    use crate::services::embedding::EmbeddingBackend;

    /// Letter-frequency vectors: texts sharing letters score higher.
    struct LetterBackend;

    #[async_trait]
    impl EmbeddingBackend for LetterBackend {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts
                .iter()
                .map(|text| {
                    let mut v = vec![0.0; 26];
                    for c in text.to_lowercase().chars().filter(char::is_ascii_lowercase) {
                        v[(c as u8 - b'a') as usize] += 1.0;
                    }
                    v
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            26
        }

        fn name(&self) -> &'static str {
            "letters"
        }
    }

    fn store_at(path: &Path) -> (Arc<VectorStore>, Arc<PerformanceMonitor>) {
        let monitor = Arc::new(PerformanceMonitor::default());
        let embedder = Arc::new(EmbeddingService::with_backend(
            Arc::new(LetterBackend),
            monitor.clone(),
        ));
        let config = StorageConfig {
            path: path.to_path_buf(),
            collection: "test_docs".to_string(),
        };
        (
            Arc::new(VectorStore::new(&config, embedder, monitor.clone())),
            monitor,
        )
    }

    fn chunks(contents: &[&str]) -> Vec<Chunk> {
        let total = contents.len();
        contents
            .iter()
            .enumerate()
            .map(|(i, content)| Chunk {
                content: content.to_string(),
                filename: "notes.txt".to_string(),
                chunk_id: i,
                total_chunks: total,
                document_type: DocumentType::Default,
                chunk_size: content.chars().count(),
                chunk_position: ChunkPosition::of(i, total),
                contains_structure: false,
                keywords: vec!["notes".to_string(), "test".to_string()],
            })
            .collect()
    }

    #[tokio::test]
    async fn test_lazy_open_on_add() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(&dir.path().join("vectors"));
        assert_eq!(store.status().await, StoreStatus::Unopened);

        let (count, summary) = store.add(chunks(&["alpha", "beta"])).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(summary.total_chunks, 2);
        assert!(summary.keywords_extracted);
        assert!(matches!(store.status().await, StoreStatus::Ready { .. }));
        assert!(dir.path().join("vectors").join(DATABASE_FILE).exists());
        assert_eq!(store.collection_info().await.unwrap().count, 2);
    }

    #[tokio::test]
    async fn test_empty_add_fails_without_io() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors");
        let (store, _) = store_at(&path);

        assert!(matches!(store.add(vec![]).await, Err(VectorStoreError::EmptyBatch)));
        assert!(!path.exists());
        assert_eq!(store.status().await, StoreStatus::Unopened);
    }

    #[tokio::test]
    async fn test_storage_init_failure_surfaces() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let (store, monitor) = store_at(file.path());

        let result = store.add(chunks(&["alpha"])).await;
        assert!(matches!(result, Err(VectorStoreError::StorageInit(_))));
        assert!(matches!(store.status().await, StoreStatus::Failed { .. }));
        assert!(matches!(store.retriever(3).await, Err(VectorStoreError::StorageInit(_))));

        // search swallows the same failure
        assert!(store.search("alpha query", 3).await.unwrap().is_empty());
        let summary = monitor.summary(Some("search"), None).unwrap();
        assert_eq!(summary.success_rate, 0.0);
    }

    #[tokio::test]
    async fn test_search_ranks_and_enriches() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(dir.path());
        store
            .add(chunks(&["zzzz zzzz", "apple banana", "apple pie"]))
            .await
            .unwrap();

        let results = store.search("apple pie", 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "apple pie");
        assert!(results[0].relevance_score.unwrap() > results[1].relevance_score.unwrap());
        assert_eq!(results[0].filename(), "notes.txt");
        assert_eq!(results[0].chunk_info.chunk_id, 2);
        assert_eq!(results[0].chunk_info.position, "end");
        assert_eq!(results[0].chunk_info.total_chunks, 3);
        assert_eq!(results[0].chunk_info.keywords, vec!["notes", "test"]);
    }

    #[tokio::test]
    async fn test_search_validates_input() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(dir.path());
        assert!(matches!(
            store.search("valid query", 0).await,
            Err(ValidationError::DocumentCount { .. })
        ));
        assert!(matches!(store.search("  ", 3).await, Err(ValidationError::Query(_))));
        assert!(matches!(
            store.search("javascript:alert(1)", 3).await,
            Err(ValidationError::Query(_))
        ));
    }

    #[tokio::test]
    async fn test_search_on_empty_collection() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(dir.path());
        store.reset("test_docs").await.unwrap();
        assert!(store.search("anything at all", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(dir.path());
        store.add(chunks(&["alpha", "beta"])).await.unwrap();

        store.reset("test_docs").await.unwrap();
        store.reset("test_docs").await.unwrap();

        let info = store.collection_info().await.unwrap();
        assert_eq!(info.name, "test_docs");
        assert_eq!(info.count, 0);
    }

    #[tokio::test]
    async fn test_reset_rebinds_collection() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(dir.path());
        store.add(chunks(&["alpha"])).await.unwrap();

        store.reset("other").await.unwrap();
        store.add(chunks(&["beta", "gamma"])).await.unwrap();

        assert_eq!(store.collection_info().await.unwrap().name, "other");
        assert_eq!(store.collection_info().await.unwrap().count, 2);

        store.open(dir.path(), "test_docs").await.unwrap();
        assert_eq!(store.collection_info().await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_reingest_replaces_records() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(dir.path());
        store.add(chunks(&["alpha", "beta"])).await.unwrap();
        store.add(chunks(&["alpha", "beta"])).await.unwrap();
        assert_eq!(store.collection_info().await.unwrap().count, 2);
    }

    #[tokio::test]
    async fn test_retriever_uses_fixed_k() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(dir.path());
        store
            .add(chunks(&["one fish", "two fish", "red fish", "blue fish"]))
            .await
            .unwrap();

        assert!(matches!(
            store.retriever(21).await,
            Err(VectorStoreError::Validation(_))
        ));
        let retriever = store.retriever(2).await.unwrap();
        assert_eq!(retriever.k(), 2);
        assert_eq!(retriever.retrieve("fish tales").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SqliteBackend::open(dir.path()).await.unwrap();
        backend.ensure_collection("test_docs", 3).await.unwrap();
        drop(backend);

        let (store, _) = store_at(dir.path());
        assert!(matches!(
            store.ensure_open().await,
            Err(VectorStoreError::StorageInit(_))
        ));
    }

    #[tokio::test]
    async fn test_operations_are_measured() {
        let dir = tempfile::tempdir().unwrap();
        let (store, monitor) = store_at(dir.path());
        store.add(chunks(&["alpha"])).await.unwrap();
        store.search("alpha beta", 1).await.unwrap();

        assert_eq!(monitor.summary(Some("add_documents"), None).unwrap().total_operations, 1);
        assert_eq!(monitor.summary(Some("search"), None).unwrap().success_rate, 100.0);
    }
}
