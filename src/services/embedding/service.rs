//! Retry-then-fallback embedding service.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use super::{EmbeddingBackend, HashEmbeddingBackend, HttpEmbeddingBackend, ProbeStatus};
use crate::error::EmbeddingError;
use crate::models::{EMBEDDING_BATCH_SIZE, EmbeddingConfig};
use crate::services::monitor::PerformanceMonitor;
use crate::utils::{MAX_ATTEMPTS, RetryConfig, RetryResult, with_retry};

/// Embeds text through a remote backend, retrying transient failures and
/// substituting deterministic vectors when the backend cannot answer.
///
/// Embedding never fails from the caller's point of view. Degraded mode is
/// observable through [`fallback_batches`](Self::fallback_batches),
/// [`is_degraded`](Self::is_degraded) and a `warn` log per fallback batch.
pub struct EmbeddingService {
    remote: Arc<dyn EmbeddingBackend>,
    fallback: HashEmbeddingBackend,
    retry: RetryConfig,
    batch_size: usize,
    monitor: Arc<PerformanceMonitor>,
    fallback_batches: AtomicU64,
    degraded: AtomicBool,
}

impl EmbeddingService {
    /// Service backed by the configured HTTP endpoint.
    pub fn new(
        config: &EmbeddingConfig,
        monitor: Arc<PerformanceMonitor>,
    ) -> Result<Self, EmbeddingError> {
        let remote = HttpEmbeddingBackend::new(config)?;
        let retry = RetryConfig::new(MAX_ATTEMPTS)
            .with_initial_delay(Duration::from_millis(config.retry_initial_delay_ms));
        Ok(Self::with_backend(Arc::new(remote), monitor).with_retry_config(retry))
    }

    /// Service backed by an arbitrary remote backend.
    pub fn with_backend(remote: Arc<dyn EmbeddingBackend>, monitor: Arc<PerformanceMonitor>) -> Self {
        let fallback = HashEmbeddingBackend::new(remote.dimension());
        Self {
            remote,
            fallback,
            retry: RetryConfig::default(),
            batch_size: EMBEDDING_BATCH_SIZE,
            monitor,
            fallback_batches: AtomicU64::new(0),
            degraded: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn dimension(&self) -> usize {
        self.fallback.dimension()
    }

    /// Number of batches answered with fallback vectors so far.
    pub fn fallback_batches(&self) -> u64 {
        self.fallback_batches.load(Ordering::Relaxed)
    }

    /// Whether the most recent batch was answered with fallback vectors.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Probe the remote backend.
    pub async fn probe(&self) -> ProbeStatus {
        self.remote.probe().await
    }

    /// Embed a single text, typically a query.
    pub async fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut guard = self.monitor.start("embed_query");
        let vector = self
            .embed_batches(&[text.to_string()])
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| self.fallback.vector_for(text));
        guard.succeed();
        vector
    }

    /// Embed many texts. The output matches the input one-to-one, in order.
    pub async fn embed_many(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let mut guard = self.monitor.start("embed_documents");
        let vectors = self.embed_batches(texts).await;
        guard.succeed();
        vectors
    }

    async fn embed_batches(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_batch(batch).await);
        }
        vectors
    }

    async fn embed_batch(&self, batch: &[String]) -> Vec<Vec<f32>> {
        let remote = self.remote.as_ref();
        let outcome = match with_retry(&self.retry, || remote.embed(batch)).await {
            RetryResult::Success(vectors) => self.check_shape(vectors, batch.len()).map_err(|e| (e, 1)),
            RetryResult::Failed {
                last_error,
                attempts,
            } => Err((last_error, attempts)),
        };

        match outcome {
            Ok(vectors) => {
                self.degraded.store(false, Ordering::Relaxed);
                vectors
            }
            Err((error, attempts)) => {
                self.fallback_batches.fetch_add(1, Ordering::Relaxed);
                self.degraded.store(true, Ordering::Relaxed);
                tracing::warn!(
                    backend = remote.name(),
                    attempts,
                    batch_size = batch.len(),
                    error = %error,
                    "embedding backend failed, using fallback vectors"
                );
                batch.iter().map(|text| self.fallback.vector_for(text)).collect()
            }
        }
    }

    fn check_shape(&self, vectors: Vec<Vec<f32>>, expected: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let dimension = self.dimension();
        if vectors.len() != expected || vectors.iter().any(|v| v.len() != dimension) {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} vectors of dimension {}",
                expected, dimension
            )));
        }
        Ok(vectors)
    }
}

impl std::fmt::Debug for EmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingService")
            .field("backend", &self.remote.name())
            .field("dimension", &self.dimension())
            .field("batch_size", &self.batch_size)
            .field("fallback_batches", &self.fallback_batches())
            .finish()
    }
}
