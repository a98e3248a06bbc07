//! Deterministic offline embeddings.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::EmbeddingBackend;
use crate::error::EmbeddingError;

const BUCKETS: u64 = 10_000;
const BASE_OFFSET: f32 = 0.1;
const BUCKET_SCALE: f32 = 100_000.0;
const STEP: f32 = 0.001;

/// Hash-derived vectors used when the remote service cannot answer.
///
/// The vectors carry no semantics. They only guarantee the dimension and
/// that identical text always yields the identical vector.
#[derive(Debug, Clone)]
pub struct HashEmbeddingBackend {
    dimension: usize,
}

impl HashEmbeddingBackend {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Vector for a single text: `base + 0.001 * j` for component `j`, with
    /// `base` derived from the SHA-256 of the text.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        let bucket = u64::from_be_bytes(prefix) % BUCKETS;

        let base = BASE_OFFSET + bucket as f32 / BUCKET_SCALE;
        (0..self.dimension).map(|j| base + STEP * j as f32).collect()
    }
}

#[async_trait]
impl EmbeddingBackend for HashEmbeddingBackend {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &'static str {
        "hash"
    }
}
