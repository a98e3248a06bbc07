//! Embedding generation.
//!
//! Backends turn text into fixed-length vectors. [`EmbeddingService`] wraps a
//! remote backend with retry and falls back to [`HashEmbeddingBackend`] when
//! the remote side cannot answer, so callers always get vectors back.

mod fallback;
mod http;
mod service;

pub use fallback::HashEmbeddingBackend;
pub use http::HttpEmbeddingBackend;
pub use service::EmbeddingService;

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// A source of embedding vectors.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a batch of texts, one vector per text, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Length of every vector this backend returns.
    fn dimension(&self) -> usize;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Check that the backend can answer. Local backends always can.
    async fn probe(&self) -> ProbeStatus {
        ProbeStatus::Reachable
    }
}

/// Result of a connectivity probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Reachable,
    /// The endpoint answered with a non-200 status.
    Status(u16),
    Unreachable(String),
}

impl ProbeStatus {
    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeStatus::Reachable)
    }
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeStatus::Reachable => write!(f, "reachable"),
            ProbeStatus::Status(code) => write!(f, "responded with status {}", code),
            ProbeStatus::Unreachable(reason) => write!(f, "unreachable: {}", reason),
        }
    }
}

