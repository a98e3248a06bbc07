//! Parameter validation performed before any I/O.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::ValidationError;
use crate::models::{
    MAX_CHUNK_SIZE, MAX_K_DOCUMENTS, MIN_CHUNK_OVERLAP, MIN_CHUNK_SIZE, MIN_K_DOCUMENTS,
};

pub const MIN_QUERY_LENGTH: usize = 3;
pub const MAX_QUERY_LENGTH: usize = 1000;

static SUSPICIOUS_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<script|javascript:|eval\(|exec\(").expect("valid suspicious pattern")
});

pub fn validate_chunk_size(chunk_size: usize) -> Result<(), ValidationError> {
    if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk_size) {
        return Err(ValidationError::ChunkSize {
            value: chunk_size,
            min: MIN_CHUNK_SIZE,
            max: MAX_CHUNK_SIZE,
        });
    }
    Ok(())
}

pub fn validate_chunk_params(chunk_size: usize, chunk_overlap: usize) -> Result<(), ValidationError> {
    validate_chunk_size(chunk_size)?;
    if chunk_overlap < MIN_CHUNK_OVERLAP {
        return Err(ValidationError::ChunkOverlapTooSmall {
            value: chunk_overlap,
            min: MIN_CHUNK_OVERLAP,
        });
    }
    if chunk_overlap >= chunk_size {
        return Err(ValidationError::ChunkOverlapTooLarge {
            overlap: chunk_overlap,
            chunk_size,
        });
    }
    Ok(())
}

pub fn validate_k(k: usize) -> Result<(), ValidationError> {
    if !(MIN_K_DOCUMENTS..=MAX_K_DOCUMENTS).contains(&k) {
        return Err(ValidationError::DocumentCount {
            value: k,
            min: MIN_K_DOCUMENTS,
            max: MAX_K_DOCUMENTS,
        });
    }
    Ok(())
}

/// Validate a query and return it trimmed.
pub fn validate_query(query: &str) -> Result<&str, ValidationError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ValidationError::Query("query is empty".into()));
    }

    let length = query.chars().count();
    if length < MIN_QUERY_LENGTH {
        return Err(ValidationError::Query(format!(
            "query too short (minimum {} characters)",
            MIN_QUERY_LENGTH
        )));
    }
    if length > MAX_QUERY_LENGTH {
        return Err(ValidationError::Query(format!(
            "query too long (maximum {} characters)",
            MAX_QUERY_LENGTH
        )));
    }
    if SUSPICIOUS_QUERY.is_match(query) {
        return Err(ValidationError::Query(
            "query contains suspicious content".into(),
        ));
    }
    Ok(query)
}
