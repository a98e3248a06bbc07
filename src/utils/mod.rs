//! Utility modules.

pub mod file;
pub mod retry;
pub mod text;
pub mod validate;

pub use file::{document_name, is_text_file, read_file_content};
pub use retry::{MAX_ATTEMPTS, RetryConfig, RetryResult, Retryable, with_retry};
pub use validate::{validate_chunk_params, validate_chunk_size, validate_k, validate_query};
