//! Generation backend seam.
//!
//! The pipeline drives an opaque "complete or stream tokens for a
//! prompt" service through [`GenerationClient`]. The production
//! backend is the OpenAI-compatible HTTP client in [`openai`]; tests
//! substitute deterministic stubs.

mod openai;

pub use openai::{GenerationBackendConfig, OpenAiClient};

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

/// Errors reported by a generation backend.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("malformed upstream response: {message}")]
    MalformedResponse { message: String },
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        GenerationError::Network {
            message: err.to_string(),
        }
    }
}

pub type GenerationResult<T> = Result<T, GenerationError>;

/// Lazy sequence of text fragments from a streaming generation call.
///
/// Dropping the stream releases the underlying request, so an
/// abandoned run does not keep consuming backend resources.
pub type ChunkStream = Pin<Box<dyn Stream<Item = GenerationResult<String>> + Send>>;

/// An opaque text-generation capability.
///
/// Implementations must be safe for concurrent use from independent
/// runs; connection pooling and rate limiting are their concern.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Return the complete text for the prompt.
    async fn complete(&self, system: &str, user: &str) -> GenerationResult<String>;

    /// Return text fragments as they become available.
    async fn stream(&self, system: &str, user: &str) -> GenerationResult<ChunkStream>;
}
