// Visual embedding extraction.
pub const TARGET_EMBEDDING: &str = "embedding";

pub mod http;

pub use http::HttpEmbeddingProvider;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::report::PhotoRef;

/// A fixed-length visual embedding produced by the embedding backend for one
/// photo. Embeddings are produced on demand and never persisted; two
/// embeddings are only comparable when produced by the same backend version.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("embedding backend request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("embedding backend returned a malformed payload: {0}")]
    Malformed(String),
    #[error("unsupported photo reference: {0}")]
    UnsupportedRef(String),
}

/// Source of visual embeddings. Implementations must accept both remote-URL
/// and inline-encoded photo references, and must be deterministic for a fixed
/// photo.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn extract(&self, photo: &PhotoRef) -> Result<Embedding, ProviderError>;
}

static SHARED_PROVIDER: OnceCell<Arc<HttpEmbeddingProvider>> = OnceCell::const_new();

/// Returns the process-wide embedding provider, initializing it from
/// `EMBEDDING_URL` on first use. Concurrent first callers coalesce into a
/// single initialization; everyone else awaits it. Pipeline functions still
/// take the provider as an explicit argument, so this is an entry-point
/// convenience rather than a hidden dependency.
pub async fn shared_provider() -> Result<Arc<HttpEmbeddingProvider>> {
    SHARED_PROVIDER
        .get_or_try_init(|| async {
            let endpoint = std::env::var("EMBEDDING_URL")
                .unwrap_or_else(|_| "http://localhost:8290/embed".to_string());
            let provider = HttpEmbeddingProvider::new(&endpoint)?;
            Ok(Arc::new(provider))
        })
        .await
        .map(Arc::clone)
}
