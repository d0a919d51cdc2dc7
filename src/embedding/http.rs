use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

use crate::embedding::{Embedding, EmbeddingProvider, ProviderError, TARGET_EMBEDDING};
use crate::report::PhotoRef;

/// Embedding backend reached over HTTP. Posts one photo reference per request
/// and expects a JSON body carrying the embedding vector.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: Url,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl HttpEmbeddingProvider {
    pub fn new(endpoint: &str) -> anyhow::Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        info!(target: TARGET_EMBEDDING, "Embedding backend configured at {}", endpoint);
        Ok(Self { client, endpoint })
    }

    fn request_body(photo: &PhotoRef) -> Result<serde_json::Value, ProviderError> {
        match photo {
            PhotoRef::Remote(url) => {
                // Reject obviously broken references before spending a request.
                Url::parse(url)
                    .map_err(|e| ProviderError::UnsupportedRef(format!("{}: {}", url, e)))?;
                Ok(json!({ "image_url": url }))
            }
            PhotoRef::Inline(encoded) => {
                base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|e| ProviderError::UnsupportedRef(format!("inline photo: {}", e)))?;
                Ok(json!({ "image_b64": encoded }))
            }
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn extract(&self, photo: &PhotoRef) -> Result<Embedding, ProviderError> {
        let start = Instant::now();
        let body = Self::request_body(photo)?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        if parsed.embedding.is_empty() {
            return Err(ProviderError::Malformed(
                "backend returned an empty embedding".to_string(),
            ));
        }

        debug!(target: TARGET_EMBEDDING,
            "Extracted {}-dimension embedding in {:?}",
            parsed.embedding.len(),
            start.elapsed()
        );

        Ok(Embedding::new(parsed.embedding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_ref_builds_url_body() {
        let photo = PhotoRef::Remote("https://example.com/dog.jpg".to_string());
        let body = HttpEmbeddingProvider::request_body(&photo).unwrap();
        assert_eq!(body["image_url"], "https://example.com/dog.jpg");
    }

    #[test]
    fn test_invalid_remote_ref_is_rejected() {
        let photo = PhotoRef::Remote("not a url".to_string());
        let err = HttpEmbeddingProvider::request_body(&photo).unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedRef(_)));
    }

    #[test]
    fn test_inline_ref_must_be_valid_base64() {
        let good = PhotoRef::Inline(base64::engine::general_purpose::STANDARD.encode(b"jpeg"));
        assert!(HttpEmbeddingProvider::request_body(&good).is_ok());

        let bad = PhotoRef::Inline("%%%not-base64%%%".to_string());
        let err = HttpEmbeddingProvider::request_body(&bad).unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedRef(_)));
    }
}
