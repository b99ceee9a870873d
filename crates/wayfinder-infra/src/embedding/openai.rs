//! OpenAI-compatible `/embeddings` client.
//!
//! Sends `{model, input, dimensions}` with a Bearer token and returns one
//! vector per input, reordered by the response's `index` field.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use wayfinder_core::embedding::embedder::TextEmbedder;
use wayfinder_types::config::EmbeddingConfig;
use wayfinder_types::error::EmbeddingError;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Text embedder for any endpoint implementing the OpenAI embeddings API.
///
/// The API key is stored as a [`SecretString`] and only exposed when
/// building the Authorization header.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    model: String,
    dimension: usize,
    timeout_secs: u64,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig, api_key: SecretString) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::Provider(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            dimension: config.dimension,
            timeout_secs: config.request_timeout_secs,
        })
    }
}

impl TextEmbedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimension,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout(self.timeout_secs)
                } else {
                    EmbeddingError::Provider(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Provider(format!(
                "embeddings request failed with {status}: {detail}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
        into_vectors(parsed, texts.len(), self.dimension)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Order vectors by input index and check count and dimension.
fn into_vectors(
    response: EmbeddingResponse,
    expected: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if response.data.len() != expected {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected {expected} embeddings, got {}",
            response.data.len()
        )));
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in response.data {
        if item.embedding.len() != dimension {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected dimension {dimension}, got {}",
                item.embedding.len()
            )));
        }
        match slots.get_mut(item.index) {
            Some(slot) if slot.is_none() => *slot = Some(item.embedding),
            _ => {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "unexpected embedding index {}",
                    item.index
                )));
            }
        }
    }
    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> EmbeddingResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_vectors_reordered_by_index() {
        let response = parse(
            r#"{"object":"list","data":[
                {"object":"embedding","index":1,"embedding":[0.0,1.0]},
                {"object":"embedding","index":0,"embedding":[1.0,0.0]}
            ],"model":"text-embedding-3-small"}"#,
        );
        let vectors = into_vectors(response, 2, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_wrong_count_rejected() {
        let response = parse(r#"{"data":[{"index":0,"embedding":[1.0,0.0]}]}"#);
        assert!(matches!(
            into_vectors(response, 2, 2),
            Err(EmbeddingError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_wrong_dimension_rejected() {
        let response = parse(r#"{"data":[{"index":0,"embedding":[1.0,0.0,0.0]}]}"#);
        assert!(into_vectors(response, 1, 2).is_err());
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let response = parse(
            r#"{"data":[{"index":0,"embedding":[1.0]},{"index":0,"embedding":[2.0]}]}"#,
        );
        assert!(into_vectors(response, 2, 1).is_err());
    }

    #[test]
    fn test_endpoint_built_from_base_url() {
        let mut config = EmbeddingConfig::default();
        config.base_url = "http://localhost:8080/v1/".to_string();
        let embedder = OpenAiEmbedder::new(&config, SecretString::from("k".to_string())).unwrap();
        assert_eq!(embedder.endpoint, "http://localhost:8080/v1/embeddings");
        assert_eq!(embedder.dimension(), 1536);
    }
}
