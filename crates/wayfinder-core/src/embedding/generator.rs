//! Embedding generator: turns text or images into vectors, or reports them
//! unavailable.
//!
//! The generator never returns an error. Provider failures, timeouts, and a
//! missing provider are logged at `warn!` and surface as `None` so callers
//! can degrade (skip retrieval, report `success = false`) instead of failing.

use std::time::Duration;

use tracing::{debug, warn};
use wayfinder_types::config::EmbeddingConfig;
use wayfinder_types::error::EmbeddingError;

use super::box_embedder::{BoxImageEmbedder, BoxTextEmbedder};
use crate::text::truncate_chars;

/// Input shaping and timeout settings for the generator.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub max_input_chars: usize,
    pub batch_size: usize,
    /// Per-call inference budget.
    pub timeout: Duration,
    /// Budget for the image model's first load, kept apart from `timeout`.
    pub load_timeout: Duration,
}

impl GeneratorSettings {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            max_input_chars: config.max_input_chars,
            batch_size: config.batch_size.max(1),
            timeout: Duration::from_secs(config.request_timeout_secs),
            load_timeout: Duration::from_secs(config.image_load_timeout_secs),
        }
    }
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self::from_config(&EmbeddingConfig::default())
    }
}

/// Produces text and image embeddings through optional providers.
pub struct EmbeddingGenerator {
    text: Option<BoxTextEmbedder>,
    image: Option<BoxImageEmbedder>,
    settings: GeneratorSettings,
}

impl EmbeddingGenerator {
    pub fn new(
        text: Option<BoxTextEmbedder>,
        image: Option<BoxImageEmbedder>,
        settings: GeneratorSettings,
    ) -> Self {
        Self {
            text,
            image,
            settings,
        }
    }

    /// A generator with no providers. Every call reports unavailable.
    pub fn disabled() -> Self {
        Self::new(None, None, GeneratorSettings::default())
    }

    pub fn text_available(&self) -> bool {
        self.text.is_some()
    }

    pub fn image_available(&self) -> bool {
        self.image.is_some()
    }

    pub fn text_dimension(&self) -> Option<usize> {
        self.text.as_ref().map(BoxTextEmbedder::dimension)
    }

    pub fn image_dimension(&self) -> Option<usize> {
        self.image.as_ref().map(BoxImageEmbedder::dimension)
    }

    /// Trim and truncate an input. Empty input yields `None`.
    fn prepare(&self, text: &str) -> Option<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(truncate_chars(trimmed, self.settings.max_input_chars).to_string())
    }

    async fn call_text(
        &self,
        embedder: &BoxTextEmbedder,
        inputs: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        match tokio::time::timeout(self.settings.timeout, embedder.embed(inputs)).await {
            Ok(result) => result,
            Err(_) => Err(EmbeddingError::Timeout(self.settings.timeout.as_secs())),
        }
    }

    /// Embed a single text.
    pub async fn embed_text(&self, text: &str) -> Option<Vec<f32>> {
        let Some(embedder) = &self.text else {
            warn!("Text embedding requested but no text embedder is configured");
            return None;
        };
        let input = self.prepare(text)?;

        match self.call_text(embedder, std::slice::from_ref(&input)).await {
            Ok(mut vectors) if vectors.len() == 1 => vectors.pop(),
            Ok(vectors) => {
                warn!(
                    expected = 1,
                    actual = vectors.len(),
                    "Text embedder returned the wrong number of vectors"
                );
                None
            }
            Err(e) => {
                warn!(error = %e, model = embedder.model_name(), "Text embedding failed");
                None
            }
        }
    }

    /// Embed many texts, preserving input order.
    ///
    /// Inputs are submitted in sub-batches of `batch_size`. A failed
    /// sub-batch marks each of its members unavailable; other sub-batches
    /// are unaffected. Empty inputs are never submitted.
    pub async fn embed_text_batch(&self, texts: &[String]) -> Vec<Option<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let Some(embedder) = &self.text else {
            warn!(
                count = texts.len(),
                "Batch text embedding requested but no text embedder is configured"
            );
            return results;
        };

        let prepared: Vec<(usize, String)> = texts
            .iter()
            .enumerate()
            .filter_map(|(i, text)| self.prepare(text).map(|input| (i, input)))
            .collect();

        for chunk in prepared.chunks(self.settings.batch_size.max(1)) {
            let inputs: Vec<String> = chunk.iter().map(|(_, input)| input.clone()).collect();
            match self.call_text(embedder, &inputs).await {
                Ok(vectors) if vectors.len() == chunk.len() => {
                    for ((position, _), vector) in chunk.iter().zip(vectors) {
                        results[*position] = Some(vector);
                    }
                }
                Ok(vectors) => {
                    warn!(
                        expected = chunk.len(),
                        actual = vectors.len(),
                        "Text embedder returned the wrong number of vectors for sub-batch"
                    );
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        batch_len = chunk.len(),
                        "Text embedding sub-batch failed"
                    );
                }
            }
        }

        debug!(
            requested = texts.len(),
            embedded = results.iter().filter(|r| r.is_some()).count(),
            "Batch text embedding finished"
        );
        results
    }

    /// Embed one encoded image.
    pub async fn embed_image(&self, bytes: &[u8]) -> Option<Vec<f32>> {
        let Some(embedder) = &self.image else {
            warn!("Image embedding requested but image embeddings are disabled");
            return None;
        };
        if bytes.is_empty() {
            return None;
        }

        match tokio::time::timeout(self.settings.load_timeout, embedder.load()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(error = %e, model = embedder.model_name(), "Image model failed to load");
                return None;
            }
            Err(_) => {
                warn!(
                    load_timeout_secs = self.settings.load_timeout.as_secs(),
                    model = embedder.model_name(),
                    "Image model still loading"
                );
                return None;
            }
        }

        match tokio::time::timeout(self.settings.timeout, embedder.embed_image(bytes)).await {
            Ok(Ok(vector)) => Some(vector),
            Ok(Err(e)) => {
                warn!(error = %e, model = embedder.model_name(), "Image embedding failed");
                None
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.settings.timeout.as_secs(),
                    "Image embedding timed out"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockImageEmbedder, MockTextEmbedder};

    fn settings(batch_size: usize) -> GeneratorSettings {
        GeneratorSettings {
            max_input_chars: 20,
            batch_size,
            timeout: Duration::from_millis(200),
            load_timeout: Duration::from_secs(2),
        }
    }

    fn generator(embedder: MockTextEmbedder, batch_size: usize) -> EmbeddingGenerator {
        EmbeddingGenerator::new(
            Some(BoxTextEmbedder::new(embedder)),
            None,
            settings(batch_size),
        )
    }

    #[tokio::test]
    async fn test_embed_text_trims_and_truncates() {
        let embedder = MockTextEmbedder::new(4);
        let calls = embedder.calls();
        let generator = generator(embedder, 10);

        let vector = generator
            .embed_text("   a very long query about the marble mountains   ")
            .await;
        assert!(vector.is_some());

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec!["a very long query ab".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_text_is_unavailable_without_a_call() {
        let embedder = MockTextEmbedder::new(4);
        let calls = embedder.calls();
        let generator = generator(embedder, 10);

        assert!(generator.embed_text("   ").await.is_none());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_text_is_unavailable() {
        let generator = EmbeddingGenerator::disabled();
        assert!(generator.embed_text("beach").await.is_none());
        let batch = generator
            .embed_text_batch(&["a".to_string(), "b".to_string()])
            .await;
        assert_eq!(batch, vec![None, None]);
    }

    #[tokio::test]
    async fn test_provider_error_is_unavailable() {
        let generator = generator(MockTextEmbedder::new(4).failing_on("beach"), 10);
        assert!(generator.embed_text("beach").await.is_none());
        assert!(generator.embed_text("temple").await.is_some());
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let generator = generator(
            MockTextEmbedder::new(4).with_delay(Duration::from_secs(5)),
            10,
        );
        assert!(generator.embed_text("slow").await.is_none());
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_skips_empty() {
        let embedder = MockTextEmbedder::new(3)
            .with_vector("one", vec![1.0, 0.0, 0.0])
            .with_vector("three", vec![0.0, 0.0, 1.0]);
        let calls = embedder.calls();
        let generator = generator(embedder, 10);

        let texts = vec!["one".to_string(), "  ".to_string(), "three".to_string()];
        let results = generator.embed_text_batch(&texts).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0], Some(vec![1.0, 0.0, 0.0]));
        assert_eq!(results[1], None);
        assert_eq!(results[2], Some(vec![0.0, 0.0, 1.0]));
        assert_eq!(calls.lock().unwrap()[0], vec!["one", "three"]);
    }

    #[tokio::test]
    async fn test_failed_sub_batch_only_affects_its_members() {
        let embedder = MockTextEmbedder::new(2).failing_on("bad");
        let calls = embedder.calls();
        let generator = generator(embedder, 2);

        let texts: Vec<String> = ["a", "b", "c", "bad", "e"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let results = generator.embed_text_batch(&texts).await;

        assert!(results[0].is_some());
        assert!(results[1].is_some());
        assert!(results[2].is_none());
        assert!(results[3].is_none());
        assert!(results[4].is_some());

        let calls = calls.lock().unwrap();
        let sizes: Vec<usize> = calls.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_wrong_vector_count_fails_sub_batch() {
        let generator = generator(MockTextEmbedder::new(2).dropping_last(), 10);
        let texts = vec!["a".to_string(), "b".to_string()];
        assert_eq!(generator.embed_text_batch(&texts).await, vec![None, None]);
    }

    #[tokio::test]
    async fn test_image_disabled_and_enabled() {
        let disabled = EmbeddingGenerator::disabled();
        assert!(disabled.embed_image(b"png").await.is_none());

        let enabled = EmbeddingGenerator::new(
            None,
            Some(BoxImageEmbedder::new(MockImageEmbedder::new(3))),
            settings(10),
        );
        assert!(enabled.image_available());
        assert_eq!(enabled.image_dimension(), Some(3));
        assert!(enabled.embed_image(b"png").await.is_some());
        assert!(enabled.embed_image(b"").await.is_none());
    }

    #[tokio::test]
    async fn test_slow_model_load_does_not_count_against_inference() {
        let generator = EmbeddingGenerator::new(
            None,
            Some(BoxImageEmbedder::new(
                MockImageEmbedder::new(3).with_load_delay(Duration::from_millis(500)),
            )),
            settings(10),
        );
        assert!(generator.embed_image(b"dragon-bridge.jpg").await.is_some());
    }

    #[tokio::test]
    async fn test_model_load_past_its_budget_is_unavailable() {
        let generator = EmbeddingGenerator::new(
            None,
            Some(BoxImageEmbedder::new(
                MockImageEmbedder::new(3).with_load_delay(Duration::from_secs(10)),
            )),
            settings(10),
        );
        assert!(generator.embed_image(b"dragon-bridge.jpg").await.is_none());
    }
}
