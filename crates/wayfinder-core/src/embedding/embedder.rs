//! Embedder traits for text and image to vector conversion.
//!
//! Implementations (OpenAI-compatible embeddings, local CLIP models) live in
//! wayfinder-infra.

use wayfinder_types::error::EmbeddingError;

/// Trait for converting text into embedding vectors.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait TextEmbedder: Send + Sync {
    /// Embed one or more texts into vectors.
    ///
    /// Returns one vector per input text, in input order.
    fn embed(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>, EmbeddingError>> + Send;

    /// The model name used for embeddings (e.g., "text-embedding-3-small").
    fn model_name(&self) -> &str;

    /// The dimensionality of the output vectors.
    fn dimension(&self) -> usize;
}

/// Trait for converting encoded image bytes into an embedding vector.
pub trait ImageEmbedder: Send + Sync {
    /// Embed one encoded image (PNG, JPEG, ...).
    fn embed_image(
        &self,
        bytes: &[u8],
    ) -> impl std::future::Future<Output = Result<Vec<f32>, EmbeddingError>> + Send;

    /// Make the model ready for inference. Backends that load lazily do the
    /// load here; the default has nothing to load.
    fn load(&self) -> impl std::future::Future<Output = Result<(), EmbeddingError>> + Send {
        async { Ok(()) }
    }

    fn model_name(&self) -> &str;

    fn dimension(&self) -> usize;
}
