//! Object-safe dynamic dispatch wrappers for the embedder traits.
//!
//! Same blanket-impl pattern as `BoxLlmProvider`:
//! 1. Define an object-safe `*Dyn` trait with boxed futures
//! 2. Blanket-impl it for every implementor of the RPITIT trait
//! 3. The `Box*` wrapper holds `Box<dyn *Dyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use wayfinder_types::error::EmbeddingError;

use super::embedder::{ImageEmbedder, TextEmbedder};

/// Object-safe version of [`TextEmbedder`] with boxed futures.
pub trait TextEmbedderDyn: Send + Sync {
    fn embed_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Vec<f32>>, EmbeddingError>> + Send + 'a>>;

    fn model_name_dyn(&self) -> &str;

    fn dimension_dyn(&self) -> usize;
}

impl<T: TextEmbedder> TextEmbedderDyn for T {
    fn embed_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Vec<f32>>, EmbeddingError>> + Send + 'a>> {
        Box::pin(TextEmbedder::embed(self, texts))
    }

    fn model_name_dyn(&self) -> &str {
        TextEmbedder::model_name(self)
    }

    fn dimension_dyn(&self) -> usize {
        TextEmbedder::dimension(self)
    }
}

/// Type-erased text embedder for runtime selection.
pub struct BoxTextEmbedder {
    inner: Box<dyn TextEmbedderDyn + Send + Sync>,
}

impl BoxTextEmbedder {
    /// Wrap a concrete `TextEmbedder` in a type-erased box.
    pub fn new<T: TextEmbedder + 'static>(embedder: T) -> Self {
        Self {
            inner: Box::new(embedder),
        }
    }

    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.inner.embed_boxed(texts).await
    }

    pub fn model_name(&self) -> &str {
        self.inner.model_name_dyn()
    }

    pub fn dimension(&self) -> usize {
        self.inner.dimension_dyn()
    }
}

/// Object-safe version of [`ImageEmbedder`] with boxed futures.
pub trait ImageEmbedderDyn: Send + Sync {
    fn embed_image_boxed<'a>(
        &'a self,
        bytes: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, EmbeddingError>> + Send + 'a>>;

    fn load_boxed(&self) -> Pin<Box<dyn Future<Output = Result<(), EmbeddingError>> + Send + '_>>;

    fn model_name_dyn(&self) -> &str;

    fn dimension_dyn(&self) -> usize;
}

impl<T: ImageEmbedder> ImageEmbedderDyn for T {
    fn embed_image_boxed<'a>(
        &'a self,
        bytes: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, EmbeddingError>> + Send + 'a>> {
        Box::pin(ImageEmbedder::embed_image(self, bytes))
    }

    fn load_boxed(&self) -> Pin<Box<dyn Future<Output = Result<(), EmbeddingError>> + Send + '_>> {
        Box::pin(ImageEmbedder::load(self))
    }

    fn model_name_dyn(&self) -> &str {
        ImageEmbedder::model_name(self)
    }

    fn dimension_dyn(&self) -> usize {
        ImageEmbedder::dimension(self)
    }
}

/// Type-erased image embedder for runtime selection.
pub struct BoxImageEmbedder {
    inner: Box<dyn ImageEmbedderDyn + Send + Sync>,
}

impl BoxImageEmbedder {
    pub fn new<T: ImageEmbedder + 'static>(embedder: T) -> Self {
        Self {
            inner: Box::new(embedder),
        }
    }

    pub async fn embed_image(&self, bytes: &[u8]) -> Result<Vec<f32>, EmbeddingError> {
        self.inner.embed_image_boxed(bytes).await
    }

    pub async fn load(&self) -> Result<(), EmbeddingError> {
        self.inner.load_boxed().await
    }

    pub fn model_name(&self) -> &str {
        self.inner.model_name_dyn()
    }

    pub fn dimension(&self) -> usize {
        self.inner.dimension_dyn()
    }
}
