//! Local CLIP image embeddings via fastembed.
//!
//! The ONNX model is downloaded and loaded on first use, not at startup.
//! Only one load is ever in flight.
//! Inference runs on the blocking thread pool behind a mutex because the
//! model session is not safe to run concurrently.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use fastembed::{ImageEmbedding, ImageEmbeddingModel, ImageInitOptions};
use tokio::task::JoinHandle;
use tracing::info;

use wayfinder_core::embedding::embedder::ImageEmbedder;
use wayfinder_types::error::EmbeddingError;

const MODEL_NAME: &str = "clip-vit-b-32";

/// Output dimension of CLIP ViT-B/32.
pub const CLIP_DIMENSION: usize = 512;

/// A model loaded once on the blocking pool. The load runs as its own task:
/// a caller dropped mid-load leaves it running and the next caller joins it.
struct LazyModel<T> {
    ready: OnceLock<Arc<T>>,
    pending: tokio::sync::Mutex<Option<JoinHandle<Result<T, EmbeddingError>>>>,
}

impl<T: Send + Sync + 'static> LazyModel<T> {
    fn new() -> Self {
        Self {
            ready: OnceLock::new(),
            pending: tokio::sync::Mutex::new(None),
        }
    }

    /// `load` runs only when no load is finished or in flight. A failed load
    /// is forgotten so the next call starts over.
    async fn get_or_load<F>(&self, load: F) -> Result<Arc<T>, EmbeddingError>
    where
        F: FnOnce() -> Result<T, EmbeddingError> + Send + 'static,
    {
        if let Some(model) = self.ready.get() {
            return Ok(Arc::clone(model));
        }
        let mut pending = self.pending.lock().await;
        if let Some(model) = self.ready.get() {
            return Ok(Arc::clone(model));
        }

        let handle = pending.get_or_insert_with(|| tokio::task::spawn_blocking(load));
        let joined = handle.await;
        *pending = None;

        let loaded = joined
            .map_err(|e| EmbeddingError::Provider(format!("model loader panicked: {e}")))??;
        Ok(Arc::clone(self.ready.get_or_init(|| Arc::new(loaded))))
    }
}

pub struct ClipImageEmbedder {
    cache_dir: PathBuf,
    model: LazyModel<Mutex<ImageEmbedding>>,
}

impl ClipImageEmbedder {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            model: LazyModel::new(),
        }
    }

    async fn model(&self) -> Result<Arc<Mutex<ImageEmbedding>>, EmbeddingError> {
        let cache_dir = self.cache_dir.clone();
        self.model
            .get_or_load(move || {
                info!(cache_dir = %cache_dir.display(), "Loading CLIP image embedding model");
                std::fs::create_dir_all(&cache_dir)
                    .map_err(|e| EmbeddingError::Provider(format!("model cache dir: {e}")))?;
                let options = ImageInitOptions::new(ImageEmbeddingModel::ClipVitB32)
                    .with_cache_dir(cache_dir)
                    .with_show_download_progress(false);
                ImageEmbedding::try_new(options)
                    .map(Mutex::new)
                    .map_err(|e| EmbeddingError::Provider(format!("failed to load CLIP model: {e}")))
            })
            .await
    }
}

impl ImageEmbedder for ClipImageEmbedder {
    async fn embed_image(&self, bytes: &[u8]) -> Result<Vec<f32>, EmbeddingError> {
        let model = self.model().await?;
        let image = bytes.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut guard = model.lock().unwrap_or_else(PoisonError::into_inner);
            let mut vectors = guard
                .embed_bytes(&[image.as_slice()], None)
                .map_err(|e| EmbeddingError::Provider(e.to_string()))?;
            match vectors.pop() {
                Some(vector) if vectors.is_empty() => Ok(vector),
                _ => Err(EmbeddingError::InvalidResponse(
                    "expected exactly one image embedding".to_string(),
                )),
            }
        })
        .await
        .map_err(|e| EmbeddingError::Provider(format!("image embedding task panicked: {e}")))?
    }

    async fn load(&self) -> Result<(), EmbeddingError> {
        self.model().await.map(|_| ())
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn dimension(&self) -> usize {
        CLIP_DIMENSION
    }
}
