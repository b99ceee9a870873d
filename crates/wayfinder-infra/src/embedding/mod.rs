//! Embedding provider implementations.
//!
//! - `OpenAiEmbedder`: text embeddings over the OpenAI-compatible HTTP API
//! - `ClipImageEmbedder`: local CLIP ViT-B/32 image embeddings (fastembed)

pub mod clip;
pub mod openai;
