//! Embedding generation for Wayfinder.
//!
//! - `TextEmbedder` / `ImageEmbedder`: RPITIT port traits
//! - `BoxTextEmbedder` / `BoxImageEmbedder`: object-safe wrappers
//! - `EmbeddingGenerator`: input shaping, batching, and degradation to
//!   "unavailable"

pub mod box_embedder;
pub mod embedder;
pub mod generator;
