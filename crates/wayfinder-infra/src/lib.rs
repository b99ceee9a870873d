//! Infrastructure layer for Wayfinder.
//!
//! Contains implementations of the port traits defined in `wayfinder-core`:
//! OpenAI-compatible chat and embedding providers, the local CLIP image
//! embedder, NocoDB and SQLite record stores, on-disk index persistence,
//! plus configuration and secret loading.

pub mod config;
pub mod embedding;
pub mod index;
pub mod llm;
pub mod records;
pub mod secret;
