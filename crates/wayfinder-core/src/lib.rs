//! Business logic and port trait definitions for Wayfinder.
//!
//! This crate defines the "ports" (embedder, LLM provider, record store, and
//! index persistence traits) that the infrastructure layer implements, plus
//! every algorithm built on them: the exact vector index, the embedding
//! generator, the two-tier memory store, the RAG orchestrator, the startup
//! indexer, and the search service. It depends only on `wayfinder-types`,
//! never on `wayfinder-infra` or any database/IO crate.

pub mod embedding;
pub mod index;
pub mod indexer;
pub mod llm;
pub mod memory;
pub mod rag;
pub mod records;
pub mod search;
pub mod text;

#[cfg(test)]
pub(crate) mod testing;
