//! LLM provider implementations.
//!
//! Contains the concrete implementation of the [`LlmProvider`] trait defined
//! in `wayfinder-core` for OpenAI-compatible chat completion endpoints.
//!
//! [`LlmProvider`]: wayfinder_core::llm::provider::LlmProvider

pub mod openai_compat;
