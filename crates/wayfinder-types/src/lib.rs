//! Shared domain types for Wayfinder.
//!
//! This crate contains the core domain types used across the Wayfinder
//! workspace: indexed entities and their metadata, search and chat request
//! shapes, user memories, LLM message types, configuration, and errors.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod entity;
pub mod error;
pub mod index;
pub mod llm;
pub mod memory;
pub mod metadata;
pub mod record;
pub mod search;
