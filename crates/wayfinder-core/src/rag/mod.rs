//! Retrieval-augmented chat: prompt assembly and request orchestration.

pub mod orchestrator;
pub mod prompt;
