//! Startup Indexer: populates the text index from the durable record store.

pub mod entity_text;
pub mod startup;
