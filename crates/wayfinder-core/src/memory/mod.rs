//! User memories and conversation history for Wayfinder.
//!
//! `MemoryStore` prefers the durable record store and falls back to the
//! in-process `VolatileCache`.

pub mod cache;
pub mod store;
