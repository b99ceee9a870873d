//! Durable record store port.
//!
//! Entities, user memories, and conversations live in an external record
//! store reached through `RecordStore` (create + query only).

pub mod box_store;
pub mod fields;
pub mod store;
