//! Vector Index Store for Wayfinder.
//!
//! - `VectorIndex`: exact inner-product ranking over normalized vectors
//! - `VectorStore`: per-modality snapshots, serialized writers, save/load
//! - `IndexPersistence`: port for the on-disk snapshot format

pub mod persistence;
pub mod store;
pub mod vector_index;
