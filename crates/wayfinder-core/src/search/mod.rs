//! Search helpers built on the vector index.

pub mod service;
