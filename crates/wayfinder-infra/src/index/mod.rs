//! Vector index persistence backends.

pub mod file;

pub use file::FileIndexPersistence;
