//! On-disk index persistence.
//!
//! Each modality is stored as two paired files in the index directory:
//!
//! - `{modality}_vectors.bin`: header (`WFVI` magic, `u32` version,
//!   `u32` dimension, `u64` count) followed by `count * dimension`
//!   little-endian `f32` values
//! - `{modality}_entries.json`: JSON object mapping row id to entry
//!
//! Files are written to a temporary name and renamed into place.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;
use wayfinder_core::index::persistence::IndexPersistence;
use wayfinder_core::index::vector_index::PersistedIndex;
use wayfinder_types::entity::Modality;
use wayfinder_types::error::IndexError;

const MAGIC: &[u8; 4] = b"WFVI";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

pub struct FileIndexPersistence {
    dir: PathBuf,
}

impl FileIndexPersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn vectors_path(&self, modality: Modality) -> PathBuf {
        self.dir.join(format!("{modality}_vectors.bin"))
    }

    fn entries_path(&self, modality: Modality) -> PathBuf {
        self.dir.join(format!("{modality}_entries.json"))
    }
}

fn persistence_error(path: &Path, err: std::io::Error) -> IndexError {
    IndexError::Persistence(format!("{}: {err}", path.display()))
}

fn encode_vectors(index: &PersistedIndex) -> Vec<u8> {
    let count = index.entries.len() as u64;
    let mut buf = Vec::with_capacity(HEADER_LEN + index.vectors.len() * 4);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&(index.dimension as u32).to_le_bytes());
    buf.extend_from_slice(&count.to_le_bytes());
    for value in &index.vectors {
        buf.extend_from_slice(&value.to_le_bytes());
    }
    buf
}

/// Decode a vector blob into `(dimension, count, values)`.
fn decode_vectors(bytes: &[u8]) -> Result<(usize, usize, Vec<f32>), IndexError> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
        return Err(IndexError::DataIntegrity(
            "vector file has no valid header".to_string(),
        ));
    }
    let read_u32 = |at: usize| -> u32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&bytes[at..at + 4]);
        u32::from_le_bytes(word)
    };
    let version = read_u32(4);
    if version != FORMAT_VERSION {
        return Err(IndexError::DataIntegrity(format!(
            "unsupported vector file version {version}"
        )));
    }
    let dimension = read_u32(8) as usize;
    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&bytes[12..20]);
    let count = u64::from_le_bytes(count_bytes) as usize;

    let body = &bytes[HEADER_LEN..];
    let expected_len = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| IndexError::DataIntegrity("vector file header overflows".to_string()))?;
    if body.len() != expected_len {
        return Err(IndexError::DataIntegrity(format!(
            "vector file body is {} bytes, header declares {expected_len}",
            body.len()
        )));
    }

    let values = body
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    Ok((dimension, count, values))
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), IndexError> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| persistence_error(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| persistence_error(path, e))
}

/// Read a file, mapping "not found" to `None`.
async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, IndexError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(persistence_error(path, e)),
    }
}

impl IndexPersistence for FileIndexPersistence {
    async fn save(&self, modality: Modality, index: &PersistedIndex) -> Result<(), IndexError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| persistence_error(&self.dir, e))?;

        let entries = serde_json::to_vec(&index.entries)
            .map_err(|e| IndexError::Persistence(format!("failed to encode entries: {e}")))?;
        write_atomically(&self.vectors_path(modality), &encode_vectors(index)).await?;
        write_atomically(&self.entries_path(modality), &entries).await?;
        debug!(%modality, dir = %self.dir.display(), "Index files written");
        Ok(())
    }

    async fn load(&self, modality: Modality) -> Result<Option<PersistedIndex>, IndexError> {
        let vectors = read_optional(&self.vectors_path(modality)).await?;
        let entries = read_optional(&self.entries_path(modality)).await?;

        let (vectors, entries) = match (vectors, entries) {
            (None, None) => return Ok(None),
            (Some(v), Some(e)) => (v, e),
            (Some(_), None) => {
                return Err(IndexError::DataIntegrity(
                    "vector file present without entries file".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(IndexError::DataIntegrity(
                    "entries file present without vector file".to_string(),
                ));
            }
        };

        let (dimension, count, values) = decode_vectors(&vectors)?;
        let entries: std::collections::BTreeMap<u64, _> = serde_json::from_slice(&entries)
            .map_err(|e| IndexError::DataIntegrity(format!("entries file is not valid: {e}")))?;
        if entries.len() != count {
            return Err(IndexError::DataIntegrity(format!(
                "vector file holds {count} rows but entries file holds {}",
                entries.len()
            )));
        }

        Ok(Some(PersistedIndex {
            dimension,
            vectors: values,
            entries,
        }))
    }

    async fn discard(&self, modality: Modality) -> Result<(), IndexError> {
        for path in [self.vectors_path(modality), self.entries_path(modality)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(persistence_error(&path, e)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;
    use wayfinder_types::entity::EntityType;
    use wayfinder_types::index::IndexEntry;
    use wayfinder_types::metadata::Metadata;

    fn sample() -> PersistedIndex {
        let mut entries = BTreeMap::new();
        entries.insert(
            0,
            IndexEntry {
                entity_id: 11,
                entity_type: EntityType::Location,
                metadata: Metadata::new()
                    .with("title", "Lady Buddha")
                    .unwrap()
                    .with("rating", 4.5)
                    .unwrap()
                    .with("visits", 120i64)
                    .unwrap(),
            },
        );
        entries.insert(
            1,
            IndexEntry {
                entity_id: 12,
                entity_type: EntityType::Festival,
                metadata: Metadata::new(),
            },
        );
        PersistedIndex {
            dimension: 3,
            vectors: vec![0.6, 0.8, 0.0, 0.1f32.sqrt(), -0.3, 0.9],
            entries,
        }
    }

    #[tokio::test]
    async fn test_save_load_is_lossless() {
        let tmp = TempDir::new().unwrap();
        let persistence = FileIndexPersistence::new(tmp.path().join("index"));
        let index = sample();
        persistence.save(Modality::Text, &index).await.unwrap();

        assert!(tmp.path().join("index/text_vectors.bin").exists());
        assert!(tmp.path().join("index/text_entries.json").exists());

        let loaded = persistence.load(Modality::Text).await.unwrap().unwrap();
        assert_eq!(loaded, index);
        let bits: Vec<u32> = loaded.vectors.iter().map(|v| v.to_bits()).collect();
        let expected: Vec<u32> = index.vectors.iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits, expected);
        assert!(persistence.load(Modality::Image).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_partner_file_is_integrity_error() {
        let tmp = TempDir::new().unwrap();
        let persistence = FileIndexPersistence::new(tmp.path());
        persistence.save(Modality::Text, &sample()).await.unwrap();
        tokio::fs::remove_file(tmp.path().join("text_entries.json"))
            .await
            .unwrap();
        assert!(matches!(
            persistence.load(Modality::Text).await,
            Err(IndexError::DataIntegrity(_))
        ));
    }

    #[tokio::test]
    async fn test_truncated_blob_is_integrity_error() {
        let tmp = TempDir::new().unwrap();
        let persistence = FileIndexPersistence::new(tmp.path());
        persistence.save(Modality::Text, &sample()).await.unwrap();
        let path = tmp.path().join("text_vectors.bin");
        let bytes = tokio::fs::read(&path).await.unwrap();
        tokio::fs::write(&path, &bytes[..bytes.len() - 2]).await.unwrap();
        assert!(matches!(
            persistence.load(Modality::Text).await,
            Err(IndexError::DataIntegrity(_))
        ));
    }

    #[tokio::test]
    async fn test_count_disagreement_is_integrity_error() {
        let tmp = TempDir::new().unwrap();
        let persistence = FileIndexPersistence::new(tmp.path());
        persistence.save(Modality::Text, &sample()).await.unwrap();
        let mut fewer = sample();
        fewer.entries.remove(&1);
        tokio::fs::write(
            tmp.path().join("text_entries.json"),
            serde_json::to_vec(&fewer.entries).unwrap(),
        )
        .await
        .unwrap();
        assert!(matches!(
            persistence.load(Modality::Text).await,
            Err(IndexError::DataIntegrity(_))
        ));
    }

    #[tokio::test]
    async fn test_garbage_entries_is_integrity_error() {
        let tmp = TempDir::new().unwrap();
        let persistence = FileIndexPersistence::new(tmp.path());
        persistence.save(Modality::Image, &sample()).await.unwrap();
        tokio::fs::write(tmp.path().join("image_entries.json"), b"{not json")
            .await
            .unwrap();
        assert!(persistence.load(Modality::Image).await.is_err());
    }

    #[tokio::test]
    async fn test_discard_removes_both_files() {
        let tmp = TempDir::new().unwrap();
        let persistence = FileIndexPersistence::new(tmp.path());
        persistence.save(Modality::Text, &sample()).await.unwrap();
        persistence.discard(Modality::Text).await.unwrap();
        assert!(persistence.load(Modality::Text).await.unwrap().is_none());
        // Discarding again is a no-op.
        persistence.discard(Modality::Text).await.unwrap();
    }
}
