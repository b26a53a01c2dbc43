//! Exact nearest-neighbor index over squared L2 distance.
//!
//! Stores chunk/vector pairs in insertion order and answers top-k queries by
//! brute force over the full set. Exactness is guaranteed for every query;
//! at single-user document scale that beats maintaining an approximate
//! structure. Removal is all-or-nothing: `clear` is the only way to drop
//! entries, so positional indices stay valid for the index's lifetime.

use std::io::{BufWriter, Read, Write};
use std::path::Path;

use thiserror::Error;

use super::chunker::TextChunk;

/// Snapshot file holding raw vectors in index order.
const INDEX_FILE: &str = "index.bin";

/// Snapshot file holding chunk records in the same order as the vectors.
const CHUNKS_FILE: &str = "chunks.json";

/// Magic bytes identifying a vector snapshot.
const SNAPSHOT_MAGIC: [u8; 4] = *b"TCVI";

/// Snapshot format version.
const SNAPSHOT_VERSION: u32 = 1;

/// Errors from vector index operations.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector/chunk count mismatch: {vectors} vectors, {chunks} chunks")]
    CountMismatch { vectors: usize, chunks: usize },

    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),
}

/// In-memory vector index with parallel chunk storage.
///
/// Invariants: `vectors.len() == chunks.len() * dimension`, insertion order
/// is append-only, and a chunk's position equals its vector's row.
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    /// Row-major flat storage, one `dimension`-length row per chunk.
    vectors: Vec<f32>,
    chunks: Vec<TextChunk>,
}

impl VectorIndex {
    /// Create an empty index for vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
            chunks: Vec::new(),
        }
    }

    /// Configured vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Append vectors and chunks in lock-step.
    ///
    /// Validates everything before touching storage: a count mismatch or a
    /// wrong-dimension vector fails with the index unchanged.
    pub fn add(&mut self, vectors: Vec<Vec<f32>>, chunks: Vec<TextChunk>) -> Result<(), IndexError> {
        if vectors.len() != chunks.len() {
            return Err(IndexError::CountMismatch {
                vectors: vectors.len(),
                chunks: chunks.len(),
            });
        }

        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
        }

        self.vectors.reserve(vectors.len() * self.dimension);
        for vector in &vectors {
            self.vectors.extend_from_slice(vector);
        }
        self.chunks.extend(chunks);

        Ok(())
    }

    /// Find the `k` nearest chunks to `query` by squared L2 distance.
    ///
    /// Returns at most `min(k, len)` results ordered nearest-first. An empty
    /// index yields an empty result, not an error.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(&TextChunk, f32)>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        if self.chunks.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(row, stored)| (row, squared_l2(query, stored)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(row, distance)| (&self.chunks[row], distance))
            .collect())
    }

    /// Drop all entries. The only supported removal operation.
    pub fn clear(&mut self) {
        self.vectors.clear();
        self.chunks.clear();
    }

    /// Persist the index to a directory as a vector blob plus chunk records.
    ///
    /// Both artifacts are written to temporary siblings and renamed into
    /// place, so a crash mid-save leaves the previous snapshot intact. Each
    /// artifact carries the entry count; `load` cross-checks them.
    pub fn save(&self, dir: &Path) -> Result<(), IndexError> {
        std::fs::create_dir_all(dir)?;

        let index_tmp = dir.join(format!("{INDEX_FILE}.tmp"));
        {
            let file = std::fs::File::create(&index_tmp)?;
            let mut writer = BufWriter::new(file);

            writer.write_all(&SNAPSHOT_MAGIC)?;
            writer.write_all(&SNAPSHOT_VERSION.to_le_bytes())?;
            writer.write_all(&(self.dimension as u32).to_le_bytes())?;
            writer.write_all(&(self.chunks.len() as u64).to_le_bytes())?;

            for value in &self.vectors {
                writer.write_all(&value.to_le_bytes())?;
            }
            writer.flush()?;
        }

        let chunks_tmp = dir.join(format!("{CHUNKS_FILE}.tmp"));
        let records = serde_json::to_vec(&self.chunks)
            .map_err(|e| IndexError::CorruptSnapshot(format!("failed to serialize chunks: {e}")))?;
        std::fs::write(&chunks_tmp, records)?;

        std::fs::rename(&index_tmp, dir.join(INDEX_FILE))?;
        std::fs::rename(&chunks_tmp, dir.join(CHUNKS_FILE))?;

        tracing::debug!(
            target: "retrieval",
            "saved snapshot: {} chunks to {}",
            self.chunks.len(),
            dir.display()
        );

        Ok(())
    }

    /// Load a snapshot from a directory.
    ///
    /// Returns `Ok(false)` when no snapshot exists (clean empty start) and
    /// `Ok(true)` after a successful load. A corrupt or inconsistent pair is
    /// an error; the in-memory index is only replaced once both artifacts
    /// parsed and their counts agree.
    pub fn load(&mut self, dir: &Path) -> Result<bool, IndexError> {
        let index_path = dir.join(INDEX_FILE);
        let chunks_path = dir.join(CHUNKS_FILE);

        match (index_path.exists(), chunks_path.exists()) {
            (false, false) => return Ok(false),
            (true, true) => {}
            (has_index, _) => {
                return Err(IndexError::CorruptSnapshot(format!(
                    "snapshot pair incomplete: missing {}",
                    if has_index { CHUNKS_FILE } else { INDEX_FILE }
                )));
            }
        }

        let (dimension, count, vectors) = read_vector_blob(&index_path)?;

        if dimension != self.dimension {
            return Err(IndexError::CorruptSnapshot(format!(
                "snapshot dimension {} does not match configured dimension {}",
                dimension, self.dimension
            )));
        }

        let records = std::fs::read_to_string(&chunks_path)?;
        let chunks: Vec<TextChunk> = serde_json::from_str(&records)
            .map_err(|e| IndexError::CorruptSnapshot(format!("failed to parse {CHUNKS_FILE}: {e}")))?;

        if chunks.len() != count {
            return Err(IndexError::CorruptSnapshot(format!(
                "{INDEX_FILE} holds {count} vectors but {CHUNKS_FILE} holds {} records",
                chunks.len()
            )));
        }

        self.vectors = vectors;
        self.chunks = chunks;

        tracing::debug!(
            target: "retrieval",
            "loaded snapshot: {} chunks from {}",
            self.chunks.len(),
            dir.display()
        );

        Ok(true)
    }
}

/// Parse the vector blob: header plus `count * dimension` f32 values.
fn read_vector_blob(path: &Path) -> Result<(usize, usize, Vec<f32>), IndexError> {
    let mut file = std::fs::File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    let header_len = 4 + 4 + 4 + 8;
    if data.len() < header_len {
        return Err(IndexError::CorruptSnapshot(format!(
            "{INDEX_FILE} too short for header ({} bytes)",
            data.len()
        )));
    }

    if data[0..4] != SNAPSHOT_MAGIC {
        return Err(IndexError::CorruptSnapshot(format!(
            "{INDEX_FILE} has wrong magic bytes"
        )));
    }

    let version = u32::from_le_bytes(data[4..8].try_into().expect("4 bytes"));
    if version != SNAPSHOT_VERSION {
        return Err(IndexError::CorruptSnapshot(format!(
            "unsupported snapshot version {version}"
        )));
    }

    let dimension = u32::from_le_bytes(data[8..12].try_into().expect("4 bytes")) as usize;
    let count = u64::from_le_bytes(data[12..20].try_into().expect("8 bytes")) as usize;

    let expected_bytes = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| IndexError::CorruptSnapshot("vector payload size overflows".to_string()))?;

    let payload = &data[header_len..];
    if payload.len() != expected_bytes {
        return Err(IndexError::CorruptSnapshot(format!(
            "{INDEX_FILE} payload is {} bytes, header promises {expected_bytes}",
            payload.len()
        )));
    }

    let vectors = payload
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes(b.try_into().expect("4 bytes")))
        .collect();

    Ok((dimension, count, vectors))
}

/// Exact squared Euclidean distance in f32.
fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn chunk(content: &str) -> TextChunk {
        TextChunk::new(content.to_string(), HashMap::new())
    }

    fn filled_index() -> VectorIndex {
        let mut index = VectorIndex::new(3);
        index
            .add(
                vec![
                    vec![0.0, 0.0, 0.0],
                    vec![1.0, 0.0, 0.0],
                    vec![0.0, 3.0, 0.0],
                ],
                vec![chunk("origin"), chunk("unit-x"), chunk("far-y")],
            )
            .unwrap();
        index
    }

    #[test]
    fn test_search_orders_by_ascending_distance() {
        let index = filled_index();
        let results = index.search(&[0.1, 0.0, 0.0], 3).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0.content, "origin");
        assert_eq!(results[1].0.content, "unit-x");
        assert_eq!(results[2].0.content, "far-y");
        assert!(results[0].1 <= results[1].1 && results[1].1 <= results[2].1);
    }

    #[test]
    fn test_search_returns_min_of_k_and_len() {
        let index = filled_index();
        assert_eq!(index.search(&[0.0; 3], 2).unwrap().len(), 2);
        assert_eq!(index.search(&[0.0; 3], 10).unwrap().len(), 3);
    }

    #[test]
    fn test_search_empty_index_returns_empty() {
        let index = VectorIndex::new(3);
        assert!(index.search(&[0.0; 3], 5).unwrap().is_empty());
    }

    #[test]
    fn test_exact_match_has_zero_distance() {
        let index = filled_index();
        let results = index.search(&[1.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(results[0].0.content, "unit-x");
        assert_eq!(results[0].1, 0.0);
    }

    #[test]
    fn test_add_count_mismatch_leaves_index_unchanged() {
        let mut index = filled_index();
        let before = index.len();

        let result = index.add(vec![vec![0.0; 3]], vec![chunk("a"), chunk("b")]);

        assert!(matches!(result, Err(IndexError::CountMismatch { .. })));
        assert_eq!(index.len(), before);
    }

    #[test]
    fn test_add_dimension_mismatch_leaves_index_unchanged() {
        let mut index = filled_index();
        let before = index.len();

        let result = index.add(
            vec![vec![0.0; 3], vec![0.0; 4]],
            vec![chunk("ok"), chunk("bad")],
        );

        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
        assert_eq!(index.len(), before);
    }

    #[test]
    fn test_query_dimension_mismatch_is_error() {
        let index = filled_index();
        assert!(matches!(
            index.search(&[0.0; 4], 1),
            Err(IndexError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_clear_then_search_returns_empty() {
        let mut index = filled_index();
        index.clear();

        assert!(index.is_empty());
        for k in [0, 1, 100] {
            assert!(index.search(&[0.0; 3], k).unwrap().is_empty());
        }
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let index = filled_index();
        index.save(dir.path()).unwrap();

        let mut loaded = VectorIndex::new(3);
        assert!(loaded.load(dir.path()).unwrap());

        assert_eq!(loaded.len(), index.len());
        let results = loaded.search(&[0.0, 3.0, 0.0], 1).unwrap();
        assert_eq!(results[0].0.content, "far-y");
        assert_eq!(results[0].1, 0.0);
    }

    #[test]
    fn test_load_missing_snapshot_is_clean_empty() {
        let dir = TempDir::new().unwrap();
        let mut index = VectorIndex::new(3);

        assert!(!index.load(dir.path()).unwrap());
        assert!(index.is_empty());
    }

    #[test]
    fn test_load_half_pair_is_corrupt() {
        let dir = TempDir::new().unwrap();
        filled_index().save(dir.path()).unwrap();
        std::fs::remove_file(dir.path().join(CHUNKS_FILE)).unwrap();

        let mut index = VectorIndex::new(3);
        let result = index.load(dir.path());

        assert!(matches!(result, Err(IndexError::CorruptSnapshot(_))));
        assert!(index.is_empty());
    }

    #[test]
    fn test_load_truncated_blob_is_corrupt() {
        let dir = TempDir::new().unwrap();
        filled_index().save(dir.path()).unwrap();

        let blob_path = dir.path().join(INDEX_FILE);
        let blob = std::fs::read(&blob_path).unwrap();
        std::fs::write(&blob_path, &blob[..blob.len() - 5]).unwrap();

        let mut index = VectorIndex::new(3);
        assert!(matches!(
            index.load(dir.path()),
            Err(IndexError::CorruptSnapshot(_))
        ));
        assert!(index.is_empty());
    }

    #[test]
    fn test_load_count_mismatch_is_corrupt() {
        let dir = TempDir::new().unwrap();
        filled_index().save(dir.path()).unwrap();

        // Drop one record from the chunk file so the counts disagree.
        let chunks_path = dir.path().join(CHUNKS_FILE);
        let mut records: Vec<TextChunk> =
            serde_json::from_str(&std::fs::read_to_string(&chunks_path).unwrap()).unwrap();
        records.pop();
        std::fs::write(&chunks_path, serde_json::to_vec(&records).unwrap()).unwrap();

        let mut index = VectorIndex::new(3);
        assert!(matches!(
            index.load(dir.path()),
            Err(IndexError::CorruptSnapshot(_))
        ));
    }

    #[test]
    fn test_load_dimension_drift_is_corrupt() {
        let dir = TempDir::new().unwrap();
        filled_index().save(dir.path()).unwrap();

        let mut index = VectorIndex::new(5);
        assert!(matches!(
            index.load(dir.path()),
            Err(IndexError::CorruptSnapshot(_))
        ));
    }
}
