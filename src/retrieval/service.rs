//! Retrieval orchestration: ingestion and query over the vector index.
//!
//! The service is the single owner of the index for the process lifetime and
//! the boundary where chunker, embedding, and index failures become typed
//! errors the chat layer can translate into user-facing messages.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::chunker::{ChunkerError, DocumentChunker, TextChunk};
use super::embedding::{EmbeddingError, EmbeddingProvider};
use super::index::{IndexError, VectorIndex};

/// Default number of results returned by a query.
pub const DEFAULT_TOP_K: usize = 3;

/// Errors surfaced by retrieval operations.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("document not found or unreadable: {0}")]
    DocumentNotFound(PathBuf),

    #[error("chunker error: {0}")]
    Chunker(#[from] ChunkerError),

    #[error("embedding unavailable: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

/// A ranked retrieval hit, projected for prompt assembly and display.
///
/// Ephemeral: constructed per query, never persisted.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchResult {
    /// Chunk text.
    pub content: String,
    /// Chunk source metadata.
    pub metadata: HashMap<String, String>,
    /// Similarity in `(0, 1]`, computed as `1 / (1 + distance)`.
    pub score: f32,
}

/// Orchestrates chunking, embedding, and vector search.
pub struct RetrievalService {
    chunker: DocumentChunker,
    provider: Box<dyn EmbeddingProvider>,
    index: VectorIndex,
    store_dir: PathBuf,
}

impl std::fmt::Debug for RetrievalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalService")
            .field("chunker", &self.chunker)
            .field("model", &self.provider.model_name())
            .field("indexed_chunks", &self.index.len())
            .field("store_dir", &self.store_dir)
            .finish()
    }
}

impl RetrievalService {
    /// Create a service and load any existing snapshot from `store_dir`.
    ///
    /// A corrupt snapshot is reported with a warning and replaced by an
    /// empty index; it never prevents the service from starting.
    pub fn new(
        chunker: DocumentChunker,
        provider: Box<dyn EmbeddingProvider>,
        dimension: usize,
        store_dir: impl Into<PathBuf>,
    ) -> Self {
        let store_dir = store_dir.into();
        let mut index = VectorIndex::new(dimension);

        match index.load(&store_dir) {
            Ok(true) => {
                tracing::info!(
                    target: "retrieval",
                    "restored {} chunks from {}",
                    index.len(),
                    store_dir.display()
                );
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(
                    target: "retrieval",
                    "discarding unusable snapshot at {}: {e}",
                    store_dir.display()
                );
                index.clear();
            }
        }

        Self {
            chunker,
            provider,
            index,
            store_dir,
        }
    }

    /// Number of chunks currently indexed.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the knowledge base is empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Embedding model identifier, for diagnostics.
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Ingest a document: load, split, embed the whole batch, index, persist.
    ///
    /// Embedding is all-or-nothing; a batch failure commits zero chunks.
    /// Returns the produced chunks so the caller can show a summary.
    pub async fn ingest(&mut self, path: &Path) -> Result<Vec<TextChunk>, RetrievalError> {
        let text = self
            .chunker
            .load(path)
            .ok_or_else(|| RetrievalError::DocumentNotFound(path.to_path_buf()))?;

        let mut metadata = HashMap::new();
        metadata.insert("source".to_string(), path.display().to_string());
        metadata.insert(
            "filename".to_string(),
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );

        let chunks = self.chunker.split(&text, &metadata);
        if chunks.is_empty() {
            tracing::debug!(target: "retrieval", "{} produced no chunks", path.display());
            return Ok(chunks);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let vectors = self.provider.embed(&texts)?;

        self.index.add(vectors, chunks.clone())?;
        self.persist()?;

        tracing::info!(
            target: "retrieval",
            "ingested {}: {} chunks ({} total)",
            path.display(),
            chunks.len(),
            self.index.len()
        );

        Ok(chunks)
    }

    /// Find the `top_k` chunks most similar to `text`.
    ///
    /// An empty index short-circuits to no results without touching the
    /// embedding model. An embedding failure is an error, distinct from the
    /// empty result.
    pub async fn query(
        &self,
        text: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, RetrievalError> {
        if self.index.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.provider.embed(&[text])?;
        let query_vec = vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Inference("empty embedding batch".to_string()))?;

        let hits = self.index.search(&query_vec, top_k)?;

        Ok(hits
            .into_iter()
            .map(|(chunk, distance)| SearchResult {
                content: chunk.content.clone(),
                metadata: chunk.metadata.clone(),
                score: 1.0 / (1.0 + distance),
            })
            .collect())
    }

    /// Clear the knowledge base and persist the empty state.
    pub async fn reset(&mut self) -> Result<(), RetrievalError> {
        self.index.clear();
        self.persist()?;
        tracing::info!(target: "retrieval", "knowledge base cleared");
        Ok(())
    }

    fn persist(&self) -> Result<(), RetrievalError> {
        self.index.save(&self.store_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    /// Deterministic provider: maps text to a small histogram-style vector.
    /// Identical text embeds to the identical vector.
    struct StubProvider {
        dimension: usize,
    }

    impl EmbeddingProvider for StubProvider {
        fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts
                .iter()
                .map(|text| {
                    let mut v = vec![0.0f32; self.dimension];
                    for (i, byte) in text.bytes().enumerate() {
                        v[i % self.dimension] += f32::from(byte) / 255.0;
                    }
                    v
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    /// Provider that always fails, for whole-batch abort tests.
    struct FailingProvider;

    impl EmbeddingProvider for FailingProvider {
        fn embed(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Inference("model exploded".to_string()))
        }

        fn dimension(&self) -> usize {
            8
        }

        fn model_name(&self) -> &str {
            "failing-stub"
        }
    }

    fn service_in(dir: &TempDir) -> RetrievalService {
        RetrievalService::new(
            DocumentChunker::new(50, 10).unwrap(),
            Box::new(StubProvider { dimension: 8 }),
            8,
            dir.path().join("vectorstore"),
        )
    }

    fn write_doc(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_ingest_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mut service = service_in(&dir);

        let result = service.ingest(Path::new("/no/such/doc.txt")).await;
        assert!(matches!(result, Err(RetrievalError::DocumentNotFound(_))));
        assert!(service.is_empty());
    }

    #[tokio::test]
    async fn test_query_on_empty_index_returns_no_results() {
        let dir = TempDir::new().unwrap();
        let service = service_in(&dir);

        let results = service.query("anything", DEFAULT_TOP_K).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_then_query_own_text_is_top_hit() {
        let dir = TempDir::new().unwrap();
        let mut service = service_in(&dir);

        let doc = write_doc(&dir, "doc.txt", "the capital of france is paris");
        let chunks = service.ingest(&doc).await.unwrap();
        assert_eq!(chunks.len(), 1);

        let results = service
            .query("the capital of france is paris", 3)
            .await
            .unwrap();

        assert!(!results.is_empty());
        // Identical text embeds identically: distance 0, score 1.
        assert!(results[0].score > 0.99);
        assert_eq!(results[0].content, chunks[0].content);
        assert_eq!(results[0].metadata.get("filename").unwrap(), "doc.txt");
    }

    #[tokio::test]
    async fn test_embedding_failure_commits_nothing() {
        let dir = TempDir::new().unwrap();
        let mut service = RetrievalService::new(
            DocumentChunker::new(50, 10).unwrap(),
            Box::new(FailingProvider),
            8,
            dir.path().join("vectorstore"),
        );

        let doc = write_doc(&dir, "doc.txt", "some content that will not embed");
        let result = service.ingest(&doc).await;

        assert!(matches!(result, Err(RetrievalError::Embedding(_))));
        assert!(service.is_empty());
    }

    #[tokio::test]
    async fn test_reset_persists_empty_state() {
        let dir = TempDir::new().unwrap();
        let mut service = service_in(&dir);

        let doc = write_doc(&dir, "doc.txt", "content to forget");
        service.ingest(&doc).await.unwrap();
        assert!(!service.is_empty());

        service.reset().await.unwrap();
        assert!(service.is_empty());

        // A fresh service over the same store dir sees the empty snapshot.
        let service = service_in(&dir);
        assert!(service.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip_reproduces_query_results() {
        let dir = TempDir::new().unwrap();
        let mut service = service_in(&dir);

        let doc = write_doc(
            &dir,
            "doc.txt",
            "rust ownership rules prevent data races at compile time",
        );
        service.ingest(&doc).await.unwrap();
        let before = service.query("ownership rules", 3).await.unwrap();

        let service = service_in(&dir);
        let after = service.query("ownership rules", 3).await.unwrap();

        assert_eq!(before.len(), after.len());
        for (a, b) in before.iter().zip(after.iter()) {
            assert_eq!(a.content, b.content);
            assert_eq!(a.score, b.score);
        }
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_falls_back_to_empty() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("vectorstore");
        let mut service = service_in(&dir);

        let doc = write_doc(&dir, "doc.txt", "content that will be corrupted");
        service.ingest(&doc).await.unwrap();

        std::fs::write(store.join("index.bin"), b"not a snapshot").unwrap();

        let service = service_in(&dir);
        assert!(service.is_empty());
        assert!(service.query("content", 3).await.unwrap().is_empty());
    }
}
