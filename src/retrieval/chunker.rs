//! Token-window document chunking.
//!
//! Splits raw document text into overlapping, token-bounded chunks suitable
//! for embedding. Token counts use the cl100k_base encoding so chunk sizes
//! line up with what LLM context budgeting expects.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tiktoken_rs::{CoreBPE, cl100k_base};

/// Errors from chunker construction.
#[derive(Error, Debug)]
pub enum ChunkerError {
    #[error(
        "invalid chunking config: chunk_overlap ({overlap}) must be smaller than chunk_size ({size}), and chunk_size must be > 0"
    )]
    InvalidConfig { size: usize, overlap: usize },

    #[error("failed to load tokenizer: {0}")]
    Tokenizer(String),
}

/// A chunk of document text with attached source metadata.
///
/// Immutable after creation: the chunker produces it, the vector index owns
/// it, and nothing mutates it until a full index clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// The text content of this chunk, decoded from a token window.
    pub content: String,

    /// Source metadata. At minimum `source` (file path) and `filename`.
    pub metadata: HashMap<String, String>,
}

impl TextChunk {
    /// Create a new chunk.
    pub fn new(content: String, metadata: HashMap<String, String>) -> Self {
        Self { content, metadata }
    }

    /// Get a preview of the content (first N characters, on a char boundary).
    pub fn preview(&self, max_chars: usize) -> &str {
        match self.content.char_indices().nth(max_chars) {
            Some((byte_end, _)) => &self.content[..byte_end],
            None => &self.content,
        }
    }
}

/// Splits documents into overlapping token windows.
///
/// Algorithm: tokenize the full text once, then slide a window of
/// `chunk_size` tokens advancing by `chunk_size - chunk_overlap` each step.
/// The final chunk may be shorter than `chunk_size`. Re-running on the same
/// input yields byte-identical chunks.
pub struct DocumentChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    encoding: CoreBPE,
}

impl std::fmt::Debug for DocumentChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentChunker")
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .finish()
    }
}

impl DocumentChunker {
    /// Default target chunk length, in tokens.
    pub const DEFAULT_CHUNK_SIZE: usize = 1000;

    /// Default overlap between adjacent chunks, in tokens.
    pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

    /// Create a chunker with explicit window parameters.
    ///
    /// Rejects `chunk_size == 0` and `chunk_overlap >= chunk_size`; an
    /// overlap that large would make the window step zero or negative.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkerError> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(ChunkerError::InvalidConfig {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }

        let encoding = cl100k_base().map_err(|e| ChunkerError::Tokenizer(e.to_string()))?;

        Ok(Self {
            chunk_size,
            chunk_overlap,
            encoding,
        })
    }

    /// Create a chunker with the default 1000/200 window.
    pub fn with_defaults() -> Result<Self, ChunkerError> {
        Self::new(Self::DEFAULT_CHUNK_SIZE, Self::DEFAULT_CHUNK_OVERLAP)
    }

    /// Target chunk length in tokens.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap between adjacent chunks in tokens.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Load a UTF-8 text file.
    ///
    /// Returns `None` when the path does not exist or the content cannot be
    /// decoded, letting the caller report a clean not-found error instead of
    /// bubbling an I/O failure out of the split loop.
    pub fn load(&self, path: &Path) -> Option<String> {
        match std::fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!(target: "retrieval", "cannot read {}: {e}", path.display());
                None
            }
        }
    }

    /// Split text into overlapping token-bounded chunks.
    ///
    /// Every produced chunk carries a copy of `metadata`. Empty text yields
    /// zero chunks.
    pub fn split(&self, text: &str, metadata: &HashMap<String, String>) -> Vec<TextChunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let tokens = self.encoding.encode_ordinary(text);
        if tokens.is_empty() {
            return Vec::new();
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::with_capacity(tokens.len().div_ceil(step));

        let mut start = 0;
        while start < tokens.len() {
            let end = (start + self.chunk_size).min(tokens.len());
            let window = tokens[start..end].to_vec();

            match self.encoding.decode(window) {
                Ok(content) => chunks.push(TextChunk::new(content, metadata.clone())),
                Err(e) => {
                    // A window produced by encode_ordinary always decodes;
                    // anything else is a tokenizer bug worth surfacing.
                    tracing::warn!(target: "retrieval", "failed to decode token window at {start}: {e}");
                }
            }

            start += step;
        }

        chunks
    }

    /// Split a file into chunks, attaching `source` and `filename` metadata.
    ///
    /// Returns `None` when the file cannot be loaded.
    pub fn split_file(&self, path: &Path) -> Option<Vec<TextChunk>> {
        let text = self.load(path)?;

        let mut metadata = HashMap::new();
        metadata.insert("source".to_string(), path.display().to_string());
        metadata.insert(
            "filename".to_string(),
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );

        Some(self.split(&text, &metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize, overlap: usize) -> DocumentChunker {
        DocumentChunker::new(size, overlap).unwrap()
    }

    #[test]
    fn test_rejects_overlap_not_below_size() {
        assert!(matches!(
            DocumentChunker::new(100, 100),
            Err(ChunkerError::InvalidConfig { .. })
        ));
        assert!(matches!(
            DocumentChunker::new(100, 150),
            Err(ChunkerError::InvalidConfig { .. })
        ));
        assert!(matches!(
            DocumentChunker::new(0, 0),
            Err(ChunkerError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunker = chunker(100, 20);
        assert!(chunker.split("", &HashMap::new()).is_empty());
    }

    #[test]
    fn test_short_text_yields_single_chunk() {
        let chunker = chunker(100, 20);
        let chunks = chunker.split("hello world", &HashMap::new());

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "hello world");
    }

    #[test]
    fn test_window_count_matches_step_formula() {
        let chunker = chunker(50, 10);
        let text = "the quick brown fox jumps over the lazy dog ".repeat(40);

        let token_count = chunker.encoding.encode_ordinary(&text).len();
        let chunks = chunker.split(&text, &HashMap::new());

        // Window starts at 0, step, 2*step, ... while start < token_count.
        let step = 50 - 10;
        assert_eq!(chunks.len(), token_count.div_ceil(step));
    }

    #[test]
    fn test_split_is_deterministic() {
        let chunker = chunker(30, 5);
        let text = "one two three four five six seven eight nine ten ".repeat(20);

        let first = chunker.split(&text, &HashMap::new());
        let second = chunker.split(&text, &HashMap::new());

        assert_eq!(first, second);
    }

    #[test]
    fn test_adjacent_windows_overlap() {
        let chunker = chunker(20, 8);
        let text = "alpha beta gamma delta epsilon zeta eta theta ".repeat(10);
        let chunks = chunker.split(&text, &HashMap::new());

        assert!(chunks.len() > 1, "text should span multiple windows");

        // Each window starts chunk_size - chunk_overlap tokens after the
        // previous one, so the tail of chunk N reappears at the head of N+1.
        let tokens = chunker.encoding.encode_ordinary(&text);
        for (i, window) in chunks.windows(2).enumerate() {
            let start = (i + 1) * 12;
            let overlap_tokens = tokens[start..(start + 8).min(tokens.len())].to_vec();
            let overlap_text = chunker.encoding.decode(overlap_tokens).unwrap();
            assert!(window[1].content.starts_with(&overlap_text));
            assert!(window[0].content.ends_with(&overlap_text));
        }
    }

    #[test]
    fn test_metadata_attached_to_every_chunk() {
        let chunker = chunker(20, 5);
        let mut metadata = HashMap::new();
        metadata.insert("source".to_string(), "notes.txt".to_string());

        let text = "word ".repeat(100);
        let chunks = chunker.split(&text, &metadata);

        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert_eq!(chunk.metadata.get("source").unwrap(), "notes.txt");
        }
    }

    #[test]
    fn test_load_missing_file_returns_none() {
        let chunker = chunker(100, 20);
        assert!(chunker.load(Path::new("/no/such/file.txt")).is_none());
    }

    #[test]
    fn test_chunk_preview_respects_char_boundaries() {
        let chunk = TextChunk::new("héllo wörld".to_string(), HashMap::new());
        assert_eq!(chunk.preview(5), "héllo");
        assert_eq!(chunk.preview(100), "héllo wörld");
    }
}
