//! Retrieval-augmented context engine.
//!
//! This module provides:
//! - Token-window document chunking
//! - Local embedding generation with lazy model loading
//! - Exact L2 nearest-neighbor search over indexed chunks
//! - Ingestion/query orchestration with snapshot persistence

pub mod chunker;
pub mod embedding;
pub mod index;
pub mod service;

pub use chunker::{ChunkerError, DocumentChunker, TextChunk};
pub use embedding::{EmbeddingError, EmbeddingProvider, FastEmbedProvider, InitNotify};
pub use index::{IndexError, VectorIndex};
pub use service::{DEFAULT_TOP_K, RetrievalError, RetrievalService, SearchResult};

use crate::config::Settings;

/// Build a retrieval service from settings.
///
/// Returns `None` when retrieval is disabled or the configuration is
/// unusable; the chat loop then runs without context injection. `notify`
/// fires before the first blocking model initialization.
pub fn from_settings(settings: &Settings, notify: InitNotify) -> Option<RetrievalService> {
    if !settings.retrieval.enabled {
        tracing::debug!(target: "retrieval", "retrieval disabled in settings");
        return None;
    }

    if let Err(e) = settings.retrieval.validate() {
        tracing::warn!(target: "retrieval", "invalid retrieval config: {e}");
        return None;
    }

    let chunker =
        match DocumentChunker::new(settings.retrieval.chunk_size, settings.retrieval.chunk_overlap)
        {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(target: "retrieval", "failed to create chunker: {e}");
                return None;
            }
        };

    let provider = match FastEmbedProvider::new(&settings.retrieval.model, settings.models_dir()) {
        Ok(p) => p.with_init_notify(notify),
        Err(e) => {
            tracing::warn!(target: "retrieval", "failed to create embedding provider: {e}");
            return None;
        }
    };

    if provider.dimension() != settings.retrieval.dimension {
        tracing::warn!(
            target: "retrieval",
            "model {} produces {} dimensions but retrieval.dimension is {}; update the config",
            settings.retrieval.model,
            provider.dimension(),
            settings.retrieval.dimension
        );
    }

    Some(RetrievalService::new(
        chunker,
        Box::new(provider),
        settings.retrieval.dimension,
        settings.vectorstore_dir(),
    ))
}
