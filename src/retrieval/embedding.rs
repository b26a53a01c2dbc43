//! Embedding generation for chunks and queries.
//!
//! The same provider instance embeds both ingested chunks and query text, so
//! every vector in the index lives in one embedding space. The fastembed
//! model is loaded lazily on first use: a chat session that never touches
//! retrieval never pays the model load (or first-run download).

use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use thiserror::Error;

/// Errors from embedding operations.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("failed to initialize embedding model: {0}")]
    ModelInit(String),

    #[error("failed to generate embeddings: {0}")]
    Inference(String),

    #[error("unknown embedding model: {0}")]
    UnknownModel(String),
}

/// Notification fired right before a blocking model initialization.
///
/// First use may download model weights; the host uses this to tell the user
/// what the pause is before it happens.
pub type InitNotify = Box<dyn Fn(&str) + Send + Sync>;

/// Maps batches of text to fixed-dimension vectors.
///
/// Batch semantics are all-or-nothing: on failure no partial results are
/// returned, so callers can treat a batch as a unit of commit.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed all texts in one model invocation.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Output vector dimension.
    fn dimension(&self) -> usize;

    /// Model identifier, for logs and diagnostics.
    fn model_name(&self) -> &str;
}

/// Embedding provider backed by a local fastembed ONNX model.
///
/// Hardware acceleration follows the ONNX Runtime execution providers the
/// binary was built with (see the gpu-* notes in Cargo.toml); without an
/// accelerator the runtime falls back to CPU rather than failing.
pub struct FastEmbedProvider {
    model_kind: EmbeddingModel,
    model_name: String,
    dimension: usize,
    cache_dir: PathBuf,
    /// Lazily created on first embed call.
    model: Mutex<Option<TextEmbedding>>,
    on_init: Option<InitNotify>,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model", &self.model_name)
            .field("dimension", &self.dimension)
            .field("cache_dir", &self.cache_dir)
            .field(
                "initialized",
                &self.model.lock().map(|m| m.is_some()).unwrap_or(false),
            )
            .finish()
    }
}

impl FastEmbedProvider {
    /// Create a provider for a named model without loading it.
    ///
    /// The dimension comes from fastembed's model registry so the vector
    /// index can be sized before the model itself exists.
    pub fn new(model_name: &str, cache_dir: impl Into<PathBuf>) -> Result<Self, EmbeddingError> {
        let model_kind = model_from_name(model_name)?;
        let dimension = TextEmbedding::get_model_info(&model_kind)
            .map_err(|e| EmbeddingError::ModelInit(e.to_string()))?
            .dim;

        Ok(Self {
            model_kind,
            model_name: model_name.to_string(),
            dimension,
            cache_dir: cache_dir.into(),
            model: Mutex::new(None),
            on_init: None,
        })
    }

    /// Register a callback fired before the first (blocking) model load.
    pub fn with_init_notify(mut self, notify: InitNotify) -> Self {
        self.on_init = Some(notify);
        self
    }

    /// Whether the underlying model has been loaded yet.
    pub fn is_initialized(&self) -> bool {
        self.model.lock().map(|m| m.is_some()).unwrap_or(false)
    }

    /// Build init options, registering the most capable execution provider
    /// the binary was compiled for. ONNX Runtime degrades to CPU on its own
    /// when a registered accelerator is not actually present.
    fn init_options(&self) -> InitOptions {
        let options = InitOptions::new(self.model_kind.clone())
            .with_cache_dir(self.cache_dir.clone())
            .with_show_download_progress(true);

        #[cfg(feature = "gpu-cuda")]
        let options = {
            use ort::execution_providers::CUDAExecutionProvider;
            options.with_execution_providers(vec![CUDAExecutionProvider::default().build()])
        };

        #[cfg(feature = "gpu-coreml")]
        let options = {
            use ort::execution_providers::CoreMLExecutionProvider;
            options.with_execution_providers(vec![
                CoreMLExecutionProvider::default().with_subgraphs(true).build(),
            ])
        };

        options
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut guard = self
            .model
            .lock()
            .map_err(|_| EmbeddingError::Inference("model lock poisoned".to_string()))?;

        if guard.is_none() {
            if let Some(notify) = &self.on_init {
                notify(&self.model_name);
            }
            tracing::info!(
                target: "retrieval",
                "initializing embedding model {} (first use may download weights)",
                self.model_name
            );

            let model = TextEmbedding::try_new(self.init_options())
                .map_err(|e| EmbeddingError::ModelInit(e.to_string()))?;

            tracing::info!(
                target: "retrieval",
                "embedding model ready: {} ({} dimensions)",
                self.model_name,
                self.dimension
            );
            *guard = Some(model);
        }

        let model = guard.as_mut().expect("model initialized above");

        let embeddings = model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(EmbeddingError::Inference(format!(
                    "model returned {} dimensions, expected {}",
                    embedding.len(),
                    self.dimension
                )));
            }
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Resolve a configured model name to a fastembed model.
fn model_from_name(name: &str) -> Result<EmbeddingModel, EmbeddingError> {
    match name {
        "AllMiniLML6V2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "AllMiniLML6V2Q" => Ok(EmbeddingModel::AllMiniLML6V2Q),
        "AllMiniLML12V2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "BGESmallENV15" => Ok(EmbeddingModel::BGESmallENV15),
        "BGEBaseENV15" => Ok(EmbeddingModel::BGEBaseENV15),
        "ParaphraseMLMiniLML12V2" => Ok(EmbeddingModel::ParaphraseMLMiniLML12V2),
        other => Err(EmbeddingError::UnknownModel(other.to_string())),
    }
}
