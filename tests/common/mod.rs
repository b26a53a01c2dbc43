//! Shared test fixtures.

use termchat::retrieval::{EmbeddingError, EmbeddingProvider};

/// Deterministic embedding stub: byte histogram folded into a fixed-length
/// vector. Identical text always embeds to the identical vector, so an
/// ingested chunk queried with its own text sits at distance zero.
pub struct StubProvider {
    pub dimension: usize,
}

impl StubProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
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
