//! Embedding provider boundary (§4.9).
//!
//! `EmbeddingProvider` is the pure `text -> vector` seam between the
//! vector store and whatever inference backend produces the numbers.
//! The default backend (behind the `embeddings` feature) runs a local
//! ONNX model through `fastembed`; tests use [`StaticEmbeddingProvider`]
//! so vector-search behavior is exercised without loading a model.

use crate::error::EmbeddingError;

/// Matryoshka-truncated dimensionality for a named embedding model.
/// `nomic-embed-text-v1.5` natively emits 768 dimensions but supports
/// truncation; we keep the first 256 and re-normalize, trading a small
/// amount of recall for a smaller on-disk index.
pub fn vector_dims_for_model(model_name: &str) -> usize {
    match model_name {
        "nomic-embed-text-v1.5" => 256,
        _ => 256,
    }
}

/// Text-to-vector inference boundary.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
    fn dimensions(&self) -> usize;
}

fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}

fn truncate_and_renormalize(full: Vec<f32>, dims: usize) -> Vec<f32> {
    let mut truncated: Vec<f32> = full.into_iter().take(dims).collect();
    truncated.resize(dims, 0.0);
    l2_normalize(truncated)
}

#[cfg(feature = "embeddings")]
mod local {
    use std::sync::Mutex;

    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

    use super::{truncate_and_renormalize, vector_dims_for_model, EmbeddingProvider};
    use crate::error::EmbeddingError;

    /// Local ONNX inference via `fastembed`, truncated to
    /// [`vector_dims_for_model`]'s dimensionality. `TextEmbedding` isn't
    /// `Sync` on its own internal session state across calls, so access
    /// is serialized behind a mutex the same way the lexical store
    /// serializes writer access.
    pub struct LocalEmbeddingProvider {
        model: Mutex<TextEmbedding>,
        dims: usize,
    }

    impl LocalEmbeddingProvider {
        pub fn new() -> Result<Self, EmbeddingError> {
            let model_name = "nomic-embed-text-v1.5";
            let model = TextEmbedding::try_new(
                InitOptions::new(EmbeddingModel::NomicEmbedTextV15).with_show_download_progress(false),
            )
            .map_err(|e| EmbeddingError::ModelInit(e.to_string()))?;
            Ok(Self {
                model: Mutex::new(model),
                dims: vector_dims_for_model(model_name),
            })
        }
    }

    impl EmbeddingProvider for LocalEmbeddingProvider {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let mut model = self
                .model
                .lock()
                .map_err(|_| EmbeddingError::Inference("embedding model lock poisoned".into()))?;
            let mut vectors = model
                .embed(vec![text.to_string()], None)
                .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
            let full = vectors.pop().ok_or_else(|| {
                EmbeddingError::Inference("model returned no embedding for input".into())
            })?;
            Ok(truncate_and_renormalize(full, self.dims))
        }

        fn dimensions(&self) -> usize {
            self.dims
        }
    }
}

#[cfg(feature = "embeddings")]
pub use local::LocalEmbeddingProvider;

/// Deterministic test double: hashes the input text into a fixed-size
/// vector so store/search round trips are exercisable without a model.
/// Texts that share a prefix up to the hash granularity will not
/// generally collide, but this makes no semantic-similarity promises —
/// it exists purely to exercise the vector-store plumbing.
pub struct StaticEmbeddingProvider {
    dims: usize,
}

impl StaticEmbeddingProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl Default for StaticEmbeddingProvider {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EmbeddingProvider for StaticEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut v = vec![0.0f32; self.dims];
        for (i, byte) in text.bytes().enumerate() {
            let idx = i % self.dims;
            v[idx] += (byte as f32) / 255.0;
        }
        Ok(l2_normalize(v))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_provider_is_deterministic() {
        let p = StaticEmbeddingProvider::new(16);
        assert_eq!(p.embed("hello world").unwrap(), p.embed("hello world").unwrap());
    }

    #[test]
    fn static_provider_respects_requested_dimensions() {
        let p = StaticEmbeddingProvider::new(32);
        assert_eq!(p.embed("anything").unwrap().len(), 32);
        assert_eq!(p.dimensions(), 32);
    }

    #[test]
    fn static_provider_differs_across_distinct_text() {
        let p = StaticEmbeddingProvider::new(16);
        assert_ne!(p.embed("alpha").unwrap(), p.embed("beta").unwrap());
    }

    #[test]
    fn vector_is_unit_normalized() {
        let p = StaticEmbeddingProvider::new(16);
        let v = p.embed("some text to embed").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4 || norm == 0.0);
    }

    #[test]
    fn nomic_model_truncates_to_256() {
        assert_eq!(vector_dims_for_model("nomic-embed-text-v1.5"), 256);
    }
}
