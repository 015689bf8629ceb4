//! FastEmbed embedding provider implementation.
//!
//! This module provides an implementation of the `EmbeddingProvider` trait
//! using the fastembed library for local ONNX inference.
//!
//! The default model is multilingual so that Japanese abstracts and queries
//! land in the same space as English ones. The tokenizer truncates input to
//! [`MAX_INPUT_TOKENS`] and pads the batch, so any text length is accepted.

use super::{ensure_dimension, EmbeddingError, EmbeddingProvider, EmbeddingResult, MAX_INPUT_TOKENS};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Model used when none is requested.
pub const DEFAULT_MODEL: EmbeddingModel = EmbeddingModel::MultilingualE5Base;

/// Output dimension of a fastembed model.
///
/// # Errors
/// Returns `EmbeddingError::ConfigError` for a model whose dimension is not
/// known, instead of guessing one
pub fn dimension_for_model(model: &EmbeddingModel) -> EmbeddingResult<usize> {
    match model {
        EmbeddingModel::AllMiniLML6V2 => Ok(384),
        EmbeddingModel::BGESmallENV15 => Ok(384),
        EmbeddingModel::BGEBaseENV15 => Ok(768),
        EmbeddingModel::BGELargeENV15 => Ok(1024),
        EmbeddingModel::MultilingualE5Small => Ok(384),
        EmbeddingModel::MultilingualE5Base => Ok(768),
        EmbeddingModel::MultilingualE5Large => Ok(1024),
        EmbeddingModel::ParaphraseMLMiniLML12V2 => Ok(384),
        EmbeddingModel::ParaphraseMLMpnetBaseV2 => Ok(768),
        other => Err(EmbeddingError::ConfigError(format!(
            "unsupported embedding model {:?}: output dimension unknown",
            other
        ))),
    }
}

/// Local embedding provider backed by fastembed.
///
/// The model is loaded once in [`FastEmbedProvider::new`]. Inference needs
/// mutable access to the ONNX session, so the model sits behind an async
/// mutex; clones share the same loaded model.
#[derive(Clone)]
pub struct FastEmbedProvider {
    /// The loaded model (wrapped in Arc<Mutex> for shared use)
    model: Arc<Mutex<TextEmbedding>>,

    /// Model identifier
    model_name: String,

    /// Expected dimension of the embedding vectors
    embedding_dimension: usize,
}

impl FastEmbedProvider {
    /// Load a fastembed model.
    ///
    /// # Arguments
    /// * `model` - Optional model to use (defaults to [`DEFAULT_MODEL`])
    /// * `cache_dir` - Optional cache directory for model files
    ///
    /// # Errors
    /// Returns `EmbeddingError::ConfigError` if the model is unsupported or
    /// cannot be loaded
    pub fn new(model: Option<EmbeddingModel>, cache_dir: Option<PathBuf>) -> EmbeddingResult<Self> {
        let model_type = model.unwrap_or(DEFAULT_MODEL);
        let model_name = format!("{:?}", model_type);
        let embedding_dimension = dimension_for_model(&model_type)?;

        let mut init_options = InitOptions::new(model_type)
            .with_max_length(MAX_INPUT_TOKENS)
            .with_show_download_progress(false);
        if let Some(dir) = cache_dir {
            debug!("Using fastembed cache directory: {}", dir.display());
            init_options = init_options.with_cache_dir(dir);
        }

        let text_embedding = TextEmbedding::try_new(init_options).map_err(|e| {
            EmbeddingError::ConfigError(format!("Failed to initialize FastEmbed model {}: {}", model_name, e))
        })?;

        Ok(Self {
            model: Arc::new(Mutex::new(text_embedding)),
            model_name,
            embedding_dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        let mut model = self.model.lock().await;

        let embeddings = model
            .embed(vec![text.to_string()], None)
            .map_err(|e| EmbeddingError::InferenceError(e.to_string()))?;

        let vector = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InferenceError("No embedding generated".to_string()))?;

        ensure_dimension(vector, self.embedding_dimension)
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

// TextEmbedding does not implement Debug
impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model_name", &self.model_name)
            .field("embedding_dimension", &self.embedding_dimension)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_provider() -> FastEmbedProvider {
        FastEmbedProvider::new(Some(EmbeddingModel::MultilingualE5Small), None)
            .expect("Failed to load MultilingualE5Small")
    }

    #[test]
    fn test_default_model_dimension() {
        assert_eq!(dimension_for_model(&DEFAULT_MODEL).unwrap(), 768);
        assert_eq!(dimension_for_model(&EmbeddingModel::MultilingualE5Small).unwrap(), 384);
        assert_eq!(dimension_for_model(&EmbeddingModel::BGELargeENV15).unwrap(), 1024);
    }

    #[test]
    fn test_unlisted_model_is_rejected() {
        let result = dimension_for_model(&EmbeddingModel::NomicEmbedTextV1);
        assert!(matches!(result, Err(EmbeddingError::ConfigError(_))));

        // Rejected before any download is attempted.
        let result = FastEmbedProvider::new(Some(EmbeddingModel::NomicEmbedTextV1), None);
        assert!(matches!(result, Err(EmbeddingError::ConfigError(_))));
    }

    #[tokio::test]
    #[ignore = "downloads model weights"]
    async fn test_embed_has_fixed_dimension() {
        let provider = create_test_provider();
        let long_text = "生物の脳神経ネットワークにおける情報処理。".repeat(400);

        for text in ["", "DNA computing", long_text.as_str()] {
            let embedding = provider.embed(text).await.unwrap();
            assert_eq!(embedding.len(), provider.dimension());
            assert!(embedding.iter().all(|x| x.is_finite()));
        }
    }

    #[tokio::test]
    #[ignore = "downloads model weights"]
    async fn test_embed_consistency() {
        let provider = create_test_provider();
        let first = provider.embed("Consistency test text").await.unwrap();
        let second = provider.embed("Consistency test text").await.unwrap();
        assert_eq!(first, second, "Same text should produce identical embeddings");
    }

    #[test]
    #[ignore = "downloads model weights"]
    fn test_debug_implementation() {
        let provider = create_test_provider();
        let debug_str = format!("{:?}", provider);
        assert!(debug_str.contains("FastEmbedProvider"));
        assert!(debug_str.contains("MultilingualE5Small"));
    }
}
