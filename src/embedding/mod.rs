//! Embedding provider abstraction and implementations.
//!
//! This module defines the interface for turning query text into a dense
//! vector and provides a local implementation backed by fastembed.
//!
//! The abstraction lets the pipeline swap encoders without touching retrieval,
//! assembly or layout, and lets tests substitute a deterministic provider.

pub mod fastembed;

use async_trait::async_trait;
use thiserror::Error;

/// Maximum number of tokens fed to the encoder; longer input is truncated.
pub const MAX_INPUT_TOKENS: usize = 512;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The encoder failed while running inference
    #[error("Inference failed: {0}")]
    InferenceError(String),

    /// Configuration error (e.g., model cannot be loaded)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The encoder produced a vector of unexpected length
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Result type for embedding operations.
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Trait for text embedding providers.
///
/// Implementors are loaded once at startup and then shared read-only across
/// queries, so they must be `Send + Sync`.
///
/// # Example Usage
/// ```ignore
/// let provider = FastEmbedProvider::new(None, None)?;
/// let vector = provider.embed("reaction-diffusion neural networks").await?;
/// assert_eq!(vector.len(), provider.dimension());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for the given text.
    ///
    /// Any text is accepted, including the empty string. Input beyond
    /// [`MAX_INPUT_TOKENS`] tokens is truncated.
    ///
    /// # Returns
    /// A vector of exactly [`dimension()`](Self::dimension) values
    ///
    /// # Errors
    /// Returns `EmbeddingError` if inference fails
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>>;

    /// Get the dimension of embeddings produced by this provider.
    fn dimension(&self) -> usize;

    /// Get the model name/identifier for this provider.
    fn model_name(&self) -> &str;
}

/// Check that an encoder output has the expected length.
///
/// # Errors
/// Returns `EmbeddingError::DimensionMismatch` when the lengths differ
pub fn ensure_dimension(vector: Vec<f32>, expected: usize) -> EmbeddingResult<Vec<f32>> {
    if vector.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_dimension() {
        assert_eq!(ensure_dimension(vec![0.0; 4], 4).unwrap().len(), 4);

        match ensure_dimension(vec![0.0; 3], 4) {
            Err(EmbeddingError::DimensionMismatch { expected, actual }) => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 3);
            }
            other => panic!("Expected DimensionMismatch, got {:?}", other),
        }
    }
}
