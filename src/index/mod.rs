//! Vector index client abstraction and implementations.
//!
//! The vector index is an external service that was populated ahead of time
//! with one vector per paper. This module only queries it: given an embedding,
//! it returns the nearest papers with their metadata.
//!
//! Each call is a single attempt. Callers that want retries or a deadline wrap
//! [`IndexClient::query`] themselves; it is the only call in the pipeline that
//! leaves the process.

pub mod pinecone;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Match;

/// Errors that can occur while querying the vector index.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The service could not be reached (connection, TLS, timeout)
    #[error("Index service unreachable: {0}")]
    Network(String),

    /// The service answered with a non-success status
    #[error("Index service returned {status}: {body}")]
    Service { status: u16, body: String },

    /// The response body could not be decoded
    #[error("Malformed index response: {0}")]
    MalformedResponse(String),

    /// The request was rejected before being sent
    #[error("Invalid index request: {0}")]
    InvalidRequest(String),
}

/// Result type for retrieval operations.
pub type RetrievalResult<T> = Result<T, RetrievalError>;

/// Trait for nearest-neighbour index clients.
///
/// Implementations are created once at startup (credential problems surface
/// there) and are shared read-only across queries.
#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Find the `top_k` vectors closest to `vector`.
    ///
    /// # Arguments
    /// * `vector` - Query embedding; must match the index dimensionality
    /// * `top_k` - Maximum number of matches to return (at least 1)
    ///
    /// # Returns
    /// Up to `top_k` matches ordered by decreasing similarity score, each with
    /// its stored metadata
    ///
    /// # Errors
    /// Returns `RetrievalError` if the request is invalid, the service is
    /// unavailable, or the response cannot be decoded
    async fn query(&self, vector: &[f32], top_k: usize) -> RetrievalResult<Vec<Match>>;

    /// Human-readable name of the index, used in logs.
    fn name(&self) -> &str;
}

/// Validate query arguments shared by all index clients.
///
/// # Errors
/// Returns `RetrievalError::InvalidRequest` for an empty vector, `top_k == 0`,
/// or a vector whose length differs from `expected_dimension` (when known)
pub fn validate_query(vector: &[f32], top_k: usize, expected_dimension: Option<usize>) -> RetrievalResult<()> {
    if vector.is_empty() {
        return Err(RetrievalError::InvalidRequest("query vector is empty".to_string()));
    }
    if top_k == 0 {
        return Err(RetrievalError::InvalidRequest("top_k must be at least 1".to_string()));
    }
    if let Some(expected) = expected_dimension {
        if vector.len() != expected {
            return Err(RetrievalError::InvalidRequest(format!(
                "query vector has {} dimensions, index expects {}",
                vector.len(),
                expected
            )));
        }
    }
    Ok(())
}

/// Cap matches at `top_k`, keeping the order the service returned.
///
/// The service order is the similarity order. Scores are not comparable
/// across metrics (a euclidean index reports distances, smallest first), so
/// they are never used to reorder.
pub fn take_top(mut matches: Vec<Match>, top_k: usize) -> Vec<Match> {
    matches.truncate(top_k);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_query() {
        assert!(validate_query(&[0.1, 0.2], 3, None).is_ok());
        assert!(validate_query(&[0.1, 0.2], 3, Some(2)).is_ok());
        assert!(matches!(
            validate_query(&[], 3, None),
            Err(RetrievalError::InvalidRequest(_))
        ));
        assert!(matches!(
            validate_query(&[0.1], 0, None),
            Err(RetrievalError::InvalidRequest(_))
        ));
        assert!(matches!(
            validate_query(&[0.1, 0.2], 3, Some(768)),
            Err(RetrievalError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_take_top_keeps_service_order() {
        // Distance scores: nearest first, ascending.
        let matches = vec![
            Match::new("nearest", 0.1),
            Match::new("middle", 0.5),
            Match::new("farther", 0.9),
            Match::new("farthest", 1.4),
        ];

        let top = take_top(matches, 3);
        let ids: Vec<&str> = top.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["nearest", "middle", "farther"]);
    }

    #[test]
    fn test_take_top_with_fewer_matches() {
        let top = take_top(vec![Match::new("only", 0.3)], 10);
        assert_eq!(top.len(), 1);
    }
}
