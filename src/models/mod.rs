//! Core data models for the paper recommendation pipeline.
//!
//! This module contains the data structures handed from one pipeline stage to
//! the next: index matches, assembled paper records, and query failures.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata key holding the paper title.
pub const META_TITLE: &str = "title";

/// Metadata key holding the paper URL.
pub const META_URL: &str = "url";

/// Metadata key holding the institution (school) the paper belongs to.
pub const META_INSTITUTION: &str = "school";

/// Metadata key holding the identifier used by the label tables.
pub const META_ID: &str = "id";

/// Title used when a match carries no title metadata.
pub const UNTITLED: &str = "Untitled";

/// URL used when a match carries no URL metadata.
pub const NO_URL: &str = "#";

/// Institution used when a match carries no institution metadata.
pub const UNKNOWN_INSTITUTION: &str = "Unknown";

/// One candidate returned by the vector index.
///
/// Matches are produced by an [`IndexClient`](crate::index::IndexClient) and
/// never modified afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Match {
    /// Vector identifier inside the index
    pub id: String,

    /// Similarity score computed by the index (higher is more similar)
    pub score: f32,

    /// Arbitrary metadata stored alongside the vector
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Match {
    /// Create a match without metadata.
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
            metadata: Map::new(),
        }
    }

    /// Builder-style helper that adds a string metadata field.
    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata
            .insert(key.to_string(), Value::String(value.into()));
        self
    }

    /// Get a metadata field if it is present and holds a string.
    ///
    /// Non-string values (numbers, lists) are ignored rather than stringified,
    /// so callers can rely on the default for anything that is not text.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Identifier to use for label lookups.
    ///
    /// Paper vectors carry their own `id` in metadata; the vector id is only a
    /// fallback for indexes that were populated without it.
    pub fn label_key(&self) -> &str {
        self.metadata_str(META_ID).unwrap_or(&self.id)
    }
}

/// A paper ready for display.
///
/// Records are owned by the recommendation assembler and read-only for every
/// stage after it. The `rank` always reflects the true similarity order, even
/// after the display order has been shuffled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaperRecord {
    /// Identifier of the paper (label lookup key)
    pub id: String,

    /// Paper title
    pub title: String,

    /// Link to the paper
    pub url: String,

    /// Institution the paper is associated with
    pub institution: String,

    /// 0-based similarity rank, 0 is the most related paper
    pub rank: usize,

    /// Similarity score reported by the index
    pub score: f32,

    /// Predicted class label, absent when no table knows the paper
    pub class_label: Option<String>,
}

/// Which stage a failed query broke in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The query text could not be embedded
    Embedding,

    /// The vector index could not be queried
    Retrieval,
}

/// Reason attached to a query that degraded to an empty result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryFailure {
    /// Failing stage
    pub kind: FailureKind,

    /// Human-readable error message
    pub message: String,
}

impl QueryFailure {
    pub fn retrieval(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Retrieval,
            message: message.into(),
        }
    }

    pub fn embedding(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Embedding,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for QueryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            FailureKind::Embedding => write!(f, "no results, reason: embedding failed ({})", self.message),
            FailureKind::Retrieval => write!(f, "no results, reason: retrieval failed ({})", self.message),
        }
    }
}
