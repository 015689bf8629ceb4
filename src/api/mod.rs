//! Request and response payloads.
//!
//! These are the JSON shapes exchanged with whatever sits in front of the
//! pipeline (the CLI's JSON output, a web UI). They flatten the internal
//! types into what a renderer needs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{PaperRecord, QueryFailure};
use crate::query::{QueryResult, RecommendQuery, Recommendation, DEFAULT_BOOST, DEFAULT_TOP_K};

/// Payload for a recommendation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendRequest {
    /// The query text
    #[serde(default)]
    pub query: String,

    /// Number of papers to return (default: 10)
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Query repetition factor (default: 1)
    #[serde(default = "default_boost")]
    pub boost: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_boost() -> usize {
    DEFAULT_BOOST
}

impl RecommendRequest {
    /// Validate the request and convert it to a query.
    ///
    /// # Errors
    /// Returns `QueryError::InvalidQuery` if `top_k` or `boost` is out of range
    pub fn to_query(&self) -> QueryResult<RecommendQuery> {
        RecommendQuery::new(self.query.clone(), Some(self.top_k), Some(self.boost))
    }
}

/// Response payload for a recommendation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendResponse {
    /// The original query text
    pub query: String,

    /// Number of papers returned
    pub count: usize,

    /// Failure reason for a degraded (empty) result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<QueryFailure>,

    /// Papers sorted by rank (most related first)
    pub results: Vec<PaperRecordDto>,

    /// Cytoscape elements for a preset layout, in display order
    pub elements: Vec<Value>,
}

impl From<Recommendation> for RecommendResponse {
    fn from(recommendation: Recommendation) -> Self {
        let elements = recommendation.graph.to_cytoscape();

        let mut results: Vec<PaperRecordDto> = recommendation
            .records
            .into_iter()
            .map(PaperRecordDto::from)
            .collect();
        results.sort_by_key(|r| r.rank);

        Self {
            query: recommendation.query,
            count: results.len(),
            failure: recommendation.failure,
            results,
            elements,
        }
    }
}

/// Data transfer object for a single recommended paper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaperRecordDto {
    /// 1-based rank as shown to users
    pub rank: usize,

    pub title: String,
    pub url: String,
    pub institution: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_label: Option<String>,

    /// Similarity score reported by the index
    pub score: f32,
}

impl From<PaperRecord> for PaperRecordDto {
    fn from(record: PaperRecord) -> Self {
        Self {
            rank: record.rank + 1,
            title: record.title,
            url: record.url,
            institution: record.institution,
            class_label: record.class_label,
            score: record.score,
        }
    }
}
