//! Query processing: the end-to-end recommendation pipeline.
//!
//! A [`Recommender`] is built once at startup from an embedding provider, an
//! index client, the label tables and the layout settings. After that it is
//! read-only and can serve any number of queries, concurrently if wrapped in
//! an `Arc`. Every query gets freshly allocated vectors, matches, records and
//! layout.
//!
//! # Usage
//!
//! ```rust,no_run
//! use paper_radar::config::AppConfig;
//! use paper_radar::query::{RecommendQuery, Recommender};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::from_env()?;
//! let recommender = Recommender::from_config(&config).await?;
//!
//! let query = RecommendQuery::new("DNA computing".to_string(), Some(10), Some(1))?;
//! let recommendation = recommender.recommend(&query).await;
//!
//! if let Some(failure) = &recommendation.failure {
//!     eprintln!("{}", failure);
//! }
//! for node in &recommendation.graph.nodes {
//!     println!("#{} {} at ({:.1}, {:.1})", node.record.rank + 1, node.label, node.position.x, node.position.y);
//! }
//! # Ok(())
//! # }
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, ConfigError, ConfigResult};
use crate::embedding::fastembed::FastEmbedProvider;
use crate::embedding::EmbeddingProvider;
use crate::index::pinecone::PineconeClient;
use crate::index::IndexClient;
use crate::labels::LabelResolver;
use crate::layout::{layout, LayoutConfig, RadialGraph};
use crate::models::{PaperRecord, QueryFailure};
use crate::recommend::assemble_shuffled;

pub const DEFAULT_TOP_K: usize = 10;
pub const MAX_TOP_K: usize = 50;
pub const DEFAULT_BOOST: usize = 1;
pub const MAX_BOOST: usize = 5;

/// Errors raised for invalid query parameters.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Parameters out of range
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Parameters of a single recommendation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendQuery {
    /// Raw query text (may be empty)
    pub text: String,

    /// Number of papers to retrieve, 1..=50
    pub top_k: usize,

    /// How many times the text is repeated before embedding, 1..=5
    pub boost: usize,
}

impl RecommendQuery {
    /// Create a new query.
    ///
    /// # Arguments
    /// * `text` - The query text
    /// * `top_k` - Number of results (default: 10)
    /// * `boost` - Repetition factor (default: 1)
    ///
    /// # Errors
    /// Returns `QueryError::InvalidQuery` if `top_k` or `boost` is out of range
    pub fn new(text: String, top_k: Option<usize>, boost: Option<usize>) -> QueryResult<Self> {
        let top_k = top_k.unwrap_or(DEFAULT_TOP_K);
        let boost = boost.unwrap_or(DEFAULT_BOOST);

        if !(1..=MAX_TOP_K).contains(&top_k) {
            return Err(QueryError::InvalidQuery(format!(
                "top_k must be between 1 and {}, got {}",
                MAX_TOP_K, top_k
            )));
        }
        if !(1..=MAX_BOOST).contains(&boost) {
            return Err(QueryError::InvalidQuery(format!(
                "boost must be between 1 and {}, got {}",
                MAX_BOOST, boost
            )));
        }

        Ok(Self { text, top_k, boost })
    }

    /// The text actually embedded: `text` repeated `boost` times.
    ///
    /// Repetition shifts weight towards the query's own terms once the
    /// encoder truncates long input.
    pub fn boosted_text(&self) -> String {
        self.text.repeat(self.boost)
    }
}

/// Outcome of one recommendation request.
///
/// A failed query still produces a graph (the center node alone) together
/// with the failure reason.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    /// Query text as entered (without boost)
    pub query: String,

    /// Records in display (shuffled) order
    pub records: Vec<PaperRecord>,

    /// Radial layout of `records`
    pub graph: RadialGraph,

    /// Why the result is empty, if it failed
    pub failure: Option<QueryFailure>,
}

impl Recommendation {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Shared, immutable recommendation context.
pub struct Recommender<E, I>
where
    E: EmbeddingProvider,
    I: IndexClient,
{
    /// Encoder for query text
    embedding_provider: E,

    /// Vector index holding the papers
    index: I,

    /// Class label tables
    labels: LabelResolver,

    /// Radial layout settings
    layout: LayoutConfig,
}

impl<E, I> Recommender<E, I>
where
    E: EmbeddingProvider,
    I: IndexClient,
{
    /// Assemble a recommender from already-initialised parts.
    pub fn new(embedding_provider: E, index: I, labels: LabelResolver, layout: LayoutConfig) -> Self {
        Self {
            embedding_provider,
            index,
            labels,
            layout,
        }
    }

    pub fn embedding_provider(&self) -> &E {
        &self.embedding_provider
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn labels(&self) -> &LabelResolver {
        &self.labels
    }

    pub fn layout_config(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Run a query with a freshly seeded display shuffle.
    pub async fn recommend(&self, query: &RecommendQuery) -> Recommendation {
        let mut rng = StdRng::from_entropy();
        self.recommend_with_rng(query, &mut rng).await
    }

    /// Run a query, shuffling display order with `rng`.
    ///
    /// Embedding and retrieval failures do not propagate: they come back as
    /// an empty recommendation with [`Recommendation::failure`] set.
    pub async fn recommend_with_rng<R>(&self, query: &RecommendQuery, rng: &mut R) -> Recommendation
    where
        R: Rng + Send + ?Sized,
    {
        let text = query.boosted_text();
        debug!(
            "Embedding query ({} chars, boost {})",
            text.chars().count(),
            query.boost
        );

        let vector = match self.embedding_provider.embed(&text).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Query embedding failed: {}", e);
                return self.failed(query, QueryFailure::embedding(e.to_string()));
            }
        };

        let matches = match self.index.query(&vector, query.top_k).await {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Retrieval from {} failed: {}", self.index.name(), e);
                return self.failed(query, QueryFailure::retrieval(e.to_string()));
            }
        };
        debug!("Retrieved {} matches from {}", matches.len(), self.index.name());

        let records = assemble_shuffled(matches, |institution, id| self.labels.resolve(institution, id), rng);
        let graph = layout(&query.text, records.clone(), &self.layout);

        Recommendation {
            query: query.text.clone(),
            records,
            graph,
            failure: None,
        }
    }

    fn failed(&self, query: &RecommendQuery, failure: QueryFailure) -> Recommendation {
        Recommendation {
            query: query.text.clone(),
            records: Vec::new(),
            graph: layout(&query.text, Vec::new(), &self.layout),
            failure: Some(failure),
        }
    }
}

impl Recommender<FastEmbedProvider, PineconeClient> {
    /// Bring the whole pipeline up from configuration.
    ///
    /// Order: index credential and host, encoder model, dimension check
    /// against the index, label tables. Any failure here is fatal and no
    /// query can be served.
    ///
    /// # Errors
    /// Returns `ConfigError` for a missing credential, an unreachable index,
    /// an unloadable model, or an encoder/index dimension disagreement
    pub async fn from_config(config: &AppConfig) -> ConfigResult<Self> {
        let index = PineconeClient::connect(config.index.clone()).await?;

        let embedding_provider = FastEmbedProvider::new(None, config.model_cache_dir.clone())
            .map_err(|e| ConfigError::ModelLoad(e.to_string()))?;
        info!(
            "Embedding model {} loaded (dimension: {})",
            embedding_provider.model_name(),
            embedding_provider.dimension()
        );

        let index_dimension = match index.dimension() {
            Some(dimension) => dimension,
            None => {
                index
                    .describe_index_stats()
                    .await
                    .map_err(|e| ConfigError::IndexUnavailable(e.to_string()))?
                    .dimension
            }
        };
        if index_dimension != embedding_provider.dimension() {
            return Err(ConfigError::Invalid(format!(
                "index '{}' stores {}-dimensional vectors but model {} produces {}",
                config.index.index_name,
                index_dimension,
                embedding_provider.model_name(),
                embedding_provider.dimension()
            )));
        }
        let index = index.with_dimension(index_dimension);

        let labels = LabelResolver::from_specs(&config.label_tables);

        Ok(Self::new(embedding_provider, index, labels, LayoutConfig::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingError, EmbeddingResult};
    use crate::index::{RetrievalError, RetrievalResult};
    use crate::labels::MemoryLabelTable;
    use crate::models::{FailureKind, Match, META_ID, META_INSTITUTION, META_TITLE};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    // Mock EmbeddingProvider: deterministic vector derived from text length
    struct MockEmbeddingProvider {
        dimension: usize,
        seen: Arc<Mutex<Vec<String>>>,
        should_fail: bool,
    }

    impl MockEmbeddingProvider {
        fn new(dimension: usize) -> Self {
            Self {
                dimension,
                seen: Arc::new(Mutex::new(Vec::new())),
                should_fail: false,
            }
        }

        fn with_failure() -> Self {
            Self {
                should_fail: true,
                ..Self::new(4)
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbeddingProvider {
        async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
            if self.should_fail {
                return Err(EmbeddingError::InferenceError("Mock embedding failure".to_string()));
            }
            self.seen.lock().unwrap().push(text.to_string());
            let mut embedding = vec![0.0; self.dimension];
            embedding[0] = text.chars().count() as f32;
            Ok(embedding)
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_name(&self) -> &str {
            "mock-model"
        }
    }

    // Mock IndexClient returning canned matches in order
    struct MockIndex {
        matches: Vec<Match>,
        should_fail: bool,
        requested: Arc<Mutex<Vec<(usize, usize)>>>,
    }

    impl MockIndex {
        fn new(matches: Vec<Match>) -> Self {
            Self {
                matches,
                should_fail: false,
                requested: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn with_failure() -> Self {
            Self {
                should_fail: true,
                ..Self::new(Vec::new())
            }
        }
    }

    #[async_trait]
    impl IndexClient for MockIndex {
        async fn query(&self, vector: &[f32], top_k: usize) -> RetrievalResult<Vec<Match>> {
            self.requested.lock().unwrap().push((vector.len(), top_k));
            if self.should_fail {
                return Err(RetrievalError::Network("connection refused".to_string()));
            }
            Ok(self.matches.iter().take(top_k).cloned().collect())
        }

        fn name(&self) -> &str {
            "mock-index"
        }
    }

    fn paper(id: &str, score: f32, title: &str, school: &str) -> Match {
        Match::new(id, score)
            .with_metadata(META_TITLE, title)
            .with_metadata(META_INSTITUTION, school)
            .with_metadata(META_ID, id)
    }

    fn abc() -> Vec<Match> {
        vec![
            paper("a", 0.95, "A", "九州工業大学"),
            paper("b", 0.80, "B", "東京工業大学"),
            paper("c", 0.60, "C", "大阪大学"),
        ]
    }

    fn labels() -> LabelResolver {
        LabelResolver::new().with_table(
            "九州工業大学",
            [("a", "情報工学")].into_iter().collect::<MemoryLabelTable>(),
        )
    }

    fn recommender<E: EmbeddingProvider, I: IndexClient>(embedder: E, index: I) -> Recommender<E, I> {
        Recommender::new(embedder, index, labels(), LayoutConfig::default())
    }

    #[test]
    fn test_query_defaults() {
        let query = RecommendQuery::new("test".to_string(), None, None).unwrap();
        assert_eq!(query.top_k, DEFAULT_TOP_K);
        assert_eq!(query.boost, DEFAULT_BOOST);
    }

    #[test]
    fn test_query_bounds() {
        assert!(RecommendQuery::new(String::new(), Some(1), Some(1)).is_ok());
        assert!(RecommendQuery::new(String::new(), Some(50), Some(5)).is_ok());
        assert!(matches!(
            RecommendQuery::new(String::new(), Some(0), None),
            Err(QueryError::InvalidQuery(_))
        ));
        assert!(RecommendQuery::new(String::new(), Some(51), None).is_err());
        assert!(RecommendQuery::new(String::new(), None, Some(0)).is_err());
        assert!(RecommendQuery::new(String::new(), None, Some(6)).is_err());
    }

    #[test]
    fn test_boosted_text() {
        let query = RecommendQuery::new("DNA ".to_string(), None, Some(3)).unwrap();
        assert_eq!(query.boosted_text(), "DNA DNA DNA ");
    }

    #[tokio::test]
    async fn test_end_to_end_ranks_and_labels() {
        let recommender = recommender(MockEmbeddingProvider::new(4), MockIndex::new(abc()));
        let query = RecommendQuery::new("neural networks".to_string(), Some(3), None).unwrap();

        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let result = recommender.recommend_with_rng(&query, &mut rng).await;

            assert!(result.is_success());
            assert_eq!(result.records.len(), 3);
            for record in &result.records {
                match record.title.as_str() {
                    "A" => {
                        assert_eq!(record.rank, 0);
                        assert_eq!(record.class_label.as_deref(), Some("情報工学"));
                    }
                    "B" => assert_eq!(record.rank, 1),
                    "C" => assert_eq!(record.rank, 2),
                    other => panic!("unexpected record {}", other),
                }
            }
            assert_eq!(result.graph.nodes.len(), 3);
            assert_eq!(result.graph.edges.len(), 3);
            assert_eq!(result.graph.center.label, "neural networks");
        }
    }

    #[tokio::test]
    async fn test_graph_follows_display_order() {
        let recommender = recommender(MockEmbeddingProvider::new(4), MockIndex::new(abc()));
        let query = RecommendQuery::new("q".to_string(), Some(3), None).unwrap();
        let result = recommender
            .recommend_with_rng(&query, &mut StdRng::seed_from_u64(11))
            .await;

        let node_records: Vec<&PaperRecord> = result.graph.nodes.iter().map(|n| &n.record).collect();
        let records: Vec<&PaperRecord> = result.records.iter().collect();
        assert_eq!(node_records, records);
    }

    #[tokio::test]
    async fn test_boost_and_top_k_reach_stages() {
        let embedder = MockEmbeddingProvider::new(4);
        let seen = Arc::clone(&embedder.seen);
        let index = MockIndex::new(abc());
        let requested = Arc::clone(&index.requested);
        let recommender = recommender(embedder, index);

        let query = RecommendQuery::new("ab".to_string(), Some(2), Some(2)).unwrap();
        let result = recommender.recommend(&query).await;

        assert_eq!(result.records.len(), 2);
        assert_eq!(seen.lock().unwrap().as_slice(), ["abab".to_string()]);
        assert_eq!(requested.lock().unwrap().as_slice(), [(4, 2)]);
        assert_eq!(result.query, "ab");
    }

    #[tokio::test]
    async fn test_empty_text_is_accepted() {
        let recommender = recommender(MockEmbeddingProvider::new(4), MockIndex::new(abc()));
        let query = RecommendQuery::new(String::new(), Some(1), None).unwrap();
        let result = recommender.recommend(&query).await;
        assert!(result.is_success());
        assert_eq!(result.records.len(), 1);
    }

    #[tokio::test]
    async fn test_retrieval_failure_degrades() {
        let recommender = recommender(MockEmbeddingProvider::new(4), MockIndex::with_failure());
        let query = RecommendQuery::new("q".to_string(), None, None).unwrap();
        let result = recommender.recommend(&query).await;

        let failure = result.failure.expect("failure reason");
        assert_eq!(failure.kind, FailureKind::Retrieval);
        assert!(failure.message.contains("connection refused"));
        assert!(result.records.is_empty());
        assert_eq!(result.graph.node_count(), 1);
        assert!(result.graph.edges.is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_skips_retrieval() {
        let index = MockIndex::new(abc());
        let requested = Arc::clone(&index.requested);
        let recommender = recommender(MockEmbeddingProvider::with_failure(), index);
        let query = RecommendQuery::new("q".to_string(), None, None).unwrap();
        let result = recommender.recommend(&query).await;

        assert_eq!(result.failure.map(|f| f.kind), Some(FailureKind::Embedding));
        assert!(requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shared_across_tasks() {
        let recommender = Arc::new(recommender(MockEmbeddingProvider::new(4), MockIndex::new(abc())));

        let mut handles = Vec::new();
        for i in 0..4 {
            let recommender = Arc::clone(&recommender);
            handles.push(tokio::spawn(async move {
                let query = RecommendQuery::new(format!("query {}", i), Some(3), None).unwrap();
                recommender.recommend(&query).await
            }));
        }

        for handle in handles {
            let result = handle.await.expect("task should complete");
            assert_eq!(result.records.len(), 3);
        }
    }

    #[tokio::test]
    async fn test_from_config_requires_credential() {
        let config = AppConfig::from_lookup(|_| None);
        assert!(matches!(config, Err(ConfigError::MissingCredential(_))));

        // A config assembled by hand with a blank key is rejected before any
        // network or model work happens.
        let mut config = AppConfig::from_lookup(|key| {
            (key == crate::config::ENV_API_KEY).then(|| "placeholder".to_string())
        })
        .unwrap();
        config.index.api_key = String::new();
        let result = Recommender::from_config(&config).await;
        assert!(matches!(result, Err(ConfigError::MissingCredential(_))));
    }
}
