//! Paper Radar - related-paper recommendations laid out as a radial graph.
//!
//! This library embeds a free-form text, retrieves the closest papers from a
//! remote vector index, attaches predicted class labels per institution, and
//! places the results around the query so that more related papers sit on
//! inner rings.
//!
//! # Architecture
//!
//! The system is organized into several key modules:
//!
//! - **models**: Core data structures (Match, PaperRecord, QueryFailure)
//! - **config**: Environment-driven configuration and startup validation
//! - **embedding**: Text embedding generation (FastEmbed-backed)
//! - **index**: Vector index client (Pinecone over HTTP)
//! - **labels**: Per-institution class label tables (CSV-backed)
//! - **recommend**: Ranked record assembly and display shuffling
//! - **layout**: Radial graph placement and Cytoscape export
//! - **query**: The end-to-end recommendation pipeline
//! - **api**: Request and response types for JSON consumers
//!
//! # Workflow
//!
//! 1. Repeat the query text `boost` times and embed it
//! 2. Ask the index for the `top_k` nearest papers with metadata
//! 3. Assign each match its similarity rank and resolve its class label
//! 4. Shuffle the display order, keeping ranks
//! 5. Place each paper at radius `100 + 20 * rank`, evenly spaced in angle
//!
//! Embedding or retrieval failures produce a recommendation with no papers
//! and a failure reason instead of an error.
//!
//! # Example
//!
//! ```ignore
//! use paper_radar::{config::AppConfig, query::{Recommender, RecommendQuery}};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::from_env()?;
//!     let recommender = Recommender::from_config(&config).await?;
//!
//!     let query = RecommendQuery::new("DNA computing".to_string(), Some(10), None)?;
//!     let recommendation = recommender.recommend(&query).await;
//!
//!     for node in &recommendation.graph.nodes {
//!         println!("#{} {} at ({:.0}, {:.0})", node.record.rank + 1, node.label, node.position.x, node.position.y);
//!     }
//!
//!     Ok(())
//! }
//! ```

// Public modules
pub mod api;
pub mod config;
pub mod embedding;
pub mod index;
pub mod labels;
pub mod layout;
pub mod models;
pub mod query;
pub mod recommend;

// Re-export commonly used types at the crate root
pub use models::{FailureKind, Match, PaperRecord, QueryFailure};
pub use embedding::EmbeddingProvider;
pub use index::IndexClient;
pub use labels::{LabelResolver, LabelTable};
pub use layout::{LayoutConfig, RadialGraph};
pub use query::{RecommendQuery, Recommendation, Recommender};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
