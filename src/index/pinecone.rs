//! Pinecone index client.
//!
//! Talks to the Pinecone REST data plane (`POST {host}/query`). The data-plane
//! host is either configured directly or looked up once at startup from the
//! control plane by index name, the same way the Python SDK's
//! `Pinecone.Index(name)` does.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{take_top, validate_query, IndexClient, RetrievalError, RetrievalResult};
use crate::config::{ConfigError, ConfigResult, IndexConfig};
use crate::models::Match;

/// API version header sent with every request.
pub const API_VERSION: &str = "2024-07";

/// Body of a `/query` request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "is_default_namespace")]
    namespace: &'a str,
}

fn is_default_namespace(namespace: &&str) -> bool {
    namespace.is_empty()
}

/// Body of a `/query` response.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

/// Subset of the control-plane index description we rely on.
#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
    #[serde(default)]
    dimension: Option<usize>,
}

/// Statistics reported by `/describe_index_stats`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    /// Dimensionality of the stored vectors
    pub dimension: usize,

    /// Number of vectors across all namespaces
    #[serde(default)]
    pub total_vector_count: u64,
}

/// Client for a single Pinecone index.
pub struct PineconeClient {
    config: IndexConfig,
    host: String,
    dimension: Option<usize>,
    http: Client,
}

impl PineconeClient {
    /// Connect to the configured index.
    ///
    /// If no data-plane host is configured, it is resolved through the control
    /// plane, which also tells us the index dimension.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingCredential` for an empty key,
    /// `ConfigError::Invalid` for unusable settings and
    /// `ConfigError::IndexUnavailable` when the host cannot be resolved
    pub async fn connect(config: IndexConfig) -> ConfigResult<Self> {
        config.validate()?;
        let http = build_http(&config)?;

        let (host, dimension) = match &config.host {
            Some(host) => (normalize_host(host), None),
            None => {
                let description = describe_index(&http, &config).await?;
                info!(
                    "Resolved index '{}' to host {}",
                    config.index_name, description.host
                );
                (normalize_host(&description.host), description.dimension)
            }
        };

        Ok(Self {
            config,
            host,
            dimension,
            http,
        })
    }

    /// Create a client for a known data-plane host without any network call.
    ///
    /// # Errors
    /// Returns `ConfigError` if the settings are invalid
    pub fn with_host(config: IndexConfig, host: &str) -> ConfigResult<Self> {
        config.validate()?;
        let http = build_http(&config)?;
        Ok(Self {
            config,
            host: normalize_host(host),
            dimension: None,
            http,
        })
    }

    /// Record the index dimension so mismatched vectors are rejected locally.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Data-plane base URL.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Index dimension, if known.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        authorize(request, &self.config.api_key)
    }

    /// Fetch index statistics.
    ///
    /// # Errors
    /// Returns `RetrievalError` if the service is unavailable or answers with
    /// something that is not an index description
    pub async fn describe_index_stats(&self) -> RetrievalResult<IndexStats> {
        let url = format!("{}/describe_index_stats", self.host);
        let response = self
            .authorized(self.http.post(&url).json(&serde_json::json!({})))
            .send()
            .await
            .map_err(|e| RetrievalError::Network(e.to_string()))?;

        decode(response).await
    }
}

#[async_trait]
impl IndexClient for PineconeClient {
    async fn query(&self, vector: &[f32], top_k: usize) -> RetrievalResult<Vec<Match>> {
        validate_query(vector, top_k, self.dimension)?;

        let url = format!("{}/query", self.host);
        let body = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
            namespace: &self.config.namespace,
        };

        debug!("Querying {} for top {} matches", url, top_k);
        let response = self
            .authorized(self.http.post(&url).json(&body))
            .send()
            .await
            .map_err(|e| RetrievalError::Network(e.to_string()))?;

        let decoded: QueryResponse = decode(response).await?;
        debug!("Index returned {} matches", decoded.matches.len());

        Ok(take_top(decoded.matches, top_k))
    }

    fn name(&self) -> &str {
        &self.config.index_name
    }
}

impl std::fmt::Debug for PineconeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PineconeClient")
            .field("index_name", &self.config.index_name)
            .field("host", &self.host)
            .field("dimension", &self.dimension)
            .finish()
    }
}

fn build_http(config: &IndexConfig) -> ConfigResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| ConfigError::Invalid(format!("Failed to build HTTP client: {}", e)))
}

fn authorize(request: RequestBuilder, api_key: &str) -> RequestBuilder {
    request
        .header("Api-Key", api_key)
        .header("X-Pinecone-API-Version", API_VERSION)
}

/// Hosts from the control plane come without a scheme.
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

async fn describe_index(http: &Client, config: &IndexConfig) -> ConfigResult<IndexDescription> {
    let url = format!(
        "{}/indexes/{}",
        config.control_plane.trim_end_matches('/'),
        config.index_name
    );
    let response = authorize(http.get(&url), &config.api_key)
        .send()
        .await
        .map_err(|e| ConfigError::IndexUnavailable(format!("{}: {}", url, e)))?;

    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ConfigError::Invalid(format!(
            "index credential rejected by {}",
            url
        ))),
        StatusCode::NOT_FOUND => Err(ConfigError::IndexUnavailable(format!(
            "index '{}' does not exist",
            config.index_name
        ))),
        _ => decode(response)
            .await
            .map_err(|e| ConfigError::IndexUnavailable(e.to_string())),
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> RetrievalResult<T> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| RetrievalError::Network(e.to_string()))?;

    if !status.is_success() {
        return Err(RetrievalError::Service {
            status: status.as_u16(),
            body: text,
        });
    }

    serde_json::from_str(&text).map_err(|e| RetrievalError::MalformedResponse(e.to_string()))
}
