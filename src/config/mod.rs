//! Process configuration.
//!
//! Settings are read once at startup from the environment (after loading an
//! optional `.env` file). Anything missing or malformed here is fatal: the
//! pipeline refuses to start rather than failing on the first query.
//!
//! | Variable | Default |
//! |---|---|
//! | `PINECONE_API_KEY` | required |
//! | `PINECONE_INDEX_NAME` | `vector-db` |
//! | `PINECONE_INDEX_HOST` | resolved through the control plane |
//! | `PINECONE_CONTROL_PLANE` | `https://api.pinecone.io` |
//! | `PINECONE_NAMESPACE` | empty (default namespace) |
//! | `PINECONE_TIMEOUT_SECS` | `30` |
//! | `PAPER_RADAR_MODEL_CACHE` | fastembed default |
//! | `PAPER_RADAR_LABEL_TABLES` | the two bundled institution tables |

use std::path::PathBuf;

use thiserror::Error;

/// Environment variable holding the vector index credential.
pub const ENV_API_KEY: &str = "PINECONE_API_KEY";
pub const ENV_INDEX_NAME: &str = "PINECONE_INDEX_NAME";
pub const ENV_INDEX_HOST: &str = "PINECONE_INDEX_HOST";
pub const ENV_CONTROL_PLANE: &str = "PINECONE_CONTROL_PLANE";
pub const ENV_NAMESPACE: &str = "PINECONE_NAMESPACE";
pub const ENV_TIMEOUT_SECS: &str = "PINECONE_TIMEOUT_SECS";
pub const ENV_MODEL_CACHE: &str = "PAPER_RADAR_MODEL_CACHE";
pub const ENV_LABEL_TABLES: &str = "PAPER_RADAR_LABEL_TABLES";

pub const DEFAULT_INDEX_NAME: &str = "vector-db";
pub const DEFAULT_CONTROL_PLANE: &str = "https://api.pinecone.io";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Label tables registered when nothing else is configured.
pub const DEFAULT_LABEL_TABLES: &[(&str, &str)] = &[
    ("九州工業大学", "data/予測クラス_九州工業大学.csv.csv"),
    ("東京工業大学", "data/予測クラス_東京工業大学.csv"),
];

/// Fatal configuration errors raised while bringing the pipeline up.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required credential is absent or empty
    #[error("Missing credential: {0} is not set")]
    MissingCredential(String),

    /// A setting is present but unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The embedding model could not be loaded
    #[error("Failed to load embedding model: {0}")]
    ModelLoad(String),

    /// The vector index could not be located or inspected
    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Connection settings for the vector index.
#[derive(Clone)]
pub struct IndexConfig {
    /// API key sent with every request
    pub api_key: String,

    /// Index name, used to resolve the host when none is given
    pub index_name: String,

    /// Data-plane host, e.g. `https://vector-db-abc123.svc.us-east-1.pinecone.io`
    pub host: Option<String>,

    /// Control-plane base URL
    pub control_plane: String,

    /// Namespace to query
    pub namespace: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl IndexConfig {
    /// Create settings with defaults for everything but the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            index_name: DEFAULT_INDEX_NAME.to_string(),
            host: None,
            control_plane: DEFAULT_CONTROL_PLANE.to_string(),
            namespace: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Validate the settings.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingCredential` for an empty key and
    /// `ConfigError::Invalid` for unusable names, hosts or timeouts
    pub fn validate(&self) -> ConfigResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential(ENV_API_KEY.to_string()));
        }
        if self.host.is_none() && self.index_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "either an index host or an index name is required".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout must be > 0".to_string()));
        }
        Ok(())
    }
}

// The key is deliberately left out of debug output.
impl std::fmt::Debug for IndexConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexConfig")
            .field("index_name", &self.index_name)
            .field("host", &self.host)
            .field("control_plane", &self.control_plane)
            .field("namespace", &self.namespace)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

/// A label table registration: institution name and CSV path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTableSpec {
    pub institution: String,
    pub path: PathBuf,
}

impl LabelTableSpec {
    /// Parse a `NAME=PATH` pair.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if either side is missing
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let (name, path) = raw
            .split_once('=')
            .ok_or_else(|| ConfigError::Invalid(format!("label table '{}' is not NAME=PATH", raw)))?;
        let name = name.trim();
        let path = path.trim();
        if name.is_empty() || path.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "label table '{}' is not NAME=PATH",
                raw
            )));
        }
        Ok(Self {
            institution: name.to_string(),
            path: PathBuf::from(path),
        })
    }

    /// Parse a `;`-separated list of `NAME=PATH` pairs.
    pub fn parse_list(raw: &str) -> ConfigResult<Vec<Self>> {
        raw.split(';')
            .filter(|entry| !entry.trim().is_empty())
            .map(Self::parse)
            .collect()
    }

    /// The bundled default registrations.
    pub fn defaults() -> Vec<Self> {
        DEFAULT_LABEL_TABLES
            .iter()
            .map(|(name, path)| Self {
                institution: name.to_string(),
                path: PathBuf::from(path),
            })
            .collect()
    }
}

/// Everything needed to initialise the recommendation pipeline.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Vector index connection
    pub index: IndexConfig,

    /// Directory for downloaded model files
    pub model_cache_dir: Option<PathBuf>,

    /// Label tables to load at startup
    pub label_tables: Vec<LabelTableSpec>,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is honoured if present.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingCredential` if `PINECONE_API_KEY` is unset,
    /// or `ConfigError::Invalid` for malformed values
    pub fn from_env() -> ConfigResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary lookup function.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key =
            get(ENV_API_KEY).ok_or_else(|| ConfigError::MissingCredential(ENV_API_KEY.to_string()))?;

        let timeout_secs = match get(ENV_TIMEOUT_SECS) {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                ConfigError::Invalid(format!("{} must be a positive integer, got '{}'", ENV_TIMEOUT_SECS, raw))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let index = IndexConfig {
            api_key,
            index_name: get(ENV_INDEX_NAME).unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string()),
            host: get(ENV_INDEX_HOST),
            control_plane: get(ENV_CONTROL_PLANE).unwrap_or_else(|| DEFAULT_CONTROL_PLANE.to_string()),
            namespace: lookup(ENV_NAMESPACE).unwrap_or_default(),
            timeout_secs,
        };
        index.validate()?;

        let label_tables = match get(ENV_LABEL_TABLES) {
            Some(raw) => LabelTableSpec::parse_list(&raw)?,
            None => LabelTableSpec::defaults(),
        };

        Ok(Self {
            index,
            model_cache_dir: get(ENV_MODEL_CACHE).map(PathBuf::from),
            label_tables,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_credential_is_fatal() {
        let result = AppConfig::from_lookup(lookup_from(&[]));
        match result {
            Err(ConfigError::MissingCredential(name)) => assert_eq!(name, ENV_API_KEY),
            other => panic!("Expected MissingCredential, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_credential_is_missing() {
        let result = AppConfig::from_lookup(lookup_from(&[(ENV_API_KEY, "   ")]));
        assert!(matches!(result, Err(ConfigError::MissingCredential(_))));
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[(ENV_API_KEY, "pc-key")])).unwrap();
        assert_eq!(config.index.api_key, "pc-key");
        assert_eq!(config.index.index_name, DEFAULT_INDEX_NAME);
        assert_eq!(config.index.host, None);
        assert_eq!(config.index.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.label_tables.len(), DEFAULT_LABEL_TABLES.len());
        assert!(config.model_cache_dir.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            (ENV_API_KEY, "pc-key"),
            (ENV_INDEX_HOST, "https://papers.svc.pinecone.io"),
            (ENV_TIMEOUT_SECS, "5"),
            (ENV_NAMESPACE, "2024"),
            (ENV_LABEL_TABLES, "A Univ=a.csv; B Univ = b.csv"),
        ]))
        .unwrap();

        assert_eq!(config.index.host.as_deref(), Some("https://papers.svc.pinecone.io"));
        assert_eq!(config.index.timeout_secs, 5);
        assert_eq!(config.index.namespace, "2024");
        assert_eq!(
            config.label_tables,
            vec![
                LabelTableSpec { institution: "A Univ".to_string(), path: PathBuf::from("a.csv") },
                LabelTableSpec { institution: "B Univ".to_string(), path: PathBuf::from("b.csv") },
            ]
        );
    }

    #[test]
    fn test_bad_timeout() {
        let result = AppConfig::from_lookup(lookup_from(&[
            (ENV_API_KEY, "pc-key"),
            (ENV_TIMEOUT_SECS, "soon"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = AppConfig::from_lookup(lookup_from(&[
            (ENV_API_KEY, "pc-key"),
            (ENV_TIMEOUT_SECS, "0"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_label_table_spec_parse() {
        assert!(LabelTableSpec::parse("no-separator").is_err());
        assert!(LabelTableSpec::parse("=path.csv").is_err());
        assert!(LabelTableSpec::parse("name=").is_err());
        assert!(LabelTableSpec::parse_list("").unwrap().is_empty());
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = IndexConfig::new("super-secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("vector-db"));
    }
}
