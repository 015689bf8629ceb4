//! Class label lookup.
//!
//! Every institution whose papers are in the index has its own table of
//! predicted class labels, keyed by paper identifier. A [`LabelResolver`]
//! picks the table by institution name and asks it for the label.
//!
//! A miss is a normal outcome: unknown institutions and unknown identifiers
//! both resolve to `None`.

pub mod csv;

use std::collections::HashMap;

use thiserror::Error;
use tracing::{info, trace, warn};

use crate::config::LabelTableSpec;

/// Errors that can occur while loading a label table.
#[derive(Debug, Error)]
pub enum LabelError {
    /// Failed to open or read the table source
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// The table source is not in the expected shape
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Result type for label table loading.
pub type LabelResult<T> = Result<T, LabelError>;

/// A lookup table from paper identifier to class label.
pub trait LabelTable: Send + Sync {
    /// Look up the label for `id`.
    ///
    /// # Returns
    /// `Some(label)` if the table has a row for `id`, `None` otherwise
    fn resolve(&self, id: &str) -> Option<String>;

    /// Number of identifiers in the table.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A label table held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLabelTable {
    labels: HashMap<String, String>,
}

impl MemoryLabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row. An identifier that is already present keeps its first label.
    pub fn insert(&mut self, id: impl Into<String>, label: impl Into<String>) {
        self.labels.entry(id.into()).or_insert_with(|| label.into());
    }
}

impl<K, V> FromIterator<(K, V)> for MemoryLabelTable
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(rows: I) -> Self {
        let mut table = Self::new();
        for (id, label) in rows {
            table.insert(id, label);
        }
        table
    }
}

impl LabelTable for MemoryLabelTable {
    fn resolve(&self, id: &str) -> Option<String> {
        self.labels.get(id).cloned()
    }

    fn len(&self) -> usize {
        self.labels.len()
    }
}

/// Registry of label tables keyed by institution name.
#[derive(Default)]
pub struct LabelResolver {
    tables: HashMap<String, Box<dyn LabelTable>>,
}

impl LabelResolver {
    /// Create an empty resolver; every lookup misses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the table for an institution, replacing any previous one.
    pub fn register(&mut self, institution: impl Into<String>, table: impl LabelTable + 'static) {
        self.tables.insert(institution.into(), Box::new(table));
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with_table(mut self, institution: impl Into<String>, table: impl LabelTable + 'static) -> Self {
        self.register(institution, table);
        self
    }

    /// Load CSV tables for every registration.
    ///
    /// A table that cannot be loaded is logged and skipped, so lookups for
    /// that institution miss instead of stopping the pipeline.
    pub fn from_specs(specs: &[LabelTableSpec]) -> Self {
        let mut resolver = Self::new();
        for spec in specs {
            match csv::CsvLabelTable::from_path(&spec.path) {
                Ok(table) => {
                    info!(
                        "Loaded {} labels for {} from {}",
                        table.len(),
                        spec.institution,
                        spec.path.display()
                    );
                    resolver.register(spec.institution.clone(), table);
                }
                Err(e) => warn!(
                    "Skipping label table for {} ({}): {}",
                    spec.institution,
                    spec.path.display(),
                    e
                ),
            }
        }
        resolver
    }

    /// Resolve the class label of paper `id` from `institution`.
    ///
    /// # Returns
    /// `None` when the institution has no table or the table has no row for
    /// `id`
    pub fn resolve(&self, institution: &str, id: &str) -> Option<String> {
        let Some(table) = self.tables.get(institution) else {
            trace!("No label table for institution {}", institution);
            return None;
        };
        let label = table.resolve(id);
        if label.is_none() {
            trace!("No label for {} in {}", id, institution);
        }
        label
    }

    /// Institutions that have a registered table.
    pub fn institutions(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for LabelResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sizes: Vec<(&str, usize)> = self
            .tables
            .iter()
            .map(|(name, table)| (name.as_str(), table.len()))
            .collect();
        sizes.sort();
        f.debug_struct("LabelResolver").field("tables", &sizes).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn resolver() -> LabelResolver {
        LabelResolver::new()
            .with_table("九州工業大学", [("k-1", "情報工学")].into_iter().collect::<MemoryLabelTable>())
            .with_table("東京工業大学", [("t-1", "物質科学")].into_iter().collect::<MemoryLabelTable>())
    }

    #[test]
    fn test_resolve_known_row() {
        let resolver = resolver();
        assert_eq!(resolver.resolve("九州工業大学", "k-1").as_deref(), Some("情報工学"));
        assert_eq!(resolver.resolve("東京工業大学", "t-1").as_deref(), Some("物質科学"));
    }

    #[test]
    fn test_unknown_institution_is_absent() {
        let resolver = resolver();
        assert_eq!(resolver.resolve("大阪大学", "k-1"), None);
        assert_eq!(resolver.resolve("", ""), None);
    }

    #[test]
    fn test_unknown_id_is_absent() {
        let resolver = resolver();
        assert_eq!(resolver.resolve("九州工業大学", "t-1"), None);
    }

    #[test]
    fn test_memory_table_keeps_first_label() {
        let table: MemoryLabelTable = [("a", "first"), ("a", "second"), ("b", "other")].into_iter().collect();
        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve("a").as_deref(), Some("first"));
    }

    #[test]
    fn test_from_specs_skips_missing_files() {
        let specs = vec![LabelTableSpec {
            institution: "九州工業大学".to_string(),
            path: PathBuf::from("/nonexistent/labels.csv"),
        }];
        let resolver = LabelResolver::from_specs(&specs);
        assert_eq!(resolver.institutions().count(), 0);
        assert_eq!(resolver.resolve("九州工業大学", "k-1"), None);
    }
}
