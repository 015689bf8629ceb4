//! CSV-backed label tables.
//!
//! The prediction exports have one row per paper with an `id` column and one
//! or more label columns (`label1`, `label2`, ...). Only the configured label
//! column is kept; the first row for a given id wins.

use std::io::Read;
use std::path::Path;

use super::{LabelError, LabelResult, LabelTable, MemoryLabelTable};

/// Default identifier column.
pub const DEFAULT_ID_COLUMN: &str = "id";

/// Default label column (the top-ranked prediction).
pub const DEFAULT_LABEL_COLUMN: &str = "label1";

/// A label table loaded from CSV.
#[derive(Debug, Clone)]
pub struct CsvLabelTable {
    rows: MemoryLabelTable,
}

impl CsvLabelTable {
    /// Load a table from a CSV file using the default columns.
    ///
    /// # Errors
    /// Returns `LabelError` if the file cannot be read or lacks the columns
    pub fn from_path(path: impl AsRef<Path>) -> LabelResult<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(file, DEFAULT_ID_COLUMN, DEFAULT_LABEL_COLUMN)
    }

    /// Load a table from any CSV source.
    ///
    /// # Arguments
    /// * `reader` - CSV data with a header row
    /// * `id_column` - Header of the identifier column
    /// * `label_column` - Header of the label column
    ///
    /// # Errors
    /// Returns `LabelError::ParseError` if a column is missing or a record is
    /// malformed
    pub fn from_reader<R: Read>(reader: R, id_column: &str, label_column: &str) -> LabelResult<Self> {
        let mut csv_reader = ::csv::ReaderBuilder::new()
            .flexible(true)
            .trim(::csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| LabelError::ParseError(e.to_string()))?
            .clone();
        let column = |name: &str| {
            headers
                .iter()
                // Exports written with a BOM carry it on the first header.
                .position(|h| h.trim_start_matches('\u{feff}') == name)
                .ok_or_else(|| LabelError::ParseError(format!("missing column '{}'", name)))
        };
        let id_idx = column(id_column)?;
        let label_idx = column(label_column)?;

        let mut rows = MemoryLabelTable::new();
        for record in csv_reader.records() {
            let record = record.map_err(|e| LabelError::ParseError(e.to_string()))?;
            let (Some(id), Some(label)) = (record.get(id_idx), record.get(label_idx)) else {
                continue;
            };
            if id.is_empty() || label.is_empty() {
                continue;
            }
            rows.insert(id, label);
        }

        Ok(Self { rows })
    }
}

impl LabelTable for CsvLabelTable {
    fn resolve(&self, id: &str) -> Option<String> {
        self.rows.resolve(id)
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\u{feff}id,title,label1,label2\n\
                          k-1,ニューラルネットワーク,情報工学,数理科学\n\
                          k-2,DNA computing,生命工学,\n\
                          k-1,duplicate row,機械工学,\n\
                          k-3,no label,,\n";

    #[test]
    fn test_from_reader() {
        let table = CsvLabelTable::from_reader(SAMPLE.as_bytes(), "id", "label1").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve("k-1").as_deref(), Some("情報工学"));
        assert_eq!(table.resolve("k-2").as_deref(), Some("生命工学"));
        assert_eq!(table.resolve("k-3"), None);
        assert_eq!(table.resolve("missing"), None);
    }

    #[test]
    fn test_other_label_column() {
        let table = CsvLabelTable::from_reader(SAMPLE.as_bytes(), "id", "label2").unwrap();
        assert_eq!(table.resolve("k-1").as_deref(), Some("数理科学"));
        assert_eq!(table.resolve("k-2"), None);
    }

    #[test]
    fn test_missing_column() {
        let result = CsvLabelTable::from_reader("id,title\nk-1,x\n".as_bytes(), "id", "label1");
        assert!(matches!(result, Err(LabelError::ParseError(_))));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let table = CsvLabelTable::from_path(file.path()).unwrap();
        assert_eq!(table.resolve("k-2").as_deref(), Some("生命工学"));
    }

    #[test]
    fn test_from_missing_path() {
        let result = CsvLabelTable::from_path("/nonexistent/labels.csv");
        assert!(matches!(result, Err(LabelError::IoError(_))));
    }
}
