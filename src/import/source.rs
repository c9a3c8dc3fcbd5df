//! Where schedule rows come from.
//!
//! Reading the spreadsheet file format itself is left to an external
//! reader; the board consumes its output as a list of row objects.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use super::record::RawRecord;
use crate::error::ImportError;

/// Supplies raw schedule rows.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Reads every row, in source order.
    ///
    /// # Errors
    ///
    /// Returns an [`ImportError`] when the source is missing or unreadable.
    /// Individual bad rows are not errors here; validation handles them.
    async fn rows(&self) -> Result<Vec<RawRecord>, ImportError>;

    /// Human-readable origin for log lines.
    fn describe(&self) -> String;
}

/// Reads a JSON array of row objects, as produced by exporting the first
/// sheet of the schedule workbook.
///
/// ```json
/// [
///   { "DATE": "2025-01-10 08:00", "CLIENT": "Acme", "SERVICE": "Import" },
///   { "DATE": "2025-01-10 09:00", "CLIENT": "Beta", "SERVICE": "Export" }
/// ]
/// ```
///
/// Array elements that are not objects are skipped.
#[derive(Debug, Clone)]
pub struct JsonRowSource {
    path: PathBuf,
}

impl JsonRowSource {
    /// Creates a source reading `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file this source reads.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RowSource for JsonRowSource {
    async fn rows(&self) -> Result<Vec<RawRecord>, ImportError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ImportError::Missing {
                    path: self.path.clone(),
                })
            },
            Err(source) => {
                return Err(ImportError::Read {
                    path: self.path.clone(),
                    source,
                })
            },
        };

        parse_rows(&content).map_err(|message| ImportError::Parse {
            path: self.path.clone(),
            message,
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Rows held in memory, for re-imports driven by callers and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticRowSource {
    rows: Vec<RawRecord>,
}

impl StaticRowSource {
    /// Wraps `rows`.
    pub fn new(rows: Vec<RawRecord>) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl RowSource for StaticRowSource {
    async fn rows(&self) -> Result<Vec<RawRecord>, ImportError> {
        Ok(self.rows.clone())
    }

    fn describe(&self) -> String {
        format!("{} in-memory row(s)", self.rows.len())
    }
}

fn parse_rows(content: &str) -> Result<Vec<RawRecord>, String> {
    let document: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let Value::Array(items) = document else {
        return Err("expected a JSON array of row objects".to_string());
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map.into_iter().collect::<RawRecord>()),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn missing_file_is_reported() {
        let source = JsonRowSource::new("/definitely/not/here/schedule.json");
        assert!(matches!(source.rows().await, Err(ImportError::Missing { .. })));
    }

    #[tokio::test]
    async fn reads_row_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.json");
        std::fs::write(
            &path,
            r#"[{"Date": "2025-01-10 08:00", "Client": "Acme"}, 42, {"CLIENT": "Beta"}]"#,
        )
        .unwrap();

        let rows = JsonRowSource::new(&path).rows().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("client"), Some(&json!("Acme")));
    }

    #[tokio::test]
    async fn non_array_document_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.json");
        std::fs::write(&path, r#"{"rows": []}"#).unwrap();

        let err = JsonRowSource::new(&path).rows().await.unwrap_err();
        assert!(matches!(err, ImportError::Parse { .. }));
    }
}
