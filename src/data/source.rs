use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use super::{Dataset, Example};

/// Failures a data source can report.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The backing store could not be reached or read.
    #[error("cannot reach table {table:?}")]
    Connection {
        /// Table that was requested.
        table: String,
        /// Underlying I/O failure, if any.
        #[source]
        source: Option<std::io::Error>,
    },

    /// A cell could not be read as a real number.
    #[error("non-numeric value in column {column:?} at row {row}")]
    NonNumeric {
        /// Column name (or its position when the header is short).
        column: String,
        /// 0-based data row.
        row: usize,
    },

    /// The table exists but has no rows.
    #[error("table is empty")]
    Empty,
}

/// Something that can produce the examples of a named table.
pub trait DataSource: Send + Sync {
    /// Fetch all rows of `table` as examples, in row order.
    fn fetch(&self, table: &str) -> Result<Dataset, SourceError>;
}

/// Tables stored as CSV files in one directory.
///
/// Table `t` is read from `<root>/t.csv`. The first line is a header of column names;
/// every following non-blank line is a comma-separated row of reals.
#[derive(Debug, Clone)]
pub struct CsvDirectory {
    root: PathBuf,
}

impl CsvDirectory {
    /// Serve tables from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn parse(table: &str, content: &str) -> Result<Dataset, SourceError> {
        let mut lines = content.lines().filter(|l| !l.trim().is_empty());
        let header: Vec<&str> = match lines.next() {
            Some(h) => h.split(',').map(str::trim).collect(),
            None => return Err(SourceError::Empty),
        };

        let mut examples = Vec::new();
        for (row, line) in lines.enumerate() {
            let values = line
                .split(',')
                .enumerate()
                .map(|(col, cell)| {
                    cell.trim().parse::<f64>().map_err(|_| SourceError::NonNumeric {
                        column: header
                            .get(col)
                            .map(|h| h.to_string())
                            .unwrap_or_else(|| format!("#{col}")),
                        row,
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;
            examples.push(Example::new(values));
        }

        if examples.is_empty() {
            return Err(SourceError::Empty);
        }
        debug!(table, rows = examples.len(), "parsed csv table");
        Ok(Dataset::new(examples))
    }
}

impl DataSource for CsvDirectory {
    fn fetch(&self, table: &str) -> Result<Dataset, SourceError> {
        let bad_name = table.is_empty()
            || table.contains(['/', '\\'])
            || table.contains("..");
        if bad_name {
            return Err(SourceError::Connection {
                table: table.to_string(),
                source: None,
            });
        }

        let path = self.root.join(format!("{table}.csv"));
        let content =
            std::fs::read_to_string(&path).map_err(|e| SourceError::Connection {
                table: table.to_string(),
                source: Some(e),
            })?;
        Self::parse(table, &content)
    }
}

/// Named tables held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: HashMap<String, Dataset>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `rows` under `name`.
    pub fn with_table(mut self, name: impl Into<String>, rows: Vec<Vec<f64>>) -> Self {
        self.tables.insert(name.into(), Dataset::from_rows(rows));
        self
    }
}

impl DataSource for MemorySource {
    fn fetch(&self, table: &str) -> Result<Dataset, SourceError> {
        match self.tables.get(table) {
            Some(data) if data.is_empty() => Err(SourceError::Empty),
            Some(data) => Ok(data.clone()),
            None => Err(SourceError::Connection {
                table: table.to_string(),
                source: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_with_header() {
        let data = CsvDirectory::parse("t", "x,y\n1,2\n\n3.5, -4\n").unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.get(1).unwrap().values(), &[3.5, -4.0]);
    }

    #[test]
    fn test_parse_non_numeric_names_column() {
        let err = CsvDirectory::parse("t", "x,label\n1,2\n3,abc\n").unwrap_err();
        match err {
            SourceError::NonNumeric { column, row } => {
                assert_eq!(column, "label");
                assert_eq!(row, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_header_only_is_empty() {
        assert!(matches!(
            CsvDirectory::parse("t", "x,y\n"),
            Err(SourceError::Empty)
        ));
        assert!(matches!(CsvDirectory::parse("t", ""), Err(SourceError::Empty)));
    }

    #[test]
    fn test_fetch_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("points.csv"), "a,b\n0,0\n1,1\n").unwrap();
        let source = CsvDirectory::new(dir.path());

        assert_eq!(source.fetch("points").unwrap().len(), 2);
        assert!(matches!(
            source.fetch("missing"),
            Err(SourceError::Connection { source: Some(_), .. })
        ));
        assert!(matches!(
            source.fetch("../points"),
            Err(SourceError::Connection { source: None, .. })
        ));
    }

    #[test]
    fn test_memory_source() {
        let source = MemorySource::new()
            .with_table("one", vec![vec![1.0]])
            .with_table("none", vec![]);
        assert_eq!(source.fetch("one").unwrap().len(), 1);
        assert!(matches!(source.fetch("none"), Err(SourceError::Empty)));
        assert!(source.fetch("other").is_err());
    }
}
