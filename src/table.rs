//! Input table loading
//!
//! The input table is a JSON document in one of three shapes:
//!
//! - records: `[{"pt_root_id": 1, "pt_position": [..]}, ...]`
//! - columns: `{"pt_root_id": {"0": 1, ...}, "pt_position": {"0": [..], ...}}`
//! - lines: one record object per line (`.jsonl` / `.ndjson`)
//!
//! Row order is preserved. For column-oriented tables rows are ordered by
//! their index key, numerically when every key is an integer.

use crate::error::{Error, Result};
use crate::types::{RootId, SomaPoint};
use serde_json::{Map, Value};
use std::path::Path;

/// One input row
pub type Row = Map<String, Value>;

/// A loaded input table
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputTable {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl InputTable {
    /// Read a table from disk, picking the shape from the extension and content
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| Error::Config {
            message: format!("cannot read input table {}: {}", path.display(), e),
            key: Some(crate::config::keys::DATAFRAME.to_string()),
        })?;

        let lines = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("jsonl" | "ndjson")
        );
        let table = if lines {
            Self::from_json_lines(&text)?
        } else {
            Self::from_json(&text)?
        };

        tracing::debug!(
            path = %path.display(),
            rows = table.len(),
            columns = ?table.columns,
            "loaded input table"
        );
        Ok(table)
    }

    /// Parse a records or column-oriented JSON document
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| table_error(e.to_string()))?;
        match value {
            Value::Array(records) => Self::from_records(records),
            Value::Object(columns) => Self::from_columns(columns),
            other => Err(table_error(format!(
                "expected an array of records or an object of columns, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Parse one record per non-empty line
    pub fn from_json_lines(text: &str) -> Result<Self> {
        let mut records = Vec::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line)
                .map_err(|e| table_error(format!("line {}: {}", n + 1, e)))?;
            records.push(value);
        }
        Self::from_records(records)
    }

    /// Build from already-parsed rows
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, rows }
    }

    fn from_records(records: Vec<Value>) -> Result<Self> {
        let rows = records
            .into_iter()
            .enumerate()
            .map(|(i, value)| match value {
                Value::Object(row) => Ok(row),
                other => Err(table_error(format!(
                    "row {i} is {}, expected an object",
                    json_kind(&other)
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_rows(rows))
    }

    fn from_columns(columns: Map<String, Value>) -> Result<Self> {
        let mut index: Vec<String> = Vec::new();
        let mut cells: Vec<(String, Map<String, Value>)> = Vec::with_capacity(columns.len());

        for (name, column) in columns {
            let Value::Object(values) = column else {
                return Err(table_error(format!(
                    "column '{name}' must map row index to value"
                )));
            };
            for key in values.keys() {
                if !index.contains(key) {
                    index.push(key.clone());
                }
            }
            cells.push((name, values));
        }

        if index.iter().all(|k| k.parse::<u64>().is_ok()) {
            index.sort_by_key(|k| k.parse::<u64>().unwrap_or(u64::MAX));
        } else {
            index.sort();
        }

        let names: Vec<String> = cells.iter().map(|(name, _)| name.clone()).collect();
        let rows = index
            .iter()
            .map(|i| {
                cells
                    .iter()
                    .filter_map(|(name, values)| values.get(i).map(|v| (name.clone(), v.clone())))
                    .collect::<Row>()
            })
            .collect();

        Ok(Self {
            columns: names,
            rows,
        })
    }

    /// Column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in input order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether `name` is a column of this table
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Fail with a configuration error naming the first missing column
    ///
    /// Column-oriented tables name their columns even with no rows. A
    /// records or lines table with no rows has no column names and passes.
    pub fn require_columns(&self, names: &[&str]) -> Result<()> {
        if self.columns.is_empty() && self.rows.is_empty() {
            return Ok(());
        }
        match names.iter().find(|name| !self.has_column(name)) {
            Some(missing) => Err(Error::config(
                *missing,
                format!(
                    "input table has no column '{missing}' (columns: {})",
                    self.columns.join(", ")
                ),
            )),
            None => Ok(()),
        }
    }
}

/// Read a root id cell: an unsigned integer or a numeric string
pub fn parse_root_id(value: &Value) -> Option<RootId> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .map(RootId),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Read a soma point cell: three numbers
pub fn parse_soma_point(value: &Value) -> Option<SomaPoint> {
    let Value::Array(coords) = value else {
        return None;
    };
    match coords.as_slice() {
        [x, y, z] => Some(SomaPoint::new(x.as_f64()?, y.as_f64()?, z.as_f64()?)),
        _ => None,
    }
}

/// Read a soma radius cell: a number, or null / NaN for "no override"
pub fn parse_soma_radius(value: &Value) -> Option<Option<f64>> {
    match value {
        Value::Null => Some(None),
        Value::Number(n) => n.as_f64().map(|r| Some(r).filter(|r| !r.is_nan())),
        Value::String(s) if s.trim().is_empty() || s.trim() == "None" => Some(None),
        Value::String(s) => s.trim().parse().ok().map(Some),
        _ => None,
    }
}

fn table_error(message: String) -> Error {
    Error::Config {
        message: format!("malformed input table: {message}"),
        key: Some(crate::config::keys::DATAFRAME.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
