//! Row-stored datasets: one JSON object per row plus a column schema.

mod memory;
mod sqlite;

pub use memory::*;
pub use sqlite::*;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// A stored row: column name to JSON value.
pub type Row = serde_json::Map<String, Value>;

/// Semantic type a dataset column was mapped to at ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    #[default]
    Unspecified,
    Numeric,
    Categorical,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub column_name: String,
    #[serde(default)]
    pub column_type: ColumnType,
    #[serde(default)]
    pub is_coordinate: bool,
}

impl ColumnMapping {
    pub fn new(column_name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            column_name: column_name.into(),
            column_type,
            is_coordinate: false,
        }
    }

    #[must_use]
    pub fn coordinate(mut self) -> Self {
        self.is_coordinate = true;
        self
    }
}

/// Column mappings of one dataset, in ingestion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetSchema {
    pub columns: Vec<ColumnMapping>,
}

impl DatasetSchema {
    pub fn new(columns: Vec<ColumnMapping>) -> Self {
        Self { columns }
    }

    /// Columns boundaries are computed for when the caller names none:
    /// numeric columns and coordinate columns.
    pub fn boundary_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.column_type == ColumnType::Numeric || c.is_coordinate)
            .map(|c| c.column_name.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetInfo {
    pub id: String,
    pub name: String,
    pub total_rows: u64,
    /// Store-wide counter bumped by every `replace_dataset`.
    pub generation: u64,
    pub created_at_ms: i64,
    pub schema: DatasetSchema,
}

/// One page of rows; `page` is 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetPage {
    pub info: DatasetInfo,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub rows: Vec<Row>,
}

pub(crate) fn total_pages(total_rows: u64, page_size: usize) -> usize {
    usize::try_from(total_rows)
        .unwrap_or(usize::MAX)
        .div_ceil(page_size)
}

pub(crate) fn check_page_size(page_size: usize) -> Result<()> {
    if page_size == 0 {
        return Err(Error::InvalidPage {
            reason: "page size must be greater than 0".to_string(),
        });
    }
    Ok(())
}

/// Running min/max/count over the finite values of one column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnAccumulator {
    pub min: f64,
    pub max: f64,
    pub count: u64,
}

impl Default for ColumnAccumulator {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            count: 0,
        }
    }
}

impl ColumnAccumulator {
    /// Non-finite values are ignored.
    pub fn push(&mut self, value: f64) {
        if value.is_finite() {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
            self.count += 1;
        }
    }

    pub fn push_json(&mut self, value: &Value) {
        if let Some(v) = parse_finite(value) {
            self.push(v);
        }
    }
}

/// Reads a cell as a finite number.
///
/// JSON numbers and strings that parse as numbers are accepted; booleans,
/// nulls, containers, NaN and infinities are not.
pub fn parse_finite(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_finite_str(s)?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

pub(crate) fn parse_finite_str(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Persistence for row-stored datasets.
pub trait DatasetStore: Send + Sync {
    /// Metadata for `dataset_id`, or `None` if it does not exist.
    fn dataset(&self, dataset_id: &str) -> Result<Option<DatasetInfo>>;

    /// Replaces the dataset's schema and every row atomically.
    ///
    /// Returns the new generation, strictly greater than any generation this
    /// store handed out before.
    fn replace_dataset(
        &self,
        dataset_id: &str,
        name: &str,
        schema: &DatasetSchema,
        rows: &[Row],
    ) -> Result<u64>;

    /// Reads page `page` (1-based, `0` is read as `1`).
    fn page(&self, dataset_id: &str, page: usize, page_size: usize) -> Result<Option<DatasetPage>>;

    /// Visits every row of the dataset in row order without collecting them.
    fn scan_rows(&self, dataset_id: &str, visit: &mut dyn FnMut(&Row)) -> Result<()>;

    /// Set-based aggregation of one column, if the store supports it.
    ///
    /// `Ok(None)` means the caller must fall back to [`Self::scan_rows`].
    fn aggregate_column(&self, _dataset_id: &str, _column: &str) -> Result<Option<ColumnAccumulator>> {
        Ok(None)
    }
}

impl<T: DatasetStore + ?Sized> DatasetStore for Arc<T> {
    fn dataset(&self, dataset_id: &str) -> Result<Option<DatasetInfo>> {
        (**self).dataset(dataset_id)
    }

    fn replace_dataset(
        &self,
        dataset_id: &str,
        name: &str,
        schema: &DatasetSchema,
        rows: &[Row],
    ) -> Result<u64> {
        (**self).replace_dataset(dataset_id, name, schema, rows)
    }

    fn page(&self, dataset_id: &str, page: usize, page_size: usize) -> Result<Option<DatasetPage>> {
        (**self).page(dataset_id, page, page_size)
    }

    fn scan_rows(&self, dataset_id: &str, visit: &mut dyn FnMut(&Row)) -> Result<()> {
        (**self).scan_rows(dataset_id, visit)
    }

    fn aggregate_column(&self, dataset_id: &str, column: &str) -> Result<Option<ColumnAccumulator>> {
        (**self).aggregate_column(dataset_id, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_numbers_and_numeric_strings_only() {
        assert_eq!(parse_finite(&json!(3)), Some(3.0));
        assert_eq!(parse_finite(&json!(-2.5)), Some(-2.5));
        assert_eq!(parse_finite(&json!(" 7.25 ")), Some(7.25));
        assert_eq!(parse_finite(&json!("1e3")), Some(1000.0));
        assert_eq!(parse_finite(&json!("abc")), None);
        assert_eq!(parse_finite(&json!("NaN")), None);
        assert_eq!(parse_finite(&json!("inf")), None);
        assert_eq!(parse_finite(&json!(true)), None);
        assert_eq!(parse_finite(&json!(null)), None);
        assert_eq!(parse_finite(&json!([1])), None);
    }

    #[test]
    fn accumulator_skips_non_finite() {
        let mut acc = ColumnAccumulator::default();
        for v in [4.0, f64::NAN, -1.0, f64::INFINITY, 9.0] {
            acc.push(v);
        }
        assert_eq!((acc.min, acc.max, acc.count), (-1.0, 9.0, 3));
    }

    #[test]
    fn boundary_columns_are_numeric_or_coordinates() {
        let schema = DatasetSchema::new(vec![
            ColumnMapping::new("lat", ColumnType::Text).coordinate(),
            ColumnMapping::new("depth", ColumnType::Numeric),
            ColumnMapping::new("site", ColumnType::Categorical),
            ColumnMapping::new("note", ColumnType::Unspecified),
        ]);
        assert_eq!(schema.boundary_columns(), vec!["lat", "depth"]);
    }

    #[test]
    fn schema_json_shape() {
        let schema: DatasetSchema = serde_json::from_str(
            r#"[{"column_name":"a","column_type":"numeric"},{"column_name":"b","is_coordinate":true}]"#,
        )
        .unwrap();
        assert_eq!(schema.columns[0].column_type, ColumnType::Numeric);
        assert!(!schema.columns[0].is_coordinate);
        assert_eq!(schema.columns[1].column_type, ColumnType::Unspecified);
        assert!(schema.columns[1].is_coordinate);
    }

    #[test]
    fn page_math() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert!(check_page_size(0).is_err());
    }
}
