//! Per-column value ranges over a stored dataset.

use crate::{ColumnAccumulator, DatasetPage, DatasetStore, Result};
use std::collections::BTreeMap;

/// Largest page size that still gets boundaries attached on a page read.
pub const BOUNDARY_PAGE_THRESHOLD: usize = 15_000;

/// Page reads retried when the dataset is replaced mid-read.
const SNAPSHOT_ATTEMPTS: usize = 3;

/// Padded `[min_value, max_value]` of one column's finite values.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBoundary {
    pub column_name: String,
    pub min_value: f64,
    pub max_value: f64,
    pub valid_count: u64,
}

impl ColumnBoundary {
    /// `None` when the column held no finite value.
    pub fn from_accumulator(column_name: &str, acc: &ColumnAccumulator) -> Option<Self> {
        if acc.count == 0 {
            return None;
        }
        let (min_value, max_value) = pad_range(acc.min, acc.max);
        Some(Self {
            column_name: column_name.to_string(),
            min_value,
            max_value,
            valid_count: acc.count,
        })
    }
}

/// Widens a raw range so chart axes never collapse to zero width.
///
/// A single value is padded by 10% of its magnitude (or by 1 at zero);
/// any other range by 5% of its width on each side.
pub fn pad_range(min: f64, max: f64) -> (f64, f64) {
    let padding = if min == max {
        if min == 0.0 { 1.0 } else { min.abs() * 0.1 }
    } else {
        (max - min) * 0.05
    };
    (min - padding, max + padding)
}

/// A page of rows with boundaries for the whole dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedPage {
    pub page: DatasetPage,
    /// Empty when the page size exceeded the engine's threshold.
    pub boundaries: BTreeMap<String, ColumnBoundary>,
}

/// Computes column boundaries over a [`DatasetStore`].
///
/// Columns the store can aggregate in place are never decoded row by row;
/// the rest are collected together in a single streaming scan.
#[derive(Debug, Clone)]
pub struct BoundaryEngine<S> {
    store: S,
    page_threshold: usize,
}

impl<S: DatasetStore> BoundaryEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            page_threshold: BOUNDARY_PAGE_THRESHOLD,
        }
    }

    #[must_use]
    pub fn with_page_threshold(mut self, page_threshold: usize) -> Self {
        self.page_threshold = page_threshold;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn page_threshold(&self) -> usize {
        self.page_threshold
    }

    /// Boundaries for `columns`, or for the schema's numeric and coordinate
    /// columns when `columns` is empty.
    ///
    /// A missing dataset yields an empty map. Columns without a single finite
    /// value are left out.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn compute_boundaries(
        &self,
        dataset_id: &str,
        columns: &[String],
    ) -> Result<BTreeMap<String, ColumnBoundary>> {
        let Some(info) = self.store.dataset(dataset_id)? else {
            return Ok(BTreeMap::new());
        };
        let targets = if columns.is_empty() {
            info.schema.boundary_columns()
        } else {
            columns.to_vec()
        };

        let mut accumulators: BTreeMap<String, ColumnAccumulator> = BTreeMap::new();
        let mut pending: Vec<String> = Vec::new();
        for column in targets {
            if accumulators.contains_key(&column) || pending.contains(&column) {
                continue;
            }
            match self.store.aggregate_column(dataset_id, &column)? {
                Some(acc) => {
                    accumulators.insert(column, acc);
                }
                None => pending.push(column),
            }
        }

        if !pending.is_empty() {
            let mut scanned = vec![ColumnAccumulator::default(); pending.len()];
            self.store.scan_rows(dataset_id, &mut |row| {
                for (column, acc) in pending.iter().zip(scanned.iter_mut()) {
                    if let Some(v) = row.get(column) {
                        acc.push_json(v);
                    }
                }
            })?;
            accumulators.extend(pending.into_iter().zip(scanned));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(dataset_id, columns = accumulators.len(), "boundaries computed");

        Ok(accumulators
            .iter()
            .filter_map(|(name, acc)| {
                ColumnBoundary::from_accumulator(name, acc).map(|b| (name.clone(), b))
            })
            .collect())
    }

    /// Reads one page and, when `page_size` is within the threshold, the
    /// dataset's boundaries.
    ///
    /// Page and boundaries always describe the same generation. If the
    /// dataset keeps being replaced while boundaries are computed, the page
    /// is returned without them.
    ///
    /// # Errors
    ///
    /// Propagates store failures and rejects a zero page size.
    pub fn read_page(
        &self,
        dataset_id: &str,
        page: usize,
        page_size: usize,
        columns: &[String],
    ) -> Result<Option<BoundedPage>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let Some(read) = self.store.page(dataset_id, page, page_size)? else {
                return Ok(None);
            };
            if page_size > self.page_threshold {
                return Ok(Some(BoundedPage {
                    page: read,
                    boundaries: BTreeMap::new(),
                }));
            }

            let boundaries = self.compute_boundaries(dataset_id, columns)?;
            let current = self.store.dataset(dataset_id)?.map(|info| info.generation);
            if current == Some(read.info.generation) {
                return Ok(Some(BoundedPage { page: read, boundaries }));
            }

            #[cfg(feature = "tracing")]
            tracing::debug!(
                dataset_id,
                attempt,
                read = read.info.generation,
                ?current,
                "dataset replaced during page read"
            );

            if attempt == SNAPSHOT_ATTEMPTS {
                #[cfg(feature = "tracing")]
                tracing::warn!(dataset_id, "boundaries dropped, dataset kept changing");
                return Ok(Some(BoundedPage {
                    page: read,
                    boundaries: BTreeMap::new(),
                }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ColumnMapping, ColumnType, DatasetInfo, DatasetSchema, MemoryStore, Row, SqliteStore,
    };
    use serde_json::json;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    fn row(v: serde_json::Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    fn schema() -> DatasetSchema {
        DatasetSchema::new(vec![
            ColumnMapping::new("value", ColumnType::Numeric),
            ColumnMapping::new("lng", ColumnType::Text).coordinate(),
            ColumnMapping::new("label", ColumnType::Categorical),
            ColumnMapping::new("empty", ColumnType::Numeric),
        ])
    }

    fn rows() -> Vec<Row> {
        (0..=100)
            .map(|i| {
                row(json!({
                    "value": i,
                    "lng": format!("{}", -120.0 + f64::from(i) / 10.0),
                    "label": "x",
                    "empty": "n/a",
                    "we\"ird": 7,
                }))
            })
            .collect()
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn padding_rules() {
        assert_eq!(pad_range(10.0, 10.0), (9.0, 11.0));
        assert_eq!(pad_range(0.0, 0.0), (-1.0, 1.0));
        assert_eq!(pad_range(-10.0, -10.0), (-11.0, -9.0));
        assert_eq!(pad_range(0.0, 100.0), (-5.0, 105.0));
    }

    fn check_engine<S: DatasetStore>(engine: &BoundaryEngine<S>) {
        engine.store().replace_dataset("d", "d", &schema(), &rows()).unwrap();

        let b = engine.compute_boundaries("d", &[]).unwrap();
        let keys: Vec<_> = b.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["lng", "value"]);
        assert_eq!(b["value"].min_value, -5.0);
        assert_eq!(b["value"].max_value, 105.0);
        assert_eq!(b["value"].valid_count, 101);
        assert_close(b["lng"].min_value, -120.0 - 0.5);
        assert_close(b["lng"].max_value, -110.0 + 0.5);

        let explicit = engine
            .compute_boundaries("d", &["we\"ird".to_string(), "label".to_string()])
            .unwrap();
        assert_eq!(explicit.len(), 1);
        assert_close(explicit["we\"ird"].min_value, 6.3);
        assert_eq!(explicit["we\"ird"].valid_count, 101);

        assert!(engine.compute_boundaries("missing", &[]).unwrap().is_empty());
    }

    #[test]
    fn memory_engine_scans() {
        check_engine(&BoundaryEngine::new(MemoryStore::new()));
    }

    #[test]
    fn sqlite_engine_aggregates() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::open(dir.path().join("b.db")).unwrap());
        check_engine(&BoundaryEngine::new(store));
    }

    #[test]
    fn page_reads_attach_boundaries_under_threshold() {
        let engine = BoundaryEngine::new(MemoryStore::new()).with_page_threshold(50);
        engine.store().replace_dataset("d", "d", &schema(), &rows()).unwrap();

        let small = engine.read_page("d", 1, 50, &[]).unwrap().unwrap();
        assert_eq!(small.page.rows.len(), 50);
        assert_eq!(small.page.total_pages, 3);
        assert_eq!(small.boundaries.len(), 2);

        let big = engine.read_page("d", 1, 51, &[]).unwrap().unwrap();
        assert!(big.boundaries.is_empty());

        assert!(engine.read_page("missing", 1, 10, &[]).unwrap().is_none());
    }

    /// Replaces its dataset right before each of the first `swaps` scans.
    struct ReplacedDuringScan {
        inner: MemoryStore,
        swaps: AtomicUsize,
    }

    impl ReplacedDuringScan {
        fn new(swaps: usize) -> Self {
            let inner = MemoryStore::new();
            inner.replace_dataset("d", "d", &schema(), &rows()).unwrap();
            Self {
                inner,
                swaps: AtomicUsize::new(swaps),
            }
        }
    }

    impl DatasetStore for ReplacedDuringScan {
        fn dataset(&self, dataset_id: &str) -> Result<Option<DatasetInfo>> {
            self.inner.dataset(dataset_id)
        }

        fn replace_dataset(
            &self,
            dataset_id: &str,
            name: &str,
            schema: &DatasetSchema,
            rows: &[Row],
        ) -> Result<u64> {
            self.inner.replace_dataset(dataset_id, name, schema, rows)
        }

        fn page(&self, dataset_id: &str, page: usize, page_size: usize) -> Result<Option<DatasetPage>> {
            self.inner.page(dataset_id, page, page_size)
        }

        fn scan_rows(&self, dataset_id: &str, visit: &mut dyn FnMut(&Row)) -> Result<()> {
            let left = self.swaps.load(Ordering::SeqCst);
            if left > 0 {
                self.swaps.store(left - 1, Ordering::SeqCst);
                let shifted: Vec<Row> = (1_000..=1_100).map(|i| row(json!({ "value": i }))).collect();
                self.inner.replace_dataset(dataset_id, "d", &schema(), &shifted)?;
            }
            self.inner.scan_rows(dataset_id, visit)
        }
    }

    #[test]
    fn page_and_boundaries_share_a_generation() {
        let engine = BoundaryEngine::new(ReplacedDuringScan::new(1));
        let read = engine.read_page("d", 1, 10, &["value".to_string()]).unwrap().unwrap();

        assert_eq!(read.page.info.generation, 2);
        assert_eq!(read.page.rows[0]["value"], json!(1_000));
        assert_eq!(read.boundaries["value"].min_value, 995.0);
        assert_eq!(read.boundaries["value"].max_value, 1_105.0);
    }

    #[test]
    fn endless_replacement_drops_boundaries() {
        let engine = BoundaryEngine::new(ReplacedDuringScan::new(usize::MAX));
        let read = engine.read_page("d", 1, 10, &[]).unwrap().unwrap();

        assert_eq!(read.page.rows.len(), 10);
        assert!(read.boundaries.is_empty());
        assert_eq!(engine.store().swaps.load(Ordering::SeqCst), usize::MAX - SNAPSHOT_ATTEMPTS);
    }
}
