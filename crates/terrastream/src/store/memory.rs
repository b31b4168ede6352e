use super::{DatasetInfo, DatasetPage, DatasetSchema, DatasetStore, Row, check_page_size, total_pages};
use crate::{Result, SystemClock, WallClock};
use std::collections::HashMap;
use std::sync::RwLock;

/// A [`DatasetStore`] held entirely in process memory.
///
/// Has no aggregation support, so boundaries always take the scan path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    generation: u64,
    datasets: HashMap<String, (DatasetInfo, Vec<Row>)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DatasetStore for MemoryStore {
    fn dataset(&self, dataset_id: &str) -> Result<Option<DatasetInfo>> {
        let inner = self.inner.read()?;
        Ok(inner.datasets.get(dataset_id).map(|(info, _)| info.clone()))
    }

    fn replace_dataset(
        &self,
        dataset_id: &str,
        name: &str,
        schema: &DatasetSchema,
        rows: &[Row],
    ) -> Result<u64> {
        let mut inner = self.inner.write()?;
        inner.generation += 1;
        let info = DatasetInfo {
            id: dataset_id.to_string(),
            name: name.to_string(),
            total_rows: rows.len() as u64,
            generation: inner.generation,
            created_at_ms: SystemClock.now_millis(),
            schema: schema.clone(),
        };
        let generation = info.generation;
        inner
            .datasets
            .insert(dataset_id.to_string(), (info, rows.to_vec()));
        Ok(generation)
    }

    fn page(&self, dataset_id: &str, page: usize, page_size: usize) -> Result<Option<DatasetPage>> {
        check_page_size(page_size)?;
        let page = page.max(1);
        let inner = self.inner.read()?;
        let Some((info, rows)) = inner.datasets.get(dataset_id) else {
            return Ok(None);
        };
        let start = (page - 1).saturating_mul(page_size);
        Ok(Some(DatasetPage {
            info: info.clone(),
            page,
            page_size,
            total_pages: total_pages(info.total_rows, page_size),
            rows: rows.iter().skip(start).take(page_size).cloned().collect(),
        }))
    }

    fn scan_rows(&self, dataset_id: &str, visit: &mut dyn FnMut(&Row)) -> Result<()> {
        let inner = self.inner.read()?;
        if let Some((_, rows)) = inner.datasets.get(dataset_id) {
            rows.iter().for_each(visit);
        }
        Ok(())
    }
}
