use super::{
    ColumnAccumulator, DatasetInfo, DatasetPage, DatasetSchema, DatasetStore, Row, check_page_size,
    parse_finite_str, total_pages,
};
use crate::{Result, SystemClock, WallClock};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS datasets (
        id              TEXT PRIMARY KEY,
        name            TEXT NOT NULL,
        total_rows      INTEGER NOT NULL,
        column_mappings TEXT NOT NULL,
        generation      INTEGER NOT NULL,
        created_at      INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS dataset_data (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        dataset_id TEXT NOT NULL,
        row_index  INTEGER NOT NULL,
        data       TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_dataset_data_dataset_id ON dataset_data(dataset_id);
    CREATE INDEX IF NOT EXISTS idx_dataset_data_row_index ON dataset_data(dataset_id, row_index);
";

/// Scalar SQL function `(json_type, value) -> finite REAL | NULL`.
const FINITE_NUMBER_FN: &str = "ts_finite_number";

/// A [`DatasetStore`] backed by a SQLite file.
///
/// Every operation opens its own connection; nothing is shared between
/// calls except the file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Creates the file and tables if missing.
    ///
    /// # Errors
    ///
    /// Fails if the parent directory cannot be created or the schema cannot
    /// be applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self { path };
        store.connect()?.execute_batch(SCHEMA)?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.create_scalar_function(
            FINITE_NUMBER_FN,
            2,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let json_type = ctx.get_raw(0).as_str().unwrap_or("null");
                Ok(match (json_type, ctx.get_raw(1)) {
                    ("integer", ValueRef::Integer(i)) => Some(i as f64),
                    ("real" | "integer", ValueRef::Real(f)) => f.is_finite().then_some(f),
                    ("text", ValueRef::Text(t)) => std::str::from_utf8(t).ok().and_then(parse_finite_str),
                    _ => None,
                })
            },
        )?;
        Ok(conn)
    }

    fn read_info(conn: &Connection, dataset_id: &str) -> Result<Option<DatasetInfo>> {
        let raw = conn
            .query_row(
                "SELECT name, total_rows, column_mappings, generation, created_at
                 FROM datasets WHERE id = ?1",
                params![dataset_id],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, i64>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, i64>(3)?,
                        r.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((name, total_rows, mappings, generation, created_at_ms)) = raw else {
            return Ok(None);
        };
        Ok(Some(DatasetInfo {
            id: dataset_id.to_string(),
            name,
            total_rows: u64::try_from(total_rows).unwrap_or(0),
            generation: u64::try_from(generation).unwrap_or(0),
            created_at_ms,
            schema: serde_json::from_str(&mappings)?,
        }))
    }
}

/// `$."column"`, or `None` when the name cannot be quoted in a JSON path.
fn json_path(column: &str) -> Option<String> {
    (!column.contains('"') && !column.contains('\\')).then(|| format!("$.\"{column}\""))
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

impl DatasetStore for SqliteStore {
    fn dataset(&self, dataset_id: &str) -> Result<Option<DatasetInfo>> {
        Self::read_info(&self.connect()?, dataset_id)
    }

    fn replace_dataset(
        &self,
        dataset_id: &str,
        name: &str,
        schema: &DatasetSchema,
        rows: &[Row],
    ) -> Result<u64> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let generation: i64 = tx.query_row(
            "SELECT COALESCE(MAX(generation), 0) + 1 FROM datasets",
            [],
            |r| r.get(0),
        )?;

        tx.execute("DELETE FROM dataset_data WHERE dataset_id = ?1", params![dataset_id])?;
        tx.execute(
            "INSERT OR REPLACE INTO datasets
                 (id, name, total_rows, column_mappings, generation, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                dataset_id,
                name,
                to_i64(rows.len()),
                serde_json::to_string(schema)?,
                generation,
                SystemClock.now_millis(),
            ],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO dataset_data (dataset_id, row_index, data) VALUES (?1, ?2, ?3)",
            )?;
            for (i, row) in rows.iter().enumerate() {
                stmt.execute(params![dataset_id, to_i64(i), serde_json::to_string(row)?])?;
            }
        }
        tx.commit()?;

        #[cfg(feature = "tracing")]
        tracing::debug!(dataset_id, rows = rows.len(), generation, "dataset replaced");

        Ok(u64::try_from(generation).unwrap_or(0))
    }

    fn page(&self, dataset_id: &str, page: usize, page_size: usize) -> Result<Option<DatasetPage>> {
        check_page_size(page_size)?;
        let page = page.max(1);
        let conn = self.connect()?;
        let Some(info) = Self::read_info(&conn, dataset_id)? else {
            return Ok(None);
        };

        let offset = (page - 1).saturating_mul(page_size);
        let mut stmt = conn.prepare(
            "SELECT data FROM dataset_data WHERE dataset_id = ?1
             ORDER BY row_index LIMIT ?2 OFFSET ?3",
        )?;
        let mut rows = Vec::with_capacity(page_size.min(1024));
        let mut cursor = stmt.query(params![dataset_id, to_i64(page_size), to_i64(offset)])?;
        while let Some(r) = cursor.next()? {
            let data: String = r.get(0)?;
            rows.push(serde_json::from_str(&data)?);
        }

        Ok(Some(DatasetPage {
            total_pages: total_pages(info.total_rows, page_size),
            info,
            page,
            page_size,
            rows,
        }))
    }

    fn scan_rows(&self, dataset_id: &str, visit: &mut dyn FnMut(&Row)) -> Result<()> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT data FROM dataset_data WHERE dataset_id = ?1 ORDER BY row_index")?;
        let mut cursor = stmt.query(params![dataset_id])?;
        while let Some(r) = cursor.next()? {
            let data: String = r.get(0)?;
            let row: Row = serde_json::from_str(&data)?;
            visit(&row);
        }
        Ok(())
    }

    fn aggregate_column(&self, dataset_id: &str, column: &str) -> Result<Option<ColumnAccumulator>> {
        let Some(path) = json_path(column) else {
            return Ok(None);
        };
        let conn = self.connect()?;
        let (min, max, count): (Option<f64>, Option<f64>, i64) = conn.query_row(
            &format!(
                "SELECT MIN(v), MAX(v), COUNT(v) FROM (
                     SELECT {FINITE_NUMBER_FN}(json_type(data, ?2), json_extract(data, ?2)) AS v
                     FROM dataset_data WHERE dataset_id = ?1
                 )"
            ),
            params![dataset_id, path],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?;

        Ok(Some(match (min, max) {
            (Some(min), Some(max)) if count > 0 => ColumnAccumulator {
                min,
                max,
                count: u64::try_from(count).unwrap_or(0),
            },
            _ => ColumnAccumulator::default(),
        }))
    }
}
