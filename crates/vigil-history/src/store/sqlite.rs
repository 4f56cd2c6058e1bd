//! SQLite-based history persistence.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use vigil_types::RunId;

use crate::baseline::{Baseline, BaselineEntry};
use crate::error::{HistoryError, HistoryResult};
use crate::record::HistoryRecord;
use crate::store::HistoryStore;

/// SQLite-based history store.
///
/// Runs are rows of the `runs` table in insertion order; the baseline is a
/// separate `baseline` table rewritten in one transaction per promotion.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file.
    pub fn new(path: impl AsRef<Path>) -> HistoryResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory database.
    pub fn in_memory() -> HistoryResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> HistoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| HistoryError::LockError(e.to_string()))
    }

    fn init_schema(&self) -> HistoryResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                recorded_at TEXT NOT NULL,
                overall_status TEXT NOT NULL,
                data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_runs_recorded_at ON runs(recorded_at);

            CREATE TABLE IF NOT EXISTS baseline (
                metric TEXT PRIMARY KEY,
                value REAL NOT NULL,
                run_id TEXT NOT NULL,
                captured_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

fn parse_timestamp(raw: &str) -> HistoryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| HistoryError::DatabaseError(format!("bad timestamp '{raw}': {e}")))
}

#[async_trait]
impl HistoryStore for SqliteStore {
    async fn append(&self, record: &HistoryRecord) -> HistoryResult<()> {
        let data = serde_json::to_string(record)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO runs (id, recorded_at, overall_status, data) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                record.id.to_string(),
                record.recorded_at.to_rfc3339(),
                record.result.overall_status.name(),
                data,
            ],
        )?;
        Ok(())
    }

    async fn read(&self, limit: Option<usize>) -> HistoryResult<Vec<HistoryRecord>> {
        let conn = self.lock()?;
        // A negative LIMIT means no limit in SQLite.
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = conn.prepare("SELECT data FROM runs ORDER BY seq DESC LIMIT ?1")?;
        let rows = stmt.query_map(rusqlite::params![limit], |row| row.get::<_, String>(0))?;

        let mut records = Vec::new();
        for row in rows {
            let data = row?;
            match serde_json::from_str::<HistoryRecord>(&data) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping unparseable history row: {}", e),
            }
        }
        records.reverse();
        Ok(records)
    }

    async fn baseline(&self) -> HistoryResult<Baseline> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT metric, value, run_id, captured_at FROM baseline ORDER BY metric")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut baseline = Baseline::new();
        for row in rows {
            let (metric, value, run_id, captured_at) = row?;
            let run_id = RunId::parse(&run_id)
                .map_err(|e| HistoryError::DatabaseError(format!("bad run id '{run_id}': {e}")))?;
            baseline.insert(
                metric,
                BaselineEntry {
                    value,
                    run_id,
                    captured_at: parse_timestamp(&captured_at)?,
                },
            );
        }
        Ok(baseline)
    }

    async fn promote(&self, baseline: &Baseline) -> HistoryResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM baseline", [])?;
        for (metric, entry) in baseline.iter() {
            tx.execute(
                "INSERT INTO baseline (metric, value, run_id, captured_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    metric,
                    entry.value,
                    entry.run_id.to_string(),
                    entry.captured_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;
    use vigil_types::{CheckResult, CheckStatus, MetadataValue, SimulationResult};

    fn record(status: CheckStatus) -> HistoryRecord {
        let mut results = BTreeMap::new();
        results.insert("lint".to_string(), CheckResult::new("lint", status));
        HistoryRecord::new(SimulationResult::new(
            status,
            Duration::from_millis(300),
            results,
            "Executed 1 checks",
        ))
    }

    #[tokio::test]
    async fn test_sqlite_store_basic() {
        let store = SqliteStore::in_memory().unwrap();

        let first = record(CheckStatus::Success);
        let second = record(CheckStatus::Failure);
        store.append(&first).await.unwrap();
        store.append(&second).await.unwrap();

        let records = store.read(None).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, first.id);
        assert_eq!(records[1].result.overall_status, CheckStatus::Failure);

        let latest = store.read(Some(1)).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].id, second.id);
    }

    #[tokio::test]
    async fn test_sqlite_store_keeps_non_finite_metrics() {
        let store = SqliteStore::in_memory().unwrap();
        let mut run = record(CheckStatus::Success);
        run.result
            .check_results
            .get_mut("lint")
            .unwrap()
            .metadata
            .insert("lint.score".to_string(), MetadataValue::Number(f64::INFINITY));
        store.append(&run).await.unwrap();

        let records = store.read(None).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, run.id);
        assert_eq!(
            records[0].result.check_results["lint"].numeric_metric("lint.score"),
            None
        );
    }

    #[tokio::test]
    async fn test_sqlite_store_rejects_duplicate_run() {
        let store = SqliteStore::in_memory().unwrap();
        let run = record(CheckStatus::Success);
        store.append(&run).await.unwrap();
        assert!(matches!(
            store.append(&run).await,
            Err(HistoryError::DatabaseError(_))
        ));
        assert_eq!(store.read(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_store_baseline_replace() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("history.db")).unwrap();
        let run_id = RunId::new();
        let captured_at = Utc::now();

        let mut first = Baseline::new();
        first.insert("a", BaselineEntry { value: 1.0, run_id, captured_at });
        first.insert("b", BaselineEntry { value: 2.0, run_id, captured_at });
        store.promote(&first).await.unwrap();

        let mut second = Baseline::new();
        second.insert("a", BaselineEntry { value: 3.0, run_id, captured_at });
        store.promote(&second).await.unwrap();

        let loaded = store.baseline().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.value("a"), Some(3.0));
        assert_eq!(loaded.get("a").unwrap().run_id, run_id);
    }
}
