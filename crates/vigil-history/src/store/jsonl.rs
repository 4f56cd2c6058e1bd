//! JSON-lines file persistence.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::baseline::Baseline;
use crate::error::HistoryResult;
use crate::record::HistoryRecord;
use crate::store::{HistoryStore, keep_last};

const HISTORY_FILE: &str = "history.jsonl";
const BASELINE_FILE: &str = "baseline.json";

/// File-based history store.
///
/// Each run is one JSON document on its own line of `history.jsonl`. The
/// baseline lives in `baseline.json` and is replaced atomically through a
/// temporary file and a rename.
pub struct JsonlStore {
    /// Base directory for storage.
    base_dir: PathBuf,

    /// Serializes writers within this process.
    write_lock: Mutex<()>,
}

impl JsonlStore {
    /// Create a store in `base_dir`, creating the directory if needed.
    pub async fn new(base_dir: impl AsRef<Path>) -> HistoryResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).await?;
        Ok(Self {
            base_dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn history_path(&self) -> PathBuf {
        self.base_dir.join(HISTORY_FILE)
    }

    fn baseline_path(&self) -> PathBuf {
        self.base_dir.join(BASELINE_FILE)
    }
}

#[async_trait]
impl HistoryStore for JsonlStore {
    async fn append(&self, record: &HistoryRecord) -> HistoryResult<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(self.history_path())
            .await?;

        // A writer that died mid-line leaves a torn tail; start on a fresh line.
        let len = file.metadata().await?.len();
        if len > 0 {
            file.seek(std::io::SeekFrom::Start(len - 1)).await?;
            let mut last = [0u8; 1];
            file.read_exact(&mut last).await?;
            if last[0] != b'\n' {
                tracing::warn!(path = ?self.history_path(), "history file ends mid-line");
                line.insert(0, '\n');
            }
        }
        // One write per record so concurrent appenders never interleave lines.
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        tracing::debug!(run_id = %record.id, "appended history record");
        Ok(())
    }

    async fn read(&self, limit: Option<usize>) -> HistoryResult<Vec<HistoryRecord>> {
        let path = self.history_path();
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        "Skipping unparseable history line {} in {:?}: {}",
                        line_no + 1,
                        path,
                        e
                    );
                }
            }
        }

        Ok(keep_last(records, limit))
    }

    async fn baseline(&self) -> HistoryResult<Baseline> {
        match fs::read_to_string(self.baseline_path()).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Baseline::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn promote(&self, baseline: &Baseline) -> HistoryResult<()> {
        let json = serde_json::to_string_pretty(baseline)?;
        let target = self.baseline_path();
        let staging = self.base_dir.join(format!("{BASELINE_FILE}.tmp"));

        let _guard = self.write_lock.lock().await;
        fs::write(&staging, json).await?;
        fs::rename(&staging, &target).await?;

        tracing::info!(metrics = baseline.len(), "promoted baseline");
        Ok(())
    }
}
