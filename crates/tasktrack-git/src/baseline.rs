use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, TrackerError};

/// File name of the persisted record inside a snapshot directory
pub const BASELINE_FILE_NAME: &str = "baseline.json";

/// Reference point recorded at the start of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineRecord {
    pub head_commit: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub dirty_files: Vec<String>,
}

impl BaselineRecord {
    pub fn new(head_commit: Option<String>, dirty_files: Vec<String>) -> Self {
        Self {
            head_commit,
            timestamp: Utc::now(),
            dirty_files,
        }
    }

    pub fn path_in(snapshot_dir: &Path) -> PathBuf {
        snapshot_dir.join(BASELINE_FILE_NAME)
    }

    /// Write the record into `snapshot_dir`, creating it if needed.
    /// An existing record is replaced.
    pub async fn write(&self, snapshot_dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(snapshot_dir).await.map_err(|e| {
            TrackerError::io(
                format!("Creating snapshot directory {}", snapshot_dir.display()),
                e,
            )
        })?;

        let path = Self::path_in(snapshot_dir);
        let json = serde_json::to_string_pretty(self)?;

        // Atomic replace: readers never observe a partial record
        let tmp = snapshot_dir.join(format!("{}.tmp", BASELINE_FILE_NAME));
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| TrackerError::io(format!("Writing {}", tmp.display()), e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| TrackerError::io(format!("Replacing {}", path.display()), e))?;

        info!(
            path = %path.display(),
            head = self.head_commit.as_deref().unwrap_or("<none>"),
            dirty = self.dirty_files.len(),
            "Baseline written"
        );
        Ok(path)
    }

    /// Read the record from `snapshot_dir`; `None` when none was written
    pub async fn read(snapshot_dir: &Path) -> Result<Option<Self>> {
        let path = Self::path_in(snapshot_dir);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(TrackerError::io(format!("Reading {}", path.display()), e)),
        };

        Ok(Some(serde_json::from_str(&content)?))
    }
}
