//! JSON file history backend.
//!
//! The history is one JSON object mapping task id to task. Saves write a
//! sibling temporary file and rename it over the target, so a crash
//! mid-write leaves the previous history intact. A file that cannot be
//! parsed is renamed to `<name>.corrupt-<UTC timestamp>` when set aside.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use super::HistoryBackend;
use crate::error::PersistenceError;
use crate::reconcile::TaskUniverse;

/// [`HistoryBackend`] stored in a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// A backend reading and writing `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The history file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling(".tmp")
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "history.json".into());
        name.push(suffix);
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl HistoryBackend for JsonFileBackend {
    async fn load(&self) -> Result<TaskUniverse, PersistenceError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no history file yet");
                return Ok(TaskUniverse::new());
            },
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: self.path.clone(),
                    source,
                })
            },
        };

        if content.trim().is_empty() {
            return Ok(TaskUniverse::new());
        }

        serde_json::from_str(&content).map_err(|e| PersistenceError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    async fn save(&self, tasks: &TaskUniverse) -> Result<(), PersistenceError> {
        let json = serde_json::to_vec_pretty(tasks)
            .map_err(|e| PersistenceError::Serialize(e.to_string()))?;

        let write_error = |source| PersistenceError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &json).await.map_err(write_error)?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(write_error)?;

        debug!(path = %self.path.display(), tasks = tasks.len(), "task history saved");
        Ok(())
    }

    async fn set_aside(&self) -> Result<Option<String>, PersistenceError> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(None);
        }

        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let target = self.sibling(&format!(".corrupt-{stamp}"));
        tokio::fs::rename(&self.path, &target)
            .await
            .map_err(|source| PersistenceError::Write {
                path: target.clone(),
                source,
            })?;
        Ok(Some(target.display().to_string()))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Assignment, Task, TaskStatus};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn task(id: &str) -> Task {
        Task::new(
            id.to_string(),
            Utc.with_ymd_and_hms(2025, 1, 10, 11, 0, 0).unwrap(),
            "08:00".to_string(),
            "Acme".to_string(),
            "Import".to_string(),
        )
    }

    #[tokio::test]
    async fn missing_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("history.json"));
        assert!(backend.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load_preserves_operator_fields() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("data").join("history.json"));

        let mut scheduled = task("a");
        scheduled.status = TaskStatus::Scheduled;
        scheduled.assignment = Some(Assignment {
            dock_id: "dock-3".to_string(),
            time: "09:15".to_string(),
        });
        let tasks = TaskUniverse::from([
            ("a".to_string(), scheduled),
            ("b".to_string(), task("b")),
        ]);

        backend.save(&tasks).await.unwrap();
        assert_eq!(backend.load().await.unwrap(), tasks);
        assert!(!backend.temp_path().exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonFileBackend::new(&path).load().await.unwrap_err();
        assert!(matches!(err, PersistenceError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn set_aside_keeps_the_unreadable_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{ not json").unwrap();
        let backend = JsonFileBackend::new(&path);

        let moved = PathBuf::from(backend.set_aside().await.unwrap().unwrap());
        assert!(!path.exists());
        assert!(moved
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("history.json.corrupt-"));
        assert_eq!(std::fs::read_to_string(&moved).unwrap(), "{ not json");

        backend.save(&TaskUniverse::new()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&moved).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn set_aside_without_a_file_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("history.json"));
        assert_eq!(backend.set_aside().await.unwrap(), None);
    }

    #[tokio::test]
    async fn history_file_is_a_map_of_id_to_task() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let backend = JsonFileBackend::new(&path);
        backend
            .save(&TaskUniverse::from([("a".to_string(), task("a"))]))
            .await
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["a"]["client"], "Acme");
        assert_eq!(raw["a"]["status"], "Waiting");
    }
}
