use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::StoreError;
use crate::models::{PendingOp, Task};

/// 本地缓存内容：最近一次的任务列表和尚未同步的操作
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheState {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub outbox: Vec<PendingOp>,
}

/// JSON file holding the last known task list, used while the remote store is
/// unreachable.
#[derive(Debug, Clone)]
pub struct LocalCache {
    path: PathBuf,
}

impl LocalCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the cache. A missing file is an empty cache; a corrupt file is
    /// logged and treated as empty so startup never fails on it.
    pub fn load(&self) -> Result<CacheState, StoreError> {
        if !self.path.exists() {
            return Ok(CacheState::default());
        }

        let content = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(state) => Ok(state),
            Err(e) => {
                error!(
                    "event=cache_load module=cache status=error path={} error={}",
                    self.path.display(),
                    e
                );
                Ok(CacheState::default())
            }
        }
    }

    pub fn save(&self, state: &CacheState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(state)?;

        // 先写临时文件再重命名，避免写到一半留下损坏的缓存
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)?;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            warn!(
                "event=cache_save module=cache status=retry path={} error={}",
                self.path.display(),
                e
            );
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TaskDraft, TaskId, TaskPatch};
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::new(dir.path().join("cache.json"));
        assert_eq!(cache.load().unwrap(), CacheState::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::new(dir.path().join("nested").join("cache.json"));

        let task = TaskDraft::new("Buy milk")
            .into_task(TaskId::new("temp-1"), Utc::now(), true)
            .unwrap();
        let state = CacheState {
            tasks: vec![task.clone()],
            outbox: vec![
                PendingOp::Create { task },
                PendingOp::Update {
                    id: TaskId::new("temp-1"),
                    patch: TaskPatch::completion(true),
                },
            ],
        };

        cache.save(&state).unwrap();
        assert_eq!(cache.load().unwrap(), state);
        assert!(!dir.path().join("nested").join("cache.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{ not json").unwrap();

        let cache = LocalCache::new(&path);
        assert_eq!(cache.load().unwrap(), CacheState::default());
    }
}
