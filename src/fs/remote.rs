use log::warn;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::models::{Task, TaskId, TaskPatch};

/// The document collection behind the task store.
///
/// Every call may fail; the store treats failures as recoverable and rolls
/// back its optimistic change.
pub trait RemoteStore {
    /// 远端当前是否可达（决定走远端还是排队）
    fn is_available(&self) -> bool;

    /// All documents, newest first.
    fn fetch_all(&self) -> Result<Vec<Task>, StoreError>;

    /// Persist a new task and return the id the collection assigned. The
    /// provisional id carried by `task` is ignored.
    fn create(&mut self, task: &Task) -> Result<TaskId, StoreError>;

    fn update(&mut self, id: &TaskId, patch: &TaskPatch) -> Result<(), StoreError>;

    /// Deleting a document that is already gone succeeds.
    fn delete(&mut self, id: &TaskId) -> Result<(), StoreError>;
}

/// Directory-backed collection: one JSON document per task under
/// `<root>/tasks/`. Pointing `root` at a synced or network folder gives the
/// same online/offline behaviour as a hosted database: when the folder is not
/// mounted the store is offline.
#[derive(Debug, Clone)]
pub struct DirRemote {
    root: PathBuf,
}

impl DirRemote {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn tasks_dir(&self) -> PathBuf {
        self.root.join("tasks")
    }

    fn document_path(&self, id: &TaskId) -> Result<PathBuf, StoreError> {
        // id 直接作为文件名，拒绝路径分隔符
        let raw = id.as_str();
        if raw.is_empty() || raw.contains(['/', '\\']) || raw.starts_with('.') {
            return Err(StoreError::Validation(format!("invalid document id: {:?}", raw)));
        }
        Ok(self.tasks_dir().join(format!("{}.json", raw)))
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!(
                "{} is not reachable",
                self.root.display()
            )))
        }
    }

    fn read_document(path: &Path) -> Result<Task, StoreError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write_document(&self, task: &Task) -> Result<(), StoreError> {
        let path = self.document_path(&task.id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(task)?)?;
        Ok(())
    }
}

impl RemoteStore for DirRemote {
    fn is_available(&self) -> bool {
        self.root.is_dir()
    }

    fn fetch_all(&self) -> Result<Vec<Task>, StoreError> {
        self.ensure_available()?;

        let dir = self.tasks_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut tasks = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            match Self::read_document(&path) {
                Ok(task) => tasks.push(task),
                Err(e) => warn!(
                    "event=remote_fetch module=remote status=skip path={} error={}",
                    path.display(),
                    e
                ),
            }
        }

        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    fn create(&mut self, task: &Task) -> Result<TaskId, StoreError> {
        self.ensure_available()?;

        let id = TaskId::new(uuid::Uuid::new_v4().to_string());
        let mut document = task.clone();
        document.id = id.clone();
        self.write_document(&document)?;

        Ok(id)
    }

    fn update(&mut self, id: &TaskId, patch: &TaskPatch) -> Result<(), StoreError> {
        self.ensure_available()?;

        let path = self.document_path(id)?;
        if !path.exists() {
            return Err(StoreError::NotFound(id.clone()));
        }

        let mut task = Self::read_document(&path)?;
        task.apply(patch);
        self.write_document(&task)
    }

    fn delete(&mut self, id: &TaskId) -> Result<(), StoreError> {
        self.ensure_available()?;

        let path = self.document_path(id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
