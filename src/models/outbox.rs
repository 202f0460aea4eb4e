use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::task::{Task, TaskId, TaskPatch};

/// 离线期间排队的操作，联网后按顺序重放
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PendingOp {
    Create { task: Task },
    Update { id: TaskId, patch: TaskPatch },
    Delete { id: TaskId },
}

impl PendingOp {
    pub fn task_id(&self) -> &TaskId {
        match self {
            PendingOp::Create { task } => &task.id,
            PendingOp::Update { id, .. } | PendingOp::Delete { id } => id,
        }
    }

    /// Point the op at the final id once its provisional create was confirmed.
    pub fn rewrite(self, renamed: &HashMap<TaskId, TaskId>) -> Self {
        match self {
            PendingOp::Update { id, patch } => PendingOp::Update {
                id: renamed.get(&id).cloned().unwrap_or(id),
                patch,
            },
            PendingOp::Delete { id } => PendingOp::Delete {
                id: renamed.get(&id).cloned().unwrap_or(id),
            },
            create => create,
        }
    }

    /// Replay the op on top of a task list that does not contain it yet.
    pub fn overlay(&self, tasks: &mut Vec<Task>) {
        match self {
            PendingOp::Create { task } => {
                if !tasks.iter().any(|t| t.id == task.id) {
                    tasks.push(task.clone());
                }
            }
            PendingOp::Update { id, patch } => {
                if let Some(task) = tasks.iter_mut().find(|t| &t.id == id) {
                    task.apply(patch);
                }
            }
            PendingOp::Delete { id } => tasks.retain(|t| &t.id != id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_rewrite_only_touches_renamed_ids() {
        let mut renamed = HashMap::new();
        renamed.insert(TaskId::new("temp-1"), TaskId::new("remote-1"));

        let op = PendingOp::Delete { id: TaskId::new("temp-1") }.rewrite(&renamed);
        assert_eq!(op.task_id(), &TaskId::new("remote-1"));

        let op = PendingOp::Update {
            id: TaskId::new("other"),
            patch: TaskPatch::completion(true),
        }
        .rewrite(&renamed);
        assert_eq!(op.task_id(), &TaskId::new("other"));
    }

    #[test]
    fn test_json_is_tagged() {
        let op = PendingOp::Delete { id: TaskId::new("a") };
        let json = serde_json::to_string(&op).unwrap();
        assert_eq!(json, r#"{"op":"delete","id":"a"}"#);
    }

    #[test]
    fn test_overlay_applies_patch_and_delete() {
        let task = crate::models::TaskDraft::new("t")
            .into_task(TaskId::new("a"), Utc::now(), true)
            .unwrap();
        let mut tasks = vec![task];

        PendingOp::Update {
            id: TaskId::new("a"),
            patch: TaskPatch::completion(true),
        }
        .overlay(&mut tasks);
        assert!(tasks[0].completed);

        PendingOp::Delete { id: TaskId::new("a") }.overlay(&mut tasks);
        assert!(tasks.is_empty());
    }
}
