use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::deadline::{remaining_time, RemainingTime};
use crate::error::StoreError;

/// 临时 ID 前缀（远端确认前使用）
pub const PROVISIONAL_PREFIX: &str = "temp-";

/// Opaque task identifier.
///
/// Locally created tasks carry a `temp-<millis>` id until the remote store
/// assigns the final one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn provisional(now: DateTime<Utc>) -> Self {
        Self(format!("{}{}", PROVISIONAL_PREFIX, now.timestamp_millis()))
    }

    pub fn is_provisional(&self) -> bool {
        self.0.starts_with(PROVISIONAL_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn default_include_last_day() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_include_last_day")]
    pub include_last_day: bool,
}

impl Task {
    /// Apply a partial update. `id` and `created_at` are never touched.
    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(title) = &patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = &patch.description {
            self.description = description.trim().to_string();
        }
        if let Some(deadline) = patch.deadline {
            self.deadline = deadline;
        }
        if let Some(include_last_day) = patch.include_last_day {
            self.include_last_day = include_last_day;
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> RemainingTime {
        remaining_time(now, self.deadline, self.include_last_day)
    }

    /// 截止时间已过且未完成
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.remaining(now) == RemainingTime::Overdue
    }
}

/// 用户创建任务时提交的字段
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub deadline: Option<DateTime<Utc>>,
    /// `None` 时使用配置中的默认值
    pub include_last_day: Option<bool>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn into_task(
        self,
        id: TaskId,
        created_at: DateTime<Utc>,
        default_include_last_day: bool,
    ) -> Result<Task, StoreError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(StoreError::Validation("title cannot be empty".to_string()));
        }

        Ok(Task {
            id,
            title: title.to_string(),
            description: self.description.trim().to_string(),
            deadline: self.deadline,
            completed: false,
            created_at,
            include_last_day: self.include_last_day.unwrap_or(default_include_last_day),
        })
    }
}

/// Partial update of a task.
///
/// `deadline` is doubly optional: `Some(None)` clears the deadline, `None`
/// leaves it untouched. The outbox persists patches, so the distinction has to
/// survive a JSON round trip (`null` vs. a missing key).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub deadline: Option<Option<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_last_day: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn completion(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(StoreError::Validation("title cannot be empty".to_string()));
            }
        }
        Ok(())
    }
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn sample() -> Task {
        TaskDraft {
            title: "  Write report ".to_string(),
            description: "quarterly".to_string(),
            deadline: Some(at("2026-01-08T03:00:00Z")),
            include_last_day: None,
        }
        .into_task(TaskId::new("abc"), at("2026-01-05T00:00:00Z"), true)
        .unwrap()
    }

    #[test]
    fn test_draft_trims_and_applies_defaults() {
        let task = sample();
        assert_eq!(task.title, "Write report");
        assert!(!task.completed);
        assert!(task.include_last_day);
        assert_eq!(task.created_at, at("2026-01-05T00:00:00Z"));
    }

    #[test]
    fn test_draft_rejects_blank_title() {
        let result = TaskDraft::new("   ").into_task(TaskId::new("x"), Utc::now(), true);
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_provisional_id() {
        let id = TaskId::provisional(at("2026-01-05T00:00:00Z"));
        assert!(id.is_provisional());
        assert_eq!(id.as_str(), "temp-1767571200000");
        assert!(!TaskId::new("4f1c").is_provisional());
    }

    #[test]
    fn test_patch_keeps_id_and_created_at() {
        let mut task = sample();
        let patch = TaskPatch {
            title: Some("Renamed".to_string()),
            deadline: Some(None),
            completed: Some(true),
            ..TaskPatch::default()
        };
        task.apply(&patch);

        assert_eq!(task.id, TaskId::new("abc"));
        assert_eq!(task.created_at, at("2026-01-05T00:00:00Z"));
        assert_eq!(task.title, "Renamed");
        assert_eq!(task.deadline, None);
        assert!(task.completed);
        assert_eq!(task.description, "quarterly");
    }

    #[test]
    fn test_patch_json_distinguishes_clear_from_untouched() {
        let clear = TaskPatch {
            deadline: Some(None),
            ..TaskPatch::default()
        };
        let json = serde_json::to_string(&clear).unwrap();
        assert_eq!(json, r#"{"deadline":null}"#);
        let back: TaskPatch = serde_json::from_str(&json).unwrap();
        assert_eq!(back.deadline, Some(None));

        let untouched: TaskPatch = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert_eq!(untouched.deadline, None);
    }

    #[test]
    fn test_task_document_uses_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("includeLastDay").is_some());

        // 旧文档缺少 includeLastDay 时默认为 true
        let legacy: Task = serde_json::from_str(
            r#"{"id":"a","title":"t","createdAt":"2026-01-05T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(legacy.include_last_day);
        assert!(!legacy.completed);
    }

    #[test]
    fn test_overdue_requires_incomplete() {
        let mut task = sample();
        let later = at("2026-01-09T00:00:00Z");
        assert!(task.is_overdue(later));
        task.completed = true;
        assert!(!task.is_overdue(later));
    }
}
