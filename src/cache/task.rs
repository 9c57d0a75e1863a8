//! Background cache task records

use serde::Serialize;

/// Lifecycle state of a background caching operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Completed or failed
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// Record of one background caching operation for one mod
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheTask {
    /// Unique per task; distinguishes a task from a later one for the same mod
    #[serde(skip)]
    pub id: u64,
    pub mod_id: String,
    pub status: TaskStatus,
    pub started_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets_count: Option<usize>,
}

impl CacheTask {
    /// A fresh pending task
    pub fn pending(id: u64, mod_id: &str, started_at: u64) -> Self {
        Self {
            id,
            mod_id: mod_id.to_string(),
            status: TaskStatus::Pending,
            started_at,
            completed_at: None,
            error: None,
            assets_count: None,
        }
    }

    /// Merge the set fields of `update` into this record
    pub fn apply(&mut self, update: TaskUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(completed_at) = update.completed_at {
            self.completed_at = Some(completed_at);
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        if let Some(assets_count) = update.assets_count {
            self.assets_count = Some(assets_count);
        }
    }
}

/// Partial set of task fields to merge into an existing record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub completed_at: Option<u64>,
    pub error: Option<String>,
    pub assets_count: Option<usize>,
}

impl TaskUpdate {
    pub fn in_progress() -> Self {
        Self {
            status: Some(TaskStatus::InProgress),
            ..Self::default()
        }
    }

    pub fn completed(at: u64, assets_count: usize) -> Self {
        Self {
            status: Some(TaskStatus::Completed),
            completed_at: Some(at),
            assets_count: Some(assets_count),
            ..Self::default()
        }
    }

    pub fn failed(at: u64, error: impl Into<String>) -> Self {
        Self {
            status: Some(TaskStatus::Failed),
            completed_at: Some(at),
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_value(TaskStatus::InProgress).unwrap(), "in_progress");
        assert_eq!(TaskStatus::Pending.as_str(), "pending");
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
    }

    #[test]
    fn test_apply_merges_only_set_fields() {
        let mut task = CacheTask::pending(1, "mod-a", 1_000);
        task.apply(TaskUpdate::in_progress());
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.completed_at, None);

        task.apply(TaskUpdate::completed(2_000, 4));
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.started_at, 1_000);
        assert_eq!(task.completed_at, Some(2_000));
        assert_eq!(task.assets_count, Some(4));
        assert_eq!(task.error, None);
    }

    #[test]
    fn test_task_json_shape() {
        let mut task = CacheTask::pending(9, "mod-a", 1_000);
        task.apply(TaskUpdate::failed(1_500, "Mod not found"));

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["modId"], "mod-a");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["startedAt"], 1_000);
        assert_eq!(json["completedAt"], 1_500);
        assert_eq!(json["error"], "Mod not found");
        assert!(json.get("id").is_none());
        assert!(json.get("assetsCount").is_none());
    }
}
