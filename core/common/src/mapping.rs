//! Field mapping from a source task to its replica representation.

use serde::{Deserialize, Serialize};

use crate::types::{SourceTask, TaskStatus};

pub const DEFAULT_TITLE: &str = "No title";
pub const DEFAULT_DESCRIPTION: &str = "No description";
pub const DEFAULT_STATUS: &str = "No status";
pub const DEFAULT_TASK_LIST: &str = "No task list";

/// Replica status written for a pending task.
pub const STATUS_INCOMPLETE: &str = "incomplete";
/// Replica status written for a finished task.
pub const STATUS_COMPLETED: &str = "completed";

/// The readable fields of a replica record, as produced from a source task.
///
/// Every create and update writes all of these; absent dates clear the
/// corresponding target property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaFields {
    pub title: String,
    pub description: String,
    pub status: String,
    pub task_list: String,
    pub due: Option<String>,
    pub completion_date: Option<String>,
}

impl ReplicaFields {
    /// Map a source task onto replica fields, filling defaults for empty values.
    pub fn from_task(task: &SourceTask) -> Self {
        Self {
            title: non_empty_or(Some(&task.title), DEFAULT_TITLE),
            description: non_empty_or(task.notes.as_deref(), DEFAULT_DESCRIPTION),
            status: map_status(&task.status),
            task_list: non_empty_or(Some(&task.parent_list_title), DEFAULT_TASK_LIST),
            due: task.due.clone().filter(|d| !d.is_empty()),
            completion_date: task.completed.clone().filter(|d| !d.is_empty()),
        }
    }
}

/// `needsAction` becomes `incomplete`; anything else passes through verbatim.
pub fn map_status(status: &TaskStatus) -> String {
    match status {
        TaskStatus::NeedsAction => STATUS_INCOMPLETE.to_string(),
        TaskStatus::Completed => STATUS_COMPLETED.to_string(),
        TaskStatus::Other(s) if s.is_empty() => DEFAULT_STATUS.to_string(),
        TaskStatus::Other(s) => s.clone(),
    }
}

fn non_empty_or(value: Option<&str>, default: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    #[test]
    fn test_status_mapping() {
        let pending = SourceTask::new("1", "a", Utc::now());
        assert_eq!(ReplicaFields::from_task(&pending).status, "incomplete");

        let done = pending.clone().with_status(TaskStatus::Completed);
        assert_eq!(ReplicaFields::from_task(&done).status, "completed");

        let empty = pending.with_status(TaskStatus::Other(String::new()));
        assert_eq!(ReplicaFields::from_task(&empty).status, "No status");
    }

    #[test]
    fn test_defaults_for_missing_values() {
        let task = SourceTask::new("1", "", Utc::now());
        let fields = ReplicaFields::from_task(&task);

        assert_eq!(fields.title, DEFAULT_TITLE);
        assert_eq!(fields.description, DEFAULT_DESCRIPTION);
        assert_eq!(fields.task_list, DEFAULT_TASK_LIST);
        assert_eq!(fields.due, None);
        assert_eq!(fields.completion_date, None);
    }

    #[test]
    fn test_dates_copied_verbatim() {
        let task = SourceTask::new("1", "Pay rent", Utc::now())
            .with_list("Home")
            .with_notes("before the 5th")
            .with_due("2024-03-01T00:00:00.000Z")
            .completed_at("2024-02-28T10:00:00.000Z");
        let fields = ReplicaFields::from_task(&task);

        assert_eq!(fields.title, "Pay rent");
        assert_eq!(fields.description, "before the 5th");
        assert_eq!(fields.task_list, "Home");
        assert_eq!(fields.due.as_deref(), Some("2024-03-01T00:00:00.000Z"));
        assert_eq!(
            fields.completion_date.as_deref(),
            Some("2024-02-28T10:00:00.000Z")
        );
    }

    proptest! {
        #[test]
        fn prop_non_empty_title_preserved(title in "[A-Za-z0-9 ]{1,40}") {
            let task = SourceTask::new("id", title.clone(), Utc::now());
            prop_assert_eq!(ReplicaFields::from_task(&task).title, title);
        }

        #[test]
        fn prop_unknown_status_passes_through(status in "[a-z]{1,12}") {
            prop_assume!(status != "completed");
            let task = SourceTask::new("id", "t", Utc::now())
                .with_status(TaskStatus::from(status.clone()));
            prop_assert_eq!(ReplicaFields::from_task(&task).status, status);
        }
    }
}
