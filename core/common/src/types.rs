//! Common types used throughout taskmirror.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

use crate::mapping::ReplicaFields;

/// Status of a task as reported by the source provider.
///
/// Unknown provider values are kept verbatim so they can be mirrored as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    NeedsAction,
    Completed,
    Other(String),
}

impl TaskStatus {
    /// The provider's wire string for this status.
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::NeedsAction => "needsAction",
            TaskStatus::Completed => "completed",
            TaskStatus::Other(s) => s,
        }
    }
}

impl From<String> for TaskStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "needsAction" => TaskStatus::NeedsAction,
            "completed" => TaskStatus::Completed,
            _ => TaskStatus::Other(s),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task fetched from the source provider.
///
/// Dates are kept as the provider's RFC 3339 strings so they can be written
/// to the target store verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTask {
    /// Provider-assigned identifier.
    pub id: String,
    /// Task title. Empty when the provider omits it.
    pub title: String,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Completion status.
    pub status: TaskStatus,
    /// Due date.
    pub due: Option<String>,
    /// Completion date, only set when completed.
    pub completed: Option<String>,
    /// Last mutation time on the provider side.
    pub updated_at: DateTime<Utc>,
    /// Whether the provider marked the task as removed.
    pub deleted: bool,
    /// Title of the list that owns this task.
    pub parent_list_title: String,
}

impl SourceTask {
    /// Create a pending task with no notes or dates.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            notes: None,
            status: TaskStatus::NeedsAction,
            due: None,
            completed: None,
            updated_at,
            deleted: false,
            parent_list_title: String::new(),
        }
    }

    /// Set the owning list title.
    pub fn with_list(mut self, list_title: impl Into<String>) -> Self {
        self.parent_list_title = list_title.into();
        self
    }

    /// Set notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Set status.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Set due date.
    pub fn with_due(mut self, due: impl Into<String>) -> Self {
        self.due = Some(due.into());
        self
    }

    /// Mark completed at the given date.
    pub fn completed_at(mut self, completed: impl Into<String>) -> Self {
        self.status = TaskStatus::Completed;
        self.completed = Some(completed.into());
        self
    }

    /// Mark as soft-deleted.
    pub fn mark_deleted(mut self) -> Self {
        self.deleted = true;
        self
    }
}

/// A task as mirrored in the target store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaRecord {
    /// Target-assigned identifier.
    pub id: String,
    pub title: String,
    pub description: String,
    /// Normalized status, `incomplete` or `completed`.
    pub status: String,
    pub due: Option<String>,
    pub completion_date: Option<String>,
    pub parent_list_title: String,
}

impl ReplicaRecord {
    /// Build a record from mapped fields and its target id.
    pub fn from_fields(id: impl Into<String>, fields: ReplicaFields) -> Self {
        Self {
            id: id.into(),
            title: fields.title,
            description: fields.description,
            status: fields.status,
            due: fields.due,
            completion_date: fields.completion_date,
            parent_list_title: fields.task_list,
        }
    }

    /// The readable fields of this record, without its id.
    pub fn fields(&self) -> ReplicaFields {
        ReplicaFields {
            title: self.title.clone(),
            description: self.description.clone(),
            status: self.status.clone(),
            task_list: self.parent_list_title.clone(),
            due: self.due.clone(),
            completion_date: self.completion_date.clone(),
        }
    }
}

/// API key or token held in memory. Zeroized on drop and redacted in Debug.
#[derive(Clone, Zeroize, Serialize, Deserialize)]
#[zeroize(drop)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    /// Wrap a secret value.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the secret for use in a request header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}
