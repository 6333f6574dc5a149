//! Reconciliation planning.
//!
//! Computes the target mutations for one cycle from a source snapshot, a
//! replica snapshot and the watermark. Records are joined on exact title.

use chrono::{DateTime, Utc};
use std::fmt;

use taskmirror_common::{ReplicaRecord, SourceTask};

/// A single mutation against the replica store.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOp {
    /// No replica carries the task's title.
    Create { task: SourceTask },
    /// Overwrite the replica that carries the task's title.
    Update { record_id: String, task: SourceTask },
    /// Trash a replica whose title is gone from the source or soft-deleted there.
    Delete { record_id: String, title: String },
}

impl fmt::Display for SyncOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOp::Create { task } => {
                write!(f, "create  '{}' ({})", task.title, task.parent_list_title)
            }
            SyncOp::Update { record_id, task } => write!(
                f,
                "update  {} <- '{}' ({})",
                record_id, task.title, task.parent_list_title
            ),
            SyncOp::Delete { record_id, title } => write!(f, "delete  {} '{}'", record_id, title),
        }
    }
}

/// Ordered mutations for one cycle: creates and updates in source order,
/// then deletes in replica order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    pub ops: Vec<SyncOp>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

/// Compute the plan for one cycle.
///
/// Only tasks updated after `watermark` are created or updated, while the
/// deletion pass scans the full source snapshot so unchanged tasks keep
/// their replicas.
pub fn plan(
    tasks: &[SourceTask],
    replicas: &[ReplicaRecord],
    watermark: DateTime<Utc>,
) -> SyncPlan {
    let mut ops = Vec::new();

    for task in tasks.iter().filter(|t| t.updated_at > watermark) {
        match replicas.iter().find(|r| r.title == task.title) {
            Some(record) => ops.push(SyncOp::Update {
                record_id: record.id.clone(),
                task: task.clone(),
            }),
            None => ops.push(SyncOp::Create { task: task.clone() }),
        }
    }

    for record in replicas {
        let counterpart = tasks.iter().find(|t| t.title == record.title);
        if counterpart.map_or(true, |t| t.deleted) {
            ops.push(SyncOp::Delete {
                record_id: record.id.clone(),
                title: record.title.clone(),
            });
        }
    }

    SyncPlan { ops }
}
