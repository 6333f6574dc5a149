//! Common utilities and types shared across taskmirror crates.
//!
//! This module provides the domain model (source tasks, replica records),
//! the field mapping between the two stores, and the error taxonomy used
//! by every provider and by the reconciler.

pub mod error;
pub mod mapping;
pub mod types;

pub use error::{Error, Result};
pub use mapping::ReplicaFields;
pub use types::{ReplicaRecord, SecretString, SourceTask, TaskStatus};
