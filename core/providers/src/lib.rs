//! Provider abstraction for taskmirror.
//!
//! This module provides the trait-based interface to the two remote systems
//! taskmirror talks to: the source task-list provider (Google Tasks) and the
//! target replica store (a Notion database), plus in-memory implementations
//! of both for tests.
//!
//! # Design Principles
//! - Provider isolation: no provider-specific logic in the reconciler
//! - Async operations: all I/O operations are async
//! - Full snapshots: fetches return everything, no cursors survive a call
//! - Unified error semantics: consistent error types across providers

pub mod gtasks;
pub mod http;
pub mod memory;
pub mod notion;
pub mod provider;

pub use memory::{MemoryReplicaStore, MemoryTaskSource, StoreCall};
pub use provider::{ReplicaStore, TaskSource};
