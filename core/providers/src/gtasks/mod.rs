//! Google Tasks source provider for taskmirror.
//!
//! This module provides the task source backed by Google Tasks with:
//! - OAuth2 authentication with automatic token refresh
//! - Paged listing of task lists and tasks
//! - Full TaskSource trait implementation

pub mod auth;
pub mod client;
pub mod provider;

pub use auth::{AuthConfig, AuthManager, TokenManager, Tokens};
pub use client::TasksClient;
pub use provider::{GoogleTasksConfig, GoogleTasksProvider};
