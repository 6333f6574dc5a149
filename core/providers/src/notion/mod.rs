//! Notion replica store for taskmirror.
//!
//! This module provides the replica store backed by a Notion database with:
//! - Cursor-paged database queries that skip trashed pages
//! - Full-overwrite page updates and soft deletion through the trash
//! - Database provisioning with the replica property schema

pub mod client;
pub mod provider;
pub mod schema;

pub use client::{NotionClient, NotionDatabase, NotionPage};
pub use provider::{ensure_database, NotionConfig, NotionProvider, Provisioned};
