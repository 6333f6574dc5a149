//! Notion replica store implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use taskmirror_common::{Error, ReplicaFields, ReplicaRecord, Result, SecretString, SourceTask};

use super::client::{NotionClient, NOTION_API_BASE};
use super::schema::{database_properties, page_properties, parse_page, DATABASE_TITLE};
use crate::http::DEFAULT_TIMEOUT;
use crate::provider::ReplicaStore;

/// Notion provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    /// Integration token.
    pub api_key: SecretString,
    /// Database holding the replica records.
    pub database_id: String,
    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

fn default_base_url() -> String {
    NOTION_API_BASE.to_string()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl NotionConfig {
    /// Create a configuration against the public API.
    pub fn new(api_key: SecretString, database_id: impl Into<String>) -> Self {
        Self {
            api_key,
            database_id: database_id.into(),
            base_url: default_base_url(),
            timeout: default_timeout(),
        }
    }
}

/// Notion replica store.
///
/// Implements the ReplicaStore trait with one database page per task.
pub struct NotionProvider {
    client: NotionClient,
    database_id: String,
}

impl NotionProvider {
    /// Create a new Notion provider.
    ///
    /// # Errors
    /// - Empty database id
    /// - Invalid base URL
    pub fn new(config: NotionConfig) -> Result<Self> {
        if config.database_id.is_empty() {
            return Err(Error::Config("Notion database id is empty".to_string()));
        }
        let client = NotionClient::with_base_url(config.api_key, &config.base_url, config.timeout)?;
        Ok(Self {
            client,
            database_id: config.database_id,
        })
    }

    /// Create a provider from an existing client.
    pub fn from_client(client: NotionClient, database_id: impl Into<String>) -> Self {
        Self {
            client,
            database_id: database_id.into(),
        }
    }
}

#[async_trait]
impl ReplicaStore for NotionProvider {
    fn name(&self) -> &str {
        "notion"
    }

    async fn fetch_all(&self) -> Result<Vec<ReplicaRecord>> {
        let pages = self.client.query_database(&self.database_id).await?;
        let total = pages.len();

        let mut records = Vec::with_capacity(total);
        for page in pages {
            if page.is_trashed() {
                continue;
            }
            match parse_page(&page.id, &page.properties) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping replica record: {}", e),
            }
        }

        debug!("Fetched {} live records out of {} pages", records.len(), total);
        Ok(records)
    }

    async fn create(&self, task: &SourceTask) -> Result<ReplicaRecord> {
        let fields = ReplicaFields::from_task(task);
        let page = self
            .client
            .create_page(&self.database_id, page_properties(&fields, false))
            .await?;

        debug!("Created page {} for task {}", page.id, task.id);
        Ok(ReplicaRecord::from_fields(page.id, fields))
    }

    async fn update(&self, id: &str, task: &SourceTask) -> Result<ReplicaRecord> {
        let fields = ReplicaFields::from_task(task);
        let page = self
            .client
            .update_page(id, page_properties(&fields, true))
            .await?;

        Ok(ReplicaRecord::from_fields(page.id, fields))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.client.trash_page(id).await?;
        Ok(())
    }
}

/// Outcome of [`ensure_database`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provisioned {
    /// The configured database exists and is reused as-is.
    Existing(String),
    /// A new database was created.
    Created(String),
}

impl Provisioned {
    /// The database id, whichever way it was obtained.
    pub fn id(&self) -> &str {
        match self {
            Provisioned::Existing(id) | Provisioned::Created(id) => id,
        }
    }
}

/// Reuse the configured database, or create one with the replica schema.
///
/// An existing database is not checked against the schema.
///
/// # Errors
/// - No database found and no parent page configured
/// - Authentication and network errors from retrieval are propagated
pub async fn ensure_database(
    client: &NotionClient,
    database_id: Option<&str>,
    parent_page_id: Option<&str>,
) -> Result<Provisioned> {
    if let Some(id) = database_id.filter(|id| !id.is_empty()) {
        match client.retrieve_database(id).await {
            Ok(db) if !(db.archived || db.in_trash) => {
                info!("Using existing Notion database {}", db.id);
                return Ok(Provisioned::Existing(db.id));
            }
            Ok(_) => info!("Database {} is in the trash, creating a new one", id),
            Err(Error::NotFound(_)) => info!("Database {} not found, creating a new one", id),
            Err(e) => return Err(e),
        }
    }

    let parent = parent_page_id.filter(|id| !id.is_empty()).ok_or_else(|| {
        Error::Config("A parent page id is required to create the database".to_string())
    })?;

    let db = client
        .create_database(parent, DATABASE_TITLE, database_properties())
        .await?;
    info!("Created Notion database {}", db.id);
    Ok(Provisioned::Created(db.id))
}
