//! Google Tasks source provider implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use taskmirror_common::{Result, SourceTask};

use super::auth::{AuthConfig, AuthManager, TokenManager};
use super::client::{TasksClient, TASKS_API_BASE};
use crate::http::DEFAULT_TIMEOUT;
use crate::provider::TaskSource;

/// Google Tasks provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleTasksConfig {
    /// OAuth2 client configuration.
    pub auth: AuthConfig,
    /// JSON file holding the OAuth2 tokens.
    pub token_file: PathBuf,
    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

fn default_base_url() -> String {
    TASKS_API_BASE.to_string()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl GoogleTasksConfig {
    /// Create a configuration against the public API.
    pub fn new(auth: AuthConfig, token_file: impl Into<PathBuf>) -> Self {
        Self {
            auth,
            token_file: token_file.into(),
            base_url: default_base_url(),
            timeout: default_timeout(),
        }
    }
}

/// Google Tasks source provider.
///
/// Implements the TaskSource trait for the Google Tasks backend.
pub struct GoogleTasksProvider {
    client: TasksClient,
}

impl GoogleTasksProvider {
    /// Create a provider, loading tokens from the configured token file.
    ///
    /// # Errors
    /// - Missing or unreadable token file
    /// - Invalid configuration
    pub async fn new(config: GoogleTasksConfig) -> Result<Self> {
        let auth_manager = AuthManager::new(config.auth.clone(), config.timeout)?;
        let token_manager =
            Arc::new(TokenManager::from_token_file(auth_manager, &config.token_file).await?);
        let client = TasksClient::with_base_url(token_manager, &config.base_url, config.timeout)?;
        Ok(Self { client })
    }

    /// Create a provider from an existing client.
    pub fn from_client(client: TasksClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TaskSource for GoogleTasksProvider {
    fn name(&self) -> &str {
        "gtasks"
    }

    async fn fetch_all_tasks(&self) -> Result<Vec<SourceTask>> {
        debug!("Getting all tasks");
        let task_lists = self.client.list_task_lists().await?;
        info!("Found {} task lists", task_lists.len());

        let mut tasks = Vec::new();
        for list in task_lists {
            let list_tasks = self.client.list_tasks(&list.id).await?;
            debug!("List '{}' has {} tasks", list.title, list_tasks.len());
            tasks.extend(
                list_tasks
                    .into_iter()
                    .map(|task| task.into_source_task(&list.title)),
            );
        }

        info!("Found {} tasks", tasks.len());
        Ok(tasks)
    }
}
