//! Google Tasks API client.

use chrono::{DateTime, Utc};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use taskmirror_common::{Result, SourceTask, TaskStatus};

use super::auth::TokenManager;
use crate::http::{build_client, handle_response, normalize_base_url, send_error};

/// Google Tasks API base URL.
pub const TASKS_API_BASE: &str = "https://tasks.googleapis.com/tasks/v1";

/// Maximum page size accepted by both list endpoints.
const PAGE_SIZE: &str = "100";

/// A task list from the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiTaskList {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// A task from the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiTask {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub due: Option<String>,
    #[serde(default)]
    pub completed: Option<String>,
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub hidden: bool,
}

impl ApiTask {
    /// Convert into a source task owned by the list titled `list_title`.
    pub fn into_source_task(self, list_title: &str) -> SourceTask {
        SourceTask {
            id: self.id,
            title: self.title.unwrap_or_default(),
            notes: self.notes,
            status: TaskStatus::from(self.status.unwrap_or_default()),
            due: self.due,
            completed: self.completed,
            updated_at: self.updated,
            deleted: self.deleted,
            parent_list_title: list_title.to_string(),
        }
    }
}

/// One page of a list response. Google omits `items` on empty pages.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Google Tasks API client.
pub struct TasksClient {
    http: Client,
    token_manager: Arc<TokenManager>,
    base_url: String,
}

impl TasksClient {
    /// Create a client against the public API.
    pub fn new(token_manager: Arc<TokenManager>, timeout: Duration) -> Result<Self> {
        Self::with_base_url(token_manager, TASKS_API_BASE, timeout)
    }

    /// Create a client against a custom base URL.
    pub fn with_base_url(
        token_manager: Arc<TokenManager>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            token_manager,
            base_url: normalize_base_url(base_url)?,
        })
    }

    /// Get authorization header.
    async fn auth_header(&self) -> Result<String> {
        let token = self.token_manager.get_access_token().await?;
        Ok(format!("Bearer {}", token.expose()))
    }

    /// List all task lists of the authenticated user.
    pub async fn list_task_lists(&self) -> Result<Vec<ApiTaskList>> {
        let url = format!("{}/users/@me/lists", self.base_url);
        self.get_all_pages(&url, &[("maxResults", PAGE_SIZE)], "list task lists")
            .await
    }

    /// List every task of a list, including hidden, completed and deleted ones.
    pub async fn list_tasks(&self, task_list_id: &str) -> Result<Vec<ApiTask>> {
        let url = format!("{}/lists/{}/tasks", self.base_url, task_list_id);
        self.get_all_pages(
            &url,
            &[
                ("maxResults", PAGE_SIZE),
                ("showCompleted", "true"),
                ("showHidden", "true"),
                ("showDeleted", "true"),
            ],
            "list tasks",
        )
        .await
    }

    /// Follow `nextPageToken` until the listing is exhausted.
    async fn get_all_pages<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        action: &str,
    ) -> Result<Vec<T>> {
        let mut all_items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let auth = self.auth_header().await?;

            let mut request = self
                .http
                .get(url)
                .header(header::AUTHORIZATION, auth)
                .query(query);

            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().await.map_err(|e| send_error(action, e))?;

            let page: Page<T> = handle_response(response).await?;
            all_items.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(all_items)
    }
}
