//! Notion API client.

use reqwest::{header, Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;

use taskmirror_common::{Result, SecretString};

use crate::http::{build_client, handle_response, normalize_base_url, send_error};

/// Notion API base URL.
pub const NOTION_API_BASE: &str = "https://api.notion.com/v1";
/// API version pinned for every request.
pub const NOTION_VERSION: &str = "2022-06-28";

/// Maximum page size for database queries.
const PAGE_SIZE: u32 = 100;

/// A Notion page as returned by query, create and update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionPage {
    pub id: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub in_trash: bool,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl NotionPage {
    /// Trashed and archived pages are no longer live.
    pub fn is_trashed(&self) -> bool {
        self.archived || self.in_trash
    }
}

/// A Notion database, as much of it as provisioning needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionDatabase {
    pub id: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub in_trash: bool,
}

/// Response from a database query.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<NotionPage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Notion API client.
pub struct NotionClient {
    http: Client,
    api_key: SecretString,
    base_url: String,
}

impl NotionClient {
    /// Create a client against the public API.
    pub fn new(api_key: SecretString, timeout: Duration) -> Result<Self> {
        Self::with_base_url(api_key, NOTION_API_BASE, timeout)
    }

    /// Create a client against a custom base URL.
    pub fn with_base_url(api_key: SecretString, base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            api_key,
            base_url: normalize_base_url(base_url)?,
        })
    }

    /// Attach authentication and version headers.
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.api_key.expose()),
            )
            .header("Notion-Version", NOTION_VERSION)
    }

    /// Retrieve a database by ID.
    pub async fn retrieve_database(&self, database_id: &str) -> Result<NotionDatabase> {
        let url = format!("{}/databases/{}", self.base_url, database_id);

        let response = self
            .authorized(self.http.get(&url))
            .send()
            .await
            .map_err(|e| send_error("retrieve database", e))?;

        handle_response(response).await
    }

    /// Create a database under a parent page.
    pub async fn create_database(
        &self,
        parent_page_id: &str,
        title: &str,
        properties: Value,
    ) -> Result<NotionDatabase> {
        let url = format!("{}/databases", self.base_url);
        let body = json!({
            "parent": { "type": "page_id", "page_id": parent_page_id },
            "title": [{ "type": "text", "text": { "content": title } }],
            "properties": properties
        });

        let response = self
            .authorized(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error("create database", e))?;

        handle_response(response).await
    }

    /// Query every page of a database, following cursors.
    pub async fn query_database(&self, database_id: &str) -> Result<Vec<NotionPage>> {
        let url = format!("{}/databases/{}/query", self.base_url, database_id);
        let mut all_pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            let response = self
                .authorized(self.http.post(&url))
                .json(&body)
                .send()
                .await
                .map_err(|e| send_error("query database", e))?;

            let page: QueryResponse = handle_response(response).await?;
            all_pages.extend(page.results);

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(all_pages)
    }

    /// Create a page in a database.
    pub async fn create_page(&self, database_id: &str, properties: Value) -> Result<NotionPage> {
        let url = format!("{}/pages", self.base_url);
        let body = json!({
            "parent": { "type": "database_id", "database_id": database_id },
            "properties": properties
        });

        let response = self
            .authorized(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error("create page", e))?;

        handle_response(response).await
    }

    /// Overwrite page properties.
    pub async fn update_page(&self, page_id: &str, properties: Value) -> Result<NotionPage> {
        self.patch_page(page_id, json!({ "properties": properties }), "update page")
            .await
    }

    /// Move a page to the trash.
    pub async fn trash_page(&self, page_id: &str) -> Result<NotionPage> {
        self.patch_page(page_id, json!({ "in_trash": true }), "trash page")
            .await
    }

    async fn patch_page(&self, page_id: &str, body: Value, action: &str) -> Result<NotionPage> {
        let url = format!("{}/pages/{}", self.base_url, page_id);

        let response = self
            .authorized(self.http.patch(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(action, e))?;

        handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_trashed_flags() {
        let page: NotionPage =
            serde_json::from_str(r#"{"id": "p1", "archived": false, "in_trash": true}"#).unwrap();
        assert!(page.is_trashed());

        let page: NotionPage = serde_json::from_str(r#"{"id": "p2", "archived": true}"#).unwrap();
        assert!(page.is_trashed());

        let page: NotionPage = serde_json::from_str(r#"{"id": "p3"}"#).unwrap();
        assert!(!page.is_trashed());
        assert!(page.properties.is_empty());
    }

    #[test]
    fn test_query_response_without_cursor() {
        let response: QueryResponse =
            serde_json::from_str(r#"{"object": "list", "results": [], "has_more": false, "next_cursor": null}"#)
                .unwrap();
        assert!(response.results.is_empty());
        assert!(!response.has_more);
    }
}
