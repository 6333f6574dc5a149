//! HTTP plumbing shared by the remote providers.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use taskmirror_common::{Error, Result};

/// User agent sent with every request.
const USER_AGENT: &str = concat!("taskmirror/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build an HTTP client with the given request timeout.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Validate a base URL and strip any trailing slash.
pub fn normalize_base_url(base: &str) -> Result<String> {
    let parsed = url::Url::parse(base)
        .map_err(|e| Error::Config(format!("Invalid base URL '{}': {}", base, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::Config(format!("Unsupported URL scheme: {}", base)));
    }
    Ok(base.trim_end_matches('/').to_string())
}

/// Map a transport failure to a retryable network error.
pub fn send_error(action: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Network(format!("{} timed out: {}", action, err))
    } else {
        Error::Network(format!("Failed to {}: {}", action, err))
    }
}

/// Map a non-success status to the error taxonomy.
pub fn status_error(status: StatusCode, body: String) -> Error {
    match status {
        StatusCode::UNAUTHORIZED => {
            Error::Authentication(format!("Invalid or expired credentials: {}", body))
        }
        StatusCode::FORBIDDEN => Error::PermissionDenied(format!("Access denied: {}", body)),
        StatusCode::NOT_FOUND => Error::NotFound(format!("Resource not found: {}", body)),
        StatusCode::TOO_MANY_REQUESTS => Error::Network(format!("Rate limited: {}", body)),
        s if s.is_server_error() => Error::Network(format!("Server error: {} - {}", s, body)),
        s => Error::Provider(format!("API error: {} - {}", s, body)),
    }
}

/// Map a failure while reading a success body. Timeouts stay retryable.
pub fn body_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        send_error("read response", err)
    } else {
        Error::Serialization(format!("Failed to parse response: {}", err))
    }
}

/// Handle API response with error checking.
pub async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if status.is_success() {
        response.json().await.map_err(body_error)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, String::new()),
            Error::Authentication(_)
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, String::new()),
            Error::NotFound(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, String::new()),
            Error::Network(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, String::new()),
            Error::Network(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, String::new()),
            Error::Provider(_)
        ));
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://api.notion.com/v1/").unwrap(),
            "https://api.notion.com/v1"
        );
        assert!(normalize_base_url("not a url").is_err());
        assert!(normalize_base_url("ftp://example.com").is_err());
    }

    #[tokio::test]
    async fn test_body_timeout_is_retryable() {
        use wiremock::{matchers::method, Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let client = build_client(Duration::from_millis(100)).unwrap();
        let err = client.get(server.uri()).send().await.unwrap_err();
        assert!(err.is_timeout());

        assert!(body_error(err).is_transient());
    }

    #[tokio::test]
    async fn test_invalid_body_is_serialization_error() {
        use wiremock::{matchers::method, Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = build_client(Duration::from_secs(5)).unwrap();
        let response = client.get(server.uri()).send().await.unwrap();
        let result: Result<serde_json::Value> = handle_response(response).await;

        assert!(matches!(result, Err(Error::Serialization(_))));
    }
}
