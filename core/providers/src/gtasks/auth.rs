//! OAuth2 authentication and token management for Google Tasks.

use chrono::{DateTime, Duration, Utc};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    ErrorResponse, RedirectUrl, RefreshToken, RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use taskmirror_common::{Error, Result, SecretString};

/// OAuth2 authorization endpoint.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// OAuth2 token endpoint.
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Redirect URL for OAuth2 flow (localhost for desktop apps).
const REDIRECT_URL: &str = "http://localhost:8080/callback";

/// Google Tasks read-only scope.
const TASKS_SCOPE: &str = "https://www.googleapis.com/auth/tasks.readonly";

/// Client with auth and token endpoints configured.
type GoogleOAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// OAuth2 tokens with expiration tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tokens {
    /// Access token for API requests.
    pub access_token: SecretString,
    /// Refresh token for obtaining new access tokens.
    pub refresh_token: SecretString,
    /// When the access token expires.
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Check if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        // Consider expired if less than 5 minutes remaining
        self.expires_at < Utc::now() + Duration::minutes(5)
    }

    /// Load tokens from a JSON token file.
    pub async fn load(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Authentication(format!(
                    "No token file at {}; run `taskmirror authorize` first",
                    path.display()
                ))
            } else {
                Error::Io(e)
            }
        })?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Write tokens to a JSON token file, creating parent directories.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

/// Configuration for OAuth2 authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    /// Redirect URL for OAuth2 callback.
    #[serde(default = "default_redirect_url")]
    pub redirect_url: String,
    /// Token endpoint used for code exchange and refresh.
    #[serde(default = "default_token_url")]
    pub token_url: String,
}

fn default_redirect_url() -> String {
    REDIRECT_URL.to_string()
}

fn default_token_url() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

impl AuthConfig {
    /// Create a configuration with the default redirect URL.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret),
            redirect_url: default_redirect_url(),
            token_url: default_token_url(),
        }
    }
}

/// OAuth2 authentication manager for Google Tasks.
pub struct AuthManager {
    client: GoogleOAuthClient,
    http: oauth2::reqwest::Client,
}

impl AuthManager {
    /// Create a new authentication manager whose token requests give up
    /// after `timeout`.
    pub fn new(config: AuthConfig, timeout: std::time::Duration) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(
                config.client_secret.expose().to_string(),
            ))
            .set_auth_uri(
                AuthUrl::new(GOOGLE_AUTH_URL.to_string())
                    .map_err(|e| Error::InvalidInput(format!("Invalid auth URL: {}", e)))?,
            )
            .set_token_uri(
                TokenUrl::new(config.token_url.clone())
                    .map_err(|e| Error::InvalidInput(format!("Invalid token URL: {}", e)))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_url.clone())
                    .map_err(|e| Error::InvalidInput(format!("Invalid redirect URL: {}", e)))?,
            );

        // Token endpoints must not be followed through redirects.
        let http = oauth2::reqwest::ClientBuilder::new()
            .redirect(oauth2::reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create OAuth HTTP client: {}", e)))?;

        Ok(Self { client, http })
    }

    /// Generate the authorization URL for the user to visit.
    ///
    /// Returns the URL and a CSRF token that should be verified on callback.
    pub fn authorization_url(&self) -> (String, String) {
        let (auth_url, csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(TASKS_SCOPE.to_string()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();

        (auth_url.to_string(), csrf_token.secret().clone())
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    /// - Invalid authorization code
    /// - No refresh token in the response
    pub async fn exchange_code(&self, code: &str) -> Result<Tokens> {
        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| token_error("Token exchange", e))?;

        let refresh_token = token_result
            .refresh_token()
            .ok_or_else(|| {
                Error::Authentication(
                    "No refresh token received. Ensure 'offline' access and 'consent' prompt were requested."
                        .to_string(),
                )
            })?
            .secret()
            .clone();

        Ok(Tokens {
            access_token: SecretString::new(token_result.access_token().secret().clone()),
            refresh_token: SecretString::new(refresh_token),
            expires_at: expiry(token_result.expires_in()),
        })
    }

    /// Refresh an access token using the refresh token.
    ///
    /// # Errors
    /// - Invalid or revoked refresh token
    /// - Network errors
    pub async fn refresh_token(&self, refresh_token: &SecretString) -> Result<Tokens> {
        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.expose().to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| token_error("Token refresh", e))?;

        // Google usually omits the refresh token on refresh
        let new_refresh_token = token_result
            .refresh_token()
            .map(|t| SecretString::new(t.secret().clone()))
            .unwrap_or_else(|| refresh_token.clone());

        Ok(Tokens {
            access_token: SecretString::new(token_result.access_token().secret().clone()),
            refresh_token: new_refresh_token,
            expires_at: expiry(token_result.expires_in()),
        })
    }

}

/// Transport failures are retryable; anything the token endpoint answered is not.
fn token_error<RE, T>(action: &str, err: RequestTokenError<RE, T>) -> Error
where
    RE: std::error::Error + 'static,
    T: ErrorResponse + 'static,
{
    match err {
        RequestTokenError::Request(e) => Error::Network(format!("{} failed: {}", action, e)),
        other => Error::Authentication(format!("{} failed: {}", action, other)),
    }
}

fn expiry(expires_in: Option<std::time::Duration>) -> DateTime<Utc> {
    let expires_in = expires_in.unwrap_or_else(|| std::time::Duration::from_secs(3600));
    Utc::now() + Duration::from_std(expires_in).unwrap_or_else(|_| Duration::hours(1))
}

/// Token manager that automatically refreshes expired tokens.
pub struct TokenManager {
    auth_manager: AuthManager,
    tokens: tokio::sync::RwLock<Tokens>,
    /// Where refreshed tokens are written back, if anywhere.
    token_file: Option<PathBuf>,
}

impl TokenManager {
    /// Create a new token manager with initial tokens.
    pub fn new(auth_manager: AuthManager, tokens: Tokens) -> Self {
        Self {
            auth_manager,
            tokens: tokio::sync::RwLock::new(tokens),
            token_file: None,
        }
    }

    /// Load tokens from `path` and persist refreshed tokens back to it.
    pub async fn from_token_file(
        auth_manager: AuthManager,
        path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let path = path.into();
        let tokens = Tokens::load(&path).await?;
        Ok(Self {
            auth_manager,
            tokens: tokio::sync::RwLock::new(tokens),
            token_file: Some(path),
        })
    }

    /// Get a valid access token, refreshing if necessary.
    ///
    /// # Errors
    /// - Token refresh failed
    pub async fn get_access_token(&self) -> Result<SecretString> {
        let tokens = self.tokens.read().await;

        if !tokens.is_expired() {
            return Ok(tokens.access_token.clone());
        }

        drop(tokens);

        let mut tokens = self.tokens.write().await;

        // Double-check after acquiring write lock
        if !tokens.is_expired() {
            return Ok(tokens.access_token.clone());
        }

        tracing::info!("Refreshing expired Google access token");

        let new_tokens = self
            .auth_manager
            .refresh_token(&tokens.refresh_token)
            .await?;

        if let Some(path) = &self.token_file {
            if let Err(e) = new_tokens.save(path).await {
                tracing::warn!(
                    "Failed to persist refreshed tokens to {}: {}",
                    path.display(),
                    e
                );
            }
        }

        *tokens = new_tokens;

        Ok(tokens.access_token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

    fn manager_for(server: &MockServer, timeout: std::time::Duration) -> AuthManager {
        let mut config = AuthConfig::new("id", "secret");
        config.token_url = format!("{}/token", server.uri());
        AuthManager::new(config, timeout).unwrap()
    }

    fn tokens_expiring_in(delta: Duration) -> Tokens {
        Tokens {
            access_token: SecretString::new("access"),
            refresh_token: SecretString::new("refresh"),
            expires_at: Utc::now() + delta,
        }
    }

    #[test]
    fn test_tokens_expiration() {
        assert!(tokens_expiring_in(Duration::hours(-1)).is_expired());
        assert!(!tokens_expiring_in(Duration::hours(1)).is_expired());
    }

    #[test]
    fn test_tokens_near_expiration() {
        // Token expiring in 4 minutes should be considered expired (5 min buffer)
        assert!(tokens_expiring_in(Duration::minutes(4)).is_expired());
    }

    #[tokio::test]
    async fn test_token_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token.json");
        let tokens = tokens_expiring_in(Duration::hours(1));

        tokens.save(&path).await.unwrap();
        let loaded = Tokens::load(&path).await.unwrap();

        assert_eq!(loaded.access_token.expose(), "access");
        assert_eq!(loaded.refresh_token.expose(), "refresh");
        assert_eq!(loaded.expires_at, tokens.expires_at);
    }

    #[tokio::test]
    async fn test_missing_token_file_is_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Tokens::load(&dir.path().join("absent.json")).await;
        assert!(matches!(result, Err(Error::Authentication(_))));
    }

    #[tokio::test]
    async fn test_valid_token_is_returned_without_refresh() {
        let manager = AuthManager::new(AuthConfig::new("id", "secret"), TEST_TIMEOUT).unwrap();
        let token_manager = TokenManager::new(manager, tokens_expiring_in(Duration::hours(1)));

        let token = token_manager.get_access_token().await.unwrap();
        assert_eq!(token.expose(), "access");
    }

    #[test]
    fn test_authorization_url_generation() {
        let manager = AuthManager::new(AuthConfig::new("test_id", "test_secret"), TEST_TIMEOUT).unwrap();
        let (url, csrf_token) = manager.authorization_url();

        assert!(url.contains("accounts.google.com"));
        assert!(url.contains("client_id=test_id"));
        assert!(url.contains("tasks.readonly"));
        assert!(url.contains("access_type=offline"));
        assert!(!csrf_token.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_keeps_refresh_token_when_omitted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh",
                "token_type": "Bearer",
                "expires_in": 3599
            })))
            .mount(&server)
            .await;

        let manager = manager_for(&server, TEST_TIMEOUT);
        let tokens = manager
            .refresh_token(&SecretString::new("refresh"))
            .await
            .unwrap();

        assert_eq!(tokens.access_token.expose(), "fresh");
        assert_eq!(tokens.refresh_token.expose(), "refresh");
        assert!(!tokens.is_expired());
    }

    #[tokio::test]
    async fn test_stalled_token_endpoint_times_out_as_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(std::time::Duration::from_secs(3))
                    .set_body_json(json!({
                        "access_token": "late",
                        "token_type": "Bearer"
                    })),
            )
            .mount(&server)
            .await;

        let manager = manager_for(&server, std::time::Duration::from_millis(200));
        let result = manager.refresh_token(&SecretString::new("refresh")).await;

        match result {
            Err(e) => assert!(e.is_transient(), "expected a network error, got {}", e),
            Ok(_) => panic!("refresh should have timed out"),
        }
    }

    #[tokio::test]
    async fn test_rejected_refresh_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .mount(&server)
            .await;

        let manager = manager_for(&server, TEST_TIMEOUT);
        let result = manager.refresh_token(&SecretString::new("revoked")).await;

        assert!(matches!(result, Err(Error::Authentication(_))));
    }
}
