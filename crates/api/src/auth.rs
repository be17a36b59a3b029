use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use shipwatch_core::{AccessToken, AuthError, TokenSource};

use crate::client::excerpt;
use crate::extract::{Strategy, TokenGrant, describe_keys, first_match, token_strategies};

/// Refresh a cached token this long before its estimated expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("refresh_token", &"***")
            .finish()
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
    refresh_token: &'a str,
}

/// Linear backoff for network-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Wait after the given failed attempt (1-indexed).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: AccessToken,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct TokenProvider {
    credentials: Credentials,
    url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
    strategies: Arc<Vec<Strategy<TokenGrant>>>,
    cache: Option<Arc<RwLock<Option<CachedToken>>>>,
}

impl TokenProvider {
    pub fn new(credentials: Credentials, url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            credentials,
            url: url.into(),
            http,
            retry: RetryPolicy::default(),
            strategies: Arc::new(token_strategies()),
            cache: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Reuse tokens until shortly before `expires_in` runs out instead of
    /// requesting a new one every cycle.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled.then(|| Arc::new(RwLock::new(None)));
        self
    }

    async fn cached(&self) -> Option<AccessToken> {
        let cache = self.cache.as_ref()?.read().await;
        cache
            .as_ref()
            .filter(|c| c.expires_at > Instant::now() + EXPIRY_MARGIN)
            .map(|c| c.token.clone())
    }

    async fn remember(&self, grant: &TokenGrant) {
        let (Some(cache), Some(expires_in)) = (&self.cache, grant.expires_in) else {
            return;
        };
        *cache.write().await = Some(CachedToken {
            token: AccessToken::new(grant.access_token.clone()),
            expires_at: Instant::now() + Duration::from_secs(expires_in),
        });
    }

    async fn request_once(&self) -> Result<(reqwest::StatusCode, String), reqwest::Error> {
        let body = TokenRequest {
            client_id: &self.credentials.client_id,
            client_secret: &self.credentials.client_secret,
            grant_type: "refresh_token",
            refresh_token: &self.credentials.refresh_token,
        };
        let resp = self.http.post(&self.url).json(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        Ok((status, text))
    }

    /// Exchange the stored credentials for an access token.
    pub async fn refresh_token(&self) -> Result<AccessToken, AuthError> {
        if let Some(token) = self.cached().await {
            debug!("Using cached access token");
            return Ok(token);
        }

        let mut attempt = 0;
        let (status, body) = loop {
            attempt += 1;
            match self.request_once().await {
                Ok(resp) => break resp,
                Err(e) if attempt < self.retry.max_attempts => {
                    let wait = self.retry.delay(attempt);
                    warn!(
                        error = %e,
                        attempt,
                        wait_secs = wait.as_secs_f64(),
                        "Token request failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    return Err(AuthError::Network {
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
            }
        };

        if !status.is_success() {
            warn!(%status, body = %excerpt(&body), "Token endpoint returned an error status");
        }

        let grant = parse_token_response(&self.strategies, &body)?;
        self.remember(&grant).await;
        Ok(AccessToken::new(grant.access_token))
    }
}

#[async_trait]
impl TokenSource for TokenProvider {
    async fn refresh(&self) -> Result<AccessToken, AuthError> {
        self.refresh_token().await
    }
}

/// Classify a token response body. Not retried: a shape mismatch is
/// deterministic.
pub fn parse_token_response(
    strategies: &[Strategy<TokenGrant>],
    body: &str,
) -> Result<TokenGrant, AuthError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| AuthError::Malformed(e.to_string()))?;
    match first_match(strategies, &value) {
        Some((shape, grant)) => {
            debug!(shape, "Access token obtained");
            Ok(grant)
        }
        None => Err(AuthError::MissingToken {
            keys: describe_keys(&value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::build_http;
    use crate::testing::CannedServer;

    fn credentials() -> Credentials {
        Credentials {
            client_id: "cid".into(),
            client_secret: "secret".into(),
            refresh_token: "refresh".into(),
        }
    }

    fn provider(url: &str) -> TokenProvider {
        TokenProvider::new(credentials(), url, build_http(Duration::from_secs(5)).unwrap())
            .with_retry(RetryPolicy {
                max_attempts: 3,
                backoff_step: Duration::from_millis(1),
            })
    }

    #[test]
    fn backoff_is_linear() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
        assert_eq!(policy.delay(3), Duration::from_secs(6));
    }

    #[test]
    fn credentials_debug_hides_secrets() {
        let out = format!("{:?}", credentials());
        assert!(out.contains("cid"));
        assert!(!out.contains("secret\""));
        assert!(!out.contains("refresh\""));
    }

    #[test]
    fn non_json_is_malformed() {
        let err = parse_token_response(&token_strategies(), "<html>oops</html>").unwrap_err();
        assert!(matches!(err, AuthError::Malformed(_)));
    }

    #[test]
    fn unknown_shape_reports_keys() {
        let err = parse_token_response(
            &token_strategies(),
            r#"{"error":"invalid_grant","error_description":"expired"}"#,
        )
        .unwrap_err();
        match err {
            AuthError::MissingToken { keys } => {
                assert_eq!(keys, vec!["error", "error_description"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn posts_refresh_grant() {
        let server = CannedServer::start(200, r#"{"data":{"access_token":"tok-1"}}"#).await;
        let token = provider(&server.url).refresh_token().await.unwrap();

        assert_eq!(token.as_str(), "tok-1");
        let requests = server.requests().await;
        assert!(requests[0].starts_with("POST "));
        assert!(requests[0].contains(r#""grant_type":"refresh_token""#));
        assert!(requests[0].contains(r#""refresh_token":"refresh""#));
    }

    #[tokio::test]
    async fn non_json_body_fails_without_retry() {
        let server = CannedServer::start(200, "Service temporarily unavailable").await;
        let err = provider(&server.url).refresh_token().await.unwrap_err();

        assert!(matches!(err, AuthError::Malformed(_)));
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn unreachable_endpoint_exhausts_retries() {
        // Bind then drop to get a port nothing listens on.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let err = provider(&format!("http://{addr}/token"))
            .refresh_token()
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Network { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn refreshes_every_call_without_cache() {
        let server =
            CannedServer::start(200, r#"{"access_token":"tok","expires_in":3600}"#).await;
        let provider = provider(&server.url);
        provider.refresh_token().await.unwrap();
        provider.refresh_token().await.unwrap();

        assert_eq!(server.hits(), 2);
    }

    #[tokio::test]
    async fn cache_reuses_unexpired_token() {
        let server =
            CannedServer::start(200, r#"{"access_token":"tok","expires_in":3600}"#).await;
        let provider = provider(&server.url).with_cache(true);
        provider.refresh_token().await.unwrap();
        let token = provider.refresh_token().await.unwrap();

        assert_eq!(token.as_str(), "tok");
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn cache_skips_tokens_inside_expiry_margin() {
        let server = CannedServer::start(200, r#"{"access_token":"tok","expires_in":30}"#).await;
        let provider = provider(&server.url).with_cache(true);
        provider.refresh_token().await.unwrap();
        provider.refresh_token().await.unwrap();

        assert_eq!(server.hits(), 2);
    }
}
