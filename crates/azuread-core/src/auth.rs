//! OAuth2 client-credentials authentication shared by both backends.
//!
//! Each API generation is a different token audience, so the provider keeps
//! one [`ClientSecretAuthorizer`] per backend.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::config::ProviderConfig;
use crate::{Error, Result};

/// Source of bearer tokens for a backend client
#[async_trait]
pub trait Authorizer: Send + Sync + fmt::Debug {
    /// Return a token valid for at least the next few minutes
    async fn token(&self) -> Result<String>;

    /// Drop any cached token so the next call fetches a fresh one
    async fn invalidate(&self) {}
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_expired(&self, grace_period: Duration) -> bool {
        Utc::now() + grace_period >= self.expires_at
    }
}

/// Client-credentials flow against `{login}/{tenant}/oauth2/v2.0/token`
/// with a cached token that is refreshed shortly before it expires.
pub struct ClientSecretAuthorizer {
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    http: reqwest::Client,
    cached: Arc<RwLock<Option<CachedToken>>>,
    grace_period: Duration,
}

impl ClientSecretAuthorizer {
    /// Authorizer for `resource` (an API host such as `https://graph.microsoft.com`)
    pub fn new(
        login_endpoint: &str,
        tenant_id: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        resource: &str,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| Error::http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                login_endpoint.trim_end_matches('/'),
                tenant_id
            ),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: format!("{}/.default", resource.trim_end_matches('/')),
            http,
            cached: Arc::new(RwLock::new(None)),
            grace_period: Duration::minutes(5),
        })
    }

    /// Token source for the legacy AAD Graph API
    pub fn for_aad_graph(config: &ProviderConfig) -> Result<Self> {
        Self::for_resource(config, config.environment.aad_graph_endpoint())
    }

    /// Token source for MS Graph
    pub fn for_ms_graph(config: &ProviderConfig) -> Result<Self> {
        Self::for_resource(config, config.environment.ms_graph_endpoint())
    }

    fn for_resource(config: &ProviderConfig, resource: &str) -> Result<Self> {
        Self::new(
            config.environment.login_endpoint(),
            &config.tenant_id,
            config.client_id.clone(),
            config.client_secret.clone(),
            resource,
        )
    }

    #[instrument(skip(self), fields(scope = %self.scope))]
    async fn acquire_token(&self) -> Result<CachedToken> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::auth(format!("Token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::auth(format!(
                "Token request failed with status {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::auth(format!("Failed to parse token response: {e}")))?;

        let expires_at = Utc::now() + Duration::seconds(token.expires_in);
        debug!(expires_at = %expires_at, "acquired access token");

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at,
        })
    }
}

#[async_trait]
impl Authorizer for ClientSecretAuthorizer {
    async fn token(&self) -> Result<String> {
        {
            let cache = self.cached.read().await;
            if let Some(token) = cache.as_ref() {
                if !token.is_expired(self.grace_period) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let fresh = self.acquire_token().await?;
        let access_token = fresh.access_token.clone();
        *self.cached.write().await = Some(fresh);
        Ok(access_token)
    }

    async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}

impl fmt::Debug for ClientSecretAuthorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSecretAuthorizer")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scope", &self.scope)
            .finish()
    }
}

/// Fixed token, used when the host already holds one and in tests
pub struct StaticTokenAuthorizer {
    token: String,
}

impl StaticTokenAuthorizer {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl Authorizer for StaticTokenAuthorizer {
    async fn token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

impl fmt::Debug for StaticTokenAuthorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenAuthorizer")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_token_expiry() {
        let token = CachedToken {
            access_token: "t".to_string(),
            expires_at: Utc::now() + Duration::minutes(10),
        };
        assert!(!token.is_expired(Duration::minutes(5)));
        assert!(token.is_expired(Duration::minutes(15)));
    }

    #[test]
    fn scope_and_url_are_derived_from_resource() {
        let auth = ClientSecretAuthorizer::new(
            "https://login.microsoftonline.com/",
            "tenant",
            "client",
            "secret",
            "https://graph.microsoft.com/",
        )
        .unwrap();
        assert_eq!(
            auth.token_url,
            "https://login.microsoftonline.com/tenant/oauth2/v2.0/token"
        );
        assert_eq!(auth.scope, "https://graph.microsoft.com/.default");
        assert!(format!("{auth:?}").contains("<redacted>"));
    }

    #[tokio::test]
    async fn static_token_is_returned_verbatim() {
        let auth = StaticTokenAuthorizer::new("abc");
        assert_eq!(auth.token().await.unwrap(), "abc");
    }
}
