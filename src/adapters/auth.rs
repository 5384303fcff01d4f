use crate::config::warehouse::Credentials;
use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

// 到期前一分鐘就換新 token
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Hands out bearer tokens for warehouse requests. Metadata-server tokens
/// are cached until shortly before they expire, so a long-running
/// scheduler keeps working past the first token's lifetime.
#[derive(Clone)]
pub struct TokenProvider {
    client: Client,
    credentials: Credentials,
    cached: Arc<Mutex<Option<CachedToken>>>,
}

impl fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenProvider")
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl TokenProvider {
    pub fn new(client: Client, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
            cached: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn token(&self) -> Result<String> {
        let url = match &self.credentials {
            Credentials::AccessToken(token) => return Ok(token.clone()),
            Credentials::MetadataServer { url } => url,
        };

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached
            .as_ref()
            .filter(|t| t.expires_at > Instant::now() + EXPIRY_MARGIN)
        {
            return Ok(token.value.clone());
        }

        let response = self
            .client
            .get(format!("{}{}", url, TOKEN_PATH))
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(EtlError::load(format!(
                "metadata server returned {} while fetching an access token: {}",
                status,
                body.trim()
            )));
        }

        let token: MetadataToken = response.json().await?;
        tracing::debug!(
            expires_in = token.expires_in,
            "🔑 Fetched access token from metadata server"
        );

        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_static_token_needs_no_request() {
        let provider = TokenProvider::new(
            Client::new(),
            Credentials::AccessToken("static-token".to_string()),
        );
        assert_eq!(provider.token().await.unwrap(), "static-token");
    }

    #[tokio::test]
    async fn test_metadata_token_is_cached_until_expiry() {
        let server = MockServer::start();
        let metadata = server.mock(|when, then| {
            when.method(GET)
                .path(TOKEN_PATH)
                .header("Metadata-Flavor", "Google");
            then.status(200).json_body(serde_json::json!({
                "access_token": "ya29.fresh",
                "expires_in": 3599,
                "token_type": "Bearer"
            }));
        });

        let provider = TokenProvider::new(
            Client::new(),
            Credentials::MetadataServer {
                url: server.base_url(),
            },
        );
        assert_eq!(provider.token().await.unwrap(), "ya29.fresh");
        assert_eq!(provider.token().await.unwrap(), "ya29.fresh");
        metadata.assert_hits(1);
    }

    #[tokio::test]
    async fn test_expiring_metadata_token_is_refetched() {
        let server = MockServer::start();
        let metadata = server.mock(|when, then| {
            when.method(GET).path(TOKEN_PATH);
            // 有效期短於安全邊界，每次都要重新取得
            then.status(200).json_body(serde_json::json!({
                "access_token": "ya29.short",
                "expires_in": 30
            }));
        });

        let provider = TokenProvider::new(
            Client::new(),
            Credentials::MetadataServer {
                url: server.base_url(),
            },
        );
        provider.token().await.unwrap();
        provider.token().await.unwrap();
        metadata.assert_hits(2);
    }

    #[tokio::test]
    async fn test_metadata_error_is_load_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(TOKEN_PATH);
            then.status(404).body("service account not found");
        });

        let provider = TokenProvider::new(
            Client::new(),
            Credentials::MetadataServer {
                url: server.base_url(),
            },
        );
        let err = provider.token().await.unwrap_err();
        assert!(matches!(err, EtlError::LoadError { .. }));
        assert!(err.to_string().contains("service account not found"));
    }
}
