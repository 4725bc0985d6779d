//! Google OAuth credential provider. Implements CredentialProvider.
//!
//! Keeps the current token in memory, persists every refresh through TokenStore,
//! and exchanges the refresh token when the access token is within a minute of expiry.

use crate::domain::{DomainError, OAuthToken};
use crate::ports::{CredentialProvider, TokenStore};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Refresh this many seconds before the provider-reported expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

pub struct GoogleTokenProvider {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    /// Used only when the store is empty (first start).
    seed_refresh_token: Option<String>,
    store: Arc<dyn TokenStore>,
    cached: Mutex<Option<OAuthToken>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

impl GoogleTokenProvider {
    pub fn new(
        client: reqwest::Client,
        token_url: String,
        client_id: String,
        client_secret: String,
        seed_refresh_token: Option<String>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            client,
            token_url,
            client_id,
            client_secret,
            seed_refresh_token,
            store,
            cached: Mutex::new(None),
        }
    }

    /// Cached token, else stored token, else an already-expired token built from the seed.
    async fn current(&self, cached: &Option<OAuthToken>) -> Result<OAuthToken, DomainError> {
        if let Some(t) = cached {
            return Ok(t.clone());
        }
        if let Some(t) = self.store.load_token().await? {
            return Ok(t);
        }
        match &self.seed_refresh_token {
            Some(refresh) => Ok(OAuthToken {
                access_token: String::new(),
                refresh_token: refresh.clone(),
                expires_at: DateTime::<Utc>::default(),
            }),
            None => Err(DomainError::Auth("no refresh token configured".into())),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<OAuthToken, DomainError> {
        let res = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| DomainError::Transient(format!("token request failed: {}", e)))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            warn!(status = %status, body = %text, "token refresh rejected");
            let msg = format!(
                "token endpoint {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            );
            return Err(if status.is_client_error() {
                DomainError::Auth(msg)
            } else {
                DomainError::Transient(msg)
            });
        }

        let body: TokenResponse = res
            .json()
            .await
            .map_err(|e| DomainError::Transient(format!("token response: {}", e)))?;
        Ok(OAuthToken {
            access_token: body.access_token,
            refresh_token: body
                .refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
            expires_at: Utc::now() + Duration::seconds(body.expires_in),
        })
    }
}

/// True when the access token is missing or expires within the skew window.
pub fn needs_refresh(token: &OAuthToken, now: DateTime<Utc>) -> bool {
    token.access_token.is_empty()
        || token.expires_at - Duration::seconds(EXPIRY_SKEW_SECS) <= now
}

#[async_trait::async_trait]
impl CredentialProvider for GoogleTokenProvider {
    async fn get_valid_token(&self) -> Result<String, DomainError> {
        // Held across the refresh so concurrent callers don't refresh twice.
        let mut cached = self.cached.lock().await;
        let token = self.current(&cached).await?;
        if !needs_refresh(&token, Utc::now()) {
            let access = token.access_token.clone();
            *cached = Some(token);
            return Ok(access);
        }

        let refreshed = self.refresh(&token.refresh_token).await?;
        self.store.save_token(&refreshed).await?;
        info!(expires_at = %refreshed.expires_at, "access token refreshed");
        let access = refreshed.access_token.clone();
        *cached = Some(refreshed);
        Ok(access)
    }

    async fn invalidate(&self) {
        if let Some(t) = self.cached.lock().await.as_mut() {
            t.expires_at = DateTime::<Utc>::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mail::canned_http::CannedServer;
    use chrono::TimeZone;

    #[derive(Default)]
    struct MemTokenStore {
        token: std::sync::Mutex<Option<OAuthToken>>,
    }

    #[async_trait::async_trait]
    impl TokenStore for MemTokenStore {
        async fn load_token(&self) -> Result<Option<OAuthToken>, DomainError> {
            Ok(self.token.lock().unwrap().clone())
        }

        async fn save_token(&self, token: &OAuthToken) -> Result<(), DomainError> {
            *self.token.lock().unwrap() = Some(token.clone());
            Ok(())
        }
    }

    /// Nothing listens on port 1, so any refresh attempt fails fast.
    fn provider(store: Arc<dyn TokenStore>, seed: Option<&str>) -> GoogleTokenProvider {
        GoogleTokenProvider::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1/token".into(),
            "client".into(),
            "secret".into(),
            seed.map(String::from),
            store,
        )
    }

    fn expired_token() -> OAuthToken {
        OAuthToken {
            access_token: "ya29.old".into(),
            refresh_token: "1//keep".into(),
            expires_at: Utc::now() - Duration::minutes(5),
        }
    }

    fn provider_at(server: &CannedServer, store: Arc<MemTokenStore>) -> GoogleTokenProvider {
        GoogleTokenProvider::new(
            reqwest::Client::new(),
            format!("{}/token", server.base_url),
            "client".into(),
            "secret".into(),
            None,
            store,
        )
    }

    fn valid_token() -> OAuthToken {
        OAuthToken {
            access_token: "ya29.valid".into(),
            refresh_token: "1//refresh".into(),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    #[test]
    fn test_needs_refresh() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
        let mut t = OAuthToken {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: now + Duration::minutes(10),
        };
        assert!(!needs_refresh(&t, now));
        t.expires_at = now + Duration::seconds(30);
        assert!(needs_refresh(&t, now));
        t.expires_at = now + Duration::minutes(10);
        t.access_token.clear();
        assert!(needs_refresh(&t, now));
    }

    #[tokio::test]
    async fn test_valid_stored_token_needs_no_http() {
        let store = Arc::new(MemTokenStore::default());
        store.save_token(&valid_token()).await.unwrap();
        let p = provider(store, None);
        assert_eq!(p.get_valid_token().await.unwrap(), "ya29.valid");
    }

    #[tokio::test]
    async fn test_missing_token_without_seed_is_auth_error() {
        let p = provider(Arc::new(MemTokenStore::default()), None);
        let err = p.get_valid_token().await.unwrap_err();
        assert!(matches!(err, DomainError::Auth(_)));
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let store = Arc::new(MemTokenStore::default());
        store.save_token(&valid_token()).await.unwrap();
        let p = provider(store, None);
        assert!(p.get_valid_token().await.is_ok());

        p.invalidate().await;
        // Refresh is attempted against an unreachable endpoint.
        let err = p.get_valid_token().await.unwrap_err();
        assert!(matches!(err, DomainError::Transient(_)));
    }

    #[tokio::test]
    async fn test_refresh_saves_token_and_keeps_refresh_token() {
        let server = CannedServer::start(vec![(
            200,
            r#"{"access_token": "ya29.new", "expires_in": 3599, "token_type": "Bearer"}"#,
        )])
        .await;
        let store = Arc::new(MemTokenStore::default());
        store.save_token(&expired_token()).await.unwrap();
        let p = provider_at(&server, store.clone());

        assert_eq!(p.get_valid_token().await.unwrap(), "ya29.new");
        // Cached now; the server has no second response.
        assert_eq!(p.get_valid_token().await.unwrap(), "ya29.new");

        let saved = store.load_token().await.unwrap().unwrap();
        assert_eq!(saved.access_token, "ya29.new");
        assert_eq!(saved.refresh_token, "1//keep");
        assert!(saved.expires_at > Utc::now() + Duration::minutes(55));

        let seen = server.requests();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].line.starts_with("POST /token"));
        assert!(seen[0].body.contains("grant_type=refresh_token"));
        assert!(seen[0].body.contains("client_id=client"));
    }

    #[tokio::test]
    async fn test_refresh_takes_rotated_refresh_token() {
        let server = CannedServer::start(vec![(
            200,
            r#"{"access_token": "ya29.new", "expires_in": 3599, "refresh_token": "1//rotated"}"#,
        )])
        .await;
        let store = Arc::new(MemTokenStore::default());
        store.save_token(&expired_token()).await.unwrap();
        let p = provider_at(&server, store.clone());

        p.get_valid_token().await.unwrap();
        let saved = store.load_token().await.unwrap().unwrap();
        assert_eq!(saved.refresh_token, "1//rotated");
    }

    #[tokio::test]
    async fn test_rejected_refresh_is_auth_and_keeps_store() {
        let server = CannedServer::start(vec![(400, r#"{"error": "invalid_grant"}"#)]).await;
        let store = Arc::new(MemTokenStore::default());
        store.save_token(&expired_token()).await.unwrap();
        let p = provider_at(&server, store.clone());

        let err = p.get_valid_token().await.unwrap_err();
        assert!(matches!(err, DomainError::Auth(_)));
        let kept = store.load_token().await.unwrap().unwrap();
        assert_eq!(kept.access_token, "ya29.old");
        assert_eq!(kept.refresh_token, "1//keep");
    }

    #[tokio::test]
    async fn test_token_endpoint_outage_is_transient() {
        let server = CannedServer::start(vec![(503, r#"{"error": "unavailable"}"#)]).await;
        let store = Arc::new(MemTokenStore::default());
        store.save_token(&expired_token()).await.unwrap();
        let p = provider_at(&server, store);

        let err = p.get_valid_token().await.unwrap_err();
        assert!(matches!(err, DomainError::Transient(_)));
    }
}
