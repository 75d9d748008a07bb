//! Bearer token sources for authenticating REST calls.
//!
//! The client does not care where a token comes from. Server processes use
//! [`ServiceAccountTokens`] (OAuth tokens minted by `gcp_auth`); client apps
//! plug in their signed-in user session; unauthenticated access uses
//! [`NoToken`] and relies on the API key plus security rules.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

/// Refresh margin: refresh token 60 seconds before expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Conservative token TTL when expiry is unknown (50 minutes).
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for Firestore/Datastore access.
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Supplies the `Authorization: Bearer` token for outgoing requests.
#[async_trait]
pub trait BearerTokenSource: Send + Sync {
    /// Current token, or `None` to send the request without one.
    async fn bearer_token(&self) -> FirestoreResult<Option<String>>;

    /// Drop any cached token after the server reported it expired.
    async fn invalidate(&self) {}
}

/// Sends requests without a bearer token.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoToken;

#[async_trait]
impl BearerTokenSource for NoToken {
    async fn bearer_token(&self) -> FirestoreResult<Option<String>> {
        Ok(None)
    }
}

/// Fixed token, e.g. `"owner"` against the local emulator.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl BearerTokenSource for StaticToken {
    async fn bearer_token(&self) -> FirestoreResult<Option<String>> {
        Ok(Some(self.0.clone()))
    }
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    /// Valid with refresh margin.
    fn is_valid(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    /// Technically still usable, even if a refresh is due.
    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Service-account OAuth tokens with single-flight refresh.
pub struct ServiceAccountTokens {
    auth: Arc<dyn TokenProvider>,
    cache: RwLock<Option<CachedToken>>,
}

impl ServiceAccountTokens {
    pub fn new(auth: Arc<dyn TokenProvider>) -> Self {
        Self {
            auth,
            cache: RwLock::new(None),
        }
    }

    /// Load the service account named by `GOOGLE_APPLICATION_CREDENTIALS`.
    pub fn from_env() -> FirestoreResult<Self> {
        let service_account = CustomServiceAccount::from_env().map_err(|e| {
            FirestoreError::auth_error(format!("Failed to load service account: {}", e))
        })?;

        match service_account {
            Some(sa) => Ok(Self::new(Arc::new(sa))),
            None => Err(FirestoreError::auth_error(
                "GOOGLE_APPLICATION_CREDENTIALS not set. \
                 Set it to the path of your service account JSON file.",
            )),
        }
    }

    async fn refresh(&self, cache: &mut Option<CachedToken>) -> FirestoreResult<String> {
        match self.auth.token(&[FIRESTORE_SCOPE]).await {
            Ok(token) => {
                let access_token = token.as_str().to_string();

                let now = Utc::now();
                let exp = token.expires_at();
                let expires_at = if exp > now {
                    (exp - now)
                        .to_std()
                        .map(|ttl| Instant::now() + ttl)
                        .unwrap_or_else(|_| Instant::now() + TOKEN_DEFAULT_TTL)
                } else {
                    // Already expired: force a refresh on the next request.
                    Instant::now()
                };

                *cache = Some(CachedToken {
                    access_token: access_token.clone(),
                    expires_at,
                });

                debug!("Refreshed service account token");
                Ok(access_token)
            }
            Err(e) => {
                if let Some(cached) = cache.as_ref().filter(|c| c.is_usable()) {
                    warn!("Token refresh failed, using existing token: {}", e);
                    return Ok(cached.access_token.clone());
                }

                Err(FirestoreError::auth_error(format!(
                    "Failed to obtain auth token: {}",
                    e
                )))
            }
        }
    }
}

#[async_trait]
impl BearerTokenSource for ServiceAccountTokens {
    async fn bearer_token(&self) -> FirestoreResult<Option<String>> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.is_valid()) {
                return Ok(Some(cached.access_token.clone()));
            }
        }

        let mut cache = self.cache.write().await;

        // Another task may have refreshed while we waited for the write lock.
        if let Some(cached) = cache.as_ref().filter(|c| c.is_valid()) {
            return Ok(Some(cached.access_token.clone()));
        }

        self.refresh(&mut cache).await.map(Some)
    }

    async fn invalidate(&self) {
        *self.cache.write().await = None;
    }
}
