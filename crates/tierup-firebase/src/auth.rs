//! Firebase Auth over the Identity Toolkit REST API.
//!
//! The signed-in session lives inside the [`AuthClient`] and is shared by
//! every clone. The client doubles as the Firestore bearer token source, so
//! document requests carry the user's ID token once someone signs in.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use tierup_firestore::{BearerTokenSource, FirestoreError, FirestoreResult};

use crate::error::{AuthError, AuthResult};

/// Production Identity Toolkit base URL.
pub const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Production Secure Token base URL.
pub const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";

/// Refresh the ID token this long before it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Redirect URI sent with IdP credentials obtained outside a browser flow.
const IDP_REQUEST_URI: &str = "http://localhost";

// =============================================================================
// Endpoints
// =============================================================================

/// Base URLs of the two auth services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    pub identity_toolkit: String,
    pub secure_token: String,
}

impl AuthEndpoints {
    pub fn production() -> Self {
        Self {
            identity_toolkit: IDENTITY_TOOLKIT_URL.to_string(),
            secure_token: SECURE_TOKEN_URL.to_string(),
        }
    }

    /// Auth emulator at `host` (`localhost:9099` or a full URL).
    pub fn emulator(host: &str) -> Self {
        let base = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", host.trim_end_matches('/'))
        };
        Self {
            identity_toolkit: format!("{}/identitytoolkit.googleapis.com/v1", base),
            secure_token: format!("{}/securetoken.googleapis.com/v1", base),
        }
    }
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self::production()
    }
}

// =============================================================================
// Federated providers
// =============================================================================

/// Credential obtained from an identity provider's own sign-in flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdpCredential {
    IdToken(String),
    AccessToken(String),
}

/// External identity provider configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedProvider {
    provider_id: String,
    scopes: Vec<String>,
    custom_parameters: BTreeMap<String, String>,
}

impl FederatedProvider {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            scopes: Vec::new(),
            custom_parameters: BTreeMap::new(),
        }
    }

    /// Google sign-in.
    pub fn google() -> Self {
        Self::new("google.com")
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Request an extra OAuth scope. Duplicates are ignored.
    pub fn add_scope(mut self, scope: impl Into<String>) -> Self {
        let scope = scope.into();
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
        self
    }

    /// Extra OAuth parameters, e.g. `prompt=select_account`.
    pub fn with_custom_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_parameters.insert(key.into(), value.into());
        self
    }

    /// Parameters for the provider's authorization request.
    pub fn authorization_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.custom_parameters.len() + 1);
        if !self.scopes.is_empty() {
            params.push(("scope".to_string(), self.scopes.join(" ")));
        }
        params.extend(
            self.custom_parameters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        params
    }

    /// Form-encoded `postBody` for `accounts:signInWithIdp`.
    pub fn post_body(&self, credential: &IdpCredential) -> String {
        let (kind, token) = match credential {
            IdpCredential::IdToken(t) => ("id_token", t),
            IdpCredential::AccessToken(t) => ("access_token", t),
        };
        format!(
            "{}={}&providerId={}",
            kind,
            urlencoding::encode(token),
            urlencoding::encode(&self.provider_id)
        )
    }
}

// =============================================================================
// Session
// =============================================================================

/// Signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub is_anonymous: bool,
}

/// Tokens for the signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: AuthUser,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    /// Valid with refresh margin.
    fn is_fresh(&self) -> bool {
        Utc::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    fn is_usable(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

fn expires_at(expires_in: &str) -> DateTime<Utc> {
    // Unparseable or out-of-range lifetimes count as already expired so the
    // next use refreshes.
    let now = Utc::now();
    expires_in
        .parse::<i64>()
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(now)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithIdpRequest<'a> {
    post_body: &'a str,
    request_uri: &'a str,
    return_secure_token: bool,
    return_idp_credential: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    id_token: String,
    refresh_token: String,
    expires_in: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

// =============================================================================
// Client
// =============================================================================

struct AuthInner {
    http: Client,
    api_key: String,
    endpoints: AuthEndpoints,
    session: RwLock<Option<AuthSession>>,
}

/// Auth client bound to one app. Cheap to clone.
#[derive(Clone)]
pub struct AuthClient {
    inner: Arc<AuthInner>,
}

impl AuthClient {
    pub fn new(
        api_key: impl Into<String>,
        endpoints: AuthEndpoints,
        timeout: Duration,
    ) -> AuthResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tierup-firebase/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(AuthInner {
                http,
                api_key: api_key.into(),
                endpoints,
                session: RwLock::new(None),
            }),
        })
    }

    pub fn endpoints(&self) -> &AuthEndpoints {
        &self.inner.endpoints
    }

    /// Sign in with a credential from an external identity provider.
    pub async fn sign_in_with_idp(
        &self,
        provider: &FederatedProvider,
        credential: IdpCredential,
    ) -> AuthResult<AuthUser> {
        let post_body = provider.post_body(&credential);
        let request = SignInWithIdpRequest {
            post_body: &post_body,
            request_uri: IDP_REQUEST_URI,
            return_secure_token: true,
            return_idp_credential: true,
        };

        let url = format!("{}/accounts:signInWithIdp", self.inner.endpoints.identity_toolkit);
        let response: SignInResponse = self.post_json(&url, &request).await?;
        let user = self.store_sign_in(response, false).await;

        info!(uid = %user.uid, provider = %provider.provider_id(), "Signed in with identity provider");
        Ok(user)
    }

    /// Create and sign in an anonymous account.
    pub async fn sign_in_anonymously(&self) -> AuthResult<AuthUser> {
        let url = format!("{}/accounts:signUp", self.inner.endpoints.identity_toolkit);
        let response: SignInResponse = self
            .post_json(&url, &serde_json::json!({ "returnSecureToken": true }))
            .await?;
        let user = self.store_sign_in(response, true).await;

        info!(uid = %user.uid, "Signed in anonymously");
        Ok(user)
    }

    /// Exchange the refresh token for a new ID token.
    pub async fn refresh(&self) -> AuthResult<AuthSession> {
        let mut session = self.inner.session.write().await;
        self.refresh_locked(&mut session).await
    }

    /// Currently signed-in user, if any.
    pub async fn current_user(&self) -> Option<AuthUser> {
        self.inner.session.read().await.as_ref().map(|s| s.user.clone())
    }

    /// Snapshot of the current session, if any.
    pub async fn session(&self) -> Option<AuthSession> {
        self.inner.session.read().await.clone()
    }

    pub async fn sign_out(&self) {
        if let Some(session) = self.inner.session.write().await.take() {
            info!(uid = %session.user.uid, "Signed out");
        }
    }

    /// ID token of the signed-in user, refreshed when close to expiry.
    pub async fn id_token(&self) -> AuthResult<Option<String>> {
        {
            let session = self.inner.session.read().await;
            match session.as_ref() {
                None => return Ok(None),
                Some(s) if s.is_fresh() => return Ok(Some(s.id_token.clone())),
                Some(_) => {}
            }
        }

        let mut session = self.inner.session.write().await;

        // Another task may have refreshed while we waited for the write lock.
        match session.as_ref() {
            None => return Ok(None),
            Some(s) if s.is_fresh() => return Ok(Some(s.id_token.clone())),
            Some(_) => {}
        }

        match self.refresh_locked(&mut session).await {
            Ok(refreshed) => Ok(Some(refreshed.id_token)),
            Err(e) => match session.as_ref().filter(|s| s.is_usable()) {
                Some(s) => {
                    warn!("ID token refresh failed, using existing token: {}", e);
                    Ok(Some(s.id_token.clone()))
                }
                None => Err(e),
            },
        }
    }

    async fn refresh_locked(&self, session: &mut Option<AuthSession>) -> AuthResult<AuthSession> {
        let current = session.as_ref().ok_or(AuthError::NotSignedIn)?;

        let url = format!(
            "{}/token?key={}",
            self.inner.endpoints.secure_token,
            urlencoding::encode(&self.inner.api_key)
        );
        let body = format!(
            "grant_type=refresh_token&refresh_token={}",
            urlencoding::encode(&current.refresh_token)
        );

        let response = self
            .inner
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;
        let refreshed: RefreshResponse = Self::decode(response).await?;

        if refreshed.user_id != current.user.uid {
            return Err(AuthError::InvalidResponse(format!(
                "refresh returned user {} for session of {}",
                refreshed.user_id, current.user.uid
            )));
        }

        let next = AuthSession {
            user: current.user.clone(),
            id_token: refreshed.id_token,
            refresh_token: refreshed.refresh_token,
            expires_at: expires_at(&refreshed.expires_in),
        };
        *session = Some(next.clone());

        debug!(uid = %next.user.uid, "Refreshed ID token");
        Ok(next)
    }

    async fn store_sign_in(&self, response: SignInResponse, is_anonymous: bool) -> AuthUser {
        let user = AuthUser {
            uid: response.local_id,
            email: response.email,
            display_name: response.display_name,
            is_anonymous,
        };
        *self.inner.session.write().await = Some(AuthSession {
            user: user.clone(),
            id_token: response.id_token,
            refresh_token: response.refresh_token,
            expires_at: expires_at(&response.expires_in),
        });
        user
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> AuthResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .inner
            .http
            .post(url)
            .query(&[("key", self.inner.api_key.as_str())])
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<R: DeserializeOwned>(response: Response) -> AuthResult<R> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return Ok(serde_json::from_str(&text)?);
        }

        let message = serde_json::from_str::<ErrorEnvelope>(&text)
            .map(|e| e.error.message)
            .unwrap_or(text);
        Err(AuthError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl BearerTokenSource for AuthClient {
    async fn bearer_token(&self) -> FirestoreResult<Option<String>> {
        self.id_token()
            .await
            .map_err(|e| FirestoreError::auth_error(e.to_string()))
    }

    async fn invalidate(&self) {
        // Keep the refresh token; force the next request to refresh.
        if let Some(session) = self.inner.session.write().await.as_mut() {
            session.expires_at = Utc::now();
        }
    }
}
