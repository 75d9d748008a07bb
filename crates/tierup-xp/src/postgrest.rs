//! PostgREST (Supabase-style) relational store.
//!
//! Profiles are rows of the `profiles` table keyed by `id`, with a JSON `xp`
//! column. The client also exposes remote procedure calls.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use tierup_models::{Category, XpScores};

use crate::error::{XpError, XpResult};
use crate::store::{ProfileStore, XP_FIELD};

/// Default table holding user profiles.
pub const PROFILES_TABLE: &str = "profiles";

/// PostgREST endpoint configuration.
#[derive(Debug, Clone)]
pub struct PostgrestConfig {
    /// Project URL, e.g. `https://abc.supabase.co`
    pub url: String,
    /// Anonymous (publishable) API key
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
}

impl PostgrestConfig {
    /// Create config from `SUPABASE_URL` / `SUPABASE_ANON_KEY`.
    ///
    /// Values are not validated; a bad URL or key fails on the first request.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("SUPABASE_URL").unwrap_or_default(),
            api_key: std::env::var("SUPABASE_ANON_KEY").unwrap_or_default(),
            timeout: Duration::from_secs(
                std::env::var("SUPABASE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.url.trim_end_matches('/'))
    }
}

/// Minimal PostgREST client: filtered select, filtered update, RPC.
#[derive(Clone)]
pub struct PostgrestClient {
    http: Client,
    config: PostgrestConfig,
    access_token: Option<String>,
}

impl PostgrestClient {
    pub fn new(config: PostgrestConfig) -> XpResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("tierup-xp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(XpError::Network)?;

        Ok(Self {
            http,
            config,
            access_token: None,
        })
    }

    pub fn from_env() -> XpResult<Self> {
        Self::new(PostgrestConfig::from_env())
    }

    /// Act as a signed-in user instead of the anonymous role.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.config.api_key);
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(bearer)
    }

    async fn check(response: Response) -> XpResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(XpError::RequestFailed {
            status: status.as_u16(),
            body,
        })
    }

    /// `GET /{table}?{column}=eq.{value}&select={columns}`
    pub async fn select_eq(
        &self,
        table: &str,
        column: &str,
        value: &str,
        columns: &str,
    ) -> XpResult<Vec<serde_json::Value>> {
        let url = format!("{}/{}", self.config.rest_url(), table);
        let filter = format!("eq.{}", value);

        let response = self
            .authorize(self.http.get(&url))
            .query(&[(column, filter.as_str()), ("select", columns)])
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    /// `PATCH /{table}?{column}=eq.{value}` with a partial row.
    ///
    /// Rows that do not match are not created.
    pub async fn update_eq<B: Serialize + ?Sized>(
        &self,
        table: &str,
        column: &str,
        value: &str,
        patch: &B,
    ) -> XpResult<()> {
        let url = format!("{}/{}", self.config.rest_url(), table);
        let filter = format!("eq.{}", value);

        let response = self
            .authorize(self.http.patch(&url))
            .query(&[(column, filter.as_str())])
            .header("Prefer", "return=minimal")
            .json(patch)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    /// Call a database function: `POST /rpc/{name}`.
    pub async fn rpc<A, R>(&self, name: &str, args: &A) -> XpResult<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/rpc/{}", self.config.rest_url(), name);
        debug!(function = %name, "Calling remote procedure");

        let response = self
            .authorize(self.http.post(&url))
            .json(args)
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }
}

/// Profile store over a PostgREST table.
///
/// Writes are filtered updates, so a user without a profile row reads as
/// zero XP and an award to them stores nothing. Rows are created elsewhere
/// (signup trigger or backend).
#[derive(Clone)]
pub struct PostgrestProfileStore {
    client: PostgrestClient,
    table: String,
}

impl PostgrestProfileStore {
    pub fn new(client: PostgrestClient) -> Self {
        Self::with_table(client, PROFILES_TABLE)
    }

    pub fn with_table(client: PostgrestClient, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

/// Decode a JSON `xp` column value with the same rules as the Firestore store.
pub fn decode_xp_json(user_id: &str, value: &serde_json::Value) -> XpResult<Option<XpScores>> {
    let map = match value {
        serde_json::Value::Null => return Ok(None),
        serde_json::Value::Object(map) => map,
        other => {
            return Err(XpError::invalid_record(
                user_id,
                format!("xp is {}, expected an object", other),
            ))
        }
    };

    let mut scores = XpScores::default();
    for category in Category::ALL {
        match map.get(category.as_str()) {
            None | Some(serde_json::Value::Null) => {}
            Some(v) => {
                let score = v.as_i64().ok_or_else(|| {
                    XpError::invalid_record(
                        user_id,
                        format!("xp.{} is {}, expected an integer", category, v),
                    )
                })?;
                scores.set(category, score);
            }
        }
    }
    Ok(Some(scores))
}

#[async_trait]
impl ProfileStore for PostgrestProfileStore {
    async fn fetch_xp(&self, user_id: &str) -> XpResult<Option<XpScores>> {
        let rows = self
            .client
            .select_eq(&self.table, "id", user_id, XP_FIELD)
            .await?;

        match rows.first().and_then(|row| row.get(XP_FIELD)) {
            Some(xp) => decode_xp_json(user_id, xp),
            None => Ok(None),
        }
    }

    async fn write_xp(&self, user_id: &str, scores: &XpScores) -> XpResult<()> {
        debug!(
            user_id = %user_id,
            table = %self.table,
            "Updating xp column; absent rows are not created"
        );
        self.client
            .update_eq(
                &self.table,
                "id",
                user_id,
                &serde_json::json!({ XP_FIELD: scores }),
            )
            .await
    }
}
