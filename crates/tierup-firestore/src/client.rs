//! Firestore REST API client.
//!
//! Client with:
//! - Pluggable bearer token source (service account or signed-in user)
//! - Transport auto-detection with HTTP/1.1 fallback
//! - Persistent document cache used when the backend is unreachable
//! - Observability (tracing spans, metrics)

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, info_span, warn, Instrument};

use crate::cache::PersistentCache;
use crate::config::FirestoreConfig;
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::{record_cache_read, record_request};
use crate::token::{BearerTokenSource, ServiceAccountTokens};
use crate::transport::{Transport, TransportConfig};
use crate::types::{Document, Value};

/// Firestore REST API client.
///
/// Cheap to clone; clones share the transport, token source and cache.
#[derive(Clone)]
pub struct FirestoreClient {
    transport: Transport,
    config: FirestoreConfig,
    base_url: String,
    tokens: Arc<dyn BearerTokenSource>,
    cache: Option<Arc<PersistentCache>>,
}

impl FirestoreClient {
    /// Create a new Firestore client.
    pub async fn new(
        config: FirestoreConfig,
        tokens: Arc<dyn BearerTokenSource>,
    ) -> FirestoreResult<Self> {
        let transport = Transport::new(&TransportConfig {
            mode: config.transport,
            timeout: config.timeout,
            connect_timeout: config.connect_timeout,
            user_agent: concat!("tierup-firestore/", env!("CARGO_PKG_VERSION")).to_string(),
        })
        .map_err(FirestoreError::Network)?;

        let cache = match &config.cache_dir {
            Some(dir) => Some(Arc::new(PersistentCache::open(dir).await?)),
            None => None,
        };

        let base_url = config.documents_url();

        Ok(Self {
            transport,
            config,
            base_url,
            tokens,
            cache,
        })
    }

    /// Service-account client configured from environment variables.
    pub async fn from_env() -> FirestoreResult<Self> {
        let config = FirestoreConfig::from_env()?;
        let tokens = ServiceAccountTokens::from_env()?;
        Self::new(config, Arc::new(tokens)).await
    }

    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn cache(&self) -> Option<&PersistentCache> {
        self.cache.as_deref()
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
    }

    /// Build document path.
    fn document_path(&self, collection: &str, doc_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            collection,
            urlencoding::encode(doc_id)
        )
    }

    // =========================================================================
    // Document operations
    // =========================================================================

    /// Get a document by ID. `Ok(None)` when it does not exist.
    ///
    /// When the backend is unreachable and a cached copy exists, the cached
    /// copy is returned instead of the network error.
    pub async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> FirestoreResult<Option<Document>> {
        let url = self.document_path(collection, doc_id);

        let result = self
            .execute_request("get_document", collection, Some(doc_id), async {
                let response = self.send(|http| http.get(&url)).await?;
                let status = response.status();

                match status {
                    StatusCode::OK => {
                        let doc: Document = response.json().await?;
                        Ok(Some(doc))
                    }
                    StatusCode::NOT_FOUND => Ok(None),
                    _ => Err(Self::handle_error_response(status, &url, response).await),
                }
            })
            .await;

        match result {
            Ok(doc) => {
                self.remember(collection, doc_id, doc.as_ref()).await;
                Ok(doc)
            }
            Err(e) if e.is_unreachable() => match self.cached(collection, doc_id).await {
                Some(doc) => {
                    warn!(
                        collection = %collection,
                        doc_id = %doc_id,
                        "Firestore unreachable, serving cached document: {}",
                        e
                    );
                    record_cache_read("offline");
                    Ok(Some(doc))
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// Update a document (merge). Creates it if missing.
    ///
    /// With `update_mask`, only the listed field paths are written; other
    /// fields of the stored document are left untouched.
    pub async fn update_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        update_mask: Option<Vec<String>>,
    ) -> FirestoreResult<Document> {
        let url = self.document_path(collection, doc_id);
        let mask: Vec<(&str, &str)> = update_mask
            .iter()
            .flatten()
            .map(|f| ("updateMask.fieldPaths", f.as_str()))
            .collect();
        let body = Document::new(fields);

        let doc = self
            .execute_request("update_document", collection, Some(doc_id), async {
                let response = self
                    .send(|http| http.patch(&url).query(&mask).json(&body))
                    .await?;
                let status = response.status();

                match status {
                    StatusCode::OK => {
                        let doc: Document = response.json().await?;
                        Ok(doc)
                    }
                    _ => Err(Self::handle_error_response(status, &url, response).await),
                }
            })
            .await?;

        // The server copy moved on; drop the stale local one.
        self.forget(collection, doc_id).await;
        Ok(doc)
    }

    /// Execute with retry.
    pub async fn with_retry<T, F, Fut>(&self, operation: &str, op: F) -> FirestoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = FirestoreResult<T>>,
    {
        crate::retry::with_retry(&self.config.retry, operation, op).await
    }

    // =========================================================================
    // Cache
    // =========================================================================

    async fn cached(&self, collection: &str, doc_id: &str) -> Option<Document> {
        self.cache.as_ref()?.get(collection, doc_id).await
    }

    async fn remember(&self, collection: &str, doc_id: &str, doc: Option<&Document>) {
        let Some(cache) = &self.cache else { return };
        let result = match doc {
            Some(doc) => cache.put(collection, doc_id, doc).await,
            None => cache.remove(collection, doc_id).await,
        };
        if let Err(e) = result {
            debug!(collection = %collection, doc_id = %doc_id, "Cache write failed: {}", e);
        }
    }

    async fn forget(&self, collection: &str, doc_id: &str) {
        self.remember(collection, doc_id, None).await;
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    fn authorize(&self, request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        let request = match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        match self.config.api_key.as_deref() {
            Some(key) if !key.is_empty() => request.query(&[("key", key)]),
            _ => request,
        }
    }

    /// Send an authorized request, refreshing the token once if the server
    /// reports it expired.
    async fn send<F>(&self, build: F) -> FirestoreResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.tokens.bearer_token().await?;
        let response = self
            .transport
            .send(|http| self.authorize(build(http), token.as_deref()))
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if !Self::is_access_token_expired(&body) {
            return Err(FirestoreError::from_http_status(401, body));
        }

        debug!("Access token rejected as expired, refreshing");
        self.tokens.invalidate().await;
        let token = self.tokens.bearer_token().await?;
        let response = self
            .transport
            .send(|http| self.authorize(build(http), token.as_deref()))
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(FirestoreError::from_http_status(401, body));
        }
        Ok(response)
    }

    /// Execute a request with tracing and metrics.
    async fn execute_request<T, F>(
        &self,
        operation: &str,
        collection: &str,
        doc_id: Option<&str>,
        fut: F,
    ) -> FirestoreResult<T>
    where
        F: std::future::Future<Output = FirestoreResult<T>>,
    {
        let span = if let Some(id) = doc_id {
            info_span!("firestore_request", operation = %operation, collection = %collection, doc_id = %id)
        } else {
            info_span!("firestore_request", operation = %operation, collection = %collection)
        };

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn handle_error_response(status: StatusCode, url: &str, response: Response) -> FirestoreError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(|secs| secs * 1000);
            if let Some(ms) = retry_after_ms {
                return FirestoreError::RateLimited(ms);
            }
        }

        let body = response.text().await.unwrap_or_default();
        FirestoreError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
