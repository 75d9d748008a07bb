//! Firestore REST API client.
//!
//! This crate provides:
//! - Document reads and masked merge writes
//! - Pluggable bearer tokens (service account via gcp_auth, or a user session)
//! - Persistent on-disk document cache shared between processes
//! - Transport auto-detection with HTTP/1.1 fallback
//! - Opt-in retry with backoff, tracing spans and metrics

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod token;
pub mod transport;
pub mod types;

pub use cache::PersistentCache;
pub use client::FirestoreClient;
pub use config::{log_level, set_log_level, FirestoreConfig, LogLevel, LOG_TARGET};
pub use error::{FirestoreError, FirestoreResult};
pub use retry::RetryConfig;
pub use token::{BearerTokenSource, NoToken, ServiceAccountTokens, StaticToken};
pub use transport::TransportMode;
pub use types::{Document, FromFirestoreValue, MapValue, ToFirestoreValue, Value};
