//! Client configuration and the process-wide log level.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use crate::error::{FirestoreError, FirestoreResult};
use crate::retry::RetryConfig;
use crate::transport::TransportMode;

/// Production Firestore endpoint.
pub const FIRESTORE_HOST: &str = "https://firestore.googleapis.com";

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// GCP project ID
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// Scheme + host, overridable for the emulator
    pub host: String,
    /// Web API key sent as `key=` when set
    pub api_key: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration for `with_retry`
    pub retry: RetryConfig,
    pub transport: TransportMode,
    /// Persistent cache directory; `None` disables the cache
    pub cache_dir: Option<PathBuf>,
}

impl FirestoreConfig {
    /// Config with defaults for everything but the project.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: "(default)".to_string(),
            host: FIRESTORE_HOST.to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
            transport: TransportMode::default(),
            cache_dir: None,
        }
    }

    /// Create config from environment variables.
    ///
    /// Used for service-account access, where a missing project is a
    /// configuration error worth failing fast on.
    pub fn from_env() -> FirestoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))
            .map_err(|_| {
                FirestoreError::auth_error(
                    "GCP_PROJECT_ID or FIREBASE_PROJECT_ID must be set to access Firestore",
                )
            })?;

        if project_id.is_empty() {
            return Err(FirestoreError::auth_error(
                "GCP_PROJECT_ID or FIREBASE_PROJECT_ID cannot be empty",
            ));
        }

        let connect_timeout_secs: u64 = std::env::var("FIRESTORE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let mut config = Self::new(project_id);
        config.database_id =
            std::env::var("FIRESTORE_DATABASE_ID").unwrap_or_else(|_| "(default)".to_string());
        config.host = emulator_host_from_env().unwrap_or(config.host);
        config.connect_timeout = Duration::from_secs(connect_timeout_secs);
        config.retry = RetryConfig::from_env();
        config.transport = std::env::var("FIRESTORE_TRANSPORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        config.cache_dir = std::env::var("FIRESTORE_CACHE_DIR").ok().map(PathBuf::from);
        Ok(config)
    }

    /// Collection root: `{host}/v1/projects/{p}/databases/{d}/documents`.
    pub fn documents_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/databases/{}/documents",
            self.host.trim_end_matches('/'),
            self.project_id,
            self.database_id
        )
    }
}

/// `FIRESTORE_EMULATOR_HOST` (e.g. `localhost:8080`) as a base URL.
pub fn emulator_host_from_env() -> Option<String> {
    std::env::var("FIRESTORE_EMULATOR_HOST")
        .ok()
        .filter(|h| !h.is_empty())
        .map(|h| {
            if h.starts_with("http://") || h.starts_with("https://") {
                h
            } else {
                format!("http://{}", h)
            }
        })
}

// =============================================================================
// Log level
// =============================================================================

/// Verbosity of this crate's log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
    Silent = 4,
}

impl LogLevel {
    /// `tracing-subscriber` filter directive value.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Silent => "off",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warn,
            3 => LogLevel::Error,
            _ => LogLevel::Silent,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" | "trace" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "silent" | "off" => Ok(LogLevel::Silent),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Set this crate's log verbosity for the whole process.
///
/// The subscriber installed by the application reads it when building its
/// filter (see `tierup_firebase::logging`).
pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Release);
}

/// Current process-wide log verbosity for this crate.
pub fn log_level() -> LogLevel {
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Acquire))
}

/// Target name used in filter directives.
pub const LOG_TARGET: &str = "tierup_firestore";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documents_url() {
        let mut config = FirestoreConfig::new("demo");
        assert_eq!(
            config.documents_url(),
            "https://firestore.googleapis.com/v1/projects/demo/databases/(default)/documents"
        );
        config.host = "http://localhost:8080/".to_string();
        assert_eq!(
            config.documents_url(),
            "http://localhost:8080/v1/projects/demo/databases/(default)/documents"
        );
    }

    #[test]
    fn test_log_level_parse_and_directive() {
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("silent".parse::<LogLevel>().unwrap().as_directive(), "off");
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_level_roundtrips_through_atomic() {
        for level in [
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
            LogLevel::Silent,
        ] {
            assert_eq!(LogLevel::from_u8(level as u8), level);
        }
    }
}
