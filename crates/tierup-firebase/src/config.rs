//! Application options and runtime settings.

use std::path::PathBuf;
use std::time::Duration;

use tierup_firestore::{LogLevel, TransportMode};

/// Default region for callable functions.
pub const DEFAULT_FUNCTIONS_REGION: &str = "us-central1";

/// Credentials identifying the backend project.
///
/// Values are taken as-is. Nothing is validated here; a wrong key or
/// project only shows up when a backend call is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirebaseOptions {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: String,
    pub app_id: String,
    pub measurement_id: String,
}

impl FirebaseOptions {
    /// Read the `FIREBASE_*` variables. Missing ones become empty strings.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).unwrap_or_default();
        Self {
            api_key: var("FIREBASE_API_KEY"),
            auth_domain: var("FIREBASE_AUTH_DOMAIN"),
            project_id: var("FIREBASE_PROJECT_ID"),
            storage_bucket: var("FIREBASE_STORAGE_BUCKET"),
            messaging_sender_id: var("FIREBASE_MESSAGING_SENDER_ID"),
            app_id: var("FIREBASE_APP_ID"),
            measurement_id: var("FIREBASE_MEASUREMENT_ID"),
        }
    }

    /// Load `.env` (if present) into the environment, then [`Self::from_env`].
    pub fn from_dotenv() -> Self {
        dotenvy::dotenv().ok();
        Self::from_env()
    }
}

/// Runtime settings for the clients built by `FirebaseApp`.
#[derive(Debug, Clone)]
pub struct AppSettings {
    /// Directory of the persistent document cache
    pub cache_dir: PathBuf,
    /// Firestore transport selection
    pub transport: TransportMode,
    /// Verbosity of Firestore client logging
    pub firestore_log_level: LogLevel,
    /// Region hosting callable functions
    pub functions_region: String,
    /// Request timeout for every client
    pub timeout: Duration,
    /// Firestore emulator base URL
    pub firestore_host: Option<String>,
    /// Auth emulator host
    pub auth_emulator_host: Option<String>,
    /// Functions origin override
    pub functions_origin: Option<String>,
}

impl AppSettings {
    /// Defaults for a project: shared temp-dir cache, auto-detected transport.
    pub fn for_project(project_id: &str) -> Self {
        Self {
            cache_dir: default_cache_dir(project_id),
            transport: TransportMode::AutoDetect,
            firestore_log_level: LogLevel::Warn,
            functions_region: DEFAULT_FUNCTIONS_REGION.to_string(),
            timeout: Duration::from_secs(30),
            firestore_host: None,
            auth_emulator_host: None,
            functions_origin: None,
        }
    }

    /// Create settings from environment variables.
    pub fn from_env(options: &FirebaseOptions) -> Self {
        let defaults = Self::for_project(&options.project_id);
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        Self {
            cache_dir: non_empty("TIERUP_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            transport: non_empty("FIRESTORE_TRANSPORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.transport),
            firestore_log_level: non_empty("FIRESTORE_LOG_LEVEL")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.firestore_log_level),
            functions_region: non_empty("FIREBASE_FUNCTIONS_REGION")
                .unwrap_or(defaults.functions_region),
            timeout: non_empty("FIREBASE_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            firestore_host: tierup_firestore::config::emulator_host_from_env(),
            auth_emulator_host: non_empty("FIREBASE_AUTH_EMULATOR_HOST"),
            functions_origin: non_empty("FUNCTIONS_EMULATOR_ORIGIN"),
        }
    }

    /// Base URL for callable functions of `project_id`.
    pub fn functions_origin_for(&self, project_id: &str) -> String {
        match &self.functions_origin {
            Some(origin) => origin.trim_end_matches('/').to_string(),
            None => format!(
                "https://{}-{}.cloudfunctions.net",
                self.functions_region, project_id
            ),
        }
    }
}

/// `<tmp>/tierup-cache/<project>`; every process of one app shares it.
pub fn default_cache_dir(project_id: &str) -> PathBuf {
    let project = if project_id.is_empty() {
        "default"
    } else {
        project_id
    };
    std::env::temp_dir().join("tierup-cache").join(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const OPTION_VARS: [&str; 7] = [
        "FIREBASE_API_KEY",
        "FIREBASE_AUTH_DOMAIN",
        "FIREBASE_PROJECT_ID",
        "FIREBASE_STORAGE_BUCKET",
        "FIREBASE_MESSAGING_SENDER_ID",
        "FIREBASE_APP_ID",
        "FIREBASE_MEASUREMENT_ID",
    ];

    const SETTING_VARS: [&str; 8] = [
        "TIERUP_CACHE_DIR",
        "FIRESTORE_TRANSPORT",
        "FIRESTORE_LOG_LEVEL",
        "FIREBASE_FUNCTIONS_REGION",
        "FIREBASE_TIMEOUT_SECS",
        "FIRESTORE_EMULATOR_HOST",
        "FIREBASE_AUTH_EMULATOR_HOST",
        "FUNCTIONS_EMULATOR_ORIGIN",
    ];

    fn clear(vars: &[&str]) {
        for v in vars {
            std::env::remove_var(v);
        }
    }

    #[test]
    #[serial]
    fn test_options_missing_become_empty() {
        clear(&OPTION_VARS);
        assert_eq!(FirebaseOptions::from_env(), FirebaseOptions::default());
    }

    #[test]
    #[serial]
    fn test_options_read_verbatim() {
        clear(&OPTION_VARS);
        std::env::set_var("FIREBASE_API_KEY", "  not-a-real-key ");
        std::env::set_var("FIREBASE_PROJECT_ID", "tierup-demo");

        let options = FirebaseOptions::from_env();
        assert_eq!(options.api_key, "  not-a-real-key ");
        assert_eq!(options.project_id, "tierup-demo");
        assert_eq!(options.app_id, "");

        clear(&OPTION_VARS);
    }

    #[test]
    #[serial]
    fn test_settings_defaults() {
        clear(&SETTING_VARS);
        let options = FirebaseOptions {
            project_id: "tierup-demo".to_string(),
            ..Default::default()
        };

        let settings = AppSettings::from_env(&options);
        assert_eq!(
            settings.cache_dir,
            std::env::temp_dir().join("tierup-cache").join("tierup-demo")
        );
        assert_eq!(settings.transport, TransportMode::AutoDetect);
        assert_eq!(settings.firestore_log_level, LogLevel::Warn);
        assert_eq!(settings.functions_region, "us-central1");
        assert!(settings.firestore_host.is_none());
        assert_eq!(
            settings.functions_origin_for("tierup-demo"),
            "https://us-central1-tierup-demo.cloudfunctions.net"
        );
    }

    #[test]
    #[serial]
    fn test_settings_overrides() {
        clear(&SETTING_VARS);
        std::env::set_var("TIERUP_CACHE_DIR", "/var/cache/tierup");
        std::env::set_var("FIRESTORE_TRANSPORT", "http1");
        std::env::set_var("FIREBASE_FUNCTIONS_REGION", "europe-west1");
        std::env::set_var("FIRESTORE_EMULATOR_HOST", "localhost:8080");
        std::env::set_var("FUNCTIONS_EMULATOR_ORIGIN", "http://localhost:5001/demo/us-central1/");

        let settings = AppSettings::from_env(&FirebaseOptions::default());
        assert_eq!(settings.cache_dir, PathBuf::from("/var/cache/tierup"));
        assert_eq!(settings.transport, TransportMode::Http1Only);
        assert_eq!(settings.functions_region, "europe-west1");
        assert_eq!(settings.firestore_host.as_deref(), Some("http://localhost:8080"));
        assert_eq!(
            settings.functions_origin_for("demo"),
            "http://localhost:5001/demo/us-central1"
        );

        clear(&SETTING_VARS);
    }

    #[test]
    fn test_default_cache_dir_without_project() {
        assert!(default_cache_dir("").ends_with("tierup-cache/default"));
    }
}
