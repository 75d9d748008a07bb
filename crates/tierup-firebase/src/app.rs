//! Application context.

use std::sync::Arc;

use tracing::info;

use tierup_firestore::{FirestoreClient, FirestoreConfig};
use tierup_xp::{FirestoreProfileStore, XpService};

use crate::auth::{AuthClient, AuthEndpoints, FederatedProvider};
use crate::config::{AppSettings, FirebaseOptions};
use crate::error::FirebaseResult;
use crate::functions::FunctionsClient;
use crate::logging::set_firestore_log_level;

/// Backend handles for one app, built once at startup.
///
/// Every handle is a cheap clone sharing state with the others: Firestore
/// and Functions requests both carry the ID token of whoever is signed in
/// through [`FirebaseApp::auth`].
#[derive(Clone)]
pub struct FirebaseApp {
    options: FirebaseOptions,
    settings: AppSettings,
    auth: AuthClient,
    google_provider: FederatedProvider,
    firestore: FirestoreClient,
    functions: FunctionsClient,
}

impl FirebaseApp {
    /// Build every client from `options`.
    ///
    /// Options are not validated; bad credentials surface on the first
    /// rejected backend call.
    pub async fn initialize(options: FirebaseOptions, settings: AppSettings) -> FirebaseResult<Self> {
        // Fails only when a provider is already installed, which is fine.
        let _ = rustls::crypto::ring::default_provider().install_default();

        set_firestore_log_level(settings.firestore_log_level)?;

        let endpoints = match &settings.auth_emulator_host {
            Some(host) => AuthEndpoints::emulator(host),
            None => AuthEndpoints::production(),
        };
        let auth = AuthClient::new(options.api_key.clone(), endpoints, settings.timeout)?;
        let google_provider = FederatedProvider::google();

        let mut config = FirestoreConfig::new(options.project_id.clone());
        if let Some(host) = &settings.firestore_host {
            config.host = host.clone();
        }
        if !options.api_key.is_empty() {
            config.api_key = Some(options.api_key.clone());
        }
        config.timeout = settings.timeout;
        config.transport = settings.transport;
        config.cache_dir = Some(settings.cache_dir.clone());
        let firestore = FirestoreClient::new(config, Arc::new(auth.clone())).await?;

        let functions = FunctionsClient::new(
            settings.functions_origin_for(&options.project_id),
            auth.clone(),
            settings.timeout,
        )?;

        info!(
            project_id = %options.project_id,
            transport = ?settings.transport,
            cache_dir = %settings.cache_dir.display(),
            "Backend clients initialized"
        );

        Ok(Self {
            options,
            settings,
            auth,
            google_provider,
            firestore,
            functions,
        })
    }

    /// [`Self::initialize`] with options and settings read from the environment.
    pub async fn from_env() -> FirebaseResult<Self> {
        let options = FirebaseOptions::from_env();
        let settings = AppSettings::from_env(&options);
        Self::initialize(options, settings).await
    }

    pub fn options(&self) -> &FirebaseOptions {
        &self.options
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    /// Google provider, reused across sign-ins.
    pub fn google_provider(&self) -> &FederatedProvider {
        &self.google_provider
    }

    pub fn firestore(&self) -> &FirestoreClient {
        &self.firestore
    }

    pub fn functions(&self) -> &FunctionsClient {
        &self.functions
    }

    /// XP operations on the `users` collection of this app's database.
    pub fn xp_service(&self) -> XpService {
        XpService::new(Arc::new(FirestoreProfileStore::new(self.firestore.clone())))
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod app_tests;
