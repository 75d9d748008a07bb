//! Firebase application context for tierup.
//!
//! This crate provides:
//! - Credentials and runtime settings from the environment
//! - `FirebaseApp`, owning the auth, Firestore and functions handles
//! - Identity Toolkit sign-in (federated and anonymous) with token refresh
//! - Callable function invocation
//! - Process logging setup

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod functions;
pub mod logging;

pub use app::FirebaseApp;
pub use auth::{AuthClient, AuthEndpoints, AuthSession, AuthUser, FederatedProvider, IdpCredential};
pub use config::{AppSettings, FirebaseOptions};
pub use error::{AuthError, FirebaseError, FirebaseResult, FunctionsError};
pub use functions::FunctionsClient;
pub use logging::{init_tracing, set_firestore_log_level};
