//! Error types for the application context.

use thiserror::Error;
use tierup_firestore::FirestoreError;

pub type AuthResult<T> = Result<T, AuthError>;
pub type FunctionsResult<T> = Result<T, FunctionsError>;
pub type FirebaseResult<T> = Result<T, FirebaseError>;

/// Authentication failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No user is signed in")]
    NotSignedIn,

    /// The Identity Toolkit rejected the call, e.g. `INVALID_IDP_RESPONSE`.
    #[error("Auth request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid auth response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuthError {
    /// Error code reported by the backend, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            AuthError::Rejected { message, .. } => {
                Some(message.split([' ', ':']).next().unwrap_or(message))
            }
            _ => None,
        }
    }
}

/// Callable function failures.
#[derive(Debug, Error)]
pub enum FunctionsError {
    /// Error envelope returned by the function, e.g. `INVALID_ARGUMENT`.
    #[error("Function error {status}: {message}")]
    Function { status: String, message: String },

    #[error("HTTP error ({status}): {body}")]
    Http { status: u16, body: String },

    #[error("Invalid function response: {0}")]
    InvalidResponse(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Initialization and top-level failures.
#[derive(Debug, Error)]
pub enum FirebaseError {
    #[error("Firestore error: {0}")]
    Firestore(#[from] FirestoreError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Functions error: {0}")]
    Functions(#[from] FunctionsError),

    #[error("Logging error: {0}")]
    Logging(String),
}
