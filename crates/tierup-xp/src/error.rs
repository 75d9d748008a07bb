//! XP store error types.

use thiserror::Error;
use tierup_firestore::FirestoreError;

pub type XpResult<T> = Result<T, XpError>;

#[derive(Debug, Error)]
pub enum XpError {
    #[error("Firestore error: {0}")]
    Firestore(#[from] FirestoreError),

    #[error("Request failed ({status}): {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Invalid profile record for {user_id}: {reason}")]
    InvalidRecord { user_id: String, reason: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl XpError {
    pub fn invalid_record(user_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            user_id: user_id.into(),
            reason: reason.into(),
        }
    }
}
