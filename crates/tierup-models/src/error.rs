//! Model validation errors.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Tier table must contain at least one tier")]
    EmptyTierTable,

    #[error("Tier table is not sorted: '{current}' (xp_from {current_from}) follows '{previous}' (xp_from {previous_from})")]
    UnsortedTierTable {
        previous: String,
        previous_from: i64,
        current: String,
        current_from: i64,
    },

    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}
