//! Experience point awards for tierup.
//!
//! [`XpService`] reads a user's score map from a [`ProfileStore`], adds to one
//! category and writes the map back. Stores are provided for Firestore, a
//! PostgREST endpoint and in-process memory.

pub mod error;
pub mod firestore;
pub mod memory;
pub mod postgrest;
pub mod service;
pub mod store;

pub use error::{XpError, XpResult};
pub use firestore::{FirestoreProfileStore, USERS_COLLECTION};
pub use memory::MemoryProfileStore;
pub use postgrest::{PostgrestClient, PostgrestConfig, PostgrestProfileStore, PROFILES_TABLE};
pub use service::{TierStatus, XpService, XP_AWARDED_TOTAL, XP_DEDUCTED_TOTAL};
pub use store::{ProfileStore, XP_FIELD};
