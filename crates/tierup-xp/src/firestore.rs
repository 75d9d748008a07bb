//! Firestore-backed profile store.
//!
//! Profiles live at `users/{user_id}`; the score map is the `xp` map field.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use tierup_firestore::{Document, FirestoreClient, FromFirestoreValue, ToFirestoreValue, Value};
use tierup_models::{Category, XpScores};

use crate::error::{XpError, XpResult};
use crate::store::{ProfileStore, XP_FIELD};

/// Default collection holding user profiles.
pub const USERS_COLLECTION: &str = "users";

/// Profile store over a [`FirestoreClient`].
///
/// Writes are masked merges of the `xp` field, so a missing profile
/// document is created on first write.
#[derive(Clone)]
pub struct FirestoreProfileStore {
    client: FirestoreClient,
    collection: String,
}

impl FirestoreProfileStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self::with_collection(client, USERS_COLLECTION)
    }

    pub fn with_collection(client: FirestoreClient, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }
}

/// Decode the `xp` field of a profile document.
///
/// Missing field or null → `None`. Missing or null entries read as 0.
/// Anything that is not a map of integers is rejected.
pub fn decode_xp(user_id: &str, doc: &Document) -> XpResult<Option<XpScores>> {
    let value = match doc.field(XP_FIELD) {
        None | Some(Value::NullValue(_)) => return Ok(None),
        Some(v) => v,
    };

    let map = value.as_map().ok_or_else(|| {
        XpError::invalid_record(user_id, format!("xp is a {}, expected a map", value.kind()))
    })?;

    let mut scores = XpScores::default();
    for category in Category::ALL {
        match map.get(category.as_str()) {
            None | Some(Value::NullValue(_)) => {}
            Some(v) => {
                let score = i64::from_firestore_value(v).ok_or_else(|| {
                    XpError::invalid_record(
                        user_id,
                        format!("xp.{} is a {}, expected an integer", category, v.kind()),
                    )
                })?;
                scores.set(category, score);
            }
        }
    }

    Ok(Some(scores))
}

/// Encode a score map as the Firestore `xp` field value.
pub fn encode_xp(scores: &XpScores) -> Value {
    let entries: HashMap<String, i64> = scores
        .entries()
        .map(|(category, score)| (category.as_str().to_string(), score))
        .collect();
    entries.to_firestore_value()
}

#[async_trait]
impl ProfileStore for FirestoreProfileStore {
    async fn fetch_xp(&self, user_id: &str) -> XpResult<Option<XpScores>> {
        let doc = self.client.get_document(&self.collection, user_id).await?;
        match doc {
            Some(doc) => decode_xp(user_id, &doc),
            None => {
                debug!(user_id = %user_id, "Profile document not found");
                Ok(None)
            }
        }
    }

    async fn write_xp(&self, user_id: &str, scores: &XpScores) -> XpResult<()> {
        let mut fields = HashMap::new();
        fields.insert(XP_FIELD.to_string(), encode_xp(scores));

        self.client
            .update_document(
                &self.collection,
                user_id,
                fields,
                Some(vec![XP_FIELD.to_string()]),
            )
            .await?;
        Ok(())
    }
}
