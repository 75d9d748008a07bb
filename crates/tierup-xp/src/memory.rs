//! In-process profile store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tierup_models::XpScores;

use crate::error::XpResult;
use crate::store::ProfileStore;

/// Profile store held in memory. Useful for tests and local tooling.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<String, XpScores>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a profile.
    pub async fn insert(&self, user_id: impl Into<String>, scores: XpScores) {
        self.profiles.write().await.insert(user_id.into(), scores);
    }

    pub async fn get(&self, user_id: &str) -> Option<XpScores> {
        self.profiles.read().await.get(user_id).copied()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn fetch_xp(&self, user_id: &str) -> XpResult<Option<XpScores>> {
        Ok(self.get(user_id).await)
    }

    async fn write_xp(&self, user_id: &str, scores: &XpScores) -> XpResult<()> {
        self.insert(user_id, *scores).await;
        Ok(())
    }
}
