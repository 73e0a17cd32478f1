//! In-memory [`ContextStore`] backed by a `tokio` RwLock.
//!
//! The default store for tests and single-process deployments. Retention
//! mirrors the persistent backends: the 50 most recent briefs per user.

use async_trait::async_trait;
use chrono::Utc;
use rustc_hash::FxHashMap;
use tokio::sync::RwLock;

use super::{ContextStore, StoreError};
use crate::models::{ResearchBrief, UserHistory, UserStats};

/// Briefs kept per user before the oldest are evicted.
pub const MAX_BRIEFS_PER_USER: usize = 50;

#[derive(Debug, Default)]
pub struct InMemoryContextStore {
    histories: RwLock<FxHashMap<String, UserHistory>>,
}

impl InMemoryContextStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn get_user_history(&self, user_id: &str) -> Result<Option<UserHistory>, StoreError> {
        Ok(self.histories.read().await.get(user_id).cloned())
    }

    async fn save_brief(&self, user_id: &str, brief: &ResearchBrief) -> Result<(), StoreError> {
        let mut histories = self.histories.write().await;
        let now = Utc::now();
        let history = histories
            .entry(user_id.to_string())
            .or_insert_with(|| UserHistory {
                user_id: user_id.to_string(),
                briefs: Vec::new(),
                created_at: now,
                updated_at: now,
            });
        history.briefs.push(brief.clone());
        if history.briefs.len() > MAX_BRIEFS_PER_USER {
            let excess = history.briefs.len() - MAX_BRIEFS_PER_USER;
            history.briefs.drain(..excess);
        }
        history.updated_at = now;
        Ok(())
    }

    async fn get_user_stats(&self, user_id: &str) -> Result<UserStats, StoreError> {
        let histories = self.histories.read().await;
        let Some(history) = histories.get(user_id) else {
            return Ok(UserStats::default());
        };
        let total_briefs = history.briefs.len();
        if total_briefs == 0 {
            return Ok(UserStats::default());
        }
        let total_time: f64 = history
            .briefs
            .iter()
            .map(|b| b.processing_time_seconds)
            .sum();
        let total_tokens: u64 = history
            .briefs
            .iter()
            .map(|b| b.token_usage.values().sum::<u64>())
            .sum();
        Ok(UserStats {
            total_briefs,
            avg_processing_time_seconds: total_time / total_briefs as f64,
            total_tokens,
        })
    }
}
