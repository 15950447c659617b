//! # Cooking Log Aggregator
//!
//! Cook counts are projections over raw log records and are recomputed on
//! every call. Callers validate identifiers at the boundary; the aggregator
//! assumes they are non-empty.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use bank::CookingLog;
use chrono::Utc;
use tracing::info;

use crate::{
    error::{Entity, KitchenError},
    store::Store,
};

pub fn cook_count(logs: &[CookingLog], user_id: &str, recipe_id: &str) -> u32 {
    let count = logs
        .iter()
        .filter(|log| log.user_id == user_id && log.recipe_id == recipe_id)
        .count();

    u32::try_from(count).unwrap_or(u32::MAX)
}

pub fn user_cook_counts(logs: &[CookingLog], user_id: &str) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();

    for log in logs.iter().filter(|log| log.user_id == user_id) {
        *counts.entry(log.recipe_id.clone()).or_insert(0u32) += 1;
    }

    counts
}

/// Total cooks per recipe across every user.
pub fn recipe_popularity(logs: &[CookingLog]) -> HashMap<String, u32> {
    let mut popularity = HashMap::new();

    for log in logs {
        *popularity.entry(log.recipe_id.clone()).or_insert(0u32) += 1;
    }

    popularity
}

#[derive(Clone)]
pub struct CookingLogAggregator {
    store: Arc<dyn Store>,
}

impl CookingLogAggregator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn cook_count(&self, user_id: &str, recipe_id: &str) -> Result<u32, KitchenError> {
        debug_assert!(!user_id.is_empty() && !recipe_id.is_empty());

        let logs = self.store.cooking_logs(Some(user_id)).await?;

        Ok(cook_count(&logs, user_id, recipe_id))
    }

    pub async fn user_cook_counts(&self, user_id: &str) -> Result<BTreeMap<String, u32>, KitchenError> {
        debug_assert!(!user_id.is_empty());

        let logs = self.store.cooking_logs(Some(user_id)).await?;

        Ok(user_cook_counts(&logs, user_id))
    }

    pub async fn popularity(&self) -> Result<HashMap<String, u32>, KitchenError> {
        Ok(recipe_popularity(&self.store.cooking_logs(None).await?))
    }

    /// Appends a completed cook and returns the user's new count for the recipe.
    pub async fn record_cook(&self, user_id: &str, recipe_id: &str) -> Result<u32, KitchenError> {
        debug_assert!(!user_id.is_empty() && !recipe_id.is_empty());

        if self.store.recipe(recipe_id).await?.is_none() {
            return Err(KitchenError::not_found(Entity::Recipe, recipe_id));
        }

        self.store
            .append_cooking_log(CookingLog {
                user_id: user_id.to_string(),
                recipe_id: recipe_id.to_string(),
                cooked_at: Utc::now().timestamp_millis(),
            })
            .await?;

        info!("Recorded cook of {recipe_id} by {user_id}");

        self.cook_count(user_id, recipe_id).await
    }
}

#[cfg(test)]
mod tests {
    use bank::{Bank, Recipe};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::store::BankStore;

    fn log(user_id: &str, recipe_id: &str) -> CookingLog {
        CookingLog {
            user_id: user_id.to_string(),
            recipe_id: recipe_id.to_string(),
            cooked_at: 0,
        }
    }

    fn aggregator(logs: Vec<CookingLog>) -> CookingLogAggregator {
        CookingLogAggregator::new(Arc::new(BankStore::new(Bank {
            recipes: vec![Recipe {
                id: "r1".to_string(),
                ..Default::default()
            }],
            cooking_logs: logs,
            ..Default::default()
        })))
    }

    #[tokio::test]
    async fn test_user_cook_counts() {
        let aggregator = aggregator(vec![log("u1", "r1"), log("u1", "r1"), log("u1", "r2")]);

        let counts = aggregator.user_cook_counts("u1").await.unwrap();

        assert_eq!(
            counts,
            BTreeMap::from([("r1".to_string(), 2), ("r2".to_string(), 1)])
        );
    }

    #[tokio::test]
    async fn test_cook_count_ignores_other_users() {
        let aggregator = aggregator(vec![log("u1", "r1"), log("u2", "r1"), log("u2", "r1")]);

        assert_eq!(aggregator.cook_count("u1", "r1").await.unwrap(), 1);
        assert_eq!(aggregator.cook_count("u2", "r1").await.unwrap(), 2);
        assert_eq!(aggregator.cook_count("u3", "r1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_user_has_no_counts() {
        let aggregator = aggregator(vec![log("u1", "r1")]);

        assert!(aggregator.user_cook_counts("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_cook_is_visible_on_next_read() {
        let aggregator = aggregator(vec![log("u1", "r1")]);

        assert_eq!(aggregator.record_cook("u1", "r1").await.unwrap(), 2);
        assert_eq!(aggregator.popularity().await.unwrap().get("r1"), Some(&2));
    }

    #[tokio::test]
    async fn test_record_cook_of_missing_recipe() {
        let aggregator = aggregator(Vec::new());

        let error = aggregator.record_cook("u1", "ghost").await.unwrap_err();

        assert_eq!(error, KitchenError::not_found(Entity::Recipe, "ghost"));
        assert_eq!(aggregator.cook_count("u1", "ghost").await.unwrap(), 0);
    }
}
