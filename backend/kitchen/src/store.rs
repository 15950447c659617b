//! # Store
//!
//! Opaque data-access boundary. Everything above this trait treats the
//! backing store as a set of async reads plus one append for cooking logs.
//!
//! [`BankStore`] serves a [`Bank`] loaded in memory. Any failure crossing
//! this boundary is reported as [`KitchenError::Upstream`].

use async_trait::async_trait;
use bank::{Bank, CategoryGroupRecord, CookingLog, Favorite, Profile, Recipe};
use rand::seq::IndexedRandom;
use tokio::sync::RwLock;

use crate::error::KitchenError;

#[async_trait]
pub trait Store: Send + Sync {
    async fn category_groups(&self) -> Result<Vec<CategoryGroupRecord>, KitchenError>;

    async fn recipes(&self) -> Result<Vec<Recipe>, KitchenError>;

    async fn recipe(&self, id: &str) -> Result<Option<Recipe>, KitchenError>;

    async fn random_recipe(&self) -> Result<Option<Recipe>, KitchenError>;

    /// Logs of one user, or of everyone when `user_id` is `None`.
    async fn cooking_logs(&self, user_id: Option<&str>) -> Result<Vec<CookingLog>, KitchenError>;

    async fn append_cooking_log(&self, log: CookingLog) -> Result<(), KitchenError>;

    async fn profile(&self, id: &str) -> Result<Option<Profile>, KitchenError>;

    async fn favorites(&self, user_id: &str) -> Result<Vec<Favorite>, KitchenError>;
}

pub struct BankStore {
    bank: RwLock<Bank>,
}

impl BankStore {
    pub fn new(bank: Bank) -> Self {
        Self {
            bank: RwLock::new(bank),
        }
    }
}

#[async_trait]
impl Store for BankStore {
    async fn category_groups(&self) -> Result<Vec<CategoryGroupRecord>, KitchenError> {
        Ok(self.bank.read().await.category_groups.clone())
    }

    async fn recipes(&self) -> Result<Vec<Recipe>, KitchenError> {
        Ok(self.bank.read().await.recipes.clone())
    }

    async fn recipe(&self, id: &str) -> Result<Option<Recipe>, KitchenError> {
        let bank = self.bank.read().await;

        Ok(bank.recipes.iter().find(|recipe| recipe.id == id).cloned())
    }

    async fn random_recipe(&self) -> Result<Option<Recipe>, KitchenError> {
        let bank = self.bank.read().await;

        Ok(bank.recipes.choose(&mut rand::rng()).cloned())
    }

    async fn cooking_logs(&self, user_id: Option<&str>) -> Result<Vec<CookingLog>, KitchenError> {
        let bank = self.bank.read().await;

        Ok(bank
            .cooking_logs
            .iter()
            .filter(|log| user_id.is_none_or(|user_id| log.user_id == user_id))
            .cloned()
            .collect())
    }

    async fn append_cooking_log(&self, log: CookingLog) -> Result<(), KitchenError> {
        self.bank.write().await.cooking_logs.push(log);

        Ok(())
    }

    async fn profile(&self, id: &str) -> Result<Option<Profile>, KitchenError> {
        let bank = self.bank.read().await;

        Ok(bank.profiles.iter().find(|profile| profile.id == id).cloned())
    }

    async fn favorites(&self, user_id: &str) -> Result<Vec<Favorite>, KitchenError> {
        let bank = self.bank.read().await;

        Ok(bank
            .favorites
            .iter()
            .filter(|favorite| favorite.user_id == user_id)
            .cloned()
            .collect())
    }
}
