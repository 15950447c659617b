use std::sync::Arc;

use anyhow::Error;
use bank::{Profile, Recipe, get_bank, get_remote_bank};
use kitchen::{
    BankStore, CategoryGroup, CategoryKind, CategoryOption, CookingLogAggregator, Entity, KitchenError, RecipeSearch,
    RecipeSummary, ResultCache, SearchPage, SearchQuery, Store, Taxonomy, keys,
};
use tracing::info;

use super::config::Config;

pub struct State {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub taxonomy: Taxonomy,
    pub cooking: CookingLogAggregator,
    pub recipes: RecipeSearch,
    pub cache: ResultCache,
}

impl State {
    pub async fn new(config: Config) -> Result<Arc<Self>, Error> {
        let bank = match &config.bank_url {
            Some(url) => {
                info!("Fetching bank from {url}");
                get_remote_bank(url).await?
            }
            None => {
                info!("Loading bank from {}", config.bank_path);
                get_bank(&config.bank_path)?
            }
        };

        info!(
            "Loaded {} recipes, {} category groups, {} cooking logs",
            bank.recipes.len(),
            bank.category_groups.len(),
            bank.cooking_logs.len()
        );

        Ok(Self::with_store(config, Arc::new(BankStore::new(bank))))
    }

    pub fn with_store(config: Config, store: Arc<dyn Store>) -> Arc<Self> {
        Arc::new(Self {
            taxonomy: Taxonomy::new(store.clone()),
            cooking: CookingLogAggregator::new(store.clone()),
            recipes: RecipeSearch::new(store.clone(), config.page_size),
            cache: ResultCache::new(config.cache()),
            store,
            config,
        })
    }

    pub async fn category_groups(&self) -> Result<Vec<CategoryGroup>, KitchenError> {
        let taxonomy = self.taxonomy.clone();

        self.cache
            .get(keys::CATEGORY_GROUPS, move || async move { taxonomy.groups().await })
            .await
    }

    pub async fn category_options(&self, kind: Option<CategoryKind>) -> Result<Vec<CategoryOption>, KitchenError> {
        let taxonomy = self.taxonomy.clone();

        self.cache
            .get(&keys::category_options(kind), move || async move {
                taxonomy.options(kind).await
            })
            .await
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<SearchPage, KitchenError> {
        let recipes = self.recipes.clone();
        let owned = query.clone();

        self.cache
            .get(&query.to_key(), move || async move { recipes.search(&owned).await })
            .await
    }

    pub async fn favorites(&self, user_id: &str) -> Result<Vec<RecipeSummary>, KitchenError> {
        let recipes = self.recipes.clone();
        let owned = user_id.to_string();

        self.cache
            .get(&keys::favorites(user_id), move || async move {
                recipes.favorites(&owned).await
            })
            .await
    }

    pub async fn recipe(&self, id: &str) -> Result<Recipe, KitchenError> {
        let store = self.store.clone();
        let owned = id.to_string();

        self.cache
            .get(&keys::recipe(id), move || async move {
                store
                    .recipe(&owned)
                    .await?
                    .ok_or_else(|| KitchenError::not_found(Entity::Recipe, owned))
            })
            .await
    }

    pub async fn profile(&self, id: &str) -> Result<Profile, KitchenError> {
        let store = self.store.clone();
        let owned = id.to_string();

        self.cache
            .get(&keys::profile(id), move || async move {
                store
                    .profile(&owned)
                    .await?
                    .ok_or_else(|| KitchenError::not_found(Entity::Profile, owned))
            })
            .await
    }

    /// Records a cook and marks every cached list whose cook counts it changes.
    pub async fn record_cook(&self, user_id: &str, recipe_id: &str) -> Result<u32, KitchenError> {
        let count = self.cooking.record_cook(user_id, recipe_id).await?;

        let searches = self.cache.invalidate_prefix(keys::SEARCH_PREFIX).await;
        let favorites = self.cache.invalidate_prefix(&keys::favorites("")).await;
        info!("Invalidated {searches} searches and {favorites} favorite lists after cook of {recipe_id}");

        Ok(count)
    }
}
