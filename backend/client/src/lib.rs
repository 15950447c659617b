//! # Client
//!
//! UI-shell half of the hydration bridge. Reads go through a local
//! [`ResultCache`] keyed exactly like the server's, so a snapshot from
//! `GET /prefetch/search` restored with [`Client::hydrate`] answers the first
//! render without touching the network.
//!
//! ## Notes
//! - [`Client::search`] follows the latest query only. A page that arrives
//!   after the UI moved on is dropped and `None` is returned.
//! - Cook counts are never cached, they change with every completed cook.
//! - Error envelopes are read back into [`KitchenError`] by status code.
use std::{collections::BTreeMap, future::Future, sync::Arc};

use bank::{Profile, Recipe};
use kitchen::{
    CacheConfig, CacheSnapshot, CategoryGroup, CategoryKind, CategoryOption, Entity, KitchenError, LatestKey, Region,
    RecipeSummary, ResultCache, SearchPage, SearchQuery, keys, region_async,
};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, info};

#[derive(Deserialize)]
struct Envelope {
    error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CookLogRequest<'a> {
    user_id: &'a str,
    recipe_id: &'a str,
}

/// Detail page: the recipe always, the rest only if it loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipePage {
    pub recipe: Recipe,
    pub author: Region<Profile>,
    pub cook_count: Region<u32>,
}

#[derive(Clone)]
pub struct Client {
    base_url: String,
    http: reqwest::Client,
    cache: ResultCache,
    latest: Arc<LatestKey>,
}

fn params(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{name}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

async fn read<T: DeserializeOwned + Send + 'static>(
    sent: Result<Response, reqwest::Error>,
    subject: Option<(Entity, String)>,
) -> Result<T, KitchenError> {
    let response = sent.map_err(KitchenError::upstream)?;
    let status = response.status();

    if status.is_success() {
        return response.json().await.map_err(KitchenError::upstream);
    }

    let message = match response.json::<Envelope>().await {
        Ok(envelope) => envelope.error,
        Err(_) => status.to_string(),
    };

    Err(match (status, subject) {
        (StatusCode::BAD_REQUEST, _) => KitchenError::Validation(message),
        (StatusCode::NOT_FOUND, Some((entity, id))) => KitchenError::not_found(entity, id),
        _ => KitchenError::Upstream(message),
    })
}

impl Client {
    pub fn new(base_url: impl Into<String>, config: CacheConfig) -> Self {
        Self::with_cache(base_url, ResultCache::new(config))
    }

    pub fn with_cache(base_url: impl Into<String>, cache: ResultCache) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            cache,
            latest: Arc::new(LatestKey::new()),
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Seeds the local cache from a server snapshot.
    pub async fn hydrate(&self, snapshot: CacheSnapshot) -> usize {
        let restored = self.cache.restore(snapshot).await;
        info!("Hydrated {restored} cache entries");

        restored
    }

    /// Fetches the snapshot for `query`'s results page and hydrates from it.
    pub async fn prefetch(&self, query: &SearchQuery) -> Result<usize, KitchenError> {
        let url = format!("{}/prefetch/search?{}", self.base_url, query.to_query_string());
        let snapshot: CacheSnapshot = self.get_json(url, None).await?;

        Ok(self.hydrate(snapshot).await)
    }

    fn get_json<T: DeserializeOwned + Send + 'static>(
        &self,
        url: String,
        subject: Option<(Entity, String)>,
    ) -> impl Future<Output = Result<T, KitchenError>> + Send + 'static {
        let http = self.http.clone();

        async move {
            debug!("GET {url}");
            read(http.get(&url).send().await, subject).await
        }
    }

    pub async fn category_groups(&self) -> Result<Vec<CategoryGroup>, KitchenError> {
        let fetch = self.get_json(format!("{}/categories/groups", self.base_url), None);

        self.cache.get(keys::CATEGORY_GROUPS, move || fetch).await
    }

    pub async fn category_options(&self, kind: Option<CategoryKind>) -> Result<Vec<CategoryOption>, KitchenError> {
        let url = match kind {
            Some(kind) => format!("{}/categories/options?{}", self.base_url, params(&[("type", kind.as_str())])),
            None => format!("{}/categories/options", self.base_url),
        };
        let fetch = self.get_json(url, None);

        self.cache.get(&keys::category_options(kind), move || fetch).await
    }

    /// `None` when another search started before this one finished.
    pub async fn search(&self, query: &SearchQuery) -> Result<Option<SearchPage>, KitchenError> {
        let fetch = self.get_json(format!("{}/search?{}", self.base_url, query.to_query_string()), None);

        self.cache.get_latest(&self.latest, &query.to_key(), move || fetch).await
    }

    pub async fn favorites(&self, user_id: &str) -> Result<Vec<RecipeSummary>, KitchenError> {
        let url = format!("{}/users/{}/favorites", self.base_url, urlencoding::encode(user_id));
        let fetch = self.get_json(url, None);

        self.cache.get(&keys::favorites(user_id), move || fetch).await
    }

    /// `None` when the recipe does not exist.
    pub async fn recipe(&self, id: &str) -> Result<Option<Recipe>, KitchenError> {
        let url = format!("{}/recipes/{}", self.base_url, urlencoding::encode(id));
        let fetch = self.get_json(url, Some((Entity::Recipe, id.to_string())));

        match self.cache.get(&keys::recipe(id), move || fetch).await {
            Ok(recipe) => Ok(Some(recipe)),
            Err(KitchenError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn profile(&self, id: &str) -> Result<Profile, KitchenError> {
        let url = format!("{}/profiles/{}", self.base_url, urlencoding::encode(id));
        let fetch = self.get_json(url, Some((Entity::Profile, id.to_string())));

        self.cache.get(&keys::profile(id), move || fetch).await
    }

    pub async fn random_recipe(&self) -> Result<Recipe, KitchenError> {
        self.get_json(
            format!("{}/recipes/random", self.base_url),
            Some((Entity::Recipe, "random".to_string())),
        )
        .await
    }

    pub async fn cook_count(&self, user_id: &str, recipe_id: &str) -> Result<u32, KitchenError> {
        let query = params(&[("userId", user_id), ("recipeId", recipe_id)]);

        self.get_json(format!("{}/cook-count?{query}", self.base_url), None)
            .await
    }

    pub async fn user_cook_counts(&self, user_id: &str) -> Result<BTreeMap<String, u32>, KitchenError> {
        let query = params(&[("userId", user_id)]);

        self.get_json(format!("{}/cook-counts?{query}", self.base_url), None)
            .await
    }

    /// Logs a completed cook and returns the new count. Cached searches and
    /// favorite lists are marked stale since their cook counts moved.
    pub async fn complete_cook(&self, user_id: &str, recipe_id: &str) -> Result<u32, KitchenError> {
        let sent = self
            .http
            .post(format!("{}/cook-logs", self.base_url))
            .json(&CookLogRequest { user_id, recipe_id })
            .send()
            .await;

        let count = read(sent, Some((Entity::Recipe, recipe_id.to_string()))).await?;

        self.cache.invalidate_prefix(keys::SEARCH_PREFIX).await;
        self.cache.invalidate_prefix(&keys::favorites("")).await;

        Ok(count)
    }

    /// Recipe with its author and the user's cook count loaded side by side.
    /// A failed author or count leaves the rest of the page intact.
    pub async fn recipe_page(&self, id: &str, user_id: &str) -> Result<Option<RecipePage>, KitchenError> {
        let Some(recipe) = self.recipe(id).await? else {
            return Ok(None);
        };

        let (author, cook_count) = tokio::join!(
            region_async("author", self.profile(&recipe.author_id)),
            region_async("cook-count", self.cook_count(user_id, id)),
        );

        Ok(Some(RecipePage {
            recipe,
            author,
            cook_count,
        }))
    }
}
