//! # Recipe Search
//!
//! Runs a canonical [`SearchQuery`] over the recipes in the store.
//!
//! ## Matching
//! - Keyword: case-insensitive substring of title, ingredients or description
//! - Filters: options of one group are OR-ed, groups are AND-ed
//! - A filter id outside the taxonomy matches nothing
//!
//! ## Ordering
//! - `relevance`: title hit 3, ingredient hit 2, description hit 1, then newest
//! - `newest`: creation time, descending
//! - `popular`: total cook count across users, then newest
//!
//! Recipe id breaks any remaining tie so pages are stable.
//!
//! ## Paging
//! The cursor is an opaque offset token. A cursor that does not decode starts
//! over from the first page.

use std::{
    cmp::{Ordering, Reverse},
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use bank::Recipe;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    cooking::CookingLogAggregator,
    error::KitchenError,
    query::{SearchQuery, SortOrder},
    store::Store,
    taxonomy::{Taxonomy, TaxonomyIndex},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category_ids: Vec<String>,
    pub cook_minutes: u32,
    pub created_at: i64,
    /// Cooks logged by every user.
    pub cook_count: u32,
}

impl RecipeSummary {
    pub fn new(recipe: &Recipe, cook_count: u32) -> Self {
        Self {
            id: recipe.id.clone(),
            title: recipe.title.clone(),
            description: recipe.description.clone(),
            category_ids: recipe.category_ids.clone(),
            cook_minutes: recipe.cook_minutes,
            created_at: recipe.created_at,
            cook_count,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub recipes: Vec<RecipeSummary>,
    /// Matches across all pages.
    pub total: usize,
    pub next_cursor: Option<String>,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Facet<'a> {
    Group(&'a str),
    Unknown(&'a str),
}

fn facets<'a>(query: &'a SearchQuery, index: &'a TaxonomyIndex) -> BTreeMap<Facet<'a>, Vec<&'a str>> {
    let mut facets: BTreeMap<Facet<'a>, Vec<&'a str>> = BTreeMap::new();

    for id in &query.category_filters {
        let facet = match index.group_of(id) {
            Some(group) => Facet::Group(group),
            None => Facet::Unknown(id),
        };

        facets.entry(facet).or_default().push(id);
    }

    facets
}

fn relevance(recipe: &Recipe, keyword: &str) -> u32 {
    let hit = |text: &str| text.to_lowercase().contains(keyword);

    let mut score = 0;
    if hit(&recipe.title) {
        score += 3;
    }
    if recipe.ingredients.iter().any(|ingredient| hit(ingredient)) {
        score += 2;
    }
    if hit(&recipe.description) {
        score += 1;
    }

    score
}

fn decode_cursor(cursor: Option<&str>) -> usize {
    let Some(cursor) = cursor else {
        return 0;
    };

    usize::from_str_radix(cursor, 16).unwrap_or_else(|_| {
        debug!("Malformed cursor {cursor:?}, starting from the first page");
        0
    })
}

fn encode_cursor(offset: usize) -> String {
    format!("{offset:x}")
}

pub fn run_search(
    recipes: &[Recipe],
    index: &TaxonomyIndex,
    popularity: &HashMap<String, u32>,
    query: &SearchQuery,
    page_size: usize,
) -> SearchPage {
    let facets = facets(query, index);
    let cooks = |recipe: &Recipe| popularity.get(&recipe.id).copied().unwrap_or(0);

    let mut matches: Vec<(u32, &Recipe)> = recipes
        .iter()
        .filter(|recipe| {
            facets.values().all(|options| {
                options
                    .iter()
                    .any(|option| recipe.category_ids.iter().any(|id| id == option))
            })
        })
        .filter_map(|recipe| match &query.keyword {
            Some(keyword) => {
                let score = relevance(recipe, keyword);
                (score > 0).then_some((score, recipe))
            }
            None => Some((0, recipe)),
        })
        .collect();

    matches.sort_by(|&(score_a, a), &(score_b, b)| {
        let primary = match query.sort {
            SortOrder::Relevance => score_b.cmp(&score_a),
            SortOrder::Newest => Ordering::Equal,
            SortOrder::Popular => cooks(b).cmp(&cooks(a)),
        };

        primary
            .then_with(|| Reverse(a.created_at).cmp(&Reverse(b.created_at)))
            .then_with(|| a.id.cmp(&b.id))
    });

    let page_size = page_size.max(1);
    let total = matches.len();
    let offset = decode_cursor(query.cursor.as_deref()).min(total);
    let end = offset.saturating_add(page_size).min(total);

    SearchPage {
        recipes: matches[offset..end]
            .iter()
            .map(|&(_, recipe)| RecipeSummary::new(recipe, cooks(recipe)))
            .collect(),
        total,
        next_cursor: (end < total).then(|| encode_cursor(end)),
    }
}

#[derive(Clone)]
pub struct RecipeSearch {
    store: Arc<dyn Store>,
    taxonomy: Taxonomy,
    cooking: CookingLogAggregator,
    page_size: usize,
}

impl RecipeSearch {
    pub fn new(store: Arc<dyn Store>, page_size: usize) -> Self {
        Self {
            taxonomy: Taxonomy::new(store.clone()),
            cooking: CookingLogAggregator::new(store.clone()),
            store,
            page_size,
        }
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<SearchPage, KitchenError> {
        let (recipes, index, popularity) = tokio::try_join!(
            self.store.recipes(),
            self.taxonomy.index(),
            self.cooking.popularity(),
        )?;

        Ok(run_search(&recipes, &index, &popularity, query, self.page_size))
    }

    /// Favorited recipes, most recently favorited first. Favorites pointing at
    /// recipes that no longer exist are skipped.
    pub async fn favorites(&self, user_id: &str) -> Result<Vec<RecipeSummary>, KitchenError> {
        let (mut favorites, recipes, popularity) = tokio::try_join!(
            self.store.favorites(user_id),
            self.store.recipes(),
            self.cooking.popularity(),
        )?;

        favorites.sort_by_key(|favorite| Reverse(favorite.created_at));

        let by_id: HashMap<&str, &Recipe> = recipes.iter().map(|recipe| (recipe.id.as_str(), recipe)).collect();

        Ok(favorites
            .iter()
            .filter_map(|favorite| by_id.get(favorite.recipe_id.as_str()))
            .map(|recipe| RecipeSummary::new(recipe, popularity.get(&recipe.id).copied().unwrap_or(0)))
            .collect())
    }
}
