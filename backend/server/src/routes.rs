use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Json,
    body::Bytes,
    extract::{self, Path, Query, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
};
use bank::{Profile, Recipe};
use kitchen::{
    CacheSnapshot, CategoryGroup, CategoryKind, CategoryOption, Entity, KitchenError, RawSearchQuery, RecipeSummary,
    SearchPage, canonicalize, keys,
};
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::{AppError, During, Operation},
    state::State,
    utils::{current_user, require},
};

type AppState = extract::State<Arc<State>>;

/// Query string that failed to parse answers with the error envelope too.
type Params<T> = Result<Query<T>, QueryRejection>;

fn parsed<T>(extracted: Params<T>) -> Result<T, AppError> {
    extracted
        .map(|Query(params)| params)
        .map_err(|rejection| AppError::MalformedPayload(rejection.body_text()))
}

#[derive(Deserialize)]
pub struct OptionsParams {
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Query of the cook count routes and body of `POST /cook-logs`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookParams {
    user_id: Option<String>,
    recipe_id: Option<String>,
}

pub async fn category_groups_handler(
    extract::State(state): AppState,
) -> Result<Json<Vec<CategoryGroup>>, AppError> {
    let groups = state.category_groups().await.during(Operation::CategoryGroups)?;

    Ok(Json(groups))
}

pub async fn category_options_handler(
    extract::State(state): AppState,
    params: Params<OptionsParams>,
) -> Result<Json<Vec<CategoryOption>>, AppError> {
    let params = parsed(params)?;

    let kind = match params.kind.as_deref().map(str::trim).filter(|kind| !kind.is_empty()) {
        None => None,
        Some(raw) => match raw.parse::<CategoryKind>() {
            Ok(kind) => Some(kind),
            Err(_) => {
                debug!("Unknown option type {raw:?}, answering with no options");
                return Ok(Json(Vec::new()));
            }
        },
    };

    let options = state.category_options(kind).await.during(Operation::CategoryOptions)?;

    Ok(Json(options))
}

pub async fn cook_count_handler(
    extract::State(state): AppState,
    params: Params<CookParams>,
) -> Result<Json<u32>, AppError> {
    let params = parsed(params)?;
    let user_id = require("userId", params.user_id).during(Operation::CookCount)?;
    let recipe_id = require("recipeId", params.recipe_id).during(Operation::CookCount)?;

    let count = state
        .cooking
        .cook_count(&user_id, &recipe_id)
        .await
        .during(Operation::CookCount)?;

    Ok(Json(count))
}

pub async fn user_cook_counts_handler(
    extract::State(state): AppState,
    params: Params<CookParams>,
) -> Result<Json<BTreeMap<String, u32>>, AppError> {
    let params = parsed(params)?;
    let user_id = require("userId", params.user_id).during(Operation::UserCookCounts)?;

    let counts = state
        .cooking
        .user_cook_counts(&user_id)
        .await
        .during(Operation::UserCookCounts)?;

    Ok(Json(counts))
}

pub async fn recipe_handler(extract::State(state): AppState, Path(id): Path<String>) -> Result<Json<Recipe>, AppError> {
    let recipe = state.recipe(&id).await.during(Operation::Recipe)?;

    Ok(Json(recipe))
}

pub async fn random_recipe_handler(extract::State(state): AppState) -> Result<Json<Recipe>, AppError> {
    let recipe = state
        .store
        .random_recipe()
        .await
        .and_then(|recipe| recipe.ok_or_else(|| KitchenError::not_found(Entity::Recipe, "random")))
        .during(Operation::RandomRecipe)?;

    Ok(Json(recipe))
}

pub async fn profile_handler(extract::State(state): AppState, Path(id): Path<String>) -> Result<Json<Profile>, AppError> {
    let profile = state.profile(&id).await.during(Operation::Profile)?;

    Ok(Json(profile))
}

pub async fn my_profile_handler(extract::State(state): AppState, headers: HeaderMap) -> Result<Json<Profile>, AppError> {
    let user_id = current_user(&headers)
        .ok_or_else(|| KitchenError::not_found(Entity::Profile, "me"))
        .during(Operation::Profile)?;

    let profile = state.profile(&user_id).await.during(Operation::Profile)?;

    Ok(Json(profile))
}

pub async fn search_handler(
    extract::State(state): AppState,
    raw: Params<RawSearchQuery>,
) -> Result<Json<SearchPage>, AppError> {
    let raw = parsed(raw)?;
    let page = state.search(&canonicalize(&raw)).await.during(Operation::Search)?;

    Ok(Json(page))
}

pub async fn favorites_handler(
    extract::State(state): AppState,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<RecipeSummary>>, AppError> {
    let favorites = state.favorites(&user_id).await.during(Operation::Favorites)?;

    Ok(Json(favorites))
}

pub async fn cook_log_handler(extract::State(state): AppState, body: Bytes) -> Result<(StatusCode, Json<u32>), AppError> {
    let request: CookParams =
        serde_json::from_slice(&body).map_err(|e| AppError::MalformedPayload(e.to_string()))?;

    let user_id = require("userId", request.user_id).during(Operation::RecordCook)?;
    let recipe_id = require("recipeId", request.recipe_id).during(Operation::RecordCook)?;

    let count = state
        .record_cook(&user_id, &recipe_id)
        .await
        .during(Operation::RecordCook)?;

    Ok((StatusCode::CREATED, Json(count)))
}

/// Snapshot of everything the search results page needs, for the client to
/// restore before its first render. Entries keep the fetch time they have in
/// the shared cache, so data that is already stale restores as stale.
pub async fn prefetch_search_handler(
    extract::State(state): AppState,
    raw: Params<RawSearchQuery>,
) -> Result<Json<CacheSnapshot>, AppError> {
    let query = canonicalize(&parsed(raw)?);

    state.category_groups().await.during(Operation::Prefetch)?;
    state.search(&query).await.during(Operation::Prefetch)?;

    let search_key = query.to_key();
    let snapshot = state
        .cache
        .snapshot_keys(&[keys::CATEGORY_GROUPS, search_key.as_str()])
        .await;

    Ok(Json(snapshot))
}
