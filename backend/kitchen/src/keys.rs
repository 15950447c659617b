//! Cache keys shared by the server routes and the client, so a snapshot taken
//! on one side lines up with the lookups made on the other.
//!
//! Search keys come from [`crate::query::SearchQuery::to_key`] and all start
//! with [`SEARCH_PREFIX`].

use crate::taxonomy::CategoryKind;

pub const CATEGORY_GROUPS: &str = "category-groups";

pub const SEARCH_PREFIX: &str = "search";

pub fn category_options(kind: Option<CategoryKind>) -> String {
    format!("category-options:{}", kind.map_or("all", CategoryKind::as_str))
}

pub fn recipe(id: &str) -> String {
    format!("recipe:{id}")
}

pub fn profile(id: &str) -> String {
    format!("profile:{id}")
}

pub fn favorites(user_id: &str) -> String {
    format!("favorites:{user_id}")
}
