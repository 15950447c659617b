//! Protobuf records stored in the bank file.
//!
//! The same structs double as the JSON shape served to clients and read from
//! seed files, so every record also derives serde with camelCase field names.

use prost::Message;
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Recipe {
    #[prost(string, tag = "1")]
    pub id: String,

    #[prost(string, tag = "2")]
    pub title: String,

    #[prost(string, tag = "3")]
    pub description: String,

    #[prost(string, tag = "4")]
    pub author_id: String,

    /// Category option ids, see [`CategoryOptionRecord::id`].
    #[prost(string, repeated, tag = "5")]
    pub category_ids: Vec<String>,

    #[prost(string, repeated, tag = "6")]
    pub ingredients: Vec<String>,

    #[prost(string, repeated, tag = "7")]
    pub steps: Vec<String>,

    #[prost(uint32, tag = "8")]
    pub cook_minutes: u32,

    /// Unix milliseconds.
    #[prost(int64, tag = "9")]
    pub created_at: i64,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryOptionRecord {
    #[prost(string, tag = "1")]
    pub id: String,

    #[prost(string, tag = "2")]
    pub label: String,

    /// Raw category kind such as `cuisine` or `meal-time`. Left unvalidated
    /// here, the taxonomy service rejects unknown kinds.
    #[prost(string, tag = "3")]
    pub kind: String,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryGroupRecord {
    #[prost(string, tag = "1")]
    pub id: String,

    #[prost(string, tag = "2")]
    pub label: String,

    #[prost(message, repeated, tag = "3")]
    pub options: Vec<CategoryOptionRecord>,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CookingLog {
    #[prost(string, tag = "1")]
    pub user_id: String,

    #[prost(string, tag = "2")]
    pub recipe_id: String,

    #[prost(int64, tag = "3")]
    pub cooked_at: i64,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    #[prost(string, tag = "1")]
    pub id: String,

    #[prost(string, tag = "2")]
    pub nickname: String,

    #[prost(string, tag = "3")]
    pub bio: String,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Favorite {
    #[prost(string, tag = "1")]
    pub user_id: String,

    #[prost(string, tag = "2")]
    pub recipe_id: String,

    #[prost(int64, tag = "3")]
    pub created_at: i64,
}

/// Everything the store serves, in one message.
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Bank {
    #[prost(message, repeated, tag = "1")]
    pub recipes: Vec<Recipe>,

    /// Display order of groups is the order of this list.
    #[prost(message, repeated, tag = "2")]
    pub category_groups: Vec<CategoryGroupRecord>,

    #[prost(message, repeated, tag = "3")]
    pub cooking_logs: Vec<CookingLog>,

    #[prost(message, repeated, tag = "4")]
    pub profiles: Vec<Profile>,

    #[prost(message, repeated, tag = "5")]
    pub favorites: Vec<Favorite>,
}
