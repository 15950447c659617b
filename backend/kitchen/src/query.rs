//! # Search Query Model
//!
//! Keyword, category filters, sort and cursor as one value type. The
//! canonical form is what the result cache is keyed on and what the
//! navigation store records, so two queries that mean the same thing must
//! canonicalize to the same value.
//!
//! ## Canonical form
//! - Keyword trimmed, lower-cased, inner whitespace collapsed, empty is `None`
//! - Filter ids trimmed, empties dropped, sorted and deduplicated
//! - Unknown or missing sort falls back to [`SortOrder::Relevance`]
//! - Cursor trimmed, empty is `None`
//!
//! ## Addresses
//! Queries are written into list addresses as
//! `/search/results?kw=kimchi&cat=korean,dinner&sort=newest&cursor=14`.
//! Option ids are slugs, so joining them with commas is unambiguous.

use std::{
    collections::BTreeSet,
    fmt::{self, Display},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::keys::SEARCH_PREFIX;

pub const SEARCH_PATH: &str = "/search/results";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Relevance,
    Newest,
    Popular,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Relevance => "relevance",
            SortOrder::Newest => "newest",
            SortOrder::Popular => "popular",
        }
    }

    /// Malformed addresses still have to render a list, so anything that is
    /// not a known sort becomes [`SortOrder::Relevance`].
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return SortOrder::default();
        };

        raw.parse().unwrap_or_else(|_| {
            debug!("Unknown sort {raw:?}, using relevance");
            SortOrder::default()
        })
    }
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "relevance" => Ok(SortOrder::Relevance),
            "newest" => Ok(SortOrder::Newest),
            "popular" => Ok(SortOrder::Popular),
            _ => Err(()),
        }
    }
}

/// Query as it arrives from an address or request, before canonicalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSearchQuery {
    pub kw: Option<String>,
    /// Comma separated option ids.
    pub cat: Option<String>,
    pub sort: Option<String>,
    pub cursor: Option<String>,
}

impl RawSearchQuery {
    /// Parses `kw=..&cat=..` with or without a leading `?`. Unknown
    /// parameters and undecodable values are skipped.
    pub fn from_query_string(query: &str) -> Self {
        let mut raw = Self::default();

        for pair in query.trim_start_matches('?').split('&').filter(|pair| !pair.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));

            let value = match urlencoding::decode(&value.replace('+', " ")) {
                Ok(value) => value.into_owned(),
                Err(e) => {
                    debug!("Skipping undecodable {name} parameter: {e}");
                    continue;
                }
            };

            match name {
                "kw" => raw.kw = Some(value),
                "cat" => raw.cat = Some(value),
                "sort" => raw.sort = Some(value),
                "cursor" => raw.cursor = Some(value),
                _ => {}
            }
        }

        raw
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub keyword: Option<String>,
    pub category_filters: BTreeSet<String>,
    pub sort: SortOrder,
    pub cursor: Option<String>,
}

pub fn canonicalize(raw: &RawSearchQuery) -> SearchQuery {
    SearchQuery {
        keyword: normalize_keyword(raw.kw.as_deref()),
        category_filters: raw
            .cat
            .as_deref()
            .map(|cat| normalize_filters(cat.split(',')))
            .unwrap_or_default(),
        sort: SortOrder::parse_or_default(raw.sort.as_deref()),
        cursor: normalize_cursor(raw.cursor.as_deref()),
    }
}

fn normalize_keyword(keyword: Option<&str>) -> Option<String> {
    let keyword = keyword?
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    (!keyword.is_empty()).then_some(keyword)
}

fn normalize_filters<'a>(ids: impl Iterator<Item = &'a str>) -> BTreeSet<String> {
    ids.map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_cursor(cursor: Option<&str>) -> Option<String> {
    cursor
        .map(str::trim)
        .filter(|cursor| !cursor.is_empty())
        .map(str::to_string)
}

fn push_component(key: &mut String, name: &str, value: Option<&str>) {
    key.push('|');
    key.push_str(name);
    key.push('=');

    match value {
        Some(value) => key.push_str(&format!("{}:{value}", value.len())),
        None => key.push('-'),
    }
}

impl SearchQuery {
    /// Re-applies canonicalization to a query built by hand.
    pub fn canonical(self) -> Self {
        SearchQuery {
            keyword: normalize_keyword(self.keyword.as_deref()),
            category_filters: normalize_filters(self.category_filters.iter().map(String::as_str)),
            sort: self.sort,
            cursor: normalize_cursor(self.cursor.as_deref()),
        }
    }

    /// Cache key. Every string component is length prefixed, which keeps the
    /// encoding injective whatever characters the keyword contains.
    pub fn to_key(&self) -> String {
        let mut key = String::from(SEARCH_PREFIX);

        push_component(&mut key, "kw", self.keyword.as_deref());
        key.push_str(&format!("|cat={}", self.category_filters.len()));
        for id in &self.category_filters {
            key.push_str(&format!(":{}:{id}", id.len()));
        }
        push_component(&mut key, "sort", Some(self.sort.as_str()));
        push_component(&mut key, "cursor", self.cursor.as_deref());

        key
    }

    pub fn to_raw(&self) -> RawSearchQuery {
        RawSearchQuery {
            kw: self.keyword.clone(),
            cat: (!self.category_filters.is_empty()).then(|| {
                self.category_filters
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(",")
            }),
            sort: (self.sort != SortOrder::default()).then(|| self.sort.as_str().to_string()),
            cursor: self.cursor.clone(),
        }
    }

    pub fn to_query_string(&self) -> String {
        let raw = self.to_raw();

        [
            ("kw", raw.kw),
            ("cat", raw.cat),
            ("sort", raw.sort),
            ("cursor", raw.cursor),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| format!("{name}={}", urlencoding::encode(&value))))
        .collect::<Vec<_>>()
        .join("&")
    }

    pub fn search_url(&self) -> String {
        let query = self.to_query_string();

        if query.is_empty() {
            SEARCH_PATH.to_string()
        } else {
            format!("{SEARCH_PATH}?{query}")
        }
    }

    /// Reads a query back out of an address produced by [`Self::search_url`].
    /// Anything unparseable yields the default query.
    pub fn from_url(url: &str) -> Self {
        let query = url.split_once('?').map_or("", |(_, query)| query);

        canonicalize(&RawSearchQuery::from_query_string(query))
    }

    pub fn with_cursor(&self, cursor: Option<String>) -> Self {
        SearchQuery {
            cursor: normalize_cursor(cursor.as_deref()),
            ..self.clone()
        }
    }
}
