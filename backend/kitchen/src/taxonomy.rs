//! # Category Taxonomy
//!
//! Resolves category groups and their options from the store.
//!
//! ## Invariants
//! - Group order is the store order and defines display order
//! - Option ids are unique within a group
//! - An option id belongs to exactly one group
//!
//! Store rows that break any of these, or carry an unknown kind, are reported
//! as upstream failures instead of being patched up here.

use std::{
    collections::{HashMap, HashSet},
    fmt::{self, Display},
    str::FromStr,
    sync::Arc,
};

use bank::CategoryGroupRecord;
use serde::{Deserialize, Serialize};

use crate::{error::KitchenError, store::Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryKind {
    Cuisine,
    MealTime,
    Diet,
    Method,
}

impl CategoryKind {
    pub const ALL: [CategoryKind; 4] = [
        CategoryKind::Cuisine,
        CategoryKind::MealTime,
        CategoryKind::Diet,
        CategoryKind::Method,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CategoryKind::Cuisine => "cuisine",
            CategoryKind::MealTime => "meal-time",
            CategoryKind::Diet => "diet",
            CategoryKind::Method => "method",
        }
    }
}

impl Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl FromStr for CategoryKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryOption {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: CategoryKind,
    /// Owning group. Lookup only, the group owns the option.
    pub group_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryGroup {
    pub id: String,
    pub label: String,
    pub options: Vec<CategoryOption>,
}

/// Option id to owning group id.
#[derive(Debug, Clone, Default)]
pub struct TaxonomyIndex {
    option_to_group: HashMap<String, String>,
}

impl TaxonomyIndex {
    pub fn new(groups: &[CategoryGroup]) -> Self {
        let option_to_group = groups
            .iter()
            .flat_map(|group| {
                group
                    .options
                    .iter()
                    .map(|option| (option.id.clone(), group.id.clone()))
            })
            .collect();

        Self { option_to_group }
    }

    pub fn group_of(&self, option_id: &str) -> Option<&str> {
        self.option_to_group.get(option_id).map(String::as_str)
    }
}

/// Validates raw store rows into groups, keeping store order.
pub fn resolve_groups(records: Vec<CategoryGroupRecord>) -> Result<Vec<CategoryGroup>, KitchenError> {
    let mut claimed: HashMap<String, String> = HashMap::new();
    let mut group_ids = HashSet::new();
    let mut groups = Vec::with_capacity(records.len());

    for record in records {
        if record.id.is_empty() {
            return Err(KitchenError::upstream("category group with empty id"));
        }

        if !group_ids.insert(record.id.clone()) {
            return Err(KitchenError::upstream(format!("category group {} repeated", record.id)));
        }

        let mut seen = HashSet::new();
        let mut options = Vec::with_capacity(record.options.len());

        for option in record.options {
            if option.id.is_empty() {
                return Err(KitchenError::upstream(format!(
                    "option with empty id in group {}",
                    record.id
                )));
            }

            if !seen.insert(option.id.clone()) {
                return Err(KitchenError::upstream(format!(
                    "option {} repeated in group {}",
                    option.id, record.id
                )));
            }

            if let Some(owner) = claimed.insert(option.id.clone(), record.id.clone()) {
                return Err(KitchenError::upstream(format!(
                    "option {} claimed by groups {owner} and {}",
                    option.id, record.id
                )));
            }

            let kind = option.kind.parse::<CategoryKind>().map_err(|UnknownKind(kind)| {
                KitchenError::upstream(format!("option {} has unknown kind {kind:?}", option.id))
            })?;

            options.push(CategoryOption {
                id: option.id,
                label: option.label,
                kind,
                group_id: record.id.clone(),
            });
        }

        groups.push(CategoryGroup {
            id: record.id,
            label: record.label,
            options,
        });
    }

    Ok(groups)
}

/// Every option in display order, optionally narrowed to one kind.
pub fn flatten_options(groups: Vec<CategoryGroup>, kind: Option<CategoryKind>) -> Vec<CategoryOption> {
    groups
        .into_iter()
        .flat_map(|group| group.options)
        .filter(|option| kind.is_none_or(|kind| option.kind == kind))
        .collect()
}

#[derive(Clone)]
pub struct Taxonomy {
    store: Arc<dyn Store>,
}

impl Taxonomy {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn groups(&self) -> Result<Vec<CategoryGroup>, KitchenError> {
        resolve_groups(self.store.category_groups().await?)
    }

    pub async fn options(&self, kind: Option<CategoryKind>) -> Result<Vec<CategoryOption>, KitchenError> {
        Ok(flatten_options(self.groups().await?, kind))
    }

    pub async fn index(&self) -> Result<TaxonomyIndex, KitchenError> {
        Ok(TaxonomyIndex::new(&self.groups().await?))
    }
}

#[cfg(test)]
mod tests {
    use bank::{Bank, CategoryOptionRecord};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::store::BankStore;

    fn option(id: &str, kind: &str) -> CategoryOptionRecord {
        CategoryOptionRecord {
            id: id.to_string(),
            label: id.to_uppercase(),
            kind: kind.to_string(),
        }
    }

    fn group(id: &str, options: Vec<CategoryOptionRecord>) -> CategoryGroupRecord {
        CategoryGroupRecord {
            id: id.to_string(),
            label: id.to_string(),
            options,
        }
    }

    fn records() -> Vec<CategoryGroupRecord> {
        vec![
            group(
                "country",
                vec![option("korean", "cuisine"), option("italian", "cuisine")],
            ),
            group(
                "when",
                vec![option("breakfast", "meal-time"), option("late-night", "meal-time")],
            ),
            group("style", vec![option("vegan", "diet"), option("fusion", "cuisine")]),
        ]
    }

    fn taxonomy(records: Vec<CategoryGroupRecord>) -> Taxonomy {
        Taxonomy::new(Arc::new(BankStore::new(Bank {
            category_groups: records,
            ..Default::default()
        })))
    }

    fn ids(options: &[CategoryOption]) -> Vec<&str> {
        options.iter().map(|option| option.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_options_by_kind_keep_group_order() {
        let options = taxonomy(records())
            .options(Some(CategoryKind::Cuisine))
            .await
            .unwrap();

        assert_eq!(ids(&options), vec!["korean", "italian", "fusion"]);
        assert!(options.iter().all(|option| option.kind == CategoryKind::Cuisine));
        assert_eq!(options[2].group_id, "style");
    }

    #[tokio::test]
    async fn test_options_without_kind_span_all_groups() {
        let options = taxonomy(records()).options(None).await.unwrap();

        assert_eq!(
            ids(&options),
            vec!["korean", "italian", "breakfast", "late-night", "vegan", "fusion"]
        );
    }

    #[tokio::test]
    async fn test_groups_keep_store_order() {
        let groups = taxonomy(records()).groups().await.unwrap();
        let group_ids: Vec<_> = groups.iter().map(|group| group.id.as_str()).collect();

        assert_eq!(group_ids, vec!["country", "when", "style"]);
    }

    #[test]
    fn test_unknown_kind_is_upstream() {
        let result = resolve_groups(vec![group("odd", vec![option("x", "dessert")])]);

        assert!(matches!(result, Err(KitchenError::Upstream(_))));
    }

    #[test]
    fn test_repeated_option_in_group_is_upstream() {
        let result = resolve_groups(vec![group(
            "country",
            vec![option("korean", "cuisine"), option("korean", "cuisine")],
        )]);

        assert!(matches!(result, Err(KitchenError::Upstream(_))));
    }

    #[test]
    fn test_option_in_two_groups_is_upstream() {
        let result = resolve_groups(vec![
            group("a", vec![option("korean", "cuisine")]),
            group("b", vec![option("korean", "cuisine")]),
        ]);

        assert!(matches!(result, Err(KitchenError::Upstream(_))));
    }

    #[test]
    fn test_repeated_group_is_upstream() {
        let result = resolve_groups(vec![
            group("country", vec![option("korean", "cuisine")]),
            group("country", vec![option("italian", "cuisine")]),
        ]);

        assert!(matches!(result, Err(KitchenError::Upstream(message)) if message.contains("country")));
    }

    #[test]
    fn test_index_resolves_owner() {
        let groups = resolve_groups(records()).unwrap();
        let index = TaxonomyIndex::new(&groups);

        assert_eq!(index.group_of("vegan"), Some("style"));
        assert_eq!(index.group_of("missing"), None);
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in CategoryKind::ALL {
            assert_eq!(kind.as_str().parse::<CategoryKind>(), Ok(kind));
        }
        assert!("Cuisine".parse::<CategoryKind>().is_err());
    }
}
