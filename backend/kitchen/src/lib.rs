//! # Kitchen
//!
//! Recipe discovery core shared by the server and the client.
//!
//! ## Components
//! - [`taxonomy`]: category groups and options, validated from store rows
//! - [`query`]: canonical search queries, cache keys and list addresses
//! - [`search`]: keyword, facet, sort and cursor execution over the store
//! - [`cooking`]: per-user and per-recipe cook counts derived from logs
//! - [`cache`]: stale-while-revalidate result cache with snapshot and restore
//! - [`navigation`]: last search and favorites addresses
//! - [`fallible`]: per-section failure containment
//! - [`store`]: the async data-access boundary
//!
//! ## Flow
//! UI input is canonicalized into a [`SearchQuery`], looked up in the
//! [`ResultCache`] under [`SearchQuery::to_key`], fetched through
//! [`RecipeSearch`] on a miss, and the resulting address is recorded with
//! [`NavigationWriter::record_search`]. Cook counts are read per recipe card
//! and in one batch per user list.
//!
//! ## Errors
//! Everything here returns [`KitchenError`]. Turning it into a wire response is
//! left to the server.
pub mod cache;
pub mod clock;
pub mod cooking;
pub mod error;
pub mod fallible;
pub mod keys;
pub mod navigation;
pub mod query;
pub mod search;
pub mod store;
pub mod taxonomy;

pub use cache::{CacheConfig, CacheSnapshot, Cached, EntryState, LatestKey, ResultCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use cooking::CookingLogAggregator;
pub use error::{Entity, KitchenError};
pub use fallible::{Region, region, region_async};
pub use navigation::{NavigationReader, NavigationState, NavigationWriter, Section, navigation};
pub use query::{RawSearchQuery, SearchQuery, SortOrder, canonicalize};
pub use search::{RecipeSearch, RecipeSummary, SearchPage};
pub use store::{BankStore, Store};
pub use taxonomy::{CategoryGroup, CategoryKind, CategoryOption, Taxonomy, TaxonomyIndex};
