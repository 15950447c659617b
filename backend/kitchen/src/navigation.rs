//! # Navigation Continuity Store
//!
//! Remembers the last search and favorites list addresses so a detail page
//! can send the user back to the exact list they came from.
//!
//! There is one [`NavigationWriter`], owned by whatever handles navigation
//! events, and any number of [`NavigationReader`]s. Every write replaces the
//! whole [`NavigationState`] in one step, so a reader never sees half of an
//! update. The two addresses are independent and the last write wins.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::query::SearchQuery;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationState {
    pub last_search_url: Option<String>,
    pub last_favorites_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Search,
    Favorites,
}

pub fn navigation() -> (NavigationWriter, NavigationReader) {
    let (tx, rx) = watch::channel(NavigationState::default());

    (NavigationWriter { tx }, NavigationReader { rx })
}

/// Sole writer. Not `Clone`.
#[derive(Debug)]
pub struct NavigationWriter {
    tx: watch::Sender<NavigationState>,
}

impl NavigationWriter {
    pub fn set_last_search_url(&self, url: Option<String>) {
        self.commit(Section::Search, url);
    }

    pub fn set_last_favorites_url(&self, url: Option<String>) {
        self.commit(Section::Favorites, url);
    }

    /// Records the address of a search list built from `query`.
    pub fn record_search(&self, query: &SearchQuery) {
        self.set_last_search_url(Some(query.search_url()));
    }

    pub fn commit(&self, section: Section, url: Option<String>) {
        debug!("Navigation {section:?} -> {url:?}");

        self.tx.send_modify(|state| match section {
            Section::Search => state.last_search_url = url,
            Section::Favorites => state.last_favorites_url = url,
        });
    }

    /// Replaces both addresses at once.
    pub fn replace(&self, state: NavigationState) -> NavigationState {
        self.tx.send_replace(state)
    }

    pub fn reader(&self) -> NavigationReader {
        NavigationReader {
            rx: self.tx.subscribe(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NavigationReader {
    rx: watch::Receiver<NavigationState>,
}

impl NavigationReader {
    pub fn last_search_url(&self) -> Option<String> {
        self.rx.borrow().last_search_url.clone()
    }

    pub fn last_favorites_url(&self) -> Option<String> {
        self.rx.borrow().last_favorites_url.clone()
    }

    pub fn snapshot(&self) -> NavigationState {
        self.rx.borrow().clone()
    }

    /// Query behind the last recorded search address, if there is one.
    pub fn restore_search(&self) -> Option<SearchQuery> {
        self.rx
            .borrow()
            .last_search_url
            .as_deref()
            .map(SearchQuery::from_url)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::query::{RawSearchQuery, SortOrder, canonicalize};

    #[test]
    fn test_fields_are_independent() {
        let (writer, reader) = navigation();
        writer.set_last_favorites_url(Some("/users/u1/favorites".to_string()));

        writer.set_last_search_url(Some("/search/results?kw=kimchi".to_string()));

        assert_eq!(reader.last_search_url().as_deref(), Some("/search/results?kw=kimchi"));
        assert_eq!(reader.last_favorites_url().as_deref(), Some("/users/u1/favorites"));
    }

    #[test]
    fn test_last_write_wins() {
        let (writer, reader) = navigation();
        let other = reader.clone();

        writer.set_last_search_url(Some("/search/results?kw=a".to_string()));
        writer.set_last_search_url(Some("/search/results?kw=b".to_string()));
        writer.set_last_search_url(None);

        assert_eq!(reader.last_search_url(), None);
        assert_eq!(other.snapshot(), NavigationState::default());
    }

    #[test]
    fn test_replace_is_visible_in_one_read() {
        let (writer, reader) = navigation();
        let late = writer.reader();

        let previous = writer.replace(NavigationState {
            last_search_url: Some("/search/results".to_string()),
            last_favorites_url: Some("/users/u1/favorites".to_string()),
        });

        assert_eq!(previous, NavigationState::default());
        assert_eq!(reader.snapshot(), late.snapshot());
        assert_eq!(late.last_favorites_url().as_deref(), Some("/users/u1/favorites"));
    }

    #[test]
    fn test_record_and_restore_search() {
        let (writer, reader) = navigation();
        let query = canonicalize(&RawSearchQuery {
            kw: Some("  Kimchi   Stew ".to_string()),
            cat: Some("dinner,korean".to_string()),
            sort: Some("newest".to_string()),
            cursor: None,
        });

        writer.record_search(&query);

        let restored = reader.restore_search().unwrap();
        assert_eq!(restored, query);
        assert_eq!(restored.sort, SortOrder::Newest);
    }

    #[test]
    fn test_restore_without_search() {
        let (_writer, reader) = navigation();

        assert_eq!(reader.restore_search(), None);
    }
}
