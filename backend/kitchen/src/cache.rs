//! # Result Cache
//!
//! Stale-while-revalidate cache shared by the server routes and the client.
//!
//! ## Entry lifecycle
//! `fetching -> fresh -> stale -> fetching -> fresh | error`
//!
//! - Fresh data is served as is
//! - Stale data is served immediately while a background refetch runs
//! - Absent or failed entries make the caller wait for the fetch
//! - A failed refetch keeps the previous data and flags the entry as `error`
//!
//! ## Coalescing
//! Each key has at most one fetch in flight. Fetches run as spawned tasks and
//! publish their outcome on a `watch` channel that every waiting caller
//! subscribes to, so a dropped caller never aborts a fetch.
//!
//! Every fetch takes the next sequence number of its key. A result is only
//! applied when its number is still the latest issued for that key, which
//! stops a slow early fetch from overwriting a newer one.
//!
//! ## Hydration
//! [`ResultCache::snapshot`] captures the fresh entries with their wall-clock
//! fetch time. [`ResultCache::restore`] seeds another cache (usually in
//! another process) without fetching. Restored entries older than the
//! staleness window come back as `stale` and refetch on first access.

use std::{
    collections::{BTreeMap, HashMap},
    future::Future,
    sync::Arc,
    time::Duration,
};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};

use crate::{
    clock::{Clock, SystemClock, millis},
    error::KitchenError,
};

type Outcome = Option<Result<Arc<Value>, KitchenError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    Fresh,
    Stale,
    Fetching,
    Error,
}

#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Age after which data is served stale and revalidated.
    pub stale_after: Duration,
    /// Entries not accessed for this long are evicted.
    pub idle_after: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(60),
            idle_after: Duration::from_secs(300),
        }
    }
}

struct Entry {
    state: EntryState,
    data: Option<Arc<Value>>,
    fetched_at: i64,
    last_access: i64,
    failure: Option<KitchenError>,
    latest_seq: u64,
    in_flight: Option<watch::Receiver<Outcome>>,
    /// Set when the entry is invalidated while a fetch is in flight. That
    /// fetch may have read the old data, so its result lands as `stale`.
    invalidated: bool,
}

impl Entry {
    fn empty(now: i64) -> Self {
        Self {
            state: EntryState::Fetching,
            data: None,
            fetched_at: 0,
            last_access: now,
            failure: None,
            latest_seq: 0,
            in_flight: None,
            invalidated: false,
        }
    }

    fn age_out(&mut self, now: i64, stale_ms: i64) {
        if self.state == EntryState::Fresh && now - self.fetched_at >= stale_ms {
            self.state = EntryState::Stale;
        }
    }

    /// Data that may be shown while a refetch runs. Failed entries make
    /// callers wait instead.
    fn serveable(&self) -> Option<Arc<Value>> {
        match self.failure {
            Some(_) => None,
            None => self.data.clone(),
        }
    }

    fn is_fresh(&self, now: i64, stale_ms: i64) -> bool {
        self.state == EntryState::Fresh && self.data.is_some() && now - self.fetched_at < stale_ms
    }

    /// Marks the entry so the next access revalidates. Returns whether
    /// anything changed.
    fn invalidate(&mut self) -> bool {
        if self.live_fetch().is_some() {
            self.invalidated = true;
            return true;
        }

        if self.state == EntryState::Fresh {
            self.state = EntryState::Stale;
            return true;
        }

        false
    }

    /// The in-flight fetch, unless its task died without reporting.
    fn live_fetch(&self) -> Option<watch::Receiver<Outcome>> {
        let outcome = self.in_flight.as_ref()?;

        if outcome.has_changed().is_err() && outcome.borrow().is_none() {
            return None;
        }

        Some(outcome.clone())
    }
}

/// Read-only view of an entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub data: Option<T>,
    pub state: EntryState,
    pub fetched_at: i64,
    pub error: Option<KitchenError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub data: Value,
    /// Unix milliseconds.
    pub fetched_at: i64,
    /// Already due for revalidation when the snapshot was taken, whatever
    /// its age says.
    #[serde(default)]
    pub stale: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    pub taken_at: i64,
    pub entries: BTreeMap<String, SnapshotEntry>,
}

enum Lookup {
    Hit(Arc<Value>),
    Wait(watch::Receiver<Outcome>),
}

#[derive(Clone)]
pub struct ResultCache {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            config,
            clock,
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    fn stale_ms(&self) -> i64 {
        millis(self.config.stale_after)
    }

    pub async fn get<T, F, Fut>(&self, key: &str, fetcher: F) -> Result<T, KitchenError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, KitchenError>> + Send + 'static,
    {
        let lookup = {
            let mut entries = self.entries.lock().await;
            let now = self.clock.now_ms();
            self.evict_idle(&mut entries, now);

            let entry = entries
                .entry(key.to_string())
                .or_insert_with(|| Entry::empty(now));
            entry.last_access = now;
            entry.age_out(now, self.stale_ms());

            match (entry.state, entry.serveable()) {
                (EntryState::Fresh, Some(data)) => Lookup::Hit(data),
                (EntryState::Stale, Some(data)) => {
                    debug!("Serving stale {key} while revalidating");
                    self.start_fetch(key, entry, fetcher);
                    Lookup::Hit(data)
                }
                (EntryState::Fetching, Some(data)) if entry.live_fetch().is_some() => {
                    Lookup::Hit(data)
                }
                _ => match entry.live_fetch() {
                    Some(outcome) => Lookup::Wait(outcome),
                    None => Lookup::Wait(self.start_fetch(key, entry, fetcher)),
                },
            }
        };

        let data = match lookup {
            Lookup::Hit(data) => data,
            Lookup::Wait(outcome) => wait(outcome).await?,
        };

        decode(key, &data)
    }

    /// Like [`Self::get`] but suppresses the result when `latest` has moved
    /// to another key by the time it arrives.
    pub async fn get_latest<T, F, Fut>(
        &self,
        latest: &LatestKey,
        key: &str,
        fetcher: F,
    ) -> Result<Option<T>, KitchenError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, KitchenError>> + Send + 'static,
    {
        latest.focus(key);

        let result = self.get(key, fetcher).await;

        if !latest.is_current(key) {
            debug!("Suppressing result for {key}, no longer current");
            return Ok(None);
        }

        result.map(Some)
    }

    /// Starts a new fetch even if one is already in flight. The older fetch
    /// is superseded and its result will not be applied.
    pub async fn refresh<T, F, Fut>(&self, key: &str, fetcher: F) -> Result<T, KitchenError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, KitchenError>> + Send + 'static,
    {
        let outcome = {
            let mut entries = self.entries.lock().await;
            let now = self.clock.now_ms();

            let entry = entries
                .entry(key.to_string())
                .or_insert_with(|| Entry::empty(now));
            entry.last_access = now;

            self.start_fetch(key, entry, fetcher)
        };

        let data = wait(outcome).await?;

        decode(key, &data)
    }

    fn start_fetch<T, F, Fut>(&self, key: &str, entry: &mut Entry, fetcher: F) -> watch::Receiver<Outcome>
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, KitchenError>> + Send + 'static,
    {
        entry.latest_seq += 1;
        let seq = entry.latest_seq;

        let (sender, outcome) = watch::channel(None);
        entry.state = EntryState::Fetching;
        entry.in_flight = Some(outcome.clone());
        entry.invalidated = false;

        let entries = Arc::clone(&self.entries);
        let clock = Arc::clone(&self.clock);
        let key = key.to_string();

        tokio::spawn(async move {
            let result = fetcher().await.and_then(|data| {
                serde_json::to_value(data)
                    .map(Arc::new)
                    .map_err(KitchenError::upstream)
            });

            let now = clock.now_ms();
            apply(&mut *entries.lock().await, &key, seq, &result, now);

            sender.send_replace(Some(result));
        });

        outcome
    }

    /// Marks an entry stale so the next access revalidates it. A fetch
    /// already in flight for the key will land as `stale` too.
    pub async fn invalidate(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;

        entries.get_mut(key).is_some_and(Entry::invalidate)
    }

    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.lock().await;

        entries
            .iter_mut()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(_, entry)| entry.invalidate())
            .filter(|&changed| changed)
            .count()
    }

    pub async fn peek<T: DeserializeOwned>(&self, key: &str) -> Option<Cached<T>> {
        let mut entries = self.entries.lock().await;
        let now = self.clock.now_ms();

        let entry = entries.get_mut(key)?;
        entry.age_out(now, self.stale_ms());

        Some(Cached {
            data: entry.data.as_deref().and_then(|data| T::deserialize(data).ok()),
            state: entry.state,
            fetched_at: entry.fetched_at,
            error: entry.failure.clone(),
        })
    }

    pub async fn snapshot(&self) -> CacheSnapshot {
        let entries = self.entries.lock().await;
        let now = self.clock.now_ms();
        let stale_ms = self.stale_ms();

        let entries = entries
            .iter()
            .filter(|(_, entry)| entry.is_fresh(now, stale_ms))
            .filter_map(|(key, entry)| {
                let data = entry.data.as_deref()?.clone();

                Some((
                    key.clone(),
                    SnapshotEntry {
                        data,
                        fetched_at: entry.fetched_at,
                        stale: false,
                    },
                ))
            })
            .collect();

        CacheSnapshot {
            taken_at: now,
            entries,
        }
    }

    /// Captures the given keys with their real fetch time, stale or not.
    /// Keys without data are skipped.
    pub async fn snapshot_keys(&self, keys: &[&str]) -> CacheSnapshot {
        let entries = self.entries.lock().await;
        let now = self.clock.now_ms();
        let stale_ms = self.stale_ms();

        let entries = keys
            .iter()
            .filter_map(|key| {
                let entry = entries.get(*key)?;
                let data = entry.data.as_deref()?.clone();

                Some((
                    key.to_string(),
                    SnapshotEntry {
                        data,
                        fetched_at: entry.fetched_at,
                        stale: entry.invalidated || !entry.is_fresh(now, stale_ms),
                    },
                ))
            })
            .collect();

        CacheSnapshot {
            taken_at: now,
            entries,
        }
    }

    /// Seeds entries from a snapshot without fetching. Entries with a fetch
    /// in flight or newer data are left alone. Returns how many were restored.
    pub async fn restore(&self, snapshot: CacheSnapshot) -> usize {
        let mut entries = self.entries.lock().await;
        let now = self.clock.now_ms();
        let stale_ms = self.stale_ms();
        let mut restored = 0;

        for (key, incoming) in snapshot.entries {
            let latest_seq = match entries.get(&key) {
                Some(existing) if existing.live_fetch().is_some() => continue,
                Some(existing) if existing.data.is_some() && existing.fetched_at >= incoming.fetched_at => {
                    continue;
                }
                Some(existing) => existing.latest_seq,
                None => 0,
            };

            let state = if !incoming.stale && now - incoming.fetched_at < stale_ms {
                EntryState::Fresh
            } else {
                EntryState::Stale
            };

            entries.insert(
                key,
                Entry {
                    state,
                    data: Some(Arc::new(incoming.data)),
                    fetched_at: incoming.fetched_at,
                    last_access: now,
                    failure: None,
                    latest_seq,
                    in_flight: None,
                    invalidated: false,
                },
            );
            restored += 1;
        }

        debug!("Restored {restored} cache entries");
        restored
    }

    /// Drops idle entries. Returns how many were evicted.
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let now = self.clock.now_ms();

        self.evict_idle(&mut entries, now)
    }

    fn evict_idle(&self, entries: &mut HashMap<String, Entry>, now: i64) -> usize {
        let idle_ms = millis(self.config.idle_after);
        let before = entries.len();

        entries.retain(|key, entry| {
            let keep = entry.live_fetch().is_some() || now - entry.last_access < idle_ms;

            if !keep {
                debug!("Evicting idle {key}");
            }

            keep
        });

        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

fn apply(
    entries: &mut HashMap<String, Entry>,
    key: &str,
    seq: u64,
    result: &Result<Arc<Value>, KitchenError>,
    now: i64,
) {
    let Some(entry) = entries.get_mut(key) else {
        debug!("Dropping fetch {seq} for {key}, entry is gone");
        return;
    };

    if entry.latest_seq != seq {
        debug!(
            "Discarding superseded fetch {seq} for {key}, latest is {}",
            entry.latest_seq
        );
        return;
    }

    entry.in_flight = None;
    let invalidated = std::mem::take(&mut entry.invalidated);

    match result {
        Ok(data) => {
            entry.data = Some(Arc::clone(data));
            entry.fetched_at = now;
            entry.failure = None;
            entry.state = if invalidated {
                debug!("Fetch for {key} was invalidated in flight, storing as stale");
                EntryState::Stale
            } else {
                EntryState::Fresh
            };
        }
        Err(e) => {
            if matches!(e, KitchenError::Upstream(_)) {
                warn!("Fetch for {key} failed, keeping previous data: {e}");
            } else {
                debug!("Fetch for {key} failed: {e}");
            }

            entry.failure = Some(e.clone());
            entry.state = EntryState::Error;
        }
    }
}

async fn wait(mut outcome: watch::Receiver<Outcome>) -> Result<Arc<Value>, KitchenError> {
    let result = match outcome.wait_for(Option::is_some).await {
        Ok(outcome) => (*outcome).clone(),
        Err(_) => None,
    };

    result.unwrap_or_else(|| Err(KitchenError::upstream("fetch ended without a result")))
}

fn decode<T: DeserializeOwned>(key: &str, data: &Value) -> Result<T, KitchenError> {
    T::deserialize(data)
        .map_err(|e| KitchenError::upstream(format!("cached {key} has an unexpected shape: {e}")))
}

/// The key the UI is currently showing. Results for any other key arriving
/// through [`ResultCache::get_latest`] are suppressed.
#[derive(Debug)]
pub struct LatestKey {
    current: watch::Sender<Option<String>>,
}

impl Default for LatestKey {
    fn default() -> Self {
        Self {
            current: watch::Sender::new(None),
        }
    }
}

impl LatestKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focus(&self, key: &str) {
        self.current.send_replace(Some(key.to_string()));
    }

    pub fn is_current(&self, key: &str) -> bool {
        self.current.borrow().as_deref() == Some(key)
    }

    pub fn current(&self) -> Option<String> {
        self.current.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        pin::Pin,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::clock::ManualClock;

    type Fetch<T> = Pin<Box<dyn Future<Output = Result<T, KitchenError>> + Send>>;

    const T0: i64 = 1_700_000_000_000;

    fn fetcher<T: Send + 'static>(
        calls: &Arc<AtomicUsize>,
        result: Result<T, KitchenError>,
        delay_ms: u64,
    ) -> impl FnOnce() -> Fetch<T> + Send + 'static {
        let calls = Arc::clone(calls);

        move || -> Fetch<T> {
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                result
            })
        }
    }

    fn manual_cache(clock: &Arc<ManualClock>) -> ResultCache {
        ResultCache::with_clock(CacheConfig::default(), clock.clone())
    }

    async fn settle(cache: &ResultCache, key: &str) {
        for _ in 0..400 {
            match cache.peek::<Value>(key).await {
                Some(cached) if cached.state != EntryState::Fetching => return,
                _ => tokio::time::sleep(Duration::from_millis(5)).await,
            }
        }

        panic!("fetch for {key} never settled");
    }

    fn calls() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[tokio::test]
    async fn test_fresh_hit_does_not_refetch() {
        let cache = ResultCache::new(CacheConfig::default());
        let calls = calls();

        let first: String = cache.get("k", fetcher(&calls, Ok("v1".to_string()), 0)).await.unwrap();
        let second: String = cache.get("k", fetcher(&calls, Ok("v2".to_string()), 0)).await.unwrap();

        assert_eq!((first.as_str(), second.as_str()), ("v1", "v1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_gets_share_one_fetch() {
        let cache = ResultCache::new(CacheConfig::default());
        let calls = calls();

        let (a, b, c) = tokio::join!(
            cache.get("k", fetcher(&calls, Ok(vec![1u32, 2]), 30)),
            cache.get("k", fetcher(&calls, Ok(vec![9u32]), 30)),
            cache.get("k", fetcher(&calls, Ok(vec![9u32]), 30)),
        );

        assert_eq!(a.unwrap(), vec![1, 2]);
        assert_eq!(b.unwrap(), vec![1, 2]);
        assert_eq!(c.unwrap(), vec![1, 2]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_coalesced_callers_share_failure() {
        let cache = ResultCache::new(CacheConfig::default());
        let calls = calls();
        let failure = KitchenError::upstream("store down");

        let (a, b) = tokio::join!(
            cache.get::<String, _, _>("k", fetcher(&calls, Err(failure.clone()), 20)),
            cache.get::<String, _, _>("k", fetcher(&calls, Ok("unused".to_string()), 20)),
        );

        assert_eq!(a.unwrap_err(), failure);
        assert_eq!(b.unwrap_err(), failure);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_is_served_while_revalidating() {
        let clock = Arc::new(ManualClock::new(T0));
        let cache = manual_cache(&clock);
        let calls = calls();

        let _: String = cache.get("k", fetcher(&calls, Ok("v1".to_string()), 0)).await.unwrap();
        clock.advance(Duration::from_secs(61));

        let served: String = cache.get("k", fetcher(&calls, Ok("v2".to_string()), 10)).await.unwrap();
        assert_eq!(served, "v1");

        settle(&cache, "k").await;

        let cached = cache.peek::<String>("k").await.unwrap();
        assert_eq!(cached.state, EntryState::Fresh);
        assert_eq!(cached.data.as_deref(), Some("v2"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_refetch_keeps_previous_data() {
        let cache = ResultCache::new(CacheConfig::default());
        let calls = calls();

        let _: String = cache.get("k", fetcher(&calls, Ok("v1".to_string()), 0)).await.unwrap();
        assert!(cache.invalidate("k").await);

        let served: String = cache
            .get("k", fetcher(&calls, Err(KitchenError::upstream("down")), 0))
            .await
            .unwrap();
        assert_eq!(served, "v1");

        settle(&cache, "k").await;

        let cached = cache.peek::<String>("k").await.unwrap();
        assert_eq!(cached.state, EntryState::Error);
        assert_eq!(cached.data.as_deref(), Some("v1"));
        assert_eq!(cached.error, Some(KitchenError::upstream("down")));

        let retry = cache
            .get::<String, _, _>("k", fetcher(&calls, Err(KitchenError::upstream("still down")), 0))
            .await;
        assert_eq!(retry.unwrap_err(), KitchenError::upstream("still down"));

        let recovered: String = cache.get("k", fetcher(&calls, Ok("v3".to_string()), 0)).await.unwrap();
        assert_eq!(recovered, "v3");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_superseded_fetch_is_discarded() {
        let cache = ResultCache::new(CacheConfig::default());
        let calls = calls();

        let slow = tokio::spawn({
            let cache = cache.clone();
            let fetch = fetcher(&calls, Ok("old".to_string()), 100);
            async move { cache.refresh::<String, _, _>("k", fetch).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let fast: String = cache.refresh("k", fetcher(&calls, Ok("new".to_string()), 0)).await.unwrap();
        assert_eq!(fast, "new");

        assert_eq!(slow.await.unwrap().unwrap(), "old");

        let cached = cache.peek::<String>("k").await.unwrap();
        assert_eq!(cached.data.as_deref(), Some("new"));
        assert_eq!(cached.state, EntryState::Fresh);
    }

    #[tokio::test]
    async fn test_result_for_previous_key_is_suppressed() {
        let cache = ResultCache::new(CacheConfig::default());
        let latest = Arc::new(LatestKey::new());
        let calls = calls();

        let earlier = tokio::spawn({
            let cache = cache.clone();
            let latest = latest.clone();
            let fetch = fetcher(&calls, Ok("kimchi".to_string()), 80);
            async move { cache.get_latest::<String, _, _>(&latest, "search:kimchi", fetch).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let current = cache
            .get_latest(&latest, "search:bibimbap", fetcher(&calls, Ok("bibimbap".to_string()), 0))
            .await
            .unwrap();

        assert_eq!(current.as_deref(), Some("bibimbap"));
        assert_eq!(earlier.await.unwrap().unwrap(), None);
        assert_eq!(latest.current().as_deref(), Some("search:bibimbap"));
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached_as_data() {
        let cache = ResultCache::new(CacheConfig::default());
        let calls = calls();
        let missing = KitchenError::not_found(crate::error::Entity::Recipe, "missing-id");

        for _ in 0..2 {
            let result = cache
                .get::<String, _, _>("recipe:missing-id", fetcher(&calls, Err(missing.clone()), 0))
                .await;
            assert_eq!(result.unwrap_err(), missing);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_restored_snapshot_is_a_hit() {
        let clock = Arc::new(ManualClock::new(T0));
        let server = manual_cache(&clock);
        let calls = calls();

        let _: Vec<String> = server
            .get("category-groups", fetcher(&calls, Ok(vec!["한식".to_string()]), 0))
            .await
            .unwrap();

        let wire = serde_json::to_string(&server.snapshot().await).unwrap();

        clock.advance(Duration::from_secs(2));
        let browser = manual_cache(&clock);
        assert_eq!(browser.restore(serde_json::from_str(&wire).unwrap()).await, 1);

        let groups: Vec<String> = browser
            .get("category-groups", fetcher(&calls, Ok(Vec::new()), 0))
            .await
            .unwrap();

        assert_eq!(groups, vec!["한식"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_restored_old_snapshot_refetches_on_access() {
        let clock = Arc::new(ManualClock::new(T0));
        let server = manual_cache(&clock);
        let calls = calls();

        let _: String = server.get("k", fetcher(&calls, Ok("v1".to_string()), 0)).await.unwrap();
        let snapshot = server.snapshot().await;

        clock.advance(Duration::from_secs(90));
        let browser = manual_cache(&clock);
        browser.restore(snapshot).await;

        assert_eq!(browser.peek::<String>("k").await.unwrap().state, EntryState::Stale);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let served: String = browser.get("k", fetcher(&calls, Ok("v2".to_string()), 0)).await.unwrap();
        assert_eq!(served, "v1");

        settle(&browser, "k").await;
        assert_eq!(browser.peek::<String>("k").await.unwrap().data.as_deref(), Some("v2"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_snapshot_only_holds_fresh_entries() {
        let clock = Arc::new(ManualClock::new(T0));
        let cache = manual_cache(&clock);
        let calls = calls();

        let _: String = cache.get("old", fetcher(&calls, Ok("o".to_string()), 0)).await.unwrap();
        clock.advance(Duration::from_secs(61));
        let _: String = cache.get("new", fetcher(&calls, Ok("n".to_string()), 0)).await.unwrap();
        let _ = cache
            .get::<String, _, _>("broken", fetcher(&calls, Err(KitchenError::upstream("down")), 0))
            .await;

        let snapshot = cache.snapshot().await;

        assert_eq!(snapshot.entries.keys().collect::<Vec<_>>(), vec!["new"]);
        assert_eq!(snapshot.taken_at, T0 + 61_000);
    }

    #[tokio::test]
    async fn test_idle_entries_are_evicted_but_not_in_flight() {
        let clock = Arc::new(ManualClock::new(T0));
        let cache = manual_cache(&clock);
        let calls = calls();

        let _: String = cache.get("idle", fetcher(&calls, Ok("i".to_string()), 0)).await.unwrap();

        let pending = tokio::spawn({
            let cache = cache.clone();
            let fetch = fetcher(&calls, Ok("p".to_string()), 100);
            async move { cache.get::<String, _, _>("pending", fetch).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        clock.advance(Duration::from_secs(301));
        assert_eq!(cache.sweep().await, 1);

        assert!(cache.peek::<String>("idle").await.is_none());
        assert_eq!(
            cache.peek::<String>("pending").await.unwrap().state,
            EntryState::Fetching
        );

        assert_eq!(pending.await.unwrap().unwrap(), "p");
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_invalidate_prefix_only_touches_matching_keys() {
        let cache = ResultCache::new(CacheConfig::default());
        let calls = calls();

        for key in ["search|a", "search|b", "category-groups"] {
            let _: String = cache.get(key, fetcher(&calls, Ok(key.to_string()), 0)).await.unwrap();
        }

        assert_eq!(cache.invalidate_prefix("search").await, 2);
        assert_eq!(
            cache.peek::<String>("category-groups").await.unwrap().state,
            EntryState::Fresh
        );
        assert_eq!(cache.peek::<String>("search|a").await.unwrap().state, EntryState::Stale);
    }

    #[tokio::test]
    async fn test_invalidated_in_flight_fetch_lands_stale() {
        let cache = ResultCache::new(CacheConfig::default());
        let calls = calls();

        let pending = tokio::spawn({
            let cache = cache.clone();
            let fetch = fetcher(&calls, Ok("before".to_string()), 60);
            async move { cache.get::<String, _, _>("search|popular", fetch).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(cache.invalidate_prefix("search").await, 1);
        assert_eq!(pending.await.unwrap().unwrap(), "before");
        assert_eq!(
            cache.peek::<String>("search|popular").await.unwrap().state,
            EntryState::Stale
        );

        let served: String = cache
            .get("search|popular", fetcher(&calls, Ok("after".to_string()), 0))
            .await
            .unwrap();
        assert_eq!(served, "before");

        settle(&cache, "search|popular").await;
        let cached = cache.peek::<String>("search|popular").await.unwrap();
        assert_eq!(cached.data.as_deref(), Some("after"));
        assert_eq!(cached.state, EntryState::Fresh);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_snapshot_keys_keep_real_age() {
        let clock = Arc::new(ManualClock::new(T0));
        let server = manual_cache(&clock);
        let calls = calls();

        let _: String = server.get("groups", fetcher(&calls, Ok("g1".to_string()), 0)).await.unwrap();
        clock.advance(Duration::from_secs(61));

        // served stale, revalidation still running
        let served: String = server.get("groups", fetcher(&calls, Ok("g2".to_string()), 50)).await.unwrap();
        assert_eq!(served, "g1");

        let snapshot = server.snapshot_keys(&["groups", "absent"]).await;
        let entry = &snapshot.entries["groups"];
        assert_eq!(snapshot.entries.len(), 1);
        assert_eq!(entry.fetched_at, T0);
        assert!(entry.stale);

        let browser = manual_cache(&clock);
        browser.restore(snapshot).await;
        assert_eq!(browser.peek::<String>("groups").await.unwrap().state, EntryState::Stale);
    }

    #[tokio::test]
    async fn test_restore_honors_stale_marker() {
        let clock = Arc::new(ManualClock::new(T0));
        let cache = manual_cache(&clock);
        let mut snapshot = CacheSnapshot::default();
        snapshot.entries.insert(
            "k".to_string(),
            SnapshotEntry {
                data: Value::from("v"),
                fetched_at: T0,
                stale: true,
            },
        );

        cache.restore(snapshot).await;

        assert_eq!(cache.peek::<String>("k").await.unwrap().state, EntryState::Stale);
    }
}
