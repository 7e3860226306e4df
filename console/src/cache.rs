//! A small request cache keyed by endpoint.
//!
//! Each [`RequestKey`] maps to the last successfully fetched data, the last
//! error, when it was fetched, and a generation number. The generation is
//! the identity of one fetched version of the data: it changes on every
//! successful fetch and never repeats, so derived state (e.g. node metadata
//! for a channel list) can tell whether it was computed from the current
//! version.

use std::{any::Any, collections::HashMap, fmt, sync::Arc, time::Duration};

use hub_api::error::HubApiError;
use tokio::time::Instant;

/// Identifies a cached request: the endpoint plus any path params.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum RequestKey {
    Info,
    Channels,
    OnchainBalance,
    Apps,
    App(String),
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => f.write_str("/api/info"),
            Self::Channels => f.write_str("/api/channels"),
            Self::OnchainBalance => f.write_str("/api/wallet/balance"),
            Self::Apps => f.write_str("/api/apps"),
            Self::App(pubkey) => write!(f, "/api/apps/{pubkey}"),
        }
    }
}

/// A cached value together with the generation it belongs to.
#[derive(Debug)]
pub struct Cached<T> {
    pub data: Arc<T>,
    pub generation: u64,
    pub last_fetched: Instant,
}

impl<T> Clone for Cached<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            generation: self.generation,
            last_fetched: self.last_fetched,
        }
    }
}

#[derive(Default)]
struct CacheEntry {
    data: Option<Arc<dyn Any + Send + Sync>>,
    error: Option<HubApiError>,
    last_fetched: Option<Instant>,
    generation: u64,
    invalidated: bool,
}

pub struct RequestCache {
    entries: HashMap<RequestKey, CacheEntry>,
    max_age: Duration,
    /// The last generation handed out. Shared by all keys.
    last_generation: u64,
}

impl RequestCache {
    /// Entries older than `max_age` are refetched on the next read. A zero
    /// `max_age` refetches on every read.
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            max_age,
            last_generation: 0,
        }
    }

    #[inline]
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// The last successfully fetched data, fresh or not. `None` if the
    /// request never succeeded or `T` is the wrong type for this key.
    pub fn get<T: Any + Send + Sync>(
        &self,
        key: &RequestKey,
    ) -> Option<Cached<T>> {
        let entry = self.entries.get(key)?;
        let data = entry.data.clone()?.downcast::<T>().ok()?;
        Some(Cached {
            data,
            generation: entry.generation,
            last_fetched: entry.last_fetched?,
        })
    }

    /// Like [`Self::get`], but only if the entry is fresh at `now`.
    pub fn get_fresh<T: Any + Send + Sync>(
        &self,
        key: &RequestKey,
        now: Instant,
    ) -> Option<Cached<T>> {
        if self.is_fresh(key, now) {
            self.get(key)
        } else {
            None
        }
    }

    /// An entry is fresh if it holds data that hasn't been invalidated and
    /// isn't older than `max_age`.
    pub fn is_fresh(&self, key: &RequestKey, now: Instant) -> bool {
        let Some(entry) = self.entries.get(key) else {
            return false;
        };
        let Some(last_fetched) = entry.last_fetched else {
            return false;
        };
        entry.data.is_some()
            && !entry.invalidated
            && now.saturating_duration_since(last_fetched) < self.max_age
    }

    /// Record a successful fetch. Replaces the data, clears any error and
    /// assigns a new generation.
    pub fn store<T: Any + Send + Sync>(
        &mut self,
        key: RequestKey,
        data: T,
        now: Instant,
    ) -> Cached<T> {
        self.last_generation += 1;
        let generation = self.last_generation;
        let data = Arc::new(data);

        let entry = self.entries.entry(key).or_default();
        entry.data = Some(data.clone());
        entry.error = None;
        entry.last_fetched = Some(now);
        entry.generation = generation;
        entry.invalidated = false;

        Cached {
            data,
            generation,
            last_fetched: now,
        }
    }

    /// Record a failed fetch. The previous data (if any) is kept.
    pub fn record_error(&mut self, key: RequestKey, error: HubApiError) {
        self.entries.entry(key).or_default().error = Some(error);
    }

    /// The error from the latest fetch, if it failed.
    pub fn error(&self, key: &RequestKey) -> Option<&HubApiError> {
        self.entries.get(key)?.error.as_ref()
    }

    /// The generation of the current data for `key`, or 0 if it was never
    /// fetched successfully.
    pub fn generation(&self, key: &RequestKey) -> u64 {
        self.entries.get(key).map(|e| e.generation).unwrap_or(0)
    }

    /// Mark `key` stale so the next read refetches it. The old data stays
    /// readable until then.
    pub fn invalidate(&mut self, key: &RequestKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.invalidated = true;
        }
    }

    /// Drop `key` entirely, e.g. after the resource was deleted.
    pub fn remove(&mut self, key: &RequestKey) {
        self.entries.remove(key);
    }

    pub fn invalidate_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.invalidated = true;
        }
    }
}

#[cfg(test)]
mod test {
    use hub_api::error::HubErrorKind;

    use super::*;

    const MAX_AGE: Duration = Duration::from_secs(30);

    #[test]
    fn store_bumps_generation() {
        let now = Instant::now();
        let mut cache = RequestCache::new(MAX_AGE);
        assert_eq!(cache.generation(&RequestKey::Channels), 0);
        assert!(cache.get::<Vec<u32>>(&RequestKey::Channels).is_none());

        let first = cache.store(RequestKey::Channels, vec![1_u32], now);
        let other = cache.store(RequestKey::Info, "info", now);
        let second = cache.store(RequestKey::Channels, vec![1_u32], now);

        // Generations identify fetches, not contents, and never repeat
        // across keys.
        assert!(first.generation < other.generation);
        assert!(other.generation < second.generation);
        assert_eq!(cache.generation(&RequestKey::Channels), second.generation);

        // The first snapshot is untouched by the refetch.
        assert_eq!(*first.data, vec![1]);
        assert!(!Arc::ptr_eq(&first.data, &second.data));
    }

    #[test]
    fn wrong_type_is_a_miss() {
        let mut cache = RequestCache::new(MAX_AGE);
        cache.store(RequestKey::Apps, vec!["app"], Instant::now());
        assert!(cache.get::<String>(&RequestKey::Apps).is_none());
        assert!(cache.get::<Vec<&'static str>>(&RequestKey::Apps).is_some());
    }

    #[test]
    fn errors_keep_previous_data() {
        let now = Instant::now();
        let mut cache = RequestCache::new(MAX_AGE);
        let stored = cache.store(RequestKey::OnchainBalance, 42_u64, now);

        let error = HubApiError::new(HubErrorKind::Unavailable, "down");
        cache.record_error(RequestKey::OnchainBalance, error.clone());

        let cached = cache.get::<u64>(&RequestKey::OnchainBalance).unwrap();
        assert_eq!(*cached.data, 42);
        assert_eq!(cached.generation, stored.generation);
        assert_eq!(cache.error(&RequestKey::OnchainBalance), Some(&error));

        // The next success clears the error.
        cache.store(RequestKey::OnchainBalance, 43_u64, now);
        assert!(cache.error(&RequestKey::OnchainBalance).is_none());
    }

    #[test]
    fn freshness() {
        let now = Instant::now();
        let mut cache = RequestCache::new(MAX_AGE);
        let key = RequestKey::App("abcd".to_owned());
        assert!(!cache.is_fresh(&key, now));

        cache.store(key.clone(), 1_u8, now);
        assert!(cache.is_fresh(&key, now));
        assert!(cache.is_fresh(&key, now + MAX_AGE / 2));
        assert!(!cache.is_fresh(&key, now + MAX_AGE));

        cache.invalidate(&key);
        assert!(!cache.is_fresh(&key, now));
        assert!(cache.get_fresh::<u8>(&key, now).is_none());
        // Stale data is still readable.
        assert_eq!(*cache.get::<u8>(&key).unwrap().data, 1);

        cache.store(key.clone(), 2_u8, now);
        assert!(cache.is_fresh(&key, now));

        cache.invalidate_all();
        assert!(!cache.is_fresh(&key, now));

        cache.remove(&key);
        assert!(cache.get::<u8>(&key).is_none());
    }

    #[test]
    fn zero_max_age_is_never_fresh() {
        let now = Instant::now();
        let mut cache = RequestCache::new(Duration::ZERO);
        cache.store(RequestKey::Info, (), now);
        assert!(!cache.is_fresh(&RequestKey::Info, now));
    }

    #[test]
    fn key_paths() {
        assert_eq!(RequestKey::Channels.to_string(), "/api/channels");
        assert_eq!(
            RequestKey::App("npub".to_owned()).to_string(),
            "/api/apps/npub"
        );
    }
}
