use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use super::Clock;

struct Entry<V> {
    fetched_at: Instant,
    value: Arc<V>,
}

/// Per-key time-to-live cache over an async fetch.
///
/// Each key expires independently. A read within the key's TTL returns the
/// stored snapshot; otherwise the fetch runs and its result replaces the
/// entry. Timestamp and value are stored together, so a reader never sees one
/// without the other. Access is `&mut`, so refetches for one cache are
/// never concurrent.
pub struct TtlCache<K, V> {
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
    ttls: HashMap<K, Duration>,
    entries: HashMap<K, Entry<V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Copy + Debug,
{
    pub fn new(default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            default_ttl,
            ttls: HashMap::new(),
            entries: HashMap::new(),
        }
    }

    /// Override the TTL for one key.
    pub fn with_ttl(mut self, key: K, ttl: Duration) -> Self {
        self.ttls.insert(key, ttl);
        self
    }

    pub fn ttl(&self, key: &K) -> Duration {
        self.ttls.get(key).copied().unwrap_or(self.default_ttl)
    }

    /// Return the cached value for `key`, running `fetch` if there is none or
    /// it is at least one TTL old. An expired entry is dropped before the
    /// fetch, so a failed fetch leaves the key uncached.
    pub async fn read<F, Fut, E>(&mut self, key: K, fetch: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let now = self.clock.now();
        if let Some(entry) = self.entries.get(&key) {
            if now.saturating_duration_since(entry.fetched_at) < self.ttl(&key) {
                tracing::debug!(?key, "cache hit");
                return Ok(Arc::clone(&entry.value));
            }
            self.invalidate(&key);
        }

        tracing::debug!(?key, "cache miss");
        let value = Arc::new(fetch().await?);
        self.entries.insert(
            key,
            Entry {
                fetched_at: now,
                value: Arc::clone(&value),
            },
        );
        Ok(value)
    }

    /// Drop the stored value so the next read refetches.
    pub fn invalidate(&mut self, key: &K) {
        self.entries.remove(key);
    }

    #[cfg(test)]
    pub fn is_cached(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::manual::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Key {
        Status,
        Peers,
    }

    async fn fetch(calls: &AtomicUsize) -> Result<usize, String> {
        Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn fail() -> Result<usize, String> {
        Err("channel closed".to_string())
    }

    fn cache(clock: &Arc<ManualClock>) -> TtlCache<Key, usize> {
        TtlCache::new(Duration::from_secs(5), clock.clone())
    }

    #[tokio::test]
    async fn test_reads_within_ttl_fetch_once() {
        let clock = Arc::new(ManualClock::new());
        let mut cache = cache(&clock);
        let calls = AtomicUsize::new(0);

        let first = cache.read(Key::Status, || fetch(&calls)).await.unwrap();
        clock.advance(Duration::from_millis(4999));
        let second = cache.read(Key::Status, || fetch(&calls)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second), "Same snapshot within TTL");
    }

    #[tokio::test]
    async fn test_read_at_ttl_refetches() {
        let clock = Arc::new(ManualClock::new());
        let mut cache = cache(&clock);
        let calls = AtomicUsize::new(0);

        cache.read(Key::Status, || fetch(&calls)).await.unwrap();
        clock.advance(Duration::from_secs(5));
        let value = cache.read(Key::Status, || fetch(&calls)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*value, 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let clock = Arc::new(ManualClock::new());
        let mut cache = cache(&clock);
        let calls = AtomicUsize::new(0);

        cache.read(Key::Status, || fetch(&calls)).await.unwrap();
        cache.invalidate(&Key::Status);
        assert!(!cache.is_cached(&Key::Status));
        cache.read(Key::Status, || fetch(&calls)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_keys_expire_independently() {
        let clock = Arc::new(ManualClock::new());
        let mut cache = cache(&clock).with_ttl(Key::Peers, Duration::from_secs(1));
        let status_calls = AtomicUsize::new(0);
        let peer_calls = AtomicUsize::new(0);

        cache.read(Key::Status, || fetch(&status_calls)).await.unwrap();
        cache.read(Key::Peers, || fetch(&peer_calls)).await.unwrap();
        clock.advance(Duration::from_secs(2));
        cache.read(Key::Status, || fetch(&status_calls)).await.unwrap();
        cache.read(Key::Peers, || fetch(&peer_calls)).await.unwrap();

        assert_eq!(cache.ttl(&Key::Status), Duration::from_secs(5));
        assert_eq!(status_calls.load(Ordering::SeqCst), 1);
        assert_eq!(peer_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_refetch_drops_expired_entry() {
        let clock = Arc::new(ManualClock::new());
        let mut cache = cache(&clock);
        let calls = AtomicUsize::new(0);

        cache.read(Key::Status, || fetch(&calls)).await.unwrap();
        clock.advance(Duration::from_secs(6));
        let err = cache.read(Key::Status, fail).await.unwrap_err();

        assert_eq!(err, "channel closed");
        assert!(!cache.is_cached(&Key::Status));
        let value = cache.read(Key::Status, || fetch(&calls)).await.unwrap();
        assert_eq!(*value, 2);
    }

    #[tokio::test]
    async fn test_failed_first_fetch_caches_nothing() {
        let clock = Arc::new(ManualClock::new());
        let mut cache = cache(&clock);

        assert!(cache.read(Key::Peers, fail).await.is_err());
        assert!(!cache.is_cached(&Key::Peers));
    }
}
