//! Bounded key/value store with per-entry expiry and least-recently-used eviction.
//!
//! [`TtlCache`] is the single-owner store; [`SharedCache`] puts it behind a mutex
//! so concurrent evaluators can share lookups, and owns the optional background
//! sweep that drops expired entries nobody reads again.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

// expiry used when `now + ttl` is not representable
const FAR_EXPIRY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

use crate::config::CacheConfig;

/// Time source for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        self.origin + offset
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry<K, V> {
    pub key: K,
    pub value: V,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl<K, V> CacheEntry<K, V> {
    /// Entries are dead from their expiry instant onward.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub evictions: u64,
    pub size: usize,
    pub capacity: usize,
}

struct Slot<K, V> {
    entry: CacheEntry<K, V>,
    tick: u64,
}

pub struct TtlCache<K, V> {
    capacity: usize,
    entries: HashMap<K, Slot<K, V>>,
    // tick -> key, oldest tick first
    recency: BTreeMap<u64, K>,
    next_tick: u64,
    clock: Arc<dyn Clock>,
    stats: CacheStats,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            next_tick: 0,
            clock,
            stats: CacheStats {
                capacity,
                ..CacheStats::default()
            },
        }
    }

    /// Store `value` until `now + ttl` as the most recently used entry.
    ///
    /// Returns the key evicted to make room, if any.
    pub fn set(&mut self, key: K, value: V, ttl: Duration) -> Option<K> {
        let now = self.clock.now();
        let tick = self.bump();
        let entry = CacheEntry {
            key: key.clone(),
            value,
            created_at: now,
            expires_at: expires_after(now, ttl),
        };

        if let Some(slot) = self.entries.get_mut(&key) {
            self.recency.remove(&slot.tick);
            slot.entry = entry;
            slot.tick = tick;
            self.recency.insert(tick, key);
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.evict_least_recent()
        } else {
            None
        };

        self.recency.insert(tick, key.clone());
        self.entries.insert(key, Slot { entry, tick });
        evicted
    }

    /// Fetch a live value and mark it most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        let tick = self.bump();

        let expired = match self.entries.get(key) {
            None => {
                self.stats.misses += 1;
                return None;
            }
            Some(slot) => slot.entry.is_expired(now),
        };

        if expired {
            self.remove_entry(key);
            self.stats.expirations += 1;
            self.stats.misses += 1;
            return None;
        }

        let slot = self.entries.get_mut(key)?;
        self.recency.remove(&slot.tick);
        slot.tick = tick;
        self.recency.insert(tick, slot.entry.key.clone());
        self.stats.hits += 1;
        Some(slot.entry.value.clone())
    }

    /// Whether a live entry exists; does not refresh recency.
    pub fn has<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        let expired = match self.entries.get(key) {
            None => return false,
            Some(slot) => slot.entry.is_expired(now),
        };
        if expired {
            self.remove_entry(key);
            self.stats.expirations += 1;
        }
        !expired
    }

    pub fn delete<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn cleanup(&mut self) -> usize {
        let now = self.clock.now();
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove_entry(key);
        }
        self.stats.expirations += expired.len() as u64;
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            ..self.stats
        }
    }

    /// Keys from least to most recently used.
    pub fn keys_by_recency(&self) -> Vec<K> {
        self.recency.values().cloned().collect()
    }

    fn bump(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    fn evict_least_recent(&mut self) -> Option<K> {
        let (_, key) = self.recency.pop_first()?;
        self.entries.remove(&key);
        self.stats.evictions += 1;
        Some(key)
    }

    fn remove_entry<Q>(&mut self, key: &Q) -> Option<CacheEntry<K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.entries.remove(key)?;
        self.recency.remove(&slot.tick);
        Some(slot.entry)
    }
}

/// Thread-safe handle over a [`TtlCache`] with a fixed default TTL.
pub struct SharedCache<V> {
    inner: Arc<Mutex<TtlCache<String, V>>>,
    ttl: Duration,
}

impl<V> Clone for SharedCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            ttl: self.ttl,
        }
    }
}

impl<V> SharedCache<V>
where
    V: Clone + Send + 'static,
{
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TtlCache::with_clock(config.capacity, clock))),
            ttl: config.ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let value = self.lock().get(key);
        debug!(key, hit = value.is_some(), "lookup cache read");
        value
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.ttl);
    }

    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        if let Some(evicted) = self.lock().set(key.into(), value, ttl) {
            debug!(key = %evicted, "lookup cache evicted least recently used entry");
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.lock().has(key)
    }

    pub fn delete(&self, key: &str) -> bool {
        self.lock().delete(key)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn cleanup(&self) -> usize {
        self.lock().cleanup()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats()
    }

    /// Spawn a periodic sweep on the current tokio runtime.
    ///
    /// The task holds only a weak reference and exits once every handle to the
    /// cache is dropped, or when the returned [`SweepHandle`] is stopped or dropped.
    pub fn start_sweeper(&self, interval: Duration) -> SweepHandle {
        let interval = if interval.is_zero() {
            warn!(
                fallback_secs = MIN_SWEEP_INTERVAL.as_secs(),
                "zero cache sweep interval replaced with the minimum"
            );
            MIN_SWEEP_INTERVAL
        } else {
            interval
        };
        let weak: Weak<Mutex<TtlCache<String, V>>> = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let removed = inner.lock().unwrap_or_else(PoisonError::into_inner).cleanup();
                if removed > 0 {
                    debug!(removed, "lookup cache sweep dropped expired entries");
                }
            }
        });
        SweepHandle { task: Some(task) }
    }

    fn lock(&self) -> MutexGuard<'_, TtlCache<String, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn expires_after(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl)
        .or_else(|| now.checked_add(FAR_EXPIRY))
        .unwrap_or(now)
}

/// Lifecycle handle for the background sweep.
#[derive(Debug)]
pub struct SweepHandle {
    task: Option<JoinHandle<()>>,
}

impl SweepHandle {
    pub fn stop(mut self) {
        self.abort();
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> (TtlCache<String, u32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (TtlCache::with_clock(capacity, clock.clone()), clock)
    }

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn get_returns_value_until_ttl_elapses() {
        let (mut cache, clock) = cache(4);
        cache.set("a".to_string(), 1, MINUTE);
        assert_eq!(cache.get("a"), Some(1));

        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get("a"), Some(1));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("a"), None, "entry must be gone at its expiry instant");
        assert!(cache.is_empty());
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn overflow_evicts_exactly_the_least_recently_used_key() {
        let (mut cache, _clock) = cache(3);
        for (index, key) in ["a", "b", "c"].into_iter().enumerate() {
            cache.set(key.to_string(), index as u32, MINUTE);
        }

        // reading "a" makes "b" the oldest
        assert_eq!(cache.get("a"), Some(0));
        let evicted = cache.set("d".to_string(), 3, MINUTE);

        assert_eq!(evicted.as_deref(), Some("b"));
        assert_eq!(cache.len(), 3);
        assert!(!cache.has("b"));
        assert!(cache.has("a") && cache.has("c") && cache.has("d"));
        assert_eq!(cache.keys_by_recency(), vec!["c", "a", "d"]);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn overwriting_an_existing_key_never_evicts() {
        let (mut cache, _clock) = cache(2);
        cache.set("a".to_string(), 1, MINUTE);
        cache.set("b".to_string(), 2, MINUTE);
        assert_eq!(cache.set("a".to_string(), 10, MINUTE), None);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn overwrite_resets_expiry() {
        let (mut cache, clock) = cache(2);
        cache.set("a".to_string(), 1, MINUTE);
        clock.advance(Duration::from_secs(50));
        cache.set("a".to_string(), 2, MINUTE);
        clock.advance(Duration::from_secs(50));
        assert_eq!(cache.get("a"), Some(2));
    }

    #[test]
    fn cleanup_removes_expired_entries_without_reads() {
        let (mut cache, clock) = cache(10);
        cache.set("short".to_string(), 1, Duration::from_secs(5));
        cache.set("long".to_string(), 2, Duration::from_secs(500));

        clock.advance(Duration::from_secs(10));
        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.keys_by_recency(), vec!["long"]);
    }

    #[test]
    fn has_respects_expiry() {
        let (mut cache, clock) = cache(2);
        cache.set("a".to_string(), 1, Duration::from_secs(1));
        assert!(cache.has("a"));
        clock.advance(Duration::from_secs(1));
        assert!(!cache.has("a"));
    }

    #[test]
    fn expired_entries_are_never_returned_under_mixed_access() {
        let (mut cache, clock) = cache(3);
        let keys = ["a", "b", "c", "d", "e"];
        for step in 0..40u32 {
            let key = keys[(step as usize * 7) % keys.len()];
            if step % 3 == 0 {
                cache.set(key.to_string(), step, Duration::from_secs(u64::from(step % 4) + 1));
            } else {
                let _ = cache.get(key);
            }
            clock.advance(Duration::from_millis(700));

            let now = clock.now();
            for key in keys {
                let live = cache
                    .entries
                    .get(key)
                    .map(|slot| !slot.entry.is_expired(now));
                if live == Some(false) {
                    assert_eq!(cache.get(key), None);
                }
            }
            assert!(cache.len() <= 3);
            assert_eq!(cache.recency.len(), cache.entries.len());
        }
    }

    #[test]
    fn delete_and_clear_pass_through() {
        let (mut cache, _clock) = cache(3);
        cache.set("a".to_string(), 1, MINUTE);
        cache.set("b".to_string(), 2, MINUTE);
        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.keys_by_recency().is_empty());
    }

    #[test]
    fn unrepresentable_ttl_saturates_instead_of_overflowing() {
        let (mut cache, clock) = cache(2);
        cache.set("a".to_string(), 1, Duration::from_secs(u64::MAX));

        clock.advance(Duration::from_secs(10 * 365 * 24 * 60 * 60));
        assert_eq!(cache.get("a"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_sweep_interval_falls_back_to_the_minimum() {
        let shared: SharedCache<u32> = SharedCache::new(&CacheConfig::default());
        let handle = shared.start_sweeper(Duration::ZERO);

        tokio::time::sleep(Duration::from_secs(3)).await;
        tokio::task::yield_now().await;

        assert!(handle.is_running());
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_drops_expired_entries_in_the_background() {
        let config = CacheConfig {
            capacity: 10,
            ttl: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(60),
        };
        let clock = Arc::new(ManualClock::new());
        let shared: SharedCache<u32> = SharedCache::with_clock(&config, clock.clone());
        shared.set("a", 1);

        let handle = shared.start_sweeper(config.sweep_interval);
        assert!(handle.is_running());

        clock.advance(Duration::from_secs(31));
        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        assert!(shared.is_empty());
        handle.stop();
    }
}
