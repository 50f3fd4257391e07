use std::{collections::HashMap, sync::Mutex, time::Duration};

use tokio::time::Instant;

/// Default time-to-live when none is given.
pub const DEFAULT_TTL: Duration = Duration::from_millis(60_000);

/// Expiry used when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Freshness of one cached entry, for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheInfo {
    pub expired: bool,
    pub remaining_ms: u64,
    /// `remaining_ms` rounded up to whole seconds.
    pub remaining_secs: u64,
}

/// Key/value store where every entry expires a fixed TTL after it was written.
///
/// Expired entries are removed lazily: a read that finds one returns `None`
/// and drops it. Nothing sweeps in the background.
#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<V> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        let now = Instant::now();
        let entry = CacheEntry {
            value,
            expires_at: now.checked_add(self.ttl).unwrap_or(now + FAR_FUTURE),
        };
        self.lock().insert(key.into(), entry);
    }

    /// Same as `get(key).is_some()`, so it evicts an expired entry too.
    pub fn has(&self, key: &str) -> bool
    where
        V: Clone,
    {
        self.get(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Entry count, expired-but-unread entries included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remaining lifetime of `key`. Does not evict.
    pub fn cache_info(&self, key: &str) -> Option<CacheInfo> {
        let entries = self.lock();
        let entry = entries.get(key)?;

        let remaining = entry.expires_at.saturating_duration_since(Instant::now());
        let remaining_ms = remaining.as_millis() as u64;

        Some(CacheInfo {
            expired: remaining.is_zero(),
            remaining_ms,
            remaining_secs: remaining_ms.div_ceil(1000),
        })
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.lock();

        let expired = entries.get(key)?.expires_at <= Instant::now();
        if expired {
            entries.remove(key);
            tracing::debug!(key, "evicted expired cache entry");
            return None;
        }

        entries.get(key).map(|e| e.value.clone())
    }
}
