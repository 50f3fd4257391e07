use std::{collections::HashMap, sync::Mutex};

use chrono::{DateTime, Utc};

/// Last validator seen for a URL together with the payload it validated.
#[derive(Debug, Clone)]
pub struct EtagEntry<V> {
    pub validator: String,
    pub payload: V,
    pub stored_at: DateTime<Utc>,
}

/// Validator store for conditional GETs, keyed by the full request URL.
///
/// No TTL: an entry stays until it is overwritten or [`EtagCache::clear`] runs.
/// A URL with no entry must be requested unconditionally.
#[derive(Debug)]
pub struct EtagCache<V> {
    entries: Mutex<HashMap<String, EtagEntry<V>>>,
}

impl<V> Default for EtagCache<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> EtagCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, EtagEntry<V>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set(&self, url: impl Into<String>, etag: impl Into<String>, data: V) {
        let entry = EtagEntry {
            validator: etag.into(),
            payload: data,
            stored_at: Utc::now(),
        };
        self.lock().insert(url.into(), entry);
    }

    pub fn get_etag(&self, url: &str) -> Option<String> {
        self.lock().get(url).map(|e| e.validator.clone())
    }

    pub fn has(&self, url: &str) -> bool {
        self.lock().contains_key(url)
    }

    pub fn stored_at(&self, url: &str) -> Option<DateTime<Utc>> {
        self.lock().get(url).map(|e| e.stored_at)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<V: Clone> EtagCache<V> {
    pub fn get_data(&self, url: &str) -> Option<V> {
        self.lock().get(url).map(|e| e.payload.clone())
    }
}
