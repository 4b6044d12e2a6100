//! Translation key lookup over nested per-locale catalogs.
//!
//! Keys are dot paths ("dashboard.streak.title") resolved against a nested
//! JSON catalog. A missing path returns the key itself, which is how
//! untranslated strings stay visible in the UI. Resolved strings are
//! memoized in a bounded cache owned by the translator instance.

use std::collections::{HashMap, VecDeque};

use serde_json::Value;

const DEFAULT_CACHE_ENTRIES: usize = 1024;

pub struct Translator {
    catalogs: HashMap<String, Value>,
    cache: BoundedCache,
}

impl Translator {
    pub fn new() -> Self {
        Self::with_cache_size(DEFAULT_CACHE_ENTRIES)
    }

    pub fn with_cache_size(max_entries: usize) -> Self {
        Self {
            catalogs: HashMap::new(),
            cache: BoundedCache::new(max_entries),
        }
    }

    /// Register the catalog for a locale, replacing any existing one.
    pub fn add_locale(&mut self, locale: impl Into<String>, catalog: Value) {
        let locale = locale.into();
        self.cache.invalidate_locale(&locale);
        self.catalogs.insert(locale, catalog);
    }

    /// Resolve a dot-path key for a locale. Returns the key itself when
    /// the locale is unknown, the path is absent, or the leaf is not a
    /// string.
    pub fn translate(&mut self, locale: &str, key: &str) -> String {
        if let Some(hit) = self.cache.get(locale, key) {
            return hit;
        }
        match self.lookup(locale, key) {
            Some(text) => {
                self.cache.insert(locale, key, text.clone());
                text
            }
            None => key.to_string(),
        }
    }

    fn lookup(&self, locale: &str, key: &str) -> Option<String> {
        let mut node = self.catalogs.get(locale)?;
        for segment in key.split('.') {
            node = node.as_object()?.get(segment)?;
        }
        node.as_str().map(|s| s.to_string())
    }

    #[cfg(test)]
    fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

/// Insertion-order bounded cache keyed by (locale, key).
struct BoundedCache {
    max_entries: usize,
    entries: HashMap<(String, String), String>,
    order: VecDeque<(String, String)>,
}

impl BoundedCache {
    fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, locale: &str, key: &str) -> Option<String> {
        self.entries
            .get(&(locale.to_string(), key.to_string()))
            .cloned()
    }

    fn insert(&mut self, locale: &str, key: &str, text: String) {
        if self.max_entries == 0 {
            return;
        }
        let cache_key = (locale.to_string(), key.to_string());
        if self.entries.insert(cache_key.clone(), text).is_none() {
            self.order.push_back(cache_key);
        }
        while self.entries.len() > self.max_entries {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    fn invalidate_locale(&mut self, locale: &str) {
        self.entries.retain(|(l, _), _| l != locale);
        self.order.retain(|(l, _)| l != locale);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
