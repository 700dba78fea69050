//! Exact-match memoization of normalized tool output.
//!
//! Entries are keyed by the tool name and the raw argument string exactly as
//! received. Two payloads that decode to the same arguments but differ in
//! whitespace or key order are separate entries; nothing is normalized
//! before lookup.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

/// Storage backend for cached results.
pub trait CacheStore: Send {
    /// Returns the stored output for `(tool, raw)`.
    fn get(&self, tool: &str, raw: &str) -> Option<Value>;

    /// Stores `output` under `(tool, raw)`, replacing any previous entry.
    fn put(&mut self, tool: &str, raw: &str, output: Value);

    /// Number of stored entries.
    fn len(&self) -> usize;

    /// Whether the store holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry.
    fn clear(&mut self);
}

/// In-process store backed by a nested hash map.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: HashMap<String, HashMap<String, Value>>,
}

impl MemoryCacheStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, tool: &str, raw: &str) -> Option<Value> {
        self.entries.get(tool)?.get(raw).cloned()
    }

    fn put(&mut self, tool: &str, raw: &str, output: Value) {
        self.entries
            .entry(tool.to_owned())
            .or_default()
            .insert(raw.to_owned(), output);
    }

    fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// Caching is turned off; nothing was consulted.
    Disabled,
    /// A stored output exists for the key.
    Hit(Value),
    /// No stored output exists for the key.
    Miss,
}

/// Engine-owned cache wrapping a [`CacheStore`].
pub struct ResultCache {
    enabled: bool,
    store: Box<dyn CacheStore>,
    hits: u64,
    misses: u64,
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("enabled", &self.enabled)
            .field("entries", &self.store.len())
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}

impl ResultCache {
    /// Creates a cache over the supplied store.
    #[must_use]
    pub fn new(enabled: bool, store: Box<dyn CacheStore>) -> Self {
        Self {
            enabled,
            store,
            hits: 0,
            misses: 0,
        }
    }

    /// Creates an in-memory cache.
    #[must_use]
    pub fn in_memory(enabled: bool) -> Self {
        Self::new(enabled, Box::new(MemoryCacheStore::new()))
    }

    /// Looks up the output stored for `(tool, raw)`.
    pub fn lookup(&mut self, tool: &str, raw: &str) -> CacheLookup {
        if !self.enabled {
            return CacheLookup::Disabled;
        }
        match self.store.get(tool, raw) {
            Some(output) => {
                self.hits += 1;
                CacheLookup::Hit(output)
            }
            None => {
                self.misses += 1;
                CacheLookup::Miss
            }
        }
    }

    /// Stores a normalized output. Returns `false` when caching is disabled.
    pub fn store(&mut self, tool: &str, raw: &str, output: Value) -> bool {
        if !self.enabled {
            return false;
        }
        self.store.put(tool, raw, output);
        true
    }

    /// Whether caching is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Lookups that found an entry.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that found nothing.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Removes every entry and resets the counters.
    pub fn clear(&mut self) {
        self.store.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn hit_after_store() {
        let mut cache = ResultCache::in_memory(true);
        assert_eq!(cache.lookup("echo", r#"{"x":1}"#), CacheLookup::Miss);
        assert!(cache.store("echo", r#"{"x":1}"#, json!({"x": 1})));
        assert_eq!(cache.lookup("echo", r#"{"x":1}"#), CacheLookup::Hit(json!({"x": 1})));
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
    }

    #[test]
    fn keys_are_exact_strings() {
        let mut cache = ResultCache::in_memory(true);
        cache.store("echo", r#"{"x":1}"#, json!(1));
        assert_eq!(cache.lookup("echo", r#"{ "x":1 }"#), CacheLookup::Miss);
        assert_eq!(cache.lookup("other", r#"{"x":1}"#), CacheLookup::Miss);
        cache.store("echo", r#"{ "x":1 }"#, json!(2));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn disabled_cache_never_hits_or_stores() {
        let mut cache = ResultCache::in_memory(false);
        assert!(!cache.store("echo", "{}", json!(1)));
        assert_eq!(cache.lookup("echo", "{}"), CacheLookup::Disabled);
        assert!(cache.is_empty());
        assert_eq!(cache.misses(), 0);
    }

    #[test]
    fn clear_resets_entries_and_counters() {
        let mut cache = ResultCache::in_memory(true);
        cache.store("echo", "{}", json!(1));
        let _ = cache.lookup("echo", "{}");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.hits(), 0);
    }
}
