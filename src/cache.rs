//! Identity resolution cache.
//!
//! Memoizes resolver lookups within one transaction. Keys are BLAKE3 digests
//! of a canonical encoding of the request: labels are deduplicated and
//! sorted, properties are sorted by key, and every field is length-prefixed,
//! so two requests differing only in iteration order share one entry.
//!
//! Entries never outlive the transaction that produced them; the coordinator
//! clears every cache on commit and rollback.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use blake3::Hasher;

use crate::value::{NodeId, Properties, Value};

/// Default maximum number of entries per cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 100_000;

const NODE_KEY: u8 = 1;
const EXTERNAL_ID_KEY: u8 = 2;

/// Order-independent composite key of a resolver request.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Key of a node lookup by labels and (normalized) properties.
    #[must_use]
    pub fn node<S: AsRef<str>>(labels: impl IntoIterator<Item = S>, properties: &Properties) -> Self {
        let labels: BTreeSet<String> = labels.into_iter().map(|l| l.as_ref().to_string()).collect();

        let mut h = Hasher::new();
        h.update(&[NODE_KEY]);
        write_len(&mut h, labels.len());
        for label in &labels {
            write_str(&mut h, label);
        }
        write_len(&mut h, properties.len());
        for (k, v) in properties {
            write_str(&mut h, k);
            write_value(&mut h, v);
        }
        Self(*h.finalize().as_bytes())
    }

    /// Key of an external-id lookup.
    #[must_use]
    pub fn external_id(id_type: &str, id: &Value) -> Self {
        let mut h = Hasher::new();
        h.update(&[EXTERNAL_ID_KEY]);
        write_str(&mut h, id_type);
        write_value(&mut h, id);
        Self(*h.finalize().as_bytes())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey(")?;
        for b in &self.0[..8] {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

fn write_len(h: &mut Hasher, len: usize) {
    h.update(&(len as u64).to_le_bytes());
}

fn write_str(h: &mut Hasher, s: &str) {
    write_len(h, s.len());
    h.update(s.as_bytes());
}

fn write_value(h: &mut Hasher, v: &Value) {
    match v {
        Value::Int(i) => {
            h.update(&[0]);
            h.update(&i.to_le_bytes());
        }
        Value::Float(f) => {
            h.update(&[1]);
            h.update(&f.to_bits().to_le_bytes());
        }
        Value::String(s) => {
            h.update(&[2]);
            write_str(h, s);
        }
        Value::Timestamp(t) => {
            h.update(&[3]);
            h.update(&t.timestamp().to_le_bytes());
            h.update(&t.timestamp_subsec_nanos().to_le_bytes());
        }
    }
}

/// Hit/miss counters of a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that had to go to the store.
    pub misses: u64,
    /// Entries currently held.
    pub entries: usize,
}

/// Bounded map from request key to resolved node, or to "not found".
///
/// When full, the cache is cleared before the next insert.
#[derive(Debug)]
pub struct IdentityCache {
    entries: HashMap<CacheKey, Option<NodeId>>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl IdentityCache {
    /// Creates an empty cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
        }
    }

    /// Looks up `key`. The outer `Option` is the cache hit; the inner one is
    /// the cached resolution result.
    pub fn get(&mut self, key: &CacheKey) -> Option<Option<NodeId>> {
        let found = self.entries.get(key).copied();
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    /// Records a resolution result.
    pub fn insert(&mut self, key: CacheKey, value: Option<NodeId>) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            // Keep the cache bounded to avoid unbounded memory usage.
            self.entries.clear();
        }
        self.entries.insert(key, value);
    }

    /// Drops every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::properties;

    #[test]
    fn test_node_key_ignores_label_order_and_duplicates() {
        let p = properties([("asn", 65000)]);
        assert_eq!(CacheKey::node(["AS", "FOO"], &p), CacheKey::node(["FOO", "AS", "AS"], &p));
    }

    #[test]
    fn test_node_key_distinguishes_values_and_types() {
        let a = CacheKey::node(["AS"], &properties([("asn", Value::from(1))]));
        let b = CacheKey::node(["AS"], &properties([("asn", Value::from("1"))]));
        let c = CacheKey::node(["AS"], &properties([("asn", Value::from(2))]));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_length_prefix_prevents_concatenation_collisions() {
        let a = CacheKey::node(["AB", "C"], &Properties::new());
        let b = CacheKey::node(["A", "BC"], &Properties::new());
        assert_ne!(a, b);
    }

    #[test]
    fn test_external_id_key_differs_from_node_key() {
        let id = Value::from(42);
        let ext = CacheKey::external_id("PEERINGDB_ORG_ID", &id);
        let node = CacheKey::node(["PEERINGDB_ORG_ID"], &properties([("id", id)]));
        assert_ne!(ext, node);
    }

    #[test]
    fn test_hit_miss_counters() {
        let mut cache = IdentityCache::new(10);
        let key = CacheKey::external_id("X", &Value::from(1));
        assert_eq!(cache.get(&key), None);
        cache.insert(key, None);
        assert_eq!(cache.get(&key), Some(None));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn test_capacity_bound_clears() {
        let mut cache = IdentityCache::new(2);
        for i in 0..3 {
            cache.insert(CacheKey::external_id("X", &Value::from(i)), Some(NodeId::new(i64::from(i))));
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut cache = IdentityCache::default();
        cache.insert(CacheKey::external_id("X", &Value::from(1)), Some(NodeId::new(1)));
        cache.clear();
        assert!(cache.is_empty());
    }
}
