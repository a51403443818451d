//! Keyed response store with per-entry expiry.
//!
//! The controller only talks to the [`CacheStore`] trait, so the store is an
//! injected collaborator. [`MemoryCache`] is the default process-local
//! implementation: a concurrent map whose entries expire lazily on read.

use std::fmt::{self, Write as _};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;

/// Key-value store with a time-to-live per entry.
///
/// Implementations must tolerate interleaved use from many bindings;
/// concurrent writes to one key are last-write-wins.
pub trait CacheStore: Send + Sync {
    /// Returns the live value for `key`, if any.
    fn get(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key` for `ttl`.
    fn put(&self, key: &str, value: Value, ttl: Duration);

    /// Removes the entry for `key`.
    fn remove(&self, key: &str);

    /// Removes every entry.
    fn clear(&self);
}

/// A cached value with its write time and lifetime.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Value,
    pub timestamp: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    /// Creates a new entry written now.
    #[must_use]
    pub fn new(data: Value, ttl: Duration) -> Self {
        Self {
            data,
            timestamp: Instant::now(),
            ttl,
        }
    }

    /// Checks whether the entry outlived its ttl.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.timestamp.elapsed() >= self.ttl
    }
}

/// In-memory [`CacheStore`] backed by a concurrent map.
///
/// Cloning is cheap and clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, CacheEntry>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until they are read.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            // release the read guard before removing
            drop(entry);
            self.entries.remove_if(key, |_, entry| entry.is_expired());
            return None;
        }
        Some(entry.data.clone())
    }

    fn put(&self, key: &str, value: Value, ttl: Duration) {
        self.entries
            .insert(key.to_string(), CacheEntry::new(value, ttl));
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

/// Builds the cache key for a service call: `"{name}-{canonical params}"`.
///
/// Object keys are written in sorted order, so structurally equal params
/// always produce the same key regardless of insertion order.
#[must_use]
pub fn cache_key(name: &str, params: &Value) -> String {
    let mut key = String::with_capacity(name.len() + 16);
    key.push_str(name);
    key.push('-');
    // writing into a String cannot fail
    let _ = write_canonical(&mut key, params);
    key
}

fn write_canonical(out: &mut String, value: &Value) -> fmt::Result {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write!(out, "{}:", Value::String(key.clone()))?;
                write_canonical(out, &map[key])?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item)?;
            }
            out.push(']');
        }
        scalar => write!(out, "{scalar}")?,
    }
    Ok(())
}
