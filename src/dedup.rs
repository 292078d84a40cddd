// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - TTL + LRU Dedup Cache
 * Bounded key -> last-seen-timestamp cache for scan and report suppression
 *
 * Capacity and TTL are read through the limits closure on every call, so
 * operator changes apply to a live cache. Entries at or past the TTL are
 * treated as absent and evicted lazily on lookup; exceeding capacity evicts
 * the least-recently-touched entries on insert. Locking is internal; the
 * cache is injected by reference wherever suppression is needed, so tests
 * can construct isolated instances.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

/// Live limits, re-read on every cache call.
#[derive(Debug, Clone, Copy)]
pub struct CacheLimits {
    /// Maximum entry count; 0 disables the bound.
    pub max_entries: usize,
    /// Entry lifetime in milliseconds; 0 means entries never expire.
    pub ttl_ms: i64,
}

#[derive(Debug)]
struct Entry {
    /// Timestamp of the last `mark`, which is what the TTL runs against.
    marked_at_ms: i64,
    /// Recency stamp; lookups and marks both refresh it.
    stamp: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    recency: BTreeMap<u64, String>,
    clock: u64,
}

impl Inner {
    fn touch(&mut self, key: &str) {
        self.clock += 1;
        let stamp = self.clock;
        if let Some(entry) = self.entries.get_mut(key) {
            self.recency.remove(&entry.stamp);
            entry.stamp = stamp;
            self.recency.insert(stamp, key.to_string());
        }
    }

    fn remove(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            self.recency.remove(&entry.stamp);
        }
    }

    fn evict_over_capacity(&mut self, max_entries: usize) {
        if max_entries == 0 {
            return;
        }
        while self.entries.len() > max_entries {
            let Some((&oldest_stamp, _)) = self.recency.iter().next() else {
                break;
            };
            let key = self.recency.remove(&oldest_stamp).expect("stamp present");
            self.entries.remove(&key);
        }
    }
}

pub struct TtlLruCache {
    limits: Box<dyn Fn() -> CacheLimits + Send + Sync>,
    inner: Mutex<Inner>,
}

impl TtlLruCache {
    pub fn new<F>(limits: F) -> Self
    where
        F: Fn() -> CacheLimits + Send + Sync + 'static,
    {
        Self {
            limits: Box::new(limits),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// True if the key was marked less than TTL ago. An entry exactly at the
    /// TTL boundary counts as expired and is evicted on the spot. A fresh
    /// hit refreshes the entry's LRU recency, not its TTL clock.
    pub fn is_fresh(&self, key: &str, now_ms: i64) -> bool {
        let limits = (self.limits)();
        let mut inner = self.inner.lock();
        let Some(entry) = inner.entries.get(key) else {
            return false;
        };
        let ttl = limits.ttl_ms.max(0);
        if ttl > 0 && now_ms - entry.marked_at_ms >= ttl {
            inner.remove(key);
            return false;
        }
        inner.touch(key);
        true
    }

    /// Inserts or refreshes the key, then evicts over-capacity entries in
    /// least-recently-touched order.
    pub fn mark(&self, key: &str, now_ms: i64) {
        let limits = (self.limits)();
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(key) {
            inner.touch(key);
            if let Some(entry) = inner.entries.get_mut(key) {
                entry.marked_at_ms = now_ms;
            }
        } else {
            inner.clock += 1;
            let stamp = inner.clock;
            inner.entries.insert(
                key.to_string(),
                Entry {
                    marked_at_ms: now_ms,
                    stamp,
                },
            );
            inner.recency.insert(stamp, key.to_string());
        }
        inner.evict_over_capacity(limits.max_entries);
    }

    /// Operator reset: drops every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.recency.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for TtlLruCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlLruCache")
            .field("len", &self.len())
            .finish()
    }
}
