//! Concurrent TTL map (spec §4.2).
//!
//! Grounded in the original `hashmap.c`: a DJB2-XOR bucketed hash map with an
//! optional per-entry TTL and an optional on-delete side effect ("unlinker").
//! The original uses a recursive pthread mutex so that `hashmap_gc` can call
//! `hashmap_del` while holding the lock; this implementation instead follows
//! the design notes' guidance and factors a locked public API from unlocked
//! `*_locked` helpers, taking the `tokio::sync::Mutex` exactly once per call.

use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

type Unlinker = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Clone)]
struct Entry {
    key: String,
    value: String,
    timestamp: u64,
}

struct Inner {
    buckets: Vec<Vec<Entry>>,
    size: usize,
}

/// A string-keyed map with optional TTL-based eviction and an optional
/// `unlinker` callback invoked on a value when its entry is removed.
pub struct TtlMap {
    inner: Mutex<Inner>,
    bucket_count: usize,
    timeout: u64,
    unlinker: Option<Unlinker>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketCountZero;

/// DJB2-XOR: `h = 5381; for c in bytes { h = ((h << 5) + h) ^ c }`.
fn djb2_xor(key: &str) -> u64 {
    let mut hash: u64 = 5381;
    for &c in key.as_bytes() {
        hash = hash.wrapping_shl(5).wrapping_add(hash) ^ (c as u64);
    }
    hash
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl TtlMap {
    /// Create a map with `bucket_count` buckets, no TTL, and no unlinker.
    pub fn new(bucket_count: usize) -> Result<Self, BucketCountZero> {
        Self::with_timeout_and_unlinker(bucket_count, 0, None)
    }

    /// Create a map with a TTL (0 = never expire) and an optional unlinker,
    /// invoked on a value when its entry is removed (by `remove` or `sweep`).
    pub fn with_timeout_and_unlinker(
        bucket_count: usize,
        timeout: u64,
        unlinker: Option<Unlinker>,
    ) -> Result<Self, BucketCountZero> {
        if bucket_count == 0 {
            return Err(BucketCountZero);
        }
        Ok(Self {
            inner: Mutex::new(Inner {
                buckets: vec![Vec::new(); bucket_count],
                size: 0,
            }),
            bucket_count,
            timeout,
            unlinker,
        })
    }

    fn bucket_index(&self, key: &str) -> usize {
        (djb2_xor(key) % self.bucket_count as u64) as usize
    }

    /// Insert or update `key`. Returns the bucket index the entry lives in.
    pub async fn put(&self, key: &str, value: &str) -> usize {
        let idx = self.bucket_index(key);
        let mut inner = self.inner.lock().await;
        let bucket = &mut inner.buckets[idx];

        if let Some(entry) = bucket.iter_mut().find(|e| e.key == key) {
            if entry.value != value {
                entry.value = value.to_string();
            }
            if self.timeout > 0 {
                entry.timestamp = now_secs();
            }
        } else {
            bucket.push(Entry {
                key: key.to_string(),
                value: value.to_string(),
                timestamp: now_secs(),
            });
            inner.size += 1;
        }

        idx
    }

    /// Look up `key`, returning a copy of the stored value. Touches the
    /// entry's timestamp iff the map has a nonzero TTL.
    pub async fn get(&self, key: &str) -> Option<String> {
        let idx = self.bucket_index(key);
        let mut inner = self.inner.lock().await;
        let bucket = &mut inner.buckets[idx];

        let entry = bucket.iter_mut().find(|e| e.key == key)?;
        if self.timeout > 0 {
            entry.timestamp = now_secs();
        }
        Some(entry.value.clone())
    }

    /// Remove `key`, invoking the unlinker on its value if one is
    /// configured. Returns the bucket index the entry was removed from, or
    /// `None` if the key was not present.
    pub async fn remove(&self, key: &str) -> Option<usize> {
        let idx = self.bucket_index(key);
        let mut inner = self.inner.lock().await;
        self.remove_locked(&mut inner, idx, key)
    }

    /// Assumes `inner`'s lock is already held by the caller.
    fn remove_locked(&self, inner: &mut Inner, idx: usize, key: &str) -> Option<usize> {
        let bucket = &mut inner.buckets[idx];
        let pos = bucket.iter().position(|e| e.key == key)?;
        let entry = bucket.remove(pos);
        inner.size -= 1;
        if let Some(unlinker) = &self.unlinker {
            unlinker(&entry.value);
        }
        Some(idx)
    }

    /// Remove every entry whose last-touch timestamp is more than `timeout`
    /// seconds old. Noop when `timeout == 0`.
    pub async fn sweep(&self) {
        if self.timeout == 0 {
            return;
        }

        let now = now_secs();
        let mut inner = self.inner.lock().await;
        for idx in 0..self.bucket_count {
            let expired: Vec<String> = inner.buckets[idx]
                .iter()
                .filter(|e| now.saturating_sub(e.timestamp) > self.timeout)
                .map(|e| e.key.clone())
                .collect();
            for key in expired {
                self.remove_locked(&mut inner, idx, &key);
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.size
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn zero_buckets_is_error() {
        assert!(TtlMap::new(0).is_err());
    }

    #[tokio::test]
    async fn put_get_roundtrip() {
        let map = TtlMap::new(8).unwrap();
        map.put("example.com", "93.184.216.34").await;
        assert_eq!(map.get("example.com").await.as_deref(), Some("93.184.216.34"));
        assert_eq!(map.get("missing.com").await, None);
    }

    #[tokio::test]
    async fn put_updates_existing_key_without_growing_size() {
        let map = TtlMap::new(8).unwrap();
        map.put("k", "v1").await;
        map.put("k", "v2").await;
        assert_eq!(map.len().await, 1);
        assert_eq!(map.get("k").await.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn size_tracks_inserts_minus_removes() {
        let map = TtlMap::new(4).unwrap();
        map.put("a", "1").await;
        map.put("b", "2").await;
        map.put("c", "3").await;
        assert_eq!(map.len().await, 3);
        map.remove("b").await;
        assert_eq!(map.len().await, 2);
        assert!(map.remove("nonexistent").await.is_none());
        assert_eq!(map.len().await, 2);
    }

    #[tokio::test]
    async fn hash_collisions_do_not_break_lookup() {
        // Force heavy collisions with a single bucket.
        let map = TtlMap::new(1).unwrap();
        for i in 0..50 {
            map.put(&format!("key{i}"), &format!("val{i}")).await;
        }
        for i in 0..50 {
            assert_eq!(
                map.get(&format!("key{i}")).await.as_deref(),
                Some(format!("val{i}").as_str())
            );
        }
        assert_eq!(map.len().await, 50);
    }

    #[tokio::test]
    async fn sweep_is_noop_when_timeout_zero() {
        let map = TtlMap::new(4).unwrap();
        map.put("k", "v").await;
        map.sweep().await;
        assert_eq!(map.len().await, 1);
    }

    #[tokio::test]
    async fn sweep_evicts_stale_entries_and_invokes_unlinker() {
        let unlinked = Arc::new(AtomicUsize::new(0));
        let unlinked_cl = unlinked.clone();
        let map = TtlMap::with_timeout_and_unlinker(
            4,
            1,
            Some(Box::new(move |_value: &str| {
                unlinked_cl.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();

        map.put("k", "v").await;
        // Backdate the entry well past the 1-second timeout.
        {
            let idx = map.bucket_index("k");
            let mut inner = map.inner.lock().await;
            inner.buckets[idx][0].timestamp = 0;
        }

        map.sweep().await;

        assert_eq!(map.len().await, 0);
        assert_eq!(unlinked.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn remove_invokes_unlinker_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_cl = calls.clone();
        let map = TtlMap::with_timeout_and_unlinker(
            4,
            0,
            Some(Box::new(move |_v: &str| {
                calls_cl.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();

        map.put("k", "/tmp/some/path").await;
        map.remove("k").await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Removing an already-gone key must not invoke the unlinker again.
        map.remove("k").await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_put_get_is_consistent() {
        let map = Arc::new(TtlMap::new(16).unwrap());
        let mut handles = vec![];
        for i in 0..20 {
            let map = map.clone();
            handles.push(tokio::spawn(async move {
                map.put(&format!("h{i}"), &format!("v{i}")).await;
                map.get(&format!("h{i}")).await
            }));
        }
        for (i, h) in handles.into_iter().enumerate() {
            assert_eq!(h.await.unwrap().as_deref(), Some(format!("v{i}").as_str()));
        }
        assert_eq!(map.len().await, 20);
    }
}
