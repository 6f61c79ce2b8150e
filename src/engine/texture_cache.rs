//! Texture cache
//!
//! Bounded LRU map from [`CacheKey`] to [`TextureFrame`] with a time-to-live.
//!
//! - Recency is updated by lookups only; `peek`/`contains` leave it alone
//! - Expiry is checked lazily on `get`, and swept before an LRU eviction when
//!   the cache is full
//! - Every removal path hands the frame's textures back to the surface, so a
//!   handle is destroyed exactly once

use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use tracing::debug;

use super::clock::SharedClock;
use super::key::CacheKey;
use super::types::{PerformanceStats, TextureFrame};
use crate::config::StreamConfig;
use crate::render::SharedSurface;

/// Cache bookkeeping around a frame
#[derive(Debug)]
struct CacheEntry {
    frame: TextureFrame,
    inserted_at: Duration,
    last_access: Duration,
}

/// LRU + TTL texture cache
pub struct TextureCache {
    entries: LruCache<CacheKey, CacheEntry>,
    ttl: Duration,
    surface: SharedSurface,
    clock: SharedClock,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl TextureCache {
    pub fn new(
        capacity: NonZeroUsize,
        ttl: Duration,
        surface: SharedSurface,
        clock: SharedClock,
    ) -> Self {
        Self {
            entries: LruCache::new(capacity),
            ttl,
            surface,
            clock,
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
        }
    }

    /// Capacity and TTL taken from a validated config
    pub fn from_config(config: &StreamConfig, surface: SharedSurface, clock: SharedClock) -> Self {
        // StreamConfig guarantees a non-zero size
        let capacity = NonZeroUsize::new(config.max_cache_size()).unwrap_or(NonZeroUsize::MIN);
        Self::new(capacity, config.cache_timeout(), surface, clock)
    }

    fn is_expired(&self, entry: &CacheEntry, now: Duration) -> bool {
        now.saturating_sub(entry.inserted_at) > self.ttl
    }

    fn release(&self, frame: TextureFrame) {
        for handle in frame.textures {
            self.surface.destroy_texture(handle);
        }
    }

    /// Record a lookup of `key`; true on a live hit
    ///
    /// A hit refreshes recency. An expired entry is removed and counted as a
    /// miss.
    pub fn lookup(&mut self, key: &CacheKey) -> bool {
        let now = self.clock.now();
        let expired = match self.entries.peek(key) {
            Some(entry) => self.is_expired(entry, now),
            None => {
                self.misses += 1;
                return false;
            }
        };

        if expired {
            if let Some(entry) = self.entries.pop(key) {
                debug!("[TextureCache] expired frame at {}ms", key.timestamp_ms);
                self.release(entry.frame);
                self.expirations += 1;
            }
            self.misses += 1;
            return false;
        }

        self.hits += 1;
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_access = now;
        }
        true
    }

    /// Refresh recency of a live entry without counting a hit or a miss
    ///
    /// Expired entries are removed like in [`TextureCache::lookup`].
    pub fn touch(&mut self, key: &CacheKey) -> bool {
        let now = self.clock.now();
        let expired = match self.entries.peek(key) {
            Some(entry) => self.is_expired(entry, now),
            None => return false,
        };

        if expired {
            if let Some(entry) = self.entries.pop(key) {
                debug!("[TextureCache] expired frame at {}ms", key.timestamp_ms);
                self.release(entry.frame);
                self.expirations += 1;
            }
            return false;
        }

        self.entries.promote(key);
        true
    }

    /// Look up a frame, counting a hit or a miss
    pub fn get(&mut self, key: &CacheKey) -> Option<&TextureFrame> {
        if self.lookup(key) {
            self.peek(key)
        } else {
            None
        }
    }

    /// Stored frame for `key` without touching recency, counters or expiry
    pub fn peek(&self, key: &CacheKey) -> Option<&TextureFrame> {
        self.entries.peek(key).map(|entry| &entry.frame)
    }

    /// Whether a live (unexpired) entry exists for `key`
    pub fn contains(&self, key: &CacheKey) -> bool {
        let now = self.clock.now();
        self.entries
            .peek(key)
            .is_some_and(|entry| !self.is_expired(entry, now))
    }

    /// Insert a frame, returning a reference to the stored copy
    ///
    /// Replacing a key destroys the old frame's textures first. When the cache
    /// is full, expired entries are swept and, if that frees nothing, the
    /// least recently used entry is evicted.
    pub fn put(&mut self, key: CacheKey, frame: TextureFrame) -> &TextureFrame {
        let now = self.clock.now();

        if let Some(old) = self.entries.pop(&key) {
            self.release(old.frame);
        } else if self.entries.len() >= self.entries.cap().get() {
            self.purge_expired();
            if self.entries.len() >= self.entries.cap().get() {
                if let Some((evicted, entry)) = self.entries.pop_lru() {
                    debug!("[TextureCache] evicted frame at {}ms", evicted.timestamp_ms);
                    self.release(entry.frame);
                    self.evictions += 1;
                }
            }
        }

        // Room was made above, so this never displaces another entry
        let entry = self.entries.get_or_insert_mut(key, || CacheEntry {
            frame,
            inserted_at: now,
            last_access: now,
        });
        &entry.frame
    }

    /// Remove every entry older than the TTL, returning how many went
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now();
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(key, _)| *key)
            .collect();

        for key in &expired {
            if let Some(entry) = self.entries.pop(key) {
                self.release(entry.frame);
            }
        }
        if !expired.is_empty() {
            debug!("[TextureCache] purged {} expired frames", expired.len());
        }
        self.expirations += expired.len() as u64;
        expired.len()
    }

    /// Destroy every held texture and empty the cache
    ///
    /// Counters survive so the lifetime hit rate stays meaningful.
    pub fn clear(&mut self) {
        let mut released = 0usize;
        while let Some((_, entry)) = self.entries.pop_lru() {
            self.release(entry.frame);
            released += 1;
        }
        if released > 0 {
            debug!("[TextureCache] cleared {} frames", released);
        }
    }

    /// Time since the entry was last read, if it is present
    pub fn idle_time(&self, key: &CacheKey) -> Option<Duration> {
        let now = self.clock.now();
        self.entries
            .peek(key)
            .map(|entry| now.saturating_sub(entry.last_access))
    }

    pub fn stats(&self) -> PerformanceStats {
        let lookups = self.hits + self.misses;
        PerformanceStats {
            cache_size: self.entries.len(),
            capacity: self.entries.cap().get(),
            hits: self.hits,
            misses: self.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                self.hits as f64 / lookups as f64
            },
            evictions: self.evictions,
            expirations: self.expirations,
            preloaded_frames: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Surface the cache releases textures to
    pub fn surface(&self) -> &SharedSurface {
        &self.surface
    }
}

impl Drop for TextureCache {
    fn drop(&mut self) {
        self.clear();
    }
}
