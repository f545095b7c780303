//! Response cache: a TTL key-value store for generated replies.
//!
//! Keys are coarse fingerprints of the conversation (see [`fingerprint`]) so
//! that similar turns share a completion. An entry read after its expiry is a
//! miss and is evicted on the spot; [`ResponseCache::spawn_sweeper`] evicts
//! the rest periodically.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Learner level used when the caller does not know it.
pub const DEFAULT_LEARNER_LEVEL: &str = "intermediate";

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    expires_at: Instant,
}

/// Thread-safe TTL store. Cloning shares the underlying entries.
#[derive(Debug)]
pub struct ResponseCache<V> {
    entries: Arc<Mutex<HashMap<String, CacheEntry<V>>>>,
}

impl<V> Clone for ResponseCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<V> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ResponseCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let now = Instant::now();
        self.lock().insert(
            key.into(),
            CacheEntry {
                value,
                created_at: now,
                expires_at: now + ttl,
            },
        );
    }

    /// Remove `key`. Returns whether an entry was present.
    pub fn delete(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Evict every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<V: Clone> ResponseCache<V> {
    /// Look up `key`. An expired entry counts as a miss and is evicted.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.lock();
        let entry = entries.get(key)?;
        if entry.expires_at > now {
            return Some(entry.value.clone());
        }

        let age_secs = now.duration_since(entry.created_at).as_secs();
        entries.remove(key);
        debug!(key, age_secs, "Evicted expired cache entry on read");
        None
    }
}

impl<V: Send + 'static> ResponseCache<V> {
    /// Sweep every `interval` until `token` is cancelled.
    pub fn spawn_sweeper(&self, interval: Duration, token: CancellationToken) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = cache.sweep();
                        if evicted > 0 {
                            debug!(evicted, "Cache sweep");
                        }
                    }
                }
            }
        })
    }
}

/// Stable cache key for a conversational context.
///
/// Deliberately coarse: only the group size, the primary topic and the
/// learner level participate.
pub fn fingerprint(
    participant_count: usize,
    topic: Option<&str>,
    learner_level: Option<&str>,
) -> String {
    let topic = topic.unwrap_or("general");
    let level = learner_level
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_LEARNER_LEVEL);

    let mut hasher = Sha256::new();
    hasher.update(participant_count.to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(topic.as_bytes());
    hasher.update([0u8]);
    hasher.update(level.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
