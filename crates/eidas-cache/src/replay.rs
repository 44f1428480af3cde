//! Replay-detection cache.

use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Keyed store of previously-seen SAML message identifiers.
///
/// `check_not_present` must be a single atomic check-and-insert: under
/// concurrent calls with the same pair, exactly one caller observes
/// `true`. A `false` return is a detected replay and is treated as a
/// security violation by callers, never retried.
pub trait AntiReplayCache: Send + Sync + std::fmt::Debug {
    /// Records `(saml_id, origin_country)` if unseen and returns `true`;
    /// returns `false` when the pair was already present.
    fn check_not_present(&self, saml_id: &str, origin_country: &str) -> bool;

    /// Drops every recorded entry.
    fn flush(&self);
}

/// Process-local replay cache with TTL-based eviction.
///
/// Entries older than the retention window no longer count as replays;
/// the window must exceed the maximum skew-adjusted validity window of
/// any SAML message, so protocol-level freshness rejects anything the
/// cache has forgotten.
#[derive(Debug)]
pub struct InMemoryReplayCache {
    entries: DashMap<String, Instant>,
    retention: Duration,
}

impl InMemoryReplayCache {
    /// Creates a cache with the given retention window.
    #[must_use]
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            retention,
        }
    }

    /// Removes every expired entry. Also invoked opportunistically when a
    /// stale entry is touched, so memory stays bounded without a sweeper
    /// thread.
    pub fn purge_expired(&self) {
        let retention = self.retention;
        self.entries
            .retain(|_, inserted| inserted.elapsed() < retention);
    }

    /// Number of live entries, for diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn key(saml_id: &str, origin_country: &str) -> String {
        format!("{origin_country}/{saml_id}")
    }
}

impl AntiReplayCache for InMemoryReplayCache {
    fn check_not_present(&self, saml_id: &str, origin_country: &str) -> bool {
        let key = Self::key(saml_id, origin_country);
        // The entry API holds the shard lock across the check and the
        // insert, which is what makes the operation atomic.
        match self.entries.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                true
            }
            Entry::Occupied(mut seen) => {
                if seen.get().elapsed() >= self.retention {
                    seen.insert(Instant::now());
                    // Release the shard before sweeping; retain takes
                    // every shard lock in turn.
                    drop(seen);
                    self.purge_expired();
                    return true;
                }
                tracing::warn!(
                    target: "security",
                    saml_id,
                    origin_country,
                    "replay detected for SAML message id"
                );
                false
            }
        }
    }

    fn flush(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn first_seen_wins_then_replays() {
        let cache = InMemoryReplayCache::new(Duration::from_secs(60));
        assert!(cache.check_not_present("_id1", "PT"));
        assert!(!cache.check_not_present("_id1", "PT"));
        assert!(!cache.check_not_present("_id1", "PT"));
        // Same id from another country is a distinct pair.
        assert!(cache.check_not_present("_id1", "ES"));
    }

    #[test]
    fn flush_forgets_everything() {
        let cache = InMemoryReplayCache::new(Duration::from_secs(60));
        assert!(cache.check_not_present("_id1", "PT"));
        cache.flush();
        assert!(cache.check_not_present("_id1", "PT"));
    }

    #[test]
    fn expired_entries_no_longer_count() {
        let cache = InMemoryReplayCache::new(Duration::ZERO);
        assert!(cache.check_not_present("_id1", "PT"));
        // Zero retention: the entry is immediately stale.
        assert!(cache.check_not_present("_id1", "PT"));
    }

    #[test]
    fn purge_bounds_memory() {
        let cache = InMemoryReplayCache::new(Duration::ZERO);
        for i in 0..100 {
            cache.check_not_present(&format!("_id{i}"), "PT");
        }
        cache.purge_expired();
        assert!(cache.is_empty());
    }

    #[test]
    fn exactly_one_thread_observes_true() {
        let cache = Arc::new(InMemoryReplayCache::new(Duration::from_secs(60)));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(std::thread::spawn(move || {
                u32::from(cache.check_not_present("_contended", "PT"))
            }));
        }
        let wins: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(wins, 1);
    }
}
