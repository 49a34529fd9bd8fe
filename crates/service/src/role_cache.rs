//! Bounded cache of resolved role lists.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use arena_core::types::DbId;
use lru::LruCache;

/// Maps a user id to their resolved role names, avoiding a store
/// round-trip on every authorization check.
///
/// Fixed capacity with least-recently-used eviction; safe for
/// concurrent readers and writers. There is no invalidation on role
/// change: a cached entry stays until it is evicted or the process
/// restarts, which is an accepted staleness window.
pub struct RoleCache {
    inner: Mutex<LruCache<DbId, Vec<String>>>,
}

impl RoleCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Fetch a user's cached roles, refreshing their recency.
    pub fn get(&self, user_id: DbId) -> Option<Vec<String>> {
        self.lock().get(&user_id).cloned()
    }

    /// Cache a user's roles. Returns `true` if another user's entry was
    /// evicted to make room.
    pub fn insert(&self, user_id: DbId, roles: Vec<String>) -> bool {
        matches!(
            self.lock().push(user_id, roles),
            Some((evicted, _)) if evicted != user_id
        )
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<DbId, Vec<String>>> {
        // a poisoned lock only means some reader panicked mid-access;
        // the map itself is still coherent
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn miss_then_hit() {
        let cache = RoleCache::new(4);
        assert_eq!(cache.get(1), None);
        cache.insert(1, roles(&["user"]));
        assert_eq!(cache.get(1), Some(roles(&["user"])));
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = RoleCache::new(2);
        assert!(!cache.insert(1, roles(&["user"])));
        assert!(!cache.insert(2, roles(&["user"])));

        // touch 1 so 2 becomes the eviction candidate
        cache.get(1);
        assert!(cache.insert(3, roles(&["user", "manager"])));

        assert!(cache.get(2).is_none());
        assert!(cache.get(1).is_some());
        assert!(cache.get(3).is_some());
    }

    #[test]
    fn reinsert_same_user_is_not_an_eviction() {
        let cache = RoleCache::new(2);
        cache.insert(1, roles(&["user"]));
        assert!(!cache.insert(1, roles(&["user", "head"])));
        assert_eq!(cache.get(1), Some(roles(&["user", "head"])));
    }

    #[test]
    fn zero_capacity_clamps_to_one() {
        let cache = RoleCache::new(0);
        cache.insert(1, roles(&["user"]));
        assert!(cache.get(1).is_some());
    }
}
