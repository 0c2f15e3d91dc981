// ── Keyed state collection ──
//
// Concurrent storage for one kind of per-device state. Change
// notification happens one level up: the store rebuilds its views after
// each applied mutation, so this type stays a plain map.

use std::sync::Arc;

use dashmap::DashMap;

/// A concurrent map from key string to shared entity.
///
/// Keys are the device id for per-device state and `"{device}|{type}"`
/// for alert records.
pub(crate) struct EntityCollection<T: Send + Sync + 'static> {
    by_key: DashMap<String, Arc<T>>,
}

impl<T: Send + Sync + 'static> EntityCollection<T> {
    pub(crate) fn new() -> Self {
        Self {
            by_key: DashMap::new(),
        }
    }

    /// Insert or replace an entity. Returns `true` if the key was new.
    pub(crate) fn upsert(&self, key: impl Into<String>, entity: T) -> bool {
        self.by_key.insert(key.into(), Arc::new(entity)).is_none()
    }

    /// Remove an entity by key. Returns the removed entity if it existed.
    pub(crate) fn remove(&self, key: &str) -> Option<Arc<T>> {
        self.by_key.remove(key).map(|(_, v)| v)
    }

    pub(crate) fn get(&self, key: &str) -> Option<Arc<T>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    /// Entities whose key satisfies `pred`.
    pub(crate) fn values_where(&self, pred: impl Fn(&str) -> bool) -> Vec<Arc<T>> {
        self.by_key
            .iter()
            .filter(|r| pred(r.key()))
            .map(|r| Arc::clone(r.value()))
            .collect()
    }

    pub(crate) fn values(&self) -> Vec<Arc<T>> {
        self.values_where(|_| true)
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        self.by_key.iter().map(|r| r.key().clone()).collect()
    }

    /// Drop every entry whose key fails `keep`. Returns how many went.
    pub(crate) fn retain_keys(&self, keep: impl Fn(&str) -> bool) -> usize {
        self.retain(|k, _| keep(k))
    }

    /// Drop every entry failing `keep`. Returns how many went.
    pub(crate) fn retain(&self, keep: impl Fn(&str, &T) -> bool) -> usize {
        let before = self.by_key.len();
        self.by_key.retain(|k, v| keep(k, v));
        before - self.by_key.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
