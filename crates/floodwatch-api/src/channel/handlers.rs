// ── Named event handler registry ──
//
// Explicit map of event name -> ordered (handler id -> handler) entries.
// Registration is keyed by identity, so adding the same handler id twice
// replaces the first registration instead of stacking a duplicate.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use super::ChannelEvent;

/// Callback invoked for every delivered event of a registered name.
///
/// Handlers run synchronously on the channel's reader task; they should
/// do bounded work (apply a state change, notify a watcher) and return.
pub type EventHandler = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;

/// Identity of a handler registration.
///
/// Consumers pick a stable id (typically one per consumer) and reuse it
/// across registrations; the registry treats equal ids as the same handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(String);

impl HandlerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HandlerId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for HandlerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Default)]
pub(crate) struct HandlerRegistry {
    by_event: Mutex<HashMap<String, Vec<(HandlerId, EventHandler)>>>,
}

impl HandlerRegistry {
    /// Register `handler` for `event` under `id`. Returns `true` if this
    /// (event, id) pair was not registered before.
    pub(crate) fn insert(&self, event: &str, id: HandlerId, handler: EventHandler) -> bool {
        let mut map = self.by_event.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = map.entry(event.to_owned()).or_default();
        if let Some(slot) = entries.iter_mut().find(|(existing, _)| *existing == id) {
            slot.1 = handler;
            false
        } else {
            entries.push((id, handler));
            true
        }
    }

    /// Remove the (event, id) registration. Returns `true` if one existed.
    pub(crate) fn remove(&self, event: &str, id: &HandlerId) -> bool {
        let mut map = self.by_event.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entries) = map.get_mut(event) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(existing, _)| existing != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            map.remove(event);
        }
        removed
    }

    /// Remove every registration owned by `id`, across all events.
    /// Returns how many were removed.
    pub(crate) fn remove_all(&self, id: &HandlerId) -> usize {
        let mut map = self.by_event.lock().unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0;
        map.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|(existing, _)| existing != id);
            removed += before - entries.len();
            !entries.is_empty()
        });
        removed
    }

    /// Total number of registrations across all events.
    pub(crate) fn len(&self) -> usize {
        let map = self.by_event.lock().unwrap_or_else(PoisonError::into_inner);
        map.values().map(Vec::len).sum()
    }

    /// Number of handlers registered for `event`.
    pub(crate) fn count_for(&self, event: &str) -> usize {
        let map = self.by_event.lock().unwrap_or_else(PoisonError::into_inner);
        map.get(event).map_or(0, Vec::len)
    }

    /// Deliver `event` to every handler registered for its name.
    ///
    /// Handlers are cloned out of the lock before being called, so a
    /// handler may register or remove handlers without deadlocking.
    /// Returns the number of handlers invoked.
    pub(crate) fn dispatch(&self, event: &ChannelEvent) -> usize {
        let handlers: Vec<EventHandler> = {
            let map = self.by_event.lock().unwrap_or_else(PoisonError::into_inner);
            match map.get(&event.name) {
                Some(entries) => entries.iter().map(|(_, h)| Arc::clone(h)).collect(),
                None => return 0,
            }
        };
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }
}
