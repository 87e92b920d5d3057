//! Update event registry.
//!
//! Listeners register a callback and get back a token; the index calls every
//! registered callback with the new revision after each mutation.

use crate::error::{LiveQueryError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use tracing::debug;

/// Callback invoked with the index revision after a mutation.
pub type UpdateCallback = Arc<dyn Fn(u64) + Send + Sync + 'static>;

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionToken(u64);

impl SubscriptionToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Default)]
struct Listeners {
    callbacks: BTreeMap<SubscriptionToken, UpdateCallback>,
    next_id: u64,
    closed: bool,
}

/// Registry of `update` listeners.
#[derive(Default)]
pub struct UpdateRegistry {
    listeners: Mutex<Listeners>,
}

impl UpdateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback.
    ///
    /// Fails once the registry has been closed.
    pub fn subscribe(&self, callback: UpdateCallback) -> Result<SubscriptionToken> {
        let mut listeners = self.listeners.lock().expect("listener lock poisoned");
        if listeners.closed {
            return Err(LiveQueryError::Subscription {
                message: "index is no longer accepting listeners".to_string(),
            });
        }

        listeners.next_id += 1;
        let token = SubscriptionToken(listeners.next_id);
        listeners.callbacks.insert(token, callback);
        debug!("Registered update listener {}", token.id());
        Ok(token)
    }

    /// Remove a callback. Returns false if the token was unknown.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut listeners = self.listeners.lock().expect("listener lock poisoned");
        let removed = listeners.callbacks.remove(&token).is_some();
        if removed {
            debug!("Removed update listener {}", token.id());
        }
        removed
    }

    /// Invoke every listener with `revision`.
    ///
    /// Callbacks run outside the registry lock, so they may unsubscribe.
    pub fn emit(&self, revision: u64) {
        let callbacks: Vec<UpdateCallback> = {
            let listeners = self.listeners.lock().expect("listener lock poisoned");
            listeners.callbacks.values().cloned().collect()
        };
        for callback in callbacks {
            callback(revision);
        }
    }

    /// Drop all listeners and refuse new ones.
    pub fn close(&self) {
        let mut listeners = self.listeners.lock().expect("listener lock poisoned");
        listeners.closed = true;
        listeners.callbacks.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().expect("listener lock poisoned").callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
