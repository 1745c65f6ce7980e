//! External disconnect trigger
//!
//! Sockets register a hook while they are live. Firing the signal (from a
//! Ctrl-C handler, a system notification, or any other thread) runs every
//! registered hook.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type Hook = Arc<dyn Fn() + Send + Sync>;

/// Registration handle returned by [`DisconnectSignal::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

/// Cloneable registry of disconnect hooks
#[derive(Clone, Default)]
pub struct DisconnectSignal {
    hooks: Arc<Mutex<HashMap<HookId, Hook>>>,
    next_id: Arc<AtomicU64>,
}

impl DisconnectSignal {
    /// Create an empty signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hook
    pub fn register<F>(&self, hook: F) -> HookId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.hooks.lock().insert(id, Arc::new(hook));
        id
    }

    /// Remove a hook. Returns false if it was already gone.
    pub fn unregister(&self, id: HookId) -> bool {
        self.hooks.lock().remove(&id).is_some()
    }

    /// Run every registered hook and return how many ran
    pub fn fire(&self) -> usize {
        // hooks unregister themselves, so call them without the lock
        let hooks: Vec<Hook> = self.hooks.lock().values().cloned().collect();
        tracing::info!("Disconnect signal fired ({} hooks)", hooks.len());
        for hook in &hooks {
            hook();
        }
        hooks.len()
    }

    /// Number of registered hooks
    pub fn len(&self) -> usize {
        self.hooks.lock().len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.hooks.lock().is_empty()
    }
}
