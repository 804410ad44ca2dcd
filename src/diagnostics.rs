//! Leveled diagnostic messages published to embedder subscribers.
//!
//! Levels: 0 configuration changes, 1 per-request, 2 per-connection,
//! 3 lifecycle. The sender is internally synchronized and may be used from
//! any thread.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

/// Receives `(sender name, level, message)`.
pub type DiagnosticDelegate = Arc<dyn Fn(&str, usize, &str) + Send + Sync>;

struct Subscriber {
    min_level: usize,
    delegate: DiagnosticDelegate,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: HashMap<u64, Subscriber>,
}

pub struct DiagnosticsSender {
    name: String,
    registry: Arc<Mutex<Registry>>,
}

impl DiagnosticsSender {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), registry: Arc::default() }
    }

    /// Registers `delegate` for every message at `min_level` or above. Drop
    /// the returned handle to keep the subscription for the sender's
    /// lifetime, or call [`DiagnosticsSubscription::unsubscribe`] to end it.
    pub fn subscribe(
        &self,
        delegate: DiagnosticDelegate,
        min_level: usize,
    ) -> DiagnosticsSubscription {
        let mut registry = self.registry.lock().unwrap();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.insert(id, Subscriber { min_level, delegate });
        DiagnosticsSubscription { registry: Arc::downgrade(&self.registry), id }
    }

    /// Delivers `message` to every subscriber whose minimum level admits it.
    pub fn send(&self, level: usize, message: &str) {
        // deliver outside the registry lock so a subscriber may unsubscribe
        let delegates: Vec<DiagnosticDelegate> = {
            let registry = self.registry.lock().unwrap();
            registry
                .subscribers
                .values()
                .filter(|s| level >= s.min_level)
                .map(|s| Arc::clone(&s.delegate))
                .collect()
        };
        for delegate in delegates {
            delegate(&self.name, level, message);
        }
    }
}

/// Handle for one diagnostics subscription.
pub struct DiagnosticsSubscription {
    registry: Weak<Mutex<Registry>>,
    id: u64,
}

impl DiagnosticsSubscription {
    /// Ends the subscription. A handle outliving its sender is a no-op.
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().unwrap().subscribers.remove(&self.id);
        }
    }
}
