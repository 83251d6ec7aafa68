//! engine::notify
//!
//! Change notifier fired whenever a local commit or an incoming pull moves
//! any branch.
//!
//! Listeners run synchronously on the notifying thread, which is always
//! inside the coordinator's critical section. A listener must therefore not
//! call back into the store.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// Callback invoked on every change notification.
pub type ChangeListener = Box<dyn Fn() + Send + Sync>;

/// Observer hub for repository changes.
#[derive(Default)]
pub struct ChangeNotifier {
    listeners: RwLock<Vec<ChangeListener>>,
    fired: AtomicU64,
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listeners.read().len())
            .field("fired", &self.fired.load(Ordering::SeqCst))
            .finish()
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Listeners are never removed.
    pub fn subscribe(&self, listener: ChangeListener) {
        self.listeners.write().push(listener);
    }

    /// Fire every listener in registration order.
    pub fn notify(&self) {
        self.fired.fetch_add(1, Ordering::SeqCst);
        for listener in self.listeners.read().iter() {
            listener();
        }
    }

    /// Number of notifications fired so far.
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}
