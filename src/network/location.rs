//! Player location tracking
//!
//! Records which backend server each player is on. Writes happen on join and
//! on leaving the network; lookups are asynchronous and answer through a
//! callback.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::registry::ServerRegistry;
use crate::core::lock;

/// Receives the resolved server name, or `None` when the player is untracked.
pub type LocationCallback = Box<dyn FnOnce(Option<String>) + Send + 'static>;

pub trait LocationTracker: Send + Sync {
    /// Record this process as the player's current server.
    fn update_location(&self, player: &str);

    /// Forget the player. Used when they leave the network, not on a move.
    fn remove_location(&self, player: &str);

    /// Look the player up without blocking; `callback` runs later.
    fn get_location(&self, player: &str, callback: LocationCallback);
}

/// Process-local tracker, keyed by lowercase player name.
///
/// Lookups are answered from a spawned tokio task, so a runtime must be
/// running.
pub struct MemoryLocationTracker {
    registry: Arc<ServerRegistry>,
    locations: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryLocationTracker {
    pub fn new(registry: Arc<ServerRegistry>) -> Self {
        Self {
            registry,
            locations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.locations).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LocationTracker for MemoryLocationTracker {
    fn update_location(&self, player: &str) {
        let Some(server) = self.registry.self_name() else {
            tracing::warn!("[net] [location_skipped] player={} self name not set", player);
            return;
        };
        lock(&self.locations).insert(player.to_ascii_lowercase(), server);
    }

    fn remove_location(&self, player: &str) {
        lock(&self.locations).remove(&player.to_ascii_lowercase());
    }

    fn get_location(&self, player: &str, callback: LocationCallback) {
        let locations = Arc::clone(&self.locations);
        let key = player.to_ascii_lowercase();
        tokio::spawn(async move {
            let found = lock(&locations).get(&key).cloned();
            tracing::debug!("[net] [location_lookup] player={} server={:?}", key, found);
            callback(found);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    async fn lookup(t: &dyn LocationTracker, player: &str) -> Option<String> {
        let (tx, rx) = oneshot::channel();
        t.get_location(player, Box::new(move |s: Option<String>| {
            let _ = tx.send(s);
        }));
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn test_update_then_lookup() {
        let reg = Arc::new(ServerRegistry::new());
        reg.set_self_name("Hub");
        let t = MemoryLocationTracker::new(reg);

        t.update_location("Alice");
        assert_eq!(lookup(&t, "alice").await.as_deref(), Some("Hub"));
        assert_eq!(lookup(&t, "Bob").await, None);
    }

    #[tokio::test]
    async fn test_remove_clears() {
        let reg = Arc::new(ServerRegistry::new());
        reg.set_self_name("Hub");
        let t = MemoryLocationTracker::new(reg);

        t.update_location("Alice");
        t.remove_location("ALICE");
        assert!(t.is_empty());
        assert_eq!(lookup(&t, "Alice").await, None);
    }

    #[test]
    fn test_update_without_self_name_is_skipped() {
        let t = MemoryLocationTracker::new(Arc::new(ServerRegistry::new()));
        t.update_location("Alice");
        assert!(t.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_does_not_block_caller() {
        let reg = Arc::new(ServerRegistry::new());
        reg.set_self_name("Hub");
        let t = MemoryLocationTracker::new(reg);
        t.update_location("Alice");

        let done = Arc::new(Mutex::new(false));
        let d = Arc::clone(&done);
        let (tx, rx) = oneshot::channel();
        t.get_location("Alice", Box::new(move |_: Option<String>| {
            *d.lock().unwrap() = true;
            let _ = tx.send(());
        }));
        // current_thread runtime: the spawned lookup cannot have run yet.
        assert!(!*done.lock().unwrap());
        rx.await.unwrap();
        assert!(*done.lock().unwrap());
    }
}
