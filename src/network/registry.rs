//! Known servers on the proxy network
//!
//! The member set is replaced wholesale by the proxy feed. Readers take a
//! snapshot (`Arc` clone) so they never see a half-applied update, only
//! possibly a stale one.

use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::packet::GLOBAL_CHANNEL;

/// Case-insensitive server name comparison
pub fn same_server(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[derive(Debug, Default)]
pub struct ServerRegistry {
    self_name: RwLock<Option<String>>,
    /// Stored case-sensitively; "Lobby" and "lobby" are two entries.
    servers: RwLock<Arc<HashSet<String>>>,
}

fn read<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set this process's name on the network. Repeated calls overwrite.
    ///
    /// The reserved global channel name is refused and the previous name kept.
    pub fn set_self_name(&self, name: impl Into<String>) {
        let name = name.into();
        if same_server(&name, GLOBAL_CHANNEL) {
            tracing::warn!("[net] [reserved_name] refused self name {:?}", name);
            return;
        }
        tracing::info!("[net] [self_name] name={}", name);
        *write(&self.self_name) = Some(name);
    }

    /// This process's name, or `None` before the feed has reported it.
    pub fn self_name(&self) -> Option<String> {
        read(&self.self_name).clone()
    }

    /// Replace the whole member set.
    ///
    /// The reserved global channel name is never a server and is dropped.
    pub fn set_servers<I, S>(&self, servers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = HashSet::new();
        for s in servers {
            let s = s.into();
            if same_server(&s, GLOBAL_CHANNEL) {
                tracing::warn!("[net] [reserved_name] dropped server entry {:?}", s);
                continue;
            }
            set.insert(s);
        }
        tracing::info!("[net] [servers] count={}", set.len());
        *write(&self.servers) = Arc::new(set);
    }

    /// Current member set.
    pub fn snapshot(&self) -> Arc<HashSet<String>> {
        Arc::clone(&read(&self.servers))
    }

    /// Case-insensitive membership test.
    pub fn exists(&self, name: &str) -> bool {
        self.snapshot().iter().any(|s| same_server(s, name))
    }

    /// Whether `name` is this process, case-insensitively.
    /// Always false while the self name is unset.
    pub fn is_self(&self, name: &str) -> bool {
        read(&self.self_name)
            .as_deref()
            .is_some_and(|own| same_server(own, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exists_is_case_insensitive() {
        let reg = ServerRegistry::new();
        reg.set_servers(["Lobby"]);
        assert!(reg.exists("Lobby"));
        assert!(reg.exists("lobby"));
        assert!(reg.exists("LOBBY"));
        assert!(!reg.exists("Lobby2"));
    }

    #[test]
    fn test_set_servers_replaces_wholesale() {
        let reg = ServerRegistry::new();
        reg.set_servers(["A", "B"]);
        assert!(reg.exists("A"));
        reg.set_servers(["B"]);
        assert!(!reg.exists("A"));
        assert!(reg.exists("B"));
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_update() {
        let reg = ServerRegistry::new();
        reg.set_servers(["A", "B"]);
        let snap = reg.snapshot();
        reg.set_servers(Vec::<String>::new());
        assert_eq!(snap.len(), 2);
        assert!(reg.snapshot().is_empty());
    }

    #[test]
    fn test_case_variants_are_distinct_entries() {
        let reg = ServerRegistry::new();
        reg.set_servers(["Lobby", "lobby"]);
        assert_eq!(reg.snapshot().len(), 2);
        assert!(reg.exists("LOBBY"));
    }

    #[test]
    fn test_global_is_never_registered() {
        let reg = ServerRegistry::new();
        reg.set_servers(["Global", "Hub"]);
        assert!(!reg.exists("global"));
        assert_eq!(reg.snapshot().len(), 1);
    }

    #[test]
    fn test_self_name_unset_then_set() {
        let reg = ServerRegistry::new();
        assert_eq!(reg.self_name(), None);
        assert!(!reg.is_self(""));

        reg.set_self_name("Hub");
        reg.set_self_name("Hub2");
        assert_eq!(reg.self_name().as_deref(), Some("Hub2"));
        assert!(reg.is_self("hub2"));
        assert!(!reg.is_self("Hub"));
    }

    #[test]
    fn test_global_is_never_the_self_name() {
        let reg = ServerRegistry::new();
        reg.set_self_name("GLOBAL");
        assert_eq!(reg.self_name(), None);

        reg.set_self_name("Hub");
        reg.set_self_name("global");
        assert_eq!(reg.self_name().as_deref(), Some("Hub"));
        assert!(!reg.is_self("global"));
    }
}
