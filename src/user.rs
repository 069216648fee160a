//! Online users
//!
//! The network layer only needs a narrow view of a player: a name, a way to
//! reply, a cooldown gate and a save trigger. [`User`] is that view; the
//! session subsystem that owns the real player implements it. [`Session`] is
//! the queue-backed implementation used by the node binary and the tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::core::lock;
use crate::lang::{MessageKey, Messages};

pub trait User: Send + Sync {
    fn name(&self) -> &str;

    /// Send the message for `key` to this user, with an optional argument.
    fn send_message(&self, key: MessageKey, arg: Option<&str>);

    /// Returns true while the named cooldown is active.
    ///
    /// When it is not active the cooldown is started at the current instant
    /// and false is returned, so a passing check is also the start of the
    /// next window. An active check leaves the recorded start untouched.
    fn is_cooling_down(&self, cooldown: &str, window: Duration) -> bool;

    /// Flush the user's state to storage. Fire-and-forget.
    fn save(&self);
}

/// Per-user cooldown start times, keyed by cooldown name.
#[derive(Debug, Default)]
pub struct Cooldowns {
    started: HashMap<String, Instant>,
}

impl Cooldowns {
    pub fn new() -> Self {
        Self::default()
    }

    /// See [`User::is_cooling_down`]; `now` is passed in by the caller.
    pub fn check_and_start(&mut self, cooldown: &str, window: Duration, now: Instant) -> bool {
        if let Some(start) = self.started.get(cooldown) {
            if now.saturating_duration_since(*start) < window {
                return true;
            }
        }
        self.started.insert(cooldown.to_string(), now);
        false
    }

    /// When the named cooldown was last started, if ever.
    pub fn started_at(&self, cooldown: &str) -> Option<Instant> {
        self.started.get(cooldown).copied()
    }
}

/// A save request handed to the persistence worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub player: String,
}

/// Queue-backed [`User`].
///
/// Rendered messages go to `outbox`, saves go to `saves`. Both use
/// `try_send`; a full or closed queue drops the item with a warning.
pub struct Session {
    name: String,
    messages: Arc<Messages>,
    outbox: mpsc::Sender<String>,
    saves: mpsc::Sender<SaveRequest>,
    cooldowns: Mutex<Cooldowns>,
}

impl Session {
    pub fn new(
        name: impl Into<String>,
        messages: Arc<Messages>,
        outbox: mpsc::Sender<String>,
        saves: mpsc::Sender<SaveRequest>,
    ) -> Self {
        Self {
            name: name.into(),
            messages,
            outbox,
            saves,
            cooldowns: Mutex::new(Cooldowns::new()),
        }
    }

    pub fn cooldown_started_at(&self, cooldown: &str) -> Option<Instant> {
        lock(&self.cooldowns).started_at(cooldown)
    }
}

impl User for Session {
    fn name(&self) -> &str {
        &self.name
    }

    fn send_message(&self, key: MessageKey, arg: Option<&str>) {
        let text = self.messages.render(key, arg);
        if let Err(e) = self.outbox.try_send(text) {
            tracing::warn!("[user] [message_dropped] user={} key={} err={}", self.name, key, e);
        }
    }

    fn is_cooling_down(&self, cooldown: &str, window: Duration) -> bool {
        lock(&self.cooldowns).check_and_start(cooldown, window, Instant::now())
    }

    fn save(&self) {
        let req = SaveRequest { player: self.name.clone() };
        if let Err(e) = self.saves.try_send(req) {
            tracing::warn!("[user] [save_dropped] user={} err={}", self.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(2500);

    #[test]
    fn test_first_check_starts_cooldown() {
        let mut cd = Cooldowns::new();
        let t0 = Instant::now();
        assert!(!cd.check_and_start("Switch Server", WINDOW, t0));
        assert_eq!(cd.started_at("Switch Server"), Some(t0));
    }

    #[test]
    fn test_active_check_does_not_reset() {
        let mut cd = Cooldowns::new();
        let t0 = Instant::now();
        cd.check_and_start("Switch Server", WINDOW, t0);

        assert!(cd.check_and_start("Switch Server", WINDOW, t0 + Duration::from_millis(1000)));
        assert!(cd.check_and_start("Switch Server", WINDOW, t0 + Duration::from_millis(2499)));
        assert_eq!(cd.started_at("Switch Server"), Some(t0));

        let t1 = t0 + WINDOW;
        assert!(!cd.check_and_start("Switch Server", WINDOW, t1));
        assert_eq!(cd.started_at("Switch Server"), Some(t1));
    }

    #[test]
    fn test_cooldowns_are_independent() {
        let mut cd = Cooldowns::new();
        let t0 = Instant::now();
        cd.check_and_start("Switch Server", WINDOW, t0);
        assert!(!cd.check_and_start("Other", WINDOW, t0));
    }

    #[tokio::test]
    async fn test_session_queues_message_and_save() {
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let (save_tx, mut save_rx) = mpsc::channel(4);
        let s = Session::new("Alice", Arc::new(Messages::default()), out_tx, save_tx);

        s.send_message(MessageKey::SwitchPending, Some("Lobby"));
        s.save();

        assert_eq!(out_rx.recv().await.unwrap(), "Sending you to Lobby...");
        assert_eq!(save_rx.recv().await.unwrap(), SaveRequest { player: "Alice".into() });
    }

    #[test]
    fn test_session_full_queue_drops_quietly() {
        let (out_tx, mut out_rx) = mpsc::channel(1);
        let (save_tx, mut save_rx) = mpsc::channel(1);
        let s = Session::new("Bob", Arc::new(Messages::default()), out_tx, save_tx);
        s.send_message(MessageKey::UnknownServer, None);
        s.send_message(MessageKey::AlreadyOnServer, None);
        s.save();
        s.save();

        assert_eq!(out_rx.try_recv().unwrap(), "That server does not exist.");
        assert!(out_rx.try_recv().is_err());
        assert_eq!(save_rx.try_recv().unwrap(), SaveRequest { player: "Bob".into() });
        assert!(save_rx.try_recv().is_err());
    }
}
