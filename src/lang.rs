//! User-facing messages
//!
//! Every reply the network layer sends to a player goes through a
//! [`MessageKey`]. Texts come from built-in defaults, optionally overridden
//! by a lang file.

use anyhow::{Context, Result};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    AlreadyOnServer,
    UnknownServer,
    CooldownActive,
    /// Destination interpolated
    SwitchPending,
    /// Self name interpolated
    CurrentServer,
    ChatBlockedPendingStart,
}

pub const ALL_KEYS: [MessageKey; 6] = [
    MessageKey::AlreadyOnServer,
    MessageKey::UnknownServer,
    MessageKey::CooldownActive,
    MessageKey::SwitchPending,
    MessageKey::CurrentServer,
    MessageKey::ChatBlockedPendingStart,
];

impl MessageKey {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKey::AlreadyOnServer => "already-on-server",
            MessageKey::UnknownServer => "unknown-server",
            MessageKey::CooldownActive => "cooldown-active",
            MessageKey::SwitchPending => "switch-pending",
            MessageKey::CurrentServer => "current-server",
            MessageKey::ChatBlockedPendingStart => "chat-blocked-pending-start",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        ALL_KEYS
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(key))
    }

    fn index(self) -> usize {
        self as usize
    }

    fn default_text(self) -> &'static str {
        match self {
            MessageKey::AlreadyOnServer => "You are already connected to this server.",
            MessageKey::UnknownServer => "That server does not exist.",
            MessageKey::CooldownActive => "Please wait before switching servers again.",
            MessageKey::SwitchPending => "Sending you to {0}...",
            MessageKey::CurrentServer => "You are currently on {0}.",
            MessageKey::ChatBlockedPendingStart => "The server is still starting, please wait before chatting.",
        }
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message templates, indexed by [`MessageKey`].
#[derive(Debug, Clone)]
pub struct Messages([String; 6]);

impl Default for Messages {
    fn default() -> Self {
        Self(ALL_KEYS.map(|k| k.default_text().to_string()))
    }
}

impl Messages {
    pub fn template(&self, key: MessageKey) -> &str {
        &self.0[key.index()]
    }

    /// Render `key`, replacing `{0}` with `arg` (or `unknown` when absent).
    pub fn render(&self, key: MessageKey, arg: Option<&str>) -> String {
        self.template(key).replace("{0}", arg.unwrap_or("unknown"))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read lang file: {}", path.display()))?;
        parse_lang_file(&content)
    }
}

/// Parses a `key: value` lang file on top of the built-in defaults.
/// Lines starting with `//` are comments. Unknown keys are silently ignored.
pub fn parse_lang_file(content: &str) -> Result<Messages> {
    let mut msgs = Messages::default();
    for line in content.lines() {
        let line = line.trim();
        if line.starts_with("//") || line.is_empty() {
            continue;
        }
        if let Some((key, val)) = line.split_once(':') {
            if let Some(k) = MessageKey::from_key(key.trim()) {
                msgs.0[k.index()] = val.trim().to_string();
            }
        }
    }
    Ok(msgs)
}
