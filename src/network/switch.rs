//! Server switch coordination
//!
//! A switch request is checked against the registry and the user's cooldown.
//! An approved switch saves the user, tells them where they are going, and
//! queues the proxy reconnect a fixed number of ticks later so the save and
//! any in-flight tick work land before the player is pulled off this server.

use std::sync::Arc;
use std::time::Duration;

use super::packet::ProxyTransport;
use super::registry::ServerRegistry;
use crate::core::Scheduler;
use crate::lang::MessageKey;
use crate::user::User;

/// Cooldown name under which switches are tracked.
pub const SWITCH_COOLDOWN: &str = "Switch Server";

/// Default cooldown between approved switches.
pub const SWITCH_COOLDOWN_WINDOW: Duration = Duration::from_millis(2500);

/// Default ticks between approval and the proxy reconnect.
pub const SWITCH_DELAY_TICKS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SwitchRejection {
    #[error("already on that server")]
    AlreadyOnServer,

    #[error("unknown server")]
    UnknownServer,

    #[error("switch cooldown active")]
    CooldownActive,
}

impl SwitchRejection {
    pub fn key(self) -> MessageKey {
        match self {
            SwitchRejection::AlreadyOnServer => MessageKey::AlreadyOnServer,
            SwitchRejection::UnknownServer => MessageKey::UnknownServer,
            SwitchRejection::CooldownActive => MessageKey::CooldownActive,
        }
    }
}

/// An approved switch waiting for its reconnect to fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSwitch {
    pub player: String,
    pub destination: String,
}

pub struct SwitchCoordinator {
    registry: Arc<ServerRegistry>,
    scheduler: Arc<Scheduler>,
    transport: Arc<dyn ProxyTransport>,
    delay_ticks: u64,
    cooldown: Duration,
}

impl SwitchCoordinator {
    pub fn new(
        registry: Arc<ServerRegistry>,
        scheduler: Arc<Scheduler>,
        transport: Arc<dyn ProxyTransport>,
    ) -> Self {
        Self {
            registry,
            scheduler,
            transport,
            delay_ticks: SWITCH_DELAY_TICKS,
            cooldown: SWITCH_COOLDOWN_WINDOW,
        }
    }

    pub fn with_timing(mut self, delay_ticks: u64, cooldown: Duration) -> Self {
        self.delay_ticks = delay_ticks.max(1);
        self.cooldown = cooldown;
        self
    }

    pub fn delay_ticks(&self) -> u64 {
        self.delay_ticks
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Validate and, if approved, carry out a move of `user` to `destination`.
    ///
    /// Rejections have no side effects. The cooldown check runs last, so a
    /// check that passes is the approval and starts the next window.
    pub fn request_switch(&self, user: &dyn User, destination: &str) -> Result<PendingSwitch, SwitchRejection> {
        let rejected = if self.registry.is_self(destination) {
            Some(SwitchRejection::AlreadyOnServer)
        } else if !self.registry.exists(destination) {
            Some(SwitchRejection::UnknownServer)
        } else if user.is_cooling_down(SWITCH_COOLDOWN, self.cooldown) {
            Some(SwitchRejection::CooldownActive)
        } else {
            None
        };
        if let Some(reason) = rejected {
            tracing::debug!(
                "[net] [switch_rejected] user={} dest={} reason={}",
                user.name(), destination, reason
            );
            return Err(reason);
        }

        user.save();
        user.send_message(MessageKey::SwitchPending, Some(destination));

        let pending = PendingSwitch {
            player: user.name().to_string(),
            destination: destination.to_string(),
        };
        let transport = Arc::clone(&self.transport);
        let task = pending.clone();
        self.scheduler.run_delayed(self.delay_ticks, move || {
            match transport.connect_other(&task) {
                Ok(()) => tracing::info!(
                    "[net] [switch_dispatched] user={} dest={}",
                    task.player, task.destination
                ),
                Err(e) => tracing::warn!(
                    "[net] [switch_dispatch_failed] user={} dest={} err={}",
                    task.player, task.destination, e
                ),
            }
        });

        tracing::info!(
            "[net] [switch_approved] user={} dest={} delay_ticks={}",
            pending.player, pending.destination, self.delay_ticks
        );
        Ok(pending)
    }
}
