pub mod location;
pub mod packet;
pub mod registry;
pub mod switch;

use std::sync::Arc;
use std::time::Duration;

use crate::core::Scheduler;
use crate::lang::MessageKey;
use crate::user::User;
use location::{LocationCallback, LocationTracker};
use packet::{NetworkPacket, PacketChannel, ProxyTransport};
use registry::ServerRegistry;
use switch::{PendingSwitch, SwitchCoordinator, SwitchRejection};

/// Events decoded from the proxy feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// The proxy told us our own server name.
    ServerName(String),
    /// Full list of servers on the proxy.
    ServerList(Vec<String>),
    /// A player connected to this server.
    PlayerJoined(String),
    /// A player disconnected from the proxy entirely.
    PlayerLeftNetwork(String),
}

/// Command names routed to [`Network::on_server_command`].
pub const SERVER_COMMAND: &[&str] = &["server", "srv"];

/// The network module: registry, switching, and the cross-server contracts.
pub struct Network {
    registry: Arc<ServerRegistry>,
    coordinator: SwitchCoordinator,
    channel: Arc<dyn PacketChannel>,
    tracker: Arc<dyn LocationTracker>,
}

impl Network {
    pub fn new(
        registry: Arc<ServerRegistry>,
        scheduler: Arc<Scheduler>,
        transport: Arc<dyn ProxyTransport>,
        channel: Arc<dyn PacketChannel>,
        tracker: Arc<dyn LocationTracker>,
    ) -> Self {
        let coordinator = SwitchCoordinator::new(Arc::clone(&registry), scheduler, transport);
        Self { registry, coordinator, channel, tracker }
    }

    /// Override the switch delay and cooldown window.
    pub fn with_timing(mut self, delay_ticks: u64, cooldown: Duration) -> Self {
        self.coordinator = self.coordinator.with_timing(delay_ticks, cooldown);
        self
    }

    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    pub fn coordinator(&self) -> &SwitchCoordinator {
        &self.coordinator
    }

    pub fn server_name(&self) -> Option<String> {
        self.registry.self_name()
    }

    pub fn server_exists(&self, name: &str) -> bool {
        self.registry.exists(name)
    }

    /// Apply one event from the proxy feed.
    pub fn handle_feed_event(&self, event: FeedEvent) {
        match event {
            FeedEvent::ServerName(name) => self.registry.set_self_name(name),
            FeedEvent::ServerList(servers) => self.registry.set_servers(servers),
            FeedEvent::PlayerJoined(player) => self.tracker.update_location(&player),
            FeedEvent::PlayerLeftNetwork(player) => self.tracker.remove_location(&player),
        }
    }

    /// Move `user` to `server`, telling them why if it is refused.
    pub fn switch_server(&self, user: &dyn User, server: &str) -> Result<PendingSwitch, SwitchRejection> {
        self.coordinator.request_switch(user, server).inspect_err(|reason| {
            user.send_message(reason.key(), Some(server));
        })
    }

    /// `/server [destination]`
    ///
    /// Without a destination the user is told where they are and `Ok(None)`
    /// is returned; otherwise the outcome of [`Network::switch_server`].
    pub fn on_server_command(
        &self,
        user: &dyn User,
        server: Option<&str>,
    ) -> Result<Option<PendingSwitch>, SwitchRejection> {
        match server {
            None => {
                let current = self.server_name();
                user.send_message(MessageKey::CurrentServer, current.as_deref());
                Ok(None)
            }
            Some(dest) => self.switch_server(user, dest).map(Some),
        }
    }

    /// Dispatch a command line typed by `user`.
    ///
    /// Returns false when the command is not one this module owns.
    pub fn handle_command(&self, user: &dyn User, line: &str) -> bool {
        let mut parts = line.trim().trim_start_matches('/').split_whitespace();
        let Some(cmd) = parts.next() else {
            return false;
        };
        if !SERVER_COMMAND.iter().any(|c| c.eq_ignore_ascii_case(cmd)) {
            return false;
        }
        if let Err(reason) = self.on_server_command(user, parts.next()) {
            tracing::debug!("[net] [server_command] player={} refused={}", user.name(), reason);
        }
        true
    }

    /// Chat gate: nobody talks until the proxy has named this server.
    pub fn chat_allowed(&self, user: &dyn User) -> bool {
        if self.registry.self_name().is_none() {
            user.send_message(MessageKey::ChatBlockedPendingStart, None);
            return false;
        }
        true
    }

    pub fn update_server(&self, player: &str) {
        self.tracker.update_location(player);
    }

    pub fn remove_tracking_data(&self, player: &str) {
        self.tracker.remove_location(player);
    }

    pub fn get_server(&self, player: &str, callback: LocationCallback) {
        self.tracker.get_location(player, callback);
    }

    pub fn send_packet(&self, packet: NetworkPacket, server: &str) {
        self.channel.send(packet, server);
    }

    pub fn send_packet_global(&self, packet: NetworkPacket) {
        self.channel.send_global(packet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::Messages;
    use crate::user::{SaveRequest, Session};
    use location::MemoryLocationTracker;
    use packet::{QueuedPacketChannel, QueuedProxyTransport};
    use tokio::sync::mpsc;

    struct Fixture {
        net: Network,
        user: Session,
        outbox: mpsc::Receiver<String>,
        saves: mpsc::Receiver<SaveRequest>,
        wire: mpsc::Receiver<packet::Outbound>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(ServerRegistry::new());
        let (transport, _proxy_rx) = QueuedProxyTransport::new(8);
        let (channel, wire) = QueuedPacketChannel::new(8);
        let tracker = MemoryLocationTracker::new(Arc::clone(&registry));
        let net = Network::new(
            Arc::clone(&registry),
            Arc::new(Scheduler::new()),
            Arc::new(transport),
            Arc::new(channel),
            Arc::new(tracker),
        );
        let (out_tx, outbox) = mpsc::channel(8);
        let (save_tx, saves) = mpsc::channel(8);
        let user = Session::new("Alice", Arc::new(Messages::default()), out_tx, save_tx);
        Fixture { net, user, outbox, saves, wire }
    }

    #[test]
    fn test_server_command_without_arg_reports_self() {
        let mut f = fixture();
        f.net.handle_feed_event(FeedEvent::ServerName("Hub".into()));
        assert_eq!(f.net.on_server_command(&f.user, None), Ok(None));
        assert_eq!(f.outbox.try_recv().unwrap(), "You are currently on Hub.");
    }

    #[test]
    fn test_server_command_returns_outcome() {
        let mut f = fixture();
        f.net.handle_feed_event(FeedEvent::ServerName("Hub".into()));
        f.net.handle_feed_event(FeedEvent::ServerList(vec!["Hub".into(), "Lobby".into()]));

        assert_eq!(
            f.net.on_server_command(&f.user, Some("Ghost")),
            Err(SwitchRejection::UnknownServer)
        );
        let pending = f.net.on_server_command(&f.user, Some("Lobby")).unwrap().unwrap();
        assert_eq!(pending.destination, "Lobby");
        assert_eq!(f.saves.try_recv().unwrap(), SaveRequest { player: "Alice".into() });
    }

    #[test]
    fn test_with_timing_reaches_coordinator() {
        let f = fixture();
        assert_eq!(f.net.coordinator().delay_ticks(), switch::SWITCH_DELAY_TICKS);
        assert_eq!(f.net.coordinator().cooldown(), switch::SWITCH_COOLDOWN_WINDOW);

        let net = f.net.with_timing(0, Duration::from_millis(500));
        assert_eq!(net.coordinator().delay_ticks(), 1);
        assert_eq!(net.coordinator().cooldown(), Duration::from_millis(500));
    }

    #[test]
    fn test_feed_cannot_name_self_global() {
        let f = fixture();
        f.net.handle_feed_event(FeedEvent::ServerName("Hub".into()));
        f.net.handle_feed_event(FeedEvent::ServerName("Global".into()));
        assert_eq!(f.net.registry().self_name().as_deref(), Some("Hub"));
        assert_eq!(f.net.server_name().as_deref(), Some("Hub"));
    }

    #[test]
    fn test_rejection_is_reported_to_user() {
        let mut f = fixture();
        f.net.handle_feed_event(FeedEvent::ServerList(vec!["Hub".into()]));
        assert!(f.net.handle_command(&f.user, "/server Ghost"));
        assert_eq!(f.outbox.try_recv().unwrap(), "That server does not exist.");
        assert!(f.saves.try_recv().is_err());
    }

    #[test]
    fn test_handle_command_alias_and_unknown() {
        let mut f = fixture();
        f.net.handle_feed_event(FeedEvent::ServerName("Hub".into()));
        f.net.handle_feed_event(FeedEvent::ServerList(vec!["Hub".into(), "Lobby".into()]));

        assert!(!f.net.handle_command(&f.user, "spawn"));
        assert!(!f.net.handle_command(&f.user, "   "));
        assert!(f.net.handle_command(&f.user, "SRV hub"));
        assert_eq!(f.outbox.try_recv().unwrap(), "You are already connected to this server.");
    }

    #[test]
    fn test_chat_gate_until_named() {
        let mut f = fixture();
        assert!(!f.net.chat_allowed(&f.user));
        assert_eq!(
            f.outbox.try_recv().unwrap(),
            "The server is still starting, please wait before chatting."
        );
        f.net.handle_feed_event(FeedEvent::ServerName("Hub".into()));
        assert!(f.net.chat_allowed(&f.user));
        assert!(f.outbox.try_recv().is_err());
    }

    #[test]
    fn test_send_packet_global_uses_global_channel() {
        let mut f = fixture();
        f.net.send_packet_global(NetworkPacket::new(&b"x"[..]));
        f.net.send_packet(NetworkPacket::new(&b"y"[..]), "Lobby");
        assert_eq!(f.wire.try_recv().unwrap().server, packet::GLOBAL_CHANNEL);
        assert_eq!(f.wire.try_recv().unwrap().server, "Lobby");
    }
}
