//! Cross-server messaging contracts
//!
//! [`PacketChannel`] carries opaque packets between backend servers,
//! [`ProxyTransport`] carries instructions to the proxy front-end. Both are
//! fire-and-forget: ordering and delivery belong to whatever sits behind them.

use bytes::Bytes;
use tokio::sync::mpsc;

use super::switch::PendingSwitch;

/// The reserved "every server" destination. Never a real server name.
pub const GLOBAL_CHANNEL: &str = "global";

/// Opaque payload carried between servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPacket {
    pub payload: Bytes,
}

impl NetworkPacket {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self { payload: payload.into() }
    }
}

pub trait PacketChannel: Send + Sync {
    /// Send `packet` to `server`, or to every server when it is [`GLOBAL_CHANNEL`].
    fn send(&self, packet: NetworkPacket, server: &str);

    /// Broadcast to all servers. Always delegates to [`PacketChannel::send`].
    fn send_global(&self, packet: NetworkPacket) {
        self.send(packet, GLOBAL_CHANNEL);
    }
}

/// Instructions understood by the proxy front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyInstruction {
    /// Move a connected player to another backend server.
    ConnectOther { player: String, server: String },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport queue is closed")]
    Closed,

    #[error("transport queue is full")]
    Full,
}

impl<T> From<mpsc::error::TrySendError<T>> for TransportError {
    fn from(e: mpsc::error::TrySendError<T>) -> Self {
        match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Full,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        }
    }
}

pub trait ProxyTransport: Send + Sync {
    /// Ask the proxy to reconnect the player to the destination.
    ///
    /// A player who already left should make this a no-op at the proxy.
    fn connect_other(&self, switch: &PendingSwitch) -> Result<(), TransportError>;
}

/// A packet together with its destination, as queued by [`QueuedPacketChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub server: String,
    pub packet: NetworkPacket,
}

/// [`PacketChannel`] that forwards into a bounded queue drained by the wire task.
pub struct QueuedPacketChannel {
    tx: mpsc::Sender<Outbound>,
}

impl QueuedPacketChannel {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl PacketChannel for QueuedPacketChannel {
    fn send(&self, packet: NetworkPacket, server: &str) {
        let out = Outbound { server: server.to_string(), packet };
        if let Err(e) = self.tx.try_send(out) {
            tracing::warn!("[net] [packet_dropped] server={} err={}", server, TransportError::from(e));
        }
    }
}

/// [`ProxyTransport`] that forwards into a bounded queue drained by the proxy link.
pub struct QueuedProxyTransport {
    tx: mpsc::Sender<ProxyInstruction>,
}

impl QueuedProxyTransport {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ProxyInstruction>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl ProxyTransport for QueuedProxyTransport {
    fn connect_other(&self, switch: &PendingSwitch) -> Result<(), TransportError> {
        self.tx.try_send(ProxyInstruction::ConnectOther {
            player: switch.player.clone(),
            server: switch.destination.clone(),
        })?;
        Ok(())
    }
}
