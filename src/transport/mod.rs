//! Datagram transport for feed distribution.
//!
//! One transport object per socket. The [`Transport`] trait is the seam the
//! publisher sends through, so tests can swap the UDP implementation for a
//! capture sink; [`TransportFactory`] picks the implementation when the
//! publisher builds its feeds.

pub mod udp;

pub use udp::{UdpMulticastTransport, UdpTransportFactory};

use std::sync::Arc;
use thiserror::Error;

/// Socket-layer failures.
///
/// Everything here is fatal at initialization and merely counted at
/// runtime: a market-data publisher keeps publishing.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to create socket: {0}")]
    SocketCreate(#[source] std::io::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to join multicast group {group}: {source}")]
    JoinGroup {
        group: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to leave multicast group {group}: {source}")]
    LeaveGroup {
        group: String,
        #[source]
        source: std::io::Error,
    },

    /// A datagram that went out shorter than the payload. UDP has no
    /// partial delivery, so this is treated as a failed send.
    #[error("partial send: {sent} of {expected} bytes")]
    Send { sent: usize, expected: usize },

    #[error("send failed: {0}")]
    SendIo(#[source] std::io::Error),

    #[error("receive failed: {0}")]
    Receive(#[source] std::io::Error),

    #[error("invalid address {0}")]
    InvalidAddress(String),
}

/// Something datagrams can be sent through.
pub trait Transport: Send + Sync {
    /// Sends one datagram. A partial send is an error.
    fn send(&self, payload: &[u8]) -> Result<(), TransportError>;

    /// Human-readable destination, e.g. `239.100.2.1:15101`.
    fn description(&self) -> String;
}

/// Builds sender transports for the publisher's feeds.
pub trait TransportFactory {
    fn sender(
        &self,
        multicast_ip: &str,
        port: u16,
        interface_ip: &str,
    ) -> Result<Arc<dyn Transport>, TransportError>;
}
