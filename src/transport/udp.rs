//! UDP multicast sockets.
//!
//! Senders and receivers are distinguished at construction. Both are
//! non-blocking on the hot path: `send` writes one datagram to the
//! remembered group address, `receive` returns `None` instead of blocking
//! when nothing is queued.

use crate::transport::{Transport, TransportError, TransportFactory};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default multicast TTL: stay on the local network.
const DEFAULT_TTL: u32 = 1;

/// Default receive buffer passed to `recv_from`.
const DEFAULT_RECV_SIZE: usize = 65_536;

/// Environment variable overriding the sender TTL.
const TTL_ENV_VAR: &str = "MULTICAST_TTL";

fn parse_ipv4(value: &str) -> Result<Ipv4Addr, TransportError> {
    value
        .parse::<Ipv4Addr>()
        .map_err(|_| TransportError::InvalidAddress(value.to_string()))
}

fn ttl_from_env() -> u32 {
    match std::env::var(TTL_ENV_VAR) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            warn!(%value, "ignoring unparseable {TTL_ENV_VAR}");
            DEFAULT_TTL
        }),
        Err(_) => DEFAULT_TTL,
    }
}

enum Role {
    Sender { destination: SocketAddr },
    Receiver { group: Ipv4Addr, interface: Ipv4Addr },
}

/// One UDP multicast socket, sender or receiver.
pub struct UdpMulticastTransport {
    socket: UdpSocket,
    role: Role,
    description: String,
}

impl UdpMulticastTransport {
    /// Creates a multicast sender bound to an ephemeral local port.
    ///
    /// TTL defaults to 1 (overridable with `MULTICAST_TTL`); loopback is
    /// left enabled so local consumers see the feed.
    pub fn sender(
        multicast_ip: &str,
        port: u16,
        interface_ip: &str,
    ) -> Result<Self, TransportError> {
        let group = parse_ipv4(multicast_ip)?;
        let interface = parse_ipv4(interface_ip)?;

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(TransportError::SocketCreate)?;
        if !interface.is_unspecified() {
            socket
                .set_multicast_if_v4(&interface)
                .map_err(TransportError::SocketCreate)?;
        }
        socket
            .set_multicast_ttl_v4(ttl_from_env())
            .map_err(TransportError::SocketCreate)?;
        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);
        socket
            .bind(&bind_addr.into())
            .map_err(|source| TransportError::Bind {
                addr: bind_addr.to_string(),
                source,
            })?;

        let destination = SocketAddr::V4(SocketAddrV4::new(group, port));
        debug!(%destination, "created multicast sender");
        Ok(Self {
            socket: socket.into(),
            role: Role::Sender { destination },
            description: format!("{multicast_ip}:{port}"),
        })
    }

    /// Creates a multicast receiver: binds the port with address reuse,
    /// joins the group on the chosen interface, and switches the socket to
    /// non-blocking mode.
    pub fn receiver(
        multicast_ip: &str,
        port: u16,
        interface_ip: &str,
    ) -> Result<Self, TransportError> {
        let group = parse_ipv4(multicast_ip)?;
        let interface = parse_ipv4(interface_ip)?;

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(TransportError::SocketCreate)?;
        socket
            .set_reuse_address(true)
            .map_err(TransportError::SocketCreate)?;
        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        socket
            .bind(&bind_addr.into())
            .map_err(|source| TransportError::Bind {
                addr: bind_addr.to_string(),
                source,
            })?;
        socket
            .join_multicast_v4(&group, &interface)
            .map_err(|source| TransportError::JoinGroup {
                group: multicast_ip.to_string(),
                source,
            })?;
        socket
            .set_nonblocking(true)
            .map_err(TransportError::SocketCreate)?;

        debug!(group = %multicast_ip, port, "joined multicast group");
        Ok(Self {
            socket: socket.into(),
            role: Role::Receiver { group, interface },
            description: format!("{multicast_ip}:{port}"),
        })
    }

    /// Sets the kernel send buffer size.
    pub fn set_send_buffer_size(&self, size: usize) -> Result<(), TransportError> {
        let socket = Socket::from(self.socket.try_clone().map_err(TransportError::SocketCreate)?);
        socket
            .set_send_buffer_size(size)
            .map_err(TransportError::SocketCreate)
    }

    /// Sets the kernel receive buffer size.
    pub fn set_recv_buffer_size(&self, size: usize) -> Result<(), TransportError> {
        let socket = Socket::from(self.socket.try_clone().map_err(TransportError::SocketCreate)?);
        socket
            .set_recv_buffer_size(size)
            .map_err(TransportError::SocketCreate)
    }

    /// Enables or disables multicast loopback on a sender.
    pub fn set_multicast_loop(&self, enable: bool) -> Result<(), TransportError> {
        self.socket
            .set_multicast_loop_v4(enable)
            .map_err(TransportError::SocketCreate)
    }

    /// Non-blocking receive: one datagram, or `None` when nothing is
    /// queued.
    pub fn receive(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut buffer = vec![0u8; DEFAULT_RECV_SIZE];
        match self.socket.recv_from(&mut buffer) {
            Ok((received, _)) => {
                buffer.truncate(received);
                Ok(Some(buffer))
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(TransportError::Receive(err)),
        }
    }

    /// Receive with a deadline: polls until a datagram arrives or
    /// `timeout` elapses.
    pub fn receive_timeout(&self, timeout: Duration) -> Result<Option<Vec<u8>>, TransportError> {
        self.socket
            .set_read_timeout(Some(timeout))
            .map_err(TransportError::Receive)?;
        self.socket
            .set_nonblocking(false)
            .map_err(TransportError::Receive)?;
        let mut buffer = vec![0u8; DEFAULT_RECV_SIZE];
        let result = match self.socket.recv_from(&mut buffer) {
            Ok((received, _)) => {
                buffer.truncate(received);
                Ok(Some(buffer))
            }
            Err(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(err) => Err(TransportError::Receive(err)),
        };
        // Back to the non-blocking hot path regardless of outcome.
        self.socket
            .set_nonblocking(true)
            .map_err(TransportError::Receive)?;
        result
    }

    /// Leaves the group on a receiver. Senders are a no-op.
    pub fn leave_group(&self) -> Result<(), TransportError> {
        if let Role::Receiver { group, interface } = &self.role {
            self.socket
                .leave_multicast_v4(group, interface)
                .map_err(|source| TransportError::LeaveGroup {
                    group: group.to_string(),
                    source,
                })?;
        }
        Ok(())
    }
}

impl Transport for UdpMulticastTransport {
    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        let Role::Sender { destination } = &self.role else {
            return Err(TransportError::Send {
                sent: 0,
                expected: payload.len(),
            });
        };
        let sent = self
            .socket
            .send_to(payload, destination)
            .map_err(TransportError::SendIo)?;
        if sent != payload.len() {
            return Err(TransportError::Send {
                sent,
                expected: payload.len(),
            });
        }
        Ok(())
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

impl Drop for UdpMulticastTransport {
    fn drop(&mut self) {
        if let Err(err) = self.leave_group() {
            debug!(error = %err, "failed to leave multicast group on drop");
        }
    }
}

/// The production [`TransportFactory`]: real multicast sender sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpTransportFactory;

impl TransportFactory for UdpTransportFactory {
    fn sender(
        &self,
        multicast_ip: &str,
        port: u16,
        interface_ip: &str,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        Ok(Arc::new(UdpMulticastTransport::sender(
            multicast_ip,
            port,
            interface_ip,
        )?))
    }
}
