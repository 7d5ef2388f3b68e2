//! Control-socket connection to a spawned simulator process.
//!
//! A [`ControlConnection`] owns one outbound endpoint and the raw transport
//! handle for it. The handle exists from construction; connectivity is
//! established exactly once via [`ControlConnection::connect`]. Traffic on
//! the established socket belongs to the simulator's own wire protocol and
//! is not handled here.

use std::net::{Ipv4Addr, SocketAddrV4};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use thiserror::Error;

/// Errors from the control-socket layer.
#[derive(Debug, Error)]
pub enum SocketError {
    /// The OS refused to hand out a socket handle.
    #[error("failed to create control socket: {0}")]
    Create(#[source] std::io::Error),

    /// The connect syscall to the simulator endpoint failed.
    #[error("failed to connect control socket to {addr}: {source}")]
    Connect {
        /// Endpoint the connect was aimed at
        addr: SocketAddrV4,
        /// Underlying OS error
        source: std::io::Error,
    },
}

/// TCP connection to a simulator control port.
///
/// The address is immutable after construction. The socket handle is created
/// eagerly so accessors never observe a missing handle; whether the handle is
/// connected depends on [`connect`](Self::connect) having succeeded.
#[derive(Debug)]
pub struct ControlConnection {
    /// Simulator control endpoint
    addr: SocketAddrV4,
    /// Raw handle, unconnected until `connect` succeeds
    socket: Socket,
}

impl ControlConnection {
    /// Create an unconnected control connection to `host:port`.
    ///
    /// Allocates the socket handle but performs no network I/O.
    ///
    /// # Errors
    ///
    /// [`SocketError::Create`] if the OS cannot allocate the handle.
    pub fn new(host: Ipv4Addr, port: u16) -> Result<Self, SocketError> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
            .map_err(SocketError::Create)?;

        Ok(Self { addr: SocketAddrV4::new(host, port), socket })
    }

    /// Endpoint this connection targets, as a copy.
    #[must_use]
    pub fn address(&self) -> SocketAddrV4 {
        self.addr
    }

    /// The transport handle.
    ///
    /// Guaranteed to exist from construction; not guaranteed to be connected.
    #[must_use]
    pub fn socket(&self) -> &Socket {
        &self.socket
    }

    /// Establish the TCP connection with a single connect syscall.
    ///
    /// Call exactly once per connection: reconnecting an already-used handle
    /// is OS-defined behavior, not something this type guards against.
    ///
    /// # Errors
    ///
    /// [`SocketError::Connect`] wrapping the OS error on failure.
    pub fn connect(&mut self) -> Result<(), SocketError> {
        self.socket
            .connect(&SockAddr::from(self.addr))
            .map_err(|source| SocketError::Connect { addr: self.addr, source })?;

        tracing::debug!(addr = %self.addr, "control socket connected");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use super::*;

    const PORT_NUMBER: u16 = 8800;

    #[test]
    fn new_allocates_handle_without_io() {
        let connection = ControlConnection::new(Ipv4Addr::LOCALHOST, PORT_NUMBER).unwrap();

        assert_eq!(
            connection.address(),
            SocketAddrV4::new(Ipv4Addr::LOCALHOST, PORT_NUMBER)
        );
    }

    #[test]
    fn address_returns_copy() {
        let connection = ControlConnection::new(Ipv4Addr::LOCALHOST, PORT_NUMBER).unwrap();

        let first = connection.address();
        let second = connection.address();
        assert_eq!(first, second);
    }

    #[test]
    fn socket_exists_before_connect() {
        let connection = ControlConnection::new(Ipv4Addr::LOCALHOST, PORT_NUMBER).unwrap();

        // Existence only: the handle is not connected yet.
        assert!(connection.socket().peer_addr().is_err());
    }

    #[test]
    fn connect_succeeds_against_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut connection = ControlConnection::new(Ipv4Addr::LOCALHOST, port).unwrap();
        connection.connect().unwrap();

        assert!(connection.socket().peer_addr().is_ok());
    }

    #[test]
    fn connect_fails_when_nothing_listens() {
        // Bind then drop to find a port that is very likely closed.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut connection = ControlConnection::new(Ipv4Addr::LOCALHOST, port).unwrap();
        let error = connection.connect().unwrap_err();

        assert!(matches!(error, SocketError::Connect { addr, .. } if addr.port() == port));
    }
}
