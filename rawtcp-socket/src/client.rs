//! Client role: connect to a remote server.
//!
//! ```text
//! Uninitialized --new--> SocketReady --connect--> Connected --close--> Uninitialized
//! ```
//!
//! The communication handle is created at construction. A failed connect
//! discards it, and `connect` after `close` or after a failure creates a
//! fresh one before dialing.

use crate::connection::{Connection, Role};
use crate::error::{ConnectionError, SocketStep};
use rawtcp_common::addr::{parse_remote_address, socket_addr};
use rawtcp_common::ClientPhase;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::SocketAddr;
use tracing::debug;

/// A TCP client connecting to a fixed remote address.
#[derive(Debug)]
pub struct ClientConnection {
    connection: Connection,
    remote_addr: SocketAddr,
}

impl ClientConnection {
    /// Create the communication handle for a connection to `address:port`.
    ///
    /// `address` is mandatory and must be a literal IP address. Address
    /// reuse is enabled on the handle.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::InvalidAddress`] for a missing or malformed
    /// address and [`ConnectionError::ResourceAcquisition`] if the socket
    /// cannot be created or configured.
    pub fn new(port: u16, address: &str) -> Result<Self, ConnectionError> {
        let ip = parse_remote_address(address)
            .map_err(|e| ConnectionError::invalid_address(address, e))?;
        let remote_addr = socket_addr(ip, port);

        let mut client = Self {
            connection: Connection::new(port, address),
            remote_addr,
        };
        client.open_socket()?;
        Ok(client)
    }

    /// Connect to the remote address, blocking until the OS call completes.
    ///
    /// This blocks even if non-blocking mode was engaged beforehand; that
    /// mode is back in effect once the connection is up.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::AlreadyConnected`] when connected, and
    /// [`ConnectionError::ResourceAcquisition`] if the OS connect (or the
    /// re-creation of a released handle) fails. The client is never left
    /// connected after an error.
    pub fn connect(&mut self) -> Result<(), ConnectionError> {
        if self.connection.is_connected() {
            return Err(ConnectionError::AlreadyConnected);
        }
        if !self.connection.state().is_socket_open() {
            self.open_socket()?;
        }

        let target = SockAddr::from(self.remote_addr);
        let nonblocking = self.connection.is_nonblocking();
        let result = match self.connection.socket() {
            Some(socket) => dial(socket, &target, nonblocking),
            None => return Err(ConnectionError::NotConnected),
        };

        if let Err(e) = result {
            // The handle's state is unspecified after a failed connect.
            drop(self.connection.detach());
            return Err(ConnectionError::acquisition(
                SocketStep::Connect,
                self.remote_addr,
                e,
            ));
        }

        self.connection.state_mut().mark_connected();
        debug!(remote = %self.remote_addr, "connected");
        Ok(())
    }

    /// The address `connect` dials.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ClientPhase {
        self.connection.state().client_phase()
    }

    fn open_socket(&mut self) -> Result<(), ConnectionError> {
        let socket = Socket::new(
            Domain::for_address(self.remote_addr),
            Type::STREAM,
            Some(Protocol::TCP),
        )
        .map_err(|e| ConnectionError::acquisition(SocketStep::Socket, self.remote_addr, e))?;

        socket.set_reuse_address(true).map_err(|e| {
            ConnectionError::acquisition(SocketStep::ReuseAddress, self.remote_addr, e)
        })?;

        drop(self.connection.attach(socket));
        Ok(())
    }
}

/// Connect in blocking mode, then put back the caller's non-blocking mode.
fn dial(socket: &Socket, target: &SockAddr, nonblocking: bool) -> io::Result<()> {
    if nonblocking {
        socket.set_nonblocking(false)?;
    }
    socket.connect(target)?;
    if nonblocking {
        socket.set_nonblocking(true)?;
    }
    Ok(())
}

impl Role for ClientConnection {
    fn connection(&self) -> &Connection {
        &self.connection
    }

    fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ReadOutcome;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// A port with nothing listening on it.
    fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_new_client_has_socket() {
        let client = ClientConnection::new(8081, "127.0.0.1").unwrap();
        assert_eq!(client.phase(), ClientPhase::SocketReady);
        assert_eq!(client.port(), 8081);
        assert_eq!(client.address(), "127.0.0.1");
        assert_eq!(client.remote_addr().to_string(), "127.0.0.1:8081");
        #[cfg(unix)]
        assert!(client.connection().as_raw_fd().is_some());
    }

    #[test]
    fn test_address_is_mandatory() {
        let err = ClientConnection::new(8081, "").unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidAddress { .. }));

        let err = ClientConnection::new(8081, "example.com").unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidAddress { .. }));
    }

    #[test]
    fn test_io_before_connect() {
        let mut client = ClientConnection::new(8081, "127.0.0.1").unwrap();
        let mut buf = [0u8; 4];
        assert!(client.read(&mut buf).unwrap_err().is_not_connected());
        assert!(client.write(b"AB").unwrap_err().is_not_connected());
        assert!(client.close().unwrap_err().is_not_connected());
        assert_eq!(client.phase(), ClientPhase::SocketReady);
    }

    #[test]
    fn test_connect_refused() {
        let mut client = ClientConnection::new(closed_port(), "127.0.0.1").unwrap();
        let err = client.connect().unwrap_err();

        assert_eq!(err.step(), Some(SocketStep::Connect));
        assert!(!client.is_connected());
        assert_eq!(client.phase(), ClientPhase::Uninitialized);
    }

    #[test]
    fn test_connect_and_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let peer = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 2];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(&buf).unwrap();
        });

        let mut client = ClientConnection::new(port, "127.0.0.1").unwrap();
        client.connect().unwrap();
        assert_eq!(client.phase(), ClientPhase::Connected);
        assert!(matches!(
            client.connect().unwrap_err(),
            ConnectionError::AlreadyConnected
        ));

        assert_eq!(client.write(b"AB").unwrap(), 2);
        let mut buf = [0u8; 2];
        let mut received = 0;
        while received < 2 {
            received += client.read(&mut buf[received..]).unwrap().len();
        }
        assert_eq!(&buf, b"AB");
        peer.join().unwrap();

        client.close().unwrap();
        assert_eq!(client.phase(), ClientPhase::Uninitialized);
    }

    #[test]
    fn test_connect_with_nonblock_engaged() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut client = ClientConnection::new(port, "127.0.0.1").unwrap();
        client.set_nonblock().unwrap();
        client.connect().unwrap();
        assert_eq!(client.phase(), ClientPhase::Connected);

        let (_peer, _) = listener.accept().unwrap();
        assert!(client.connection().is_nonblocking());
        #[cfg(unix)]
        assert!(client.connection().socket().unwrap().nonblocking().unwrap());

        let mut buf = [0u8; 4];
        assert_eq!(client.read(&mut buf).unwrap(), ReadOutcome::NoData);
    }

    #[test]
    fn test_reconnect_after_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let peer = thread::spawn(move || {
            for _ in 0..2 {
                let (mut stream, _) = listener.accept().unwrap();
                let mut buf = Vec::new();
                stream.read_to_end(&mut buf).unwrap();
            }
        });

        let mut client = ClientConnection::new(port, "127.0.0.1").unwrap();
        client.connect().unwrap();
        client.close().unwrap();

        client.connect().unwrap();
        assert!(client.is_connected());
        client.close().unwrap();

        peer.join().unwrap();
    }
}
