//! Server role: bind, listen and accept.
//!
//! A [`ServerConnection`] owns a listening handle next to the embedded
//! [`Connection`]. Peers are accepted one at a time; each accept replaces the
//! communication handle, so a server loop closes the current peer before
//! accepting the next one.
//!
//! ```text
//! Uninitialized --new--> SocketReady --listen--> Listening --accept--> Connected
//!                                                    ^                     |
//!                                                    +-------close---------+
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use rawtcp_socket::{ReadOutcome, Role, ServerConnection};
//!
//! # fn example() -> Result<(), rawtcp_socket::ConnectionError> {
//! let mut server = ServerConnection::new(8081, Some("127.0.0.1"))?;
//! server.listen()?;
//!
//! loop {
//!     let peer = server.accept()?;
//!     println!("accepted {peer}");
//!
//!     let mut buf = [0u8; 1024];
//!     while let ReadOutcome::Data(n) = server.read(&mut buf)? {
//!         server.write(&buf[..n])?;
//!     }
//!     server.close()?;
//! }
//! # }
//! ```

use crate::connection::{to_socket_addr, Connection, Role};
use crate::error::{ConnectionError, SocketStep};
use rawtcp_common::addr::{parse_bind_address, socket_addr};
use rawtcp_common::ServerPhase;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::SocketAddr;
use tracing::{debug, warn};

/// Maximum number of pending, not yet accepted connections.
pub const LISTEN_BACKLOG: i32 = 50;

/// A TCP server accepting one peer at a time.
#[derive(Debug)]
pub struct ServerConnection {
    connection: Connection,
    listener: Socket,
    bound_addr: SocketAddr,
    peer_addr: Option<SocketAddr>,
}

impl ServerConnection {
    /// Create the listening handle and bind it to `address:port`.
    ///
    /// `None` or an empty `address` binds to every local address. Address
    /// reuse is always enabled so a recently used port can be bound again
    /// right away. Port `0` lets the OS pick a port; see
    /// [`local_addr`](Self::local_addr).
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::InvalidAddress`] if `address` is not a
    /// literal IP address, and [`ConnectionError::ResourceAcquisition`] if
    /// creating, configuring or binding the socket fails, or if the OS
    /// cannot report the bound address.
    pub fn new(port: u16, address: Option<&str>) -> Result<Self, ConnectionError> {
        let text = address.unwrap_or_default();
        let ip =
            parse_bind_address(address).map_err(|e| ConnectionError::invalid_address(text, e))?;
        let requested = socket_addr(ip, port);

        let listener = Socket::new(
            Domain::for_address(requested),
            Type::STREAM,
            Some(Protocol::TCP),
        )
        .map_err(|e| ConnectionError::acquisition(SocketStep::Socket, requested, e))?;

        listener
            .set_reuse_address(true)
            .map_err(|e| ConnectionError::acquisition(SocketStep::ReuseAddress, requested, e))?;

        listener
            .bind(&SockAddr::from(requested))
            .map_err(|e| ConnectionError::acquisition(SocketStep::Bind, requested, e))?;

        let bound_addr = listener
            .local_addr()
            .and_then(to_socket_addr)
            .map_err(|e| ConnectionError::acquisition(SocketStep::Bind, requested, e))?;

        let mut connection = Connection::new(port, text);
        connection.state_mut().open_server();
        debug!(%bound_addr, "server socket bound");

        Ok(Self {
            connection,
            listener,
            bound_addr,
            peer_addr: None,
        })
    }

    /// Put the listening handle into the listen state with a backlog of
    /// [`LISTEN_BACKLOG`].
    pub fn listen(&mut self) -> Result<(), ConnectionError> {
        self.listener
            .listen(LISTEN_BACKLOG)
            .map_err(|e| ConnectionError::acquisition(SocketStep::Listen, self.bound_addr, e))?;
        self.connection.state_mut().mark_listening();
        debug!(addr = %self.bound_addr, backlog = LISTEN_BACKLOG, "listening");
        Ok(())
    }

    /// Block until a peer connects and attach it as the current connection.
    ///
    /// Returns the peer's address. There is no timeout. A previous
    /// connection that was not closed is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::NotListening`] before [`listen`](Self::listen)
    /// and [`ConnectionError::ResourceAcquisition`] if the OS accept fails.
    /// The server stays listening in both cases.
    pub fn accept(&mut self) -> Result<SocketAddr, ConnectionError> {
        if !self.connection.state().is_listening() {
            return Err(ConnectionError::NotListening);
        }

        let (socket, peer) = loop {
            match self.listener.accept() {
                Ok(accepted) => break accepted,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(ConnectionError::acquisition(
                        SocketStep::Accept,
                        self.bound_addr,
                        e,
                    ))
                }
            }
        };
        let peer = to_socket_addr(peer)
            .map_err(|e| ConnectionError::acquisition(SocketStep::Accept, self.bound_addr, e))?;

        if self.connection.is_connected() {
            warn!(
                previous = ?self.peer_addr,
                %peer,
                "accepting over an unclosed connection; dropping it"
            );
        }
        drop(self.connection.attach(socket));
        self.connection.state_mut().mark_connected();
        self.peer_addr = Some(peer);

        debug!(%peer, "accepted connection");
        Ok(peer)
    }

    /// The address the listening handle is bound to, as reported by the OS.
    pub fn local_addr(&self) -> Result<SocketAddr, ConnectionError> {
        Ok(to_socket_addr(self.listener.local_addr()?)?)
    }

    /// The address recorded at bind time.
    pub fn bound_addr(&self) -> SocketAddr {
        self.bound_addr
    }

    /// The most recently accepted peer, if any.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ServerPhase {
        self.connection.state().server_phase()
    }
}

impl Role for ServerConnection {
    fn connection(&self) -> &Connection {
        &self.connection
    }

    fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }
}
