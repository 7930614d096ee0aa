//! The communication capability shared by both connection roles.
//!
//! A [`Connection`] owns the communication handle of one TCP connection and
//! the [`ConnectionState`] describing it. Server and client roles embed a
//! `Connection` and expose it through the [`Role`] trait, which provides the
//! uniform read/write/close operations.
//!
//! Reads and writes are single system calls. A read may return fewer bytes
//! than the buffer holds and a write may accept fewer bytes than offered;
//! looping until a message is complete is the caller's job.
//!
//! # Examples
//!
//! ```no_run
//! use rawtcp_socket::{ClientConnection, ReadOutcome, Role};
//!
//! # fn example() -> Result<(), rawtcp_socket::ConnectionError> {
//! let mut client = ClientConnection::new(8081, "127.0.0.1")?;
//! client.connect()?;
//!
//! let written = client.write(b"AB")?;
//! assert!(written <= 2);
//!
//! let mut buf = [0u8; 16];
//! match client.read(&mut buf)? {
//!     ReadOutcome::Data(n) => println!("{:?}", &buf[..n]),
//!     ReadOutcome::PeerClosed => println!("peer closed"),
//!     ReadOutcome::NoData => unreachable!("blocking read"),
//! }
//! client.close()?;
//! # Ok(())
//! # }
//! ```

use crate::error::ConnectionError;
use rawtcp_common::ConnectionState;
use socket2::{SockAddr, Socket};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use tracing::{debug, trace, warn};

/// Result of a single read on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were placed at the start of the buffer.
    Data(usize),
    /// The peer shut down its side of the connection (the OS read returned 0).
    PeerClosed,
    /// Non-blocking mode is engaged and nothing was pending.
    NoData,
}

impl ReadOutcome {
    /// Number of bytes delivered; zero for [`PeerClosed`](Self::PeerClosed)
    /// and [`NoData`](Self::NoData).
    pub fn len(&self) -> usize {
        match self {
            Self::Data(n) => *n,
            Self::PeerClosed | Self::NoData => 0,
        }
    }

    /// True when no bytes were delivered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True for an orderly peer shutdown.
    pub fn is_peer_closed(&self) -> bool {
        matches!(self, Self::PeerClosed)
    }

    /// True when a non-blocking read found nothing pending.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }
}

/// One logical TCP connection: a port, an address, the communication handle
/// and the lifecycle state.
///
/// The handle is exclusively owned and released on [`close`](Self::close) or
/// when the `Connection` is dropped.
#[derive(Debug)]
pub struct Connection {
    port: u16,
    address: String,
    socket: Option<Socket>,
    state: ConnectionState,
    nonblocking: bool,
}

impl Connection {
    pub(crate) fn new(port: u16, address: impl Into<String>) -> Self {
        Self {
            port,
            address: address.into(),
            socket: None,
            state: ConnectionState::INITIALIZED,
            nonblocking: false,
        }
    }

    /// Install a fresh communication handle and set `SOCKET_OPEN`.
    ///
    /// Returns the handle it replaces, if any. A new handle always starts in
    /// blocking mode.
    pub(crate) fn attach(&mut self, socket: Socket) -> Option<Socket> {
        let previous = self.socket.replace(socket);
        self.state.release_socket();
        self.state.open_socket();
        self.nonblocking = false;
        previous
    }

    /// Take the communication handle out and drop back to the pre-connection
    /// phase.
    pub(crate) fn detach(&mut self) -> Option<Socket> {
        self.state.release_socket();
        self.nonblocking = false;
        self.socket.take()
    }

    pub(crate) fn state_mut(&mut self) -> &mut ConnectionState {
        &mut self.state
    }

    pub(crate) fn socket(&self) -> Option<&Socket> {
        self.socket.as_ref()
    }

    /// The port supplied at construction.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The address supplied at construction (may be empty for a server).
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The current lifecycle flags.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True while a peer is attached.
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Whether non-blocking mode was engaged with
    /// [`set_nonblock`](Self::set_nonblock).
    pub fn is_nonblocking(&self) -> bool {
        self.nonblocking
    }

    /// Local address of the communication handle.
    pub fn local_addr(&self) -> Result<SocketAddr, ConnectionError> {
        let socket = self.socket.as_ref().ok_or(ConnectionError::NotConnected)?;
        Ok(to_socket_addr(socket.local_addr()?)?)
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> Result<SocketAddr, ConnectionError> {
        if !self.state.is_connected() {
            return Err(ConnectionError::NotConnected);
        }
        let socket = self.socket.as_ref().ok_or(ConnectionError::NotConnected)?;
        Ok(to_socket_addr(socket.peer_addr()?)?)
    }

    /// Raw descriptor of the communication handle, `None` when no handle is
    /// open.
    #[cfg(unix)]
    pub fn as_raw_fd(&self) -> Option<std::os::unix::io::RawFd> {
        use std::os::unix::io::AsRawFd;
        self.socket.as_ref().map(AsRawFd::as_raw_fd)
    }

    /// Read once into `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::NotConnected`] if no peer is attached, or
    /// [`ConnectionError::Io`] if the OS read fails for a reason other than
    /// "would block".
    pub fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome, ConnectionError> {
        let socket = self.connected_socket()?;
        let outcome = read_once(socket, buf)?;
        trace!(?outcome, capacity = buf.len(), "read");
        Ok(outcome)
    }

    /// Read whatever is immediately available without blocking.
    ///
    /// The handle is switched to non-blocking mode for exactly one read and
    /// switched back before returning, whatever the read's result. If
    /// non-blocking mode was already engaged it stays engaged.
    pub fn partial_read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome, ConnectionError> {
        if self.nonblocking {
            return self.read(buf);
        }

        let socket = self.connected_socket()?;
        let _guard = NonBlockingGuard::engage(socket)?;
        let outcome = read_once(socket, buf)?;
        trace!(?outcome, capacity = buf.len(), "partial read");
        Ok(outcome)
    }

    /// Write once from `data`, returning how many bytes the OS accepted.
    ///
    /// In non-blocking mode a full send buffer surfaces as
    /// [`ConnectionError::Io`] with kind [`io::ErrorKind::WouldBlock`].
    pub fn write(&mut self, data: &[u8]) -> Result<usize, ConnectionError> {
        let socket = self.connected_socket()?;
        if data.is_empty() {
            return Ok(0);
        }

        let mut handle = socket;
        let written = loop {
            match handle.write(data) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        trace!(written, requested = data.len(), "write");
        Ok(written)
    }

    /// Switch the communication handle to non-blocking mode.
    pub fn set_nonblock(&mut self) -> Result<(), ConnectionError> {
        let socket = self.socket.as_ref().ok_or(ConnectionError::NotConnected)?;
        socket.set_nonblocking(true)?;
        self.nonblocking = true;
        Ok(())
    }

    /// Switch the communication handle back to blocking mode.
    pub fn unset_nonblock(&mut self) -> Result<(), ConnectionError> {
        let socket = self.socket.as_ref().ok_or(ConnectionError::NotConnected)?;
        socket.set_nonblocking(false)?;
        self.nonblocking = false;
        Ok(())
    }

    /// Release the communication handle.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::NotConnected`], without touching anything,
    /// if no peer is attached.
    pub fn close(&mut self) -> Result<(), ConnectionError> {
        if !self.state.is_connected() {
            return Err(ConnectionError::NotConnected);
        }
        drop(self.detach());
        debug!(port = self.port, "connection closed");
        Ok(())
    }

    fn connected_socket(&self) -> Result<&Socket, ConnectionError> {
        if !self.state.is_connected() {
            return Err(ConnectionError::NotConnected);
        }
        self.socket.as_ref().ok_or(ConnectionError::NotConnected)
    }
}

/// Shared read/write/close surface of the server and client roles.
///
/// Implementors only provide access to their embedded [`Connection`]; every
/// other method forwards to it.
pub trait Role {
    /// The embedded communication capability.
    fn connection(&self) -> &Connection;

    /// The embedded communication capability, mutably.
    fn connection_mut(&mut self) -> &mut Connection;

    /// See [`Connection::read`].
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome, ConnectionError> {
        self.connection_mut().read(buf)
    }

    /// See [`Connection::partial_read`].
    fn partial_read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome, ConnectionError> {
        self.connection_mut().partial_read(buf)
    }

    /// See [`Connection::write`].
    fn write(&mut self, data: &[u8]) -> Result<usize, ConnectionError> {
        self.connection_mut().write(data)
    }

    /// See [`Connection::set_nonblock`].
    fn set_nonblock(&mut self) -> Result<(), ConnectionError> {
        self.connection_mut().set_nonblock()
    }

    /// See [`Connection::unset_nonblock`].
    fn unset_nonblock(&mut self) -> Result<(), ConnectionError> {
        self.connection_mut().unset_nonblock()
    }

    /// See [`Connection::close`].
    fn close(&mut self) -> Result<(), ConnectionError> {
        self.connection_mut().close()
    }

    /// See [`Connection::state`].
    fn state(&self) -> ConnectionState {
        self.connection().state()
    }

    /// See [`Connection::is_connected`].
    fn is_connected(&self) -> bool {
        self.connection().is_connected()
    }

    /// See [`Connection::port`].
    fn port(&self) -> u16 {
        self.connection().port()
    }

    /// See [`Connection::address`].
    fn address(&self) -> &str {
        self.connection().address()
    }
}

/// Keeps a handle in non-blocking mode until dropped.
struct NonBlockingGuard<'a> {
    socket: &'a Socket,
}

impl<'a> NonBlockingGuard<'a> {
    fn engage(socket: &'a Socket) -> io::Result<Self> {
        socket.set_nonblocking(true)?;
        Ok(Self { socket })
    }
}

impl Drop for NonBlockingGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.socket.set_nonblocking(false) {
            warn!(%err, "failed to restore blocking mode");
        }
    }
}

fn read_once(socket: &Socket, buf: &mut [u8]) -> Result<ReadOutcome, ConnectionError> {
    if buf.is_empty() {
        return Ok(ReadOutcome::Data(0));
    }

    let mut handle = socket;
    loop {
        match handle.read(buf) {
            Ok(0) => return Ok(ReadOutcome::PeerClosed),
            Ok(n) => return Ok(ReadOutcome::Data(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(ReadOutcome::NoData),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

pub(crate) fn to_socket_addr(addr: SockAddr) -> io::Result<SocketAddr> {
    addr.as_socket().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "not an IP socket address")
    })
}
