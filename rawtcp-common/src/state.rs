use std::fmt;

bitflags::bitflags! {
    /// Resources held and lifecycle phases reached by a connection.
    ///
    /// Flags accumulate as the connection progresses and are only ever
    /// cleared in bulk ([`release_socket`](Self::release_socket) or
    /// [`reset`](Self::reset)). The transition methods keep two invariants:
    /// `CONNECTED` implies `SOCKET_OPEN`, and `LISTENING` implies
    /// `SERVER_SOCKET_OPEN`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ConnectionState: u32 {
        /// The communication handle is valid.
        const SOCKET_OPEN = 0x0010;
        /// The listening handle is valid (server role only).
        const SERVER_SOCKET_OPEN = 0x0020;
        /// The listening handle is in the OS listen state.
        const LISTENING = 0x0200;
        /// A peer is attached to the communication handle.
        const CONNECTED = 0x1000;
    }
}

impl ConnectionState {
    /// No resources held.
    pub const INITIALIZED: Self = Self::empty();

    /// Record that the communication handle was acquired.
    pub fn open_socket(&mut self) {
        self.insert(Self::SOCKET_OPEN);
    }

    /// Record that the listening handle was acquired.
    pub fn open_server(&mut self) {
        self.insert(Self::SERVER_SOCKET_OPEN);
    }

    /// Record that the listening handle entered the listen state.
    ///
    /// Leaves the state untouched unless `SERVER_SOCKET_OPEN` is set.
    pub fn mark_listening(&mut self) {
        if self.contains(Self::SERVER_SOCKET_OPEN) {
            self.insert(Self::LISTENING);
        }
    }

    /// Record that a peer is attached to the communication handle.
    ///
    /// Leaves the state untouched unless `SOCKET_OPEN` is set.
    pub fn mark_connected(&mut self) {
        if self.contains(Self::SOCKET_OPEN) {
            self.insert(Self::CONNECTED);
        }
    }

    /// Drop back to the pre-connection phase.
    ///
    /// Clears `SOCKET_OPEN` and `CONNECTED` together; the listening flags of
    /// a server are kept so that it can accept again.
    pub fn release_socket(&mut self) {
        self.remove(Self::SOCKET_OPEN | Self::CONNECTED);
    }

    /// Clear every flag.
    pub fn reset(&mut self) {
        *self = Self::INITIALIZED;
    }

    pub fn is_initialized(&self) -> bool {
        self.is_empty()
    }

    pub fn is_socket_open(&self) -> bool {
        self.contains(Self::SOCKET_OPEN)
    }

    pub fn is_server_open(&self) -> bool {
        self.contains(Self::SERVER_SOCKET_OPEN)
    }

    pub fn is_listening(&self) -> bool {
        self.contains(Self::LISTENING)
    }

    pub fn is_connected(&self) -> bool {
        self.contains(Self::CONNECTED)
    }

    /// The server-role view of this state.
    pub fn server_phase(&self) -> ServerPhase {
        if self.is_connected() {
            ServerPhase::Connected
        } else if self.is_listening() {
            ServerPhase::Listening
        } else if self.is_server_open() {
            ServerPhase::SocketReady
        } else {
            ServerPhase::Uninitialized
        }
    }

    /// The client-role view of this state.
    pub fn client_phase(&self) -> ClientPhase {
        if self.is_connected() {
            ClientPhase::Connected
        } else if self.is_socket_open() {
            ClientPhase::SocketReady
        } else {
            ClientPhase::Uninitialized
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::INITIALIZED
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "INITIALIZED");
        }
        let mut first = true;
        for (name, _) in self.iter_names() {
            if !first {
                write!(f, " | ")?;
            }
            write!(f, "{name}")?;
            first = false;
        }
        Ok(())
    }
}

/// Lifecycle phase of a server connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerPhase {
    /// No listening handle yet.
    Uninitialized,
    /// Listening handle created and bound.
    SocketReady,
    /// Waiting for peers.
    Listening,
    /// A peer was accepted and is attached.
    Connected,
}

impl ServerPhase {
    pub fn is_connected(&self) -> bool {
        *self == Self::Connected
    }
}

impl fmt::Display for ServerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::SocketReady => write!(f, "SocketReady"),
            Self::Listening => write!(f, "Listening"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Lifecycle phase of a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientPhase {
    /// No communication handle.
    Uninitialized,
    /// Communication handle created, not yet connected.
    SocketReady,
    /// Connected to the remote peer.
    Connected,
}

impl ClientPhase {
    pub fn is_connected(&self) -> bool {
        *self == Self::Connected
    }
}

impl fmt::Display for ClientPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::SocketReady => write!(f, "SocketReady"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}
