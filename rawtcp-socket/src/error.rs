//! Error types for raw TCP connections.

use std::fmt;
use std::io;
use std::net::{AddrParseError, SocketAddr};
use thiserror::Error;

/// The OS-level step that failed while acquiring a socket resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketStep {
    /// Creating the socket handle.
    Socket,
    /// Enabling `SO_REUSEADDR`.
    ReuseAddress,
    /// Binding the listening handle.
    Bind,
    /// Putting the listening handle into the listen state.
    Listen,
    /// Accepting a pending peer.
    Accept,
    /// Connecting to the remote peer.
    Connect,
}

impl fmt::Display for SocketStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Socket => write!(f, "socket"),
            Self::ReuseAddress => write!(f, "setsockopt(SO_REUSEADDR)"),
            Self::Bind => write!(f, "bind"),
            Self::Listen => write!(f, "listen"),
            Self::Accept => write!(f, "accept"),
            Self::Connect => write!(f, "connect"),
        }
    }
}

/// Errors returned by [`Connection`](crate::Connection) and the role types.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The operation needs an established connection (or an open handle).
    #[error("not connected")]
    NotConnected,

    /// `accept` was called before `listen`.
    #[error("server is not listening")]
    NotListening,

    /// `connect` was called on a client that is already connected.
    #[error("already connected")]
    AlreadyConnected,

    /// The address text is not a literal IP address.
    #[error("invalid address '{address}': {source}")]
    InvalidAddress {
        /// The address as supplied by the caller.
        address: String,
        /// Why parsing failed.
        #[source]
        source: AddrParseError,
    },

    /// Creating, configuring, binding, listening on, accepting from or
    /// connecting a socket failed.
    #[error("{step} failed for {endpoint}: {source}")]
    ResourceAcquisition {
        /// The failed step.
        step: SocketStep,
        /// The local (server) or remote (client) endpoint involved.
        endpoint: SocketAddr,
        /// The OS error.
        #[source]
        source: io::Error,
    },

    /// A read, write or mode change on an open handle failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ConnectionError {
    pub(crate) fn acquisition(step: SocketStep, endpoint: SocketAddr, source: io::Error) -> Self {
        Self::ResourceAcquisition {
            step,
            endpoint,
            source,
        }
    }

    pub(crate) fn invalid_address(address: impl Into<String>, source: AddrParseError) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            source,
        }
    }

    /// Returns true for the recoverable "not connected" precondition failure.
    #[must_use]
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected)
    }

    /// Returns true if retrying the operation later may succeed.
    ///
    /// OS-level failures are transient from the caller's point of view (a
    /// refused connect, a busy port, a reset peer). Precondition and address
    /// errors will fail the same way every time.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ResourceAcquisition { .. } | Self::Io(_))
    }

    /// The failed step, for resource acquisition failures.
    #[must_use]
    pub fn step(&self) -> Option<SocketStep> {
        match self {
            Self::ResourceAcquisition { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The underlying OS error code, if there is one.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::ResourceAcquisition { source, .. } | Self::Io(source) => source.raw_os_error(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_error_categorization() {
        assert!(ConnectionError::NotConnected.is_not_connected());
        assert!(!ConnectionError::NotConnected.is_retryable());
        assert!(!ConnectionError::NotListening.is_retryable());

        let err = ConnectionError::acquisition(
            SocketStep::Connect,
            endpoint(),
            io::Error::from(io::ErrorKind::ConnectionRefused),
        );
        assert!(err.is_retryable());
        assert_eq!(err.step(), Some(SocketStep::Connect));

        let err = ConnectionError::from(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(err.is_retryable());
        assert_eq!(err.step(), None);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(ConnectionError::NotConnected.to_string(), "not connected");

        let err = ConnectionError::acquisition(
            SocketStep::Bind,
            endpoint(),
            io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
        );
        assert_eq!(
            err.to_string(),
            "bind failed for 127.0.0.1:8081: address in use"
        );

        let source = "nope".parse::<std::net::IpAddr>().unwrap_err();
        let err = ConnectionError::invalid_address("nope", source);
        assert!(err.to_string().starts_with("invalid address 'nope'"));
    }

    #[test]
    fn test_raw_os_error() {
        let err = ConnectionError::acquisition(
            SocketStep::Listen,
            endpoint(),
            io::Error::from_raw_os_error(98),
        );
        assert_eq!(err.raw_os_error(), Some(98));
        assert_eq!(ConnectionError::AlreadyConnected.raw_os_error(), None);
    }
}
