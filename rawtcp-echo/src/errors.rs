//! Error types for the echo programs.

use rawtcp_socket::ConnectionError;
use std::io;
use thiserror::Error;

/// Errors that can occur while running the echo server or client.
#[derive(Debug, Error)]
pub enum EchoError {
    /// A connection operation failed.
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading a configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl EchoError {
    /// Returns true if this error is potentially retryable.
    ///
    /// Only connection-level failures can go away on their own; a bad
    /// configuration fails the same way every time.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Config(_) | Self::Io(_) => false,
        }
    }

    /// Returns true if this is a fatal error that should not be retried.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }
}
