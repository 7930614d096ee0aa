//! Sequential echo server.
//!
//! One client is served at a time: accept, echo until the peer closes,
//! close, accept the next one.

use crate::config::ServerConfig;
use crate::errors::EchoError;
use rawtcp_socket::{ReadOutcome, Role, ServerConnection};
use std::net::SocketAddr;
use tracing::{debug, info, warn};

/// Byte totals for one served session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Peer the session was accepted from.
    pub peer: Option<SocketAddr>,
    /// Bytes read from the peer.
    pub bytes_read: u64,
    /// Bytes written back to the peer.
    pub bytes_written: u64,
    /// Number of reads that returned data.
    pub reads: u64,
}

/// Echo server bound and listening on a local address.
#[derive(Debug)]
pub struct EchoServer {
    connection: ServerConnection,
    buffer: Vec<u8>,
    max_sessions: Option<usize>,
}

impl EchoServer {
    /// Bind and listen according to `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the address
    /// cannot be bound.
    pub fn bind(config: &ServerConfig) -> Result<Self, EchoError> {
        config.validate()?;

        let mut connection = ServerConnection::new(config.port, Some(config.address.as_str()))?;
        connection.listen()?;
        info!(addr = %connection.bound_addr(), "echo server listening");

        Ok(Self {
            connection,
            buffer: vec![0u8; config.buffer_size],
            max_sessions: config.max_sessions,
        })
    }

    /// The address actually bound, with the ephemeral port resolved.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS cannot report the address.
    pub fn local_addr(&self) -> Result<SocketAddr, EchoError> {
        Ok(self.connection.local_addr()?)
    }

    /// Accept one client and echo until it closes.
    ///
    /// The connection is closed before returning, also when the exchange
    /// fails midway.
    ///
    /// # Errors
    ///
    /// Returns an error if accepting, reading or writing fails.
    pub fn serve_one(&mut self) -> Result<SessionStats, EchoError> {
        let peer = self.connection.accept()?;
        info!(%peer, "session started");

        let mut stats = SessionStats {
            peer: Some(peer),
            ..SessionStats::default()
        };
        let result = self.echo(&mut stats);

        if let Err(e) = self.connection.close() {
            warn!(error = %e, "failed to close session");
        }
        result?;

        info!(
            %peer,
            bytes_read = stats.bytes_read,
            bytes_written = stats.bytes_written,
            "session finished"
        );
        Ok(stats)
    }

    /// Serve clients one after another.
    ///
    /// A failed session is logged and does not stop the loop. Returns after
    /// `max_sessions` sessions when set, otherwise never returns.
    pub fn run(&mut self) -> Vec<SessionStats> {
        let mut completed = Vec::new();
        let mut attempted = 0usize;

        while self.max_sessions.map_or(true, |max| attempted < max) {
            attempted += 1;
            match self.serve_one() {
                Ok(stats) => completed.push(stats),
                Err(e) => warn!(error = %e, session = attempted, "session failed"),
            }
        }

        completed
    }

    fn echo(&mut self, stats: &mut SessionStats) -> Result<(), EchoError> {
        loop {
            let n = match self.connection.read(&mut self.buffer)? {
                ReadOutcome::Data(n) => n,
                ReadOutcome::PeerClosed => return Ok(()),
                // Blocking reads only see this if the handle went non-blocking.
                ReadOutcome::NoData => continue,
            };
            stats.reads += 1;
            stats.bytes_read += n as u64;
            debug!(bytes = n, "received");

            let mut sent = 0;
            while sent < n {
                sent += self.connection.write(&self.buffer[sent..n])?;
            }
            stats.bytes_written += sent as u64;
        }
    }
}
