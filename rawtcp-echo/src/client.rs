//! Counting echo client.
//!
//! Round `i` writes the first `i` bytes of [`ALNUM`] and reads them back,
//! first with one blocking read and then by draining whatever else has
//! already arrived with `partial_read`.

use crate::config::{ClientConfig, ALNUM};
use crate::errors::EchoError;
use bytes::{Bytes, BytesMut};
use rawtcp_socket::{ClientConnection, ReadOutcome, Role};
use std::io;
use tracing::{debug, info, trace};

/// Totals for a completed client run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientStats {
    /// Rounds completed.
    pub rounds: usize,
    /// Bytes written to the server.
    pub bytes_written: u64,
    /// Bytes read back from the server.
    pub bytes_read: u64,
    /// Everything the server echoed, in order.
    pub echoed: Bytes,
}

/// Echo client connected to a server.
#[derive(Debug)]
pub struct EchoClient {
    connection: ClientConnection,
    buffer: Vec<u8>,
    rounds: usize,
}

impl EchoClient {
    /// Connect according to `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the connection
    /// cannot be established.
    pub fn connect(config: &ClientConfig) -> Result<Self, EchoError> {
        config.validate()?;

        let mut connection = ClientConnection::new(config.port, &config.address)?;
        connection.connect()?;
        info!(remote = %connection.remote_addr(), "connected to echo server");

        Ok(Self {
            connection,
            buffer: vec![0u8; config.buffer_size],
            rounds: config.effective_rounds(),
        })
    }

    /// Run every round, then close the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if a write or read fails, or if the server closes
    /// the connection before echoing a round completely.
    pub fn run(mut self) -> Result<ClientStats, EchoError> {
        let mut stats = ClientStats::default();
        let mut echoed = BytesMut::with_capacity(self.rounds * (self.rounds + 1) / 2);

        for round in 1..=self.rounds {
            let payload = &ALNUM[..round];
            stats.bytes_written += self.write_all(payload)? as u64;
            debug!(round, bytes = payload.len(), "written");

            let start = echoed.len();
            self.read_round(payload.len(), &mut echoed)?;
            trace!(round, echo = %String::from_utf8_lossy(&echoed[start..]), "echoed");
            stats.rounds = round;
        }

        self.connection.close()?;

        stats.bytes_read = echoed.len() as u64;
        stats.echoed = echoed.freeze();
        info!(
            bytes_written = stats.bytes_written,
            bytes_read = stats.bytes_read,
            "echo client finished"
        );
        Ok(stats)
    }

    fn write_all(&mut self, mut data: &[u8]) -> Result<usize, EchoError> {
        let total = data.len();
        while !data.is_empty() {
            let n = self.connection.write(data)?;
            data = &data[n..];
        }
        Ok(total)
    }

    fn read_round(&mut self, expected: usize, echoed: &mut BytesMut) -> Result<(), EchoError> {
        let mut received = 0;
        while received < expected {
            match self.connection.read(&mut self.buffer)? {
                ReadOutcome::Data(n) => {
                    echoed.extend_from_slice(&self.buffer[..n]);
                    received += n;
                }
                ReadOutcome::PeerClosed => return Err(closed_early(received, expected)),
                ReadOutcome::NoData => {}
            }

            loop {
                match self.connection.partial_read(&mut self.buffer)? {
                    ReadOutcome::Data(n) => {
                        echoed.extend_from_slice(&self.buffer[..n]);
                        received += n;
                    }
                    ReadOutcome::NoData => break,
                    ReadOutcome::PeerClosed => {
                        if received >= expected {
                            break;
                        }
                        return Err(closed_early(received, expected));
                    }
                }
            }
        }
        Ok(())
    }
}

fn closed_early(received: usize, expected: usize) -> EchoError {
    EchoError::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("server closed after echoing {received} of {expected} bytes"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn client_config(port: u16, rounds: usize, buffer_size: usize) -> ClientConfig {
        ClientConfig {
            port,
            rounds,
            buffer_size,
            ..ClientConfig::default()
        }
    }

    #[test]
    fn test_run_reads_every_round_back() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let peer = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 64];
            loop {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                stream.write_all(&buf[..n]).unwrap();
            }
        });

        let client = EchoClient::connect(&client_config(port, 4, 2)).unwrap();
        let stats = client.run().unwrap();
        peer.join().unwrap();

        assert_eq!(stats.rounds, 4);
        assert_eq!(stats.bytes_written, 10);
        assert_eq!(stats.bytes_read, 10);
        assert_eq!(&stats.echoed[..], b"AABABCABCD");
    }

    #[test]
    fn test_server_closing_early_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let peer = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 1];
            stream.read_exact(&mut buf).unwrap();
        });

        let client = EchoClient::connect(&client_config(port, 1, 5)).unwrap();
        let err = client.run().unwrap_err();
        peer.join().unwrap();
        assert!(matches!(err, EchoError::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_connect_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = EchoClient::connect(&client_config(port, 1, 5)).unwrap_err();
        assert!(matches!(err, EchoError::Connection(_)));
        assert!(err.is_retryable());
    }
}
