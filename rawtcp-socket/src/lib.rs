//! Raw TCP connections with an explicit lifecycle.
//!
//! This crate wraps OS sockets in two symmetric roles that share one
//! read/write surface:
//!
//! - [`ServerConnection`] - bind, listen and accept peers one at a time
//! - [`ClientConnection`] - connect to a remote server
//! - [`Connection`] - the communication capability embedded in both, reached
//!   through the [`Role`] trait
//!
//! Every operation is a direct, synchronous system call. Reads and writes
//! move raw bytes with no framing; short reads and short writes are returned
//! to the caller as they are. Operations attempted in the wrong lifecycle
//! phase fail with [`ConnectionError::NotConnected`] (or a sibling
//! precondition error) instead of touching the socket.
//!
//! # Examples
//!
//! ```no_run
//! use rawtcp_socket::{ClientConnection, Role, ServerConnection};
//! use std::thread;
//!
//! # fn example() -> Result<(), rawtcp_socket::ConnectionError> {
//! let mut server = ServerConnection::new(8081, Some("127.0.0.1"))?;
//! server.listen()?;
//!
//! let client = thread::spawn(|| -> Result<(), rawtcp_socket::ConnectionError> {
//!     let mut client = ClientConnection::new(8081, "127.0.0.1")?;
//!     client.connect()?;
//!     client.write(b"AB")?;
//!     client.close()
//! });
//!
//! server.accept()?;
//! let mut buf = [0u8; 2];
//! let n = server.read(&mut buf)?.len();
//! println!("received {:?}", &buf[..n]);
//! server.close()?;
//! client.join().unwrap()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod connection;
pub mod error;
pub mod server;

pub use client::ClientConnection;
pub use connection::{Connection, ReadOutcome, Role};
pub use error::{ConnectionError, SocketStep};
pub use rawtcp_common::{ClientPhase, ConnectionState, ServerPhase};
pub use server::{ServerConnection, LISTEN_BACKLOG};
