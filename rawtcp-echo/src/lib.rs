//! Echo server and counting echo client built on `rawtcp-socket`.
//!
//! The server accepts one client at a time and writes every byte it reads
//! straight back. The client sends a growing prefix of an alphanumeric
//! payload, one more byte each round, and reads the echo back.
//!
//! Both ship as binaries (`rawtcp-echo-server`, `rawtcp-echo-client`) and
//! as library types for use from tests:
//!
//! ```no_run
//! use rawtcp_echo::{ClientConfig, EchoClient};
//!
//! let config = ClientConfig {
//!     rounds: 3,
//!     ..ClientConfig::default()
//! };
//! let stats = EchoClient::connect(&config)?.run()?;
//! println!("{} bytes echoed", stats.bytes_read);
//! # Ok::<(), rawtcp_echo::EchoError>(())
//! ```

#![forbid(unsafe_code)]

pub mod args;
pub mod client;
pub mod config;
pub mod errors;
pub mod server;

pub use client::{ClientStats, EchoClient};
pub use config::{ClientConfig, Config, ConfigBuilder, ServerConfig, ALNUM};
pub use errors::EchoError;
pub use server::{EchoServer, SessionStats};

/// Install the `tracing` subscriber used by both binaries.
///
/// `RUST_LOG` wins when set; otherwise this crate and the socket layer log
/// at `info`, or `debug` with one `-v`, or `trace` with more.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("rawtcp_echo={level},rawtcp_socket={level}").into()
            }),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
