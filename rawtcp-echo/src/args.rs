//! Command-line argument parsing for the echo programs.
//!
//! Flags given on the command line override values loaded from the
//! configuration file, which in turn override the built-in defaults.
//!
//! # Examples
//!
//! ```no_run
//! use rawtcp_echo::args::ClientArgs;
//!
//! let args = ClientArgs::parse();
//! let config = args.into_config()?;
//! println!("running {} rounds", config.client.effective_rounds());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::config::{Config, ConfigBuilder};
use crate::errors::EchoError;
use clap::Parser;
use std::path::PathBuf;

/// Echo server command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "rawtcp-echo-server", author, version, about = "Echo every byte back to each client in turn", long_about = None)]
pub struct ServerArgs {
    /// Local address to bind (empty for every interface)
    #[arg(short = 'a', long, value_name = "ADDRESS", env = "RAWTCP_ECHO_ADDRESS")]
    pub address: Option<String>,

    /// Local port to bind
    #[arg(short = 'p', long, value_name = "PORT", env = "RAWTCP_ECHO_PORT")]
    pub port: Option<u16>,

    /// Read buffer size in bytes
    #[arg(short = 'b', long, value_name = "BYTES")]
    pub buffer_size: Option<usize>,

    /// Exit after serving this many sessions
    #[arg(short = 'n', long, value_name = "COUNT")]
    pub max_sessions: Option<usize>,

    /// Configuration file path (TOML format)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Echo client command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "rawtcp-echo-client", author, version, about = "Send a growing alphanumeric prefix and read the echo back", long_about = None)]
pub struct ClientArgs {
    /// Number of rounds (at most 62)
    #[arg(value_name = "ROUNDS")]
    pub rounds: Option<usize>,

    /// Server address to connect to
    #[arg(short = 'a', long, value_name = "ADDRESS", env = "RAWTCP_ECHO_ADDRESS")]
    pub address: Option<String>,

    /// Server port to connect to
    #[arg(short = 'p', long, value_name = "PORT", env = "RAWTCP_ECHO_PORT")]
    pub port: Option<u16>,

    /// Read buffer size in bytes
    #[arg(short = 'b', long, value_name = "BYTES")]
    pub buffer_size: Option<usize>,

    /// Configuration file path (TOML format)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl ServerArgs {
    /// Parse command-line arguments.
    #[must_use]
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse arguments from an iterator.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are invalid.
    pub fn try_parse_from<I, T>(iter: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Build the configuration: file first, then flags on top.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if
    /// this program's section of the merged configuration is invalid.
    pub fn into_config(self) -> Result<Config, EchoError> {
        let mut builder = base_builder(self.config.as_deref())?;

        if let Some(address) = self.address {
            builder = builder.server_address(address);
        }
        if let Some(port) = self.port {
            builder = builder.server_port(port);
        }
        if let Some(size) = self.buffer_size {
            builder = builder.server_buffer_size(size);
        }
        if let Some(sessions) = self.max_sessions {
            builder = builder.max_sessions(sessions);
        }

        builder.build_server()
    }
}

impl ClientArgs {
    /// Parse command-line arguments.
    #[must_use]
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse arguments from an iterator.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are invalid.
    pub fn try_parse_from<I, T>(iter: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Build the configuration: file first, then flags on top.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if
    /// this program's section of the merged configuration is invalid.
    pub fn into_config(self) -> Result<Config, EchoError> {
        let mut builder = base_builder(self.config.as_deref())?;

        if let Some(rounds) = self.rounds {
            builder = builder.rounds(rounds);
        }
        if let Some(address) = self.address {
            builder = builder.client_address(address);
        }
        if let Some(port) = self.port {
            builder = builder.client_port(port);
        }
        if let Some(size) = self.buffer_size {
            builder = builder.client_buffer_size(size);
        }

        builder.build_client()
    }
}

fn base_builder(path: Option<&std::path::Path>) -> Result<ConfigBuilder, EchoError> {
    match path {
        Some(path) => Ok(ConfigBuilder::from_config(Config::load(path)?)),
        None => Ok(Config::builder()),
    }
}
