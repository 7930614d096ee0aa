//! Configuration types for the echo server and client.

use crate::errors::EchoError;
use rawtcp_common::addr::{parse_bind_address, parse_remote_address};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Port both programs use unless told otherwise.
pub const DEFAULT_PORT: u16 = 8081;

/// Address both programs use unless told otherwise.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// Payload the client sends a growing prefix of, one more byte per round.
pub const ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Complete echo configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Client settings.
    #[serde(default)]
    pub client: ClientConfig,
}

/// Echo server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Local address to bind. Empty means every local interface.
    #[serde(default = "default_address")]
    pub address: String,
    /// Local port to bind (0 picks an ephemeral port).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Size of the per-session read buffer.
    #[serde(default = "default_server_buffer_size")]
    pub buffer_size: usize,
    /// Stop after this many sessions; serve forever when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_sessions: Option<usize>,
}

/// Echo client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server address to connect to.
    #[serde(default = "default_address")]
    pub address: String,
    /// Server port to connect to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Size of the read buffer. Small values exercise the drain loop.
    #[serde(default = "default_client_buffer_size")]
    pub buffer_size: usize,
    /// Number of rounds, at most the length of [`ALNUM`].
    #[serde(default = "default_rounds")]
    pub rounds: usize,
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_server_buffer_size() -> usize {
    1024
}

fn default_client_buffer_size() -> usize {
    5
}

fn default_rounds() -> usize {
    1
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            buffer_size: default_server_buffer_size(),
            max_sessions: None,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            buffer_size: default_client_buffer_size(),
            rounds: default_rounds(),
        }
    }
}

impl ServerConfig {
    /// Validates the server settings.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero buffer size, zero max sessions or an
    /// address that is not a literal IP.
    pub fn validate(&self) -> Result<(), EchoError> {
        if self.buffer_size == 0 {
            return Err(EchoError::Config(
                "server buffer_size must be non-zero".to_string(),
            ));
        }
        if self.max_sessions == Some(0) {
            return Err(EchoError::Config(
                "server max_sessions must be non-zero when set".to_string(),
            ));
        }
        parse_bind_address(Some(self.address.as_str())).map_err(|e| {
            EchoError::Config(format!("invalid server address '{}': {}", self.address, e))
        })?;
        Ok(())
    }
}

impl ClientConfig {
    /// Validates the client settings.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero buffer size, zero rounds, a zero port or
    /// an address that is not a literal IP.
    pub fn validate(&self) -> Result<(), EchoError> {
        if self.buffer_size == 0 {
            return Err(EchoError::Config(
                "client buffer_size must be non-zero".to_string(),
            ));
        }
        if self.rounds == 0 {
            return Err(EchoError::Config("client rounds must be non-zero".to_string()));
        }
        if self.port == 0 {
            return Err(EchoError::Config("client port cannot be 0".to_string()));
        }
        parse_remote_address(&self.address).map_err(|e| {
            EchoError::Config(format!("invalid client address '{}': {}", self.address, e))
        })?;
        Ok(())
    }

    /// Rounds actually run: the configured count clamped to the payload.
    #[must_use]
    pub fn effective_rounds(&self) -> usize {
        self.rounds.min(ALNUM.len())
    }
}

impl Config {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Parses a TOML document. Missing tables and keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EchoError::Config`] if the document is not valid TOML or
    /// has mistyped values.
    pub fn from_toml_str(s: &str) -> Result<Self, EchoError> {
        toml::from_str(s).map_err(|e| EchoError::Config(format!("failed to parse config: {e}")))
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EchoError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            EchoError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&text)
    }

    /// Validates both sections.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), EchoError> {
        self.server.validate()?;
        self.client.validate()
    }

    /// Serializes the configuration back to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`EchoError::Config`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, EchoError> {
        toml::to_string_pretty(self)
            .map_err(|e| EchoError::Config(format!("failed to serialize config: {e}")))
    }
}

/// Builder for creating a `Config`.
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Starts from an existing configuration, e.g. one loaded from a file.
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Sets the server bind address.
    #[must_use]
    pub fn server_address(mut self, address: impl Into<String>) -> Self {
        self.config.server.address = address.into();
        self
    }

    /// Sets the server port.
    #[must_use]
    pub fn server_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    /// Sets the server read buffer size.
    #[must_use]
    pub fn server_buffer_size(mut self, size: usize) -> Self {
        self.config.server.buffer_size = size;
        self
    }

    /// Sets the number of sessions after which the server stops.
    #[must_use]
    pub fn max_sessions(mut self, sessions: usize) -> Self {
        self.config.server.max_sessions = Some(sessions);
        self
    }

    /// Sets the address the client connects to.
    #[must_use]
    pub fn client_address(mut self, address: impl Into<String>) -> Self {
        self.config.client.address = address.into();
        self
    }

    /// Sets the port the client connects to.
    #[must_use]
    pub fn client_port(mut self, port: u16) -> Self {
        self.config.client.port = port;
        self
    }

    /// Sets the client read buffer size.
    #[must_use]
    pub fn client_buffer_size(mut self, size: usize) -> Self {
        self.config.client.buffer_size = size;
        self
    }

    /// Sets the number of client rounds.
    #[must_use]
    pub fn rounds(mut self, rounds: usize) -> Self {
        self.config.client.rounds = rounds;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> Result<Config, EchoError> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Builds the configuration checking only the `[server]` section.
    ///
    /// # Errors
    ///
    /// Returns an error if the server settings are invalid.
    pub fn build_server(self) -> Result<Config, EchoError> {
        self.config.server.validate()?;
        Ok(self.config)
    }

    /// Builds the configuration checking only the `[client]` section.
    ///
    /// # Errors
    ///
    /// Returns an error if the client settings are invalid.
    pub fn build_client(self) -> Result<Config, EchoError> {
        self.config.client.validate()?;
        Ok(self.config)
    }
}
