//! Common types shared by the rawtcp crates.
//!
//! This crate holds the pure-data parts of a TCP connection's lifecycle:
//! - [`ConnectionState`] - the set of resources held and phases reached
//! - [`ServerPhase`] / [`ClientPhase`] - tagged per-role views of that set
//! - [`addr`] - parsing of the caller-supplied address strings
//!
//! Nothing in here performs I/O.

pub mod addr;
mod state;

pub use state::{ClientPhase, ConnectionState, ServerPhase};
