//! Parsing of caller-supplied addresses.
//!
//! Addresses are literal IP addresses: dotted-decimal IPv4 such as
//! `"127.0.0.1"`, or an IPv6 literal such as `"::1"`. No name resolution is
//! performed.

use std::net::{AddrParseError, IpAddr, Ipv4Addr, SocketAddr};

/// Parse the address a server binds to.
///
/// `None` and the empty string both mean "any address" (`0.0.0.0`).
pub fn parse_bind_address(address: Option<&str>) -> Result<IpAddr, AddrParseError> {
    match address.map(str::trim) {
        None | Some("") => Ok(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        Some(text) => text.parse(),
    }
}

/// Parse the address a client connects to.
///
/// There is no default here; the empty string is rejected like any other
/// malformed address.
pub fn parse_remote_address(address: &str) -> Result<IpAddr, AddrParseError> {
    address.trim().parse()
}

/// Combine a parsed address with a port.
pub fn socket_addr(ip: IpAddr, port: u16) -> SocketAddr {
    SocketAddr::new(ip, port)
}
