use crate::error::EventError;

use backtrace::Backtrace;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Port assumed for remote addresses that don't include one.
pub const DEFAULT_PORT: u16 = 80;

/// Resolve the client address reported by the load balancer into a [`SocketAddr`].
///
/// The load balancer reports the client as a bare IP address (taken from `X-Forwarded-For`), but
/// the native request context requires a socket address. Addresses that already include a port
/// are used unmodified; otherwise [`DEFAULT_PORT`] is assumed. An empty address maps to the
/// unspecified IPv4 address.
///
/// Only IP literals are accepted. Host names are rejected rather than looked up, since the value
/// originates from a request header.
pub fn resolve_remote_addr(addr: &str) -> Result<SocketAddr, EventError> {
  let addr = addr.trim();

  if addr.is_empty() {
    return Ok(SocketAddr::new(
      IpAddr::V4(Ipv4Addr::UNSPECIFIED),
      DEFAULT_PORT,
    ));
  }

  // Bare IPv6 addresses contain colons, so they need to be handled before `ip:port`.
  if let Ok(ip) = addr
    .strip_prefix('[')
    .and_then(|addr| addr.strip_suffix(']'))
    .unwrap_or(addr)
    .parse::<IpAddr>()
  {
    return Ok(SocketAddr::new(ip, DEFAULT_PORT));
  }

  addr
    .parse::<SocketAddr>()
    .map_err(|err| EventError::ResolveRemoteAddr {
      addr: addr.to_string(),
      source: Box::new(err),
      backtrace: Backtrace::new(),
    })
}

#[cfg(test)]
mod tests {
  use super::{resolve_remote_addr, DEFAULT_PORT};
  use crate::error::EventError;

  use pretty_assertions::assert_eq;

  use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

  #[test]
  fn test_addr_without_port() {
    assert_eq!(
      resolve_remote_addr("203.0.113.7").unwrap(),
      SocketAddr::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7)), DEFAULT_PORT)
    );
    assert_eq!(
      resolve_remote_addr(" 203.0.113.7 ").unwrap().port(),
      DEFAULT_PORT
    );
  }

  #[test]
  fn test_addr_with_port() {
    assert_eq!(
      resolve_remote_addr("203.0.113.7:5123").unwrap(),
      "203.0.113.7:5123".parse::<SocketAddr>().unwrap()
    );
    assert_eq!(
      resolve_remote_addr("[2001:db8::1]:8443").unwrap(),
      "[2001:db8::1]:8443".parse::<SocketAddr>().unwrap()
    );
  }

  #[test]
  fn test_ipv6_without_port() {
    let expected = SocketAddr::new(
      IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)),
      DEFAULT_PORT,
    );
    assert_eq!(resolve_remote_addr("2001:db8::1").unwrap(), expected);
    assert_eq!(resolve_remote_addr("[2001:db8::1]").unwrap(), expected);
  }

  #[test]
  fn test_empty_addr() {
    assert_eq!(
      resolve_remote_addr("").unwrap(),
      SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT)
    );
  }

  #[test]
  fn test_host_names_rejected() {
    for addr in ["localhost", "attacker.example.com", "attacker.example.com:443"] {
      match resolve_remote_addr(addr) {
        Err(EventError::ResolveRemoteAddr { addr: err_addr, .. }) => assert_eq!(err_addr, addr),
        other => panic!("unexpected result for `{addr}`: {other:?}"),
      }
    }
  }

  #[test]
  fn test_invalid_port() {
    match resolve_remote_addr("10.0.0.1:abc") {
      Err(EventError::ResolveRemoteAddr { addr, .. }) => assert_eq!(addr, "10.0.0.1:abc"),
      other => panic!("unexpected result: {other:?}"),
    }

    assert!(matches!(
      resolve_remote_addr(":http"),
      Err(EventError::ResolveRemoteAddr { .. })
    ));
  }
}
