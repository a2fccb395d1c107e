//! Network utilities

use crate::{Error, Result};
use socket2::SockRef;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Default TCP connect timeout
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[inline]
pub fn configure_tcp_stream(stream: &TcpStream) {
    let _ = stream.set_nodelay(true);
    let sock = SockRef::from(stream);
    let _ = sock.set_keepalive(true);
}

/// Open a TCP connection with the default connect timeout.
pub async fn connect_tcp(addr: &str) -> Result<TcpStream> {
    let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| Error::timeout(format!("connect to {} timed out", addr)))?
        .map_err(|e| Error::connection(format!("Failed to connect to {}: {}", addr, e)))?;
    configure_tcp_stream(&stream);
    Ok(stream)
}

/// Host part of a dial target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Host {
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Domain(String),
}

impl Host {
    pub fn to_ip(&self) -> Option<IpAddr> {
        match self {
            Host::Ipv4(ip) => Some(IpAddr::V4(*ip)),
            Host::Ipv6(ip) => Some(IpAddr::V6(*ip)),
            Host::Domain(_) => None,
        }
    }
}

impl From<String> for Host {
    fn from(host: String) -> Self {
        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            return Host::Ipv4(ip);
        }
        if let Ok(ip) = host.parse::<Ipv6Addr>() {
            return Host::Ipv6(ip);
        }
        Host::Domain(host)
    }
}

impl From<IpAddr> for Host {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Host::Ipv4(v4),
            IpAddr::V6(v6) => Host::Ipv6(v6),
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Ipv4(ip) => write!(f, "{}", ip),
            Host::Ipv6(ip) => write!(f, "{}", ip),
            Host::Domain(d) => write!(f, "{}", d),
        }
    }
}

/// Destination of a dial: host plus port
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub host: Host,
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Target {
            host: Host::from(host.into()),
            port,
        }
    }

    /// `host:port` form suitable for `TcpStream::connect`
    pub fn authority(&self) -> String {
        self.to_string()
    }
}

impl From<SocketAddr> for Target {
    fn from(addr: SocketAddr) -> Self {
        Target {
            host: Host::from(addr.ip()),
            port: addr.port(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Host::Ipv6(ip) => write!(f, "[{}]:{}", ip, self.port),
            host => write!(f, "{}:{}", host, self.port),
        }
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = split_host_port(s)?;
        if host.is_empty() {
            return Err(Error::config(format!("address {:?} lacks a host part", s)));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| Error::config(format!("address {:?} has an invalid port", s)))?;
        Ok(Target::new(host, port))
    }
}

/// Split `host:port` or `[v6]:port` without resolving anything.
pub fn split_host_port(s: &str) -> Result<(&str, &str)> {
    if let Some(rest) = s.strip_prefix('[') {
        let end = rest
            .find(']')
            .ok_or_else(|| Error::config(format!("address {:?} is missing ']'", s)))?;
        let host = &rest[..end];
        let port = rest[end + 1..]
            .strip_prefix(':')
            .ok_or_else(|| Error::config(format!("address {:?} is missing a port", s)))?;
        return Ok((host, port));
    }

    let idx = s
        .rfind(':')
        .ok_or_else(|| Error::config(format!("address {:?} is missing a port", s)))?;
    let host = &s[..idx];
    if host.contains(':') {
        return Err(Error::config(format!("address {:?} has too many colons", s)));
    }
    Ok((host, &s[idx + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_parse_ipv4() {
        let t: Target = "192.0.2.1:443".parse().unwrap();
        assert_eq!(t.host, Host::Ipv4(Ipv4Addr::new(192, 0, 2, 1)));
        assert_eq!(t.port, 443);
        assert_eq!(t.to_string(), "192.0.2.1:443");
    }

    #[test]
    fn test_target_parse_ipv6() {
        let t: Target = "[2001:db8::1]:8443".parse().unwrap();
        assert!(matches!(t.host, Host::Ipv6(_)));
        assert_eq!(t.to_string(), "[2001:db8::1]:8443");
    }

    #[test]
    fn test_target_parse_domain() {
        let t: Target = "bridge.example.net:80".parse().unwrap();
        assert_eq!(t.host, Host::Domain("bridge.example.net".to_string()));
        assert!(t.host.to_ip().is_none());
    }

    #[test]
    fn test_target_rejects_bad_input() {
        assert!("no-port".parse::<Target>().is_err());
        assert!(":80".parse::<Target>().is_err());
        assert!("host:99999".parse::<Target>().is_err());
        assert!("1:2:3".parse::<Target>().is_err());
        assert!("[::1]80".parse::<Target>().is_err());
    }
}
