//! Upstream proxy URI validation
//!
//! Accepts `http://`, `socks4a://` and `socks5://` URIs whose authority is a
//! literal `ip:port`. Validation is purely syntactic; nothing is resolved.

use crate::common::net::split_host_port;
use crate::common::StatusChannel;
use crate::{Error, Result};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use tracing::warn;
use url::{ParseError, Url};

/// RFC 1929 limits both username and password to 255 bytes.
const SOCKS5_CREDENTIAL_MAX: usize = 255;

/// Scheme of an upstream proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyScheme {
    Http,
    Socks4a,
    Socks5,
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyScheme::Http => write!(f, "http"),
            ProxyScheme::Socks4a => write!(f, "socks4a"),
            ProxyScheme::Socks5 => write!(f, "socks5"),
        }
    }
}

/// A validated upstream proxy endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyUri {
    pub scheme: ProxyScheme,
    pub username: Option<String>,
    pub password: Option<String>,
    pub addr: SocketAddr,
}

impl fmt::Display for ProxyUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.scheme)?;
        if let Some(user) = &self.username {
            write!(f, "{}", urlencoding::encode(user))?;
            if let Some(pass) = &self.password {
                write!(f, ":{}", urlencoding::encode(pass))?;
            }
            write!(f, "@")?;
        }
        write!(f, "{}", self.addr)
    }
}

impl fmt::Debug for ProxyUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyUri")
            .field("scheme", &self.scheme)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("addr", &self.addr)
            .finish()
    }
}

/// Validate a proxy spec, reporting failures on stdout.
///
/// An empty spec means no proxy is configured and yields `Ok(None)`.
pub fn validate(spec: &str) -> Result<Option<ProxyUri>> {
    validate_with(spec, &StatusChannel::stdout())
}

/// Validate a proxy spec, reporting failures on `status` before returning them.
pub fn validate_with(spec: &str, status: &StatusChannel) -> Result<Option<ProxyUri>> {
    if spec.is_empty() {
        return Ok(None);
    }

    match parse(spec) {
        Ok(uri) => Ok(Some(uri)),
        Err(e) => {
            warn!("[proxy] rejected upstream proxy: {}", e);
            status.proxy_error(&e.to_string());
            Err(e)
        }
    }
}

fn parse(spec: &str) -> Result<ProxyUri> {
    let url = Url::parse(spec).map_err(|e| match e {
        ParseError::RelativeUrlWithoutBase => {
            Error::invalid_proxy_spec("proxy URI is relative, must be absolute")
        }
        ParseError::InvalidPort | ParseError::EmptyHost => {
            Error::invalid_host_port(format!("proxy URI has invalid host: {}", e))
        }
        e =>Error::invalid_proxy_spec(format!("failed to parse proxy config: {}", e)),
    })?;

    let authority = raw_authority(spec);
    let path = url.path();
    if authority.is_none() || has_raw_path(spec) || !(path.is_empty() || path == "/") {
        return Err(Error::invalid_proxy_spec("proxy URI has a path defined"));
    }
    if url.query().map_or(false, |q| !q.is_empty()) {
        return Err(Error::invalid_proxy_spec("proxy URI has a query defined"));
    }
    if url.fragment().map_or(false, |f| !f.is_empty()) {
        return Err(Error::invalid_proxy_spec("proxy URI has a fragment defined"));
    }

    let scheme = match url.scheme() {
        "http" => ProxyScheme::Http,
        "socks4a" => ProxyScheme::Socks4a,
        "socks5" => ProxyScheme::Socks5,
        other => return Err(Error::UnsupportedScheme(other.to_string())),
    };

    // Authority is read from the raw input: `url` drops explicit default
    // ports and would hide a missing one.
    let authority = authority.unwrap_or_default();
    let (userinfo, host_port) = match authority.rsplit_once('@') {
        Some((userinfo, host_port)) => (Some(userinfo), host_port),
        None => (None, authority),
    };

    let (username, password) = match userinfo {
        Some(info) => {
            let (user, pass) = match info.split_once(':') {
                Some((user, pass)) => (user, Some(pass)),
                None => (info, None),
            };
            (Some(percent_decode(user)?), pass.map(percent_decode).transpose()?)
        }
        None => (None, None),
    };
    // SOCKS4a terminates the user id with NUL.
    if username.iter().chain(password.iter()).any(|s| s.contains('\0')) {
        return Err(Error::invalid_proxy_spec(
            "proxy URI user info contains a NUL byte",
        ));
    }

    match scheme {
        ProxyScheme::Http => {}
        ProxyScheme::Socks4a => {
            if password.is_some() {
                return Err(Error::invalid_proxy_spec(
                    "proxy URI specified SOCKS4a and a password",
                ));
            }
        }
        ProxyScheme::Socks5 => {
            if let Some(user) = &username {
                if !(1..=SOCKS5_CREDENTIAL_MAX).contains(&user.len()) {
                    return Err(Error::invalid_proxy_spec(
                        "proxy URI specified a invalid SOCKS5 username",
                    ));
                }
                let pass_len = password.as_ref().map_or(0, |p| p.len());
                if !(1..=SOCKS5_CREDENTIAL_MAX).contains(&pass_len) {
                    return Err(Error::invalid_proxy_spec(
                        "proxy URI specified a invalid SOCKS5 password",
                    ));
                }
            }
        }
    }

    let addr = resolve_addr_str(host_port)?;

    Ok(ProxyUri {
        scheme,
        username,
        password,
        addr,
    })
}

/// Authority section of `scheme://authority[/path][?query][#fragment]`.
fn raw_authority(spec: &str) -> Option<&str> {
    let (_, rest) = spec.split_once("://")?;
    let end = rest
        .find(|c: char| matches!(c, '/' | '?' | '#'))
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn has_raw_path(spec: &str) -> bool {
    spec.split_once("://")
        .and_then(|(_, rest)| rest.find(|c: char| matches!(c, '/' | '?' | '#')).map(|i| &rest[i..]))
        .map_or(false, |tail| tail.starts_with('/'))
}

fn percent_decode(s: &str) -> Result<String> {
    urlencoding::decode(s)
        .map(|c| c.into_owned())
        .map_err(|e| Error::invalid_proxy_spec(format!("proxy URI has malformed user info: {}", e)))
}

fn resolve_addr_str(addr: &str) -> Result<SocketAddr> {
    let (ip_str, port_str) = split_host_port(addr)
        .map_err(|e| Error::invalid_host_port(format!("{:?}: {}", addr, e)))?;

    if ip_str.is_empty() {
        return Err(Error::invalid_host_port(format!(
            "address string {:?} lacks a host part",
            addr
        )));
    }
    if port_str.is_empty() {
        return Err(Error::invalid_host_port(format!(
            "address string {:?} lacks a port part",
            addr
        )));
    }
    let ip: IpAddr = ip_str
        .parse()
        .map_err(|_| Error::invalid_host_port(format!("not an IP string: {:?}", ip_str)))?;
    if !port_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::invalid_host_port(format!(
            "not a Port string: {:?}",
            port_str
        )));
    }
    let port: u16 = port_str
        .parse()
        .map_err(|_| Error::invalid_host_port(format!("not a Port string: {:?}", port_str)))?;

    Ok(SocketAddr::new(ip, port))
}
