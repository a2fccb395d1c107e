//! SOCKS5 upstream dialer
//!
//! Implements the CONNECT command of RFC 1928 with optional RFC 1929
//! username/password authentication.

use super::{Connection, Dialer};
use crate::common::net::connect_tcp;
use crate::common::{Host, Target};
use crate::{Error, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// SOCKS5 version
const SOCKS5_VERSION: u8 = 0x05;

/// SOCKS5 authentication methods
const AUTH_NONE: u8 = 0x00;
const AUTH_PASSWORD: u8 = 0x02;
const AUTH_NO_ACCEPTABLE: u8 = 0xFF;

const CMD_CONNECT: u8 = 0x01;

/// SOCKS5 address types
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

/// SOCKS5 reply codes
const REP_SUCCESS: u8 = 0x00;
const REP_GENERAL_FAILURE: u8 = 0x01;
const REP_CONNECTION_NOT_ALLOWED: u8 = 0x02;
const REP_NETWORK_UNREACHABLE: u8 = 0x03;
const REP_HOST_UNREACHABLE: u8 = 0x04;
const REP_CONNECTION_REFUSED: u8 = 0x05;
const REP_TTL_EXPIRED: u8 = 0x06;
const REP_COMMAND_NOT_SUPPORTED: u8 = 0x07;
const REP_ADDRESS_TYPE_NOT_SUPPORTED: u8 = 0x08;

/// Dials through a SOCKS5 proxy
pub struct Socks5Dialer {
    server: SocketAddr,
    username: Option<String>,
    password: Option<String>,
}

impl Socks5Dialer {
    pub fn new(server: SocketAddr, username: Option<String>, password: Option<String>) -> Self {
        Socks5Dialer {
            server,
            username,
            password,
        }
    }

    /// Perform SOCKS5 handshake and connect
    async fn socks5_connect<S: AsyncRead + AsyncWrite + Unpin>(
        &self,
        stream: &mut S,
        target: &Target,
    ) -> Result<()> {
        let mut greeting = vec![SOCKS5_VERSION];
        if self.username.is_some() && self.password.is_some() {
            greeting.extend_from_slice(&[2, AUTH_NONE, AUTH_PASSWORD]);
        } else {
            greeting.extend_from_slice(&[1, AUTH_NONE]);
        }

        stream.write_all(&greeting).await.map_err(|e| {
            Error::connection(format!("Failed to send SOCKS5 greeting: {}", e))
        })?;

        let mut response = [0u8; 2];
        stream.read_exact(&mut response).await.map_err(|e| {
            Error::connection(format!("Failed to read SOCKS5 response: {}", e))
        })?;

        if response[0] != SOCKS5_VERSION {
            return Err(Error::protocol("Invalid SOCKS5 version"));
        }

        match response[1] {
            AUTH_NONE => {
                debug!("[socks5] no authentication required");
            }
            AUTH_PASSWORD => {
                self.authenticate_password(stream).await?;
            }
            AUTH_NO_ACCEPTABLE => {
                return Err(Error::auth("No acceptable authentication method"));
            }
            other => {
                return Err(Error::protocol(format!(
                    "Unsupported authentication method: {}",
                    other
                )));
            }
        }

        stream
            .write_all(&Self::connect_request(target)?)
            .await
            .map_err(|e| {
                Error::connection(format!("Failed to send SOCKS5 connect request: {}", e))
            })?;

        let mut reply = [0u8; 4];
        stream.read_exact(&mut reply).await.map_err(|e| {
            Error::connection(format!("Failed to read SOCKS5 reply: {}", e))
        })?;

        if reply[0] != SOCKS5_VERSION {
            return Err(Error::protocol("Invalid SOCKS5 version in reply"));
        }
        if reply[1] != REP_SUCCESS {
            return Err(Error::connection(Self::reply_error_message(reply[1])));
        }

        // Skip bound address
        match reply[3] {
            ATYP_IPV4 => {
                let mut buf = [0u8; 4 + 2];
                stream.read_exact(&mut buf).await?;
            }
            ATYP_IPV6 => {
                let mut buf = [0u8; 16 + 2];
                stream.read_exact(&mut buf).await?;
            }
            ATYP_DOMAIN => {
                let mut len = [0u8; 1];
                stream.read_exact(&mut len).await?;
                let mut buf = vec![0u8; len[0] as usize + 2];
                stream.read_exact(&mut buf).await?;
            }
            _ => return Err(Error::protocol("Invalid address type in reply")),
        }

        debug!("[socks5] connected to {} via {}", target, self.server);
        Ok(())
    }

    fn connect_request(target: &Target) -> Result<Vec<u8>> {
        let mut request = vec![SOCKS5_VERSION, CMD_CONNECT, 0x00];
        match &target.host {
            Host::Ipv4(ip) => {
                request.push(ATYP_IPV4);
                request.extend_from_slice(&ip.octets());
            }
            Host::Ipv6(ip) => {
                request.push(ATYP_IPV6);
                request.extend_from_slice(&ip.octets());
            }
            Host::Domain(domain) => {
                if domain.len() > 255 {
                    return Err(Error::connection("Domain name too long"));
                }
                request.push(ATYP_DOMAIN);
                request.push(domain.len() as u8);
                request.extend_from_slice(domain.as_bytes());
            }
        }
        request.extend_from_slice(&target.port.to_be_bytes());
        Ok(request)
    }

    /// RFC 1929 username/password sub-negotiation
    async fn authenticate_password<S: AsyncRead + AsyncWrite + Unpin>(
        &self,
        stream: &mut S,
    ) -> Result<()> {
        let username = self
            .username
            .as_ref()
            .ok_or_else(|| Error::auth("Username required for authentication"))?;
        let password = self
            .password
            .as_ref()
            .ok_or_else(|| Error::auth("Password required for authentication"))?;

        if username.len() > 255 || password.len() > 255 {
            return Err(Error::auth("Username or password too long"));
        }

        let mut auth_request = vec![0x01];
        auth_request.push(username.len() as u8);
        auth_request.extend_from_slice(username.as_bytes());
        auth_request.push(password.len() as u8);
        auth_request.extend_from_slice(password.as_bytes());

        stream.write_all(&auth_request).await?;

        let mut response = [0u8; 2];
        stream.read_exact(&mut response).await?;

        if response[1] != 0x00 {
            return Err(Error::auth("Authentication failed"));
        }

        debug!("[socks5] password authentication successful");
        Ok(())
    }

    fn reply_error_message(code: u8) -> String {
        match code {
            REP_GENERAL_FAILURE => "General SOCKS server failure".to_string(),
            REP_CONNECTION_NOT_ALLOWED => "Connection not allowed by ruleset".to_string(),
            REP_NETWORK_UNREACHABLE => "Network unreachable".to_string(),
            REP_HOST_UNREACHABLE => "Host unreachable".to_string(),
            REP_CONNECTION_REFUSED => "Connection refused".to_string(),
            REP_TTL_EXPIRED => "TTL expired".to_string(),
            REP_COMMAND_NOT_SUPPORTED => "Command not supported".to_string(),
            REP_ADDRESS_TYPE_NOT_SUPPORTED => "Address type not supported".to_string(),
            _ => format!("Unknown error: {}", code),
        }
    }
}

#[async_trait]
impl Dialer for Socks5Dialer {
    async fn dial(&self, target: &Target) -> Result<Box<dyn Connection>> {
        debug!("[socks5] connecting to {} via {}", target, self.server);
        let mut stream = connect_tcp(&self.server.to_string()).await?;
        self.socks5_connect(&mut stream, target).await?;
        Ok(Box::new(stream))
    }
}
