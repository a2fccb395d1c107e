//! SOCKS4a upstream dialer

use super::{Connection, Dialer};
use crate::common::net::connect_tcp;
use crate::common::{Host, Target};
use crate::{Error, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

const SOCKS4_VERSION: u8 = 0x04;
const CMD_CONNECT: u8 = 0x01;
const REP_GRANTED: u8 = 0x5a;

/// Dials through a SOCKS4a proxy. Credentials are a user id only.
pub struct Socks4aDialer {
    server: SocketAddr,
    user_id: Option<String>,
}

impl Socks4aDialer {
    pub fn new(server: SocketAddr, user_id: Option<String>) -> Self {
        Socks4aDialer { server, user_id }
    }

    fn connect_request(&self, target: &Target) -> Result<Vec<u8>> {
        let mut request = vec![SOCKS4_VERSION, CMD_CONNECT];
        request.extend_from_slice(&target.port.to_be_bytes());

        let domain = match &target.host {
            Host::Ipv4(ip) => {
                request.extend_from_slice(&ip.octets());
                None
            }
            Host::Domain(domain) => {
                // 0.0.0.x with x != 0 marks a 4a hostname request
                request.extend_from_slice(&[0, 0, 0, 1]);
                Some(domain)
            }
            Host::Ipv6(_) => {
                return Err(Error::protocol("SOCKS4a cannot carry IPv6 destinations"));
            }
        };

        if let Some(user) = &self.user_id {
            request.extend_from_slice(user.as_bytes());
        }
        request.push(0);

        if let Some(domain) = domain {
            request.extend_from_slice(domain.as_bytes());
            request.push(0);
        }
        Ok(request)
    }

    async fn socks4a_connect<S: AsyncRead + AsyncWrite + Unpin>(
        &self,
        stream: &mut S,
        target: &Target,
    ) -> Result<()> {
        stream
            .write_all(&self.connect_request(target)?)
            .await
            .map_err(|e| Error::connection(format!("Failed to send SOCKS4a request: {}", e)))?;

        let mut reply = [0u8; 8];
        stream
            .read_exact(&mut reply)
            .await
            .map_err(|e| Error::connection(format!("Failed to read SOCKS4a reply: {}", e)))?;

        if reply[0] != 0 {
            return Err(Error::protocol("Invalid SOCKS4a reply version"));
        }
        if reply[1] != REP_GRANTED {
            return Err(Error::connection(format!(
                "SOCKS4a request rejected (code {:#04x})",
                reply[1]
            )));
        }

        debug!("[socks4a] connected to {} via {}", target, self.server);
        Ok(())
    }
}

#[async_trait]
impl Dialer for Socks4aDialer {
    async fn dial(&self, target: &Target) -> Result<Box<dyn Connection>> {
        debug!("[socks4a] connecting to {} via {}", target, self.server);
        let mut stream = connect_tcp(&self.server.to_string()).await?;
        self.socks4a_connect(&mut stream, target).await?;
        Ok(Box::new(stream))
    }
}
