//! HTTP CONNECT upstream dialer

use super::{Connection, Dialer};
use crate::common::net::connect_tcp;
use crate::common::Target;
use crate::{Error, Result};
use async_trait::async_trait;
use base64::Engine;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Upper bound on the proxy's CONNECT response headers
const MAX_RESPONSE_HEADER: usize = 1024;

/// Dials through an HTTP proxy using the CONNECT method
pub struct HttpConnectDialer {
    server: SocketAddr,
    username: Option<String>,
    password: Option<String>,
}

impl HttpConnectDialer {
    pub fn new(server: SocketAddr, username: Option<String>, password: Option<String>) -> Self {
        HttpConnectDialer {
            server,
            username,
            password,
        }
    }

    /// Build the Proxy-Authorization header value
    fn auth_header(&self) -> Option<String> {
        let user = self.username.as_ref()?;
        let credentials = format!("{}:{}", user, self.password.as_deref().unwrap_or(""));
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        Some(format!("Basic {}", encoded))
    }

    fn connect_request(&self, target: &Target) -> String {
        let authority = target.authority();
        let mut request = format!(
            "CONNECT {} HTTP/1.1\r\nHost: {}\r\n",
            authority, authority
        );
        if let Some(auth) = self.auth_header() {
            request.push_str(&format!("Proxy-Authorization: {}\r\n", auth));
        }
        request.push_str("\r\n");
        request
    }

    async fn http_connect<S: AsyncRead + AsyncWrite + Unpin>(
        &self,
        stream: &mut S,
        target: &Target,
    ) -> Result<()> {
        stream
            .write_all(self.connect_request(target).as_bytes())
            .await
            .map_err(|e| Error::connection(format!("Failed to send CONNECT request: {}", e)))?;
        stream.flush().await?;

        let mut response = [0u8; MAX_RESPONSE_HEADER];
        let mut total_read = 0;

        loop {
            let n = stream.read(&mut response[total_read..]).await.map_err(|e| {
                Error::connection(format!("Failed to read CONNECT response: {}", e))
            })?;
            if n == 0 {
                return Err(Error::connection("Connection closed during CONNECT"));
            }
            total_read += n;

            if let Some(header_end) = find_header_end(&response[..total_read]) {
                let head = String::from_utf8_lossy(&response[..header_end]);
                let status_line = head.lines().next().unwrap_or("");
                return match status_code(status_line) {
                    Some(200) => {
                        debug!("[http] CONNECT to {} established via {}", target, self.server);
                        Ok(())
                    }
                    Some(407) => Err(Error::auth("Proxy authentication required")),
                    _ => Err(Error::connection(format!("CONNECT failed: {}", status_line))),
                };
            }

            if total_read >= response.len() {
                return Err(Error::connection("CONNECT response too large"));
            }
        }
    }
}

/// Find end of HTTP headers (double CRLF)
fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

fn status_code(status_line: &str) -> Option<u16> {
    let mut parts = status_line.split_whitespace();
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}

#[async_trait]
impl Dialer for HttpConnectDialer {
    async fn dial(&self, target: &Target) -> Result<Box<dyn Connection>> {
        debug!("[http] connecting to {} via {}", target, self.server);
        let mut stream = connect_tcp(&self.server.to_string()).await?;
        self.http_connect(&mut stream, target).await?;
        Ok(Box::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn test_find_header_end() {
        assert_eq!(find_header_end(b"HTTP/1.1 200 OK\r\n\r\n"), Some(19));
        assert_eq!(find_header_end(b"HTTP/1.1 200 OK\r\n"), None);
    }

    #[test]
    fn test_status_code() {
        assert_eq!(status_code("HTTP/1.1 200 Connection established"), Some(200));
        assert_eq!(status_code("HTTP/1.0 407 Proxy Authentication Required"), Some(407));
        assert_eq!(status_code("garbage 200"), None);
    }

    #[test]
    fn test_auth_header() {
        let dialer = HttpConnectDialer::new(
            "127.0.0.1:3128".parse().unwrap(),
            Some("user".to_string()),
            Some("pass".to_string()),
        );
        assert_eq!(dialer.auth_header().unwrap(), "Basic dXNlcjpwYXNz");
    }

    #[tokio::test]
    async fn test_connect_ok() {
        let dialer = HttpConnectDialer::new("127.0.0.1:3128".parse().unwrap(), None, None);
        let target = Target::new("192.0.2.5", 443);
        let mut mock = Builder::new()
            .write(b"CONNECT 192.0.2.5:443 HTTP/1.1\r\nHost: 192.0.2.5:443\r\n\r\n")
            .read(b"HTTP/1.1 200 Connection established\r\n\r\n")
            .build();
        dialer.http_connect(&mut mock, &target).await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_auth_required() {
        let dialer = HttpConnectDialer::new("127.0.0.1:3128".parse().unwrap(), None, None);
        let target = Target::new("192.0.2.5", 443);
        let mut mock = Builder::new()
            .write(b"CONNECT 192.0.2.5:443 HTTP/1.1\r\nHost: 192.0.2.5:443\r\n\r\n")
            .read(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n")
            .build();
        let err = dialer.http_connect(&mut mock, &target).await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }
}
