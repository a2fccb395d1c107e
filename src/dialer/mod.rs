//! Upstream dialers
//!
//! A [`Dialer`] opens a raw stream to a target, either directly or through
//! an upstream proxy. Transports chain through one shared `Arc<dyn Dialer>`.

mod direct;
mod http;
mod socks4a;
mod socks5;

pub use direct::Direct;
pub use http::HttpConnectDialer;
pub use socks4a::Socks4aDialer;
pub use socks5::Socks5Dialer;

use crate::common::Target;
use crate::config::{ProxyScheme, ProxyUri};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// Trait for anything that can establish an outbound stream
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Open a stream to `target`
    async fn dial(&self, target: &Target) -> Result<Box<dyn Connection>>;
}

/// Trait for established connections
pub trait Connection: AsyncRead + AsyncWrite + Send + Sync + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Sync + Unpin> Connection for T {}

/// Build the upstream dialer for a validated proxy, or a direct dialer when
/// no proxy is configured.
pub fn from_proxy_uri(uri: Option<&ProxyUri>) -> Arc<dyn Dialer> {
    match uri {
        None => Arc::new(Direct::new()),
        Some(uri) => match uri.scheme {
            ProxyScheme::Http => Arc::new(HttpConnectDialer::new(
                uri.addr,
                uri.username.clone(),
                uri.password.clone(),
            )),
            ProxyScheme::Socks4a => {
                Arc::new(Socks4aDialer::new(uri.addr, uri.username.clone()))
            }
            ProxyScheme::Socks5 => Arc::new(Socks5Dialer::new(
                uri.addr,
                uri.username.clone(),
                uri.password.clone(),
            )),
        },
    }
}
