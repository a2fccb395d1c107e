//! meeklite (domain fronting) transport

use super::carrier::{decode_json, parse_address, Carrier};
use super::{DecodeContext, TransportDialer, TransportKind, TransportRegistry};
use crate::common::Target;
use crate::dialer::{Connection, Dialer};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

const FRONT_PORT: u16 = 443;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeekliteConfig {
    pub url: String,
    pub front: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl MeekliteConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: MeekliteConfig = decode_json(TransportKind::Meeklite, raw)?;
        config.parse_url()?;
        if config.front.trim().is_empty() {
            return Err(Error::config_decode(TransportKind::Meeklite, "front must not be empty"));
        }
        config.endpoint()?;
        Ok(config)
    }

    /// The meek server URL; must be absolute http(s) with a host.
    pub fn parse_url(&self) -> Result<Url> {
        let url = Url::parse(&self.url).map_err(|e| {
            Error::config_decode(TransportKind::Meeklite, format!("invalid url: {}", e))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(Error::config_decode(
                TransportKind::Meeklite,
                format!("url {:?} is not an absolute http(s) URL", self.url),
            ));
        }
        Ok(url)
    }

    /// Configured address, falling back to the front domain on 443.
    fn endpoint(&self) -> Result<Target> {
        match self.address.as_deref() {
            Some(address) => parse_address(TransportKind::Meeklite, address),
            None => Ok(Target::new(self.front.trim(), FRONT_PORT)),
        }
    }
}

/// Server-side meek options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeekServerConfig {
    #[serde(rename = "acme-email")]
    pub acme_email: String,
    #[serde(rename = "acme-hostnames")]
    pub acme_hostnames: String,
}

impl MeekServerConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: MeekServerConfig = decode_json(TransportKind::Meeklite, raw)?;
        if config.hostnames().is_empty() {
            return Err(Error::config_decode(
                TransportKind::Meeklite,
                "acme-hostnames must name at least one host",
            ));
        }
        Ok(config)
    }

    /// Comma separated `acme-hostnames`, trimmed.
    pub fn hostnames(&self) -> Vec<&str> {
        self.acme_hostnames
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .collect()
    }
}

pub struct MeekliteTransport {
    config: MeekliteConfig,
    url: Url,
    carrier: Carrier,
}

impl MeekliteTransport {
    pub fn new(config: MeekliteConfig, ctx: &DecodeContext) -> Result<Self> {
        let url = config.parse_url()?;
        let endpoint = match (config.address.is_some(), ctx.address()) {
            (false, Some(address)) => parse_address(TransportKind::Meeklite, address)?,
            _ => config.endpoint()?,
        };
        Ok(MeekliteTransport {
            carrier: Carrier::new(TransportKind::Meeklite, Some(endpoint), ctx.upstream()),
            url,
            config,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn front(&self) -> &str {
        &self.config.front
    }

    /// Address the carrier connects to, when one was resolved at decode.
    pub fn endpoint(&self) -> Option<&Target> {
        self.carrier.endpoint()
    }
}

#[async_trait]
impl Dialer for MeekliteTransport {
    async fn dial(&self, target: &Target) -> Result<Box<dyn Connection>> {
        self.carrier.open(target).await
    }
}

impl TransportDialer for MeekliteTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Meeklite
    }
}

pub(crate) fn decode(
    _registry: &TransportRegistry,
    ctx: &DecodeContext,
    raw: &str,
) -> Result<Arc<dyn TransportDialer>> {
    let config = MeekliteConfig::from_json(raw)?;
    Ok(Arc::new(MeekliteTransport::new(config, ctx)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip() {
        let input = json!({"url": "https://meek.example.net/", "front": "cdn.example.com"});
        let config = MeekliteConfig::from_json(&input.to_string()).unwrap();
        assert_eq!(config.address, None);
        assert_eq!(serde_json::to_value(&config).unwrap(), input);
    }

    #[test]
    fn test_relative_url_rejected() {
        for url in ["/meek", "ftp://meek.example.net/", "meek.example.net"] {
            let raw = json!({"url": url, "front": "cdn.example.com"}).to_string();
            let err = MeekliteConfig::from_json(&raw).unwrap_err();
            assert!(matches!(err, Error::ConfigDecode { ref kind, .. } if kind == "meeklite"), "{}", url);
        }
    }

    #[test]
    fn test_endpoint_defaults_to_front() {
        let raw = json!({"url": "https://meek.example.net/", "front": "cdn.example.com"}).to_string();
        let transport =
            MeekliteTransport::new(MeekliteConfig::from_json(&raw).unwrap(), &DecodeContext::new(None, None))
                .unwrap();
        assert_eq!(transport.endpoint(), Some(&Target::new("cdn.example.com", 443)));
    }

    #[test]
    fn test_config_address_wins() {
        let raw = json!({
            "url": "https://meek.example.net/",
            "front": "cdn.example.com",
            "address": "192.0.2.44:8443",
        })
        .to_string();
        let ctx = DecodeContext::new(None, Some("203.0.113.1:443"));
        let transport = MeekliteTransport::new(MeekliteConfig::from_json(&raw).unwrap(), &ctx).unwrap();
        assert_eq!(transport.endpoint().map(|t| t.port), Some(8443));
    }

    #[test]
    fn test_server_config() {
        let raw = json!({"acme-email": "ops@example.net", "acme-hostnames": "a.example.net, b.example.net"})
            .to_string();
        let config = MeekServerConfig::from_json(&raw).unwrap();
        assert_eq!(config.hostnames(), vec!["a.example.net", "b.example.net"]);
        assert!(MeekServerConfig::from_json(r#"{"acme-email": "x"}"#).is_err());
    }
}
