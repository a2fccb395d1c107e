//! obfs2 transport

use super::carrier::{decode_json, parse_address, Carrier};
use super::{DecodeContext, TransportDialer, TransportKind, TransportRegistry};
use crate::common::Target;
use crate::dialer::{Connection, Dialer};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obfs2Config {
    pub address: String,
}

impl Obfs2Config {
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Obfs2Config = decode_json(TransportKind::Obfs2, raw)?;
        parse_address(TransportKind::Obfs2, &config.address)?;
        Ok(config)
    }
}

/// obfs2 always connects directly; an upstream proxy is never used.
pub struct Obfs2Transport {
    config: Obfs2Config,
    carrier: Carrier,
}

impl Obfs2Transport {
    pub fn new(config: Obfs2Config) -> Result<Self> {
        let endpoint = parse_address(TransportKind::Obfs2, &config.address)?;
        Ok(Obfs2Transport {
            carrier: Carrier::direct(TransportKind::Obfs2, Some(endpoint)),
            config,
        })
    }

    pub fn config(&self) -> &Obfs2Config {
        &self.config
    }
}

#[async_trait]
impl Dialer for Obfs2Transport {
    async fn dial(&self, target: &Target) -> Result<Box<dyn Connection>> {
        self.carrier.open(target).await
    }
}

impl TransportDialer for Obfs2Transport {
    fn kind(&self) -> TransportKind {
        TransportKind::Obfs2
    }
}

pub(crate) fn decode(
    _registry: &TransportRegistry,
    _ctx: &DecodeContext,
    raw: &str,
) -> Result<Arc<dyn TransportDialer>> {
    let config = Obfs2Config::from_json(raw)?;
    Ok(Arc::new(Obfs2Transport::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_round_trip() {
        let input = serde_json::json!({"address": "192.0.2.1:2222"});
        let config = Obfs2Config::from_json(&input.to_string()).unwrap();
        assert_eq!(config.address, "192.0.2.1:2222");
        assert_eq!(serde_json::to_value(&config).unwrap(), input);
    }

    #[test]
    fn test_missing_address() {
        let err = Obfs2Config::from_json("{}").unwrap_err();
        assert!(matches!(err, Error::ConfigDecode { ref kind, .. } if kind == "obfs2"));
    }

    #[test]
    fn test_bad_address() {
        let err = Obfs2Config::from_json(r#"{"address": "nowhere"}"#).unwrap_err();
        assert!(matches!(err, Error::ConfigDecode { .. }));
    }
}
