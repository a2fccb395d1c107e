//! Dust transport

use super::carrier::{decode_json, parse_address, Carrier};
use super::{DecodeContext, TransportDialer, TransportKind, TransportRegistry};
use crate::common::Target;
use crate::dialer::{Connection, Dialer};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DustConfig {
    #[serde(rename = "server-public")]
    pub server_public: String,
    pub address: String,
}

impl DustConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: DustConfig = decode_json(TransportKind::Dust, raw)?;
        if config.server_public.trim().is_empty() {
            return Err(Error::config_decode(
                TransportKind::Dust,
                "server-public must not be empty",
            ));
        }
        parse_address(TransportKind::Dust, &config.address)?;
        Ok(config)
    }
}

pub struct DustTransport {
    config: DustConfig,
    carrier: Carrier,
}

impl DustTransport {
    pub fn new(config: DustConfig, ctx: &DecodeContext) -> Result<Self> {
        let endpoint = parse_address(TransportKind::Dust, &config.address)?;
        Ok(DustTransport {
            carrier: Carrier::new(TransportKind::Dust, Some(endpoint), ctx.upstream()),
            config,
        })
    }

    pub fn server_public(&self) -> &str {
        &self.config.server_public
    }
}

#[async_trait]
impl Dialer for DustTransport {
    async fn dial(&self, target: &Target) -> Result<Box<dyn Connection>> {
        self.carrier.open(target).await
    }
}

impl TransportDialer for DustTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Dust
    }
}

pub(crate) fn decode(
    _registry: &TransportRegistry,
    ctx: &DecodeContext,
    raw: &str,
) -> Result<Arc<dyn TransportDialer>> {
    let config = DustConfig::from_json(raw)?;
    Ok(Arc::new(DustTransport::new(config, ctx)?))
}
