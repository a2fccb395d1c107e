//! StarBridge transport
//!
//! StarBridge options carry only the server's persistent key. The server
//! address comes from outside the options: the Optimizer descriptor or the
//! caller's `address`.

use super::carrier::{decode_json, parse_address, Carrier};
use super::{DecodeContext, TransportDialer, TransportKind, TransportRegistry};
use crate::common::Target;
use crate::dialer::{Connection, Dialer};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const KIND: TransportKind = TransportKind::StarBridge;

fn check_key(field: &str, key: &str) -> Result<()> {
    let bytes = STANDARD
        .decode(key.trim())
        .map_err(|e| Error::config_decode(KIND, format!("{} is not valid base64: {}", field, e)))?;
    if bytes.is_empty() {
        return Err(Error::config_decode(KIND, format!("{} must not be empty", field)));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarBridgeConfig {
    #[serde(rename = "serverPersistentPublicKey")]
    pub server_persistent_public_key: String,
}

impl StarBridgeConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: StarBridgeConfig = decode_json(KIND, raw)?;
        check_key("serverPersistentPublicKey", &config.server_persistent_public_key)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarBridgeServerConfig {
    #[serde(rename = "serverPersistentPrivateKey")]
    pub server_persistent_private_key: String,
}

impl StarBridgeServerConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: StarBridgeServerConfig = decode_json(KIND, raw)?;
        check_key("serverPersistentPrivateKey", &config.server_persistent_private_key)?;
        Ok(config)
    }
}

pub struct StarBridgeTransport {
    config: StarBridgeConfig,
    carrier: Carrier,
}

impl StarBridgeTransport {
    pub fn new(config: StarBridgeConfig, ctx: &DecodeContext) -> Result<Self> {
        let address = ctx
            .address()
            .ok_or_else(|| Error::config_decode(KIND, "an address is required"))?;
        let endpoint = parse_address(KIND, address)?;
        Ok(StarBridgeTransport {
            carrier: Carrier::new(KIND, Some(endpoint), ctx.upstream()),
            config,
        })
    }

    pub fn server_public_key(&self) -> &str {
        &self.config.server_persistent_public_key
    }

    pub fn address(&self) -> Option<&Target> {
        self.carrier.endpoint()
    }
}

#[async_trait]
impl Dialer for StarBridgeTransport {
    async fn dial(&self, target: &Target) -> Result<Box<dyn Connection>> {
        self.carrier.open(target).await
    }
}

impl TransportDialer for StarBridgeTransport {
    fn kind(&self) -> TransportKind {
        KIND
    }
}

pub(crate) fn decode(
    _registry: &TransportRegistry,
    ctx: &DecodeContext,
    raw: &str,
) -> Result<Arc<dyn TransportDialer>> {
    let config = StarBridgeConfig::from_json(raw)?;
    Ok(Arc::new(StarBridgeTransport::new(config, ctx)?))
}
