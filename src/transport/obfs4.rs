//! obfs4 transport

use super::carrier::{decode_json, parse_address, Carrier};
use super::{DecodeContext, TransportDialer, TransportKind, TransportRegistry};
use crate::common::Target;
use crate::dialer::{Connection, Dialer};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Node ID (20 bytes) followed by the server's Curve25519 public key (32 bytes)
const CERT_LEN: usize = 52;

/// Inter-arrival time obfuscation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IatMode {
    None,
    Enabled,
    Paranoid,
}

impl IatMode {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "0" => Some(IatMode::None),
            "1" => Some(IatMode::Enabled),
            "2" => Some(IatMode::Paranoid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obfs4Config {
    pub cert: String,
    #[serde(rename = "iat-mode")]
    pub iat_mode: String,
    pub address: String,
}

impl Obfs4Config {
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Obfs4Config = decode_json(TransportKind::Obfs4, raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let cert = base64::engine::general_purpose::STANDARD_NO_PAD
            .decode(self.cert.trim_end_matches('='))
            .map_err(|e| Error::config_decode(TransportKind::Obfs4, format!("invalid cert: {}", e)))?;
        if cert.len() != CERT_LEN {
            return Err(Error::config_decode(
                TransportKind::Obfs4,
                format!("cert decodes to {} bytes, expected {}", cert.len(), CERT_LEN),
            ));
        }
        self.iat()?;
        parse_address(TransportKind::Obfs4, &self.address)?;
        Ok(())
    }

    pub fn iat(&self) -> Result<IatMode> {
        IatMode::parse(&self.iat_mode).ok_or_else(|| {
            Error::config_decode(
                TransportKind::Obfs4,
                format!("invalid iat-mode {:?}, expected \"0\", \"1\" or \"2\"", self.iat_mode),
            )
        })
    }
}

pub struct Obfs4Transport {
    config: Obfs4Config,
    iat_mode: IatMode,
    carrier: Carrier,
}

impl Obfs4Transport {
    pub fn new(config: Obfs4Config, ctx: &DecodeContext) -> Result<Self> {
        let endpoint = parse_address(TransportKind::Obfs4, &config.address)?;
        Ok(Obfs4Transport {
            iat_mode: config.iat()?,
            carrier: Carrier::new(TransportKind::Obfs4, Some(endpoint), ctx.upstream()),
            config,
        })
    }

    pub fn config(&self) -> &Obfs4Config {
        &self.config
    }

    pub fn iat_mode(&self) -> IatMode {
        self.iat_mode
    }
}

#[async_trait]
impl Dialer for Obfs4Transport {
    async fn dial(&self, target: &Target) -> Result<Box<dyn Connection>> {
        debug!("[obfs4] iat mode {:?}", self.iat_mode);
        self.carrier.open(target).await
    }
}

impl TransportDialer for Obfs4Transport {
    fn kind(&self) -> TransportKind {
        TransportKind::Obfs4
    }
}

pub(crate) fn decode(
    _registry: &TransportRegistry,
    ctx: &DecodeContext,
    raw: &str,
) -> Result<Arc<dyn TransportDialer>> {
    let config = Obfs4Config::from_json(raw)?;
    Ok(Arc::new(Obfs4Transport::new(config, ctx)?))
}
