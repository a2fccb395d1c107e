//! shadow (Shadowsocks) transport

use super::carrier::{decode_json, parse_address, Carrier};
use super::{DecodeContext, TransportDialer, TransportKind, TransportRegistry};
use crate::common::Target;
use crate::dialer::{Connection, Dialer};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// AEAD ciphers understood by the shadow implementation
const CIPHERS: &[&str] = &[
    "AEAD_CHACHA20_POLY1305",
    "AEAD_AES_256_GCM",
    "AEAD_AES_128_GCM",
    "chacha20-ietf-poly1305",
    "aes-256-gcm",
    "aes-128-gcm",
    "DarkStar",
];

fn check_cipher(cipher: &str) -> Result<()> {
    if CIPHERS.contains(&cipher) {
        Ok(())
    } else {
        Err(Error::config_decode(
            TransportKind::Shadow,
            format!("unsupported cipher {:?}", cipher),
        ))
    }
}

fn check_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(Error::config_decode(TransportKind::Shadow, "password must not be empty"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowConfig {
    pub password: String,
    #[serde(rename = "cipherName")]
    pub cipher_name: String,
    pub address: String,
}

impl ShadowConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: ShadowConfig = decode_json(TransportKind::Shadow, raw)?;
        check_password(&config.password)?;
        check_cipher(&config.cipher_name)?;
        parse_address(TransportKind::Shadow, &config.address)?;
        Ok(config)
    }
}

/// Server-side shadow options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowServerConfig {
    pub password: String,
    #[serde(rename = "cipherName")]
    pub cipher_name: String,
}

impl ShadowServerConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: ShadowServerConfig = decode_json(TransportKind::Shadow, raw)?;
        check_password(&config.password)?;
        check_cipher(&config.cipher_name)?;
        Ok(config)
    }
}

/// shadow connects directly to its server; an upstream proxy is never used.
pub struct ShadowTransport {
    config: ShadowConfig,
    carrier: Carrier,
}

impl ShadowTransport {
    pub fn new(config: ShadowConfig) -> Result<Self> {
        let endpoint = parse_address(TransportKind::Shadow, &config.address)?;
        Ok(ShadowTransport {
            carrier: Carrier::direct(TransportKind::Shadow, Some(endpoint)),
            config,
        })
    }

    pub fn cipher_name(&self) -> &str {
        &self.config.cipher_name
    }
}

#[async_trait]
impl Dialer for ShadowTransport {
    async fn dial(&self, target: &Target) -> Result<Box<dyn Connection>> {
        self.carrier.open(target).await
    }
}

impl TransportDialer for ShadowTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Shadow
    }
}

pub(crate) fn decode(
    _registry: &TransportRegistry,
    _ctx: &DecodeContext,
    raw: &str,
) -> Result<Arc<dyn TransportDialer>> {
    let config = ShadowConfig::from_json(raw)?;
    Ok(Arc::new(ShadowTransport::new(config)?))
}
