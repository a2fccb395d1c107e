//! Replicant transport
//!
//! Replicant options travel inside an envelope: `{"config": "<base64>"}`
//! where the base64 payload is itself the JSON client or server config.
//! Envelope failures and payload failures are reported separately.

use super::carrier::{parse_address, Carrier};
use super::{DecodeContext, TransportDialer, TransportKind, TransportRegistry};
use crate::common::Target;
use crate::dialer::{Connection, Dialer};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

const KIND: TransportKind = TransportKind::Replicant;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(alias = "Config")]
    config: String,
}

fn open_envelope(raw: &str) -> Result<String> {
    let envelope: Envelope = serde_json::from_str(raw)
        .map_err(|e| Error::envelope_decode(KIND, format!("could not unmarshal Replicant args: {}", e)))?;
    Ok(envelope.config)
}

fn decode_payload<T: DeserializeOwned>(encoded: &str) -> Result<T> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::config_decode(KIND, format!("invalid base64 config: {}", e)))?;
    serde_json::from_slice(&bytes).map_err(|e| Error::config_decode(KIND, e.to_string()))
}

fn encode_payload<T: Serialize>(config: &T) -> Result<String> {
    let json = serde_json::to_vec(config)?;
    Ok(STANDARD.encode(json))
}

/// Wrap an encoded payload in the `{"config": ...}` envelope.
fn seal_envelope(encoded: String) -> Result<String> {
    Ok(serde_json::to_string(&Envelope { config: encoded })?)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicantClientConfig {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toneburst: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polish: Option<Value>,
}

impl ReplicantClientConfig {
    pub fn new(address: impl Into<String>) -> Self {
        ReplicantClientConfig {
            address: address.into(),
            toneburst: None,
            polish: None,
        }
    }

    /// Parse the client options, envelope included.
    pub fn from_json(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(Error::config_decode(
                KIND,
                "must specify transport options when using replicant",
            ));
        }
        Self::decode(&open_envelope(raw)?)
    }

    /// Decode the base64 payload carried by the envelope.
    pub fn decode(encoded: &str) -> Result<Self> {
        let config: ReplicantClientConfig = decode_payload(encoded)?;
        parse_address(KIND, &config.address)?;
        Ok(config)
    }

    /// The base64 payload for this config.
    pub fn encode(&self) -> Result<String> {
        encode_payload(self)
    }

    /// Complete transport options, envelope included.
    pub fn to_json(&self) -> Result<String> {
        seal_envelope(self.encode()?)
    }
}

/// Server-side Replicant options; an absent config means no toneburst and
/// no polish.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplicantServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toneburst: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polish: Option<Value>,
}

impl ReplicantServerConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Self::decode(&open_envelope(raw)?)
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        decode_payload(encoded)
    }

    pub fn encode(&self) -> Result<String> {
        encode_payload(self)
    }

    pub fn to_json(&self) -> Result<String> {
        seal_envelope(self.encode()?)
    }
}

pub struct ReplicantTransport {
    config: ReplicantClientConfig,
    carrier: Carrier,
}

impl ReplicantTransport {
    pub fn new(config: ReplicantClientConfig, ctx: &DecodeContext) -> Result<Self> {
        let endpoint = parse_address(KIND, &config.address)?;
        Ok(ReplicantTransport {
            carrier: Carrier::new(KIND, Some(endpoint), ctx.upstream()),
            config,
        })
    }

    pub fn config(&self) -> &ReplicantClientConfig {
        &self.config
    }
}

#[async_trait]
impl Dialer for ReplicantTransport {
    async fn dial(&self, target: &Target) -> Result<Box<dyn Connection>> {
        self.carrier.open(target).await
    }
}

impl TransportDialer for ReplicantTransport {
    fn kind(&self) -> TransportKind {
        KIND
    }
}

pub(crate) fn decode(
    _registry: &TransportRegistry,
    ctx: &DecodeContext,
    raw: &str,
) -> Result<Arc<dyn TransportDialer>> {
    let config = ReplicantClientConfig::from_json(raw)?;
    Ok(Arc::new(ReplicantTransport::new(config, ctx)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_envelope_round_trip() {
        let mut config = ReplicantClientConfig::new("192.0.2.12:2121");
        config.polish = Some(json!({"silver": {"serverPublicKey": "abc", "chunkSize": 2000}}));

        let raw = config.to_json().unwrap();
        let decoded = ReplicantClientConfig::from_json(&raw).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn test_capitalised_envelope_key() {
        let encoded = ReplicantClientConfig::new("192.0.2.12:2121").encode().unwrap();
        let raw = json!({"Config": encoded}).to_string();
        assert!(ReplicantClientConfig::from_json(&raw).is_ok());
    }

    #[test]
    fn test_empty_client_options() {
        let err = ReplicantClientConfig::from_json("  ").unwrap_err();
        assert!(err.to_string().contains("must specify transport options"));
        assert!(matches!(err, Error::ConfigDecode { .. }));
    }

    #[test]
    fn test_envelope_and_payload_errors_differ() {
        let err = ReplicantClientConfig::from_json(r#"{"toneburst": 1}"#).unwrap_err();
        assert!(matches!(err, Error::EnvelopeDecode { ref kind, .. } if kind == "Replicant"));

        let err = ReplicantClientConfig::from_json(r#"{"config": "***"}"#).unwrap_err();
        assert!(matches!(err, Error::ConfigDecode { ref kind, .. } if kind == "Replicant"));

        let not_json = STANDARD.encode("address=1.2.3.4");
        let err = ReplicantClientConfig::from_json(&json!({"config": not_json}).to_string()).unwrap_err();
        assert!(matches!(err, Error::ConfigDecode { .. }));
    }

    #[test]
    fn test_server_default() {
        let config = ReplicantServerConfig::from_json("").unwrap();
        assert_eq!(config, ReplicantServerConfig::default());
        assert!(config.toneburst.is_none() && config.polish.is_none());
    }

    #[test]
    fn test_server_round_trip() {
        let config = ReplicantServerConfig {
            toneburst: Some(json!({"whalesong": {"addSequences": [], "removeSequences": []}})),
            polish: None,
        };
        let decoded = ReplicantServerConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(decoded, config);
    }
}
