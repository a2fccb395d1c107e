//! Name-keyed transport decoders
//!
//! The registry is an explicit `name -> decoder` table built once at
//! startup. Adding a kind means adding a row here.

use super::{dust, meeklite, obfs2, obfs4, optimizer, replicant, shadow, starbridge};
use super::{TransportDialer, TransportKind};
use crate::dialer::{Dialer, Direct};
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Default bound on Optimizer-inside-Optimizer nesting
pub const DEFAULT_MAX_DEPTH: usize = 4;

pub(crate) type DecodeFn =
    fn(&TransportRegistry, &DecodeContext, &str) -> Result<Arc<dyn TransportDialer>>;

/// Inputs shared by every decoder besides the options themselves
#[derive(Clone)]
pub struct DecodeContext {
    upstream: Option<Arc<dyn Dialer>>,
    address: Option<String>,
    depth: usize,
}

impl DecodeContext {
    pub fn new(upstream: Option<Arc<dyn Dialer>>, address: Option<&str>) -> Self {
        DecodeContext {
            upstream,
            address: address.map(str::to_string),
            depth: 0,
        }
    }

    /// Externally supplied address, if any
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Number of enclosing Optimizer transports
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Upstream dialer to chain through; direct when none was given.
    pub(crate) fn upstream(&self) -> Arc<dyn Dialer> {
        self.upstream
            .clone()
            .unwrap_or_else(|| Arc::new(Direct::new()))
    }

    /// Context for a transport nested one level deeper.
    pub(crate) fn child(&self, address: Option<String>) -> Self {
        DecodeContext {
            upstream: self.upstream.clone(),
            address,
            depth: self.depth + 1,
        }
    }
}

impl fmt::Debug for DecodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeContext")
            .field("upstream", &self.upstream.is_some())
            .field("address", &self.address)
            .field("depth", &self.depth)
            .finish()
    }
}

/// One element of an Optimizer `transports` array
#[derive(Debug, Deserialize)]
struct TransportDescriptor {
    name: String,
    #[serde(default)]
    address: Option<String>,
    config: Map<String, Value>,
}

/// Registry of transport decoders
pub struct TransportRegistry {
    decoders: HashMap<&'static str, DecodeFn>,
    max_depth: usize,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        let mut decoders: HashMap<&'static str, DecodeFn> = HashMap::new();
        decoders.insert(TransportKind::Obfs2.as_str(), obfs2::decode);
        decoders.insert(TransportKind::Obfs4.as_str(), obfs4::decode);
        decoders.insert(TransportKind::Shadow.as_str(), shadow::decode);
        decoders.insert(TransportKind::Dust.as_str(), dust::decode);
        decoders.insert(TransportKind::Meeklite.as_str(), meeklite::decode);
        decoders.insert(TransportKind::Replicant.as_str(), replicant::decode);
        decoders.insert(TransportKind::StarBridge.as_str(), starbridge::decode);
        decoders.insert(TransportKind::Optimizer.as_str(), optimizer::decode);

        TransportRegistry {
            decoders,
            max_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn is_supported(&self, name: &str) -> bool {
        self.decoders.contains_key(name)
    }

    /// Every decodable name, in declaration order.
    pub fn supported(&self) -> Vec<&'static str> {
        TransportKind::ALL
            .iter()
            .map(|k| k.as_str())
            .filter(|name| self.decoders.contains_key(name))
            .collect()
    }

    /// Decode `raw` options for the transport called `name`.
    pub fn decode(
        &self,
        name: &str,
        raw: &str,
        upstream: Option<Arc<dyn Dialer>>,
        address: Option<&str>,
    ) -> Result<Arc<dyn TransportDialer>> {
        self.decode_with(name, raw, &DecodeContext::new(upstream, address))
    }

    pub fn decode_with(
        &self,
        name: &str,
        raw: &str,
        ctx: &DecodeContext,
    ) -> Result<Arc<dyn TransportDialer>> {
        let decoder = self
            .decoders
            .get(name)
            .ok_or_else(|| Error::UnsupportedTransport(name.to_string()))?;
        debug!("[registry] decoding {} at depth {}", name, ctx.depth());
        decoder(self, ctx, raw)
    }

    /// Decode an array of `{name, address?, config}` descriptors one level
    /// below `ctx`. The first failure aborts the batch and carries its index.
    pub fn decode_descriptors(
        &self,
        descriptors: &[Value],
        ctx: &DecodeContext,
    ) -> Result<Vec<Arc<dyn TransportDialer>>> {
        descriptors
            .iter()
            .enumerate()
            .map(|(index, value)| {
                self.decode_descriptor(value, ctx)
                    .map_err(|e| Error::batch(index, e))
            })
            .collect()
    }

    fn decode_descriptor(
        &self,
        value: &Value,
        ctx: &DecodeContext,
    ) -> Result<Arc<dyn TransportDialer>> {
        if !value.is_object() {
            return Err(Error::config_decode(
                TransportKind::Optimizer,
                "unsupported type for transport",
            ));
        }
        let descriptor = TransportDescriptor::deserialize(value).map_err(|e| {
            Error::config_decode(
                TransportKind::Optimizer,
                format!("malformed transport descriptor: {}", e),
            )
        })?;

        let config = Value::Object(descriptor.config).to_string();
        self.decode_with(&descriptor.name, &config, &ctx.child(descriptor.address))
    }
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("transports", &self.supported())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}
