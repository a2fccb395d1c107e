//! Shared plumbing for leaf transports: option decoding and carrier dialing

use super::TransportKind;
use crate::common::Target;
use crate::dialer::{Connection, Dialer, Direct};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

/// Decode a kind's JSON options, qualifying any failure with the kind.
pub(crate) fn decode_json<T: DeserializeOwned>(kind: TransportKind, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| Error::config_decode(kind, e.to_string()))
}

/// Parse a `host:port` server address from a kind's options.
pub(crate) fn parse_address(kind: TransportKind, address: &str) -> Result<Target> {
    address
        .parse::<Target>()
        .map_err(|e| Error::config_decode(kind, format!("invalid address: {}", e)))
}

/// Carrier connection to a transport server.
///
/// When no endpoint is configured the dial target itself is the endpoint.
pub(crate) struct Carrier {
    kind: TransportKind,
    endpoint: Option<Target>,
    upstream: Arc<dyn Dialer>,
}

impl Carrier {
    pub(crate) fn new(
        kind: TransportKind,
        endpoint: Option<Target>,
        upstream: Arc<dyn Dialer>,
    ) -> Self {
        Carrier {
            kind,
            endpoint,
            upstream,
        }
    }

    /// Carrier that ignores any upstream dialer and connects directly.
    pub(crate) fn direct(kind: TransportKind, endpoint: Option<Target>) -> Self {
        Self::new(kind, endpoint, Arc::new(Direct::new()))
    }

    pub(crate) fn endpoint(&self) -> Option<&Target> {
        self.endpoint.as_ref()
    }

    pub(crate) async fn open(&self, target: &Target) -> Result<Box<dyn Connection>> {
        let endpoint = self.endpoint.as_ref().unwrap_or(target);
        debug!("[{}] dialing {} for {}", self.kind, endpoint, target);
        self.upstream
            .dial(endpoint)
            .await
            .map_err(|e| Error::dial_failed(self.kind, e.to_string()))
    }
}
