//! Configuration module

pub mod proxy_uri;

pub use proxy_uri::{validate, validate_with, ProxyScheme, ProxyUri};

use crate::common::Target;
use crate::transport::DEFAULT_MAX_DEPTH;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level
    #[serde(rename = "log-level")]
    pub log_level: String,

    /// Upstream proxy URI (`http://`, `socks4a://`, `socks5://`)
    pub proxy: Option<String>,

    /// How many Optimizer transports may nest inside each other
    #[serde(rename = "max-nesting-depth")]
    pub max_nesting_depth: usize,

    /// Local address for the TCP forwarder
    pub listen: Option<String>,

    /// Destination handed to the transport for forwarded streams
    pub target: Option<String>,

    /// Transport to build
    pub transport: Option<TransportSection>,
}

/// Transport selection from the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSection {
    /// Registry name, e.g. `obfs4` or `Optimizer`
    pub name: String,

    /// Externally supplied address for transports that take one
    #[serde(default)]
    pub address: Option<String>,

    /// Transport options: a mapping, or a JSON document as a string
    #[serde(default)]
    pub options: serde_json::Value,
}

impl TransportSection {
    /// Options re-serialised as the JSON text the transport decoders expect.
    pub fn options_json(&self) -> String {
        match &self.options {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file (synchronous)
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from file (async)
    pub async fn load_async<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        Self::from_str(&content)
    }

    /// Load from string
    ///
    /// Only parses. Callers apply their overrides and then call
    /// [`Config::validate`].
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_nesting_depth == 0 {
            return Err(Error::config("max-nesting-depth must be at least 1"));
        }

        if let Some(transport) = &self.transport {
            if transport.name.is_empty() {
                return Err(Error::config("transport name must not be empty"));
            }
        }

        if let Some(target) = &self.target {
            target.parse::<Target>()?;
        }

        if let Some(listen) = &self.listen {
            listen
                .parse::<std::net::SocketAddr>()
                .map_err(|e| Error::config(format!("invalid listen address {}: {}", listen, e)))?;
            if self.target.is_none() {
                return Err(Error::config("listen requires a target"));
            }
            if self.transport.is_none() {
                return Err(Error::config("listen requires a transport"));
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: "info".to_string(),
            proxy: None,
            max_nesting_depth: DEFAULT_MAX_DEPTH,
            listen: None,
            target: None,
            transport: None,
        }
    }
}
