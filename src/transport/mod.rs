//! Pluggable transports
//!
//! Every transport kind decodes its own JSON options into a private, typed
//! config and yields a [`TransportDialer`]. The [`TransportRegistry`] maps
//! registry names to decoders; the `Optimizer` kind recurses through the
//! registry to build its candidate list.
//!
//! Obfuscation handshakes are provided by the protocol implementations. A
//! transport dialer here owns the config and opens the carrier stream to its
//! server through the upstream [`Dialer`].

mod carrier;
mod dust;
mod meeklite;
mod obfs2;
mod obfs4;
pub mod optimizer;
mod registry;
mod replicant;
pub mod server;
mod shadow;
mod starbridge;

pub use dust::{DustConfig, DustTransport};
pub use meeklite::{MeekServerConfig, MeekliteConfig, MeekliteTransport};
pub use obfs2::{Obfs2Config, Obfs2Transport};
pub use obfs4::{IatMode, Obfs4Config, Obfs4Transport};
pub use optimizer::{OptimizerConfig, OptimizerDialer};
pub use registry::{DecodeContext, TransportRegistry, DEFAULT_MAX_DEPTH};
pub use replicant::{ReplicantClientConfig, ReplicantServerConfig, ReplicantTransport};
pub use server::{parse_server_config, ServerConfig};
pub use shadow::{ShadowConfig, ShadowServerConfig, ShadowTransport};
pub use starbridge::{StarBridgeConfig, StarBridgeServerConfig, StarBridgeTransport};

use crate::dialer::Dialer;
use crate::{Error, Result};
use std::fmt;

/// Names advertised to configuration tooling, in advertised order.
///
/// StarBridge decodes like any other kind but is not advertised yet.
const ADVERTISED: [&str; 7] = [
    "obfs2", "shadow", "Dust", "meeklite", "Replicant", "obfs4", "Optimizer",
];

/// Supported transport kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Obfs2,
    Obfs4,
    Shadow,
    Dust,
    Meeklite,
    Replicant,
    StarBridge,
    Optimizer,
}

impl TransportKind {
    pub const ALL: [TransportKind; 8] = [
        TransportKind::Obfs2,
        TransportKind::Obfs4,
        TransportKind::Shadow,
        TransportKind::Dust,
        TransportKind::Meeklite,
        TransportKind::Replicant,
        TransportKind::StarBridge,
        TransportKind::Optimizer,
    ];

    /// Exact registry name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Obfs2 => "obfs2",
            TransportKind::Obfs4 => "obfs4",
            TransportKind::Shadow => "shadow",
            TransportKind::Dust => "Dust",
            TransportKind::Meeklite => "meeklite",
            TransportKind::Replicant => "Replicant",
            TransportKind::StarBridge => "StarBridge",
            TransportKind::Optimizer => "Optimizer",
        }
    }

    /// Case-sensitive lookup by registry name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == name)
    }

    pub fn is_advertised(&self) -> bool {
        ADVERTISED.contains(&self.as_str())
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TransportKind {
    type Error = Error;

    fn try_from(name: &str) -> Result<Self> {
        Self::from_name(name).ok_or_else(|| Error::UnsupportedTransport(name.to_string()))
    }
}

/// Registered transport names as exposed to configuration tooling.
pub fn advertised_transports() -> Vec<&'static str> {
    ADVERTISED.to_vec()
}

/// A configured transport that can dial through its protocol
pub trait TransportDialer: Dialer {
    fn kind(&self) -> TransportKind;
}

impl fmt::Debug for dyn TransportDialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransportDialer({})", self.kind())
    }
}
