//! Server-side transport options
//!
//! Only the kinds that take server options are parsed here.

use super::{
    MeekServerConfig, ReplicantServerConfig, ShadowServerConfig, StarBridgeServerConfig,
    TransportKind,
};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum ServerConfig {
    Shadow(ShadowServerConfig),
    Meeklite(MeekServerConfig),
    Replicant(ReplicantServerConfig),
    StarBridge(StarBridgeServerConfig),
}

impl ServerConfig {
    pub fn kind(&self) -> TransportKind {
        match self {
            ServerConfig::Shadow(_) => TransportKind::Shadow,
            ServerConfig::Meeklite(_) => TransportKind::Meeklite,
            ServerConfig::Replicant(_) => TransportKind::Replicant,
            ServerConfig::StarBridge(_) => TransportKind::StarBridge,
        }
    }
}

/// Parse the server options for the transport called `name`.
pub fn parse_server_config(name: &str, raw: &str) -> Result<ServerConfig> {
    match TransportKind::try_from(name)? {
        TransportKind::Shadow => ShadowServerConfig::from_json(raw).map(ServerConfig::Shadow),
        TransportKind::Meeklite => MeekServerConfig::from_json(raw).map(ServerConfig::Meeklite),
        TransportKind::Replicant => {
            ReplicantServerConfig::from_json(raw).map(ServerConfig::Replicant)
        }
        TransportKind::StarBridge => {
            StarBridgeServerConfig::from_json(raw).map(ServerConfig::StarBridge)
        }
        _ => Err(Error::UnsupportedTransport(name.to_string())),
    }
}
