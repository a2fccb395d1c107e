//! Error types for transport configuration and dialing

use std::io;
use thiserror::Error;

/// Crate error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid proxy spec: {0}")]
    InvalidProxySpec(String),

    #[error("Unsupported proxy scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Invalid proxy host: {0}")]
    InvalidHostPort(String),

    #[error("Unsupported transport: {0}")]
    UnsupportedTransport(String),

    #[error("{kind} options json decoding error: {reason}")]
    ConfigDecode { kind: String, reason: String },

    #[error("{kind} envelope decoding error: {reason}")]
    EnvelopeDecode { kind: String, reason: String },

    #[error("Transport {index} could not be parsed: {source}")]
    Batch {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("Transport nesting exceeds depth {depth}")]
    NestingTooDeep { depth: usize },

    #[error("Unsupported strategy: {0}")]
    UnsupportedStrategy(String),

    #[error("No candidate transports configured")]
    NoCandidates,

    #[error("{kind} dial failed: {reason}")]
    DialFailed { kind: String, reason: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn invalid_proxy_spec<S: Into<String>>(msg: S) -> Self {
        Error::InvalidProxySpec(msg.into())
    }

    pub fn invalid_host_port<S: Into<String>>(msg: S) -> Self {
        Error::InvalidHostPort(msg.into())
    }

    pub fn config_decode<K: ToString, S: Into<String>>(kind: K, reason: S) -> Self {
        Error::ConfigDecode {
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }

    pub fn envelope_decode<K: ToString, S: Into<String>>(kind: K, reason: S) -> Self {
        Error::EnvelopeDecode {
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }

    pub fn dial_failed<K: ToString, S: Into<String>>(kind: K, reason: S) -> Self {
        Error::DialFailed {
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }

    pub fn batch(index: usize, source: Error) -> Self {
        Error::Batch {
            index,
            source: Box::new(source),
        }
    }

    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Error::Protocol(msg.into())
    }

    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Error::Connection(msg.into())
    }

    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Error::Timeout(msg.into())
    }

    pub fn auth<S: Into<String>>(msg: S) -> Self {
        Error::Auth(msg.into())
    }

    /// Index of the failing element for batch decode errors, outermost first.
    pub fn batch_index(&self) -> Option<usize> {
        match self {
            Error::Batch { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// The innermost error underneath any batch wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Batch { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(e: tokio::time::error::Elapsed) -> Self {
        Error::Timeout(e.to_string())
    }
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;
