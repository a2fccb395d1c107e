//! Shapeshifter Rust - pluggable transport selection and configuration
//!
//! Given a transport name and its JSON options this crate produces a ready
//! dialer. The composite `Optimizer` transport wraps several dialers and
//! picks one per connection with a replaceable strategy.
//!
//! # Architecture
//!
//! ```text
//!   name + JSON options
//!           |
//!   +-------v---------+        +-------------+
//!   |   transport/    |------->|  strategy/  |
//!   |   (registry)    |        | (Optimizer) |
//!   +-------+---------+        +-------------+
//!           |
//!   +-------v---------+        +-------------+
//!   |    dialer/      |<-------|   config/   |
//!   | (upstream proxy)|        | (proxy URI) |
//!   +-----------------+        +-------------+
//! ```

pub mod common;
pub mod config;
pub mod dialer;
pub mod forward;
pub mod strategy;
pub mod transport;

pub use common::error::{Error, Result};
pub use config::Config;
pub use forward::Forwarder;
pub use transport::{advertised_transports, TransportDialer, TransportKind, TransportRegistry};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
