//! Common utilities and types

pub mod error;
pub mod net;
pub mod status;

pub use error::{Error, Result};
pub use net::{Host, Target};
pub use status::StatusChannel;
