//! Direct dialer (no proxy)

use super::{Connection, Dialer};
use crate::common::net::connect_tcp;
use crate::common::Target;
use crate::Result;
use async_trait::async_trait;
use tracing::debug;

/// Plain TCP connect to the target
#[derive(Debug, Default, Clone, Copy)]
pub struct Direct;

impl Direct {
    pub fn new() -> Self {
        Direct
    }
}

#[async_trait]
impl Dialer for Direct {
    async fn dial(&self, target: &Target) -> Result<Box<dyn Connection>> {
        let addr = target.authority();
        debug!("[direct] connecting to {}", addr);
        let stream = connect_tcp(&addr).await?;
        debug!("[direct] connected to {}", addr);
        Ok(Box::new(stream))
    }
}
