//! Local TCP forwarder
//!
//! Accepts plain TCP clients and relays each one to a fixed target through
//! the configured transport.

use crate::common::net::configure_tcp_stream;
use crate::common::Target;
use crate::transport::TransportDialer;
use crate::Result;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

pub struct Forwarder {
    listen: SocketAddr,
    target: Target,
    transport: Arc<dyn TransportDialer>,
    running: AtomicBool,
}

impl Forwarder {
    pub fn new(listen: SocketAddr, target: Target, transport: Arc<dyn TransportDialer>) -> Self {
        Forwarder {
            listen,
            target,
            transport,
            running: AtomicBool::new(false),
        }
    }

    /// Bind the listen address and serve until stopped.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.listen).await?;
        self.serve(listener).await
    }

    /// Serve clients from an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        info!("Forwarding {} to {}", addr, self.target);

        self.running.store(true, Ordering::SeqCst);

        while self.running.load(Ordering::SeqCst) {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    configure_tcp_stream(&stream);
                    let transport = self.transport.clone();
                    let target = self.target.clone();
                    tokio::spawn(async move {
                        Self::handle_client(transport, target, stream, peer_addr).await;
                    });
                }
                Err(e) => {
                    if self.running.load(Ordering::SeqCst) {
                        error!("Forwarder accept error: {}", e);
                    }
                }
            }
        }

        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn handle_client(
        transport: Arc<dyn TransportDialer>,
        target: Target,
        mut client: TcpStream,
        peer_addr: SocketAddr,
    ) {
        let mut remote = match transport.dial(&target).await {
            Ok(remote) => remote,
            Err(e) => {
                warn!("[{}] dial {} failed: {}", peer_addr, target, e);
                return;
            }
        };

        match tokio::io::copy_bidirectional(&mut client, &mut remote).await {
            Ok((sent, received)) => {
                debug!(
                    "[{}] {} closed, {} bytes up, {} bytes down",
                    peer_addr, target, sent, received
                );
            }
            Err(e) => debug!("[{}] relay to {} ended: {}", peer_addr, target, e),
        }
    }
}
