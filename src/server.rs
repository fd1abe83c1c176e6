//! Test bench server: accepts control connections and hands each one to
//! its own session task.

use std::future::Future;
use std::net::SocketAddr;

use tokio::sync::mpsc;

use crate::UdptestError;
use crate::config::ServerConfig;
use crate::session::{Connection, ConnectionId, ConnectionRegistry};
use crate::transport::{Listener, resolve_ipv4};

pub struct Server {
    listener: Listener,
    registry: ConnectionRegistry,
    finished: mpsc::UnboundedReceiver<ConnectionId>,
}

impl Server {
    /// Resolves the configured address and starts listening.
    ///
    /// Fails before serving anything if resolution, bind or listen fails.
    pub async fn bind(config: &ServerConfig) -> Result<Self, UdptestError> {
        let addr = resolve_ipv4(&config.address, config.port).await?;
        let listener = Listener::bind(addr)?;
        let (registry, finished) = ConnectionRegistry::new();

        tracing::info!(addr = %listener.local_addr(), "Started server");
        Ok(Self {
            listener,
            registry,
            finished,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Serves until `shutdown` completes, then stops every connection.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        tracing::info!("Running server");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::debug!("shutdown requested, closing");
                    break;
                }

                res = self.listener.accept() => match res {
                    Ok((stream, peer)) => match Connection::new(stream) {
                        Ok(conn) => {
                            let id = self.registry.start(conn);
                            tracing::info!(peer = %peer, id = %id, "Accepted connection");
                        }
                        Err(e) => tracing::error!(peer = %peer, "Error setting up connection: {}", e),
                    },
                    Err(e) => tracing::error!("Error accepting connection: {}", e),
                },

                Some(id) = self.finished.recv() => {
                    self.registry.stop(id);
                }
            }
        }

        drop(self.listener);
        self.registry.stop_all().await;
        tracing::info!("Server stopped");
    }
}
