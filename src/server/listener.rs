//! Event hub TCP listener
//!
//! Handles TCP accept loop and spawns a session per connection.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::server::config::HubConfig;
use crate::server::hub::EventHub;

/// Event hub server
pub struct EventServer {
    config: HubConfig,
    hub: Arc<EventHub>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl EventServer {
    /// Create a new server with its own hub
    pub fn new(config: HubConfig) -> Self {
        let hub = Arc::new(EventHub::new(config.clone()));
        Self::with_hub(config, hub)
    }

    /// Create a server around an existing hub
    ///
    /// Queue settings come from the hub; `config` supplies the listener side.
    pub fn with_hub(config: HubConfig, hub: Arc<EventHub>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            hub,
            connection_semaphore,
        }
    }

    /// Get the hub, to hand to producers
    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    /// Run the server
    ///
    /// This method runs until the listener fails to bind.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Event hub listening");

        self.accept_loop(&listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Event hub listening");

        self.serve_until(listener, shutdown).await
    }

    /// Serve an already-bound listener until `shutdown` resolves
    ///
    /// On shutdown every connection is closed and all subscriptions dropped.
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        self.hub.shutdown().await;

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit; the permit lives as long as the session
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let hub = Arc::clone(&self.hub);

        tokio::spawn(async move {
            let _permit = permit;
            let reason = hub.serve_connection(socket, Some(peer_addr)).await;
            tracing::debug!(peer = %peer_addr, reason = %reason, "Session ended");
        });
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
