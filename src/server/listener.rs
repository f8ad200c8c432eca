//! TCP listener with backpressure.
//!
//! # Responsibilities
//! - Accept incoming TCP connections
//! - Enforce max_connections via semaphore

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::server::ServerError;

/// A TCP listener that limits concurrent connections.
///
/// When the limit is reached, `accept` waits until a slot is released.
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
}

impl Listener {
    /// Wrap an already-bound, non-blocking std listener.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_std(listener: std::net::TcpListener, max_connections: usize) -> Result<Self, ServerError> {
        let address = listener
            .local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_default();
        let inner = TcpListener::from_std(listener).map_err(|source| ServerError::Bind { address, source })?;

        Ok(Self {
            inner,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        })
    }

    /// Accept a connection once a slot is free.
    ///
    /// The returned permit must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ServerError> {
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ServerError::LimiterClosed)?;

        let (stream, addr) = self.inner.accept().await.map_err(ServerError::Accept)?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A connection slot; released when dropped.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
