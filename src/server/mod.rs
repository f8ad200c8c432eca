//! Server object driven by the bootstrap.
//!
//! # Data Flow
//! ```text
//! bootstrap
//!     → Server::initialize()        (bind, load state; failure skips the event loop)
//!     → Server::run(shutdown) .await (event loop; completion is the termination notice)
//!     → exit status
//! ```
//!
//! The game protocol lives elsewhere; [`StandbyServer`] accepts connections
//! under a connection limit and keeps them open until the peer leaves.

pub mod listener;
pub mod standby;

use std::future::Future;

use thiserror::Error;
use tokio::sync::broadcast;

pub use listener::{ConnectionPermit, Listener};
pub use standby::StandbyServer;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),

    #[error("connection limiter closed")]
    LimiterClosed,

    #[error("server was not initialized")]
    NotInitialized,

    #[error("{0}")]
    Other(String),
}

/// The long-running server the bootstrap initializes and runs.
pub trait Server {
    /// Prepare to serve. An error skips the event loop entirely.
    fn initialize(&mut self) -> Result<(), ServerError>;

    /// Serve until `shutdown` fires or the server decides to stop.
    /// Resolves to the process exit status.
    fn run(self, shutdown: broadcast::Receiver<()>) -> impl Future<Output = i32>;
}
