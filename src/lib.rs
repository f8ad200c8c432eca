//! Servatrice server bootstrap.
//!
//! Brings the process from command line to event loop and back down:
//! a dedicated logging thread, crash-safe fatal signal handling, phased
//! diagnostic redirection, optional RNG and password-hash self-tests, and
//! an ordered teardown.

// Process lifecycle
pub mod cli;
pub mod config;
pub mod lifecycle;

// Diagnostics
pub mod observability;

// Capabilities used by the server
pub mod auth;
pub mod random;
pub mod selftest;
pub mod server;

pub use cli::Args;
pub use config::Settings;
pub use lifecycle::{Bootstrap, ProcessState, Shutdown};
pub use server::{Server, StandbyServer};

/// Version reported in the startup banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
