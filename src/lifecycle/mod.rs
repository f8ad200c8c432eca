//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Args → Settings → logger → redirect → signals → ProcessState → server
//!
//! Event loop:
//!     SIGTERM/SIGINT → Shutdown (shutdown.rs) → server.run() returns
//!     SIGHUP → logger reopens its sink
//!
//! Crash (signals.rs, crash.rs):
//!     SIGSEGV/SIGABRT → raw backtrace to stderr → CrashBridge → logger drains → re-raise
//!
//! Teardown (state.rs):
//!     rng, settings → logger shutdown → logger released → exit hooks
//! ```
//!
//! # Design Decisions
//! - One `ProcessState` owned by the bootstrap, no process-wide singletons
//! - The fatal handler state is the only static, and it is signal-safe

pub mod crash;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use crash::{CrashBridge, CrashReport, SignalKind};
pub use shutdown::{Shutdown, ShutdownHooks};
pub use signals::{FatalSignalInterceptor, Interception, ShotState, SignalDispatch, SignalError};
pub use startup::{Bootstrap, EXIT_FAILURE, EXIT_SUCCESS};
pub use state::{check_teardown_order, ProcessState, TeardownError, TeardownLedger, TeardownStep};
