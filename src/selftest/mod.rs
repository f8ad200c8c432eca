//! Startup self-tests, run only when requested on the command line.
//!
//! # Data Flow
//! ```text
//! --test-random → rng.rs  (histogram + chi-squared per range width)
//! --test-hash   → hash.rs (wall-clock time for N password hashes)
//!     → report printed to stderr, summary logged
//! ```
//!
//! # Design Decisions
//! - Pure functions of the injected capability; no process-wide state
//! - Never on the hot path; failures are reported and startup continues

pub mod hash;
pub mod rng;

pub use hash::{HashBenchPlan, HashBenchReport};
pub use rng::{RngReport, RngTestError, RngTestPlan, WidthResult};
