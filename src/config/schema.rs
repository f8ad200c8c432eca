//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML settings
//! file. Every section and field has a default.

use serde::{Deserialize, Serialize};

/// Root settings for the server process.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Core server settings (log file, listener).
    pub server: ServerConfig,

    /// Diagnostic output settings.
    pub logging: LoggingConfig,

    /// Startup self-test parameters.
    pub selftest: SelfTestConfig,

    /// Password hashing parameters.
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Path of the log file owned by the logging worker.
    pub logfile: String,

    /// Bind address (e.g., "0.0.0.0:4747").
    pub bind_address: String,

    /// Maximum concurrent client connections (backpressure).
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            logfile: "server.log".to_string(),
            bind_address: "0.0.0.0:4747".to_string(),
            max_connections: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, used when `RUST_LOG` is not set.
    pub filter: String,

    /// Upper bound on how long the crash path waits for the logger to drain.
    pub crash_wait_ms: u64,

    /// How often the logger thread checks for a pending crash.
    pub poll_interval_ms: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "servatrice=info".to_string(),
            crash_wait_ms: 2_000,
            poll_interval_ms: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SelfTestConfig {
    /// Samples drawn per histogram bin (`n` in `n * width`).
    pub rng_samples_per_bin: usize,

    /// Lowest value drawn by the RNG harness.
    pub rng_min: i32,

    /// Smallest range width tested.
    pub rng_min_width: i32,

    /// Largest range width tested.
    pub rng_max_width: i32,

    /// Number of hashes computed by the benchmark.
    pub hash_iterations: u32,
}

impl Default for SelfTestConfig {
    fn default() -> Self {
        Self {
            rng_samples_per_bin: 500_000,
            rng_min: 1,
            rng_min_width: 2,
            rng_max_width: 10,
            hash_iterations: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SecurityConfig {
    /// SHA-512 rounds applied by the password hasher.
    pub password_hash_rounds: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            password_hash_rounds: 1_000,
        }
    }
}
