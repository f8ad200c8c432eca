//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured fields)
//!     → EnvFilter (reloadable once settings are known)
//!     → redirect.rs DiagnosticLayer (single dispatch function)
//!         → worker.rs LoggerHandle (mpsc, never blocks)
//!             → logger thread → sink.rs (file / stderr / memory)
//!         → console mirror (Phase 1 with --log-to-console only)
//! ```
//!
//! # Design Decisions
//! - Only the logger thread touches the sink
//! - Until the logger is up, and after it is gone, events go to the console
//! - `RUST_LOG` overrides the configured filter

pub mod message;
pub mod redirect;
pub mod sink;
pub mod worker;

use std::sync::Arc;

use tracing::dispatcher::{self, DefaultGuard, Dispatch};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

pub use message::LogMessage;
pub use redirect::{DiagnosticLayer, DiagnosticRedirect, DiagnosticSinkMode};
pub use sink::{ConsoleSink, FileSink, LogSink, MemorySink};
pub use worker::{LogError, LoggerHandle, LoggingWorker};

/// Filter directives used before settings are loaded.
pub const DEFAULT_FILTER: &str = "servatrice=info";

/// Installed diagnostics pipeline.
///
/// When a global subscriber already exists (tests, embedding), the pipeline
/// is installed for the current thread instead and removed on drop.
pub struct Diagnostics {
    filter: reload::Handle<EnvFilter, Registry>,
    env_override: bool,
    scoped: Option<DefaultGuard>,
}

impl Diagnostics {
    /// Install the subscriber feeding `redirect`.
    pub fn install(redirect: Arc<DiagnosticRedirect>) -> Self {
        let env_filter = EnvFilter::try_from_default_env().ok();
        let env_override = env_filter.is_some();
        let (filter, handle) = reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER)));

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(DiagnosticLayer::new(redirect));
        let dispatch = Dispatch::new(subscriber);

        let scoped = match dispatcher::set_global_default(dispatch.clone()) {
            Ok(()) => None,
            Err(_) => Some(dispatcher::set_default(&dispatch)),
        };

        Self {
            filter: handle,
            env_override,
            scoped,
        }
    }

    /// Apply the configured filter unless `RUST_LOG` is set.
    pub fn apply_filter(&self, directives: &str) {
        if self.env_override {
            return;
        }
        match EnvFilter::try_new(directives) {
            Ok(filter) => {
                if let Err(e) = self.filter.reload(filter) {
                    tracing::warn!(error = %e, "Failed to apply log filter");
                }
            }
            Err(e) => tracing::warn!(filter = directives, error = %e, "Invalid log filter, keeping default"),
        }
    }

    pub fn is_global(&self) -> bool {
        self.scoped.is_none()
    }
}
