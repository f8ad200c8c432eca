//! Process-wide diagnostic redirection.
//!
//! # Phases
//! ```text
//! Fallback:  no logger yet        → console only
//! Phase 1:   logger attached      → logger, plus console if --log-to-console
//! Phase 2:   server initialized   → logger only (sealed, never reverts)
//! Teardown:  logger detached      → console only
//! ```
//!
//! # Design Decisions
//! - One dispatch function reads the mode once per message, so a message is
//!   delivered under exactly one mode even while the mode changes
//! - The logger handle lives in an `ArcSwapOption`; dispatch never locks it

use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::observability::worker::LoggerHandle;

/// Where diagnostics go besides the logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DiagnosticSinkMode {
    LoggerOnly = 0,
    LoggerAndConsole = 1,
}

impl DiagnosticSinkMode {
    pub fn from_console_flag(log_to_console: bool) -> Self {
        if log_to_console {
            DiagnosticSinkMode::LoggerAndConsole
        } else {
            DiagnosticSinkMode::LoggerOnly
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => DiagnosticSinkMode::LoggerAndConsole,
            _ => DiagnosticSinkMode::LoggerOnly,
        }
    }
}

/// Routes every diagnostic message according to the active [`DiagnosticSinkMode`].
pub struct DiagnosticRedirect {
    mode: AtomicU8,
    sealed: AtomicBool,
    logger: ArcSwapOption<LoggerHandle>,
    console: Mutex<Box<dyn Write + Send>>,
}

impl DiagnosticRedirect {
    /// Redirect that mirrors to standard error.
    pub fn new() -> Self {
        Self::with_console(io::stderr())
    }

    /// Redirect that mirrors to `console`.
    pub fn with_console<W: Write + Send + 'static>(console: W) -> Self {
        Self {
            mode: AtomicU8::new(DiagnosticSinkMode::LoggerOnly as u8),
            sealed: AtomicBool::new(false),
            logger: ArcSwapOption::empty(),
            console: Mutex::new(Box::new(console)),
        }
    }

    /// Phase 1: route to the logger, mirroring to the console if requested.
    pub fn install_phase_one(&self, logger: LoggerHandle, log_to_console: bool) {
        self.set_mode(DiagnosticSinkMode::from_console_flag(log_to_console));
        self.logger.store(Some(Arc::new(logger)));
    }

    /// Phase 2: logger only, for the rest of the process lifetime.
    pub fn enter_serving_phase(&self) {
        self.mode.store(DiagnosticSinkMode::LoggerOnly as u8, Ordering::SeqCst);
        self.sealed.store(true, Ordering::SeqCst);
    }

    /// Stop routing to the logger; later messages go to the console.
    pub fn detach_logger(&self) {
        self.logger.store(None);
    }

    pub fn mode(&self) -> DiagnosticSinkMode {
        DiagnosticSinkMode::from_u8(self.mode.load(Ordering::SeqCst))
    }

    pub fn is_serving(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    fn set_mode(&self, mode: DiagnosticSinkMode) {
        if !self.is_serving() {
            self.mode.store(mode as u8, Ordering::SeqCst);
        }
    }

    /// Deliver one message.
    pub fn dispatch(&self, text: &str) {
        let mode = self.mode();
        let delivered = self
            .logger
            .load()
            .as_deref()
            .is_some_and(|logger| logger.log(text).is_ok());

        if !delivered || mode == DiagnosticSinkMode::LoggerAndConsole {
            let mut console = self.console.lock();
            let _ = writeln!(console, "{text}");
            let _ = console.flush();
        }
    }
}

impl Default for DiagnosticRedirect {
    fn default() -> Self {
        Self::new()
    }
}

/// `tracing` layer feeding every event into a [`DiagnosticRedirect`].
pub struct DiagnosticLayer {
    redirect: Arc<DiagnosticRedirect>,
}

impl DiagnosticLayer {
    pub fn new(redirect: Arc<DiagnosticRedirect>) -> Self {
        Self { redirect }
    }
}

impl<S: Subscriber> Layer<S> for DiagnosticLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let text = format!("{:>5} {}: {}", metadata.level(), metadata.target(), visitor.finish());
        self.redirect.dispatch(&text);
    }
}

/// Collects the `message` field followed by `key=value` pairs.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
