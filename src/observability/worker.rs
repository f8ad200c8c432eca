//! Dedicated logging worker.
//!
//! # Responsibilities
//! - Own the log sink on a dedicated `logger` thread
//! - Serialize every diagnostic write in enqueue order
//! - Reopen the sink on request without dropping queued lines
//! - Drain and stop on shutdown, or on a crash flagged through [`CrashBridge`]
//! - Reopen the sink when SIGHUP raises the reopen flag on the bridge
//!
//! # Lifecycle
//! ```text
//! start() ──spawn──▶ logger thread opens sink ──ack──▶ start() returns
//!                         │
//!   log()/reopen() ──mpsc─┤  (fire-and-forget)
//!                         │
//! request_shutdown() ─────┤  queued behind earlier lines
//!                         ▼
//!                 drain, flush, exit ──▶ wait() joins
//! ```
//!
//! # Design Decisions
//! - The startup handoff is the only blocking exchange with the caller
//! - Shutdown is a queued command, so everything enqueued before it is written
//! - Bridge flags are polled; signal handlers never touch the queue

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Local;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::lifecycle::crash::CrashBridge;
use crate::observability::message::LogMessage;
use crate::observability::sink::{ConsoleSink, FileSink, LogSink};

/// Errors reported by the logging worker.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to open log sink: {0}")]
    SinkOpen(#[source] io::Error),

    #[error("failed to spawn logger thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("logger thread is not running")]
    WorkerGone,

    #[error("logger thread panicked")]
    WorkerPanicked,
}

#[derive(Debug)]
enum Command {
    Log(LogMessage),
    Reopen,
    Shutdown,
}

/// Cheap, cloneable sending side of the logger queue.
#[derive(Debug, Clone)]
pub struct LoggerHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl LoggerHandle {
    /// Queue a message. Never blocks.
    pub fn log(&self, message: impl Into<LogMessage>) -> Result<(), LogError> {
        self.send(Command::Log(message.into()))
    }

    /// Ask the logger to reopen its sink (e.g. after log rotation).
    pub fn reopen(&self) -> Result<(), LogError> {
        self.send(Command::Reopen)
    }

    /// Whether the logger thread has stopped accepting messages.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, command: Command) -> Result<(), LogError> {
        self.tx.send(command).map_err(|_| LogError::WorkerGone)
    }
}

/// Owner of the logger thread.
pub struct LoggingWorker {
    handle: LoggerHandle,
    thread: Option<JoinHandle<()>>,
    sink_name: String,
    shutdown_requested: bool,
}

impl LoggingWorker {
    /// Spawn the logger thread and block until the sink is open.
    ///
    /// `open` runs on the logger thread. If it fails the thread exits and the
    /// error is returned here.
    ///
    /// Must not be called from inside a Tokio runtime.
    pub fn start<S, F>(open: F, bridge: Arc<CrashBridge>, poll_interval: Duration) -> Result<Self, LogError>
    where
        S: LogSink,
        F: FnOnce() -> io::Result<S> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let (ack_tx, ack_rx) = oneshot::channel::<io::Result<String>>();

        let thread = thread::Builder::new()
            .name("logger".to_string())
            .spawn(move || {
                let sink = match open() {
                    Ok(sink) => sink,
                    Err(e) => {
                        let _ = ack_tx.send(Err(e));
                        return;
                    }
                };
                bridge.worker_started();
                let _ = ack_tx.send(Ok(sink.describe()));
                run(sink, rx, &bridge, poll_interval);
                bridge.worker_stopped();
            })
            .map_err(LogError::Spawn)?;

        let sink_name = match ack_rx.blocking_recv() {
            Ok(Ok(name)) => name,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(LogError::SinkOpen(e));
            }
            Err(_) => {
                return Err(match thread.join() {
                    Ok(()) => LogError::WorkerGone,
                    Err(_) => LogError::WorkerPanicked,
                });
            }
        };

        Ok(Self {
            handle: LoggerHandle { tx },
            thread: Some(thread),
            sink_name,
            shutdown_requested: false,
        })
    }

    /// Start a worker writing to `path`.
    pub fn start_file(
        path: impl Into<std::path::PathBuf>,
        bridge: Arc<CrashBridge>,
        poll_interval: Duration,
    ) -> Result<Self, LogError> {
        let path = path.into();
        Self::start(move || FileSink::open(path), bridge, poll_interval)
    }

    /// Start a worker writing to standard error. Used as the degraded mode.
    pub fn start_console(bridge: Arc<CrashBridge>, poll_interval: Duration) -> Result<Self, LogError> {
        Self::start(|| Ok(ConsoleSink), bridge, poll_interval)
    }

    pub fn handle(&self) -> LoggerHandle {
        self.handle.clone()
    }

    pub fn sink_name(&self) -> &str {
        &self.sink_name
    }

    /// Whether lines end up on standard error (degraded mode).
    pub fn writes_to_console(&self) -> bool {
        self.sink_name == ConsoleSink::NAME
    }

    pub fn log(&self, message: impl Into<LogMessage>) -> Result<(), LogError> {
        self.handle.log(message)
    }

    pub fn reopen(&self) -> Result<(), LogError> {
        self.handle.reopen()
    }

    /// Queue a shutdown behind every message already enqueued.
    pub fn request_shutdown(&mut self) {
        if !self.shutdown_requested {
            self.shutdown_requested = true;
            // An error means the thread is already gone, which is what we want.
            let _ = self.handle.send(Command::Shutdown);
        }
    }

    /// Block until the logger thread has terminated.
    pub fn wait(&mut self) -> Result<(), LogError> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| LogError::WorkerPanicked),
            None => Ok(()),
        }
    }

    /// Whether the logger thread has been joined.
    pub fn is_terminated(&self) -> bool {
        self.thread.is_none()
    }

    /// Drain, stop and join the logger thread.
    pub fn shutdown(mut self) -> Result<(), LogError> {
        self.request_shutdown();
        self.wait()
    }
}

impl Drop for LoggingWorker {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.request_shutdown();
            let _ = self.wait();
        }
    }
}

fn run<S: LogSink>(mut sink: S, mut rx: mpsc::UnboundedReceiver<Command>, bridge: &CrashBridge, poll_interval: Duration) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            report_sink_error(&sink, "start logger runtime", &e);
            drain_blocking(&mut sink, &mut rx);
            return;
        }
    };

    runtime.block_on(async {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            tokio::select! {
                biased;
                _ = ticker.tick() => {
                    if let Some(kind) = bridge.pending() {
                        drain_queued(&mut sink, &mut rx);
                        write(&mut sink, kind.tag());
                        return;
                    }
                    if bridge.take_reopen() {
                        reopen(&mut sink);
                    }
                }
                command = rx.recv() => match command {
                    Some(Command::Log(message)) => write(&mut sink, message.text()),
                    Some(Command::Reopen) => reopen(&mut sink),
                    Some(Command::Shutdown) | None => {
                        if bridge.take_reopen() {
                            reopen(&mut sink);
                        }
                        return;
                    }
                },
            }
        }
    });
}

/// Write whatever is already queued, without waiting for more.
fn drain_queued<S: LogSink>(sink: &mut S, rx: &mut mpsc::UnboundedReceiver<Command>) {
    while let Ok(command) = rx.try_recv() {
        match command {
            Command::Log(message) => write(sink, message.text()),
            Command::Reopen => reopen(sink),
            Command::Shutdown => break,
        }
    }
}

fn drain_blocking<S: LogSink>(sink: &mut S, rx: &mut mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = rx.blocking_recv() {
        match command {
            Command::Log(message) => write(sink, message.text()),
            Command::Reopen => reopen(sink),
            Command::Shutdown => break,
        }
    }
}

fn write<S: LogSink>(sink: &mut S, text: &str) {
    let line = format!("[{}] {}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"), text);
    if let Err(e) = sink.write_line(&line) {
        report_sink_error(sink, "write log line", &e);
    }
}

fn reopen<S: LogSink>(sink: &mut S) {
    match sink.reopen() {
        Ok(()) => write(sink, "Log file reopened"),
        Err(e) => report_sink_error(sink, "reopen log sink", &e),
    }
}

// Failures of the sink itself cannot go back through tracing: the events
// would be routed into this very queue.
fn report_sink_error<S: LogSink>(sink: &S, action: &str, error: &io::Error) {
    let line = format!("logger: failed to {action} ({}): {error}", sink.describe());
    let _ = ConsoleSink.write_line(&line);
}
