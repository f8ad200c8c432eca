//! OS signal handling.
//!
//! # Responsibilities
//! - Intercept SIGSEGV/SIGABRT once, preserve diagnostics, then re-raise
//! - Ignore SIGPIPE process-wide (transient network write failures)
//! - SIGHUP → reopen the log sink, from the moment handlers are installed
//! - SIGTERM/SIGINT → graceful server shutdown
//!
//! # Fatal path
//! ```text
//! Armed ──signal──▶ Firing (terminal)
//!   1. restore default disposition (a crash inside the handler is not caught)
//!   2. capture backtrace, write it raw to stderr
//!   3. flag the crash on the CrashBridge
//!   4. wait, bounded, for the logger thread to drain and exit
//!   5. re-raise, so the OS reports the same signal
//! ```
//!
//! # Design Decisions
//! - The handler only does async-signal-safe work; structured logging and the
//!   logger shutdown happen on the logger thread
//! - SIGHUP only raises a flag on the CrashBridge, so it is honored during
//!   startup as well as in the event loop
//! - SIGTERM/SIGINT use Tokio's signal streams inside the event loop

use std::os::fd::BorrowedFd;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use nix::libc;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use thiserror::Error;
use tokio::signal::unix::{signal as unix_signal, SignalKind as UnixSignal};

use crate::lifecycle::crash::{CrashBridge, CrashReport, SignalKind};

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("signal handlers are already installed")]
    AlreadyInstalled,

    #[error("failed to install signal handler: {0}")]
    Install(#[from] nix::Error),

    #[error("failed to listen for signal: {0}")]
    Listen(#[from] std::io::Error),
}

/// State of a single-shot handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShotState {
    Armed,
    Firing,
}

/// Armed/Firing state for one signal. Firing is terminal.
#[derive(Debug)]
pub struct SingleShot(AtomicU8);

impl SingleShot {
    pub const fn armed() -> Self {
        Self(AtomicU8::new(0))
    }

    /// Move Armed → Firing. Returns false if already firing.
    pub fn fire(&self) -> bool {
        self.0
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn state(&self) -> ShotState {
        match self.0.load(Ordering::SeqCst) {
            0 => ShotState::Armed,
            _ => ShotState::Firing,
        }
    }
}

/// The operations the fatal path performs on the process.
///
/// [`OsSignals`] talks to the kernel; tests substitute a recording stub.
pub trait SignalDispatch {
    /// Restore the default disposition for `kind`.
    fn restore_default(&self, kind: SignalKind);

    /// Capture the crash snapshot.
    fn capture(&self, kind: SignalKind) -> CrashReport;

    /// Write the snapshot using signal-safe output only.
    fn emit_raw(&self, report: &CrashReport);

    /// Deliver `kind` to the process again.
    fn raise(&self, kind: SignalKind);
}

/// Outcome of one delivery to the interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interception {
    /// First delivery: diagnostics preserved, signal re-raised.
    Handled { logger_drained: bool },
    /// Handler already fired; default disposition applied.
    PassedThrough,
}

/// Fatal signal state machine.
#[derive(Debug)]
pub struct FatalSignalInterceptor {
    segv: SingleShot,
    abort: SingleShot,
    bridge: Arc<CrashBridge>,
    crash_wait: Duration,
}

impl FatalSignalInterceptor {
    pub fn new(bridge: Arc<CrashBridge>, crash_wait: Duration) -> Self {
        Self {
            segv: SingleShot::armed(),
            abort: SingleShot::armed(),
            bridge,
            crash_wait,
        }
    }

    fn shot(&self, kind: SignalKind) -> &SingleShot {
        match kind {
            SignalKind::SegmentationFault => &self.segv,
            SignalKind::Abort => &self.abort,
        }
    }

    pub fn state(&self, kind: SignalKind) -> ShotState {
        self.shot(kind).state()
    }

    /// Run the fatal path for one delivery of `kind`.
    pub fn handle<D: SignalDispatch + ?Sized>(&self, kind: SignalKind, dispatch: &D) -> Interception {
        if !self.shot(kind).fire() {
            dispatch.restore_default(kind);
            dispatch.raise(kind);
            return Interception::PassedThrough;
        }

        dispatch.restore_default(kind);

        let report = dispatch.capture(kind);
        dispatch.emit_raw(&report);

        self.bridge.request(kind);
        let logger_drained = self.bridge.wait_for_worker(self.crash_wait);

        dispatch.raise(kind);
        Interception::Handled { logger_drained }
    }
}

/// [`SignalDispatch`] backed by the real process.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSignals;

impl SignalDispatch for OsSignals {
    fn restore_default(&self, kind: SignalKind) {
        let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
        // SAFETY: installing SIG_DFL has no handler code to be unsound.
        let _ = unsafe { signal::sigaction(kind.signal(), &action) };
    }

    fn capture(&self, kind: SignalKind) -> CrashReport {
        CrashReport::capture(kind)
    }

    fn emit_raw(&self, report: &CrashReport) {
        // SAFETY: stderr stays open for the whole process lifetime.
        let stderr = unsafe { BorrowedFd::borrow_raw(libc::STDERR_FILENO) };
        report.write_raw(stderr);
    }

    fn raise(&self, kind: SignalKind) {
        let _ = signal::raise(kind.signal());
    }
}

static INTERCEPTOR: OnceLock<FatalSignalInterceptor> = OnceLock::new();
static HANGUP: OnceLock<Arc<CrashBridge>> = OnceLock::new();

extern "C" fn on_fatal_signal(raw: libc::c_int) {
    let Some(kind) = SignalKind::from_raw(raw) else {
        return;
    };
    match INTERCEPTOR.get() {
        Some(interceptor) => {
            interceptor.handle(kind, &OsSignals);
        }
        None => {
            OsSignals.restore_default(kind);
            OsSignals.raise(kind);
        }
    }
}

/// Install the process-wide fatal signal handlers. Can only succeed once.
pub fn install_fatal_handlers(interceptor: FatalSignalInterceptor) -> Result<(), SignalError> {
    INTERCEPTOR.set(interceptor).map_err(|_| SignalError::AlreadyInstalled)?;

    // The first backtrace() call may load libgcc; do it outside the handler.
    let _ = CrashReport::capture(SignalKind::Abort);

    let action = SigAction::new(
        SigHandler::Handler(on_fatal_signal),
        SaFlags::SA_ONSTACK,
        SigSet::empty(),
    );
    for kind in SignalKind::ALL {
        // SAFETY: the handler only touches atomics, stack buffers and
        // async-signal-safe libc calls.
        unsafe { signal::sigaction(kind.signal(), &action) }?;
    }

    tracing::debug!("Fatal signal handlers installed");
    Ok(())
}

/// Ignore SIGPIPE so a peer closing mid-write does not kill the process.
pub fn ignore_broken_pipe() -> Result<(), SignalError> {
    // SAFETY: SIG_IGN runs no code.
    unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigIgn) }?;
    Ok(())
}

extern "C" fn on_hangup(_raw: libc::c_int) {
    if let Some(bridge) = HANGUP.get() {
        bridge.request_reopen();
    }
}

/// Reopen the log sink on every SIGHUP. Can only succeed once.
///
/// Replaces the default disposition, which would terminate the process.
pub fn install_hangup_handler(bridge: Arc<CrashBridge>) -> Result<(), SignalError> {
    HANGUP.set(bridge).map_err(|_| SignalError::AlreadyInstalled)?;

    let action = SigAction::new(SigHandler::Handler(on_hangup), SaFlags::SA_RESTART, SigSet::empty());
    // SAFETY: the handler performs a single atomic store.
    unsafe { signal::sigaction(Signal::SIGHUP, &action) }?;
    Ok(())
}

/// Wait for SIGTERM or SIGINT.
pub async fn wait_for_termination() -> Result<(), SignalError> {
    let mut terminate = unix_signal(UnixSignal::terminate())?;
    let mut interrupt = unix_signal(UnixSignal::interrupt())?;

    tokio::select! {
        _ = terminate.recv() => tracing::info!("Received SIGTERM signal"),
        _ = interrupt.recv() => tracing::info!("Received SIGINT signal"),
    }
    Ok(())
}
