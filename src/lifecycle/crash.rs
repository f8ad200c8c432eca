//! Crash capture primitives shared by the fatal signal handler and the logger.
//!
//! # Responsibilities
//! - Name the fatal signals we intercept and their log tags
//! - Capture a bounded backtrace without allocating
//! - Hand a pending crash or log reopen from a signal handler to the logger thread
//!
//! # Design Decisions
//! - Everything reachable from a signal handler is atomics, stack buffers
//!   and raw `write(2)`; no locks, no allocation
//! - The logger thread polls the bridge and does the structured work

use std::os::fd::BorrowedFd;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use nix::sys::signal::Signal;

/// Maximum number of stack frames captured on a crash.
pub const MAX_FRAMES: usize = 40;

/// Fatal signals intercepted before the process dies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    SegmentationFault,
    Abort,
}

impl SignalKind {
    pub const ALL: [SignalKind; 2] = [SignalKind::SegmentationFault, SignalKind::Abort];

    /// Fixed marker written to the log when this signal fires.
    pub const fn tag(self) -> &'static str {
        match self {
            SignalKind::SegmentationFault => "CRASH: SIGSEGV",
            SignalKind::Abort => "CRASH: SIGABRT",
        }
    }

    pub const fn signal(self) -> Signal {
        match self {
            SignalKind::SegmentationFault => Signal::SIGSEGV,
            SignalKind::Abort => Signal::SIGABRT,
        }
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.signal() as i32 == raw)
    }

    const fn code(self) -> u8 {
        match self {
            SignalKind::SegmentationFault => 1,
            SignalKind::Abort => 2,
        }
    }

    const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(SignalKind::SegmentationFault),
            2 => Some(SignalKind::Abort),
            _ => None,
        }
    }
}

/// A crash snapshot: which signal fired and the return addresses on the stack.
///
/// Lives on the handler's stack and is dropped once written out.
#[derive(Debug, Clone)]
pub struct CrashReport {
    kind: SignalKind,
    frames: [usize; MAX_FRAMES],
    depth: usize,
}

impl CrashReport {
    /// Capture the current thread's stack, up to [`MAX_FRAMES`] deep.
    pub fn capture(kind: SignalKind) -> Self {
        let mut report = Self::empty(kind);
        report.depth = platform::capture_frames(&mut report.frames);
        report
    }

    /// A report with no frames.
    pub const fn empty(kind: SignalKind) -> Self {
        Self {
            kind,
            frames: [0; MAX_FRAMES],
            depth: 0,
        }
    }

    /// Build a report from known frame addresses, truncated to [`MAX_FRAMES`].
    pub fn from_frames(kind: SignalKind, addresses: &[usize]) -> Self {
        let mut report = Self::empty(kind);
        let depth = addresses.len().min(MAX_FRAMES);
        report.frames[..depth].copy_from_slice(&addresses[..depth]);
        report.depth = depth;
        report
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn frames(&self) -> &[usize] {
        &self.frames[..self.depth]
    }

    /// Write `Error: signal N:` and the symbolized frames to `fd`.
    ///
    /// Only uses `write(2)` and `backtrace_symbols_fd`, both usable from a
    /// signal handler.
    pub fn write_raw(&self, fd: BorrowedFd<'_>) {
        let mut line = [0u8; 32];
        let mut len = copy_into(&mut line, 0, b"Error: signal ");
        len += write_decimal(&mut line[len..], self.kind.signal() as i32);
        len = copy_into(&mut line, len, b":\n");
        let _ = nix::unistd::write(fd, &line[..len]);

        platform::write_symbols(self.frames(), fd);
    }
}

fn copy_into(buf: &mut [u8], at: usize, bytes: &[u8]) -> usize {
    let end = (at + bytes.len()).min(buf.len());
    buf[at..end].copy_from_slice(&bytes[..end - at]);
    end
}

/// Format `n` as decimal into `buf` without allocating; returns bytes written.
pub(crate) fn write_decimal(buf: &mut [u8], n: i32) -> usize {
    let mut digits = [0u8; 11];
    let mut value = n.unsigned_abs();
    let mut count = 0;
    loop {
        digits[count] = b'0' + (value % 10) as u8;
        count += 1;
        value /= 10;
        if value == 0 {
            break;
        }
    }
    if n < 0 {
        digits[count] = b'-';
        count += 1;
    }
    let written = count.min(buf.len());
    for (slot, digit) in buf.iter_mut().zip(digits[..count].iter().rev()).take(written) {
        *slot = *digit;
    }
    written
}

/// Hand-off point between signal handlers and the logger thread.
///
/// The fatal handler records the pending signal; the logger thread notices
/// it, drains its queue, writes the crash marker and reports that it exited.
/// The hangup handler only raises the reopen flag.
#[derive(Debug)]
pub struct CrashBridge {
    pending: AtomicU8,
    reopen: AtomicBool,
    worker_exited: AtomicBool,
}

impl CrashBridge {
    /// A bridge with no logger attached yet.
    pub const fn new() -> Self {
        Self {
            pending: AtomicU8::new(0),
            reopen: AtomicBool::new(false),
            worker_exited: AtomicBool::new(true),
        }
    }

    /// Record a crash. The first recorded signal wins.
    pub fn request(&self, kind: SignalKind) {
        let _ = self
            .pending
            .compare_exchange(0, kind.code(), Ordering::SeqCst, Ordering::SeqCst);
    }

    pub fn pending(&self) -> Option<SignalKind> {
        SignalKind::from_code(self.pending.load(Ordering::SeqCst))
    }

    /// Ask the logger to reopen its sink. Signal-safe.
    pub fn request_reopen(&self) {
        self.reopen.store(true, Ordering::SeqCst);
    }

    /// Consume a pending reopen request.
    pub(crate) fn take_reopen(&self) -> bool {
        self.reopen.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn worker_started(&self) {
        self.worker_exited.store(false, Ordering::SeqCst);
    }

    pub(crate) fn worker_stopped(&self) {
        self.worker_exited.store(true, Ordering::SeqCst);
    }

    pub fn is_worker_exited(&self) -> bool {
        self.worker_exited.load(Ordering::SeqCst)
    }

    /// Spin-sleep until the logger thread exits or `timeout` elapses.
    ///
    /// Returns whether the logger exited in time.
    pub fn wait_for_worker(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_worker_exited() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }
}

impl Default for CrashBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
mod platform {
    use std::os::fd::{AsRawFd, BorrowedFd};

    use nix::libc::{c_int, c_void};

    use super::MAX_FRAMES;

    extern "C" {
        fn backtrace(buffer: *mut *mut c_void, size: c_int) -> c_int;
        fn backtrace_symbols_fd(buffer: *const *mut c_void, size: c_int, fd: c_int);
    }

    pub(super) fn capture_frames(frames: &mut [usize; MAX_FRAMES]) -> usize {
        // SAFETY: `usize` and `*mut c_void` have the same layout and the
        // buffer holds exactly MAX_FRAMES entries.
        let depth = unsafe { backtrace(frames.as_mut_ptr().cast::<*mut c_void>(), MAX_FRAMES as c_int) };
        usize::try_from(depth).unwrap_or(0)
    }

    pub(super) fn write_symbols(frames: &[usize], fd: BorrowedFd<'_>) {
        if frames.is_empty() {
            return;
        }
        // SAFETY: `frames` is a valid slice of addresses of the given length.
        unsafe {
            backtrace_symbols_fd(
                frames.as_ptr().cast::<*mut c_void>(),
                frames.len() as c_int,
                fd.as_raw_fd(),
            );
        }
    }
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
mod platform {
    use std::os::fd::BorrowedFd;

    use super::MAX_FRAMES;

    pub(super) fn capture_frames(_frames: &mut [usize; MAX_FRAMES]) -> usize {
        0
    }

    pub(super) fn write_symbols(_frames: &[usize], _fd: BorrowedFd<'_>) {}
}
