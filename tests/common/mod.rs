//! Shared stubs for integration tests.

#![allow(dead_code)]

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use servatrice::auth::PasswordHasher;
use servatrice::lifecycle::{CrashReport, FatalSignalInterceptor, Interception, SignalDispatch, SignalKind};
use servatrice::random::RandomSource;
use servatrice::server::{Server, ServerError};

/// Console or report stream captured in memory.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Deterministic linear congruential source.
pub struct LcgRng {
    state: Mutex<u64>,
}

impl LcgRng {
    pub fn new(seed: u64) -> Self {
        Self { state: Mutex::new(seed) }
    }
}

impl RandomSource for LcgRng {
    fn draw_uniform(&self, min: i32, max: i32) -> i32 {
        let mut state = self.state.lock();
        *state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let width = (max as i64 - min as i64 + 1) as u64;
        (min as i64 + ((*state >> 33) % width) as i64) as i32
    }
}

/// Source that walks through the range in order: every bin fills evenly.
#[derive(Default)]
pub struct CyclingRng {
    next: AtomicU64,
}

impl RandomSource for CyclingRng {
    fn draw_uniform(&self, min: i32, max: i32) -> i32 {
        let width = (max as i64 - min as i64 + 1) as u64;
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        (min as i64 + (n % width) as i64) as i32
    }
}

/// Hasher that only counts how often it is called.
#[derive(Default)]
pub struct CountingHasher {
    pub calls: AtomicUsize,
}

impl PasswordHasher for CountingHasher {
    fn compute_hash(&self, password: &str, salt: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        format!("{salt}{password}")
    }
}

/// What the stub signal harness saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchEvent {
    RestoreDefault(SignalKind),
    Captured(SignalKind),
    EmittedRaw(SignalKind),
    Raised(SignalKind),
    DefaultDisposition(SignalKind),
}

/// Stub process: routes deliveries to the interceptor while its handler is
/// installed, and applies the default disposition once it was restored.
pub struct RecordingDispatch {
    installed: [AtomicBool; 2],
    events: Mutex<Vec<DispatchEvent>>,
}

impl RecordingDispatch {
    pub fn installed() -> Self {
        Self {
            installed: [AtomicBool::new(true), AtomicBool::new(true)],
            events: Mutex::new(Vec::new()),
        }
    }

    fn slot(kind: SignalKind) -> usize {
        match kind {
            SignalKind::SegmentationFault => 0,
            SignalKind::Abort => 1,
        }
    }

    /// Deliver `kind` to the process. `None` means the handler was not invoked.
    pub fn deliver(&self, interceptor: &FatalSignalInterceptor, kind: SignalKind) -> Option<Interception> {
        if self.installed[Self::slot(kind)].load(Ordering::SeqCst) {
            Some(interceptor.handle(kind, self))
        } else {
            self.events.lock().push(DispatchEvent::DefaultDisposition(kind));
            None
        }
    }

    pub fn events(&self) -> Vec<DispatchEvent> {
        self.events.lock().clone()
    }
}

impl SignalDispatch for RecordingDispatch {
    fn restore_default(&self, kind: SignalKind) {
        self.installed[Self::slot(kind)].store(false, Ordering::SeqCst);
        self.events.lock().push(DispatchEvent::RestoreDefault(kind));
    }

    fn capture(&self, kind: SignalKind) -> CrashReport {
        self.events.lock().push(DispatchEvent::Captured(kind));
        CrashReport::from_frames(kind, &[0x1000, 0x2000])
    }

    fn emit_raw(&self, report: &CrashReport) {
        self.events.lock().push(DispatchEvent::EmittedRaw(report.kind()));
    }

    fn raise(&self, kind: SignalKind) {
        self.events.lock().push(DispatchEvent::Raised(kind));
    }
}

/// Server stub with a scripted outcome.
pub struct StubServer {
    pub init_ok: bool,
    pub exit_code: i32,
    pub ran: Arc<AtomicBool>,
}

impl StubServer {
    pub fn new(init_ok: bool, exit_code: i32) -> Self {
        Self {
            init_ok,
            exit_code,
            ran: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Server for StubServer {
    fn initialize(&mut self) -> Result<(), ServerError> {
        if self.init_ok {
            Ok(())
        } else {
            Err(ServerError::Other("database unreachable".into()))
        }
    }

    async fn run(self, _shutdown: broadcast::Receiver<()>) -> i32 {
        self.ran.store(true, Ordering::SeqCst);
        self.exit_code
    }
}

/// Write a settings file into `dir` whose log file also lives in `dir`.
pub fn write_settings(dir: &Path) -> (PathBuf, PathBuf) {
    write_settings_with_logfile(dir, &dir.join("server.log"))
}

/// Write a settings file into `dir` pointing the logger at `logfile`.
pub fn write_settings_with_logfile(dir: &Path, logfile: &Path) -> (PathBuf, PathBuf) {
    let logfile = logfile.to_path_buf();
    let config = dir.join("servatrice.toml");
    let contents = format!(
        r#"
        [server]
        logfile = "{}"
        bind_address = "127.0.0.1:0"
        max_connections = 8

        [logging]
        poll_interval_ms = 5
        crash_wait_ms = 500

        [selftest]
        rng_samples_per_bin = 50
        rng_max_width = 4
        hash_iterations = 10

        [security]
        password_hash_rounds = 2
        "#,
        logfile.display()
    );
    std::fs::write(&config, contents).unwrap();
    (config, logfile)
}
