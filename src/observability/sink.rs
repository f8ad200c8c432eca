//! Log sinks owned by the logging worker.
//!
//! # Responsibilities
//! - Write timestamped lines to the final destination
//! - Reopen the destination on request (log rotation)
//!
//! # Design Decisions
//! - A sink is moved onto the logger thread and never shared
//! - File writes are flushed per line so a crash loses nothing already written
//! - Reopen opens the new file before closing the old one

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Destination for formatted log lines.
pub trait LogSink: Send + 'static {
    /// Write one complete line (without trailing newline).
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Close and reopen the underlying destination.
    fn reopen(&mut self) -> io::Result<()>;

    /// Human-readable destination name for diagnostics.
    fn describe(&self) -> String;
}

/// Appends to a log file.
pub struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = BufWriter::new(Self::open_file(&path)?);
        Ok(Self { path, writer })
    }

    fn open_file(path: &Path) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileSink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    fn reopen(&mut self) -> io::Result<()> {
        let file = Self::open_file(&self.path)?;
        let old = std::mem::replace(&mut self.writer, BufWriter::new(file));
        old.into_inner().map_err(|e| e.into_error())?.sync_all()
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Writes to standard error. Used when the log file cannot be opened.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub const NAME: &'static str = "<stderr>";
}

impl LogSink for ConsoleSink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut stderr = io::stderr().lock();
        stderr.write_all(line.as_bytes())?;
        stderr.write_all(b"\n")
    }

    fn reopen(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        Self::NAME.to_string()
    }
}

/// Keeps lines in memory; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
    reopens: Arc<AtomicUsize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn reopen_count(&self) -> usize {
        self.reopens.load(Ordering::SeqCst)
    }
}

impl LogSink for MemorySink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.lines.lock().push(line.to_string());
        Ok(())
    }

    fn reopen(&mut self) -> io::Result<()> {
        self.reopens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sink_appends_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.log");

        let mut sink = FileSink::open(&path).unwrap();
        assert_eq!(sink.path(), path.as_path());
        sink.write_line("first").unwrap();

        let rotated = dir.path().join("server.log.1");
        std::fs::rename(&path, &rotated).unwrap();
        sink.reopen().unwrap();
        sink.write_line("second").unwrap();

        assert_eq!(std::fs::read_to_string(&rotated).unwrap(), "first\n");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second\n");
    }

    #[test]
    fn file_sink_open_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileSink::open(dir.path().join("missing").join("server.log")).is_err());
    }
}
