//! SIGHUP during startup reopens the log instead of killing the process.
//!
//! Installs process-wide handlers, so it lives in its own test binary.

use nix::sys::signal::{raise, Signal};
use tokio::sync::broadcast;

use servatrice::lifecycle::EXIT_SUCCESS;
use servatrice::server::{Server, ServerError};
use servatrice::{Args, Bootstrap};

mod common;

use common::{write_settings, SharedBuffer};

/// Gets a hangup while initializing, the way logrotate can hit a slow start.
struct HangupDuringInit;

impl Server for HangupDuringInit {
    fn initialize(&mut self) -> Result<(), ServerError> {
        raise(Signal::SIGHUP).map_err(|e| ServerError::Other(e.to_string()))
    }

    async fn run(self, _shutdown: broadcast::Receiver<()>) -> i32 {
        EXIT_SUCCESS
    }
}

#[test]
fn hangup_before_event_loop_reopens_log() {
    let dir = tempfile::tempdir().unwrap();
    let (config, logfile) = write_settings(dir.path());
    let args = Args {
        config: Some(config),
        ..Args::default()
    };

    let status = Bootstrap::new(args)
        .with_console(SharedBuffer::default())
        .run(|_| HangupDuringInit);

    assert_eq!(status, EXIT_SUCCESS);
    let log = std::fs::read_to_string(logfile).unwrap();
    assert!(log.contains("Server initialized."));
    assert!(log.contains("Log file reopened"));
}
