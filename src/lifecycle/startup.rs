//! Startup orchestration.
//!
//! # Sequence
//! ```text
//!  1. diagnostics pipeline (console fallback)     8. --test-random report
//!  2. settings (defaults on any failure)          9. --test-hash report
//!  3. logging worker (console sink if no file)   10. server.initialize()
//!  4. redirect Phase 1                           11. redirect Phase 2
//!  5. fatal + SIGHUP handlers, SIGPIPE ignored   12. event loop until the server returns
//!  6. process state + rng, banner                13. teardown (ProcessState contract)
//!  7. password hasher                            14. shutdown hooks
//!                                                15. exit status
//! ```
//!
//! # Design Decisions
//! - Config and self-test failures degrade; they never stop startup
//! - Server initialization failure skips the event loop and exits with 1
//! - Teardown and hooks run on every path once the logger exists

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::Sha512Hasher;
use crate::cli::Args;
use crate::config::{guess_config_path, load_or_default, Settings};
use crate::lifecycle::crash::CrashBridge;
use crate::lifecycle::shutdown::{Shutdown, ShutdownHooks};
use crate::lifecycle::signals::{self, FatalSignalInterceptor};
use crate::lifecycle::state::ProcessState;
use crate::observability::{DiagnosticRedirect, Diagnostics, LoggingWorker};
use crate::random::RngEngine;
use crate::selftest::{self, HashBenchPlan, RngTestPlan};
use crate::server::Server;
use crate::VERSION;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

const SEPARATOR: &str = "-------------------------";

/// Drives the process from argument parsing to exit status.
pub struct Bootstrap {
    args: Args,
    console: Option<Box<dyn Write + Send>>,
    report: Box<dyn Write + Send>,
    hooks: ShutdownHooks,
    shutdown: Shutdown,
    process_signals: bool,
}

impl Bootstrap {
    pub fn new(args: Args) -> Self {
        Self {
            args,
            console: None,
            report: Box::new(io::stderr()),
            hooks: ShutdownHooks::new(),
            shutdown: Shutdown::new(),
            process_signals: true,
        }
    }

    /// Mirror console diagnostics to `console` instead of standard error.
    pub fn with_console<W: Write + Send + 'static>(mut self, console: W) -> Self {
        self.console = Some(Box::new(console));
        self
    }

    /// Print self-test reports to `report` instead of standard error.
    pub fn with_report_output<W: Write + Send + 'static>(mut self, report: W) -> Self {
        self.report = Box::new(report);
        self
    }

    /// Leave process-wide signal dispositions alone.
    pub fn without_process_signals(mut self) -> Self {
        self.process_signals = false;
        self
    }

    /// Register a hook run once at exit, after the logger is released.
    pub fn on_exit(mut self, name: &'static str, hook: impl FnOnce() + Send + 'static) -> Self {
        self.hooks.register(name, hook);
        self
    }

    /// Handle that stops the event loop when triggered.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Run the whole process lifecycle and return the exit status.
    ///
    /// Must not be called from inside a Tokio runtime.
    pub fn run<S, F>(mut self, make_server: F) -> i32
    where
        S: Server,
        F: FnOnce(&Settings) -> S,
    {
        let redirect = Arc::new(match self.console.take() {
            Some(console) => DiagnosticRedirect::with_console(console),
            None => DiagnosticRedirect::new(),
        });
        let diagnostics = Diagnostics::install(redirect.clone());
        tracing::debug!(global = diagnostics.is_global(), "Diagnostics pipeline installed");

        let config_path = guess_config_path(self.args.config.as_deref());
        tracing::info!(path = %config_path.display(), "Using configuration file");
        let settings = load_or_default(&config_path);
        diagnostics.apply_filter(&settings.logging.filter);

        let bridge = Arc::new(CrashBridge::new());
        let Some(logger) = start_logger(&settings, &bridge) else {
            std::mem::take(&mut self.hooks).run_all();
            return EXIT_FAILURE;
        };
        // A console sink already writes to stderr; mirroring would print twice.
        let mirror = self.args.log_to_console && !logger.writes_to_console();
        redirect.install_phase_one(logger.handle(), mirror);
        tracing::debug!(sink = logger.sink_name(), mirror, "Logging worker started");

        if self.process_signals {
            install_process_signals(&settings, &bridge);
        }

        let mut state = ProcessState::new(settings, logger);
        state.attach_rng(RngEngine::from_entropy());
        tracing::info!("Servatrice {VERSION} starting.");
        tracing::info!("{SEPARATOR}");

        let exit_code = self.serve(&state, &redirect, make_server);

        match state.teardown(|| redirect.detach_logger()) {
            Ok(()) => tracing::info!(steps = ?state.teardown_steps(), "Teardown complete"),
            Err(e) => tracing::error!(error = %e, "Teardown failed"),
        }
        std::mem::take(&mut self.hooks).run_all();

        exit_code
    }

    /// Steps 7 to 12: everything that needs settings and the rng.
    fn serve<S, F>(&mut self, state: &ProcessState, redirect: &DiagnosticRedirect, make_server: F) -> i32
    where
        S: Server,
        F: FnOnce(&Settings) -> S,
    {
        let (Some(settings), Some(rng)) = (state.settings(), state.rng()) else {
            tracing::error!("Process state is incomplete, not starting server");
            return EXIT_FAILURE;
        };

        let hasher = match Sha512Hasher::initialize(settings.security.password_hash_rounds) {
            Ok(hasher) => hasher,
            Err(e) => {
                tracing::error!(error = %e, "Password hasher initialization failed");
                return EXIT_FAILURE;
            }
        };

        if self.args.test_random {
            self.run_rng_test(rng, settings);
        }
        if self.args.test_hash {
            self.run_hash_test(&hasher, settings);
        }

        let mut server = make_server(settings);
        if let Err(e) = server.initialize() {
            tracing::error!(error = %e, "Server initialization failed");
            return EXIT_FAILURE;
        }
        tracing::info!("Server initialized.");
        redirect.enter_serving_phase();

        let exit_code = self.event_loop(server);
        tracing::info!(exit_code, "Server quit.");
        tracing::info!("{SEPARATOR}");
        exit_code
    }

    fn run_rng_test(&mut self, rng: &RngEngine, settings: &Settings) {
        let plan = RngTestPlan::from(&settings.selftest);
        tracing::info!(
            samples_per_bin = plan.samples_per_bin,
            min_width = plan.min_width,
            max_width = plan.max_width,
            "Running RNG self-test"
        );

        match selftest::rng::run(rng, &plan) {
            Ok(report) => {
                self.print_report(&report);
                let worst = report.rows.iter().map(|row| row.chi_squared).fold(0.0, f64::max);
                tracing::info!(widths = report.rows.len(), max_chi_squared = worst, "RNG self-test finished");
            }
            Err(e) => tracing::warn!(error = %e, "RNG self-test failed"),
        }
    }

    fn run_hash_test(&mut self, hasher: &Sha512Hasher, settings: &Settings) {
        let plan = HashBenchPlan::with_iterations(settings.selftest.hash_iterations);
        let report = selftest::hash::run(hasher, &plan);
        self.print_report(&report);
        tracing::info!(
            iterations = report.iterations,
            rounds = hasher.rounds(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Hash benchmark finished"
        );
    }

    fn print_report(&mut self, report: &dyn fmt::Display) {
        let printed = writeln!(self.report, "{report}").and_then(|()| self.report.flush());
        if let Err(e) = printed {
            tracing::warn!(error = %e, "Failed to print self-test report");
        }
    }

    fn event_loop<S: Server>(&self, server: S) -> i32 {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build event loop runtime");
                return EXIT_FAILURE;
            }
        };

        let shutdown = self.shutdown.clone();
        let process_signals = self.process_signals;
        runtime.block_on(async move {
            let stop = shutdown.subscribe();
            if shutdown.is_triggered() {
                tracing::info!("Shutdown requested before the event loop started");
                return EXIT_SUCCESS;
            }

            if process_signals {
                let trigger = shutdown.clone();
                tokio::spawn(async move {
                    match signals::wait_for_termination().await {
                        Ok(()) => trigger.trigger(),
                        Err(e) => tracing::warn!(error = %e, "Termination signals unavailable"),
                    }
                });
            }

            server.run(stop).await
        })
    }
}

fn start_logger(settings: &Settings, bridge: &Arc<CrashBridge>) -> Option<LoggingWorker> {
    let poll_interval = Duration::from_millis(settings.logging.poll_interval_ms);

    match LoggingWorker::start_file(settings.server.logfile.clone(), bridge.clone(), poll_interval) {
        Ok(worker) => return Some(worker),
        Err(e) => tracing::error!(
            logfile = %settings.server.logfile,
            error = %e,
            "Cannot open log file, logging to console"
        ),
    }

    match LoggingWorker::start_console(bridge.clone(), poll_interval) {
        Ok(worker) => Some(worker),
        Err(e) => {
            tracing::error!(error = %e, "Cannot start logging worker");
            None
        }
    }
}

fn install_process_signals(settings: &Settings, bridge: &Arc<CrashBridge>) {
    let crash_wait = Duration::from_millis(settings.logging.crash_wait_ms);
    if let Err(e) = signals::install_fatal_handlers(FatalSignalInterceptor::new(bridge.clone(), crash_wait)) {
        tracing::warn!(error = %e, "Fatal signal handlers not installed");
    }
    if let Err(e) = signals::install_hangup_handler(bridge.clone()) {
        tracing::warn!(error = %e, "SIGHUP handler not installed, log reopen disabled");
    }
    if let Err(e) = signals::ignore_broken_pipe() {
        tracing::warn!(error = %e, "Could not ignore SIGPIPE");
    }
}
