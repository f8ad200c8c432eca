//! Process-lifetime state and its teardown contract.
//!
//! # Teardown order
//! ```text
//! ReleaseRng ─┐
//!             ├─▶ RequestLoggerShutdown ─▶ LoggerTerminated ─▶ ReleaseLogger
//! ReleaseSettings ┘
//! ```
//!
//! Every step is recorded in a [`TeardownLedger`]; a step taken out of order
//! is refused with [`TeardownError`] and leaves the state untouched.

use thiserror::Error;

use crate::config::Settings;
use crate::observability::{LogError, LoggingWorker};
use crate::random::RngEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    ReleaseRng,
    ReleaseSettings,
    RequestLoggerShutdown,
    LoggerTerminated,
    ReleaseLogger,
}

#[derive(Debug, Error)]
pub enum TeardownError {
    #[error("{step:?} is out of order: {reason}")]
    OutOfOrder { step: TeardownStep, reason: &'static str },

    #[error("{0:?} already performed")]
    Repeated(TeardownStep),

    #[error(transparent)]
    Logger(#[from] LogError),
}

/// Records teardown steps and rejects any that break the ordering contract.
#[derive(Debug, Default)]
pub struct TeardownLedger {
    done: Vec<TeardownStep>,
}

impl TeardownLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn has(&self, step: TeardownStep) -> bool {
        self.done.contains(&step)
    }

    /// Check `step` against the steps already taken and record it.
    pub fn record(&mut self, step: TeardownStep) -> Result<(), TeardownError> {
        use TeardownStep::*;

        if self.has(step) {
            return Err(TeardownError::Repeated(step));
        }

        let out_of_order = |reason| Err(TeardownError::OutOfOrder { step, reason });
        match step {
            RequestLoggerShutdown if !(self.has(ReleaseRng) && self.has(ReleaseSettings)) => {
                return out_of_order("rng and settings must be released first");
            }
            LoggerTerminated if !self.has(RequestLoggerShutdown) => {
                return out_of_order("logger shutdown was never requested");
            }
            ReleaseLogger if !self.has(LoggerTerminated) => {
                return out_of_order("logger thread has not terminated");
            }
            _ => {}
        }

        self.done.push(step);
        Ok(())
    }

    pub fn steps(&self) -> &[TeardownStep] {
        &self.done
    }
}

/// Validate a whole scripted teardown sequence.
pub fn check_teardown_order(steps: &[TeardownStep]) -> Result<(), TeardownError> {
    let mut ledger = TeardownLedger::new();
    steps.iter().try_for_each(|step| ledger.record(*step))
}

/// Everything the process owns for its whole lifetime.
///
/// Built once by the bootstrap and passed by reference; there are no
/// process-wide globals behind it.
pub struct ProcessState {
    settings: Option<Settings>,
    rng: Option<RngEngine>,
    logger: Option<LoggingWorker>,
    ledger: TeardownLedger,
}

impl ProcessState {
    pub fn new(settings: Settings, logger: LoggingWorker) -> Self {
        Self {
            settings: Some(settings),
            rng: None,
            logger: Some(logger),
            ledger: TeardownLedger::new(),
        }
    }

    pub fn attach_rng(&mut self, rng: RngEngine) {
        self.rng = Some(rng);
    }

    pub fn settings(&self) -> Option<&Settings> {
        self.settings.as_ref()
    }

    pub fn rng(&self) -> Option<&RngEngine> {
        self.rng.as_ref()
    }

    pub fn release_rng(&mut self) -> Result<(), TeardownError> {
        self.ledger.record(TeardownStep::ReleaseRng)?;
        self.rng = None;
        Ok(())
    }

    pub fn release_settings(&mut self) -> Result<(), TeardownError> {
        self.ledger.record(TeardownStep::ReleaseSettings)?;
        self.settings = None;
        Ok(())
    }

    /// Request the logger to drain and stop, then wait for its thread.
    pub fn shutdown_logger(&mut self) -> Result<(), TeardownError> {
        self.ledger.record(TeardownStep::RequestLoggerShutdown)?;
        if let Some(logger) = self.logger.as_mut() {
            logger.request_shutdown();
            logger.wait()?;
        }
        self.ledger.record(TeardownStep::LoggerTerminated)
    }

    pub fn release_logger(&mut self) -> Result<(), TeardownError> {
        self.ledger.record(TeardownStep::ReleaseLogger)?;
        self.logger = None;
        Ok(())
    }

    /// Full teardown in contract order.
    ///
    /// `before_logger_shutdown` runs after rng and settings are gone, just
    /// before the logger is asked to stop.
    pub fn teardown(&mut self, before_logger_shutdown: impl FnOnce()) -> Result<(), TeardownError> {
        self.release_rng()?;
        self.release_settings()?;
        before_logger_shutdown();
        self.shutdown_logger()?;
        self.release_logger()
    }

    pub fn teardown_steps(&self) -> &[TeardownStep] {
        self.ledger.steps()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TeardownStep::*;

    #[test]
    fn contract_order_is_accepted() {
        assert!(check_teardown_order(&[ReleaseRng, ReleaseSettings, RequestLoggerShutdown, LoggerTerminated, ReleaseLogger]).is_ok());
        assert!(check_teardown_order(&[ReleaseSettings, ReleaseRng, RequestLoggerShutdown, LoggerTerminated, ReleaseLogger]).is_ok());
    }

    #[test]
    fn logger_released_before_termination_is_rejected() {
        let err = check_teardown_order(&[ReleaseRng, ReleaseSettings, RequestLoggerShutdown, ReleaseLogger]).unwrap_err();
        assert!(matches!(err, TeardownError::OutOfOrder { step: ReleaseLogger, .. }));
    }

    #[test]
    fn logger_shutdown_before_rng_release_is_rejected() {
        let err = check_teardown_order(&[ReleaseSettings, RequestLoggerShutdown]).unwrap_err();
        assert!(matches!(err, TeardownError::OutOfOrder { step: RequestLoggerShutdown, .. }));
    }

    #[test]
    fn steps_cannot_repeat() {
        let mut ledger = TeardownLedger::new();
        ledger.record(ReleaseSettings).unwrap();
        assert!(ledger.record(RequestLoggerShutdown).is_err());
        ledger.record(ReleaseRng).unwrap();
        ledger.record(RequestLoggerShutdown).unwrap();
        assert!(matches!(ledger.record(ReleaseRng), Err(TeardownError::Repeated(ReleaseRng))));
    }

    #[test]
    fn teardown_follows_contract_and_runs_once() {
        use crate::lifecycle::crash::CrashBridge;
        use crate::observability::MemorySink;
        use std::sync::Arc;
        use std::time::Duration;

        let sink = MemorySink::new();
        let logger_sink = sink.clone();
        let logger =
            LoggingWorker::start(move || Ok(logger_sink), Arc::new(CrashBridge::new()), Duration::from_millis(5)).unwrap();
        let mut state = ProcessState::new(Settings::default(), logger);
        state.attach_rng(RngEngine::seeded(1));

        let mut hook_ran = false;
        state.teardown(|| hook_ran = true).unwrap();

        assert!(hook_ran);
        assert_eq!(
            state.teardown_steps(),
            &[ReleaseRng, ReleaseSettings, RequestLoggerShutdown, LoggerTerminated, ReleaseLogger]
        );
        assert!(state.settings().is_none() && state.rng().is_none());
        assert!(matches!(state.teardown(|| {}), Err(TeardownError::Repeated(ReleaseRng))));
    }
}
