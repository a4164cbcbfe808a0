//! Progress-callback trait for run state and status events.
//!
//! Inject an [`Arc<dyn RunProgressCallback>`] via
//! [`crate::config::RunConfigBuilder::progress_callback`] to receive events
//! as the pipeline moves through its states and files.
//!
//! The [`crate::controller::RunController`] always installs its own callback
//! that feeds the latest status into a watch channel; a user callback, if
//! any, receives the same events.
//!
//! # Example
//!
//! ```rust
//! use docs2fichas::{RunConfig, RunProgressCallback};
//! use std::sync::{Arc, Mutex};
//!
//! struct StatusLog(Mutex<Vec<String>>);
//!
//! impl RunProgressCallback for StatusLog {
//!     fn on_status(&self, message: &str) {
//!         self.0.lock().unwrap().push(message.to_string());
//!     }
//! }
//!
//! let log = Arc::new(StatusLog(Mutex::new(Vec::new())));
//! let config = RunConfig::builder()
//!     .progress_callback(log as Arc<dyn RunProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::{ExtractionError, FichaError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// States of a single run.
///
/// `Idle → Scanning → Decoding → Aggregating → Invoking → Cleanup → Done | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Scanning,
    Decoding,
    Aggregating,
    Invoking,
    Cleanup,
    Done,
    Failed,
}

impl RunState {
    /// `Done` or `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Scanning => "scanning",
            RunState::Decoding => "decoding",
            RunState::Aggregating => "aggregating",
            RunState::Invoking => "invoking",
            RunState::Cleanup => "cleanup",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Called by the run as it progresses.
///
/// Implementations must be `Send + Sync`: the run executes on a worker
/// thread. All methods have default no-op implementations so callers only
/// override what they care about.
pub trait RunProgressCallback: Send + Sync {
    /// Called on every state transition.
    fn on_state_change(&self, state: RunState) {
        let _ = state;
    }

    /// Human-readable status line, e.g. `"Processing notes.txt..."`.
    fn on_status(&self, message: &str) {
        let _ = message;
    }

    /// A source file could not be decoded and was skipped.
    fn on_file_skipped(&self, error: &ExtractionError) {
        let _ = error;
    }

    /// Just before the model process is started for a unit.
    ///
    /// # Arguments
    /// * `unit`: unit identity (file stem or `combined`)
    /// * `index`: 1-indexed position in submission order
    /// * `total`: number of units in this run
    fn on_unit_start(&self, unit: &str, index: usize, total: usize) {
        let _ = (unit, index, total);
    }

    /// A ficha was written for a unit.
    fn on_unit_complete(&self, unit: &str, ficha_path: &Path) {
        let _ = (unit, ficha_path);
    }

    /// Called exactly once when the run reaches `Done` or `Failed`.
    fn on_run_complete(&self, result: Result<usize, &FichaError>) {
        let _ = result;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RunProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RunConfig`].
pub type ProgressCallback = Arc<dyn RunProgressCallback>;

/// Fans every event out to several callbacks, in order.
pub(crate) struct FanOut(pub(crate) Vec<ProgressCallback>);

impl RunProgressCallback for FanOut {
    fn on_state_change(&self, state: RunState) {
        self.0.iter().for_each(|cb| cb.on_state_change(state));
    }

    fn on_status(&self, message: &str) {
        self.0.iter().for_each(|cb| cb.on_status(message));
    }

    fn on_file_skipped(&self, error: &ExtractionError) {
        self.0.iter().for_each(|cb| cb.on_file_skipped(error));
    }

    fn on_unit_start(&self, unit: &str, index: usize, total: usize) {
        self.0.iter().for_each(|cb| cb.on_unit_start(unit, index, total));
    }

    fn on_unit_complete(&self, unit: &str, ficha_path: &Path) {
        self.0.iter().for_each(|cb| cb.on_unit_complete(unit, ficha_path));
    }

    fn on_run_complete(&self, result: Result<usize, &FichaError>) {
        self.0.iter().for_each(|cb| cb.on_run_complete(result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        states: Mutex<Vec<RunState>>,
        skipped: AtomicUsize,
        completes: AtomicUsize,
    }

    impl RunProgressCallback for TrackingCallback {
        fn on_state_change(&self, state: RunState) {
            self.states.lock().unwrap().push(state);
        }

        fn on_file_skipped(&self, _error: &ExtractionError) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }

        fn on_unit_complete(&self, _unit: &str, _ficha_path: &Path) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_state_change(RunState::Scanning);
        cb.on_status("Processing paper.pdf...");
        cb.on_unit_start("paper", 1, 2);
        cb.on_unit_complete("paper", Path::new("/tmp/paper_ficha.txt"));
        cb.on_run_complete(Ok(1));
    }

    #[test]
    fn fan_out_reaches_every_callback() {
        let a = Arc::new(TrackingCallback::default());
        let b = Arc::new(TrackingCallback::default());
        let fan = FanOut(vec![
            Arc::clone(&a) as ProgressCallback,
            Arc::clone(&b) as ProgressCallback,
        ]);

        fan.on_state_change(RunState::Decoding);
        fan.on_file_skipped(&ExtractionError::Pdf {
            file: "x.pdf".into(),
            detail: "bad xref".into(),
        });
        fan.on_unit_complete("x", Path::new("x_ficha.txt"));

        for cb in [&a, &b] {
            assert_eq!(*cb.states.lock().unwrap(), vec![RunState::Decoding]);
            assert_eq!(cb.skipped.load(Ordering::SeqCst), 1);
            assert_eq!(cb.completes.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn terminal_states() {
        assert!(RunState::Done.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Cleanup.is_terminal());
        assert_eq!(RunState::Invoking.to_string(), "invoking");
    }
}
