//! Run Controller: start runs off the caller's thread and report status.
//!
//! ## Why a dedicated thread?
//!
//! The caller (a CLI, a UI event loop) must stay responsive while the model
//! runner works for minutes. [`RunController::start_run`] validates the
//! request synchronously, then hands the run to a `ficha-run` worker thread
//! that drives its own current-thread tokio runtime. The caller gets a
//! [`RunHandle`] back immediately.
//!
//! ## Status
//!
//! The worker is the single writer of a `tokio::sync::watch` channel holding
//! the latest [`RunStatus`]. Readers see the most recent value; intermediate
//! values may be coalesced. The final value is always `Done` or `Failed`.
//!
//! At most one run is in flight per controller. A second
//! [`RunController::start_run`] while busy is rejected with
//! [`FichaError::RunInProgress`].

use crate::config::RunConfig;
use crate::error::FichaError;
use crate::output::RunOutput;
use crate::progress::{FanOut, ProgressCallback, RunProgressCallback, RunState};
use crate::pipeline::{invoke, scan};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error};

/// Latest known state of a run plus its last status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStatus {
    pub state: RunState,
    pub message: String,
}

impl RunStatus {
    fn ready() -> Self {
        Self {
            state: RunState::Idle,
            message: "Ready".to_string(),
        }
    }
}

/// Accepts run requests, one at a time.
pub struct RunController {
    config: RunConfig,
    busy: Arc<AtomicBool>,
}

impl RunController {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True when a new run would be accepted.
    pub fn is_idle(&self) -> bool {
        !self.busy.load(Ordering::SeqCst)
    }

    /// Validate the request and start the run on a worker thread.
    ///
    /// # Errors
    /// * [`FichaError::RunInProgress`] if a run is already in flight
    /// * any validation error from the directory, prompt or model checks
    /// * [`FichaError::Internal`] if the worker thread cannot be spawned
    pub fn start_run(
        &self,
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        prompt: impl Into<String>,
    ) -> Result<RunHandle, FichaError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(FichaError::RunInProgress);
        }

        let (input_dir, output_dir, prompt) = (input_dir.into(), output_dir.into(), prompt.into());
        let validated = invoke::validate_arguments(&prompt, self.config.effective_model())
            .and_then(|()| scan::validate_dirs(&input_dir, &output_dir));
        if let Err(e) = validated {
            self.busy.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let (status_tx, status_rx) = watch::channel(RunStatus::ready());
        let status_tx = Arc::new(status_tx);
        let (result_tx, result_rx) = oneshot::channel();

        let mut config = self.config.clone();
        let mut callbacks: Vec<ProgressCallback> =
            vec![Arc::new(WatchForwarder(Arc::clone(&status_tx)))];
        callbacks.extend(config.progress_callback.take());
        config.progress_callback = Some(Arc::new(FanOut(callbacks)));

        let guard = WorkerGuard {
            busy: Arc::clone(&self.busy),
            status: status_tx,
        };

        let spawned = std::thread::Builder::new()
            .name("ficha-run".to_string())
            .spawn(move || {
                let result = run_on_worker(&input_dir, &output_dir, &prompt, &config);
                if let Err(ref e) = result {
                    guard.publish_failure(e);
                }
                // Become idle before the waiter is woken.
                drop(guard);
                let _ = result_tx.send(result);
            });

        if let Err(e) = spawned {
            // The closure (and the guard inside it) was dropped, so `busy`
            // is already reset.
            return Err(FichaError::Internal(format!("Failed to spawn run worker: {e}")));
        }

        debug!("Run accepted");
        Ok(RunHandle {
            status: status_rx,
            result: result_rx,
        })
    }
}

fn run_on_worker(
    input_dir: &std::path::Path,
    output_dir: &std::path::Path,
    prompt: &str,
    config: &RunConfig,
) -> Result<RunOutput, FichaError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| FichaError::Internal(format!("Failed to create tokio runtime: {}", e)))?;
    runtime.block_on(crate::run::run_validated(input_dir, output_dir, prompt, config))
}

/// Caller's view of one accepted run.
pub struct RunHandle {
    status: watch::Receiver<RunStatus>,
    result: oneshot::Receiver<Result<RunOutput, FichaError>>,
}

impl RunHandle {
    /// Most recent status published by the worker.
    pub fn latest(&self) -> RunStatus {
        self.status.borrow().clone()
    }

    /// Stream of status updates: the current value first, then each change.
    /// Ends when the worker exits.
    pub fn status_stream(&self) -> WatchStream<RunStatus> {
        WatchStream::new(self.status.clone())
    }

    /// Whether the run has reached `Done` or `Failed`.
    pub fn is_finished(&self) -> bool {
        self.status.borrow().state.is_terminal()
    }

    /// Wait for the run to finish and take its result.
    pub async fn wait(self) -> Result<RunOutput, FichaError> {
        self.result
            .await
            .unwrap_or_else(|_| Err(FichaError::Internal("Run worker exited without a result".into())))
    }

    /// Blocking variant of [`RunHandle::wait`]. Must not be called from
    /// inside an async runtime.
    pub fn wait_blocking(self) -> Result<RunOutput, FichaError> {
        self.result
            .blocking_recv()
            .unwrap_or_else(|_| Err(FichaError::Internal("Run worker exited without a result".into())))
    }
}

/// Forwards state and status events into the watch channel.
struct WatchForwarder(Arc<watch::Sender<RunStatus>>);

impl RunProgressCallback for WatchForwarder {
    fn on_state_change(&self, state: RunState) {
        self.0.send_modify(|s| s.state = state);
    }

    fn on_status(&self, message: &str) {
        self.0.send_modify(|s| s.message = message.to_string());
    }
}

/// Owned by the worker thread; resets the busy flag however the thread ends.
struct WorkerGuard {
    busy: Arc<AtomicBool>,
    status: Arc<watch::Sender<RunStatus>>,
}

impl WorkerGuard {
    /// Make sure the channel ends in `Failed`, e.g. when the runtime could
    /// not be built and the run never reported anything.
    fn publish_failure(&self, e: &FichaError) {
        if !self.status.borrow().state.is_terminal() {
            self.status.send_replace(RunStatus {
                state: RunState::Failed,
                message: format!("Error: {e}"),
            });
        }
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!("Run worker panicked");
            self.publish_failure(&FichaError::Internal("run worker panicked".into()));
        }
        self.busy.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_controller_is_idle() {
        assert!(RunController::new(RunConfig::default()).is_idle());
    }

    #[test]
    fn invalid_request_is_rejected_immediately() {
        let tmp = tempfile::tempdir().unwrap();
        let controller = RunController::new(RunConfig::default());
        let err = controller
            .start_run(tmp.path().join("missing"), tmp.path().join("out"), "p")
            .err()
            .unwrap();
        assert!(matches!(err, FichaError::InputDirNotFound { .. }));
        assert!(controller.is_idle());
    }

    #[test]
    fn nul_in_prompt_is_rejected_immediately() {
        let tmp = tempfile::tempdir().unwrap();
        let controller = RunController::new(RunConfig::default());
        let err = controller
            .start_run(tmp.path(), tmp.path().join("out"), "bad\0prompt")
            .err()
            .unwrap();
        assert_eq!(err.class(), crate::error::ErrorClass::Validation);
        assert!(controller.is_idle());
        assert!(!tmp.path().join("out").exists());
    }

    #[test]
    fn forwarder_updates_latest_status() {
        let (tx, rx) = watch::channel(RunStatus::ready());
        let fwd = WatchForwarder(Arc::new(tx));
        fwd.on_state_change(RunState::Decoding);
        fwd.on_status("Processing notes.txt...");
        assert_eq!(
            *rx.borrow(),
            RunStatus {
                state: RunState::Decoding,
                message: "Processing notes.txt...".into()
            }
        );
    }

    #[test]
    fn guard_resets_busy_and_marks_failure_on_panic() {
        let busy = Arc::new(AtomicBool::new(true));
        let (tx, rx) = watch::channel(RunStatus::ready());
        let guard = WorkerGuard {
            busy: Arc::clone(&busy),
            status: Arc::new(tx),
        };
        let joined = std::thread::spawn(move || {
            let _guard = guard;
            panic!("boom");
        })
        .join();
        assert!(joined.is_err());
        assert!(!busy.load(Ordering::SeqCst));
        assert_eq!(rx.borrow().state, RunState::Failed);
    }

    #[cfg(unix)]
    mod with_stub_runner {
        use super::*;
        use crate::test_support::stub_runner as stub;
        use tokio_stream::StreamExt;

        #[tokio::test]
        async fn second_start_while_busy_is_rejected() {
            let tmp = tempfile::tempdir().unwrap();
            let input = tmp.path().join("in");
            std::fs::create_dir(&input).unwrap();
            std::fs::write(input.join("a.txt"), "hello").unwrap();
            let runner = stub(tmp.path(), "cat >/dev/null; sleep 1; printf ficha");
            let config = RunConfig::builder().runner(runner).build().unwrap();
            let controller = RunController::new(config);

            let handle = controller.start_run(&input, tmp.path().join("out"), "p").unwrap();
            assert!(!controller.is_idle());
            let second = controller.start_run(&input, tmp.path().join("out"), "p");
            assert!(matches!(second, Err(FichaError::RunInProgress)));

            let output = handle.wait().await.unwrap();
            assert_eq!(output.fichas.len(), 1);
            assert!(controller.is_idle());
        }

        #[tokio::test]
        async fn status_stream_ends_in_done() {
            let tmp = tempfile::tempdir().unwrap();
            let input = tmp.path().join("in");
            std::fs::create_dir(&input).unwrap();
            std::fs::write(input.join("a.txt"), "hello").unwrap();
            let runner = stub(tmp.path(), "cat >/dev/null; printf ficha");
            let config = RunConfig::builder().runner(runner).build().unwrap();
            let controller = RunController::new(config);

            let handle = controller.start_run(&input, tmp.path().join("out"), "p").unwrap();
            let stream = handle.status_stream();
            handle.wait().await.unwrap();

            let statuses: Vec<RunStatus> = stream.collect().await;
            let last = statuses.last().unwrap();
            assert_eq!(last.state, RunState::Done);
            assert_eq!(last.message, "Processing complete!");
        }

        #[tokio::test]
        async fn failed_run_ends_in_failed() {
            let tmp = tempfile::tempdir().unwrap();
            let input = tmp.path().join("in");
            std::fs::create_dir(&input).unwrap();
            std::fs::write(input.join("a.txt"), "hello").unwrap();
            let runner = stub(tmp.path(), "cat >/dev/null; echo 'connection refused' >&2; exit 1");
            let config = RunConfig::builder().runner(runner).build().unwrap();
            let controller = RunController::new(config);

            let handle = controller.start_run(&input, tmp.path().join("out"), "p").unwrap();
            let stream = handle.status_stream();
            let err = handle.wait().await.unwrap_err();
            assert!(matches!(err, FichaError::BackendUnreachable { .. }));

            let statuses: Vec<RunStatus> = stream.collect().await;
            assert_eq!(statuses.last().unwrap().state, RunState::Failed);
            assert!(controller.is_idle());
        }
    }
}
