//! Inference Invoker: drive the external model runner for one unit.
//!
//! The protocol is the runner's interactive CLI, used non-interactively:
//!
//! ```text
//! <runner> run <model-id> <prompt> [image paths...]   (argv)
//! <unit text>                                          (stdin, then EOF)
//! <ficha>                                              (stdout)
//! <diagnostic>                                         (stderr, on failure)
//! ```
//!
//! The child always sees a UTF-8 locale (`PYTHONIOENCODING`, `LC_ALL`,
//! `LANG`), whatever the host's default is. Output is decoded lossily, so a
//! stray invalid byte from the runner never aborts a run.
//!
//! ## Retry Strategy
//!
//! Only a backend that is not reachable is worth retrying: the server may
//! still be starting. Backoff is exponential (`retry_backoff_ms * 2^attempt`),
//! capped at [`MAX_BACKOFF_MS`]. Every other failure is returned on the first
//! attempt.

use crate::config::RunConfig;
use crate::error::FichaError;
use crate::pipeline::aggregate::Unit;
use crate::prompts::prompt_with_images;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Environment forced onto the child process.
pub const UTF8_ENV: [(&str, &str); 3] = [
    ("PYTHONIOENCODING", "utf-8"),
    ("LC_ALL", "C.UTF-8"),
    ("LANG", "C.UTF-8"),
];

const CONNECTION_MARKERS: [&str; 2] = ["failed to connect", "connection refused"];

/// Upper bound on a single retry delay.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Submit `unit` to the model and return its verbatim output.
pub async fn invoke(unit: &Unit, prompt: &str, config: &RunConfig) -> Result<String, FichaError> {
    let mut attempt = 0u32;
    loop {
        if attempt > 0 {
            let backoff = backoff_delay_ms(config.retry_backoff_ms, attempt);
            warn!(
                "Unit {}: backend unreachable, retry {}/{} after {}ms",
                unit.id, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match run_once(unit, prompt, config).await {
            Err(e @ FichaError::BackendUnreachable { .. }) if attempt < config.max_retries => {
                debug!("Unit {}: attempt {} failed: {}", unit.id, attempt + 1, e);
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Delay before retry number `attempt` (1-based).
fn backoff_delay_ms(base_ms: u64, attempt: u32) -> u64 {
    let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS)
}

/// Reject a prompt or model id that can never be passed as an argument.
///
/// These affect every unit of a run alike, so they are checked once before
/// anything is submitted and reported as validation errors.
pub fn validate_arguments(prompt: &str, model: &str) -> Result<(), FichaError> {
    if prompt.contains('\0') {
        return Err(FichaError::InvalidArgument("prompt contains a NUL character".into()));
    }
    if model.contains('\0') {
        return Err(FichaError::InvalidArgument("model id contains a NUL character".into()));
    }
    Ok(())
}

/// One launch of the runner, no retry.
async fn run_once(unit: &Unit, prompt: &str, config: &RunConfig) -> Result<String, FichaError> {
    let model = config.effective_model();
    validate_arguments(prompt, model)?;
    check_unit_text(unit)?;
    let prompt_arg = build_prompt_arg(unit, prompt)?;
    let start = Instant::now();

    let mut child = Command::new(&config.runner)
        .arg("run")
        .arg(model)
        .arg(&prompt_arg)
        .envs(UTF8_ENV)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| FichaError::RunnerUnavailable {
            runner: config.runner.clone(),
            source: e,
        })?;

    // Feed stdin concurrently with reading stdout, or a large unit can
    // deadlock against a full stdout pipe.
    let writer = child.stdin.take().map(|mut stdin| {
        let payload = unit.text.clone().into_bytes();
        tokio::spawn(async move {
            let result = stdin.write_all(&payload).await;
            drop(stdin);
            result
        })
    });

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| FichaError::InferenceFailed {
            unit: unit.id.clone(),
            code: None,
            diagnostic: format!("failed to collect runner output: {e}"),
        })?;

    if let Some(writer) = writer {
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!("Unit {}: runner closed stdin early", unit.id)
            }
            Ok(Err(e)) => warn!("Unit {}: writing stdin failed: {}", unit.id, e),
            Err(e) => warn!("Unit {}: stdin writer task failed: {}", unit.id, e),
        }
    }

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    debug!(
        "Unit {}: runner exited with {:?} after {:?} ({} bytes out)",
        unit.id,
        output.status.code(),
        start.elapsed(),
        stdout.len()
    );

    if output.status.success() {
        Ok(stdout)
    } else {
        Err(classify_failure(&unit.id, &config.runner, output.status.code(), stderr))
    }
}

/// The runner reads stdin as text; a NUL means the source was binary.
fn check_unit_text(unit: &Unit) -> Result<(), FichaError> {
    match unit.text.find('\0') {
        Some(offset) => Err(FichaError::Encoding {
            unit: unit.id.clone(),
            detail: format!("text contains a NUL character at byte {offset}"),
        }),
        None => Ok(()),
    }
}

/// Assemble the prompt argument from the instruction and the unit's images.
fn build_prompt_arg(unit: &Unit, prompt: &str) -> Result<String, FichaError> {
    let encoding_err = |detail: String| FichaError::Encoding {
        unit: unit.id.clone(),
        detail,
    };

    let images = unit
        .images
        .iter()
        .map(|path| match path.to_str() {
            Some(s) if !s.contains('\0') => Ok(s.to_string()),
            Some(_) => Err(encoding_err(format!(
                "image path contains a NUL character: {}",
                path.display()
            ))),
            None => Err(encoding_err(format!(
                "image path is not valid UTF-8: {}",
                path.display()
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(prompt_with_images(prompt, &images))
}

/// True when the runner's diagnostic says the backend could not be reached.
pub fn is_connection_failure(diagnostic: &str) -> bool {
    let lower = diagnostic.to_lowercase();
    CONNECTION_MARKERS.iter().any(|m| lower.contains(m))
}

/// Map a non-zero exit onto the error taxonomy.
pub fn classify_failure(unit: &str, runner: &str, code: Option<i32>, stderr: String) -> FichaError {
    let diagnostic = stderr.trim().to_string();
    if is_connection_failure(&diagnostic) {
        FichaError::BackendUnreachable {
            runner: runner.to_string(),
            diagnostic,
        }
    } else {
        FichaError::InferenceFailed {
            unit: unit.to_string(),
            code,
            diagnostic,
        }
    }
}

/// Persist a ficha under `results_dir`, atomically.
///
/// The output is written to a temp file in the same directory and renamed
/// into place, so a crash never leaves a half-written ficha.
pub fn write_ficha(results_dir: &Path, unit: &Unit, text: &str) -> Result<PathBuf, FichaError> {
    let path = results_dir.join(unit.ficha_file_name());
    let write_err = |source: std::io::Error| FichaError::OutputWriteFailed {
        path: path.clone(),
        source,
    };

    std::fs::create_dir_all(results_dir).map_err(write_err)?;
    let mut tmp = tempfile::NamedTempFile::new_in(results_dir).map_err(write_err)?;
    tmp.write_all(text.as_bytes()).map_err(write_err)?;
    tmp.persist(&path).map_err(|e| write_err(e.error))?;

    debug!("Wrote ficha {}", path.display());
    Ok(path)
}
