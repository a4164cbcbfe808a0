//! One complete run: scan, decode, stage, aggregate, invoke, clean up.
//!
//! ## Failure policy
//!
//! A prompt or model id that can never be passed to the runner is rejected
//! up front, like a missing directory.
//!
//! A file that fails to decode, or whose text cannot be staged, is skipped
//! and recorded in [`RunOutput::skipped`]; every other file is still staged.
//! Once units are being submitted, a model failure ends the run: fichas
//! already written stay on disk, no further units are submitted. The single
//! exception is an encoding failure in per-file mode, which drops that unit
//! only (counted in [`RunStats::units_failed`]).
//!
//! The staging directory is removed on every exit path, and exactly one of
//! `Done` / `Failed` is reported through the progress callback.

use crate::config::{AggregationMode, RunConfig};
use crate::error::{ExtractionError, FichaError};
use crate::output::{FichaResult, RunOutput, RunStats};
use crate::pipeline::aggregate::{self, Unit};
use crate::pipeline::decode::{self, Decoded};
use crate::pipeline::invoke;
use crate::pipeline::scan;
use crate::pipeline::staging::{TextStore, SOURCE_SUFFIX};
use crate::progress::{NoopProgressCallback, RunProgressCallback, RunState};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Run the whole pipeline over `input_dir`, writing fichas under `output_dir`.
///
/// # Arguments
/// * `input_dir`: directory whose regular files are the sources (no recursion)
/// * `output_dir`: created if absent; receives `temp_processed/` during the
///   run and `fichas/` permanently
/// * `prompt`: instruction passed as the runner's prompt argument
/// * `config`: runner, model, mode and callback
///
/// # Errors
/// Validation errors (directories, a prompt or model id containing NUL) are
/// returned before anything is touched and fire no callbacks. Every later
/// error is reported as `Failed` first.
pub async fn run(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    prompt: &str,
    config: &RunConfig,
) -> Result<RunOutput, FichaError> {
    let (input_dir, output_dir) = (input_dir.as_ref(), output_dir.as_ref());
    invoke::validate_arguments(prompt, config.effective_model())?;
    scan::validate_dirs(input_dir, output_dir)?;
    run_validated(input_dir, output_dir, prompt, config).await
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    prompt: &str,
    config: &RunConfig,
) -> Result<RunOutput, FichaError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| FichaError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run(input_dir, output_dir, prompt, config))
}

/// Everything after validation. Always ends in `Done` or `Failed`.
pub(crate) async fn run_validated(
    input_dir: &Path,
    output_dir: &Path,
    prompt: &str,
    config: &RunConfig,
) -> Result<RunOutput, FichaError> {
    let total_start = Instant::now();
    let noop = NoopProgressCallback;
    let cb: &dyn RunProgressCallback = match &config.progress_callback {
        Some(cb) => cb.as_ref(),
        None => &noop,
    };

    info!(
        "Starting run: {} -> {} ({:?}, model {})",
        input_dir.display(),
        output_dir.display(),
        config.mode,
        config.effective_model()
    );

    let store = TextStore::at(output_dir, &config.staging_dir_name);
    let result = execute(input_dir, output_dir, prompt, config, &store, cb).await;

    // ── Cleanup ──────────────────────────────────────────────────────────
    cb.on_state_change(RunState::Cleanup);
    store.cleanup();

    match result {
        Ok(mut output) => {
            output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
            info!(
                "Run complete: {} fichas, {} files skipped, {}ms total",
                output.stats.fichas_written, output.stats.files_skipped, output.stats.total_duration_ms
            );
            cb.on_state_change(RunState::Done);
            cb.on_status("Processing complete!");
            cb.on_run_complete(Ok(output.fichas.len()));
            Ok(output)
        }
        Err(e) => {
            warn!("Run failed: {}", e);
            cb.on_state_change(RunState::Failed);
            cb.on_status(&format!("Error: {e}"));
            cb.on_run_complete(Err(&e));
            Err(e)
        }
    }
}

async fn execute(
    input_dir: &Path,
    output_dir: &Path,
    prompt: &str,
    config: &RunConfig,
    store: &TextStore,
    cb: &dyn RunProgressCallback,
) -> Result<RunOutput, FichaError> {
    let mode = config.mode;
    let mut stats = RunStats::default();

    // ── Step 1: Scan ─────────────────────────────────────────────────────
    cb.on_state_change(RunState::Scanning);
    cb.on_status("Processing files...");
    store.reset()?;
    let files = scan::scan_directory(input_dir, mode).await?;
    stats.files_found = files.len();
    info!("Found {} files in {}", files.len(), input_dir.display());

    // ── Step 2: Decode and stage ─────────────────────────────────────────
    cb.on_state_change(RunState::Decoding);
    let decode_start = Instant::now();
    let mut images = Vec::new();
    let mut skipped = Vec::new();
    for file in &files {
        let name = file.file_name();
        cb.on_status(&format!("Processing {name}..."));
        let staged = match decode::decode(file).await {
            Ok(Decoded::Text(text)) => store
                .write(&file.stem(), &text)
                .map(|_| None)
                .map_err(|e| ExtractionError::Stage {
                    file: name.clone(),
                    detail: e.to_string(),
                }),
            Ok(Decoded::Image(path)) => Ok(Some(path)),
            Err(e) => Err(e),
        };
        match staged {
            Ok(image) => {
                images.extend(image);
                stats.files_decoded += 1;
            }
            Err(e) => {
                warn!("Skipping {}: {}", name, e);
                cb.on_status(&format!("Skipping {name}: {e}"));
                cb.on_file_skipped(&e);
                skipped.push(e);
            }
        }
    }
    stats.files_skipped = skipped.len();
    stats.images_collected = images.len();
    stats.decode_duration_ms = decode_start.elapsed().as_millis() as u64;
    debug!(
        "Decoded {}/{} files in {}ms",
        stats.files_decoded, stats.files_found, stats.decode_duration_ms
    );

    // ── Step 3: Aggregate ────────────────────────────────────────────────
    cb.on_state_change(RunState::Aggregating);
    let units = aggregate::aggregate(store, mode, images)?;
    debug!("{} units to submit", units.len());

    // ── Step 4: Invoke ───────────────────────────────────────────────────
    cb.on_state_change(RunState::Invoking);
    let results_dir = output_dir.join(&config.results_dir_name);
    std::fs::create_dir_all(&results_dir).map_err(|e| FichaError::OutputWriteFailed {
        path: results_dir.clone(),
        source: e,
    })?;

    let inference_start = Instant::now();
    let total = units.len();
    let mut fichas = Vec::with_capacity(total);
    for (i, unit) in units.iter().enumerate() {
        cb.on_unit_start(&unit.id, i + 1, total);
        cb.on_status(&invoking_status(unit, mode));
        stats.units_submitted += 1;

        match invoke::invoke(unit, prompt, config).await {
            Ok(text) => {
                let path = invoke::write_ficha(&results_dir, unit, &text)?;
                cb.on_unit_complete(&unit.id, &path);
                stats.fichas_written += 1;
                fichas.push(FichaResult {
                    unit: unit.id.clone(),
                    text,
                    path,
                });
            }
            Err(e @ FichaError::Encoding { .. }) if mode == AggregationMode::PerFile => {
                warn!("Dropping unit {}: {}", unit.id, e);
                cb.on_status(&e.to_string());
                stats.units_failed += 1;
            }
            Err(e) => return Err(e),
        }
    }
    stats.inference_duration_ms = inference_start.elapsed().as_millis() as u64;

    Ok(RunOutput {
        fichas,
        skipped,
        stats,
    })
}

fn invoking_status(unit: &Unit, mode: AggregationMode) -> String {
    match mode {
        AggregationMode::PerFile => format!("Processing {}{} with LLM...", unit.id, SOURCE_SUFFIX),
        AggregationMode::Combined => "Processing combined text with LLM...".to_string(),
    }
}
