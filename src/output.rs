//! Result types returned by a completed run.

use crate::error::ExtractionError;
use serde::Serialize;
use std::path::PathBuf;

/// The complete result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    /// One entry per unit that produced a ficha, in submission order.
    pub fichas: Vec<FichaResult>,

    /// Source files that could not be decoded or staged, in scan order.
    pub skipped: Vec<ExtractionError>,

    pub stats: RunStats,
}

/// A ficha written to the results directory.
#[derive(Debug, Clone, Serialize)]
pub struct FichaResult {
    /// Unit identity: the source stem, or `combined`.
    pub unit: String,

    /// Verbatim model output.
    pub text: String,

    /// Where the ficha was written.
    pub path: PathBuf,
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    /// Regular files found directly under the input directory.
    pub files_found: usize,
    /// Files decoded into a staged artifact or image reference.
    pub files_decoded: usize,
    /// Files skipped because decoding or staging failed.
    pub files_skipped: usize,
    /// Image references attached to the combined unit.
    pub images_collected: usize,
    /// Units handed to the invoker, including ones dropped for encoding.
    pub units_submitted: usize,
    /// Units dropped without a ficha (per-file encoding failures).
    pub units_failed: usize,
    pub fichas_written: usize,

    pub decode_duration_ms: u64,
    pub inference_duration_ms: u64,
    pub total_duration_ms: u64,
}
