//! Decoder: turn one [`SourceFile`] into normalized UTF-8 text or an image
//! reference, dispatching on its declared kind.
//!
//! ## Why spawn_blocking?
//!
//! PDF parsing is CPU-bound and ZIP inflation is not async-aware.
//! [`decode`] moves the whole read-and-parse step onto tokio's blocking pool
//! so the run's runtime never stalls on a large document. [`decode_blocking`]
//! is the synchronous core, used directly by tests.

use crate::error::ExtractionError;
use crate::pipeline::scan::{SourceFile, SourceKind};
use crate::pipeline::text::{decode_text, DecodeOutcome};
use crate::pipeline::{docx, pdf};
use std::path::PathBuf;
use tracing::debug;

/// Output of the decoder for one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Normalized UTF-8 text, to be staged as `<stem>_source.txt`.
    Text(String),
    /// An image, kept by path for attachment to the combined unit.
    Image(PathBuf),
}

/// Decode a source file on the blocking pool.
pub async fn decode(file: &SourceFile) -> Result<Decoded, ExtractionError> {
    let owned = file.clone();
    let name = file.file_name();
    tokio::task::spawn_blocking(move || decode_blocking(&owned))
        .await
        .map_err(|e| ExtractionError::Read {
            file: name,
            detail: format!("decode task panicked: {e}"),
        })?
}

/// Synchronous decoder. Deterministic for identical bytes.
pub fn decode_blocking(file: &SourceFile) -> Result<Decoded, ExtractionError> {
    let name = file.file_name();

    if file.kind == SourceKind::Image {
        debug!("Collected image reference: {}", file.path.display());
        return Ok(Decoded::Image(file.path.clone()));
    }

    let bytes = std::fs::read(&file.path).map_err(|e| ExtractionError::Read {
        file: name.clone(),
        detail: e.to_string(),
    })?;

    let text = match file.kind {
        SourceKind::Pdf => pdf::extract_pdf_text(&bytes)
            .map_err(|detail| ExtractionError::Pdf { file: name, detail })?,
        SourceKind::Word => docx::extract_docx_text(&bytes)
            .map_err(|detail| ExtractionError::Word { file: name, detail })?,
        SourceKind::Text | SourceKind::Unknown | SourceKind::Image => {
            let decoded = decode_text(&bytes);
            match decoded.outcome {
                DecodeOutcome::Candidate(enc) => {
                    debug!("{}: decoded as {}", name, enc.label())
                }
                DecodeOutcome::LossyUtf8 => {
                    debug!("{}: no candidate encoding matched, replaced invalid bytes", name)
                }
            }
            decoded.text
        }
    };

    Ok(Decoded::Text(text))
}
