//! PDF text extraction, page by page.
//!
//! Every page contributes its text followed by a newline. A page with no
//! extractable text (scanned image, blank separator) still contributes the
//! newline, so page boundaries survive in the staged text.
//!
//! `pdf-extract` can panic on malformed content streams. The call is wrapped
//! in `catch_unwind` so a hostile file is reported as a decode failure for
//! that file only.

use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

/// Extract text from PDF bytes, one newline-terminated block per page.
///
/// # Errors
/// Returns a human-readable detail string when the document cannot be parsed.
pub fn extract_pdf_text(pdf_bytes: &[u8]) -> Result<String, String> {
    let pages = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
    }))
    .map_err(|payload| format!("PDF parser panicked: {}", panic_message(&*payload)))?
    .map_err(|e| e.to_string())?;

    debug!("Extracted {} PDF pages", pages.len());
    Ok(join_pages(&pages))
}

/// Join page texts, terminating each page with a newline.
pub(crate) fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    let mut out = String::with_capacity(pages.iter().map(|p| p.as_ref().len() + 1).sum());
    for page in pages {
        out.push_str(page.as_ref());
        out.push('\n');
    }
    out
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pages_contribute_an_empty_line() {
        let joined = join_pages(&["first", "", "third"]);
        assert_eq!(joined, "first\n\nthird\n");
    }

    #[test]
    fn no_pages_yields_empty_text() {
        let joined = join_pages::<&str>(&[]);
        assert_eq!(joined, "");
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(extract_pdf_text(b"definitely not a pdf").is_err());
    }

    #[test]
    fn truncated_header_is_an_error() {
        assert!(extract_pdf_text(b"%PDF-1.4\n%%EOF").is_err());
    }
}
