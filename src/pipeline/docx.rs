//! Word (`.docx`) paragraph extraction.
//!
//! A `.docx` file is a ZIP archive; the body lives in `word/document.xml`
//! as WordprocessingML. We walk its tags once and collect, for every
//! body-level `<w:p>`, the text of its `<w:t>` runs. Paragraphs are joined
//! with `\n` in document order, empty ones included.
//!
//! Rules that mirror how Word presents paragraph text:
//! - `<w:tab/>` → `\t`, `<w:br/>` and `<w:cr/>` → `\n` (inside runs only)
//! - paragraphs inside tables (`<w:tbl>`) are not body paragraphs
//! - paragraphs nested inside another paragraph (text boxes) are skipped
//!
//! Legacy binary `.doc` files are not ZIP archives and fail with a
//! descriptive error.

use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{Cursor, Read};

const DOCUMENT_XML: &str = "word/document.xml";

static RE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(/?)([A-Za-z][\w.\-]*(?::[\w.\-]+)?)\b[^>]*?(/?)>").unwrap());

static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#x[0-9A-Fa-f]+|#[0-9]+|amp|lt|gt|quot|apos);").unwrap());

/// Extract paragraph text from `.docx` bytes.
///
/// # Errors
/// Returns a human-readable detail string for non-ZIP input, a missing
/// `word/document.xml` part, or a part that is not valid UTF-8.
pub fn extract_docx_text(docx_bytes: &[u8]) -> Result<String, String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(docx_bytes))
        .map_err(|e| format!("not a valid .docx (ZIP) archive: {e}"))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_XML)
        .map_err(|e| format!("missing {DOCUMENT_XML}: {e}"))?
        .read_to_string(&mut xml)
        .map_err(|e| format!("failed to read {DOCUMENT_XML}: {e}"))?;

    Ok(paragraphs_from_xml(&xml).join("\n"))
}

/// Collect body-level paragraph texts from WordprocessingML.
pub(crate) fn paragraphs_from_xml(xml: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut table_depth = 0usize;
    let mut para_depth = 0usize;
    let mut in_text = false;
    let mut in_run = false;
    let mut cursor = 0usize;

    for caps in RE_TAG.captures_iter(xml) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());

        // Character data between the previous tag and this one.
        if in_text && table_depth == 0 && para_depth == 1 {
            current.push_str(&unescape(&xml[cursor..whole.start]));
        }
        cursor = whole.end;

        let closing = !caps[1].is_empty();
        let self_closing = !caps[3].is_empty();
        let name = &caps[2];

        match (name, closing, self_closing) {
            ("w:tbl", false, false) => table_depth += 1,
            ("w:tbl", true, _) => table_depth = table_depth.saturating_sub(1),
            ("w:p", false, true) => {
                if table_depth == 0 && para_depth == 0 {
                    paragraphs.push(String::new());
                }
            }
            ("w:p", false, false) => {
                para_depth += 1;
                if para_depth == 1 {
                    current.clear();
                }
            }
            ("w:p", true, _) => {
                if para_depth == 1 && table_depth == 0 {
                    paragraphs.push(std::mem::take(&mut current));
                }
                para_depth = para_depth.saturating_sub(1);
            }
            ("w:r", false, false) => in_run = true,
            ("w:r", true, _) => in_run = false,
            ("w:t", false, false) => in_text = true,
            ("w:t", true, _) => in_text = false,
            ("w:tab", false, _) if in_run && para_depth == 1 && table_depth == 0 => {
                current.push('\t')
            }
            ("w:br" | "w:cr", false, _) if in_run && para_depth == 1 && table_depth == 0 => {
                current.push('\n')
            }
            _ => {}
        }
    }

    paragraphs
}

/// Replace the five predefined XML entities and numeric character references.
fn unescape(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    RE_ENTITY
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ if entity.starts_with("#x") => {
                    u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
                }
                _ => entity[1..].parse::<u32>().ok().and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn wrap_body(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr/></w:body></w:document>"#
        )
    }

    fn make_docx(document_xml: &str) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let opts = zip::write::SimpleFileOptions::default();
            zip.start_file("[Content_Types].xml", opts).unwrap();
            zip.write_all(b"<Types/>").unwrap();
            zip.start_file(DOCUMENT_XML, opts).unwrap();
            zip.write_all(document_xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn paragraphs_in_order_joined_by_newline() {
        let xml = wrap_body(
            r#"<w:p><w:pPr><w:pStyle w:val="Title"/></w:pPr><w:r><w:t>Title here</w:t></w:r></w:p><w:p><w:r><w:t xml:space="preserve">Hello </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>world</w:t></w:r></w:p>"#,
        );
        let text = extract_docx_text(&make_docx(&xml)).unwrap();
        assert_eq!(text, "Title here\nHello world");
    }

    #[test]
    fn empty_paragraphs_are_kept() {
        let xml = wrap_body(r#"<w:p><w:r><w:t>a</w:t></w:r></w:p><w:p/><w:p></w:p><w:p><w:r><w:t>b</w:t></w:r></w:p>"#);
        assert_eq!(paragraphs_from_xml(&xml), vec!["a", "", "", "b"]);
    }

    #[test]
    fn tabs_breaks_and_entities() {
        let xml = wrap_body(
            r#"<w:p><w:r><w:t>A&amp;B</w:t><w:tab/><w:t>&lt;x&gt;</w:t><w:br/><w:t>&#231;&#xE3;o</w:t></w:r></w:p>"#,
        );
        assert_eq!(paragraphs_from_xml(&xml), vec!["A&B\t<x>\nção"]);
    }

    #[test]
    fn table_paragraphs_are_excluded() {
        let xml = wrap_body(
            r#"<w:p><w:r><w:t>before</w:t></w:r></w:p><w:tbl><w:tblPr/><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl><w:p><w:r><w:t>after</w:t></w:r></w:p>"#,
        );
        assert_eq!(paragraphs_from_xml(&xml), vec!["before", "after"]);
    }

    #[test]
    fn tab_stop_definitions_are_not_tabs() {
        let xml = wrap_body(
            r#"<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>x</w:t></w:r></w:p>"#,
        );
        assert_eq!(paragraphs_from_xml(&xml), vec!["x"]);
    }

    #[test]
    fn not_a_zip_is_an_error() {
        let err = extract_docx_text(b"\xD0\xCF\x11\xE0legacy doc").unwrap_err();
        assert!(err.contains("ZIP"), "got: {err}");
    }

    #[test]
    fn zip_without_document_part_is_an_error() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        let err = extract_docx_text(&buf.into_inner()).unwrap_err();
        assert!(err.contains(DOCUMENT_XML), "got: {err}");
    }

    #[test]
    fn unescape_leaves_unknown_entities() {
        assert_eq!(unescape("a &nbsp; b &amp; c"), "a &nbsp; b & c");
    }
}
