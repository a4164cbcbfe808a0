//! Plain-text decoding with a prioritized list of candidate encodings.
//!
//! Attempts run in the fixed order of [`CANDIDATE_ENCODINGS`]; the first
//! candidate that accepts every byte wins. When none does, the terminal step
//! decodes as UTF-8 with U+FFFD substituted for undecodable bytes, so this
//! path always yields text.
//!
//! Latin-1 maps every byte to a code point, so in practice any input that is
//! not valid UTF-8 is read as Latin-1 and the later candidates are reached
//! only if the list is reordered. The list and the fallback are kept explicit
//! so the precedence stays visible and testable.

use serde::{Deserialize, Serialize};

/// A single-byte or UTF-8 text encoding the decoder can attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextEncoding {
    Utf8,
    Latin1,
    Windows1252,
    Iso8859_1,
}

/// Attempt order for text files.
pub const CANDIDATE_ENCODINGS: [TextEncoding; 4] = [
    TextEncoding::Utf8,
    TextEncoding::Latin1,
    TextEncoding::Windows1252,
    TextEncoding::Iso8859_1,
];

/// Which step of the attempt list produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeOutcome {
    /// A candidate decoded every byte.
    Candidate(TextEncoding),
    /// No candidate succeeded; undecodable bytes were replaced with U+FFFD.
    LossyUtf8,
}

/// Result of [`decode_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDecoding {
    pub text: String,
    pub outcome: DecodeOutcome,
}

// Windows-1252 code points for 0x80..=0x9F. `None` marks the five bytes the
// code page leaves undefined; decoding fails on them.
const CP1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), None,             Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None,             Some('\u{017D}'), None,
    None,             Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None,             Some('\u{017E}'), Some('\u{0178}'),
];

impl TextEncoding {
    /// Decode `bytes` strictly; `None` if any byte is not representable.
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_owned),
            TextEncoding::Latin1 | TextEncoding::Iso8859_1 => {
                Some(bytes.iter().map(|&b| char::from(b)).collect())
            }
            TextEncoding::Windows1252 => bytes
                .iter()
                .map(|&b| match b {
                    0x80..=0x9F => CP1252_HIGH[usize::from(b - 0x80)],
                    _ => Some(char::from(b)),
                })
                .collect(),
        }
    }

    /// Canonical label, as used in status and log lines.
    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Windows1252 => "cp1252",
            TextEncoding::Iso8859_1 => "iso-8859-1",
        }
    }
}

/// Decode bytes with the default candidate order.
pub fn decode_text(bytes: &[u8]) -> TextDecoding {
    decode_text_with(bytes, &CANDIDATE_ENCODINGS)
}

/// Decode bytes trying `candidates` in order, then the lossy UTF-8 fallback.
pub fn decode_text_with(bytes: &[u8], candidates: &[TextEncoding]) -> TextDecoding {
    candidates
        .iter()
        .find_map(|enc| {
            enc.decode(bytes).map(|text| TextDecoding {
                text,
                outcome: DecodeOutcome::Candidate(*enc),
            })
        })
        .unwrap_or_else(|| TextDecoding {
            text: String::from_utf8_lossy(bytes).into_owned(),
            outcome: DecodeOutcome::LossyUtf8,
        })
}
