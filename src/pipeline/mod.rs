//! Pipeline stages for folder-to-ficha runs.
//!
//! Each submodule implements one step and is testable on its own; the
//! sequencing lives in [`crate::run`].
//!
//! ## Data Flow
//!
//! ```text
//! scan ──▶ decode ──▶ staging ──▶ aggregate ──▶ invoke
//! (dir)    (pdf/docx/  (_source    (units)      (runner
//!           text)       .txt)                    process)
//! ```
//!
//! 1. [`scan`]: validate directories, list regular files, detect kinds
//! 2. [`decode`]: dispatch to [`pdf`], [`docx`] or [`text`]; runs in
//!    `spawn_blocking` because parsing is CPU-bound
//! 3. [`staging`]: the Text Store holding one artifact per decoded file
//! 4. [`aggregate`]: group artifacts into per-file or combined units
//! 5. [`invoke`]: drive the model runner; the only stage with process I/O

pub mod aggregate;
pub mod decode;
pub mod docx;
pub mod invoke;
pub mod pdf;
pub mod scan;
pub mod staging;
pub mod text;
