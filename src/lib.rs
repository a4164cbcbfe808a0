//! # docs2fichas
//!
//! Turn a folder of mixed source documents into bibliographic summaries
//! ("fichas") written by a locally hosted language model.
//!
//! ## Why this crate?
//!
//! Literature reviews start from a pile of PDFs, Word files and notes in
//! whatever encoding their authors used. This crate normalises all of them
//! into UTF-8 text and feeds the text to a model runner such as
//! [Ollama](https://ollama.com) through its command line, one ficha per
//! document or one ficha for the whole folder.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input dir
//!  │
//!  ├─ 1. Scan       regular files, kind by suffix (pdf / doc(x) / text / image)
//!  ├─ 2. Decode     PDF pages, Word paragraphs, text with encoding fallback
//!  ├─ 3. Stage      <output>/temp_processed/<stem>_source.txt
//!  ├─ 4. Aggregate  one unit per file, or one combined unit (+ images)
//!  ├─ 5. Invoke     `<runner> run <model> <prompt>`, unit text on stdin
//!  └─ 6. Persist    <output>/fichas/<stem>_ficha.txt | combined_ficha.txt
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docs2fichas::{run, RunConfig, DEFAULT_PROMPT};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RunConfig::default();
//!     let output = run("papers/", "out/", DEFAULT_PROMPT, &config).await?;
//!     for ficha in &output.fichas {
//!         println!("{} -> {}", ficha.unit, ficha.path.display());
//!     }
//!     eprintln!("skipped {} files", output.stats.files_skipped);
//!     Ok(())
//! }
//! ```
//!
//! Callers that must not block (a UI, a long-lived service) use
//! [`RunController`] instead, which runs on a worker thread and publishes
//! [`RunStatus`] updates.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docs2fichas` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docs2fichas = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod run;

#[cfg(all(test, unix))]
mod test_support;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AggregationMode, RunConfig, RunConfigBuilder};
pub use controller::{RunController, RunHandle, RunStatus};
pub use error::{ErrorClass, ExtractionError, FichaError};
pub use output::{FichaResult, RunOutput, RunStats};
pub use progress::{NoopProgressCallback, ProgressCallback, RunProgressCallback, RunState};
pub use prompts::DEFAULT_PROMPT;
pub use run::{run, run_sync};
