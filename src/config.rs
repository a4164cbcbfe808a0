//! Configuration types for a document-to-ficha run.
//!
//! All run behaviour is controlled through [`RunConfig`], built via its
//! [`RunConfigBuilder`]. The config is handed to the
//! [`crate::controller::RunController`] at construction time; nothing in the
//! pipeline reads process-wide mutable state.

use crate::error::FichaError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};

/// Default model-runner executable.
pub const DEFAULT_RUNNER: &str = "ollama";

/// Model used in per-file mode when no model is configured.
pub const DEFAULT_TEXT_MODEL: &str = "MyModel:latest";

/// Vision model used in combined (multimodal) mode when no model is configured.
pub const DEFAULT_VISION_MODEL: &str = "qwen2.5vl:latest";

/// Configuration for a run.
///
/// Built via [`RunConfig::builder()`] or using [`RunConfig::default()`].
///
/// # Example
/// ```rust
/// use docs2fichas::{AggregationMode, RunConfig};
///
/// let config = RunConfig::builder()
///     .mode(AggregationMode::Combined)
///     .model("llava:latest")
///     .max_retries(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.effective_model(), "llava:latest");
/// ```
#[derive(Clone)]
pub struct RunConfig {
    /// Executable invoked as `<runner> run <model> <prompt>`. Default: `ollama`.
    pub runner: String,

    /// Model identifier passed to the runner.
    /// If None, uses [`AggregationMode::default_model`].
    pub model: Option<String>,

    /// How staged text is grouped into units. Default: [`AggregationMode::PerFile`].
    pub mode: AggregationMode,

    /// Retries when the backend is unreachable. Default: 0.
    ///
    /// Only connection failures are retried; every other model failure is
    /// surfaced immediately.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Staging directory created under the output directory. Default: `temp_processed`.
    pub staging_dir_name: String,

    /// Results directory created under the output directory. Default: `fichas`.
    pub results_dir_name: String,

    /// Receives state and status events while the run progresses.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            runner: DEFAULT_RUNNER.to_string(),
            model: None,
            mode: AggregationMode::default(),
            max_retries: 0,
            retry_backoff_ms: 500,
            staging_dir_name: "temp_processed".to_string(),
            results_dir_name: "fichas".to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("runner", &self.runner)
            .field("model", &self.model)
            .field("mode", &self.mode)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("staging_dir_name", &self.staging_dir_name)
            .field("results_dir_name", &self.results_dir_name)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RunProgressCallback>"),
            )
            .finish()
    }
}

impl RunConfig {
    /// Create a new builder for `RunConfig`.
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model identifier actually passed to the runner.
    pub fn effective_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.mode.default_model())
    }
}

/// Builder for [`RunConfig`].
#[derive(Debug)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    pub fn runner(mut self, runner: impl Into<String>) -> Self {
        self.config.runner = runner.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn mode(mut self, mode: AggregationMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Shorthand for combined mode (`true`) or per-file mode (`false`).
    pub fn multimodal(mut self, on: bool) -> Self {
        self.config.mode = if on {
            AggregationMode::Combined
        } else {
            AggregationMode::PerFile
        };
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn staging_dir_name(mut self, name: impl Into<String>) -> Self {
        self.config.staging_dir_name = name.into();
        self
    }

    pub fn results_dir_name(mut self, name: impl Into<String>) -> Self {
        self.config.results_dir_name = name.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RunConfig, FichaError> {
        let c = &self.config;
        if c.runner.trim().is_empty() {
            return Err(FichaError::InvalidConfig("Runner must not be empty".into()));
        }
        if matches!(c.model.as_deref(), Some(m) if m.trim().is_empty()) {
            return Err(FichaError::InvalidConfig("Model must not be empty".into()));
        }
        for (label, name) in [
            ("staging", &c.staging_dir_name),
            ("results", &c.results_dir_name),
        ] {
            if !is_single_component(name) {
                return Err(FichaError::InvalidConfig(format!(
                    "The {label} directory name must be a single path component, got '{name}'"
                )));
            }
        }
        if c.staging_dir_name == c.results_dir_name {
            return Err(FichaError::InvalidConfig(
                "Staging and results directories must differ".into(),
            ));
        }
        Ok(self.config)
    }
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Strategy for grouping staged text into model requests.
///
/// | Mode | Units per run | Images |
/// |------|---------------|--------|
/// | `PerFile`  | one per decoded file | never (image suffixes are read as text) |
/// | `Combined` | exactly one | attached to the single unit |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AggregationMode {
    /// One unit per source file, text only. (default)
    #[default]
    PerFile,
    /// All text merged into a single unit; image files are attached to it.
    Combined,
}

impl AggregationMode {
    /// Whether image suffixes are recognised as images.
    pub fn is_multimodal(self) -> bool {
        matches!(self, AggregationMode::Combined)
    }

    /// Model used when the config does not name one.
    pub fn default_model(self) -> &'static str {
        match self {
            AggregationMode::PerFile => DEFAULT_TEXT_MODEL,
            AggregationMode::Combined => DEFAULT_VISION_MODEL,
        }
    }
}
