//! CLI binary for docs2fichas.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `RunConfig`, starts a run through `RunController` and renders its
//! status updates.

use anyhow::{Context, Result};
use clap::Parser;
use docs2fichas::{
    ErrorClass, ExtractionError, FichaError, ProgressCallback, RunConfig, RunController,
    RunProgressCallback, RunState, DEFAULT_PROMPT,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner carrying the current status line,
/// plus one log line per skipped file and per written ficha.
struct CliProgressCallback {
    bar: ProgressBar,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Ready");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            skipped: AtomicUsize::new(0),
        })
    }

    fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }
}

impl RunProgressCallback for CliProgressCallback {
    fn on_state_change(&self, state: RunState) {
        let prefix = match state {
            RunState::Idle => "Ready",
            RunState::Scanning => "Scanning",
            RunState::Decoding => "Decoding",
            RunState::Aggregating => "Aggregating",
            RunState::Invoking => "Model",
            RunState::Cleanup => "Cleanup",
            RunState::Done | RunState::Failed => {
                self.bar.finish_and_clear();
                return;
            }
        };
        self.bar.set_prefix(prefix);
    }

    fn on_file_skipped(&self, error: &ExtractionError) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!("  {} {}", red("✗"), red(&error.to_string())));
    }

    fn on_unit_start(&self, unit: &str, index: usize, total: usize) {
        self.bar.set_prefix(format!("Model {index}/{total}"));
        self.bar.println(format!("{} {}", cyan("◆"), bold(&format!("Submitting {unit}…"))));
    }

    fn on_unit_complete(&self, unit: &str, ficha_path: &Path) {
        self.bar.println(format!(
            "  {} {:<24}  {}",
            green("✓"),
            unit,
            dim(&ficha_path.display().to_string())
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One ficha per document, default model (MyModel:latest)
  docs2fichas papers/ out/

  # One combined ficha for the whole folder, images attached
  docs2fichas --multimodal papers/ out/

  # Custom model and prompt
  docs2fichas --model llama3.1:8b --prompt-file prompt.txt papers/ out/

  # JSON summary of the run
  docs2fichas --json papers/ out/ > run.json

OUTPUT LAYOUT:
  out/temp_processed/<stem>_source.txt   staged text (removed after the run)
  out/fichas/<stem>_ficha.txt            per-file mode
  out/fichas/combined_ficha.txt          multimodal (combined) mode

SUPPORTED INPUTS:
  .pdf                          text extracted page by page
  .doc .docx                    paragraph text (.doc is reported and skipped)
  .jpeg .jpg .png .tif .tiff    attached as images (multimodal mode only)
  anything else                 read as text (UTF-8, then Latin-1 / cp1252)

SETUP:
  1. Start the backend:  ollama serve
  2. Pull a model:       ollama pull qwen2.5vl
  3. Run:                docs2fichas papers/ out/
"#;

/// Turn a folder of documents into bibliographic fichas with a local LLM.
#[derive(Parser, Debug)]
#[command(
    name = "docs2fichas",
    version,
    about = "Turn a folder of PDF/Word/text documents into bibliographic fichas with a local LLM",
    long_about = "Extract text from every PDF, Word and text file in a folder, normalise it to \
UTF-8 and submit it to a local model runner (Ollama by default) to write bibliographic fichas.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Folder containing the source documents (not searched recursively).
    #[arg(env = "DOCS2FICHAS_INPUT")]
    input_dir: PathBuf,

    /// Folder receiving `fichas/` (created if absent).
    #[arg(env = "DOCS2FICHAS_OUTPUT")]
    output_dir: PathBuf,

    /// Instruction passed to the model.
    #[arg(long, env = "DOCS2FICHAS_PROMPT", conflicts_with = "prompt_file")]
    prompt: Option<String>,

    /// Read the instruction from a UTF-8 text file.
    #[arg(long, env = "DOCS2FICHAS_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Model runner executable, invoked as `<runner> run <model> <prompt>`.
    #[arg(long, env = "DOCS2FICHAS_RUNNER", default_value = "ollama")]
    runner: String,

    /// Model ID. Default: MyModel:latest, or qwen2.5vl:latest with --multimodal.
    #[arg(long, env = "DOCS2FICHAS_MODEL")]
    model: Option<String>,

    /// Combine all documents into one unit and attach image files.
    #[arg(long, env = "DOCS2FICHAS_MULTIMODAL")]
    multimodal: bool,

    /// Retries when the model backend is unreachable.
    #[arg(long, env = "DOCS2FICHAS_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Initial retry delay in milliseconds (doubles on each retry).
    #[arg(long, env = "DOCS2FICHAS_RETRY_BACKOFF_MS", default_value_t = 500)]
    retry_backoff_ms: u64,

    /// Print the run result (fichas, skipped files, stats) as JSON.
    #[arg(long, env = "DOCS2FICHAS_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "DOCS2FICHAS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCS2FICHAS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCS2FICHAS_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active; the
    // status line carries the same information.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress.clone().map(|cb| cb as ProgressCallback),
    )?;
    let prompt = load_prompt(&cli).await?;

    // ── Start the run ────────────────────────────────────────────────────
    let controller = RunController::new(config);
    let handle = controller
        .start_run(&cli.input_dir, &cli.output_dir, prompt)
        .context("Run rejected")?;

    let mut statuses = handle.status_stream();
    while let Some(status) = statuses.next().await {
        match &progress {
            Some(cb) => cb.set_message(&status.message),
            None if !cli.quiet && !cli.json => eprintln!("{}", dim(&status.message)),
            None => {}
        }
        if status.state.is_terminal() {
            break;
        }
    }

    let result = handle.wait().await;

    // ── Report ───────────────────────────────────────────────────────────
    let output = match result {
        Ok(output) => output,
        Err(e) => {
            if e.class() == ErrorClass::Connection && !cli.quiet {
                eprintln!("{} {}", red("✘"), bold("Model backend unreachable"));
            }
            return Err(report_error(e));
        }
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        let s = &output.stats;
        eprintln!(
            "{}  {} fichas  {}/{} files decoded  {}ms  →  {}",
            if s.files_skipped == 0 && s.units_failed == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            bold(&s.fichas_written.to_string()),
            s.files_decoded,
            s.files_found,
            s.total_duration_ms,
            bold(&cli.output_dir.join("fichas").display().to_string()),
        );
        if s.files_skipped > 0 {
            eprintln!("   {} files skipped", red(&s.files_skipped.to_string()));
        }
        if s.units_failed > 0 {
            eprintln!("   {} units dropped (encoding)", red(&s.units_failed.to_string()));
        }
    }

    Ok(())
}

/// Map CLI args to `RunConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<RunConfig> {
    let mut builder = RunConfig::builder()
        .runner(cli.runner.clone())
        .multimodal(cli.multimodal)
        .max_retries(cli.max_retries)
        .retry_backoff_ms(cli.retry_backoff_ms);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Resolve the prompt from `--prompt`, `--prompt-file` or the default.
async fn load_prompt(cli: &Cli) -> Result<String> {
    if let Some(ref prompt) = cli.prompt {
        return Ok(prompt.clone());
    }
    if let Some(ref path) = cli.prompt_file {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path));
    }
    Ok(DEFAULT_PROMPT.to_string())
}

fn report_error(e: FichaError) -> anyhow::Error {
    let class = e.class();
    anyhow::Error::new(e).context(format!("Run failed ({class:?} error)"))
}
