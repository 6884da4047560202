//! CLI binary for md2slides.
//!
//! A thin shim over the library crate that maps CLI flags to `SplitConfig`
//! and a `SlideRequest`, then prints the slides.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use md2slides::{
    split, split_to_file, ModelRegistry, ProgressCallback, SlideRequest, SlideSet, SlidesError,
    SplitConfig, SplitProgressCallback,
};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Printed between slides in plain-text output.
const SLIDE_SEPARATOR: &str = "\n\n---\n\n";

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

/// Terminal progress callback: a live bar over chunks plus one log line per
/// finished chunk.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time of the chunk in flight.
    chunk_started: Mutex<Option<Instant>>,
    sections: AtomicUsize,
}

impl CliProgressCallback {
    /// The bar starts as a spinner; `on_split_start` sets its length.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Chunking document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            chunk_started: Mutex::new(None),
            sections: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Splitting");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self) -> f64 {
        self.chunk_started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl SplitProgressCallback for CliProgressCallback {
    fn on_split_start(&self, total_chunks: usize) {
        self.activate_bar(total_chunks);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Sending {total_chunks} chunks to the model…"))
        ));
    }

    fn on_chunk_start(&self, chunk: usize, _total_chunks: usize) {
        if let Ok(mut t) = self.chunk_started.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_message(format!("chunk {chunk}"));
    }

    fn on_chunk_complete(&self, chunk: usize, total_chunks: usize, sections: usize) {
        self.sections.fetch_add(sections, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            chunk,
            total_chunks,
            dim(&format!("{sections:>3} sections")),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_chunk_error(&self, chunk: usize, total_chunks: usize, error: &str) {
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}  {}",
            red("✗"),
            chunk,
            total_chunks,
            red(&msg),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.abandon();
    }

    fn on_split_complete(&self, slides: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} sections reconciled into {} slides",
            green("✔"),
            self.sections.load(Ordering::SeqCst),
            bold(&slides.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Eight slides from a markdown file (stdout, separated by ---)
  md2slides talk.md --slides 8

  # Read from stdin, use another model
  cat notes.md | md2slides - --slides 5 --model gpt-4o

  # Write the {"slides": [...]} response to a file
  md2slides talk.md --slides 12 -o slides.json

  # Replay a boundary request
  md2slides --request request.json --json

  # Local model through Ollama (no API key)
  md2slides talk.md --slides 6 --model llama3.2

  # Extra models from a JSON registry file
  md2slides talk.md --slides 6 --models models.json --model mistral-small

BUILT-IN MODELS:
  Model id              Shape           Credential
  ────────────────────  ──────────────  ──────────────
  gpt-4o-mini (default) chat messages   OPENAI_API_KEY
  gpt-4o                chat messages   OPENAI_API_KEY
  gpt-4.1-mini          chat messages   OPENAI_API_KEY
  gpt-4.1-nano          chat messages   OPENAI_API_KEY
  gemini-2.0-flash      content parts   GEMINI_API_KEY
  gemini-2.5-flash      content parts   GEMINI_API_KEY
  llama3.2              prompt          none (localhost:11434)

MODEL FILE FORMAT:
  {
    "mistral-small": {
      "endpoint": "https://api.mistral.ai/v1/chat/completions",
      "credential": { "env": "MISTRAL_API_KEY" },
      "adapter": "chat_messages",
      "provider_model": "mistral-small-latest"
    }
  }

EXIT CODES:
  0  success
  1  provider, network or malformed-response failure
  2  invalid input or configuration
"#;

/// Split a markdown document into a fixed number of slides using an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "md2slides",
    version,
    about = "Split a markdown document into a fixed number of slides using an LLM",
    long_about = "Split a markdown document into exactly N presentation slides. The document is \
chunked at headings, list items and paragraph breaks, each chunk is divided by a language model, \
and the result is merged or padded to the requested count without dropping any text.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown file, or `-` for stdin.
    input: Option<PathBuf>,

    /// Number of slides to produce (1–50).
    #[arg(short, long, env = "MD2SLIDES_SLIDES", allow_negative_numbers = true)]
    slides: Option<i64>,

    /// Model id from the registry (default: gpt-4o-mini).
    #[arg(short, long, env = "MD2SLIDES_MODEL")]
    model: Option<String>,

    /// JSON file with extra or overriding model entries.
    #[arg(long, env = "MD2SLIDES_MODELS")]
    models: Option<PathBuf>,

    /// Read a boundary request `{document, slideCount, model}` from this file.
    #[arg(long, conflicts_with = "input")]
    request: Option<PathBuf>,

    /// Maximum chunk size in characters.
    #[arg(long, env = "MD2SLIDES_CHUNK_SIZE", default_value_t = 3000)]
    chunk_size: usize,

    /// Characters of context carried into the next chunk.
    #[arg(long, env = "MD2SLIDES_OVERLAP", default_value_t = 700)]
    overlap: usize,

    /// Max model output tokens per chunk.
    #[arg(long, env = "MD2SLIDES_MAX_TOKENS", default_value_t = 3000)]
    max_tokens: usize,

    /// Sampling temperature (0.0–2.0). Provider default when unset.
    #[arg(long, env = "MD2SLIDES_TEMPERATURE")]
    temperature: Option<f32>,

    /// Retries per chunk on network errors, HTTP 429 and 5xx.
    #[arg(long, env = "MD2SLIDES_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Per-call model timeout in seconds.
    #[arg(long, env = "MD2SLIDES_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "MD2SLIDES_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Write the JSON response to this file instead of stdout.
    #[arg(short, long, env = "MD2SLIDES_OUTPUT")]
    output: Option<PathBuf>,

    /// Print the `{"slides": [...]}` response instead of plain text.
    #[arg(long, env = "MD2SLIDES_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MD2SLIDES_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2SLIDES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2SLIDES_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose brings them back.
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

    match run(&cli, show_progress).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", red("error:"), e);
            let client_error = e
                .chain()
                .find_map(|c| c.downcast_ref::<SlidesError>())
                .is_some_and(SlidesError::is_client_error);
            ExitCode::from(if client_error { 2 } else { 1 })
        }
    }
}

async fn run(cli: &Cli, show_progress: bool) -> Result<()> {
    let request = build_request(cli).await?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn SplitProgressCallback>)
    } else {
        None
    };
    let config = build_config(cli, progress_cb).await?;

    // ── Run split ────────────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let set = split_to_file(&request, output_path, &config)
            .await
            .context("Split failed")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} slides  {} chunks  {}ms  →  {}",
                green("✔"),
                set.slides.len(),
                set.stats.chunks,
                set.stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
        return Ok(());
    }

    let set = split(&request, &config).await.context("Split failed")?;
    print_slides(&set, cli.json)?;

    if !cli.quiet && !show_progress && !cli.json {
        eprintln!(
            "Split into {} slides from {} chunks in {}ms",
            set.slides.len(),
            set.stats.chunks,
            set.stats.total_duration_ms
        );
        if set.stats.remainder_appended {
            eprintln!("  {}", dim("model skipped text; remainder appended"));
        }
    }
    Ok(())
}

fn print_slides(set: &SlideSet, json: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if json {
        let text = serde_json::to_string_pretty(&set.clone().into_response())
            .context("Failed to serialise output")?;
        writeln!(handle, "{text}").context("Failed to write to stdout")?;
    } else {
        writeln!(handle, "{}", set.slides.join(SLIDE_SEPARATOR))
            .context("Failed to write to stdout")?;
    }
    Ok(())
}

/// Assemble the request from `--request` or from INPUT plus flags.
async fn build_request(cli: &Cli) -> Result<SlideRequest> {
    let mut request = if let Some(ref path) = cli.request {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read request from {:?}", path))?;
        SlideRequest::from_json(&text)?
    } else {
        let Some(ref input) = cli.input else {
            Cli::command()
                .error(
                    clap::error::ErrorKind::MissingRequiredArgument,
                    "an INPUT file (or `-` for stdin) or --request is required",
                )
                .exit();
        };
        let Some(slides) = cli.slides else {
            Cli::command()
                .error(
                    clap::error::ErrorKind::MissingRequiredArgument,
                    "--slides is required unless --request is given",
                )
                .exit();
        };
        SlideRequest::new(read_document(input).await?, slides)
    };

    if let Some(slides) = cli.slides {
        request.slide_count = slides;
    }
    if let Some(ref model) = cli.model {
        request.model = Some(model.clone());
    }
    Ok(request)
}

async fn read_document(input: &Path) -> Result<String> {
    if input.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read document from stdin")?;
        Ok(text)
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("Failed to read document from {:?}", input))
    }
}

/// Map CLI args to `SplitConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<SplitConfig> {
    let mut builder = SplitConfig::builder()
        .max_chunk_chars(cli.chunk_size)
        .overlap_chars(cli.overlap)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout);

    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref path) = cli.models {
        builder = builder.models(ModelRegistry::from_json_file(path)?);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
