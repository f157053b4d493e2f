//! CLI binary for edgequake-pdf-annotate.
//!
//! A thin shim over the library crate: maps flags to `AnnotatorConfig`,
//! writes generation events to stdout as NDJSON and keeps progress and logs
//! on stderr.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdf_annotate::pipeline::input::{annotated_output_path, load_document};
use edgequake_pdf_annotate::{
    annotate_stream, inspect_page_count, parse_page_annotations, render_pdf, AnnotationEvent,
    AnnotatorConfig, OllamaClient, PageAnnotation, PageRange,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Check that Ollama is running and list installed models
  pdfannotate check

  # Stream annotations for pages 1-3 as NDJSON, keep them in a file
  pdfannotate annotate play.pdf -i "Define archaic words and flag themes" \
      --from 1 --to 3 -o play.annotations.json

  # Annotate and render in one go (writes play_annotated.pdf)
  pdfannotate annotate play.pdf -i "Explain every literary device" --render

  # Render previously saved annotations
  pdfannotate render play.pdf --annotations play.annotations.json

  # Page count only (no model needed)
  pdfannotate inspect play.pdf

  # Use a hosted model through edgequake-llm
  pdfannotate --provider openai --model gpt-4.1-mini annotate play.pdf -i "..."

ANNOTATION TYPES:
  definition  DEF   teal      question  Q?   amber     reaction  RXN  violet
  device      LIT   blue      theme     THM  orange    notation  NB   slate
  summary     SUM   green

ENVIRONMENT VARIABLES:
  OLLAMA_HOST             Ollama base URL (default http://localhost:11434)
  OLLAMA_MODEL            Default model (default llama3.2)
  EDGEQUAKE_LLM_PROVIDER  Use a hosted provider instead of Ollama
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Override log filtering
"#;

/// Annotate PDF pages with a language model and draw the notes in the margin.
#[derive(Parser, Debug)]
#[command(
    name = "pdfannotate",
    version,
    about = "Annotate PDF pages with an LLM and render margin callouts",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Model identifier.
    #[arg(long, global = true, env = "OLLAMA_MODEL", default_value = "llama3.2")]
    model: String,

    /// Ollama base URL.
    #[arg(long, global = true, env = "OLLAMA_HOST", default_value = "http://localhost:11434")]
    ollama_host: String,

    /// Hosted provider (openai, anthropic, gemini, …). Omit for Ollama.
    #[arg(long, global = true, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "PDFANNOTATE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFANNOTATE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the event stream.
    #[arg(short, long, global = true, env = "PDFANNOTATE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate annotations, streaming events to stdout as NDJSON.
    Annotate(AnnotateArgs),
    /// Draw saved annotations onto a copy of the PDF.
    Render(RenderArgs),
    /// Print the page count.
    Inspect {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
        /// Print `{"pages": N}` instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Check that the Ollama server is reachable.
    Check,
}

#[derive(Args, Debug, Clone, Copy)]
struct RangeArgs {
    /// First page (1-based).
    #[arg(long, default_value_t = 1)]
    from: usize,
    /// Last page (inclusive). Default: last page of the document.
    #[arg(long)]
    to: Option<usize>,
}

impl From<RangeArgs> for PageRange {
    fn from(r: RangeArgs) -> Self {
        PageRange::new(r.from, r.to)
    }
}

#[derive(Args, Debug)]
struct AnnotateArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// What to annotate, in plain language.
    #[arg(short, long, required_unless_present = "instructions_file")]
    instructions: Option<String>,

    /// Read the instructions from a text file.
    #[arg(long, conflicts_with = "instructions")]
    instructions_file: Option<PathBuf>,

    #[command(flatten)]
    range: RangeArgs,

    /// Write the collected annotations (JSON array) to this file.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also render the annotated PDF when generation finishes.
    #[arg(long)]
    render: bool,

    /// Rendered PDF path. Default: <stem>_annotated.pdf.
    #[arg(long, requires = "render")]
    pdf_out: Option<PathBuf>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "PDFANNOTATE_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max tokens generated per page.
    #[arg(long, env = "PDFANNOTATE_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Per-page model timeout in seconds.
    #[arg(long, env = "PDFANNOTATE_API_TIMEOUT", default_value_t = 180)]
    api_timeout: u64,

    /// Page text beyond this many characters is truncated.
    #[arg(long, default_value_t = 4000)]
    max_page_chars: usize,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// JSON array of annotations, each with its `page`.
    #[arg(short, long)]
    annotations: PathBuf,

    #[command(flatten)]
    range: RangeArgs,

    /// Output path. Default: <stem>_annotated.pdf.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active.
    let show_progress =
        !cli.quiet && !cli.no_progress && matches!(cli.command, Command::Annotate(_));
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

    match &cli.command {
        Command::Annotate(args) => run_annotate(&cli, args, show_progress).await,
        Command::Render(args) => run_render(&cli, args).await,
        Command::Inspect { input, json } => run_inspect(input, *json).await,
        Command::Check => run_check(&cli).await,
    }
}

/// Map CLI args to `AnnotatorConfig`.
fn build_config(cli: &Cli, args: Option<&AnnotateArgs>) -> Result<AnnotatorConfig> {
    let mut builder = AnnotatorConfig::builder()
        .model(cli.model.clone())
        .ollama_host(cli.ollama_host.clone());
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(args) = args {
        builder = builder
            .temperature(args.temperature)
            .max_tokens(args.max_tokens)
            .api_timeout_secs(args.api_timeout)
            .max_page_chars(args.max_page_chars);
    }
    builder.build().context("Invalid configuration")
}

async fn run_annotate(cli: &Cli, args: &AnnotateArgs, show_progress: bool) -> Result<()> {
    let instructions = match (&args.instructions, &args.instructions_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instructions from {:?}", path))?,
        (None, None) => bail!("No instructions provided"),
    };
    let config = build_config(cli, Some(args))?;
    let range = PageRange::from(args.range);

    let bar = show_progress.then(progress_bar);
    let mut stream = annotate_stream(&args.input, &instructions, range, &config)
        .await
        .context("Annotation failed")?;

    let stdout = io::stdout();
    let mut records: Vec<PageAnnotation> = Vec::new();
    let mut failure: Option<String> = None;

    while let Some(event) = stream.next().await {
        {
            let mut out = stdout.lock();
            let line = serde_json::to_string(&event).context("Failed to serialise event")?;
            writeln!(out, "{line}").context("Failed to write to stdout")?;
            out.flush().ok();
        }

        match &event {
            AnnotationEvent::Progress { pct, label } => {
                if let Some(ref bar) = bar {
                    bar.set_position(u64::from(*pct));
                    bar.set_message(label.clone());
                }
            }
            AnnotationEvent::Annotation { .. } => {
                if let Some(record) = event.page_annotation() {
                    if let Some(ref bar) = bar {
                        bar.println(format!(
                            "  {} p{:<3} {:<10} {}",
                            green("✓"),
                            record.page,
                            record.annotation.kind.as_str(),
                            dim(&preview(&record.annotation.annotation, 60)),
                        ));
                    }
                    records.push(record);
                }
            }
            AnnotationEvent::Error { message } => failure = Some(message.clone()),
            AnnotationEvent::PageStart { .. } | AnnotationEvent::Done => {}
        }
    }

    if let Some(message) = failure {
        if let Some(ref bar) = bar {
            bar.abandon();
        }
        eprintln!("{} {}", red("✘"), message);
        bail!("Annotation stopped after {} record(s)", records.len());
    }

    if let Some(ref path) = args.output {
        let json = serde_json::to_string_pretty(&records).context("Failed to serialise annotations")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write {:?}", path))?;
    }

    if !cli.quiet {
        let line = format!("{} {} annotation(s)", green("✔"), bold(&records.len().to_string()));
        match bar {
            Some(ref bar) => bar.println(line),
            None => eprintln!("{line}"),
        }
    }

    if args.render {
        let out = args
            .pdf_out
            .clone()
            .unwrap_or_else(|| annotated_output_path(&args.input));
        let bytes = load_document(&args.input, config.api_timeout_secs)
            .await
            .context("Failed to reload PDF")?;
        match bar {
            Some(ref bar) => {
                bar.set_position(96);
                bar.set_message("Building annotated PDF…");
            }
            None if !cli.quiet => eprintln!("{}", dim("Building annotated PDF…")),
            None => {}
        }
        let rendered = render_pdf(bytes, &records, range, &config.layout)
            .await
            .context("PDF render error")?;
        write_pdf(&out, &rendered).await?;
        if let Some(ref bar) = bar {
            bar.set_position(100);
            bar.set_message("Done");
        }
        if !cli.quiet {
            eprintln!("{} {}", green("✔"), bold(&out.display().to_string()));
        }
    }

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    Ok(())
}

async fn run_render(cli: &Cli, args: &RenderArgs) -> Result<()> {
    let config = build_config(cli, None)?;
    let json = tokio::fs::read_to_string(&args.annotations)
        .await
        .with_context(|| format!("Failed to read {:?}", args.annotations))?;
    let records = parse_page_annotations(&json)?;
    let bytes = load_document(&args.input, config.api_timeout_secs)
        .await
        .context("Failed to load PDF")?;

    let rendered = render_pdf(bytes, &records, args.range.into(), &config.layout)
        .await
        .context("PDF render error")?;
    let out = args
        .output
        .clone()
        .unwrap_or_else(|| annotated_output_path(&args.input));
    write_pdf(&out, &rendered).await?;

    if !cli.quiet {
        eprintln!(
            "{} {} annotation(s)  →  {}",
            green("✔"),
            records.len(),
            bold(&out.display().to_string())
        );
    }
    Ok(())
}

async fn run_inspect(input: &str, json: bool) -> Result<()> {
    let bytes = load_document(input, 120).await.context("Failed to load PDF")?;
    let pages = inspect_page_count(bytes).await.context("Failed to inspect PDF")?;
    if json {
        println!("{}", serde_json::json!({ "pages": pages }));
    } else {
        println!("File:   {}", input);
        println!("Pages:  {}", pages);
    }
    Ok(())
}

async fn run_check(cli: &Cli) -> Result<()> {
    let config = build_config(cli, None)?;
    let client = OllamaClient::from_config(&config)?;
    match client.probe().await {
        Ok(models) => {
            println!("{} Ollama ready at {}", green("✔"), client.host());
            for model in models {
                let marker = if model.starts_with(&config.model) { "*" } else { " " };
                println!("  {marker} {model}");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{} Ollama offline at {}: {}", red("✘"), client.host(), e);
            bail!("Run: ollama serve")
        }
    }
}

async fn write_pdf(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write {:?}", path))
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}  ⏱ {elapsed_precise}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
    bar.set_style(style);
    bar.set_prefix("Annotating");
    bar.set_message("Reading PDF…");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn preview(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}\u{2026}", text.chars().take(max - 1).collect::<String>())
    } else {
        text.to_string()
    }
}
