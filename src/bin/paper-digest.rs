//! CLI binary for paper-digest.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `DigestConfig`, drives a digest run and prints the report.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use paper_digest::{
    digest_new_paper, inspect_sections, DigestConfig, DigestProgressCallback, DigestReport,
    DocumentDelivery, ProgressCallback, SectionTree, SqliteStore, SummaryMode, SummaryStore,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per finished unit.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Unit index → (start time, title).
    started: Mutex<HashMap<usize, (Instant, String)>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_digest_start` tells us how many units there are.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} units  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Summarizing");
        self.bar.reset_eta();
    }

    fn finish_unit(&self, index: usize) -> (String, f64) {
        let (start, title) = self
            .started
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .unwrap_or_else(|| (Instant::now(), String::new()));
        (title, start.elapsed().as_secs_f64())
    }
}

impl DigestProgressCallback for CliProgressCallback {
    fn on_digest_start(&self, total_units: usize) {
        self.activate_bar(total_units);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Summarizing {total_units} units…"))
        ));
    }

    fn on_unit_start(&self, index: usize, _total: usize, title: &str) {
        if let Ok(mut m) = self.started.lock() {
            m.insert(index, (Instant::now(), title.to_string()));
        }
        self.bar.set_message(title.to_string());
    }

    fn on_unit_complete(&self, index: usize, total: usize, summary_len: usize) {
        let (title, secs) = self.finish_unit(index);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<40}  {}  {}",
            green("✓"),
            index,
            total,
            truncate(&title, 40),
            dim(&format!("{summary_len:>4} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_unit_error(&self, index: usize, total: usize, error: &str) {
        let (title, secs) = self.finish_unit(index);
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<40}  {}  {}",
            red("✗"),
            index,
            total,
            truncate(&title, 40),
            red(&truncate(error, 80)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_digest_complete(&self, total_units: usize, success_count: usize) {
        let failed = total_units.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} summaries saved",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} summaries saved  ({} skipped)",
                if failed == total_units {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_units,
                red(&failed.to_string()),
            );
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let head: String = s.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Summarize every section and subsection (stored in papers.db)
  paper-digest paper.pdf

  # One request for the whole paper, JSON section list
  paper-digest --mode whole-document paper.pdf

  # Same, but send the paper one page per message
  paper-digest --mode whole-document --delivery page-by-page paper.pdf

  # Summarize a paper straight from a URL
  paper-digest https://arxiv.org/pdf/1706.03762

  # Show the detected section tree (no API key needed)
  paper-digest --sections-only paper.pdf

  # List registered papers, then show one paper's summaries
  paper-digest --list-papers
  paper-digest --summaries 3

  # Machine-readable report
  paper-digest --json paper.pdf > report.json

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default model gemini-2.0-flash-lite)
  OPENAI_API_KEY          OpenAI API key (default model gpt-4.1-nano)
  PAPER_DIGEST_PROVIDER   Override provider (gemini, openai, anthropic, ollama)
  PAPER_DIGEST_MODEL      Override model ID
  PAPER_DIGEST_DATABASE   SQLite database path
  PDFIUM_LIB_PATH         Path to libpdfium when it is not installed system-wide
  RUST_LOG                Log filter, overrides -v / -q
"#;

/// Split research papers into sections and summarize them with LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "paper-digest",
    version,
    about = "Split PDF research papers into sections and summarize them with LLMs",
    long_about = "Extract numbered sections from a PDF research paper (local file or URL), \
summarize each section with an LLM and store the summaries in a SQLite database. \
Supports Google Gemini, OpenAI, Anthropic, Ollama and any provider edgequake-llm knows.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: Option<String>,

    /// SQLite database holding papers and summaries.
    #[arg(long, env = "PAPER_DIGEST_DATABASE", default_value = "papers.db")]
    database: PathBuf,

    /// Summarize each section/subsection, or the whole document at once.
    #[arg(long, env = "PAPER_DIGEST_MODE", value_enum, default_value = "per-unit")]
    mode: ModeArg,

    /// How the paper is sent in whole-document mode.
    #[arg(long, env = "PAPER_DIGEST_DELIVERY", value_enum, default_value = "single-shot")]
    delivery: DeliveryArg,

    /// LLM model ID (e.g. gemini-2.0-flash-lite, gpt-4.1-nano).
    #[arg(long, env = "PAPER_DIGEST_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(
        long,
        env = "PAPER_DIGEST_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          GEMINI_API_KEY is preferred, then OPENAI_API_KEY, then any key edgequake-llm detects."
    )]
    provider: Option<String>,

    /// Fraction of each page cut from the top (running heads).
    #[arg(long, env = "PAPER_DIGEST_HEADER_RATIO", default_value_t = 0.1)]
    header_ratio: f32,

    /// Fraction of each page cut from the bottom (page numbers, footers).
    #[arg(long, env = "PAPER_DIGEST_FOOTER_RATIO", default_value_t = 0.1)]
    footer_ratio: f32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PAPER_DIGEST_PASSWORD")]
    password: Option<String>,

    /// Text file with a per-unit prompt template (`{text}` placeholder).
    #[arg(long, env = "PAPER_DIGEST_UNIT_PROMPT")]
    unit_prompt: Option<PathBuf>,

    /// Text file with a whole-document prompt template (`{document}` placeholder).
    #[arg(long, env = "PAPER_DIGEST_DOCUMENT_PROMPT")]
    document_prompt: Option<PathBuf>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "PAPER_DIGEST_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PAPER_DIGEST_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Retries per model call.
    #[arg(long, env = "PAPER_DIGEST_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PAPER_DIGEST_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "PAPER_DIGEST_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Print the detected section tree only; no model calls.
    #[arg(long, conflicts_with_all = ["summaries", "list_papers"])]
    sections_only: bool,

    /// Print the stored summaries of a paper.
    #[arg(long, value_name = "PAPER_ID", conflicts_with = "list_papers")]
    summaries: Option<i64>,

    /// Print all registered papers.
    #[arg(long)]
    list_papers: bool,

    /// Output JSON instead of text.
    #[arg(long, env = "PAPER_DIGEST_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PAPER_DIGEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAPER_DIGEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAPER_DIGEST_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    PerUnit,
    WholeDocument,
}

impl From<ModeArg> for SummaryMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::PerUnit => SummaryMode::PerUnit,
            ModeArg::WholeDocument => SummaryMode::WholeDocument,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DeliveryArg {
    SingleShot,
    PageByPage,
}

impl From<DeliveryArg> for DocumentDelivery {
    fn from(v: DeliveryArg) -> Self {
        match v {
            DeliveryArg::SingleShot => DocumentDelivery::SingleShot,
            DeliveryArg::PageByPage => DocumentDelivery::PageByPage,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; -v always wins.
    let digesting = cli.input.is_some() && !cli.sections_only;
    let show_progress = digesting && !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Read-only modes ──────────────────────────────────────────────────
    if cli.list_papers {
        let store = open_store(&cli)?;
        let papers = store.all_papers().context("Failed to list papers")?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&papers)?);
        } else if papers.is_empty() {
            eprintln!("No papers registered in {}", cli.database.display());
        } else {
            for p in papers {
                println!(
                    "{:>4}  {}  {}  {}",
                    p.id,
                    p.upload_date.format("%Y-%m-%d %H:%M"),
                    bold(&p.filename),
                    dim(&p.file_path)
                );
            }
        }
        return Ok(());
    }

    if let Some(paper_id) = cli.summaries {
        let store = open_store(&cli)?;
        let paper = store
            .paper(paper_id)?
            .with_context(|| format!("No paper with id {paper_id}"))?;
        let rows = store
            .paper_summaries(paper_id)
            .context("Failed to read summaries")?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        } else {
            println!("{}", bold(&paper.filename));
            for r in &rows {
                println!("\n{} {}", cyan(&format!("p.{:<3}", r.page)), bold(&r.section_title));
                println!("      {}", r.summary_text);
            }
            if rows.is_empty() {
                eprintln!("No summaries stored for paper {paper_id}");
            }
        }
        return Ok(());
    }

    let input = cli
        .input
        .clone()
        .context("An INPUT path or URL is required (or use --list-papers / --summaries)")?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn DigestProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Sections-only mode ───────────────────────────────────────────────
    if cli.sections_only {
        let tree = inspect_sections(&input, &config)
            .await
            .context("Failed to extract sections")?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&tree)?);
        } else {
            print_tree(&tree);
        }
        return Ok(());
    }

    // ── Digest ───────────────────────────────────────────────────────────
    let store = open_store(&cli)?;
    let report = digest_new_paper(&input, &store, &config)
        .await
        .context("Summarization failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
        if !cli.quiet {
            eprintln!(
                "{}  paper {}  {}/{} units  {}ms  →  {}",
                if report.failures.is_empty() {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                report.paper_id,
                report.stats.saved,
                report.stats.units,
                report.stats.total_duration_ms,
                bold(&cli.database.display().to_string()),
            );
        }
    }

    Ok(())
}

fn open_store(cli: &Cli) -> Result<SqliteStore> {
    SqliteStore::open(&cli.database)
        .with_context(|| format!("Failed to open database {}", cli.database.display()))
}

/// Map CLI args to `DigestConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<DigestConfig> {
    let mut builder = DigestConfig::builder()
        .mode(cli.mode.into())
        .delivery(cli.delivery.into())
        .header_ratio(cli.header_ratio)
        .footer_ratio(cli.footer_ratio)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref path) = cli.unit_prompt {
        builder = builder.unit_prompt(read_template(path).await?);
    }
    if let Some(ref path) = cli.document_prompt {
        builder = builder.document_prompt(read_template(path).await?);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn read_template(path: &PathBuf) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read prompt template from {:?}", path))
}

fn print_tree(tree: &SectionTree) {
    if tree.is_empty() {
        eprintln!("No numbered section headings detected.");
        return;
    }
    for section in &tree.sections {
        println!(
            "{} {}  {}",
            bold(&section.id),
            section.display_title(),
            dim(&format!("p.{}  {} chars", section.page, section.full_text.len()))
        );
        for sub in &section.subsections {
            println!(
                "    {} {}  {}",
                sub.id,
                sub.title,
                dim(&format!("p.{}  {} chars", sub.page, sub.text.len()))
            );
        }
    }
}

fn print_report(report: &DigestReport) {
    for row in &report.saved {
        println!(
            "\n{} {}",
            cyan(&format!("p.{:<3}", row.page)),
            bold(&row.section_title)
        );
        println!("      {}", row.summary_text);
    }
    for failure in &report.failures {
        eprintln!("  {} {}", red("✗"), failure);
    }
}
