//! CLI binary for edgequake-mdclean.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `BatchConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_mdclean::{
    clean_batch, BatchConfig, BatchOutput, BatchSelection, CleanProgressCallback, CleaningConfig,
    ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
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

/// Terminal progress callback: one live bar plus a log line per document.
/// Documents complete out of order, so timings are keyed by index.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_batch_start` tells us how many documents there are.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning raw directory…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} docs  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Cleaning");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, index: &str) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl CleanProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.activate_bar(total_documents);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Cleaning {total_documents} documents…"))
        ));
    }

    fn on_document_start(&self, index: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index.to_string(), Instant::now());
        }
        self.bar.set_message(format!("index {index}"));
    }

    fn on_document_complete(&self, index: &str, markdown_len: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:<12}  {:<8}  {}",
            green("✓"),
            index,
            dim(&format!("{markdown_len:>7} chars")),
            dim(&format!("{secs:.2}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: &str, error: &str) {
        let secs = self.elapsed_secs(index);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<12}  {}  {}",
            red("✗"),
            index,
            red(&msg),
            dim(&format!("{secs:.2}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let failed = total_documents.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} documents cleaned successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents cleaned  ({} failed)",
                if failed == total_documents {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_documents,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Clean every document under ./mineru_raw into ./md_clean
  mdclean

  # Another layout
  mdclean data/raw --out-dir data/clean --archive-dir data/removed_refs

  # Sample: skip the first 100 indices, clean the next 50
  mdclean --start 100 --limit 50

  # Specific documents
  mdclean --indices 10019 --indices 10020

  # Keep the bibliography, skip math rewriting
  mdclean --no-refs --no-math

  # Machine-readable run report
  mdclean --report logs/run.json --no-progress

LAYOUT:
  <raw_dir>/<index>/full.md                  transcribed Markdown (required)
  <raw_dir>/<index>/*_content_list.json      element manifest (optional)
  <out_dir>/<index>.md                       cleaned Markdown
  <out_dir>/<index>.txt                      plaintext rendering
  <archive_dir>/<index>.md                   removed bibliography text

ENVIRONMENT VARIABLES:
  Every flag can also be set as MDCLEAN_<FLAG>, e.g. MDCLEAN_OUT_DIR.
  RUST_LOG overrides the log filter (e.g. RUST_LOG=edgequake_mdclean=debug).
"#;

/// Clean transcribed PDF Markdown into an LLM-ready corpus.
#[derive(Parser, Debug)]
#[command(
    name = "mdclean",
    version,
    about = "Clean transcribed PDF Markdown into an LLM-ready corpus",
    long_about = "Clean machine-transcribed Markdown (MinerU full.md + content_list.json) into \
structured Markdown and plaintext: drops figure images and orphan captions, rebuilds tables \
from the manifest, tightens LaTeX spacing, and strips the bibliography while archiving what \
was removed.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory with one sub-directory per corpus index.
    #[arg(env = "MDCLEAN_RAW_DIR", default_value = "mineru_raw")]
    raw_dir: PathBuf,

    /// Where cleaned `<index>.md` and `<index>.txt` are written.
    #[arg(short, long, env = "MDCLEAN_OUT_DIR", default_value = "md_clean")]
    out_dir: PathBuf,

    /// Where removed bibliography text is archived.
    #[arg(long, env = "MDCLEAN_ARCHIVE_DIR", default_value = "logs/removed_refs")]
    archive_dir: PathBuf,

    /// Clean exactly these indices (repeatable, or comma-separated).
    #[arg(long, env = "MDCLEAN_INDICES", value_delimiter = ',', conflicts_with_all = ["start", "limit"])]
    indices: Vec<String>,

    /// Skip this many discovered indices.
    #[arg(long, env = "MDCLEAN_START")]
    start: Option<usize>,

    /// Clean at most this many indices (0 = no limit).
    #[arg(long, env = "MDCLEAN_LIMIT")]
    limit: Option<usize>,

    /// Leave math spans untouched.
    #[arg(long, env = "MDCLEAN_NO_MATH")]
    no_math: bool,

    /// Keep orphan figure captions.
    #[arg(long, env = "MDCLEAN_NO_CAPTIONS")]
    no_captions: bool,

    /// Do not rebuild tables from the content manifest.
    #[arg(long, env = "MDCLEAN_NO_TABLES")]
    no_tables: bool,

    /// Keep the bibliography.
    #[arg(long, env = "MDCLEAN_NO_REFS")]
    no_refs: bool,

    /// Number of documents cleaned concurrently.
    #[arg(short, long, env = "MDCLEAN_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// Print the batch output (results, failures, stats) as JSON on stdout.
    #[arg(long, env = "MDCLEAN_JSON")]
    json: bool,

    /// Also write the batch output as JSON to this file.
    #[arg(long, env = "MDCLEAN_REPORT")]
    report: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long, env = "MDCLEAN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MDCLEAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MDCLEAN_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
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
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn CleanProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let output = clean_batch(&config).await.context("Cleaning failed")?;

    if let Some(ref path) = cli.report {
        write_report(path, &output).await?;
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    }

    if !cli.quiet {
        print_summary(&cli, &output, show_progress);
    }

    if !output.failures.is_empty() && output.results.is_empty() {
        anyhow::bail!("All {} documents failed", output.failures.len());
    }
    Ok(())
}

/// Map CLI args to `BatchConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<BatchConfig> {
    let cleaning = CleaningConfig {
        enable_math: !cli.no_math,
        enable_caption_removal: !cli.no_captions,
        enable_table_reconstruction: !cli.no_tables,
        enable_reference_stripping: !cli.no_refs,
    };

    let mut builder = BatchConfig::builder()
        .raw_dir(&cli.raw_dir)
        .out_dir(&cli.out_dir)
        .archive_dir(&cli.archive_dir)
        .selection(parse_selection(cli))
        .concurrency(cli.concurrency)
        .cleaning(cleaning);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `--indices` wins; otherwise `--start`/`--limit` slice the discovered list.
fn parse_selection(cli: &Cli) -> BatchSelection {
    if !cli.indices.is_empty() {
        return BatchSelection::Indices(cli.indices.clone());
    }
    match (cli.start, cli.limit) {
        (None, None) => BatchSelection::All,
        (start, limit) => BatchSelection::Range {
            start: start.unwrap_or(0),
            limit: limit.unwrap_or(0),
        },
    }
}

async fn write_report(path: &Path, output: &BatchOutput) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(output).context("Failed to serialise report")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

fn print_summary(cli: &Cli, output: &BatchOutput, show_progress: bool) {
    let stats = &output.stats;

    // Without the bar nothing has reported per-document failures yet.
    if !show_progress {
        for failure in &output.failures {
            eprintln!("  {} {}", red("✗"), failure);
        }
    }

    eprintln!(
        "{}  {}/{} documents  {}ms  →  {}",
        if stats.failed_documents == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.cleaned_documents,
        stats.total_documents,
        stats.total_duration_ms,
        bold(&cli.out_dir.display().to_string()),
    );
    eprintln!(
        "   references: {} by title, {} tail, {} blocks, {} untouched",
        dim(&stats.title_matches.to_string()),
        dim(&stats.heuristic_truncations.to_string()),
        dim(&stats.heuristic_blocks.to_string()),
        dim(&stats.untouched_references.to_string()),
    );
    eprintln!(
        "   {} images  /  {} captions removed  /  {} tables rebuilt  ({} unresolved)",
        dim(&stats.images_removed.to_string()),
        dim(&stats.captions_removed.to_string()),
        dim(&stats.tables_reconstructed.to_string()),
        dim(&stats.unresolved_tables.to_string()),
    );
}
