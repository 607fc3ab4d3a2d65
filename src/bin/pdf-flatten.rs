//! CLI binary for pdf-flatten.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `FlattenConfig`, writes the archive and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_flatten::{
    convert_to_file, inspect, write_documents, BatchOutput, BatchProgressCallback, BudgetPolicy,
    CancelFlag, DocumentInfo, FlattenConfig, ProgressCallback, ProgressEvent,
};
use std::io;
use std::path::PathBuf;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// `1.2 MB`, `340 KB`, `12 B`.
fn human_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.0} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

fn truncate(msg: &str, max: usize) -> String {
    if msg.chars().count() > max {
        let cut: String = msg.chars().take(max - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        msg.to_string()
    }
}

fn success_line(name: &str, pages: usize, bytes: usize) -> String {
    format!(
        "  {} {}  {}",
        green("✓"),
        name,
        dim(&format!("{pages} pages • {}", human_size(bytes)))
    )
}

fn failure_line(name: &str, error: &str) -> String {
    format!("  {} {}  {}", red("✗"), name, red(&truncate(error, 80)))
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner during the pre-scan, then a page
/// bar across the whole batch, with one log line per finished document.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.set_message("Reading documents…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn activate_bar(&self, pages_total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(pages_total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Flattening");
        self.bar.reset_eta();
    }

    /// Stop the ticker, leaving the bar as last drawn.
    fn abandon(&self) {
        if !self.bar.is_finished() {
            self.bar.abandon();
        }
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, documents_total: usize, pages_total: usize) {
        self.activate_bar(pages_total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Flattening {documents_total} document(s), {pages_total} pages…"
            ))
        ));
    }

    fn on_document_start(&self, _index: usize, name: &str, _page_count: usize) {
        self.bar.set_message(truncate(name, 40));
    }

    fn on_progress(&self, event: ProgressEvent) {
        self.bar.set_position(event.pages_completed as u64);
    }

    fn on_document_complete(
        &self,
        _index: usize,
        output_name: &str,
        page_count: usize,
        payload_bytes: usize,
    ) {
        self.bar
            .println(success_line(output_name, page_count, payload_bytes));
    }

    fn on_document_error(&self, _index: usize, name: &str, error: &str) {
        self.bar.println(failure_line(name, error));
    }

    fn on_archive_start(&self, entries: usize) {
        self.bar.set_prefix("Packaging");
        self.bar.set_message(format!("{entries} file(s)"));
    }

    fn on_batch_complete(&self, _succeeded: usize, _failed: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Flatten one file into flattened.zip
  pdf-flatten contract.pdf

  # Flatten every PDF in a folder, also writing the PDFs next to the archive
  pdf-flatten scans/ -o scans.zip --out-dir scans-flat/

  # Fixed resolution and quality for every page
  pdf-flatten --dpi 150 --quality 0.8 report.pdf

  # Never exceed the memory-derived pixel budget, even below 130 DPI
  pdf-flatten --strict-budget --memory-gb 2 poster.pdf

  # Page counts and planned resolution only
  pdf-flatten --inspect-only scans/

  # Machine-readable report
  pdf-flatten --json scans/ > report.json

RESOLUTION PLANNING:
  Each document gets its own plan from its first page and the memory hint.
  DPI targets 200, is capped by a pixel budget (6–16 MP depending on
  memory), and never drops below 130 unless --strict-budget is set.
  JPEG quality is 86% below 4 GB, 88% below 6 GB, 90% otherwise.

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to an existing libpdfium
  PDF_FLATTEN_*           Defaults for most flags (see --help per flag)
  RUST_LOG                Override log filtering
"#;

/// Rasterise PDFs into image-only PDFs and package them into a zip.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-flatten",
    version,
    about = "Rasterise PDFs into image-only PDFs and package them into a zip",
    long_about = "Replace every page of each input PDF with a single full-page JPEG. \
The output keeps page sizes and page order but carries no text, vector content, forms, \
annotations or metadata. Successful outputs are packaged into one zip archive.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files, or directories scanned one level deep for *.pdf.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Archive path.
    #[arg(short, long, env = "PDF_FLATTEN_OUTPUT", default_value = "flattened.zip")]
    output: PathBuf,

    /// Also write each flattened PDF into this directory.
    #[arg(long, env = "PDF_FLATTEN_OUT_DIR")]
    out_dir: Option<PathBuf>,

    /// Memory hint in GB for resolution planning (default: detected, else 4).
    #[arg(long, env = "PDF_FLATTEN_MEMORY_GB")]
    memory_gb: Option<f64>,

    /// Fixed rendering DPI for every page, bypassing the planner.
    #[arg(long, env = "PDF_FLATTEN_DPI",
          value_parser = clap::value_parser!(u32).range(1..=1200))]
    dpi: Option<u32>,

    /// JPEG quality in (0, 1] used with --dpi.
    #[arg(long, env = "PDF_FLATTEN_QUALITY", requires = "dpi")]
    quality: Option<f32>,

    /// Let the pixel budget win over the 130 DPI floor on huge pages.
    #[arg(long, env = "PDF_FLATTEN_STRICT_BUDGET")]
    strict_budget: bool,

    /// Suffix appended to each output file stem.
    #[arg(long, env = "PDF_FLATTEN_SUFFIX", default_value = "_flattened")]
    suffix: String,

    /// PDF user password, tried on every input.
    #[arg(long, env = "PDF_FLATTEN_PASSWORD")]
    password: Option<String>,

    /// Path to the pdfium shared library.
    #[arg(long, env = "PDF_FLATTEN_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Documents whose metadata is read at the same time.
    #[arg(long, env = "PDF_FLATTEN_SCAN_CONCURRENCY", default_value_t = 4)]
    scan_concurrency: usize,

    /// Print a JSON report on stdout.
    #[arg(long, env = "PDF_FLATTEN_JSON")]
    json: bool,

    /// Print page counts and planned resolution only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF_FLATTEN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF_FLATTEN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF_FLATTEN_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters; library INFO
    // logs would tear it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
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

    // ── Ctrl-C stops at the next page boundary ───────────────────────────
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("{}", red("Interrupted: finishing current page…"));
                cancel.cancel();
            }
        });
    }

    let cli_progress = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn BatchProgressCallback>);

    let config = build_config(&cli, progress_cb, cancel)?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let infos = inspect(&cli.inputs, &config)
            .await
            .context("Failed to inspect inputs")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&infos).context("Failed to serialize metadata")?
            );
        } else {
            print_inspection(&infos);
        }
        return Ok(());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let output = match convert_to_file(&cli.inputs, &cli.output, &config).await {
        Ok(output) => output,
        Err(e) => {
            if let Some(ref cb) = cli_progress {
                cb.abandon();
            }
            return Err(e).context("Conversion failed");
        }
    };

    let written = match cli.out_dir {
        Some(ref dir) => write_documents(&output, dir)
            .await
            .with_context(|| format!("Failed to write PDFs to {}", dir.display()))?,
        None => Vec::new(),
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        if !show_progress {
            print_results(&output);
        }
        print_summary(&cli, &output, written.len());
    }

    Ok(())
}

/// Map CLI args to `FlattenConfig`.
fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    cancel: CancelFlag,
) -> Result<FlattenConfig> {
    let mut builder = FlattenConfig::builder()
        .output_suffix(cli.suffix.clone())
        .metadata_concurrency(cli.scan_concurrency)
        .cancel_flag(cancel);

    if let Some(gb) = cli.memory_gb {
        builder = builder.memory_gb(gb);
    }
    if let Some(dpi) = cli.dpi {
        builder = builder.fixed_plan(dpi, cli.quality.unwrap_or(0.88));
    }
    if cli.strict_budget {
        builder = builder.budget_policy(BudgetPolicy::StrictBudget);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(lib.clone());
    }
    if let Some(name) = cli.output.file_name() {
        builder = builder.archive_name(name.to_string_lossy().into_owned());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_inspection(infos: &[DocumentInfo]) {
    for info in infos {
        match (&info.metadata, &info.error) {
            (Some(meta), _) => println!(
                "{}  {}  {}",
                info.name,
                dim(&format!(
                    "{} pages • {}",
                    meta.page_count,
                    human_size(info.size_bytes)
                )),
                cyan(&meta.plan.describe()),
            ),
            (None, Some(err)) => println!("{}", failure_line(&info.name, &err.to_string())),
            (None, None) => println!("{}  {}", info.name, dim("unreadable")),
        }
    }
}

fn print_results(output: &BatchOutput) {
    for result in &output.results {
        match result.error {
            None => eprintln!(
                "{}",
                success_line(&result.name, result.page_count, result.payload_bytes)
            ),
            Some(ref e) => eprintln!("{}", failure_line(&result.source_name, &e.to_string())),
        }
    }
}

fn print_summary(cli: &Cli, output: &BatchOutput, written: usize) {
    let stats = &output.stats;
    let mark = if stats.failed == 0 {
        green("✔")
    } else if stats.succeeded == 0 {
        red("✘")
    } else {
        cyan("⚠")
    };

    eprintln!(
        "{}  {}/{} documents  {} pages  {}ms  →  {} {}",
        mark,
        stats.succeeded,
        stats.documents_total,
        stats.pages_converted,
        stats.total_duration_ms,
        bold(&cli.output.display().to_string()),
        dim(&format!("({})", human_size(stats.archive_bytes))),
    );
    if let Some(plan) = output.sample_plan {
        eprintln!("   {}", dim(&plan.describe()));
    }
    if let Some(ref dir) = cli.out_dir {
        eprintln!("   {} PDF(s) written to {}", written, dir.display());
    }
    if stats.failed > 0 {
        eprintln!("   {} document(s) failed", red(&stats.failed.to_string()));
    }
}
