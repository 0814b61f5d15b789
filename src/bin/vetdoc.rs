//! CLI binary for vetdoc-extract.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use vetdoc_extract::{
    DocumentExtractor, ExtractionConfig, ExtractionOutput, ExtractionProgressCallback, Field,
    ProgressCallback,
};

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

/// Terminal progress callback: one bar for the shards plus a log line per
/// shard. Shards may finish out of order when `--concurrency` > 1.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// The bar starts as a spinner; `on_extraction_start` sets its length.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} shards  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("OCR");
    }

    fn elapsed_secs(&self, shard: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(&shard))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_shards: usize) {
        self.activate_bar(total_shards);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Sending {total_shards} shards to the OCR engine…"))
        ));
    }

    fn on_shard_start(&self, shard: usize, _total: usize) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(shard, Instant::now());
        }
        self.bar.set_message(format!("shard {}", shard + 1));
    }

    fn on_shard_complete(&self, shard: usize, total: usize, text_len: usize) {
        let secs = self.elapsed_secs(shard);
        self.bar.println(format!(
            "  {} Shard {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            shard + 1,
            total,
            dim(&format!("{text_len:>6} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_shard_error(&self, shard: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(shard);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Shard {:>3}/{:<3}  {}  {}",
            red("✗"),
            shard + 1,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.abandon();
    }

    fn on_extraction_complete(&self, total_shards: usize) {
        self.bar.finish_and_clear();
        if self.errors.load(Ordering::SeqCst) == 0 {
            eprintln!(
                "{} {} shards recognised",
                green("✔"),
                bold(&total_shards.to_string())
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Print the extracted fields
  vetdoc informe.pdf

  # Full result as JSON (fields, text, image metadata, stats)
  vetdoc --json informe.pdf > informe.json

  # Save diagnostic images next to the report
  vetdoc --images-dir ./imagenes informe.pdf

  # Only the OCR text
  vetdoc --text-only informe.pdf

  # Keep smaller captures too
  vetdoc --min-image-width 800 informe.pdf

ENVIRONMENT VARIABLES:
  DOCUMENT_AI_PROJECT_ID    Google Cloud project
  DOCUMENT_AI_LOCATION      Processor region (us, eu)
  DOCUMENT_AI_PROCESSOR_ID  Document AI OCR processor
  DOCUMENT_AI_ACCESS_TOKEN  OAuth2 bearer token (gcloud auth print-access-token)
  DOCUMENT_AI_ENDPOINT      Full :process URL override (optional)

SETUP:
  1. Export the DOCUMENT_AI_* variables above.
  2. Extract:  vetdoc informe.pdf
"#;

/// Extract patient data and diagnostic images from veterinary PDF reports.
#[derive(Parser, Debug)]
#[command(
    name = "vetdoc",
    version,
    about = "Extract patient data and diagnostic images from veterinary PDF reports",
    long_about = "OCR a veterinary report through Google Cloud Document AI, recover the \
patient, owner, veterinarian, diagnosis and recommendations fields from the Spanish headings, \
and pull out the full-resolution ultrasound/radiograph images embedded in the PDF.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Output structured JSON (ExtractionOutput) instead of a field table.
    #[arg(long, env = "VETDOC_JSON", conflicts_with = "text_only")]
    json: bool,

    /// Print only the recognised text.
    #[arg(long, env = "VETDOC_TEXT_ONLY")]
    text_only: bool,

    /// Write each retained image to this directory as image-<n>.<ext>.
    #[arg(long, env = "VETDOC_IMAGES_DIR")]
    images_dir: Option<PathBuf>,

    /// Maximum pages per OCR request.
    #[arg(long, env = "VETDOC_MAX_PAGES_PER_SHARD", default_value_t = 15)]
    max_pages_per_shard: usize,

    /// Minimum width (px) of a retained image.
    #[arg(long, env = "VETDOC_MIN_IMAGE_WIDTH", default_value_t = 1300)]
    min_image_width: u32,

    /// Number of concurrent OCR requests.
    #[arg(short, long, env = "VETDOC_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Per-shard OCR timeout in seconds.
    #[arg(long, env = "VETDOC_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "VETDOC_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "VETDOC_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "VETDOC_QUIET")]
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

    let bytes = tokio::fs::read(&cli.input)
        .await
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let extractor =
        DocumentExtractor::from_config(config).context("Failed to set up the OCR engine")?;

    // ── Text only ────────────────────────────────────────────────────────
    if cli.text_only {
        let text = extractor
            .extract_text(&bytes)
            .await
            .context("Extraction failed")?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
        if !text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
        return Ok(());
    }

    // ── Full extraction ──────────────────────────────────────────────────
    let output = extractor.extract(&bytes).await.context("Extraction failed")?;

    if let Some(ref dir) = cli.images_dir {
        let written = write_images(dir, &output).await?;
        if !cli.quiet {
            eprintln!(
                "{} {} images → {}",
                green("✔"),
                written,
                bold(&dir.display().to_string())
            );
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    print_fields(&output);

    if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "   {} pages  /  {} shards  /  {} images ({} skipped)  —  {}ms total",
            dim(&stats.total_pages.to_string()),
            dim(&stats.shards.to_string()),
            dim(&stats.images_found.to_string()),
            stats.images_skipped,
            stats.total_duration_ms,
        );
        for skip in &output.skipped_images {
            eprintln!("   {} {}", cyan("⚠"), dim(&skip.to_string()));
        }
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .max_pages_per_shard(cli.max_pages_per_shard)
        .min_image_width(cli.min_image_width)
        .ocr_concurrency(cli.concurrency)
        .api_timeout_secs(cli.api_timeout);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_fields(output: &ExtractionOutput) {
    for field in Field::ALL {
        let label = format!("{:<16}", format!("{field}:"));
        match output.fields.get(field) {
            Some(value) => println!("{}{}", bold(&label), value),
            None => println!("{}{}", bold(&label), dim("—")),
        }
    }
}

/// Write every retained image as `image-<n>.<ext>` (1-based).
async fn write_images(dir: &Path, output: &ExtractionOutput) -> Result<usize> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    for (i, image) in output.images.iter().enumerate() {
        let path = dir.join(format!("image-{}.{}", i + 1, image.extension()));
        tokio::fs::write(&path, &image.bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(output.images.len())
}
