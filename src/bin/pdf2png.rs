//! CLI binary for pdf-preview.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, converts page 1 and writes the image next to the
//! input (or wherever `--output` says).

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_preview::{
    ConversionConfig, ConversionObserver, ConversionPipeline, OutputFormat, PdfiumSource, Stage,
};
use pdfium_locate::LibraryLocator;
use std::io;
use std::path::{Path, PathBuf};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Stage spinner ────────────────────────────────────────────────────────────

/// Shows the current pipeline stage on a single spinner line.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("pdf2png");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConversionObserver for CliObserver {
    fn on_stage_start(&self, stage: Stage) {
        let msg = match stage {
            Stage::Load => "Loading PDF engine…",
            Stage::Decode => "Opening PDF…",
            Stage::Render => "Rendering page 1…",
            Stage::Encode => "Encoding image…",
        };
        self.bar.set_message(msg);
    }

    fn on_stage_complete(&self, stage: Stage, elapsed: Duration) {
        self.bar.println(format!(
            "  {} {:<7} {}",
            green("✓"),
            stage,
            dim(&format!("{:.1}s", elapsed.as_secs_f64())),
        ));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        self.bar
            .println(format!("  {} {:<7} {}", red("✗"), stage, red(error)));
    }
}

// ── CLI ──────────────────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # resume.pdf → resume.png (same directory)
  pdf2png resume.pdf

  # Explicit output path, JPEG at quality 0.8
  pdf2png resume.pdf -o thumbs/resume.jpg --format jpeg --quality 0.8

  # Smaller preview
  pdf2png --scale 1 resume.pdf

  # Metadata as JSON
  pdf2png --json resume.pdf

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to an existing libpdfium (skips the download)
  PDFIUM_AUTO_CACHE_DIR   Override the default pdfium cache directory

  PDFium (~30 MB) is downloaded automatically on first run and cached in
  ~/.cache/pdf-preview/pdfium-7690/.
"#;

/// Render the first page of a PDF to an image.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2png",
    version,
    about = "Render the first page of a PDF to a PNG or JPEG image",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file.
    input: PathBuf,

    /// Write the image here instead of next to the input.
    #[arg(short, long, env = "PDF2PNG_OUTPUT")]
    output: Option<PathBuf>,

    /// Pixels per PDF point.
    #[arg(long, env = "PDF2PNG_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// Encoder quality (0.0–1.0).
    #[arg(long, env = "PDF2PNG_QUALITY", default_value_t = 0.9)]
    quality: f32,

    /// Output image format.
    #[arg(long, env = "PDF2PNG_FORMAT", value_enum, default_value = "png")]
    format: FormatArg,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2PNG_PASSWORD")]
    password: Option<String>,

    /// Path to an existing pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    lib_path: Option<PathBuf>,

    /// Print artifact metadata as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "PDF2PNG_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2PNG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2PNG_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Png,
    Jpeg,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Png => OutputFormat::Png,
            FormatArg::Jpeg => OutputFormat::Jpeg,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
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

    // ── Engine source ────────────────────────────────────────────────────
    let mut locator = LibraryLocator::from_env();
    if let Some(ref path) = cli.lib_path {
        locator = locator.with_library_path(path);
    }
    let needs_download = !locator.is_cached();
    let mut source = PdfiumSource::with_locator(locator);
    let download_bar = if needs_download && !cli.quiet {
        let bar = download_bar();
        let handle = bar.clone();
        source = source.on_download(Arc::new(move |downloaded: u64, total: Option<u64>| {
            if let Some(t) = total {
                if handle.length() != Some(t) {
                    handle.set_length(t);
                }
            }
            handle.set_position(downloaded);
        }));
        Some(bar)
    } else {
        None
    };

    // ── Build config ─────────────────────────────────────────────────────
    let observer = show_progress.then(CliObserver::new);
    let mut builder = ConversionConfig::builder()
        .scale(cli.scale)
        .quality(cli.quality)
        .format(cli.format.into());
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref o) = observer {
        builder = builder.observer(o.clone() as Arc<dyn ConversionObserver>);
    }
    let config = builder.build().context("Invalid configuration")?;
    let pipeline = ConversionPipeline::new(Arc::new(source), config);

    // ── Engine ───────────────────────────────────────────────────────────
    // Load up front so the download bar finishes before the stage spinner
    // starts drawing.
    let loaded = pipeline.ensure_ready().await;
    if let Some(bar) = download_bar {
        bar.finish_and_clear();
    }
    loaded.context("Failed to load the PDF engine")?;

    // ── Convert ──────────────────────────────────────────────────────────
    let result = pipeline.convert_file(&cli.input).await;
    if let Some(ref o) = observer {
        o.finish();
    }
    let page = result.with_context(|| format!("Conversion of {:?} failed", cli.input))?;

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_file_name(&page.artifact.file_name));
    write_atomic(&output_path, page.artifact.bytes()).await?;

    if cli.json {
        let mut value = serde_json::to_value(&page).context("Failed to serialise output")?;
        value["output_path"] = serde_json::Value::String(output_path.display().to_string());
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("Failed to serialise output")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {}x{} px  {} bytes  {}ms  →  {}",
            green("✔"),
            page.artifact.width,
            page.artifact.height,
            page.artifact.size,
            page.duration_ms,
            bold(&output_path.display().to_string()),
        );
        if page.source_page_count > 1 {
            eprintln!(
                "   {}",
                dim(&format!(
                    "page 1 of {} rendered; later pages ignored",
                    page.source_page_count
                ))
            );
        }
    }

    Ok(())
}

fn download_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    bar.set_prefix("PDF engine");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Write to a temp file beside `path`, then rename, so a reader never sees
/// a partial image.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let tmp = path.with_extension("part");
    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write {:?}", tmp))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to move image into place at {:?}", path))?;
    Ok(())
}
