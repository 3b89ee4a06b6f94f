//! The conversion pipeline: bytes in, first-page image out.
//!
//! [`ConversionPipeline`] owns the [`LibraryLoader`] and the configuration.
//! Create one per process (or one per test) and share it; every call to
//! [`ConversionPipeline::convert`] reuses the engine loaded by the first.
//!
//! ## Why two blocking tasks?
//!
//! Decoding and rendering run in one `spawn_blocking` task because the page
//! borrows the open document; both are dropped when that task returns, so
//! the engine's document resources are released before encoding starts.
//! Encoding only needs the owned surface and runs in a second task.

use crate::config::ConversionConfig;
use crate::engine::pdfium::PdfiumSource;
use crate::engine::{Engine, EngineHandle, EngineSource};
use crate::error::{ConversionError, LoadError};
use crate::loader::LibraryLoader;
use crate::output::{ConversionResult, ConvertedPage};
use crate::pipeline::decode::{self, DocumentInfo};
use crate::pipeline::encode::{self, derive_file_name};
use crate::pipeline::render::{self, RasterSurface, RenderOptions};
use crate::progress::{ObserverHandle, Stage};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Converts the first page of PDF documents into images.
///
/// # Example
/// ```rust,no_run
/// use pdf_preview::{ConversionConfig, ConversionPipeline};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pipeline = ConversionPipeline::pdfium(ConversionConfig::default());
/// let bytes = std::fs::read("resume.pdf")?;
/// let page = pipeline.convert(bytes, "resume.pdf").await?;
/// assert_eq!(page.artifact.file_name, "resume.png");
/// # Ok(())
/// # }
/// ```
pub struct ConversionPipeline {
    loader: LibraryLoader,
    config: ConversionConfig,
}

impl ConversionPipeline {
    pub fn new(source: Arc<dyn EngineSource>, config: ConversionConfig) -> Self {
        Self {
            loader: LibraryLoader::new(source),
            config,
        }
    }

    /// Pipeline backed by pdfium, located via `PDFIUM_LIB_PATH`, the local
    /// cache, or a one-time download.
    pub fn pdfium(config: ConversionConfig) -> Self {
        Self::new(Arc::new(PdfiumSource::from_env()), config)
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn loader(&self) -> &LibraryLoader {
        &self.loader
    }

    /// Load the engine ahead of the first conversion.
    pub async fn ensure_ready(&self) -> Result<EngineHandle, LoadError> {
        self.loader.ensure_ready().await
    }

    /// Convert the first page of `bytes`.
    ///
    /// `file_name` is the document's original name; the artifact is named
    /// after it (see [`derive_file_name`]).
    ///
    /// # Errors
    /// Every failure is returned, tagged with its stage. Nothing is retried
    /// except that a failed engine load is attempted again on the next call.
    pub async fn convert(&self, bytes: impl Into<Vec<u8>>, file_name: &str) -> ConversionResult {
        let total_start = Instant::now();
        let bytes = bytes.into();
        info!("Converting '{}' ({} bytes)", file_name, bytes.len());

        let tracker = StageTracker::new(self.config.observer.clone());

        // ── Step 1: Engine ───────────────────────────────────────────────
        let started = tracker.begin(Stage::Load);
        let engine = tracker.check(
            Stage::Load,
            self.loader.ensure_ready().await.map_err(ConversionError::from),
        )?;
        tracker.complete(Stage::Load, started);

        // ── Steps 2–3: Decode + render ───────────────────────────────────
        let password = self.config.password.clone();
        let options = RenderOptions::from(&self.config);
        let render_tracker = tracker.clone();
        let (surface, page_count) = tokio::task::spawn_blocking(move || {
            rasterise_first_page(
                engine.as_ref(),
                bytes,
                password.as_deref(),
                options,
                &render_tracker,
            )
        })
        .await
        .map_err(|e| ConversionError::Internal(format!("Render task panicked: {}", e)))??;

        // ── Step 4: Encode ───────────────────────────────────────────────
        let format = self.config.format;
        let quality = self.config.quality;
        let encode_tracker = tracker.clone();
        let encoded = tokio::task::spawn_blocking(move || {
            encode_tracker.run(Stage::Encode, || encode::encode(surface, format, quality))
        })
        .await
        .map_err(|e| ConversionError::Internal(format!("Encode task panicked: {}", e)))??;

        // ── Step 5: Artifact + preview ───────────────────────────────────
        let artifact_name = derive_file_name(file_name, format);
        let duration_ms = total_start.elapsed().as_millis() as u64;
        info!(
            "Converted '{}' → '{}' ({}x{} px, {} bytes) in {}ms",
            file_name,
            artifact_name,
            encoded.width,
            encoded.height,
            encoded.bytes.len(),
            duration_ms
        );

        Ok(ConvertedPage::new(
            encoded,
            artifact_name,
            page_count,
            duration_ms,
        ))
    }

    /// Read `path` and convert it, naming the artifact after the file.
    pub async fn convert_file(&self, path: impl AsRef<Path>) -> ConversionResult {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ConversionError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.convert(bytes, &file_name).await
    }

    /// Blocking wrapper around [`ConversionPipeline::convert`].
    ///
    /// Creates a temporary tokio runtime internally, so it must not be
    /// called from inside an async context.
    pub fn convert_sync(&self, bytes: impl Into<Vec<u8>>, file_name: &str) -> ConversionResult {
        tokio::runtime::Runtime::new()
            .map_err(|e| ConversionError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.convert(bytes, file_name))
    }

    /// Page count and first-page size, without rendering.
    pub async fn inspect(&self, bytes: impl Into<Vec<u8>>) -> Result<DocumentInfo, ConversionError> {
        let bytes = bytes.into();
        let engine = self.loader.ensure_ready().await?;
        let password = self.config.password.clone();

        tokio::task::spawn_blocking(move || -> Result<DocumentInfo, ConversionError> {
            let document = decode::open(engine.as_ref(), bytes, password.as_deref())?;
            Ok(decode::describe(document.as_ref())?)
        })
        .await
        .map_err(|e| ConversionError::Internal(format!("Inspect task panicked: {}", e)))?
    }
}

/// Open, validate, and rasterise page 0.
///
/// The document and page are dropped before this returns, on every path.
fn rasterise_first_page(
    engine: &dyn Engine,
    bytes: Vec<u8>,
    password: Option<&str>,
    options: RenderOptions,
    tracker: &StageTracker,
) -> Result<(RasterSurface, usize), ConversionError> {
    let started = tracker.begin(Stage::Decode);
    let document = tracker.check(
        Stage::Decode,
        decode::open(engine, bytes, password).map_err(ConversionError::from),
    )?;
    let page_count = document.page_count();
    let page = tracker.check(
        Stage::Decode,
        decode::first_page(document.as_ref()).map_err(ConversionError::from),
    )?;
    tracker.complete(Stage::Decode, started);

    let surface = tracker.run(Stage::Render, || render::render(page.as_ref(), options))?;

    drop(page);
    drop(document);
    debug!("Released document after rendering page 1 of {}", page_count);

    Ok((surface, page_count))
}

/// Emits observer events and logs per stage.
#[derive(Clone)]
struct StageTracker {
    observer: Option<ObserverHandle>,
}

impl StageTracker {
    fn new(observer: Option<ObserverHandle>) -> Self {
        Self { observer }
    }

    fn begin(&self, stage: Stage) -> Instant {
        if let Some(o) = &self.observer {
            o.on_stage_start(stage);
        }
        Instant::now()
    }

    /// Report `result` if it is an error; pass it through either way.
    fn check<T>(&self, stage: Stage, result: Result<T, ConversionError>) -> Result<T, ConversionError> {
        if let Err(e) = &result {
            warn!("Stage '{}' failed: {}", stage, e);
            if let Some(o) = &self.observer {
                o.on_stage_error(stage, &e.to_string());
            }
        }
        result
    }

    fn complete(&self, stage: Stage, started: Instant) {
        let elapsed = started.elapsed();
        debug!("Stage '{}' done in {}ms", stage, elapsed.as_millis());
        if let Some(o) = &self.observer {
            o.on_stage_complete(stage, elapsed);
        }
    }

    fn run<T, E>(&self, stage: Stage, f: impl FnOnce() -> Result<T, E>) -> Result<T, ConversionError>
    where
        E: Into<ConversionError>,
    {
        let started = self.begin(stage);
        let value = self.check(stage, f().map_err(Into::into))?;
        self.complete(stage, started);
        Ok(value)
    }
}
