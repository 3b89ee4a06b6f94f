//! pdfium-backed [`Engine`] and [`EngineSource`].
//!
//! ## Why bind once?
//!
//! Binding loads a ~30 MB shared library and, on a fresh machine, downloads
//! it first. [`PdfiumSource::acquire`] does that work exactly once per
//! [`crate::loader::LibraryLoader`]; every conversion afterwards reuses the
//! same bound [`Pdfium`] through an `Arc`. The `sync` feature of
//! `pdfium-render` serialises calls into the C library, which is what makes
//! sharing it across blocking-pool threads sound.

use crate::engine::{Document, Engine, EngineHandle, EngineSource, Page, PageSize, PaintOptions};
use crate::error::{DecodeError, LoadError, RenderError};
use crate::pipeline::render::RasterSurface;
use pdfium_locate::LibraryLocator;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Download progress callback: `(bytes_downloaded, total_bytes_if_known)`.
pub type DownloadProgress = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Locates and binds pdfium.
#[derive(Clone, Default)]
pub struct PdfiumSource {
    locator: LibraryLocator,
    on_download: Option<DownloadProgress>,
}

impl PdfiumSource {
    /// Source honouring `PDFIUM_LIB_PATH` and `PDFIUM_AUTO_CACHE_DIR`.
    pub fn from_env() -> Self {
        Self {
            locator: LibraryLocator::from_env(),
            on_download: None,
        }
    }

    pub fn with_locator(locator: LibraryLocator) -> Self {
        Self {
            locator,
            on_download: None,
        }
    }

    pub fn on_download(mut self, progress: DownloadProgress) -> Self {
        self.on_download = Some(progress);
        self
    }

    pub fn locator(&self) -> &LibraryLocator {
        &self.locator
    }
}

impl EngineSource for PdfiumSource {
    fn name(&self) -> &str {
        "pdfium"
    }

    fn acquire(&self) -> Result<EngineHandle, LoadError> {
        let progress = self.on_download.as_deref().map(|f| f as &dyn Fn(u64, Option<u64>));
        let path = self
            .locator
            .resolve(progress)
            .map_err(|e| LoadError::new(self.name(), e.to_string()))?;
        let pdfium =
            pdfium_locate::bind(&path).map_err(|e| LoadError::new(self.name(), e.to_string()))?;

        info!("pdfium bound from {}", path.display());
        Ok(Arc::new(PdfiumEngine {
            pdfium,
            library_path: path,
        }))
    }
}

/// A bound pdfium library.
pub struct PdfiumEngine {
    pdfium: Pdfium,
    library_path: PathBuf,
}

impl PdfiumEngine {
    /// The shared library this engine was bound from.
    pub fn library_path(&self) -> &Path {
        &self.library_path
    }
}

impl Engine for PdfiumEngine {
    fn name(&self) -> &str {
        "pdfium"
    }

    fn open(
        &self,
        bytes: Vec<u8>,
        password: Option<&str>,
    ) -> Result<Box<dyn Document + '_>, DecodeError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_vec(bytes, password)
            .map_err(|e| {
                let detail = format!("{:?}", e);
                if detail.contains("Password") || detail.contains("password") {
                    DecodeError::PasswordProtected
                } else {
                    DecodeError::Malformed { detail }
                }
            })?;
        Ok(Box::new(PdfiumDocument { document }))
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl Document for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page(&self, index: usize) -> Result<Box<dyn Page + '_>, DecodeError> {
        let page_index = u16::try_from(index).map_err(|_| DecodeError::PageUnavailable {
            index,
            detail: "index exceeds pdfium page range".into(),
        })?;
        let page = self
            .document
            .pages()
            .get(page_index)
            .map_err(|e| DecodeError::PageUnavailable {
                index,
                detail: format!("{:?}", e),
            })?;
        Ok(Box::new(PdfiumPage { page }))
    }
}

struct PdfiumPage<'a> {
    page: PdfPage<'a>,
}

impl Page for PdfiumPage<'_> {
    fn size(&self) -> PageSize {
        PageSize {
            width: self.page.width().value,
            height: self.page.height().value,
        }
    }

    fn paint(&self, surface: &mut RasterSurface, options: PaintOptions) -> Result<(), RenderError> {
        let (width, height) = (surface.width(), surface.height());
        let target_width = i32::try_from(width).map_err(|_| RenderError::EngineRenderFailure {
            detail: format!("width {width} exceeds pdfium limits"),
        })?;
        let target_height = i32::try_from(height).map_err(|_| RenderError::EngineRenderFailure {
            detail: format!("height {height} exceeds pdfium limits"),
        })?;

        let config = PdfRenderConfig::new()
            .set_target_width(target_width)
            .set_target_height(target_height)
            .render_annotations(true)
            .render_form_data(true)
            .set_text_smoothing(options.smoothing)
            .set_image_smoothing(options.smoothing)
            .set_path_smoothing(options.smoothing)
            .use_print_quality(options.smoothing);

        let bitmap = self
            .page
            .render_with_config(&config)
            .map_err(|e| RenderError::EngineRenderFailure {
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image().into_rgba8();
        if image.width() != width || image.height() != height {
            return Err(RenderError::EngineRenderFailure {
                detail: format!(
                    "engine produced {}x{} px for a {}x{} surface",
                    image.width(),
                    image.height(),
                    width,
                    height
                ),
            });
        }

        surface.pixels_mut().copy_from_slice(image.as_raw());
        debug!("pdfium painted {}x{} px", width, height);
        Ok(())
    }
}
