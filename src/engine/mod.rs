//! The seam between the pipeline and the PDF engine.
//!
//! The pipeline only ever talks to these traits. [`pdfium`] provides the
//! production implementation; tests plug in scripted engines to exercise
//! failure paths pdfium cannot be made to produce on demand.
//!
//! Handle lifetimes encode the release order: a [`Page`] borrows the
//! [`Document`] it came from, which borrows the [`Engine`] that opened it.
//! Dropping the document box releases the engine-side resources.

pub mod pdfium;

use crate::error::{DecodeError, LoadError, RenderError};
use crate::pipeline::render::RasterSurface;
use std::sync::Arc;

/// Shared, ready-to-use engine.
pub type EngineHandle = Arc<dyn Engine>;

/// Intrinsic page size in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// How the engine should paint a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaintOptions {
    /// Anti-alias text, vector paths and images at the highest quality.
    pub smoothing: bool,
}

impl Default for PaintOptions {
    fn default() -> Self {
        Self { smoothing: true }
    }
}

/// A bound document engine.
pub trait Engine: Send + Sync {
    /// Human-readable engine name for logs.
    fn name(&self) -> &str;

    /// Parse `bytes` as a document.
    ///
    /// Must return [`DecodeError::Malformed`] for unparseable input and
    /// [`DecodeError::PasswordProtected`] for encrypted documents opened
    /// without the right password.
    fn open(
        &self,
        bytes: Vec<u8>,
        password: Option<&str>,
    ) -> Result<Box<dyn Document + '_>, DecodeError>;
}

/// An open document. Dropping it releases the engine resources.
pub trait Document {
    fn page_count(&self) -> usize;

    fn page(&self, index: usize) -> Result<Box<dyn Page + '_>, DecodeError>;
}

/// A loaded page, valid while its document is open.
pub trait Page {
    fn size(&self) -> PageSize;

    /// Paint the page so that it fills `surface` exactly.
    ///
    /// Any failure, including a bitmap that does not match the surface
    /// dimensions, is a [`RenderError::EngineRenderFailure`].
    fn paint(&self, surface: &mut RasterSurface, options: PaintOptions) -> Result<(), RenderError>;
}

/// Produces an engine. Called by [`crate::loader::LibraryLoader`] on the
/// blocking pool, at most once per successful load.
pub trait EngineSource: Send + Sync {
    fn name(&self) -> &str;

    fn acquire(&self) -> Result<EngineHandle, LoadError>;
}
