//! # pdf-preview
//!
//! Render the first page of an uploaded PDF into an image: one buffer you
//! can upload to blob storage or hand to an image-analysis model, and a
//! preview handle a UI can display immediately.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Load    bind pdfium once per pipeline (shared by concurrent callers)
//!  ├─ 2. Decode  open the document, reject empty or malformed input
//!  ├─ 3. Render  page 1 at 2× its point size onto an RGBA surface
//!  ├─ 4. Encode  PNG (or JPEG) at quality 0.9
//!  └─ 5. Output  Artifact { file_name, mime_type, bytes } + PreviewRef
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_preview::{ConversionConfig, ConversionPipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = ConversionPipeline::pdfium(ConversionConfig::default());
//!     let page = pipeline.convert_file("report.pdf").await?;
//!     println!("{} ({} bytes)", page.artifact.file_name, page.artifact.size);
//!     println!("<img src=\"{}\">", page.preview.data_url());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2png` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, OutputFormat};
pub use convert::ConversionPipeline;
pub use engine::pdfium::{PdfiumEngine, PdfiumSource};
pub use engine::{Document, Engine, EngineHandle, EngineSource, Page, PageSize, PaintOptions};
pub use error::{ConversionError, DecodeError, EncodeError, LoadError, RenderError};
pub use loader::LibraryLoader;
pub use output::{Artifact, ConversionResult, ConvertedPage, PreviewRef};
pub use pipeline::decode::DocumentInfo;
pub use pipeline::encode::derive_file_name;
pub use pipeline::render::{RasterSurface, Viewport};
pub use progress::{ConversionObserver, NoopObserver, ObserverHandle, Stage};
