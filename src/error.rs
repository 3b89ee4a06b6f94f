//! Error types for the pdf-preview library.
//!
//! Each pipeline stage owns a small error enum describing how *that* stage
//! can fail. [`ConversionError`] wraps them with the stage that produced
//! them, so a caller can match on the kind of failure while the `Display`
//! output still tells a human which step broke.
//!
//! ```text
//! load ──▶ decode ──▶ render ──▶ encode
//! LoadError DecodeError RenderError EncodeError
//!    └──────────┴───────────┴──────────┴──▶ ConversionError
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// The rendering engine could not be acquired or initialised.
///
/// `Clone` because every caller that awaited the same load attempt
/// receives its own copy of the outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{source_name}: {message}")]
pub struct LoadError {
    /// Which engine source failed, e.g. `"pdfium"`.
    pub source_name: String,
    pub message: String,
}

impl LoadError {
    pub fn new(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// The input bytes could not be opened as a usable document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer is not a parseable PDF.
    #[error("file is not a valid PDF: {detail}")]
    Malformed { detail: String },

    /// The document parsed but contains no pages.
    #[error("the PDF file has no pages")]
    EmptyDocument,

    /// The document is encrypted and the password is missing or wrong.
    #[error("the PDF file is password protected")]
    PasswordProtected,

    /// The engine refused to hand out a page that the page count promised.
    #[error("page {index} could not be loaded: {detail}")]
    PageUnavailable { index: usize, detail: String },
}

/// The first page could not be rasterised.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    /// No drawing surface of the required size could be created.
    #[error("could not allocate a {width}x{height} drawing surface: {reason}")]
    SurfaceUnavailable {
        width: u64,
        height: u64,
        reason: String,
    },

    /// The engine failed while painting the page.
    #[error("page rendering failed: {detail}")]
    EngineRenderFailure { detail: String },
}

/// The rendered surface could not be encoded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("failed to encode {format} image: {detail}")]
    EncodingFailed { format: &'static str, detail: String },
}

/// Every way a conversion can fail.
///
/// Returned as the `Err` side of [`crate::ConversionResult`]; the pipeline
/// never panics past its own boundary.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("PDF engine failed to load ({0})")]
    Load(#[from] LoadError),

    #[error("could not open document: {0}")]
    Decode(#[from] DecodeError),

    #[error("could not render first page: {0}")]
    Render(#[from] RenderError),

    #[error("could not create image: {0}")]
    Encode(#[from] EncodeError),

    /// Reading the input file for [`crate::ConversionPipeline::convert_file`] failed.
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A blocking stage panicked or was cancelled by the runtime.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConversionError {
    /// Short name of the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            ConversionError::Load(_) => "load",
            ConversionError::Decode(_) => "decode",
            ConversionError::Render(_) => "render",
            ConversionError::Encode(_) => "encode",
            ConversionError::Read { .. } => "read",
            ConversionError::InvalidConfig(_) => "config",
            ConversionError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_display_names_source() {
        let e = ConversionError::from(LoadError::new("pdfium", "library not found"));
        let msg = e.to_string();
        assert!(msg.contains("pdfium"), "got: {msg}");
        assert!(msg.contains("library not found"), "got: {msg}");
        assert_eq!(e.stage(), "load");
    }

    #[test]
    fn empty_document_message() {
        let e = ConversionError::from(DecodeError::EmptyDocument);
        assert!(e.to_string().contains("no pages"));
        assert_eq!(e.stage(), "decode");
    }

    #[test]
    fn surface_error_reports_size() {
        let e = RenderError::SurfaceUnavailable {
            width: 40000,
            height: 20,
            reason: "exceeds maximum dimension".into(),
        };
        assert!(e.to_string().contains("40000x20"));
    }

    #[test]
    fn encode_error_names_format() {
        let e = ConversionError::from(EncodeError::EncodingFailed {
            format: "png",
            detail: "codec exploded".into(),
        });
        assert!(e.to_string().contains("png"));
        assert_eq!(e.stage(), "encode");
    }
}
