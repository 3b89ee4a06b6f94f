//! Document decoding: bytes → open document → first page.
//!
//! Only page 0 is ever requested. Later pages are neither rendered nor
//! reported.

use crate::engine::{Document, Engine, Page, PageSize};
use crate::error::DecodeError;
use serde::Serialize;
use tracing::debug;

/// Every PDF starts with this marker.
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// pdfium accepts up to 1 KiB of junk before the header, and so do we.
const MAGIC_SEARCH_WINDOW: usize = 1024;

/// Reject buffers that cannot possibly be a PDF before handing them to the
/// engine.
pub fn check_magic(bytes: &[u8]) -> Result<(), DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Malformed {
            detail: "input is empty".into(),
        });
    }
    let window = &bytes[..bytes.len().min(MAGIC_SEARCH_WINDOW)];
    if window.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC) {
        Ok(())
    } else {
        let head: Vec<u8> = bytes.iter().take(4).copied().collect();
        Err(DecodeError::Malformed {
            detail: format!("missing %PDF header (first bytes: {:?})", head),
        })
    }
}

/// Open `bytes` with `engine`.
pub fn open<'e>(
    engine: &'e dyn Engine,
    bytes: Vec<u8>,
    password: Option<&str>,
) -> Result<Box<dyn Document + 'e>, DecodeError> {
    check_magic(&bytes)?;
    let size = bytes.len();
    let document = engine.open(bytes, password)?;
    debug!(
        "Opened {}-byte document with {}: {} pages",
        size,
        engine.name(),
        document.page_count()
    );
    Ok(document)
}

/// Fetch page 0, failing with [`DecodeError::EmptyDocument`] when there is
/// none.
pub fn first_page<'d>(document: &'d dyn Document) -> Result<Box<dyn Page + 'd>, DecodeError> {
    if document.page_count() == 0 {
        return Err(DecodeError::EmptyDocument);
    }
    document.page(0)
}

/// Summary returned by [`crate::ConversionPipeline::inspect`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    /// Size of page 0 in points; `None` for an empty document.
    pub first_page_width: Option<f32>,
    pub first_page_height: Option<f32>,
}

impl DocumentInfo {
    pub fn first_page_size(&self) -> Option<PageSize> {
        Some(PageSize {
            width: self.first_page_width?,
            height: self.first_page_height?,
        })
    }
}

/// Gather [`DocumentInfo`] from an open document.
pub fn describe(document: &dyn Document) -> Result<DocumentInfo, DecodeError> {
    let page_count = document.page_count();
    let size = if page_count == 0 {
        None
    } else {
        Some(document.page(0)?.size())
    };
    Ok(DocumentInfo {
        page_count,
        first_page_width: size.map(|s| s.width),
        first_page_height: size.map(|s| s.height),
    })
}
