//! Conversion output: the uploadable artifact and its on-screen preview.
//!
//! Both views hold the same reference-counted buffer produced by the
//! encoder. The preview can therefore never show anything other than the
//! bytes that will be uploaded.

use crate::config::OutputFormat;
use crate::error::ConversionError;
use crate::pipeline::encode::EncodedImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Outcome of one conversion: either a page or the reason there is none.
pub type ConversionResult = Result<ConvertedPage, ConversionError>;

/// Encoded image plus the metadata a blob store needs.
#[derive(Clone, Serialize)]
pub struct Artifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
    /// Length of the encoded image in bytes.
    pub size: usize,
    #[serde(skip)]
    bytes: Arc<[u8]>,
}

impl Artifact {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Copy the bytes out, e.g. for an upload API that wants a `Vec`.
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("size", &self.size)
            .finish()
    }
}

/// Process-local handle for displaying the artifact right away.
///
/// Dereferences to the encoded bytes; [`PreviewRef::data_url`] renders a
/// `data:` URL any browser or webview can show without a round trip to
/// storage.
#[derive(Clone)]
pub struct PreviewRef {
    mime_type: &'static str,
    bytes: Arc<[u8]>,
}

impl PreviewRef {
    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }

    /// `true` when this preview shows exactly the artifact's buffer.
    pub fn is_view_of(&self, artifact: &Artifact) -> bool {
        Arc::ptr_eq(&self.bytes, &artifact.bytes)
    }
}

impl Deref for PreviewRef {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for PreviewRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewRef")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A successfully converted first page.
#[derive(Debug, Clone, Serialize)]
pub struct ConvertedPage {
    #[serde(skip)]
    pub preview: PreviewRef,
    pub artifact: Artifact,
    /// Page count of the source document. Only page 1 was converted.
    pub source_page_count: usize,
    pub duration_ms: u64,
}

impl ConvertedPage {
    pub(crate) fn new(
        encoded: EncodedImage,
        file_name: String,
        source_page_count: usize,
        duration_ms: u64,
    ) -> Self {
        let EncodedImage {
            bytes,
            width,
            height,
            format,
        } = encoded;
        let bytes: Arc<[u8]> = Arc::from(bytes);
        let mime_type = OutputFormat::mime_type(format);

        Self {
            preview: PreviewRef {
                mime_type,
                bytes: Arc::clone(&bytes),
            },
            artifact: Artifact {
                file_name,
                mime_type,
                width,
                height,
                size: bytes.len(),
                bytes,
            },
            source_page_count,
            duration_ms,
        }
    }
}
