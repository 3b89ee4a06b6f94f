//! Image encoding: [`RasterSurface`] → PNG or JPEG bytes.
//!
//! PNG is the default because the artifact is read by people and by
//! image-analysis models; lossless text edges matter more than size. PNG has
//! no quality knob, so the configured quality picks the compression effort
//! instead. JPEG honours quality directly.

use crate::config::OutputFormat;
use crate::error::EncodeError;
use crate::pipeline::render::RasterSurface;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static PDF_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.pdf$").expect("static regex is valid"));

/// Encoder output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
}

/// Encode `surface`, consuming it.
pub fn encode(
    surface: RasterSurface,
    format: OutputFormat,
    quality: f32,
) -> Result<EncodedImage, EncodeError> {
    let (width, height) = (surface.width(), surface.height());
    let failed = |detail: String| EncodeError::EncodingFailed {
        format: format.extension(),
        detail,
    };

    let mut bytes = Vec::new();
    match format {
        OutputFormat::Png => {
            let encoder = PngEncoder::new_with_quality(
                &mut bytes,
                png_compression(quality),
                FilterType::Adaptive,
            );
            encoder
                .write_image(surface.pixels(), width, height, ExtendedColorType::Rgba8)
                .map_err(|e| failed(e.to_string()))?;
        }
        OutputFormat::Jpeg => {
            let rgb: Vec<u8> = surface
                .pixels()
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();
            let encoder = JpegEncoder::new_with_quality(&mut bytes, jpeg_quality(quality));
            encoder
                .write_image(&rgb, width, height, ExtendedColorType::Rgb8)
                .map_err(|e| failed(e.to_string()))?;
        }
    }
    drop(surface);

    if bytes.is_empty() {
        return Err(failed("encoder produced no output".into()));
    }

    debug!(
        "Encoded {}x{} px → {} bytes {}",
        width,
        height,
        bytes.len(),
        format
    );
    Ok(EncodedImage {
        bytes,
        width,
        height,
        format,
    })
}

fn png_compression(quality: f32) -> CompressionType {
    if quality >= 0.8 {
        CompressionType::Best
    } else if quality >= 0.4 {
        CompressionType::Default
    } else {
        CompressionType::Fast
    }
}

fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Artifact file name for a source document name.
///
/// Directory components are dropped, a trailing `.pdf` (any case) is
/// replaced, and any other name keeps its full basename:
///
/// ```rust
/// use pdf_preview::{derive_file_name, OutputFormat};
///
/// assert_eq!(derive_file_name("report.pdf", OutputFormat::Png), "report.png");
/// assert_eq!(derive_file_name("notes.PDF", OutputFormat::Png), "notes.png");
/// assert_eq!(derive_file_name("archive", OutputFormat::Png), "archive.png");
/// ```
pub fn derive_file_name(source: &str, format: OutputFormat) -> String {
    let base = source.rsplit(['/', '\\']).next().unwrap_or(source);
    let stem = PDF_EXTENSION.replace(base, "");
    let stem = if stem.trim().is_empty() {
        "document"
    } else {
        &*stem
    };
    format!("{}.{}", stem, format.extension())
}
