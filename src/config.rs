//! Configuration for first-page conversion.
//!
//! All tunables live in [`ConversionConfig`], built through
//! [`ConversionConfigBuilder`]. The defaults reproduce the preview policy:
//! render at 2× the page's point size and encode a PNG at quality 0.9.

use crate::error::ConversionError;
use crate::progress::ObserverHandle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default render scale applied to the page size in points.
pub const DEFAULT_SCALE: f32 = 2.0;

/// Default encoder quality in `0.0..=1.0`.
pub const DEFAULT_QUALITY: f32 = 0.9;

/// Largest accepted width or height of a drawing surface, in pixels.
pub const DEFAULT_MAX_DIMENSION: u32 = 16_384;

/// Largest accepted surface area, in pixels.
pub const DEFAULT_MAX_PIXELS: u64 = 268_435_456;

/// Image format of the produced artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossless PNG; quality selects compression effort. (default)
    #[default]
    Png,
    /// Lossy JPEG; quality maps to the JPEG quality factor. Alpha is dropped.
    Jpeg,
}

impl OutputFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Configuration for a conversion.
///
/// # Example
/// ```rust
/// use pdf_preview::{ConversionConfig, OutputFormat};
///
/// let config = ConversionConfig::builder()
///     .scale(1.5)
///     .format(OutputFormat::Jpeg)
///     .quality(0.8)
///     .build()
///     .unwrap();
/// assert_eq!(config.format.mime_type(), "image/jpeg");
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Multiplier from page points to pixels. Default: 2.0.
    ///
    /// A US-letter page (612 × 792 pt) becomes a 1224 × 1584 px surface,
    /// legible for preview and for image analysis without costing tens of
    /// megabytes per page.
    pub scale: f32,

    /// Encoder quality in `0.0..=1.0`. Default: 0.9.
    pub quality: f32,

    /// Artifact image format. Default: PNG.
    pub format: OutputFormat,

    /// Anti-alias text, paths and images while rendering. Default: true.
    pub smoothing: bool,

    /// Maximum surface width or height in pixels. Default: 16 384.
    pub max_dimension: u32,

    /// Maximum surface area in pixels. Default: 268 435 456 (16 384²).
    pub max_pixels: u64,

    /// User password for encrypted documents.
    pub password: Option<String>,

    /// Receives stage events. Default: none.
    pub observer: Option<ObserverHandle>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            quality: DEFAULT_QUALITY,
            format: OutputFormat::default(),
            smoothing: true,
            max_dimension: DEFAULT_MAX_DIMENSION,
            max_pixels: DEFAULT_MAX_PIXELS,
            password: None,
            observer: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("scale", &self.scale)
            .field("quality", &self.quality)
            .field("format", &self.format)
            .field("smoothing", &self.smoothing)
            .field("max_dimension", &self.max_dimension)
            .field("max_pixels", &self.max_pixels)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("observer", &self.observer.as_ref().map(|_| "<dyn ConversionObserver>"))
            .finish()
    }
}

impl ConversionConfig {
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn scale(mut self, scale: f32) -> Self {
        self.config.scale = scale;
        self
    }

    pub fn quality(mut self, quality: f32) -> Self {
        self.config.quality = quality;
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn smoothing(mut self, on: bool) -> Self {
        self.config.smoothing = on;
        self
    }

    pub fn max_dimension(mut self, px: u32) -> Self {
        self.config.max_dimension = px;
        self
    }

    pub fn max_pixels(mut self, px: u64) -> Self {
        self.config.max_pixels = px;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn observer(mut self, observer: ObserverHandle) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConversionError> {
        let c = &self.config;
        if !c.scale.is_finite() || !(0.1..=10.0).contains(&c.scale) {
            return Err(ConversionError::InvalidConfig(format!(
                "scale must be 0.1–10.0, got {}",
                c.scale
            )));
        }
        if !(0.0..=1.0).contains(&c.quality) {
            return Err(ConversionError::InvalidConfig(format!(
                "quality must be 0.0–1.0, got {}",
                c.quality
            )));
        }
        if c.max_dimension == 0 || c.max_pixels == 0 {
            return Err(ConversionError::InvalidConfig(
                "surface limits must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
