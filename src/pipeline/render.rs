//! Page rasterisation: page handle → RGBA surface of exact viewport size.
//!
//! ## Rounding
//!
//! Viewport dimensions are `floor(points × scale)`, clamped to at least one
//! pixel, for both axes. Floor matches how a canvas truncates a fractional
//! width, so a 612.5 pt page at scale 2.0 is 1225 px wide and a 300.7 pt
//! page is 601 px wide. The encoder relies on the surface being exactly this
//! size.
//!
//! ## Why pre-check limits?
//!
//! A malicious or broken MediaBox can claim a page of 10⁶ points. Refusing
//! to allocate beyond [`SurfaceLimits`] turns that into a typed
//! [`RenderError::SurfaceUnavailable`] instead of an abort on OOM.

use crate::config::{ConversionConfig, DEFAULT_MAX_DIMENSION, DEFAULT_MAX_PIXELS};
use crate::engine::{Page, PageSize, PaintOptions};
use crate::error::RenderError;
use image::RgbaImage;
use tracing::debug;

/// Output size of a rendered page, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Upper bounds on surface allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceLimits {
    pub max_dimension: u32,
    pub max_pixels: u64,
}

impl Default for SurfaceLimits {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

impl From<&ConversionConfig> for SurfaceLimits {
    fn from(config: &ConversionConfig) -> Self {
        Self {
            max_dimension: config.max_dimension,
            max_pixels: config.max_pixels,
        }
    }
}

impl Viewport {
    /// `floor(size × scale)` per axis, at least 1 px.
    pub fn from_page(size: PageSize, scale: f32, limits: SurfaceLimits) -> Result<Self, RenderError> {
        let scale = f64::from(scale);
        let w = f64::from(size.width) * scale;
        let h = f64::from(size.height) * scale;

        let unavailable = |reason: String| RenderError::SurfaceUnavailable {
            width: scaled_len(w),
            height: scaled_len(h),
            reason,
        };

        if !w.is_finite() || !h.is_finite() || w <= 0.0 || h <= 0.0 {
            return Err(unavailable(format!(
                "page size {}x{} pt at scale {} is not a positive area",
                size.width, size.height, scale
            )));
        }

        let (w, h) = (w.floor().max(1.0), h.floor().max(1.0));
        let max_side = f64::from(limits.max_dimension);
        if w > max_side || h > max_side {
            return Err(unavailable(format!(
                "exceeds maximum dimension of {} px",
                limits.max_dimension
            )));
        }

        // Both sides are ≤ max_dimension ≤ u32::MAX here.
        let viewport = Viewport {
            width: w as u32,
            height: h as u32,
        };
        if viewport.pixel_count() > limits.max_pixels {
            return Err(unavailable(format!(
                "exceeds pixel budget of {}",
                limits.max_pixels
            )));
        }
        Ok(viewport)
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

fn scaled_len(v: f64) -> u64 {
    if v.is_finite() && v > 0.0 {
        v.floor() as u64
    } else {
        0
    }
}

/// An owned RGBA8 pixel buffer, row-major, no padding.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl std::fmt::Debug for RasterSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterSurface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl RasterSurface {
    /// Allocate a zeroed (transparent black) surface for `viewport`.
    pub fn allocate(viewport: Viewport) -> Result<Self, RenderError> {
        let unavailable = |reason: String| RenderError::SurfaceUnavailable {
            width: u64::from(viewport.width),
            height: u64::from(viewport.height),
            reason,
        };

        let len = usize::try_from(viewport.pixel_count())
            .ok()
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| unavailable("size overflows address space".into()))?;

        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(len)
            .map_err(|e| unavailable(e.to_string()))?;
        pixels.resize(len, 0);

        Ok(Self {
            width: viewport.width,
            height: viewport.height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable pixels. The length is fixed at `width × height × 4`.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn into_image(self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.pixels)
    }
}

/// Render options derived from [`ConversionConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub scale: f32,
    pub paint: PaintOptions,
    pub limits: SurfaceLimits,
}

impl From<&ConversionConfig> for RenderOptions {
    fn from(config: &ConversionConfig) -> Self {
        Self {
            scale: config.scale,
            paint: PaintOptions {
                smoothing: config.smoothing,
            },
            limits: SurfaceLimits::from(config),
        }
    }
}

/// Rasterise `page` at `options.scale`.
pub fn render(page: &dyn Page, options: RenderOptions) -> Result<RasterSurface, RenderError> {
    let size = page.size();
    let viewport = Viewport::from_page(size, options.scale, options.limits)?;
    let mut surface = RasterSurface::allocate(viewport)?;

    page.paint(&mut surface, options.paint)?;

    debug!(
        "Rendered {:.1}x{:.1} pt page → {}x{} px",
        size.width, size.height, viewport.width, viewport.height
    );
    Ok(surface)
}
