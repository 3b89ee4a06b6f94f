//! Pipeline stages for first-page conversion.
//!
//! Each submodule implements exactly one transformation step and is
//! synchronous; [`crate::convert`] moves them onto the blocking pool.
//!
//! ## Data Flow
//!
//! ```text
//! bytes ──▶ decode ──▶ render ──▶ encode ──▶ artifact + preview
//!          (engine)   (surface)  (png/jpeg)
//! ```
//!
//! 1. [`decode`]: magic-byte check, open the document, fetch page 0
//! 2. [`render`]: compute the viewport, allocate the surface, paint
//! 3. [`encode`]: compress the surface and derive the artifact file name

pub mod decode;
pub mod encode;
pub mod render;
