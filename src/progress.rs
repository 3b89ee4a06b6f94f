//! Stage-event observer for conversions.
//!
//! Inject an [`ObserverHandle`] via
//! [`crate::config::ConversionConfigBuilder::observer`] to be told when each
//! pipeline stage starts, finishes or fails. The CLI uses it to drive a
//! spinner; a server could forward the events to its own metrics.
//!
//! # Example
//!
//! ```rust
//! use pdf_preview::{ConversionConfig, ConversionObserver, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ConversionObserver for Printer {
//!     fn on_stage_start(&self, stage: Stage) {
//!         eprintln!("{stage}…");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .observer(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// One step of the conversion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Load,
    Decode,
    Render,
    Encode,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Decode => "decode",
            Stage::Render => "render",
            Stage::Encode => "encode",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives stage events from [`crate::ConversionPipeline`].
///
/// All methods default to no-ops. Implementations must be `Send + Sync`
/// because several conversions may share one observer.
pub trait ConversionObserver: Send + Sync {
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    fn on_stage_complete(&self, stage: Stage, elapsed: Duration) {
        let _ = (stage, elapsed);
    }

    /// Called once with the failing stage; no later stage is started.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }
}

pub struct NoopObserver;

impl ConversionObserver for NoopObserver {}

/// Type stored in [`crate::config::ConversionConfig`].
pub type ObserverHandle = Arc<dyn ConversionObserver>;
