//! Scripted in-memory engine for pipeline tests.
//!
//! Documents are plain text after the `%PDF` marker, e.g.
//! `%PDF-scripted pages=3 size=612x792`. Recognised keys:
//!
//! - `pages=N` (required; absent → malformed)
//! - `size=WxH` in points (default 612x792)
//! - `paint=fail` → the engine errors while painting
//! - `password=SECRET` → opening requires that password
//!
//! The engine counts live documents and pages so tests can assert that the
//! pipeline released everything it opened.

#![allow(dead_code)]

use pdf_preview::{
    DecodeError, Document, Engine, EngineHandle, EngineSource, LoadError, Page, PageSize,
    PaintOptions, RasterSurface, RenderError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

/// Route library logs through the test harness; `RUST_LOG=debug` shows them.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub const PAGE_ZERO_COLOUR: [u8; 4] = [20, 40, 200, 255];

pub fn doc(spec: &str) -> Vec<u8> {
    format!("%PDF-scripted {spec}").into_bytes()
}

#[derive(Default)]
pub struct ScriptedEngine {
    pub live_documents: AtomicUsize,
    pub live_pages: AtomicUsize,
    pub opened: AtomicUsize,
    pub painted: Mutex<Vec<usize>>,
    pub last_smoothing: Mutex<Option<bool>>,
}

impl ScriptedEngine {
    pub fn live_documents(&self) -> usize {
        self.live_documents.load(Ordering::SeqCst)
    }

    pub fn live_pages(&self) -> usize {
        self.live_pages.load(Ordering::SeqCst)
    }

    pub fn painted(&self) -> Vec<usize> {
        self.painted.lock().unwrap().clone()
    }
}

struct Script {
    pages: usize,
    size: PageSize,
    paint: Option<String>,
    password: Option<String>,
}

fn parse(bytes: &[u8]) -> Option<Script> {
    let text = std::str::from_utf8(bytes).ok()?;
    let mut script = Script {
        pages: usize::MAX,
        size: PageSize {
            width: 612.0,
            height: 792.0,
        },
        paint: None,
        password: None,
    };
    for token in text.split_whitespace() {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        match key {
            "pages" => script.pages = value.parse().ok()?,
            "size" => {
                let (w, h) = value.split_once('x')?;
                script.size = PageSize {
                    width: w.parse().ok()?,
                    height: h.parse().ok()?,
                };
            }
            "paint" => script.paint = Some(value.to_string()),
            "password" => script.password = Some(value.to_string()),
            _ => {}
        }
    }
    (script.pages != usize::MAX).then_some(script)
}

impl Engine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn open(
        &self,
        bytes: Vec<u8>,
        password: Option<&str>,
    ) -> Result<Box<dyn Document + '_>, DecodeError> {
        let script = parse(&bytes).ok_or_else(|| DecodeError::Malformed {
            detail: "no page tree".into(),
        })?;
        if let Some(required) = &script.password {
            if password != Some(required.as_str()) {
                return Err(DecodeError::PasswordProtected);
            }
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live_documents.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedDocument {
            engine: self,
            script,
        }))
    }
}

struct ScriptedDocument<'e> {
    engine: &'e ScriptedEngine,
    script: Script,
}

impl Drop for ScriptedDocument<'_> {
    fn drop(&mut self) {
        self.engine.live_documents.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Document for ScriptedDocument<'_> {
    fn page_count(&self) -> usize {
        self.script.pages
    }

    fn page(&self, index: usize) -> Result<Box<dyn Page + '_>, DecodeError> {
        if index >= self.script.pages {
            return Err(DecodeError::PageUnavailable {
                index,
                detail: "out of range".into(),
            });
        }
        self.engine.live_pages.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedPage {
            document: self,
            index,
        }))
    }
}

struct ScriptedPage<'d> {
    document: &'d ScriptedDocument<'d>,
    index: usize,
}

impl Drop for ScriptedPage<'_> {
    fn drop(&mut self) {
        self.document
            .engine
            .live_pages
            .fetch_sub(1, Ordering::SeqCst);
    }
}

impl Page for ScriptedPage<'_> {
    fn size(&self) -> PageSize {
        self.document.script.size
    }

    fn paint(&self, surface: &mut RasterSurface, options: PaintOptions) -> Result<(), RenderError> {
        let engine = self.document.engine;
        engine.painted.lock().unwrap().push(self.index);
        *engine.last_smoothing.lock().unwrap() = Some(options.smoothing);

        match self.document.script.paint.as_deref() {
            Some("fail") => Err(RenderError::EngineRenderFailure {
                detail: "scripted paint failure".into(),
            }),
            _ => {
                let colour = if self.index == 0 {
                    PAGE_ZERO_COLOUR
                } else {
                    [255, 0, 0, 255]
                };
                for px in surface.pixels_mut().chunks_exact_mut(4) {
                    px.copy_from_slice(&colour);
                }
                Ok(())
            }
        }
    }
}

/// Hands out one shared [`ScriptedEngine`], failing the first
/// `failures` acquisitions.
pub struct ScriptedSource {
    pub engine: Arc<ScriptedEngine>,
    pub acquisitions: AtomicUsize,
    pub failures: usize,
    pub delay: Duration,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Self::failing(0)
    }

    pub fn failing(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            engine: Arc::new(ScriptedEngine::default()),
            acquisitions: AtomicUsize::new(0),
            failures,
            delay: Duration::from_millis(20),
        })
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

impl EngineSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn acquire(&self) -> Result<EngineHandle, LoadError> {
        let n = self.acquisitions.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        if n < self.failures {
            return Err(LoadError::new("scripted", "shared library missing"));
        }
        Ok(self.engine.clone())
    }
}
