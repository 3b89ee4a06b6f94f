//! One-time engine acquisition shared by every conversion.
//!
//! [`LibraryLoader::ensure_ready`] is the only place in the crate where
//! concurrent callers touch shared state. The state machine:
//!
//! ```text
//! Uninitialized ──▶ Loading(attempt n) ──┬──▶ Ready(engine)
//!        ▲                               └──▶ Failed(error)
//!        └──────── next call after Failed starts attempt n+1
//! ```
//!
//! While an attempt is in flight every caller awaits the same
//! [`Shared`] future, so the source is invoked once and all waiters see
//! the same outcome. The attempt runs as its own task and records its
//! outcome in the state before waking anyone, so it settles even when every
//! caller has given up waiting. The state mutex is never held across an
//! `.await`.

use crate::engine::{EngineHandle, EngineSource};
use crate::error::LoadError;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

type LoadFuture = Shared<BoxFuture<'static, Result<EngineHandle, LoadError>>>;

enum LoaderState {
    Uninitialized,
    Loading { attempt: u64, future: LoadFuture },
    Ready(EngineHandle),
    Failed { attempt: u64, error: LoadError },
}

/// Lazily acquires an engine from an [`EngineSource`] and caches it.
pub struct LibraryLoader {
    source: Arc<dyn EngineSource>,
    state: Arc<Mutex<LoaderState>>,
    attempts: AtomicU64,
}

impl LibraryLoader {
    pub fn new(source: Arc<dyn EngineSource>) -> Self {
        Self {
            source,
            state: Arc::new(Mutex::new(LoaderState::Uninitialized)),
            attempts: AtomicU64::new(0),
        }
    }

    /// Return the engine, loading it first if necessary.
    ///
    /// Concurrent calls during a load join that load. A failed load is not
    /// replayed: the next call after it starts a fresh attempt, including
    /// when the failed attempt finished after its callers stopped waiting.
    pub async fn ensure_ready(&self) -> Result<EngineHandle, LoadError> {
        let (attempt, future) = {
            let mut state = self.lock();
            let in_flight = match &*state {
                LoaderState::Ready(engine) => return Ok(Arc::clone(engine)),
                LoaderState::Loading { attempt, future } => Some((*attempt, future.clone())),
                LoaderState::Failed { attempt, .. } => {
                    debug!("Engine load #{} failed earlier; retrying", attempt);
                    None
                }
                LoaderState::Uninitialized => None,
            };
            match in_flight {
                Some(joined) => {
                    debug!("Joining in-flight engine load #{}", joined.0);
                    joined
                }
                None => {
                    let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    let future = self.start_attempt(attempt);
                    *state = LoaderState::Loading {
                        attempt,
                        future: future.clone(),
                    };
                    (attempt, future)
                }
            }
        };

        let outcome = future.await;
        // Normally already recorded by the attempt task; covers a task that
        // was cancelled before it could record anything.
        settle(&self.state, attempt, &outcome);
        outcome
    }

    /// `true` once an engine has been acquired.
    pub fn is_ready(&self) -> bool {
        matches!(&*self.lock(), LoaderState::Ready(_))
    }

    /// Number of acquisition attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Error of the most recent attempt, if it failed and no retry has
    /// started since.
    pub fn last_error(&self) -> Option<LoadError> {
        match &*self.lock() {
            LoaderState::Failed { error, .. } => Some(error.clone()),
            _ => None,
        }
    }

    fn start_attempt(&self, attempt: u64) -> LoadFuture {
        let source = Arc::clone(&self.source);
        let state = Arc::clone(&self.state);
        let name = source.name().to_string();
        info!("Loading {} engine (attempt #{})", name, attempt);

        let task_name = name.clone();
        let task = tokio::spawn(async move {
            let start = Instant::now();
            let result = match tokio::task::spawn_blocking(move || source.acquire()).await {
                Ok(result) => result,
                Err(e) => Err(LoadError::new(
                    task_name.as_str(),
                    format!("load task failed: {e}"),
                )),
            };
            if result.is_ok() {
                info!(
                    "{} engine ready in {}ms",
                    task_name,
                    start.elapsed().as_millis()
                );
            }
            settle(&state, attempt, &result);
            result
        });

        task.map(move |joined| {
            joined.unwrap_or_else(|e| {
                Err(LoadError::new(name.as_str(), format!("load task failed: {e}")))
            })
        })
        .boxed()
        .shared()
    }

    fn lock(&self) -> MutexGuard<'_, LoaderState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<LoaderState>) -> MutexGuard<'_, LoaderState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Move `state` out of `Loading(attempt)` according to `outcome`.
///
/// No-op if the state has already moved on, so both the attempt task and
/// its waiters may call it.
fn settle(state: &Mutex<LoaderState>, attempt: u64, outcome: &Result<EngineHandle, LoadError>) {
    let mut state = lock(state);
    if !matches!(&*state, LoaderState::Loading { attempt: a, .. } if *a == attempt) {
        return;
    }
    *state = match outcome {
        Ok(engine) => LoaderState::Ready(Arc::clone(engine)),
        Err(error) => {
            warn!("Engine load #{} failed: {}", attempt, error);
            LoaderState::Failed {
                attempt,
                error: error.clone(),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Document, Engine};
    use crate::error::DecodeError;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct NullEngine;

    impl Engine for NullEngine {
        fn name(&self) -> &str {
            "null"
        }

        fn open(
            &self,
            _bytes: Vec<u8>,
            _password: Option<&str>,
        ) -> Result<Box<dyn Document + '_>, DecodeError> {
            Err(DecodeError::Malformed {
                detail: "null engine".into(),
            })
        }
    }

    /// Counts acquisitions; fails the first `failures` of them.
    struct CountingSource {
        calls: AtomicUsize,
        failures: usize,
        delay: Duration,
    }

    impl CountingSource {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                failures,
                delay: Duration::from_millis(50),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl EngineSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        fn acquire(&self) -> Result<EngineHandle, LoadError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            if n < self.failures {
                Err(LoadError::new("counting", format!("failure #{}", n + 1)))
            } else {
                Ok(Arc::new(NullEngine))
            }
        }
    }

    #[tokio::test]
    async fn sequential_calls_acquire_once() {
        let source = CountingSource::new(0);
        let loader = LibraryLoader::new(source.clone());

        let first = loader.ensure_ready().await.unwrap();
        for _ in 0..5 {
            let again = loader.ensure_ready().await.unwrap();
            assert!(Arc::ptr_eq(&first, &again));
        }

        assert_eq!(source.calls(), 1);
        assert_eq!(loader.attempts(), 1);
        assert!(loader.is_ready());
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_attempt() {
        let source = CountingSource::new(0);
        let loader = LibraryLoader::new(source.clone());

        let results = futures::future::join_all((0..8).map(|_| loader.ensure_ready())).await;

        assert_eq!(source.calls(), 1);
        let engines: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
        assert!(engines.iter().all(|e| Arc::ptr_eq(e, &engines[0])));
    }

    #[tokio::test]
    async fn concurrent_callers_fail_together() {
        let source = CountingSource::new(1);
        let loader = LibraryLoader::new(source.clone());

        let results = futures::future::join_all((0..4).map(|_| loader.ensure_ready())).await;

        assert_eq!(source.calls(), 1);
        for r in &results {
            assert_eq!(
                r.as_ref().err().map(|e| e.message.as_str()),
                Some("failure #1")
            );
        }
        assert!(!loader.is_ready());
        assert!(loader.last_error().is_some());
    }

    #[tokio::test]
    async fn failure_is_not_replayed() {
        let source = CountingSource::new(1);
        let loader = LibraryLoader::new(source.clone());

        assert!(loader.ensure_ready().await.is_err());
        assert!(loader.ensure_ready().await.is_ok());

        assert_eq!(source.calls(), 2);
        assert_eq!(loader.attempts(), 2);
        assert!(loader.last_error().is_none());
    }

    struct PanickingSource;

    impl EngineSource for PanickingSource {
        fn name(&self) -> &str {
            "panicking"
        }

        fn acquire(&self) -> Result<EngineHandle, LoadError> {
            panic!("library constructor blew up");
        }
    }

    #[tokio::test]
    async fn panicking_source_becomes_load_error() {
        let loader = LibraryLoader::new(Arc::new(PanickingSource));
        let Err(err) = loader.ensure_ready().await else {
            panic!("load should fail");
        };
        assert_eq!(err.source_name, "panicking");
        assert!(err.message.contains("load task failed"));
    }

    #[tokio::test]
    async fn abandoned_failure_is_not_replayed() {
        let source = CountingSource::new(1);
        let loader = LibraryLoader::new(source.clone());

        let waited =
            tokio::time::timeout(Duration::from_millis(1), loader.ensure_ready()).await;
        assert!(waited.is_err(), "first attempt should still be running");

        // Let the abandoned attempt finish and fail on its own.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(source.calls(), 1);
        assert!(loader.last_error().is_some());

        assert!(loader.ensure_ready().await.is_ok());
        assert_eq!(source.calls(), 2);
        assert_eq!(loader.attempts(), 2);
    }

    #[tokio::test]
    async fn abandoned_success_is_kept() {
        let source = CountingSource::new(0);
        let loader = LibraryLoader::new(source.clone());

        let waited =
            tokio::time::timeout(Duration::from_millis(1), loader.ensure_ready()).await;
        assert!(waited.is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(loader.is_ready());
        assert!(loader.ensure_ready().await.is_ok());
        assert_eq!(source.calls(), 1);
    }
}
