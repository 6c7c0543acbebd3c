//! Runs a blocking dispatch from async code.
//!
//! The dispatcher has a single implementation that is blocking up to the point where a
//! backend either returns a result or hands back a future. [`AsyncBridge::run`] moves that
//! blocking part onto tokio's blocking pool and awaits any deferred remainder, carrying
//! the caller's [`AmbientContext`] and tracing span along.
//!
//! Dropping the future returned by `run` does not stop a worker that already started.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::Span;

use crate::backend::Outcome;
use crate::context::AmbientContext;
use crate::{Error, Result};

/// Env var bounding concurrent bridge calls.
pub const MAX_INFLIGHT_ENV: &str = "AI_LIB_MAX_INFLIGHT";

#[derive(Debug, Clone, Default)]
pub struct AsyncBridge {
    inflight: Option<Arc<Semaphore>>,
}

impl AsyncBridge {
    /// Unbounded bridge; concurrency is limited only by the runtime's blocking pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// At most `max_inflight` calls run at once; the rest wait for a permit.
    pub fn bounded(max_inflight: usize) -> Self {
        Self {
            inflight: Some(Arc::new(Semaphore::new(max_inflight.max(1)))),
        }
    }

    /// Bounded by `AI_LIB_MAX_INFLIGHT` when set to a positive integer, unbounded otherwise.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        lookup(MAX_INFLIGHT_ENV)
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .map(Self::bounded)
            .unwrap_or_default()
    }

    /// Free permits, or `None` for an unbounded bridge.
    pub fn available_permits(&self) -> Option<usize> {
        self.inflight.as_ref().map(|s| s.available_permits())
    }

    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<Outcome<T>> + Send + 'static,
        T: Send + 'static,
    {
        if Handle::try_current().is_err() {
            return Err(Error::bridge(
                "non-blocking dispatch requires a running tokio runtime",
            ));
        }

        let _permit = match &self.inflight {
            Some(sem) => Some(
                sem.clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| Error::bridge("in-flight limiter closed"))?,
            ),
            None => None,
        };

        let ctx = AmbientContext::current();
        let span = Span::current();
        let worker_ctx = ctx.clone();
        let outcome = tokio::task::spawn_blocking(move || span.in_scope(|| worker_ctx.sync_scope(f)))
            .await
            .map_err(|e| {
                if e.is_panic() {
                    Error::bridge("blocking dispatch panicked")
                } else {
                    Error::bridge("blocking dispatch was cancelled")
                }
            })??;

        ctx.scope(outcome.resolve()).await
    }
}
