//! Ambient call-local context.
//!
//! A small key/value map that is implicitly in effect for the current call. It follows
//! the call across the [`crate::bridge::AsyncBridge`] hop onto the blocking pool, so a
//! backend sees the same context whether it was invoked in place or through the bridge.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

tokio::task_local! {
    static AMBIENT: AmbientContext;
}

/// Key whose value, when present, is sent as the client request id.
pub const REQUEST_ID_KEY: &str = "request_id";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbientContext {
    values: Arc<BTreeMap<String, String>>,
}

impl AmbientContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.values).insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The context in effect for the current task or blocking scope, or an empty one.
    pub fn current() -> Self {
        AMBIENT.try_with(Clone::clone).unwrap_or_default()
    }

    /// Run `fut` with this context in effect.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        AMBIENT.scope(self, fut).await
    }

    /// Run the blocking closure `f` with this context in effect.
    pub fn sync_scope<F, R>(self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        AMBIENT.sync_scope(self, f)
    }
}
