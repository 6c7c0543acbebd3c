//! Shared fixtures: a recording backend and dispatchers wired to it.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ai_lib_dispatch::backend::{BackendCall, FineTuningBackend, Outcome};
use ai_lib_dispatch::config::MapEnv;
use ai_lib_dispatch::registry::EnvKeys;
use ai_lib_dispatch::types::{FineTuningJob, FineTuningJobCreate, ListJobs, Page, RetrieveJob};
use ai_lib_dispatch::{
    AmbientContext, BackendTimeout, Dispatcher, ProcessDefaults, ProviderDescriptor,
    ProviderRegistry, ResolvedConfig, Result,
};
use serde_json::{json, Map, Value};

/// What the backend saw for one call.
#[derive(Debug, Clone)]
pub struct Seen {
    pub config: ResolvedConfig,
    pub timeout: BackendTimeout,
    pub is_async: bool,
    pub request_id: String,
    pub ambient: AmbientContext,
    pub passthrough: Map<String, Value>,
}

/// Backend returning a fixed job and recording every call it receives.
#[derive(Default)]
pub struct RecordingBackend {
    calls: AtomicUsize,
    seen: Mutex<Vec<Seen>>,
    /// Defer the result in non-blocking mode instead of returning it ready.
    defer: bool,
    /// Ambient context observed while the deferred future ran.
    deferred_ambient: Arc<Mutex<Option<AmbientContext>>>,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn deferring() -> Arc<Self> {
        Arc::new(Self {
            defer: true,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Seen {
        self.seen
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("backend was not called")
    }

    pub fn deferred_ambient(&self) -> Option<AmbientContext> {
        self.deferred_ambient.lock().unwrap().clone()
    }

    fn record<P>(&self, call: &BackendCall<P>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(Seen {
            config: call.config.clone(),
            timeout: call.timeout,
            is_async: call.is_async,
            request_id: call.request_id.clone(),
            ambient: AmbientContext::current(),
            passthrough: call.passthrough.clone(),
        });
    }

    fn finish<T: Send + 'static>(&self, is_async: bool, value: T) -> Outcome<T> {
        if self.defer && is_async {
            let slot = self.deferred_ambient.clone();
            Outcome::deferred(async move {
                tokio::task::yield_now().await;
                *slot.lock().unwrap() = Some(AmbientContext::current());
                Ok(value)
            })
        } else {
            Outcome::Ready(value)
        }
    }
}

impl FineTuningBackend for RecordingBackend {
    fn create_job(&self, call: BackendCall<FineTuningJobCreate>) -> Result<Outcome<FineTuningJob>> {
        self.record(&call);
        let job = fixed_job(&call.payload.model, &call.payload.training_file);
        Ok(self.finish(call.is_async, job))
    }

    fn list_jobs(&self, call: BackendCall<ListJobs>) -> Result<Outcome<Page<FineTuningJob>>> {
        self.record(&call);
        let page = Page {
            object: "list".into(),
            data: vec![fixed_job("gpt-4o-mini", "file-abc")],
            has_more: false,
        };
        Ok(self.finish(call.is_async, page))
    }

    fn retrieve_job(&self, call: BackendCall<RetrieveJob>) -> Result<Outcome<FineTuningJob>> {
        self.record(&call);
        let mut job = fixed_job("gpt-4o-mini", "file-abc");
        job.id = call.payload.job_id.clone();
        Ok(self.finish(call.is_async, job))
    }
}

pub fn fixed_job(model: &str, training_file: &str) -> FineTuningJob {
    serde_json::from_value(json!({
        "id": "ftjob-fixed",
        "object": "fine_tuning.job",
        "model": model,
        "created_at": 1_714_000_000,
        "status": "queued",
        "training_file": training_file,
    }))
    .unwrap()
}

/// `mock` provider over `backend`. Reads `MOCK_API_BASE`, `MOCK_API_KEY`,
/// `MOCK_ORGANIZATION`, `MOCK_TIMEOUT` and `MOCK_MAX_RETRIES`.
pub fn mock_descriptor(backend: Arc<RecordingBackend>, structured: bool) -> ProviderDescriptor {
    ProviderDescriptor::new("mock", backend)
        .structured_timeout(structured)
        .default_api_base("https://mock.invalid/v1")
        .env(EnvKeys {
            timeout: Some("MOCK_TIMEOUT".into()),
            max_retries: Some("MOCK_MAX_RETRIES".into()),
            ..EnvKeys::with_prefix("mock")
        })
}

pub fn dispatcher_with(
    backend: Arc<RecordingBackend>,
    structured: bool,
    defaults: ProcessDefaults,
    env: MapEnv,
) -> Dispatcher {
    let mut registry = ProviderRegistry::new();
    registry.register(mock_descriptor(backend, structured));
    Dispatcher::builder()
        .registry(registry)
        .default_provider("mock")
        .process_defaults(defaults)
        .env_source(Arc::new(env))
        .build()
        .unwrap()
}

pub fn dispatcher(backend: Arc<RecordingBackend>) -> Dispatcher {
    dispatcher_with(backend, false, ProcessDefaults::default(), MapEnv::new())
}
