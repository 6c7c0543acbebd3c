use std::collections::HashMap;

use serde_json::{Map, Value};

use super::Dispatcher;
use crate::backend::FineTuningOperation;
use crate::config::ExtraOverrides;
use crate::timeout::TimeoutSpec;
use crate::types::{
    FineTuningJobCreate, Hyperparameters, Integration, ListJobEvents, ListJobs,
};
use crate::Result;

/// One operation call as the dispatcher receives it.
#[derive(Debug, Clone)]
pub struct OperationRequest<O> {
    pub payload: O,
    pub extra_headers: HashMap<String, String>,
    pub extra_body: Map<String, Value>,
    /// Explicit per-call settings. These win over `raw_overrides`.
    pub overrides: ExtraOverrides,
    /// Untyped overrides bag, parsed after the provider lookup.
    pub raw_overrides: Map<String, Value>,
}

impl<O> OperationRequest<O> {
    pub fn new(payload: O) -> Self {
        Self {
            payload,
            extra_headers: HashMap::new(),
            extra_body: Map::new(),
            overrides: ExtraOverrides::default(),
            raw_overrides: Map::new(),
        }
    }
}

/// Builder for one call. Finish with [`execute`](Self::execute) or
/// [`execute_async`](Self::execute_async).
pub struct OperationBuilder<'a, O: FineTuningOperation> {
    dispatcher: &'a Dispatcher,
    provider: Option<String>,
    request: OperationRequest<O>,
}

impl<'a, O: FineTuningOperation> OperationBuilder<'a, O> {
    pub(crate) fn new(dispatcher: &'a Dispatcher, payload: O) -> Self {
        Self {
            dispatcher,
            provider: None,
            request: OperationRequest::new(payload),
        }
    }

    /// Route to this provider instead of the dispatcher's default.
    pub fn provider(mut self, provider_id: impl Into<String>) -> Self {
        self.provider = Some(provider_id.into());
        self
    }

    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.request.overrides.api_base = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.request.overrides.api_key = Some(key.into());
        self
    }

    pub fn organization(mut self, org: impl Into<String>) -> Self {
        self.request.overrides.organization = Some(org.into());
        self
    }

    pub fn timeout(mut self, timeout: impl Into<TimeoutSpec>) -> Self {
        self.request.overrides.timeout = Some(timeout.into());
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.request.overrides.max_retries = Some(n);
        self
    }

    pub fn extra_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.request.extra_headers.extend(headers);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.extra_headers.insert(name.into(), value.into());
        self
    }

    /// Fields merged into the request body, replacing payload fields of the same name.
    pub fn extra_body(mut self, body: Map<String, Value>) -> Self {
        self.request.extra_body.extend(body);
        self
    }

    /// Typed overrides; explicit setters called on this builder still take precedence.
    pub fn overrides(mut self, overrides: ExtraOverrides) -> Self {
        self.request.overrides = std::mem::take(&mut self.request.overrides).or(overrides);
        self
    }

    /// One raw override, e.g. `("request_timeout", json!(120))` or `("api_version", ..)`.
    pub fn override_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.request.raw_overrides.insert(key.into(), value);
        self
    }

    pub fn override_values(mut self, values: Map<String, Value>) -> Self {
        self.request.raw_overrides.extend(values);
        self
    }

    pub fn into_request(self) -> OperationRequest<O> {
        self.request
    }

    /// Run the call on the current thread.
    ///
    /// Must not be called from inside an async task; use
    /// [`execute_async`](Self::execute_async) there.
    pub fn execute(self) -> Result<O::Output> {
        self.dispatcher
            .dispatch(self.request, self.provider.as_deref(), false)?
            .wait()
    }

    /// Run the call through the dispatcher's [`crate::AsyncBridge`].
    pub async fn execute_async(self) -> Result<O::Output> {
        let Self {
            dispatcher,
            provider,
            request,
        } = self;
        let provider_id = provider
            .clone()
            .unwrap_or_else(|| dispatcher.inner.default_provider.clone());
        let worker = dispatcher.clone();
        dispatcher
            .inner
            .bridge
            .run(move || worker.dispatch(request, provider.as_deref(), true))
            .await
            .map_err(|e| e.in_call(&provider_id, O::OPERATION.name()))
    }
}

impl<'a> OperationBuilder<'a, FineTuningJobCreate> {
    pub fn hyperparameters(mut self, hyperparameters: Hyperparameters) -> Self {
        self.request.payload = self.request.payload.with_hyperparameters(hyperparameters);
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.request.payload = self.request.payload.with_suffix(suffix);
        self
    }

    pub fn validation_file(mut self, file: impl Into<String>) -> Self {
        self.request.payload = self.request.payload.with_validation_file(file);
        self
    }

    pub fn integrations(mut self, integrations: Vec<Integration>) -> Self {
        self.request.payload = self.request.payload.with_integrations(integrations);
        self
    }

    pub fn seed(mut self, seed: i64) -> Self {
        self.request.payload = self.request.payload.with_seed(seed);
        self
    }
}

impl<'a> OperationBuilder<'a, ListJobs> {
    /// Cursor: the last job id of the previous page.
    pub fn after(mut self, job_id: impl Into<String>) -> Self {
        self.request.payload.after = Some(job_id.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.request.payload.limit = Some(limit);
        self
    }
}

impl<'a> OperationBuilder<'a, ListJobEvents> {
    /// Cursor: the last event id of the previous page.
    pub fn after(mut self, event_id: impl Into<String>) -> Self {
        self.request.payload.after = Some(event_id.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.request.payload.limit = Some(limit);
        self
    }
}
