//! Public entry point.
//!
//! A [`Dispatcher`] looks up the provider, resolves configuration, normalizes the timeout
//! and invokes the provider's backend. It is the only layer that attaches provider and
//! operation names to errors; everything else about an error passes through unchanged.

mod builder;
mod request;

pub use builder::DispatcherBuilder;
pub use request::{OperationBuilder, OperationRequest};

use std::sync::Arc;

use futures::FutureExt;
use serde_json::{Map, Value};
use tracing::{debug, info, info_span, Instrument};

use crate::backend::{BackendCall, FineTuningOperation, Outcome};
use crate::bridge::AsyncBridge;
use crate::config::{ConfigResolver, ExtraOverrides};
use crate::context::{AmbientContext, REQUEST_ID_KEY};
use crate::registry::{ProviderDescriptor, ProviderRegistry};
use crate::timeout;
use crate::types::{CancelJob, FineTuningJobCreate, ListJobEvents, ListJobs, RetrieveJob};
use crate::{Error, ErrorContext, Result};

pub const DEFAULT_PROVIDER: &str = "openai";

/// What happens to override keys that are neither recognized nor accepted by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownKeyPolicy {
    /// Hand them to the backend untouched.
    #[default]
    Forward,
    /// Fail the call with a validation error naming the key.
    Reject,
}

/// Multi-provider fine-tuning dispatcher. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    pub(crate) inner: Arc<DispatcherInner>,
}

pub(crate) struct DispatcherInner {
    pub(crate) registry: ProviderRegistry,
    pub(crate) resolver: ConfigResolver,
    pub(crate) bridge: AsyncBridge,
    pub(crate) unknown_keys: UnknownKeyPolicy,
    pub(crate) default_provider: String,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Dispatcher with the built-in providers, the real environment and no process defaults.
    pub fn new() -> Result<Self> {
        DispatcherBuilder::new().build()
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.inner.registry
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.inner.resolver
    }

    pub fn bridge(&self) -> &AsyncBridge {
        &self.inner.bridge
    }

    pub fn create_job(
        &self,
        model: impl Into<String>,
        training_file: impl Into<String>,
    ) -> OperationBuilder<'_, FineTuningJobCreate> {
        OperationBuilder::new(self, FineTuningJobCreate::new(model, training_file))
    }

    pub fn list_jobs(&self) -> OperationBuilder<'_, ListJobs> {
        OperationBuilder::new(self, ListJobs::default())
    }

    pub fn retrieve_job(&self, job_id: impl Into<String>) -> OperationBuilder<'_, RetrieveJob> {
        OperationBuilder::new(
            self,
            RetrieveJob {
                job_id: job_id.into(),
            },
        )
    }

    pub fn cancel_job(&self, job_id: impl Into<String>) -> OperationBuilder<'_, CancelJob> {
        OperationBuilder::new(
            self,
            CancelJob {
                job_id: job_id.into(),
            },
        )
    }

    pub fn list_job_events(&self, job_id: impl Into<String>) -> OperationBuilder<'_, ListJobEvents> {
        OperationBuilder::new(
            self,
            ListJobEvents {
                job_id: job_id.into(),
                after: None,
                limit: None,
            },
        )
    }

    /// Builder over an already assembled payload.
    pub fn operation<O: FineTuningOperation>(&self, payload: O) -> OperationBuilder<'_, O> {
        OperationBuilder::new(self, payload)
    }

    /// Route one call to `provider_id` (the default provider when `None`).
    ///
    /// In blocking mode the built-in backends finish the request before returning. In
    /// non-blocking mode they may return [`Outcome::Deferred`]; the caller awaits it, as
    /// [`AsyncBridge::run`] does.
    pub fn dispatch<O: FineTuningOperation>(
        &self,
        request: OperationRequest<O>,
        provider_id: Option<&str>,
        is_async: bool,
    ) -> Result<Outcome<O::Output>> {
        let provider = provider_id.unwrap_or(self.inner.default_provider.as_str());
        let operation = O::OPERATION.name();
        let mode = if is_async { "non_blocking" } else { "blocking" };
        let span = info_span!("dispatch", provider = %provider, operation, mode);
        let _enter = span.enter();

        match self.dispatch_in_span(request, provider, is_async) {
            Ok(outcome) => {
                let provider = provider.to_string();
                let span = span.clone();
                Ok(outcome.map_deferred(move |fut| {
                    async move {
                        fut.await.map_err(|e| {
                            let e = e.in_call(&provider, operation);
                            info!(error = %e, "deferred dispatch failed");
                            e
                        })
                    }
                    .instrument(span)
                    .boxed()
                }))
            }
            Err(e) => {
                let e = e.in_call(provider, operation);
                info!(error = %e, status = e.http_status(), "dispatch failed");
                Err(e)
            }
        }
    }

    fn dispatch_in_span<O: FineTuningOperation>(
        &self,
        request: OperationRequest<O>,
        provider: &str,
        is_async: bool,
    ) -> Result<Outcome<O::Output>> {
        let descriptor = self.inner.registry.lookup(provider, O::OPERATION)?;
        if !descriptor.invocation.allows(is_async) {
            let mode = if is_async { "non-blocking" } else { "blocking" };
            return Err(Error::unsupported_provider(
                provider,
                format!("{} ({})", O::OPERATION.name(), mode),
            ));
        }

        let OperationRequest {
            payload,
            extra_headers,
            extra_body,
            overrides,
            raw_overrides,
        } = request;
        payload.validate()?;

        let overrides = overrides.or(ExtraOverrides::from_map(raw_overrides)?);
        let config = self.inner.resolver.resolve(&overrides, &descriptor)?;
        let passthrough = self.screen_unknown_keys(&overrides, &descriptor)?;
        let timeout = timeout::normalize(Some(&config.timeout), &descriptor);

        let request_id = AmbientContext::current()
            .get(REQUEST_ID_KEY)
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        debug!(
            api_base = %config.api_base,
            timeout_secs = timeout.seconds(),
            max_retries = ?config.max_retries,
            request_id = %request_id,
            "configuration resolved"
        );

        let call = BackendCall {
            provider_id: descriptor.id.clone(),
            payload,
            config,
            timeout,
            is_async,
            request_id,
            extra_headers,
            extra_body,
            passthrough,
        };
        O::invoke(descriptor.backend.as_ref(), call)
    }

    fn screen_unknown_keys(
        &self,
        overrides: &ExtraOverrides,
        descriptor: &ProviderDescriptor,
    ) -> Result<Map<String, Value>> {
        let mut passthrough = Map::new();
        for (key, value) in &overrides.other {
            if descriptor.accepts(key) {
                continue;
            }
            match self.inner.unknown_keys {
                UnknownKeyPolicy::Forward => {
                    debug!(key = %key, "forwarding unrecognized override to backend");
                    passthrough.insert(key.clone(), value.clone());
                }
                UnknownKeyPolicy::Reject => {
                    return Err(Error::validation_with_context(
                        format!("unrecognized override '{}'", key),
                        ErrorContext::new()
                            .with_field_path(format!("overrides.{}", key))
                            .with_source("dispatcher"),
                    ));
                }
            }
        }
        Ok(passthrough)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("providers", &self.inner.registry.provider_ids())
            .field("default_provider", &self.inner.default_provider)
            .field("unknown_keys", &self.inner.unknown_keys)
            .field("bridge", &self.inner.bridge)
            .finish_non_exhaustive()
    }
}
