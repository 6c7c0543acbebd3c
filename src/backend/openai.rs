//! OpenAI-compatible fine-tuning backend, with an Azure OpenAI flavour.
//!
//! Blocking calls run on `reqwest::blocking` and return [`Outcome::Ready`]; non-blocking
//! calls build an async `reqwest` request and return [`Outcome::Deferred`] for the
//! caller to await. Retryable failures are retried here, up to the call's
//! `max_retries`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::retry::RetryPolicy;
use super::{BackendCall, FineTuningBackend, Outcome};
use crate::registry::{EnvKeys, ProviderDescriptor};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::types::operation::page_query;
use crate::types::{
    CancelJob, FineTuningJob, FineTuningJobCreate, FineTuningJobEvent, ListJobEvents, ListJobs,
    Page, RetrieveJob,
};
use crate::{Error, ErrorContext, Result};

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const AZURE_DEFAULT_API_VERSION: &str = "2024-10-21";

/// Header carrying our own correlation id. Providers may ignore it.
pub const REQUEST_ID_HEADER: &str = "x-ai-lib-request-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    OpenAi,
    Azure,
}

#[derive(Debug, Clone)]
pub struct OpenAiCompatibleBackend {
    flavor: Flavor,
    min_delay: Duration,
    max_delay: Duration,
}

impl OpenAiCompatibleBackend {
    pub fn openai() -> Self {
        Self::with_flavor(Flavor::OpenAi)
    }

    pub fn azure() -> Self {
        Self::with_flavor(Flavor::Azure)
    }

    fn with_flavor(flavor: Flavor) -> Self {
        let defaults = RetryPolicy::new(None);
        Self {
            flavor,
            min_delay: defaults.min_delay,
            max_delay: defaults.max_delay,
        }
    }

    /// Override the retry backoff bounds.
    pub fn with_retry_delays(mut self, min_delay: Duration, max_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self.max_delay = max_delay;
        self
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    fn source(&self) -> &'static str {
        match self.flavor {
            Flavor::OpenAi => "openai_backend",
            Flavor::Azure => "azure_backend",
        }
    }

    /// `{api_base}/fine_tuning/jobs` (Azure: under `/openai`), then `segments`, each
    /// percent-encoded as one path segment.
    fn jobs_url<P>(&self, call: &BackendCall<P>, segments: &[&str]) -> Result<String> {
        let invalid = |reason: String| {
            Error::configuration_with_context(
                format!("Invalid api_base '{}': {}", call.config.api_base, reason),
                ErrorContext::new()
                    .with_field_path("api_base")
                    .with_source(self.source()),
            )
        };
        let mut url = url::Url::parse(&call.config.api_base).map_err(|e| invalid(e.to_string()))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| invalid("cannot be a base URL".to_string()))?;
            path.pop_if_empty();
            if self.flavor == Flavor::Azure {
                path.push("openai");
            }
            path.extend(["fine_tuning", "jobs"]).extend(segments);
        }
        Ok(url.into())
    }

    fn request<P>(
        &self,
        call: &BackendCall<P>,
        method: Method,
        segments: &[&str],
    ) -> Result<HttpRequest> {
        let mut req = HttpRequest::new(method, self.jobs_url(call, segments)?)
            .header(REQUEST_ID_HEADER, call.request_id.clone());

        match self.flavor {
            Flavor::OpenAi => {
                if let Some(key) = &call.config.api_key {
                    req = req.header("authorization", format!("Bearer {}", key));
                }
                if let Some(org) = &call.config.organization {
                    req = req.header("openai-organization", org.clone());
                }
            }
            Flavor::Azure => {
                if let Some(key) = &call.config.api_key {
                    req = req.header("api-key", key.clone());
                }
                let version = call
                    .config
                    .provider_param("api_version")
                    .unwrap_or(AZURE_DEFAULT_API_VERSION);
                req = req.query(vec![("api-version".to_string(), version.to_string())]);
            }
        }

        // Caller headers go last so they can replace ours.
        for (k, v) in &call.extra_headers {
            req = req.header(k.clone(), v.clone());
        }
        if !call.passthrough.is_empty() {
            let keys: Vec<&str> = call.passthrough.keys().map(String::as_str).collect();
            debug!(keys = ?keys, source = self.source(), "forwarded override keys have no wire mapping");
        }
        Ok(req)
    }

    fn body<T: Serialize>(payload: &T, extra: &Map<String, Value>) -> Result<Value> {
        let mut body = serde_json::to_value(payload)?;
        if let Value::Object(map) = &mut body {
            for (k, v) in extra {
                map.insert(k.clone(), v.clone());
            }
        }
        Ok(body)
    }

    fn execute<T, P>(&self, call: &BackendCall<P>, request: HttpRequest) -> Result<Outcome<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let policy = RetryPolicy::new(call.config.max_retries)
            .with_delays(self.min_delay, self.max_delay);
        let source = self.source();
        debug!(
            method = %request.method,
            url = %request.url,
            is_async = call.is_async,
            max_retries = policy.max_retries,
            "sending fine-tuning request"
        );

        if call.is_async {
            let client = HttpTransport::async_client(&call.timeout)?;
            return Ok(Outcome::deferred(async move {
                let mut attempt = 0u32;
                loop {
                    match settle(HttpTransport::send(&client, &request).await, source) {
                        Ok(v) => return Ok(v),
                        Err((err, retry_after_ms)) if policy.should_retry(&err, attempt) => {
                            let delay = policy.delay(attempt, retry_after_ms);
                            debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying");
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        Err((err, _)) => return Err(err),
                    }
                }
            }));
        }

        let client = HttpTransport::blocking_client(&call.timeout)?;
        let mut attempt = 0u32;
        loop {
            match settle(HttpTransport::send_blocking(&client, &request), source) {
                Ok(v) => return Ok(Outcome::Ready(v)),
                Err((err, retry_after_ms)) if policy.should_retry(&err, attempt) => {
                    let delay = policy.delay(attempt, retry_after_ms);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err((err, _)) => return Err(err),
            }
        }
    }
}

/// Decode one attempt, keeping the `Retry-After` hint next to a failure.
fn settle<T: DeserializeOwned>(
    sent: Result<HttpResponse>,
    source: &str,
) -> std::result::Result<T, (Error, Option<u32>)> {
    match sent {
        Ok(resp) => {
            let retry_after_ms = resp.retry_after_ms;
            resp.into_result(source).map_err(|e| (e, retry_after_ms))
        }
        Err(e) => Err((e, None)),
    }
}

impl FineTuningBackend for OpenAiCompatibleBackend {
    fn create_job(&self, call: BackendCall<FineTuningJobCreate>) -> Result<Outcome<FineTuningJob>> {
        let body = Self::body(&call.payload, &call.extra_body)?;
        let request = self.request(&call, Method::POST, &[])?.json(body);
        self.execute(&call, request)
    }

    fn list_jobs(&self, call: BackendCall<ListJobs>) -> Result<Outcome<Page<FineTuningJob>>> {
        let query = page_query(call.payload.after.as_deref(), call.payload.limit);
        let request = self.request(&call, Method::GET, &[])?.query(query);
        self.execute(&call, request)
    }

    fn retrieve_job(&self, call: BackendCall<RetrieveJob>) -> Result<Outcome<FineTuningJob>> {
        let request = self.request(&call, Method::GET, &[call.payload.job_id.as_str()])?;
        self.execute(&call, request)
    }

    fn cancel_job(&self, call: BackendCall<CancelJob>) -> Result<Outcome<FineTuningJob>> {
        let segments = [call.payload.job_id.as_str(), "cancel"];
        let mut request = self.request(&call, Method::POST, &segments)?;
        if !call.extra_body.is_empty() {
            request = request.json(Value::Object(call.extra_body.clone()));
        }
        self.execute(&call, request)
    }

    fn list_events(
        &self,
        call: BackendCall<ListJobEvents>,
    ) -> Result<Outcome<Page<FineTuningJobEvent>>> {
        let query = page_query(call.payload.after.as_deref(), call.payload.limit);
        let request = self
            .request(&call, Method::GET, &[call.payload.job_id.as_str(), "events"])?
            .query(query);
        self.execute(&call, request)
    }
}

/// Descriptor for `openai`: public endpoint default, structured timeouts supported.
pub fn openai_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::new("openai", Arc::new(OpenAiCompatibleBackend::openai()))
        .structured_timeout(true)
        .default_api_base(OPENAI_API_BASE)
}

/// Descriptor for `azure`: resource endpoint and key are mandatory, scalar timeouts only,
/// and `api_version` is accepted as a provider-specific override.
pub fn azure_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::new("azure", Arc::new(OpenAiCompatibleBackend::azure()))
        .env(EnvKeys {
            api_base: Some("AZURE_API_BASE".to_string()),
            api_key: Some("AZURE_API_KEY".to_string()),
            extra: vec![("api_version".to_string(), "AZURE_API_VERSION".to_string())],
            ..Default::default()
        })
        .credential_required(true)
        .accept_key("api_version")
}
