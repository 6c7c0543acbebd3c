use std::env;
use std::time::Duration;

use reqwest::{Method, Proxy};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error_code::StandardErrorCode;
use crate::timeout::BackendTimeout;
use crate::transport::TransportError;
use crate::{Error, ErrorContext, Result};

/// One HTTP request, independent of blocking or async execution.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Status, `Retry-After` hint and raw body of a completed exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub retry_after_ms: Option<u32>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode a success body, or turn a failure into a classified backend error.
    pub fn into_result<T: DeserializeOwned>(self, source: &str) -> Result<T> {
        if !self.is_success() {
            return Err(self.into_error(source));
        }
        serde_json::from_str(&self.body).map_err(|e| Error::Serialization {
            source: e,
            context: ErrorContext::new()
                .with_source(source)
                .with_details(format!("HTTP {} body is not the expected JSON", self.status)),
        })
    }

    pub fn into_error(self, source: &str) -> Error {
        let json: Option<Value> = serde_json::from_str(&self.body).ok();
        let err = json.as_ref().and_then(|j| j.get("error"));
        let provider_code = err
            .and_then(|e| e.get("code").and_then(Value::as_str))
            .or_else(|| err.and_then(|e| e.get("type").and_then(Value::as_str)));
        let message = err
            .and_then(|e| e.get("message").and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| {
                let body = self.body.trim();
                if body.is_empty() {
                    format!("HTTP {}", self.status)
                } else {
                    body.chars().take(512).collect()
                }
            });

        let code = StandardErrorCode::classify(self.status, provider_code);
        let mut context = ErrorContext::new().with_source(source);
        if let Some(pc) = provider_code {
            context = context.with_details(format!("provider code: {}", pc));
        }
        Error::Backend {
            status: self.status,
            code,
            message,
            retryable: code.retryable(),
            context,
        }
    }
}

/// Client construction and request execution for both invocation modes.
///
/// Clients are built per call because the timeout is a per-call setting.
pub struct HttpTransport;

struct ClientSettings {
    total: Duration,
    connect: Option<Duration>,
    pool_idle: Duration,
    pool_max_idle_per_host: usize,
    proxy: Option<Proxy>,
}

impl ClientSettings {
    fn new(timeout: &BackendTimeout) -> Self {
        // Minimal production-friendly defaults (env-overridable).
        let pool_max_idle_per_host = env::var("AI_HTTP_POOL_MAX_IDLE_PER_HOST")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(32);
        let pool_idle = timeout.pool_idle().unwrap_or_else(|| {
            Duration::from_secs(
                env::var("AI_HTTP_POOL_IDLE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(90),
            )
        });
        let proxy = env::var("AI_PROXY_URL")
            .ok()
            .and_then(|url| Proxy::all(&url).ok());
        Self {
            total: timeout.total(),
            connect: timeout.connect(),
            pool_idle,
            pool_max_idle_per_host,
            proxy,
        }
    }
}

fn build_error(e: reqwest::Error) -> Error {
    TransportError::Other(format!("failed to build HTTP client: {}", e)).into()
}

impl HttpTransport {
    pub fn blocking_client(timeout: &BackendTimeout) -> Result<reqwest::blocking::Client> {
        let s = ClientSettings::new(timeout);
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(s.total)
            .pool_idle_timeout(Some(s.pool_idle))
            .pool_max_idle_per_host(s.pool_max_idle_per_host);
        if let Some(connect) = s.connect {
            builder = builder.connect_timeout(connect);
        }
        if let Some(proxy) = s.proxy {
            builder = builder.proxy(proxy);
        }
        builder.build().map_err(build_error)
    }

    pub fn async_client(timeout: &BackendTimeout) -> Result<reqwest::Client> {
        let s = ClientSettings::new(timeout);
        let mut builder = reqwest::Client::builder()
            .timeout(s.total)
            .pool_idle_timeout(Some(s.pool_idle))
            .pool_max_idle_per_host(s.pool_max_idle_per_host);
        if let Some(connect) = s.connect {
            builder = builder.connect_timeout(connect);
        }
        if let Some(proxy) = s.proxy {
            builder = builder.proxy(proxy);
        }
        builder.build().map_err(build_error)
    }

    pub fn send_blocking(
        client: &reqwest::blocking::Client,
        request: &HttpRequest,
    ) -> Result<HttpResponse> {
        let mut req = client.request(request.method.clone(), &request.url);
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        for (k, v) in &request.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let resp = req.send().map_err(TransportError::Http)?;
        let status = resp.status().as_u16();
        let retry_after_ms = retry_after_ms(resp.headers());
        let body = resp.text().map_err(TransportError::Http)?;
        Ok(HttpResponse {
            status,
            retry_after_ms,
            body,
        })
    }

    pub async fn send(client: &reqwest::Client, request: &HttpRequest) -> Result<HttpResponse> {
        let mut req = client.request(request.method.clone(), &request.url);
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        for (k, v) in &request.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(TransportError::Http)?;
        let status = resp.status().as_u16();
        let retry_after_ms = retry_after_ms(resp.headers());
        let body = resp.text().await.map_err(TransportError::Http)?;
        Ok(HttpResponse {
            status,
            retry_after_ms,
            body,
        })
    }
}

/// Best-effort parsing of `Retry-After`; only the `<seconds>` form is supported.
fn retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<u32> {
    let raw = headers.get("retry-after")?.to_str().ok()?.trim();
    let secs: u32 = raw.parse().ok()?;
    Some(secs.saturating_mul(1000))
}
