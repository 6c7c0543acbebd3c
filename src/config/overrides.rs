//! Call-level configuration overrides.

use serde_json::{Map, Value};

use crate::timeout::TimeoutSpec;
use crate::{Error, ErrorContext, Result};

/// Keys every provider recognizes in an overrides map.
pub const RECOGNIZED_KEYS: &[&str] = &[
    "api_base",
    "api_key",
    "organization",
    "timeout",
    "max_retries",
    "request_timeout",
];

/// Typed call-level overrides.
///
/// Built either with the setters or from a JSON map via [`ExtraOverrides::from_map`].
/// Keys outside [`RECOGNIZED_KEYS`] are kept in `other`; the dispatcher decides what
/// happens to them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtraOverrides {
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub organization: Option<String>,
    pub timeout: Option<TimeoutSpec>,
    /// Legacy alias for `timeout`, consulted only when `timeout` is absent.
    pub request_timeout: Option<TimeoutSpec>,
    pub max_retries: Option<u32>,
    pub other: Map<String, Value>,
}

impl ExtraOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an overrides map. `credential` is accepted as an alias of `api_key`.
    pub fn from_map(map: Map<String, Value>) -> Result<Self> {
        let mut out = Self::default();
        for (key, value) in map {
            if value.is_null() {
                continue;
            }
            match key.as_str() {
                "api_base" => out.api_base = Some(string_value(&key, value)?),
                "api_key" | "credential" => out.api_key = Some(string_value(&key, value)?),
                "organization" => out.organization = Some(string_value(&key, value)?),
                "timeout" => out.timeout = Some(timeout_value(&key, value)?),
                "request_timeout" => out.request_timeout = Some(timeout_value(&key, value)?),
                "max_retries" => out.max_retries = Some(retries_value(&key, &value)?),
                _ => {
                    out.other.insert(key, value);
                }
            }
        }
        Ok(out)
    }

    /// Field-wise merge where `self` wins and `fallback` fills the gaps.
    pub fn or(self, fallback: ExtraOverrides) -> Self {
        let mut other = fallback.other;
        other.extend(self.other);
        Self {
            api_base: self.api_base.or(fallback.api_base),
            api_key: self.api_key.or(fallback.api_key),
            organization: self.organization.or(fallback.organization),
            timeout: self.timeout.or(fallback.timeout),
            request_timeout: self.request_timeout.or(fallback.request_timeout),
            max_retries: self.max_retries.or(fallback.max_retries),
            other,
        }
    }

    /// `timeout`, falling back to the legacy `request_timeout`.
    pub fn effective_timeout(&self) -> Option<&TimeoutSpec> {
        self.timeout.as_ref().or(self.request_timeout.as_ref())
    }

    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    pub fn timeout(mut self, timeout: impl Into<TimeoutSpec>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    pub fn set(mut self, key: impl Into<String>, value: Value) -> Self {
        self.other.insert(key.into(), value);
        self
    }
}

fn invalid(key: &str, expected: &str, value: &Value) -> Error {
    Error::validation_with_context(
        format!("Override '{}' must be {}", key, expected),
        ErrorContext::new()
            .with_field_path(format!("overrides.{}", key))
            .with_details(format!("got {}", value))
            .with_source("extra_overrides"),
    )
}

fn string_value(key: &str, value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(invalid(key, "a string", &other)),
    }
}

fn timeout_value(key: &str, value: Value) -> Result<TimeoutSpec> {
    serde_json::from_value::<TimeoutSpec>(value.clone())
        .map_err(|_| invalid(key, "seconds, a duration string or a structured timeout", &value))
}

fn retries_value(key: &str, value: &Value) -> Result<u32> {
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<u32>().ok()))
        .ok_or_else(|| invalid(key, "a non-negative integer", value))
}
