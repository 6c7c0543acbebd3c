//! Layered configuration resolution.
//!
//! Every call resolves its effective `api_base`, credential, organization, timeout and
//! `max_retries` through the same precedence chain:
//!
//! 1. explicit call arguments / call-level overrides ([`ExtraOverrides`])
//! 2. process-wide defaults ([`ProcessDefaults`])
//! 3. environment variables named by the provider's descriptor
//! 4. hardcoded fallback (descriptor endpoint, 600 s timeout, otherwise absent)
//!
//! The first non-empty value wins and later sources are not consulted.

pub mod defaults;
pub mod env;
pub mod overrides;

pub use defaults::ProcessDefaults;
pub use env::{EnvSource, MapEnv, SystemEnv};
pub use overrides::{ExtraOverrides, RECOGNIZED_KEYS};

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

use crate::registry::ProviderDescriptor;
use crate::timeout::{TimeoutSpec, DEFAULT_TIMEOUT};
use crate::{Error, ErrorContext, Result};

/// Effective configuration for one call. Created per call and never mutated.
#[derive(Clone, PartialEq)]
pub struct ResolvedConfig {
    /// Endpoint root without a trailing slash.
    pub api_base: String,
    pub api_key: Option<String>,
    pub organization: Option<String>,
    pub timeout: TimeoutSpec,
    /// `None` leaves the retry count to the backend.
    pub max_retries: Option<u32>,
    /// Values for the descriptor's provider-specific accepted keys.
    pub provider_params: Map<String, Value>,
}

impl ResolvedConfig {
    pub fn provider_param(&self, key: &str) -> Option<&str> {
        self.provider_params.get(key).and_then(Value::as_str)
    }
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("organization", &self.organization)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("provider_params", &self.provider_params)
            .finish()
    }
}

/// Pure resolver over injected process defaults and an environment source.
#[derive(Clone)]
pub struct ConfigResolver {
    defaults: ProcessDefaults,
    env: Arc<dyn EnvSource>,
}

impl ConfigResolver {
    pub fn new(defaults: ProcessDefaults, env: Arc<dyn EnvSource>) -> Self {
        Self { defaults, env }
    }

    /// Resolver over the real process environment.
    pub fn from_system(defaults: ProcessDefaults) -> Self {
        Self::new(defaults, Arc::new(SystemEnv))
    }

    pub fn defaults(&self) -> &ProcessDefaults {
        &self.defaults
    }

    pub fn resolve(
        &self,
        overrides: &ExtraOverrides,
        descriptor: &ProviderDescriptor,
    ) -> Result<ResolvedConfig> {
        let env = &descriptor.env;

        let api_base = non_empty(overrides.api_base.as_deref())
            .or_else(|| non_empty(self.defaults.api_base.as_deref()))
            .or_else(|| self.env_value(env.api_base.as_deref()))
            .or_else(|| non_empty(descriptor.default_api_base.as_deref()))
            .ok_or_else(|| {
                Error::configuration_with_context(
                    format!("No api_base configured for provider '{}'", descriptor.id),
                    ErrorContext::new()
                        .with_field_path("api_base")
                        .with_details(hint(env.api_base.as_deref()))
                        .with_source("config_resolver"),
                )
            })?;
        let api_base = validate_api_base(api_base)?;

        let api_key = non_empty(overrides.api_key.as_deref())
            .or_else(|| non_empty(self.defaults.api_key.as_deref()))
            .or_else(|| {
                non_empty(
                    self.defaults
                        .provider_keys
                        .get(&descriptor.id)
                        .map(String::as_str),
                )
            })
            .or_else(|| self.env_value(env.api_key.as_deref()));
        if api_key.is_none() && descriptor.credential_required {
            return Err(Error::configuration_with_context(
                format!("No API key configured for provider '{}'", descriptor.id),
                ErrorContext::new()
                    .with_field_path("api_key")
                    .with_details(hint(env.api_key.as_deref()))
                    .with_source("config_resolver"),
            ));
        }

        let organization = non_empty(overrides.organization.as_deref())
            .or_else(|| non_empty(self.defaults.organization.as_deref()))
            .or_else(|| self.env_value(env.organization.as_deref()));

        let timeout = overrides
            .effective_timeout()
            .cloned()
            .or_else(|| self.defaults.timeout.clone())
            .or_else(|| {
                self.env_value(env.timeout.as_deref())
                    .map(TimeoutSpec::Text)
            })
            .unwrap_or(TimeoutSpec::Duration(DEFAULT_TIMEOUT));

        let max_retries = overrides
            .max_retries
            .or(self.defaults.max_retries)
            .or_else(|| self.env_retries(env.max_retries.as_deref()));

        let mut provider_params = Map::new();
        for key in &descriptor.accepted_keys {
            let value = overrides.other.get(key).cloned().or_else(|| {
                self.env_value(env.env_for(key))
                    .map(Value::String)
            });
            if let Some(value) = value {
                provider_params.insert(key.clone(), value);
            }
        }

        Ok(ResolvedConfig {
            api_base,
            api_key,
            organization,
            timeout,
            max_retries,
            provider_params,
        })
    }

    fn env_value(&self, var: Option<&str>) -> Option<String> {
        let value = self.env.get(var?)?;
        non_empty(Some(value.as_str()))
    }

    fn env_retries(&self, var: Option<&str>) -> Option<u32> {
        let raw = self.env_value(var)?;
        match raw.trim().parse::<u32>() {
            Ok(n) => Some(n),
            Err(_) => {
                warn!(var = var.unwrap_or_default(), value = %raw, "ignoring non-numeric max_retries");
                None
            }
        }
    }
}

impl fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("defaults", &self.defaults.api_base)
            .finish_non_exhaustive()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn hint(var: Option<&str>) -> String {
    match var {
        Some(var) => format!("set it per call, in process defaults, or via {}", var),
        None => "set it per call or in process defaults".to_string(),
    }
}

fn validate_api_base(raw: String) -> Result<String> {
    let url = url::Url::parse(&raw).map_err(|e| {
        Error::configuration_with_context(
            format!("Invalid api_base '{}': {}", raw, e),
            ErrorContext::new()
                .with_field_path("api_base")
                .with_source("config_resolver"),
        )
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::configuration_with_context(
            format!("api_base must be http(s), got '{}'", url.scheme()),
            ErrorContext::new()
                .with_field_path("api_base")
                .with_source("config_resolver"),
        ));
    }
    Ok(raw.trim_end_matches('/').to_string())
}
