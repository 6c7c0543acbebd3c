//! Provider registry: maps a provider id to its capability descriptor and backend.
//!
//! The registry is populated once while building a [`crate::Dispatcher`] and is read-only
//! afterwards, so lookups need no locking.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::backend::FineTuningBackend;
use crate::types::Operation;
use crate::{Error, Result};

/// Environment variable names a provider reads its defaults from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvKeys {
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub organization: Option<String>,
    pub timeout: Option<String>,
    pub max_retries: Option<String>,
    /// Variables for provider-specific accepted keys: `(override key, env var)`.
    pub extra: Vec<(String, String)>,
}

impl EnvKeys {
    /// Conventional `<PREFIX>_API_BASE`, `<PREFIX>_API_KEY`, `<PREFIX>_ORGANIZATION`.
    pub fn with_prefix(prefix: &str) -> Self {
        let prefix = prefix.replace('-', "_").to_uppercase();
        Self {
            api_base: Some(format!("{}_API_BASE", prefix)),
            api_key: Some(format!("{}_API_KEY", prefix)),
            organization: Some(format!("{}_ORGANIZATION", prefix)),
            ..Default::default()
        }
    }

    pub fn env_for(&self, key: &str) -> Option<&str> {
        self.extra
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Invocation modes a provider can be reached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvocationModes {
    pub blocking: bool,
    pub non_blocking: bool,
}

impl InvocationModes {
    pub const BOTH: Self = Self {
        blocking: true,
        non_blocking: true,
    };

    pub fn allows(&self, is_async: bool) -> bool {
        if is_async {
            self.non_blocking
        } else {
            self.blocking
        }
    }
}

impl Default for InvocationModes {
    fn default() -> Self {
        Self::BOTH
    }
}

/// Static description of a provider: capabilities, config sources and backend.
#[derive(Clone)]
pub struct ProviderDescriptor {
    pub id: String,
    pub supports_structured_timeout: bool,
    pub invocation: InvocationModes,
    pub env: EnvKeys,
    /// Endpoint used when nothing else supplies `api_base`.
    pub default_api_base: Option<String>,
    pub credential_required: bool,
    /// Provider-specific override keys forwarded to the backend (e.g. `api_version`).
    pub accepted_keys: Vec<String>,
    pub backend: Arc<dyn FineTuningBackend>,
}

impl ProviderDescriptor {
    pub fn new(id: impl Into<String>, backend: Arc<dyn FineTuningBackend>) -> Self {
        let id = id.into();
        Self {
            env: EnvKeys::with_prefix(&id),
            id,
            supports_structured_timeout: false,
            invocation: InvocationModes::BOTH,
            default_api_base: None,
            credential_required: false,
            accepted_keys: Vec::new(),
            backend,
        }
    }

    pub fn structured_timeout(mut self, supported: bool) -> Self {
        self.supports_structured_timeout = supported;
        self
    }

    pub fn invocation(mut self, modes: InvocationModes) -> Self {
        self.invocation = modes;
        self
    }

    pub fn env(mut self, env: EnvKeys) -> Self {
        self.env = env;
        self
    }

    pub fn default_api_base(mut self, url: impl Into<String>) -> Self {
        self.default_api_base = Some(url.into());
        self
    }

    pub fn credential_required(mut self, required: bool) -> Self {
        self.credential_required = required;
        self
    }

    pub fn accept_key(mut self, key: impl Into<String>) -> Self {
        self.accepted_keys.push(key.into());
        self
    }

    pub fn accepts(&self, key: &str) -> bool {
        self.accepted_keys.iter().any(|k| k == key)
    }
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("id", &self.id)
            .field("supports_structured_timeout", &self.supports_structured_timeout)
            .field("invocation", &self.invocation)
            .field("env", &self.env)
            .field("default_api_base", &self.default_api_base)
            .field("credential_required", &self.credential_required)
            .field("accepted_keys", &self.accepted_keys)
            .finish_non_exhaustive()
    }
}

/// Provider id → descriptor table.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<ProviderDescriptor>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `openai` and `azure` providers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(crate::backend::openai::openai_descriptor());
        registry.register(crate::backend::openai::azure_descriptor());
        registry
    }

    /// Register (or replace) a provider. Returns the descriptor it replaced, if any.
    pub fn register(&mut self, descriptor: ProviderDescriptor) -> Option<Arc<ProviderDescriptor>> {
        self.providers
            .insert(descriptor.id.clone(), Arc::new(descriptor))
    }

    pub fn lookup(&self, provider_id: &str, operation: Operation) -> Result<Arc<ProviderDescriptor>> {
        self.providers
            .get(provider_id)
            .cloned()
            .ok_or_else(|| Error::unsupported_provider(provider_id, operation.name()))
    }

    pub fn contains(&self, provider_id: &str) -> bool {
        self.providers.contains_key(provider_id)
    }

    /// Registered provider ids, sorted.
    pub fn provider_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
