use std::path::Path;
use std::sync::Arc;

use super::{Dispatcher, DispatcherInner, UnknownKeyPolicy, DEFAULT_PROVIDER};
use crate::bridge::AsyncBridge;
use crate::config::{ConfigResolver, EnvSource, ProcessDefaults, SystemEnv};
use crate::registry::{ProviderDescriptor, ProviderRegistry};
use crate::{Error, ErrorContext, Result};

/// Builder for [`Dispatcher`].
///
/// Starts from the built-in `openai` and `azure` providers, empty process defaults and
/// the real process environment.
pub struct DispatcherBuilder {
    registry: ProviderRegistry,
    defaults: ProcessDefaults,
    env: Arc<dyn EnvSource>,
    max_inflight: Option<usize>,
    unknown_keys: UnknownKeyPolicy,
    default_provider: String,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            registry: ProviderRegistry::with_defaults(),
            defaults: ProcessDefaults::default(),
            env: Arc::new(SystemEnv),
            max_inflight: None,
            unknown_keys: UnknownKeyPolicy::default(),
            default_provider: DEFAULT_PROVIDER.to_string(),
        }
    }

    /// Replace the whole provider table.
    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Add (or replace) a single provider.
    pub fn register(mut self, descriptor: ProviderDescriptor) -> Self {
        self.registry.register(descriptor);
        self
    }

    pub fn process_defaults(mut self, defaults: ProcessDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Load process defaults from a YAML file.
    pub fn process_defaults_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.defaults = ProcessDefaults::from_yaml_file(path)?;
        Ok(self)
    }

    /// Environment lookup used for the env layer. Tests inject a [`crate::config::MapEnv`].
    pub fn env_source(mut self, env: Arc<dyn EnvSource>) -> Self {
        self.env = env;
        self
    }

    /// Limit concurrent non-blocking calls.
    ///
    /// Without this, `AI_LIB_MAX_INFLIGHT` is consulted at build time.
    pub fn max_inflight(mut self, n: usize) -> Self {
        self.max_inflight = Some(n.max(1));
        self
    }

    pub fn unknown_keys(mut self, policy: UnknownKeyPolicy) -> Self {
        self.unknown_keys = policy;
        self
    }

    /// Provider used when a call does not name one. Defaults to `openai`.
    pub fn default_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.default_provider = provider_id.into();
        self
    }

    pub fn build(self) -> Result<Dispatcher> {
        if !self.registry.contains(&self.default_provider) {
            return Err(Error::configuration_with_context(
                format!(
                    "default provider '{}' is not registered (known: {})",
                    self.default_provider,
                    self.registry.provider_ids().join(", ")
                ),
                ErrorContext::new()
                    .with_field_path("default_provider")
                    .with_source("dispatcher_builder"),
            ));
        }

        let bridge = match self.max_inflight {
            Some(n) => AsyncBridge::bounded(n),
            None => AsyncBridge::from_lookup(|key| self.env.get(key)),
        };

        Ok(Dispatcher {
            inner: Arc::new(DispatcherInner {
                registry: self.registry,
                resolver: ConfigResolver::new(self.defaults, self.env),
                bridge,
                unknown_keys: self.unknown_keys,
                default_provider: self.default_provider,
            }),
        })
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
