//! Process-wide defaults, injected into the resolver at construction.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::timeout::TimeoutSpec;
use crate::{Error, ErrorContext, Result};

/// Defaults shared by every call made through one dispatcher.
///
/// Loadable from YAML:
///
/// ```yaml
/// api_base: https://gateway.internal/v1
/// organization: org-platform
/// timeout: { connect: 5, read: 120 }
/// max_retries: 3
/// provider_keys:
///   openai: sk-...
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessDefaults {
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub timeout: Option<TimeoutSpec>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Per-provider credentials, consulted after `api_key`.
    #[serde(default)]
    pub provider_keys: HashMap<String, String>,
}

impl ProcessDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                format!("Invalid process defaults: {}", e),
                ErrorContext::new().with_source("process_defaults"),
            )
        })
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("Cannot read process defaults: {}", e),
                ErrorContext::new()
                    .with_field_path(path.display().to_string())
                    .with_source("process_defaults"),
            )
        })?;
        Self::from_yaml_str(&text)
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

    pub fn provider_key(mut self, provider: impl Into<String>, key: impl Into<String>) -> Self {
        self.provider_keys.insert(provider.into(), key.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeout::StructuredTimeout;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn loads_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "api_base: https://gateway.internal/v1\ntimeout:\n  connect: 5\n  read: 120\nmax_retries: 3\nprovider_keys:\n  openai: sk-file"
        )
        .unwrap();

        let defaults = ProcessDefaults::from_yaml_file(file.path()).unwrap();
        assert_eq!(defaults.api_base.as_deref(), Some("https://gateway.internal/v1"));
        assert_eq!(defaults.max_retries, Some(3));
        assert_eq!(
            defaults.timeout,
            Some(TimeoutSpec::Structured(
                StructuredTimeout::new()
                    .connect(Duration::from_secs(5))
                    .read(Duration::from_secs(120))
            ))
        );
        assert_eq!(defaults.provider_keys.get("openai").map(String::as_str), Some("sk-file"));
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = ProcessDefaults::from_yaml_str("api_bsae: typo").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let err = ProcessDefaults::from_yaml_file("/definitely/not/here.yaml").unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.source.as_deref()),
            Some("process_defaults")
        );
    }
}
