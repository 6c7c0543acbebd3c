use crate::transport::TransportError;
use serde::Serialize;
use thiserror::Error;

/// Structured error context attached where the dispatcher knows more than the failing layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Provider identifier the call was routed to (e.g., "openai")
    pub provider_id: Option<String>,
    /// Operation name (e.g., "create_fine_tuning_job")
    pub operation: Option<String>,
    /// Field path or configuration key that caused the error (e.g., "overrides.api_base")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_resolver", "openai_backend")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider_id = Some(provider.into());
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Fill provider/operation only where they are not already set.
    fn fill_call(&mut self, provider: &str, operation: &str) {
        if self.provider_id.is_none() {
            self.provider_id = Some(provider.to_string());
        }
        if self.operation.is_none() {
            self.operation = Some(operation.to_string());
        }
    }
}

/// Unified error type for the dispatcher.
///
/// Only `Configuration`, `Validation` and `UnsupportedProvider` are produced by the
/// dispatcher itself; `Backend`, `Transport` and `Serialization` come from backends and
/// `Bridge` from the async bridge machinery.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Provider '{provider}' is not supported for '{operation}'")]
    UnsupportedProvider { provider: String, operation: String },

    #[error("Backend error: HTTP {status} ({code}): {message}{}", format_context(.context))]
    Backend {
        status: u16,
        code: crate::error_code::StandardErrorCode,
        message: String,
        retryable: bool,
        context: ErrorContext,
    },

    #[error("Network transport error: {source}{}", format_context(.context))]
    Transport {
        source: TransportError,
        context: ErrorContext,
    },

    #[error("Serialization error: {source}{}", format_context(.context))]
    Serialization {
        source: serde_json::Error,
        context: ErrorContext,
    },

    #[error("Dispatch bridge error: {message}{}", format_context(.context))]
    Bridge {
        message: String,
        context: ErrorContext,
    },
}

impl From<TransportError> for Error {
    fn from(source: TransportError) -> Self {
        Error::Transport {
            source,
            context: ErrorContext::new(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Error::Serialization {
            source,
            context: ErrorContext::new(),
        }
    }
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref provider) = ctx.provider_id {
        parts.push(format!("provider: {}", provider));
    }
    if let Some(ref op) = ctx.operation {
        parts.push(format!("operation: {}", op));
    }
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

/// Coarse error category exposed at the public boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Validation,
    UnsupportedProvider,
    Backend,
    Bridge,
}

/// Flat, serializable view of an [`Error`] for callers that proxy errors onward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub provider_id: Option<String>,
    pub operation: Option<String>,
    pub http_status: u16,
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::configuration_with_context(msg, ErrorContext::new())
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::validation_with_context(msg, ErrorContext::new())
    }

    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    pub fn unsupported_provider(provider: impl Into<String>, operation: impl Into<String>) -> Self {
        Error::UnsupportedProvider {
            provider: provider.into(),
            operation: operation.into(),
        }
    }

    pub fn bridge(msg: impl Into<String>) -> Self {
        Error::Bridge {
            message: msg.into(),
            context: ErrorContext::new().with_source("async_bridge"),
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Backend { context, .. }
            | Error::Transport { context, .. }
            | Error::Serialization { context, .. }
            | Error::Bridge { context, .. } => Some(context),
            Error::UnsupportedProvider { .. } => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration { .. } => ErrorKind::Configuration,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::UnsupportedProvider { .. } => ErrorKind::UnsupportedProvider,
            Error::Backend { .. } | Error::Transport { .. } | Error::Serialization { .. } => {
                ErrorKind::Backend
            }
            Error::Bridge { .. } => ErrorKind::Bridge,
        }
    }

    /// HTTP status a proxy layer should answer with for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::UnsupportedProvider { .. } | Error::Validation { .. } => 400,
            Error::Configuration { context, .. } => {
                if context.field_path.as_deref() == Some("api_key") {
                    401
                } else {
                    500
                }
            }
            Error::Backend { status, .. } => *status,
            Error::Transport { .. } | Error::Serialization { .. } => 502,
            Error::Bridge { .. } => 500,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Backend { retryable, .. } => *retryable,
            Error::Transport { .. } => true,
            _ => false,
        }
    }

    pub fn report(&self) -> ErrorReport {
        let (provider_id, operation) = match self {
            Error::UnsupportedProvider {
                provider,
                operation,
            } => (Some(provider.clone()), Some(operation.clone())),
            other => other
                .context()
                .map(|c| (c.provider_id.clone(), c.operation.clone()))
                .unwrap_or((None, None)),
        };
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            provider_id,
            operation,
            http_status: self.http_status(),
        }
    }

    /// Attach provider/operation to errors that carry a context, leaving the rest unchanged.
    pub(crate) fn in_call(mut self, provider: &str, operation: &str) -> Self {
        match &mut self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Backend { context, .. }
            | Error::Transport { context, .. }
            | Error::Serialization { context, .. }
            | Error::Bridge { context, .. } => context.fill_call(provider, operation),
            Error::UnsupportedProvider { .. } => {}
        }
        self
    }
}
