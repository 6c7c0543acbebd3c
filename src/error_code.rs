//! Standard error codes for classifying backend failures.
//!
//! Backends map an upstream HTTP status (and, when present, the provider's own error
//! code string) onto one of these codes. The code decides whether a backend retries
//! the attempt; the dispatcher never reinterprets it.
//!
//! | Prefix | Category    |
//! |--------|-------------|
//! | E1xxx  | client      |
//! | E2xxx  | rate        |
//! | E3xxx  | server      |
//! | E4xxx  | operational |
//! | E9xxx  | unknown     |
//!
//! ```rust
//! use ai_lib_dispatch::error_code::StandardErrorCode;
//!
//! let code = StandardErrorCode::classify(429, None);
//! assert_eq!(code.code(), "E2001");
//! assert!(code.retryable());
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardErrorCode {
    /// E1001: malformed request or invalid parameters (bad training file, unknown model)
    InvalidRequest,
    /// E1002: invalid, expired, or missing API key
    Authentication,
    /// E1003: valid credentials without fine-tuning permission
    PermissionDenied,
    /// E1004: job or file does not exist
    NotFound,
    /// E2001: request rate limit exceeded
    RateLimited,
    /// E2002: account quota or billing limit reached
    QuotaExhausted,
    /// E3001: internal server error on provider side
    ServerError,
    /// E3002: provider temporarily overloaded
    Overloaded,
    /// E3003: request timed out before response received
    Timeout,
    /// E4001: job state conflict (e.g., cancelling a finished job)
    Conflict,
    /// E9999: could not be classified
    Unknown,
}

impl StandardErrorCode {
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "E1001",
            Self::Authentication => "E1002",
            Self::PermissionDenied => "E1003",
            Self::NotFound => "E1004",
            Self::RateLimited => "E2001",
            Self::QuotaExhausted => "E2002",
            Self::ServerError => "E3001",
            Self::Overloaded => "E3002",
            Self::Timeout => "E3003",
            Self::Conflict => "E4001",
            Self::Unknown => "E9999",
        }
    }

    /// Whether a backend should spend one of its `max_retries` on this failure.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError | Self::Overloaded | Self::Timeout
        )
    }

    /// Maps a provider error code/type string (OpenAI-style `error.code` or `error.type`).
    pub fn from_provider_code(provider_code: &str) -> Option<Self> {
        let code = match provider_code {
            "invalid_request" | "invalid_request_error" | "invalid_training_file"
            | "invalid_value" => Self::InvalidRequest,
            "authentication" | "invalid_api_key" | "authentication_error" => Self::Authentication,
            "permission_denied" | "permission_error" => Self::PermissionDenied,
            "not_found" | "model_not_found" | "fine_tune_not_found" => Self::NotFound,
            "rate_limited" | "rate_limit_exceeded" => Self::RateLimited,
            "quota_exhausted" | "insufficient_quota" => Self::QuotaExhausted,
            "server_error" => Self::ServerError,
            "overloaded" | "overloaded_error" => Self::Overloaded,
            "timeout" => Self::Timeout,
            "conflict" => Self::Conflict,
            _ => return None,
        };
        Some(code)
    }

    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::InvalidRequest,
            401 => Self::Authentication,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            408 | 504 => Self::Timeout,
            409 => Self::Conflict,
            429 => Self::RateLimited,
            500 | 502 => Self::ServerError,
            503 | 529 => Self::Overloaded,
            s if (500..600).contains(&s) => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Provider code wins when recognized; the HTTP status decides otherwise.
    pub fn classify(status: u16, provider_code: Option<&str>) -> Self {
        provider_code
            .and_then(Self::from_provider_code)
            .unwrap_or_else(|| Self::from_http_status(status))
    }
}

impl fmt::Display for StandardErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_code_overrides_status() {
        // OpenAI answers 429 for both throttling and exhausted quota.
        let code = StandardErrorCode::classify(429, Some("insufficient_quota"));
        assert_eq!(code, StandardErrorCode::QuotaExhausted);
        assert!(!code.retryable());
    }

    #[test]
    fn unknown_provider_code_falls_back_to_status() {
        let code = StandardErrorCode::classify(503, Some("something_new"));
        assert_eq!(code, StandardErrorCode::Overloaded);
        assert!(code.retryable());
    }

    #[test]
    fn client_errors_are_not_retryable() {
        for status in [400u16, 401, 403, 404, 409] {
            assert!(
                !StandardErrorCode::from_http_status(status).retryable(),
                "status {} should not be retried",
                status
            );
        }
    }

    #[test]
    fn unmapped_5xx_is_server_error() {
        assert_eq!(
            StandardErrorCode::from_http_status(599),
            StandardErrorCode::ServerError
        );
        assert_eq!(
            StandardErrorCode::from_http_status(302),
            StandardErrorCode::Unknown
        );
    }
}
