//! HTTP transport shared by the built-in backends.

pub mod http;

pub use http::{HttpRequest, HttpResponse, HttpTransport};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}
