//! # ai-lib-dispatch
//!
//! Provider-agnostic dispatcher for fine-tuning job operations.
//!
//! ## Overview
//!
//! One call names an operation and (optionally) a provider. The dispatcher resolves the
//! effective endpoint, credential, organization, timeout and retry count through a fixed
//! precedence chain, reconciles the timeout with what the provider can express, and hands
//! everything to the provider's backend. Every operation can be called blocking or
//! non-blocking; the non-blocking form runs the same code through an [`AsyncBridge`].
//!
//! ## Precedence
//!
//! For each setting the first non-empty source wins:
//!
//! 1. explicit builder setters, then the raw overrides bag
//! 2. [`ProcessDefaults`]
//! 3. the provider's environment variables (`OPENAI_API_KEY`, `AZURE_API_BASE`, ...)
//! 4. fallback: the provider's default endpoint, a 600 s timeout
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_lib_dispatch::Dispatcher;
//!
//! #[tokio::main]
//! async fn main() -> ai_lib_dispatch::Result<()> {
//!     let dispatcher = Dispatcher::new()?;
//!
//!     let job = dispatcher
//!         .create_job("gpt-4o-mini-2024-07-18", "file-abc123")
//!         .suffix("support-bot")
//!         .override_value("request_timeout", serde_json::json!(120))
//!         .execute_async()
//!         .await?;
//!     println!("{} is {:?}", job.id, job.status);
//!
//!     let events = dispatcher
//!         .list_job_events(&job.id)
//!         .provider("openai")
//!         .limit(10)
//!         .execute_async()
//!         .await?;
//!     for event in events.data {
//!         println!("{}", event.message);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`dispatcher`] | Entry point, builders, unknown-key policy |
//! | [`config`] | Process defaults, overrides, env sources, resolution |
//! | [`timeout`] | Timeout shapes and normalization |
//! | [`registry`] | Provider descriptors and lookup |
//! | [`backend`] | Backend trait, outcomes, the OpenAI-compatible backend |
//! | [`bridge`] | Blocking-to-async bridge |
//! | [`context`] | Ambient call-local context |
//! | [`transport`] | HTTP plumbing for the built-in backends |
//! | [`types`] | Job, event and payload types |
//! | [`telemetry`] | Opt-in log subscriber |

pub mod backend;
pub mod bridge;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error_code;
pub mod registry;
pub mod telemetry;
pub mod timeout;
pub mod transport;
pub mod types;

pub use backend::{BackendCall, FineTuningBackend, FineTuningOperation, Outcome};
pub use bridge::AsyncBridge;
pub use config::{ConfigResolver, ExtraOverrides, ProcessDefaults, ResolvedConfig};
pub use context::AmbientContext;
pub use dispatcher::{Dispatcher, DispatcherBuilder, UnknownKeyPolicy};
pub use registry::{ProviderDescriptor, ProviderRegistry};
pub use timeout::{BackendTimeout, StructuredTimeout, TimeoutSpec};
pub use types::{FineTuningJob, FineTuningJobCreate, FineTuningJobEvent, JobStatus, Page};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, ErrorKind, ErrorReport};
