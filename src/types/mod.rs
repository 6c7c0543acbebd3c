//! # Types Module
//!
//! Provider-agnostic data types for fine-tuning job operations.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`FineTuningJobCreate`] | Payload for creating a job |
//! | [`FineTuningJob`] | Job record returned by every job-level operation |
//! | [`FineTuningJobEvent`] | One entry of a job's event log |
//! | [`Page`] | Cursor-paginated list wrapper |
//! | [`ListJobs`], [`RetrieveJob`], [`CancelJob`], [`ListJobEvents`] | Payloads for the other operations |
//!
//! ## Example
//!
//! ```rust
//! use ai_lib_dispatch::types::{FineTuningJobCreate, Hyperparameters, HyperparameterValue};
//!
//! let create = FineTuningJobCreate::new("gpt-4o-mini-2024-07-18", "file-abc123")
//!     .with_suffix("support-bot")
//!     .with_hyperparameters(Hyperparameters {
//!         n_epochs: Some(HyperparameterValue::Integer(3)),
//!         ..Default::default()
//!     });
//! assert_eq!(create.suffix.as_deref(), Some("support-bot"));
//! ```

pub mod event;
pub mod job;
pub mod operation;

pub use event::{FineTuningJobEvent, Page};
pub use job::{
    FineTuningJob, FineTuningJobCreate, Hyperparameters, HyperparameterValue, Integration,
    JobError, JobStatus, WandbIntegration,
};
pub use operation::{CancelJob, ListJobEvents, ListJobs, Operation, RetrieveJob};
