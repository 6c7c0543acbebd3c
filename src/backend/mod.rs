//! Backend interface.
//!
//! A backend is the provider-specific implementation of the fine-tuning operations. The
//! dispatcher hands it a [`BackendCall`] carrying the payload, the resolved configuration
//! and the normalized timeout, and receives an [`Outcome`]: either the finished result or
//! a deferred future the caller still has to await.

pub mod openai;
pub mod retry;

use std::collections::HashMap;
use std::fmt;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};

use crate::config::ResolvedConfig;
use crate::timeout::BackendTimeout;
use crate::types::{
    CancelJob, FineTuningJob, FineTuningJobCreate, FineTuningJobEvent, ListJobEvents, ListJobs,
    Operation, Page, RetrieveJob,
};
use crate::{Error, Result};

/// Result of a backend invocation.
pub enum Outcome<T> {
    Ready(T),
    Deferred(BoxFuture<'static, Result<T>>),
}

impl<T: Send + 'static> Outcome<T> {
    pub fn deferred<F>(fut: F) -> Self
    where
        F: std::future::Future<Output = Result<T>> + Send + 'static,
    {
        Outcome::Deferred(fut.boxed())
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Outcome::Ready(_))
    }

    /// Await a deferred result; a ready one is returned as is.
    pub async fn resolve(self) -> Result<T> {
        match self {
            Outcome::Ready(v) => Ok(v),
            Outcome::Deferred(fut) => fut.await,
        }
    }

    /// Drive a deferred result to completion on the current thread.
    ///
    /// Used by the blocking entry points. A deferred future that depends on a tokio
    /// reactor must not reach this path; the built-in backends only defer in
    /// non-blocking mode.
    pub fn wait(self) -> Result<T> {
        match self {
            Outcome::Ready(v) => Ok(v),
            Outcome::Deferred(fut) => futures::executor::block_on(fut),
        }
    }

    pub fn map_deferred<F>(self, f: F) -> Self
    where
        F: FnOnce(BoxFuture<'static, Result<T>>) -> BoxFuture<'static, Result<T>>,
    {
        match self {
            Outcome::Ready(v) => Outcome::Ready(v),
            Outcome::Deferred(fut) => Outcome::Deferred(f(fut)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ready(v) => f.debug_tuple("Ready").field(v).finish(),
            Outcome::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Everything a backend needs for one operation.
#[derive(Debug, Clone)]
pub struct BackendCall<P> {
    pub provider_id: String,
    pub payload: P,
    pub config: ResolvedConfig,
    pub timeout: BackendTimeout,
    pub is_async: bool,
    pub request_id: String,
    pub extra_headers: HashMap<String, String>,
    /// Merged into the JSON body of body-carrying requests.
    pub extra_body: Map<String, Value>,
    /// Unrecognized override keys the deployment chose to forward.
    pub passthrough: Map<String, Value>,
}

impl<P> BackendCall<P> {
    pub fn operation_unsupported(&self, operation: Operation) -> Error {
        Error::unsupported_provider(self.provider_id.clone(), operation.name())
    }
}

/// Provider-specific implementation of the fine-tuning operations.
///
/// Only job creation is mandatory; the other operations default to
/// [`Error::UnsupportedProvider`].
pub trait FineTuningBackend: Send + Sync {
    fn create_job(&self, call: BackendCall<FineTuningJobCreate>) -> Result<Outcome<FineTuningJob>>;

    fn list_jobs(&self, call: BackendCall<ListJobs>) -> Result<Outcome<Page<FineTuningJob>>> {
        Err(call.operation_unsupported(Operation::ListJobs))
    }

    fn retrieve_job(&self, call: BackendCall<RetrieveJob>) -> Result<Outcome<FineTuningJob>> {
        Err(call.operation_unsupported(Operation::RetrieveJob))
    }

    fn cancel_job(&self, call: BackendCall<CancelJob>) -> Result<Outcome<FineTuningJob>> {
        Err(call.operation_unsupported(Operation::CancelJob))
    }

    fn list_events(
        &self,
        call: BackendCall<ListJobEvents>,
    ) -> Result<Outcome<Page<FineTuningJobEvent>>> {
        Err(call.operation_unsupported(Operation::ListJobEvents))
    }
}

/// A payload type bound to one backend operation.
pub trait FineTuningOperation: Clone + Send + Sync + 'static {
    type Output: Send + 'static;

    const OPERATION: Operation;

    /// Reject payloads whose required parameters are empty.
    fn validate(&self) -> Result<()>;

    fn invoke(backend: &dyn FineTuningBackend, call: BackendCall<Self>) -> Result<Outcome<Self::Output>>;
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation_with_context(
            format!("{} must not be empty", field),
            crate::ErrorContext::new()
                .with_field_path(format!("request.{}", field))
                .with_source("dispatcher"),
        ));
    }
    Ok(())
}

impl FineTuningOperation for FineTuningJobCreate {
    type Output = FineTuningJob;
    const OPERATION: Operation = Operation::CreateJob;

    fn validate(&self) -> Result<()> {
        require("model", &self.model)?;
        require("training_file", &self.training_file)?;
        if let Some(file) = &self.validation_file {
            require("validation_file", file)?;
        }
        Ok(())
    }

    fn invoke(backend: &dyn FineTuningBackend, call: BackendCall<Self>) -> Result<Outcome<Self::Output>> {
        backend.create_job(call)
    }
}

impl FineTuningOperation for ListJobs {
    type Output = Page<FineTuningJob>;
    const OPERATION: Operation = Operation::ListJobs;

    fn validate(&self) -> Result<()> {
        if self.limit == Some(0) {
            return Err(Error::validation("limit must be at least 1"));
        }
        Ok(())
    }

    fn invoke(backend: &dyn FineTuningBackend, call: BackendCall<Self>) -> Result<Outcome<Self::Output>> {
        backend.list_jobs(call)
    }
}

impl FineTuningOperation for RetrieveJob {
    type Output = FineTuningJob;
    const OPERATION: Operation = Operation::RetrieveJob;

    fn validate(&self) -> Result<()> {
        require("job_id", &self.job_id)
    }

    fn invoke(backend: &dyn FineTuningBackend, call: BackendCall<Self>) -> Result<Outcome<Self::Output>> {
        backend.retrieve_job(call)
    }
}

impl FineTuningOperation for CancelJob {
    type Output = FineTuningJob;
    const OPERATION: Operation = Operation::CancelJob;

    fn validate(&self) -> Result<()> {
        require("job_id", &self.job_id)
    }

    fn invoke(backend: &dyn FineTuningBackend, call: BackendCall<Self>) -> Result<Outcome<Self::Output>> {
        backend.cancel_job(call)
    }
}

impl FineTuningOperation for ListJobEvents {
    type Output = Page<FineTuningJobEvent>;
    const OPERATION: Operation = Operation::ListJobEvents;

    fn validate(&self) -> Result<()> {
        require("job_id", &self.job_id)?;
        if self.limit == Some(0) {
            return Err(Error::validation("limit must be at least 1"));
        }
        Ok(())
    }

    fn invoke(backend: &dyn FineTuningBackend, call: BackendCall<Self>) -> Result<Outcome<Self::Output>> {
        backend.list_events(call)
    }
}
