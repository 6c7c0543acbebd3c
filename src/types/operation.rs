//! Operation identities and the payloads of the non-create operations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The operations a fine-tuning backend can be asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateJob,
    ListJobs,
    RetrieveJob,
    CancelJob,
    ListJobEvents,
}

impl Operation {
    /// Stable name used in errors, logs and spans.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateJob => "create_fine_tuning_job",
            Operation::ListJobs => "list_fine_tuning_jobs",
            Operation::RetrieveJob => "retrieve_fine_tuning_job",
            Operation::CancelJob => "cancel_fine_tuning_job",
            Operation::ListJobEvents => "list_fine_tuning_events",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// List the organization's fine-tuning jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListJobs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieveJob {
    pub job_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelJob {
    pub job_id: String,
}

/// List status events for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListJobEvents {
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Query-string pairs for cursor pagination.
pub(crate) fn page_query(after: Option<&str>, limit: Option<u32>) -> Vec<(String, String)> {
    let mut query = Vec::new();
    if let Some(after) = after {
        query.push(("after".to_string(), after.to_string()));
    }
    if let Some(limit) = limit {
        query.push(("limit".to_string(), limit.to_string()));
    }
    query
}
