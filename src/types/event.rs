//! Job events and list pagination.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of a fine-tuning job's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FineTuningJobEvent {
    pub id: String,
    #[serde(default = "default_event_object")]
    pub object: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub level: Option<String>,
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

fn default_event_object() -> String {
    "fine_tuning.job.event".to_string()
}

/// Cursor-paginated list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "default_list_object")]
    pub object: String,
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

fn default_list_object() -> String {
    "list".to_string()
}

impl<T> Page<T> {
    /// Cursor for the next page, i.e. the id of the last item, when more items exist.
    pub fn next_cursor<'a>(&'a self, id_of: impl Fn(&'a T) -> &'a str) -> Option<&'a str> {
        if !self.has_more {
            return None;
        }
        self.data.last().map(id_of)
    }
}
