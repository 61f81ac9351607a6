//! Job specs: a job type name plus its positional arguments.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What gets queued for a normal job and stored in the finalization list.
///
/// The coordinator never looks inside `args`; they are handed back to the
/// job registered under `job_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub job_type: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
}

impl JobSpec {
    pub fn new(job_type: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            job_type: job_type.into(),
            args,
        }
    }

    pub fn without_args(job_type: impl Into<String>) -> Self {
        Self::new(job_type, Vec::new())
    }

    /// Wire form used in the finalization list.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
