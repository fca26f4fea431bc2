//! Print job - one delegated label run

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::label::LabelSpec;

/// A print job travelling over the job channel
///
/// Created by the requesting terminal, consumed exactly once by the chosen
/// executor (retried deliveries are deduplicated by `job_id`), terminated
/// by ack/nack or the requester's timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintJob {
    pub job_id: Uuid,
    pub requesting_terminal: String,
    pub spec: LabelSpec,
    /// Unix millis at creation
    pub issued_at: i64,
}

impl PrintJob {
    pub fn new(requesting_terminal: impl Into<String>, spec: LabelSpec) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            requesting_terminal: requesting_terminal.into(),
            spec,
            issued_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}
