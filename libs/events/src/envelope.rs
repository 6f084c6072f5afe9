//! Tagged event wrapper and line decoding.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EventError;
use crate::types::{event_types, JobCompleted, JobStarted};

/// One event delivered by the message session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScaleEvent {
    /// A job started on a runner.
    JobStarted(JobStarted),

    /// A job completed on a runner.
    JobCompleted(JobCompleted),

    /// Number of jobs currently waiting for, or assigned to, a runner.
    DesiredCount { count: u32 },
}

impl ScaleEvent {
    /// Decode a single JSON line.
    ///
    /// Distinguishes unknown tags from malformed payloads so the caller can
    /// report which side of the protocol drifted.
    pub fn from_json(line: &str) -> Result<Self, EventError> {
        let value: Value = serde_json::from_str(line)?;

        let event_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| EventError::InvalidPayload("missing `type` tag".to_string()))?;

        if !event_types::ALL.contains(&event_type) {
            return Err(EventError::UnknownEventType(event_type.to_string()));
        }

        serde_json::from_value(value).map_err(|e| EventError::InvalidPayload(e.to_string()))
    }

    /// The wire tag of this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            ScaleEvent::JobStarted(_) => event_types::JOB_STARTED,
            ScaleEvent::JobCompleted(_) => event_types::JOB_COMPLETED,
            ScaleEvent::DesiredCount { .. } => event_types::DESIRED_COUNT,
        }
    }
}

impl fmt::Display for ScaleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_type())
    }
}
