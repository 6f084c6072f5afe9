//! Payload types for session events.

use serde::{Deserialize, Serialize};

// =============================================================================
// Event Type Constants
// =============================================================================

/// All event type tags as constants.
pub mod event_types {
    pub const JOB_STARTED: &str = "job_started";
    pub const JOB_COMPLETED: &str = "job_completed";
    pub const DESIRED_COUNT: &str = "desired_count";

    /// Every tag the listener understands.
    pub const ALL: &[&str] = &[JOB_STARTED, JOB_COMPLETED, DESIRED_COUNT];
}

// =============================================================================
// Job Events
// =============================================================================

/// A job was assigned to and started on an ephemeral runner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStarted {
    /// Name of the `EphemeralRunner` resource executing the job.
    pub runner_name: String,

    /// Request id the session assigned to the runner acquisition.
    #[serde(default)]
    pub runner_request_id: i64,

    /// Repository owner (user or organization).
    #[serde(default)]
    pub owner_name: String,

    /// Repository name without the owner.
    #[serde(default)]
    pub repository_name: String,

    #[serde(default)]
    pub job_id: String,

    /// Fully qualified workflow ref (`owner/repo/.github/workflows/ci.yml@refs/heads/main`).
    #[serde(default)]
    pub job_workflow_ref: String,

    #[serde(default)]
    pub workflow_run_id: i64,

    #[serde(default)]
    pub job_display_name: String,
}

impl JobStarted {
    /// `owner/repository`, the form recorded on the runner status.
    pub fn repository_full_name(&self) -> String {
        format!("{}/{}", self.owner_name, self.repository_name)
    }
}

/// A job finished on an ephemeral runner.
///
/// Only the occurrence matters for scaling; the fields are kept for logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCompleted {
    #[serde(default)]
    pub runner_name: String,

    #[serde(default)]
    pub runner_request_id: i64,

    #[serde(default)]
    pub job_id: String,

    /// Conclusion reported by the session (`succeeded`, `failed`, `canceled`, ...).
    #[serde(default)]
    pub result: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> JobStarted {
        JobStarted {
            runner_name: "pool-runner-x7k2p".to_string(),
            runner_request_id: 42,
            owner_name: "acme".to_string(),
            repository_name: "widgets".to_string(),
            job_id: "job-1".to_string(),
            job_workflow_ref: "acme/widgets/.github/workflows/ci.yml@refs/heads/main".to_string(),
            workflow_run_id: 9001,
            job_display_name: "build (linux)".to_string(),
        }
    }

    #[test]
    fn test_repository_full_name() {
        assert_eq!(started().repository_full_name(), "acme/widgets");
    }

    #[test]
    fn test_job_started_defaults_optional_fields() {
        let parsed: JobStarted =
            serde_json::from_str(r#"{"runner_name":"pool-runner-1"}"#).unwrap();
        assert_eq!(parsed.runner_name, "pool-runner-1");
        assert_eq!(parsed.runner_request_id, 0);
        assert!(parsed.job_display_name.is_empty());
    }

    #[test]
    fn test_job_started_requires_runner_name() {
        let result = serde_json::from_str::<JobStarted>(r#"{"job_id":"job-1"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_job_completed_accepts_empty_object() {
        let parsed: JobCompleted = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, JobCompleted::default());
    }
}
