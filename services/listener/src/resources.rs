//! Runner custom resources, limited to the fields the listener reads or writes.
//!
//! `EphemeralRunner` (one per job) and `EphemeralRunnerSet` (one per pool)
//! belong to the `actions.github.com/v1alpha1` API group. Everything else on
//! those objects is owned by the controller and never appears in our patches.

use kube::CustomResource;
use poolscale_events::JobStarted;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::scaler::patch::diff_against;

fn is_zero(value: &i64) -> bool {
    *value == 0
}

// =============================================================================
// EphemeralRunner
// =============================================================================

/// A single-use runner executing at most one job. The listener never touches its spec.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, JsonSchema, Serialize)]
#[kube(
    group = "actions.github.com",
    version = "v1alpha1",
    kind = "EphemeralRunner",
    namespaced,
    status = "EphemeralRunnerStatus"
)]
pub struct EphemeralRunnerSpec {}

/// Runner status. The job fields are written by the listener, the rest by the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, JsonSchema, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EphemeralRunnerStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phase: String,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub runner_id: i64,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub job_request_id: i64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub job_repository_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub job_id: String,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub workflow_run_id: i64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub job_workflow_ref: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub job_display_name: String,
}

impl EphemeralRunnerStatus {
    /// Status carrying only the job information of `job`.
    pub fn for_job(job: &JobStarted) -> Self {
        Self {
            job_request_id: job.runner_request_id,
            job_repository_name: job.repository_full_name(),
            job_id: job.job_id.clone(),
            workflow_run_id: job.workflow_run_id,
            job_workflow_ref: job.job_workflow_ref.clone(),
            job_display_name: job.job_display_name.clone(),
            ..Default::default()
        }
    }
}

/// Status merge patch annotating a runner with `job`.
pub fn job_status_patch(job: &JobStarted) -> Result<Value, serde_json::Error> {
    let status = diff_against(
        &EphemeralRunnerStatus::default(),
        &EphemeralRunnerStatus::for_job(job),
    )?;
    Ok(json!({ "status": status }))
}

// =============================================================================
// EphemeralRunnerSet
// =============================================================================

/// The runner pool whose replica count the listener drives.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Eq, Deserialize, JsonSchema, Serialize)]
#[kube(
    group = "actions.github.com",
    version = "v1alpha1",
    kind = "EphemeralRunnerSet",
    namespaced
)]
pub struct EphemeralRunnerSetSpec {
    #[serde(default)]
    pub replicas: i32,

    /// Sequence stamp of the scaling decision that produced `replicas`.
    #[serde(default, rename = "patchID")]
    pub patch_id: i32,
}

impl EphemeralRunnerSetSpec {
    /// Baseline that differs from every real decision, so both fields always land in the patch.
    pub fn unset() -> Self {
        Self::scaled(-1, -1)
    }

    pub fn scaled(replicas: i32, patch_id: i32) -> Self {
        Self { replicas, patch_id }
    }
}

/// Spec merge patch setting the pool size and its patch id.
pub fn scale_patch(replicas: i32, patch_id: i32) -> Result<Value, serde_json::Error> {
    let spec = diff_against(
        &EphemeralRunnerSetSpec::unset(),
        &EphemeralRunnerSetSpec::scaled(replicas, patch_id),
    )?;
    Ok(json!({ "spec": spec }))
}
