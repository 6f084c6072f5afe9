//! Scaler: turns session events into runner resource updates.
//!
//! The listener calls the three handlers strictly one at a time, in session
//! order. Job lifecycle events only mark the decision state dirty (and, for
//! started jobs, annotate the runner); desired-count events run the
//! [`Sequencer`] and patch the runner set.

pub mod patch;
pub mod sequencer;

use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::error::ErrorResponse;
use kube::Client;
use poolscale_events::{JobCompleted, JobStarted};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::resources::{self, EphemeralRunner, EphemeralRunnerSet};

pub use sequencer::{Decision, RunnerBounds, Sequencer, IDLE_PATCH_ID};

/// Scaler errors.
#[derive(Debug, Error)]
pub enum ScalerError {
    /// Building a merge patch failed.
    #[error("failed to encode merge patch: {0}")]
    Encode(#[from] serde_json::Error),

    /// The cluster API rejected or failed the update.
    #[error(transparent)]
    Cluster(#[from] kube::Error),
}

/// Whether `err` reports that the target object does not exist (anymore).
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ErrorResponse { code: 404, .. }))
}

/// Operations the listener drives, one event at a time.
#[async_trait]
pub trait ScaleHandler: Send {
    /// A job started on a runner.
    async fn handle_job_started(&mut self, job: &JobStarted) -> Result<(), ScalerError>;

    /// A job completed on a runner.
    async fn handle_job_completed(&mut self, job: &JobCompleted) -> Result<(), ScalerError>;

    /// The session reported how many jobs want a runner. Returns the applied target.
    async fn handle_desired_count(&mut self, count: u32) -> Result<i32, ScalerError>;
}

/// Scaler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalerConfig {
    /// Namespace of the runner set and its runners.
    pub namespace: String,

    /// Name of the runner set.
    pub name: String,

    pub bounds: RunnerBounds,
}

/// Drives one `EphemeralRunnerSet`.
///
/// Exclusively owned by the listener task. State advances before the
/// cluster call and is not rolled back when the call fails; the next
/// evaluation starts from the advanced state.
pub struct Scaler {
    runners: Api<EphemeralRunner>,
    runner_sets: Api<EphemeralRunnerSet>,
    namespace: String,
    name: String,
    sequencer: Sequencer,
}

impl Scaler {
    pub fn new(config: ScalerConfig, client: Client) -> Self {
        Self {
            runners: Api::namespaced(client.clone(), &config.namespace),
            runner_sets: Api::namespaced(client, &config.namespace),
            namespace: config.namespace,
            name: config.name,
            sequencer: Sequencer::new(config.bounds),
        }
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }
}

#[async_trait]
impl ScaleHandler for Scaler {
    async fn handle_job_started(&mut self, job: &JobStarted) -> Result<(), ScalerError> {
        info!(
            runner_name = %job.runner_name,
            owner_name = %job.owner_name,
            repo_name = %job.repository_name,
            job_id = %job.job_id,
            workflow_ref = %job.job_workflow_ref,
            workflow_run_id = job.workflow_run_id,
            job_display_name = %job.job_display_name,
            request_id = job.runner_request_id,
            "Updating job info for the runner"
        );

        self.sequencer.mark_dirty();

        let patch = resources::job_status_patch(job)?;
        debug!(runner_name = %job.runner_name, patch = %patch, "Patching ephemeral runner status");

        match self
            .runners
            .patch_status(&job.runner_name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
        {
            Ok(_) => {
                info!(runner_name = %job.runner_name, "Ephemeral runner status updated");
                Ok(())
            }
            Err(e) if is_not_found(&e) => {
                info!(
                    runner_name = %job.runner_name,
                    "Ephemeral runner not found, skipping status update"
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    runner_name = %job.runner_name,
                    patch = %patch,
                    error = %e,
                    "Failed to patch ephemeral runner status"
                );
                Err(e.into())
            }
        }
    }

    async fn handle_job_completed(&mut self, job: &JobCompleted) -> Result<(), ScalerError> {
        debug!(
            runner_name = %job.runner_name,
            job_id = %job.job_id,
            result = %job.result,
            "Job completed"
        );
        self.sequencer.mark_dirty();
        Ok(())
    }

    async fn handle_desired_count(&mut self, count: u32) -> Result<i32, ScalerError> {
        let decision = self.sequencer.evaluate(count);

        let patch = resources::scale_patch(decision.target_runners, decision.patch_id)?;
        debug!(patch = %patch, "Preparing ephemeral runner set update");

        let patched = match self
            .runner_sets
            .patch(&self.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
        {
            Ok(patched) => patched,
            Err(e) => {
                error!(
                    namespace = %self.namespace,
                    name = %self.name,
                    patch = %patch,
                    error = %e,
                    "Failed to patch ephemeral runner set"
                );
                return Err(e.into());
            }
        };

        info!(
            namespace = %self.namespace,
            name = %self.name,
            replicas = patched.spec.replicas,
            patch_id = decision.patch_id,
            "Ephemeral runner set scaled"
        );

        Ok(decision.target_runners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("request failed with {code}"),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn test_not_found_detection() {
        assert!(is_not_found(&api_error(404, "NotFound")));
        assert!(!is_not_found(&api_error(409, "Conflict")));
        assert!(!is_not_found(&api_error(500, "InternalError")));
    }
}
