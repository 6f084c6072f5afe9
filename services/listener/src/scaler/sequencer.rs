//! Replica target and patch id sequencing.
//!
//! The session may report the desired count far more often than the pool
//! actually changes size. Every evaluation advances a private sequence, but
//! the id published to the pool resource collapses to the sentinel `0` when
//! nothing happened since the last evaluation and the pool sits at its floor.
//! Any job lifecycle event in between marks the state dirty and forces a
//! fresh, strictly increasing id so the controller sees the change.

use tracing::info;

/// Patch id published when there is nothing new to apply at the floor.
pub const IDLE_PATCH_ID: i32 = 0;

/// Replica bounds of the runner pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerBounds {
    pub min_runners: i32,
    pub max_runners: i32,
}

/// Outcome of one desired-count evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Id to stamp on the pool resource patch.
    pub patch_id: i32,

    /// Replica count to request.
    pub target_runners: i32,
}

/// Decision state for one runner pool.
///
/// Single writer: the owning scaler is driven by one listener task, so the
/// state is plain fields behind `&mut self`.
#[derive(Debug)]
pub struct Sequencer {
    bounds: RunnerBounds,
    target_runners: Option<i32>,
    patch_seq: Option<i32>,
    dirty: bool,
}

impl Sequencer {
    pub fn new(bounds: RunnerBounds) -> Self {
        Self {
            bounds,
            target_runners: None,
            patch_seq: None,
            dirty: false,
        }
    }

    /// Last computed target, `None` before the first evaluation.
    pub fn target_runners(&self) -> Option<i32> {
        self.target_runners
    }

    /// Last sequence value, `None` before the first evaluation.
    pub fn patch_seq(&self) -> Option<i32> {
        self.patch_seq
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Record that a job lifecycle event happened since the last evaluation.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Compute the next target and patch id for `assigned` jobs.
    pub fn evaluate(&mut self, assigned: u32) -> Decision {
        let dirty = std::mem::take(&mut self.dirty);

        let patch_seq = match self.patch_seq {
            None => 0,
            Some(i32::MAX) => 1,
            Some(seq) => seq + 1,
        };
        self.patch_seq = Some(patch_seq);

        let RunnerBounds {
            min_runners,
            max_runners,
        } = self.bounds;
        let wanted = i64::from(min_runners) + i64::from(assigned);
        // max_runners is an i32, so the clamped value always fits.
        let target_runners = wanted.min(i64::from(max_runners)) as i32;

        let previous = self.target_runners.replace(target_runners);

        let patch_id = if !dirty
            && previous == Some(target_runners)
            && target_runners == min_runners
        {
            IDLE_PATCH_ID
        } else {
            patch_seq
        };

        info!(
            assigned_jobs = assigned,
            decision = target_runners,
            min = min_runners,
            max = max_runners,
            dirty,
            patch_seq,
            patch_id,
            "Calculated target runner count"
        );

        Decision {
            patch_id,
            target_runners,
        }
    }
}
