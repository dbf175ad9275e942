//! Schedule validity checking.
//!
//! A schedule is valid when every edge's obligation is satisfied at each
//! occurrence of its target, under the same replay semantics the repair
//! engine uses. Validation is implemented as a dry repair: a valid schedule
//! is exactly a fixpoint of [`repair_schedule`], so the first divergence
//! between the schedule and its repair is the first violation.

use thiserror::Error;

use crate::error::ScheduleError;
use crate::graph::groups::GroupLayout;
use crate::graph::model::StatementGraph;
use crate::graph::node::StatementId;

use super::repair::{InvalidationState, repair_schedule};
use super::schedule::Schedule;

/// The first defect found in a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    /// The schedule's obligations cannot be satisfied at all.
    #[error(transparent)]
    Unsatisfiable(ScheduleError),

    /// An obligation at `position` lacks its witness; a valid schedule
    /// executes `missing` first.
    #[error("missing execution of {missing} before position {position}")]
    MissingExecution {
        /// Index into the schedule where the repair diverges.
        position: usize,
        /// The execution a valid schedule inserts there.
        missing: StatementId,
    },

    /// The schedule ends with obligations still pending; a valid schedule
    /// appends these executions.
    #[error("schedule ends with pending obligations; missing tail {appended:?}")]
    MissingTail {
        /// The executions a valid schedule appends.
        appended: Vec<StatementId>,
    },
}

/// Verifies a schedule occurrence-by-occurrence.
///
/// # Errors
///
/// Returns the first [`Violation`] found, scanning left to right.
pub fn validate_schedule(
    graph: &StatementGraph,
    groups: &GroupLayout,
    schedule: &Schedule,
    invalidation: &InvalidationState,
) -> Result<(), Violation> {
    let repaired = repair_schedule(graph, groups, schedule, invalidation)
        .map_err(Violation::Unsatisfiable)?;
    if repaired == *schedule {
        return Ok(());
    }

    let divergence = schedule
        .steps()
        .iter()
        .zip(repaired.steps())
        .position(|(a, b)| a != b)
        .unwrap_or(schedule.len());

    if divergence < schedule.len() {
        Err(Violation::MissingExecution {
            position: divergence,
            missing: repaired.steps()[divergence],
        })
    } else {
        Err(Violation::MissingTail {
            appended: repaired.steps()[divergence..].to_vec(),
        })
    }
}
