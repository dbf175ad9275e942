//! Scheduling algorithms over the statement graph.
//!
//! Two producers and one checker, all deterministic and single-threaded:
//!
//! - [`topo`] — the initial grouped topological pass: one execution per
//!   statement, groups contiguous, lowest-index tie-break.
//! - [`repair`] — incremental repair of an existing schedule against an
//!   [`InvalidationState`], preserving the prior order and inserting only
//!   what obligations demand.
//! - [`validate`] — occurrence-by-occurrence validity checking, implemented
//!   as a dry repair.

pub mod repair;
pub mod schedule;
pub mod topo;
pub mod validate;

pub use repair::{InvalidationState, repair_schedule};
pub use schedule::Schedule;
pub use topo::{schedule, schedule_with_groups};
pub use validate::{Violation, validate_schedule};
