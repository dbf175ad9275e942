//! Telar Core - dependency-typed scheduling for the telar model compiler
//!
//! This crate turns a compiled probabilistic model's message-update
//! statements into executable schedules. The front end supplies statements
//! and typed dependency edges; this crate owns everything between that input
//! and the ordered execution sequence the code generator consumes.
//!
//! # Core Abstractions
//!
//! ## Graph Model
//!
//! - [`StatementGraph`] - indexed statement nodes and the typed edge arena
//! - [`DependencyEdge`] / [`EdgeKind`] / [`KindSet`] - per-pair obligation sets
//! - [`GroupLayout`] - nested iteration groups (plates) over the graph
//!
//! ## Scheduling
//!
//! - [`schedule`] / [`schedule_with_groups`] - the initial grouped
//!   topological pass (one execution per statement)
//! - [`repair_schedule`] - incremental repair of a prior schedule against an
//!   [`InvalidationState`]
//! - [`validate_schedule`] - occurrence-by-occurrence validity checking
//!
//! # Determinism
//!
//! Scheduling and repair are synchronous and deterministic: identical inputs
//! always produce an identical [`Schedule`]. Independent compilations can
//! run in parallel threads as fully separate instances; nothing here blocks
//! or suspends.
//!
//! # Example
//!
//! ```rust
//! use telar_core::{
//!     EdgeKind, GroupLayout, InvalidationState, KindSet, StatementGraph, StatementId,
//!     repair_schedule, schedule,
//! };
//!
//! // Statement 1 consumes a fresh value of statement 0.
//! let mut graph = StatementGraph::new(2);
//! graph
//!     .add_edge(
//!         StatementId::new(0),
//!         StatementId::new(1),
//!         KindSet::of(EdgeKind::Fresh),
//!     )
//!     .unwrap();
//! let groups = GroupLayout::new(2);
//!
//! let initial = schedule(&graph, &groups).unwrap();
//! assert_eq!(initial.steps(), &[StatementId::new(0), StatementId::new(1)]);
//!
//! // A later recompilation invalidates statement 0.
//! let mut invalidation = InvalidationState::new();
//! invalidation.invalidate(StatementId::new(0));
//! let repaired = repair_schedule(&graph, &groups, &initial, &invalidation).unwrap();
//! assert!(repaired.len() >= initial.len());
//! ```
//!
//! # Tracing
//!
//! Enable the `tracing` feature for step-level debug output of graph
//! mutations, schedule emission, and repair decisions.

pub mod error;
pub mod graph;
pub mod sched;

// Re-export main types at crate root
pub use error::{GraphError, ScheduleError};
pub use graph::{
    DependencyEdge, EdgeId, EdgeKind, GroupId, GroupLayout, KindSet, SchedNode, StatementGraph,
    StatementId,
};
pub use sched::{
    InvalidationState, Schedule, Violation, repair_schedule, schedule, schedule_with_groups,
    validate_schedule,
};
