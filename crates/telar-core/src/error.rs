//! Error types for graph construction and scheduling.

use thiserror::Error;

use crate::graph::node::{GroupId, StatementId};

/// Errors raised while building the statement graph or group layout.
///
/// All variants are configuration errors: they are rejected before any
/// scheduling takes place and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// An edge references a statement index outside `0..N`.
    #[error("edge {source} → {target} references a statement outside 0..{node_count}")]
    NodeOutOfRange {
        /// Source statement of the offending edge.
        source: StatementId,
        /// Target statement of the offending edge.
        target: StatementId,
        /// Number of statements in the graph.
        node_count: usize,
    },

    /// An edge was added with an empty kind set.
    #[error("edge {source} → {target} carries no dependency kinds")]
    EmptyKindSet {
        /// Source statement of the offending edge.
        source: StatementId,
        /// Target statement of the offending edge.
        target: StatementId,
    },

    /// A statement index outside `0..N` was assigned to a group.
    #[error("statement {statement} assigned to {group} is outside 0..{node_count}")]
    StatementOutOfRange {
        /// The out-of-range statement.
        statement: StatementId,
        /// The group it was assigned to.
        group: GroupId,
        /// Number of statements in the layout.
        node_count: usize,
    },

    /// Group nesting contains a cycle (a group transitively contains itself).
    #[error("cyclic group nesting through {groups:?}")]
    GroupCycle {
        /// The groups on the cyclic containment chain.
        groups: Vec<GroupId>,
    },
}

/// Errors raised by the topological scheduler and the repair engine.
///
/// Both variants are fatal for the current compilation; the front end (or a
/// human) diagnoses the model from the implicated statement indices.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// The graph or group layout was malformed; scheduling never started.
    #[error(transparent)]
    Malformed(#[from] GraphError),

    /// No topological order exists at the `Dependency` level.
    ///
    /// Carries every member of the non-trivial strongly connected components
    /// among the unschedulable statements.
    #[error("dependency cycle through statements {nodes:?}")]
    DependencyCycle {
        /// Statements participating in the cycle(s).
        nodes: Vec<StatementId>,
    },

    /// A `Fresh` cycle cannot be resolved against `Requirement` or
    /// initialization constraints.
    #[error("fresh cycle through {nodes:?} cannot be satisfied: {blocked_on} has never executed and is not initialized")]
    FreshCycleUnsatisfiable {
        /// Statements on the offending cycle.
        nodes: Vec<StatementId>,
        /// The statement whose missing value blocks the cycle.
        blocked_on: StatementId,
    },
}
