//! Statement and group identifiers, and the scheduling node union.
//!
//! Statements are identified by a stable index assigned by the front end.
//! Groups (loop bodies / plates) live in their own id space; the scheduler
//! addresses both through [`SchedNode`], so a group id can never be confused
//! with a statement index.

use core::fmt;

/// Unique identifier for a statement in the graph.
///
/// Statement ids are dense indices `0..N` assigned by the front end. They
/// remain stable across scheduling passes and repairs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatementId(pub(crate) u32);

impl StatementId {
    /// Creates a statement id from a raw index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stmt[{}]", self.0)
    }
}

// `GraphError` names several display-only fields `source`; thiserror's derive
// treats any field literally named `source` as the error's cause and therefore
// requires that field's type to implement `std::error::Error`. This impl
// satisfies that bound without altering behavior (nothing calls `source()`).
impl std::error::Error for StatementId {}

/// Unique identifier for an iteration group (loop body / plate).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupId(pub(crate) u32);

impl GroupId {
    /// Creates a group id from a raw value.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group[{}]", self.0)
    }
}

/// A schedulable unit: either a single statement or a whole group.
///
/// The grouped scheduler operates over this union. Group membership collapses
/// a subtree of statements into one `Group` node at the enclosing level;
/// descending into the group expands it again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SchedNode {
    /// A single statement.
    Statement(StatementId),
    /// A group scheduled as one contiguous block.
    Group(GroupId),
}

impl SchedNode {
    /// Returns the raw id used for deterministic tie-breaking.
    #[inline]
    fn raw(self) -> u32 {
        match self {
            SchedNode::Statement(s) => s.0,
            SchedNode::Group(g) => g.0,
        }
    }
}

impl PartialOrd for SchedNode {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SchedNode {
    /// Orders by raw id; statements sort before groups on equal id.
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.raw().cmp(&other.raw()).then_with(|| {
            let rank = |n: &SchedNode| match n {
                SchedNode::Statement(_) => 0u8,
                SchedNode::Group(_) => 1u8,
            };
            rank(self).cmp(&rank(other))
        })
    }
}

impl fmt::Display for SchedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedNode::Statement(s) => write!(f, "{s}"),
            SchedNode::Group(g) => write!(f, "{g}"),
        }
    }
}
