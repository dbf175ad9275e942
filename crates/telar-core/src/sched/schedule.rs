//! The schedule value produced by the schedulers.
//!
//! A [`Schedule`] is an ordered sequence of statement ids with repetitions
//! allowed — the same statement may execute several times across iteration
//! passes. Schedules are immutable products of a scheduling pass; the
//! compiler holds exactly one current schedule and replaces it wholesale on
//! each repair.

use core::fmt;

use crate::graph::node::StatementId;

/// An ordered, repeat-permitting sequence of statement executions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Schedule {
    steps: Vec<StatementId>,
}

impl Schedule {
    /// Wraps an execution order.
    pub fn new(steps: Vec<StatementId>) -> Self {
        Self { steps }
    }

    /// Builds a schedule from raw statement indices.
    pub fn from_indices<I: IntoIterator<Item = u32>>(indices: I) -> Self {
        Self {
            steps: indices.into_iter().map(StatementId::new).collect(),
        }
    }

    /// Number of executions.
    #[inline]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True when no execution is scheduled.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The execution order.
    #[inline]
    pub fn steps(&self) -> &[StatementId] {
        &self.steps
    }

    /// Iterates the executions in order.
    pub fn iter(&self) -> impl Iterator<Item = StatementId> + '_ {
        self.steps.iter().copied()
    }

    /// Number of times `statement` executes.
    pub fn occurrences(&self, statement: StatementId) -> usize {
        self.steps.iter().filter(|s| **s == statement).count()
    }
}

impl From<Vec<StatementId>> for Schedule {
    fn from(steps: Vec<StatementId>) -> Self {
        Self::new(steps)
    }
}

impl<'a> IntoIterator for &'a Schedule {
    type Item = &'a StatementId;
    type IntoIter = core::slice::Iter<'a, StatementId>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

impl fmt::Display for Schedule {
    /// Formats as `0 → 1 → 2` for tracing output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for step in &self.steps {
            if !first {
                write!(f, " → ")?;
            }
            write!(f, "{}", step.0)?;
            first = false;
        }
        if first {
            write!(f, "(empty)")?;
        }
        Ok(())
    }
}
