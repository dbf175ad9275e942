//! Typed dependency edges.
//!
//! An edge `(source, target, kinds)` records every obligation `target` has
//! toward `source`. Kinds are stored as a small bitset so one `(source,
//! target)` pair carries its whole kind union in a single arena slot; the
//! graph merges duplicate pairs on insertion.

use core::fmt;

use super::node::StatementId;

/// Unique identifier for an edge in the statement graph.
///
/// Edge ids index the graph's edge arena and are never reused within a graph
/// instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeId(pub(crate) u32);

impl EdgeId {
    /// Returns the raw arena index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edge[{}]", self.0)
    }
}

/// One obligation a dependency edge can impose on its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EdgeKind {
    /// Target must appear after at least one prior execution of source.
    Dependency,
    /// Target requires the most recent, settled execution of source.
    Fresh,
    /// Target requires source to have executed at least once, ever.
    Requirement,
    /// The edge is ignored during the target's very first execution.
    NoInit,
    /// The edge may be omitted for a pass while source's output is uniform.
    SkipIfUniform,
    /// Target must be re-scheduled whenever source re-executes.
    Trigger,
}

impl EdgeKind {
    /// All kinds, in bit order.
    pub const ALL: [EdgeKind; 6] = [
        EdgeKind::Dependency,
        EdgeKind::Fresh,
        EdgeKind::Requirement,
        EdgeKind::NoInit,
        EdgeKind::SkipIfUniform,
        EdgeKind::Trigger,
    ];

    const fn bit(self) -> u8 {
        match self {
            EdgeKind::Dependency => 1 << 0,
            EdgeKind::Fresh => 1 << 1,
            EdgeKind::Requirement => 1 << 2,
            EdgeKind::NoInit => 1 << 3,
            EdgeKind::SkipIfUniform => 1 << 4,
            EdgeKind::Trigger => 1 << 5,
        }
    }

    /// Returns a short human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            EdgeKind::Dependency => "Dependency",
            EdgeKind::Fresh => "Fresh",
            EdgeKind::Requirement => "Requirement",
            EdgeKind::NoInit => "NoInit",
            EdgeKind::SkipIfUniform => "SkipIfUniform",
            EdgeKind::Trigger => "Trigger",
        }
    }
}

/// A set of [`EdgeKind`]s carried by one edge.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KindSet(u8);

impl KindSet {
    /// The empty set.
    pub const EMPTY: KindSet = KindSet(0);

    /// A set containing a single kind.
    #[inline]
    pub const fn of(kind: EdgeKind) -> Self {
        KindSet(kind.bit())
    }

    /// Returns this set with `kind` added.
    #[inline]
    #[must_use]
    pub const fn with(self, kind: EdgeKind) -> Self {
        KindSet(self.0 | kind.bit())
    }

    /// Returns this set with `kind` removed.
    #[inline]
    #[must_use]
    pub const fn without(self, kind: EdgeKind) -> Self {
        KindSet(self.0 & !kind.bit())
    }

    /// Returns the union of two sets.
    #[inline]
    #[must_use]
    pub const fn union(self, other: KindSet) -> Self {
        KindSet(self.0 | other.0)
    }

    /// Tests membership.
    #[inline]
    pub const fn contains(self, kind: EdgeKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Returns true if no kind is set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of kinds in the set.
    #[inline]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates the kinds in bit order.
    pub fn iter(self) -> impl Iterator<Item = EdgeKind> {
        EdgeKind::ALL.into_iter().filter(move |k| self.contains(*k))
    }

    /// True for hint-only sets (`Trigger`/`SkipIfUniform` without any
    /// ordering obligation).
    pub const fn is_hint_only(self) -> bool {
        !self.contains(EdgeKind::Dependency)
            && !self.contains(EdgeKind::Fresh)
            && !self.contains(EdgeKind::Requirement)
    }

    /// Normalizes a user-supplied set: any ordering kind implies the base
    /// `Dependency` obligation. Hint-only sets are left untouched.
    #[must_use]
    pub const fn normalized(self) -> Self {
        if self.contains(EdgeKind::Fresh)
            || self.contains(EdgeKind::Requirement)
            || self.contains(EdgeKind::NoInit)
        {
            self.with(EdgeKind::Dependency)
        } else {
            self
        }
    }
}

impl FromIterator<EdgeKind> for KindSet {
    fn from_iter<I: IntoIterator<Item = EdgeKind>>(iter: I) -> Self {
        iter.into_iter().fold(KindSet::EMPTY, KindSet::with)
    }
}

impl fmt::Debug for KindSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for kind in self.iter() {
            if !first {
                write!(f, "|")?;
            }
            write!(f, "{}", kind.name())?;
            first = false;
        }
        if first {
            write!(f, "∅")?;
        }
        Ok(())
    }
}

impl fmt::Display for KindSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A directed, typed dependency between two statements.
///
/// `target` is obligated toward `source` according to `kinds`; see
/// [`EdgeKind`] for the individual obligations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DependencyEdge {
    /// The statement whose output is consumed.
    pub source: StatementId,
    /// The statement that consumes it.
    pub target: StatementId,
    /// The union of obligations on this pair.
    pub kinds: KindSet,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_set_insert_and_union() {
        let a = KindSet::of(EdgeKind::Fresh).with(EdgeKind::Requirement);
        let b = KindSet::of(EdgeKind::Trigger);
        let u = a.union(b);
        assert!(u.contains(EdgeKind::Fresh));
        assert!(u.contains(EdgeKind::Requirement));
        assert!(u.contains(EdgeKind::Trigger));
        assert!(!u.contains(EdgeKind::Dependency));
        assert_eq!(u.len(), 3);
    }

    #[test]
    fn normalization_adds_base_dependency() {
        let fresh = KindSet::of(EdgeKind::Fresh).normalized();
        assert!(fresh.contains(EdgeKind::Dependency));

        let noinit = KindSet::of(EdgeKind::NoInit).normalized();
        assert!(noinit.contains(EdgeKind::Dependency));

        // Hint-only sets stay hint-only.
        let skip = KindSet::of(EdgeKind::SkipIfUniform).normalized();
        assert!(!skip.contains(EdgeKind::Dependency));
        assert!(skip.is_hint_only());

        let trigger = KindSet::of(EdgeKind::Trigger).normalized();
        assert!(trigger.is_hint_only());
    }

    #[test]
    fn kind_set_formatting() {
        let set = KindSet::of(EdgeKind::Dependency).with(EdgeKind::Fresh);
        assert_eq!(format!("{set}"), "Dependency|Fresh");
        assert_eq!(format!("{}", KindSet::EMPTY), "∅");
    }
}
