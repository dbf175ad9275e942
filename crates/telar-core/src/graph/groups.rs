//! Group layout — nested iteration groups over the statement graph.
//!
//! A group collects the statements of one loop body (a plate over a range).
//! Groups nest into a forest; at any nesting level a whole child group is
//! addressed as a single [`SchedNode::Group`], so group ids live in their own
//! space and can never collide with statement indices.
//!
//! [`GroupLayout::build_group_edges`] coarsens base edges to the
//! representatives at one level. Edges fully inside a child group are not
//! promoted; they constrain only that group's internal sub-schedule.

use std::collections::BTreeMap;

use crate::error::GraphError;

use super::edge::KindSet;
use super::model::StatementGraph;
use super::node::{GroupId, SchedNode, StatementId};

/// Group membership and nesting for one compilation.
///
/// Membership is a total function from statement index to innermost group
/// (or none). The layout is validated once, before scheduling; a cyclic
/// nesting chain is a configuration error.
#[derive(Debug, Clone)]
pub struct GroupLayout {
    node_count: usize,
    membership: Vec<Option<GroupId>>,
    parents: BTreeMap<GroupId, Option<GroupId>>,
}

impl GroupLayout {
    /// Creates a layout with every statement ungrouped.
    pub fn new(node_count: usize) -> Self {
        Self {
            node_count,
            membership: vec![None; node_count],
            parents: BTreeMap::new(),
        }
    }

    /// Assigns a statement to its innermost group.
    ///
    /// Undeclared groups are declared as roots; isolated groups (never
    /// referenced by any edge) are permitted.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::StatementOutOfRange`] for a statement outside
    /// `0..N`.
    pub fn set_group(&mut self, statement: StatementId, group: GroupId) -> Result<(), GraphError> {
        if statement.index() >= self.node_count {
            return Err(GraphError::StatementOutOfRange {
                statement,
                group,
                node_count: self.node_count,
            });
        }
        self.membership[statement.index()] = Some(group);
        self.parents.entry(group).or_insert(None);
        Ok(())
    }

    /// Nests `child` inside `parent`, declaring both as needed.
    pub fn nest(&mut self, child: GroupId, parent: GroupId) {
        self.parents.entry(parent).or_insert(None);
        self.parents.insert(child, Some(parent));
    }

    /// Innermost group of a statement, if any.
    ///
    /// Statements past the layout's range count as ungrouped.
    #[inline]
    pub fn group_of(&self, statement: StatementId) -> Option<GroupId> {
        self.membership.get(statement.index()).copied().flatten()
    }

    /// Parent of a group, if nested.
    #[inline]
    pub fn parent_of(&self, group: GroupId) -> Option<GroupId> {
        self.parents.get(&group).copied().flatten()
    }

    /// True if any statement is grouped.
    pub fn has_groups(&self) -> bool {
        self.membership.iter().any(Option::is_some)
    }

    /// Rejects cyclic nesting before scheduling.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::GroupCycle`] with the offending containment
    /// chain.
    pub fn validate(&self) -> Result<(), GraphError> {
        for &start in self.parents.keys() {
            let mut chain = vec![start];
            let mut cursor = start;
            while let Some(parent) = self.parent_of(cursor) {
                if chain.contains(&parent) {
                    chain.push(parent);
                    return Err(GraphError::GroupCycle { groups: chain });
                }
                chain.push(parent);
                cursor = parent;
            }
        }
        Ok(())
    }

    /// Ancestor chain of a statement, innermost group first.
    ///
    /// Empty for ungrouped statements. Assumes a validated layout.
    fn chain_of(&self, statement: StatementId) -> Vec<GroupId> {
        let mut chain = Vec::new();
        let mut cursor = self.group_of(statement);
        while let Some(group) = cursor {
            chain.push(group);
            cursor = self.parent_of(group);
        }
        chain
    }

    /// Representative of `statement` at a nesting level.
    ///
    /// At the root level (`None`) every statement resolves to its outermost
    /// group, or to itself when ungrouped. Inside a group `Some(g)`, direct
    /// members resolve to themselves and deeper statements to the child
    /// group on their ancestor chain. Returns `None` for statements outside
    /// the level entirely.
    pub fn rep_within(&self, statement: StatementId, level: Option<GroupId>) -> Option<SchedNode> {
        let chain = self.chain_of(statement);
        match level {
            None => Some(match chain.last() {
                Some(&outermost) => SchedNode::Group(outermost),
                None => SchedNode::Statement(statement),
            }),
            Some(level_group) => {
                if chain.first() == Some(&level_group) {
                    return Some(SchedNode::Statement(statement));
                }
                let position = chain.iter().position(|&g| g == level_group)?;
                // The chain element just inside the level group.
                Some(SchedNode::Group(chain[position - 1]))
            }
        }
    }

    /// Direct statement members of a level, ascending.
    pub fn statements_in_level(&self, level: Option<GroupId>) -> Vec<StatementId> {
        self.membership
            .iter()
            .enumerate()
            .filter(|(_, m)| **m == level)
            .map(|(i, _)| StatementId(i as u32))
            .collect()
    }

    /// Direct child groups of a level, ascending.
    pub fn child_groups(&self, level: Option<GroupId>) -> Vec<GroupId> {
        self.parents
            .iter()
            .filter(|(_, parent)| **parent == level)
            .map(|(group, _)| *group)
            .collect()
    }

    /// All statements contained in a group, at any depth, ascending.
    pub fn statements_under(&self, group: GroupId) -> Vec<StatementId> {
        self.membership
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                self.chain_of(StatementId(*i as u32))
                    .iter()
                    .any(|&g| g == group)
            })
            .map(|(i, _)| StatementId(i as u32))
            .collect()
    }

    /// Coarsens base edges to the representatives at one nesting level.
    ///
    /// Every base edge whose endpoints resolve to two different
    /// representatives contributes its kinds to the coarse edge between
    /// them; edges whose endpoints share a representative stay intra-group.
    /// The result is deduplicated, kind-unioned, and deterministically
    /// ordered.
    pub fn build_group_edges(
        &self,
        graph: &StatementGraph,
        level: Option<GroupId>,
    ) -> Vec<(SchedNode, SchedNode, KindSet)> {
        let mut coarse: BTreeMap<(SchedNode, SchedNode), KindSet> = BTreeMap::new();
        for edge in graph.edges() {
            let Some(rep_source) = self.rep_within(edge.source, level) else {
                continue;
            };
            let Some(rep_target) = self.rep_within(edge.target, level) else {
                continue;
            };
            if rep_source == rep_target {
                continue;
            }
            let entry = coarse
                .entry((rep_source, rep_target))
                .or_insert(KindSet::EMPTY);
            *entry = entry.union(edge.kinds);
        }
        coarse
            .into_iter()
            .map(|((source, target), kinds)| (source, target, kinds))
            .collect()
    }
}
