//! The statement graph — construction, adjacency, and traversal.
//!
//! [`StatementGraph`] owns the edge arena and per-statement adjacency lists.
//! It is a pure data container: the front end builds it once per compilation,
//! the schedulers read it. All mutation is validated up front; scheduling
//! never observes a malformed graph.

use crate::error::GraphError;

use super::edge::{DependencyEdge, EdgeId, KindSet};
use super::node::StatementId;

/// Indexed directed graph of statements and typed dependency edges.
///
/// Statements are dense indices `0..N`; edges live in an arena indexed by
/// [`EdgeId`], with per-node incoming/outgoing adjacency lists for O(1)
/// degree queries and O(E) traversal.
///
/// Duplicate `(source, target)` pairs are merged on insertion by unioning
/// their kind sets, so each pair occupies exactly one arena slot.
#[derive(Debug, Clone)]
pub struct StatementGraph {
    node_count: usize,
    edges: Vec<DependencyEdge>,
    outgoing: Vec<Vec<EdgeId>>,
    incoming: Vec<Vec<EdgeId>>,
}

impl StatementGraph {
    /// Creates an empty graph over `node_count` statements.
    pub fn new(node_count: usize) -> Self {
        Self {
            node_count,
            edges: Vec::new(),
            outgoing: vec![Vec::new(); node_count],
            incoming: vec![Vec::new(); node_count],
        }
    }

    /// Number of statements.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of distinct `(source, target)` edges.
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Adds (or merges) a typed edge.
    ///
    /// The kind set is normalized first: `Fresh`, `Requirement`, and `NoInit`
    /// imply the base `Dependency` obligation. If an edge between the same
    /// pair already exists, the kinds are unioned into it and the existing
    /// id is returned.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeOutOfRange`] if either endpoint is outside
    /// `0..N`, and [`GraphError::EmptyKindSet`] for an empty kind set.
    pub fn add_edge(
        &mut self,
        source: StatementId,
        target: StatementId,
        kinds: KindSet,
    ) -> Result<EdgeId, GraphError> {
        if source.index() >= self.node_count || target.index() >= self.node_count {
            return Err(GraphError::NodeOutOfRange {
                source,
                target,
                node_count: self.node_count,
            });
        }
        if kinds.is_empty() {
            return Err(GraphError::EmptyKindSet { source, target });
        }

        let kinds = kinds.normalized();

        if let Some(id) = self.find_edge(source, target) {
            let merged = self.edges[id.index()].kinds.union(kinds);
            self.edges[id.index()].kinds = merged;
            #[cfg(feature = "tracing")]
            tracing::debug!("graph_merge: {source} → {target} now {merged}");
            return Ok(id);
        }

        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(DependencyEdge {
            source,
            target,
            kinds,
        });
        self.outgoing[source.index()].push(id);
        self.incoming[target.index()].push(id);
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_connect: {source} → {target} [{kinds}]");
        Ok(id)
    }

    /// Looks up the edge between a pair, if any.
    pub fn find_edge(&self, source: StatementId, target: StatementId) -> Option<EdgeId> {
        self.outgoing
            .get(source.index())?
            .iter()
            .copied()
            .find(|id| self.edges[id.index()].target == target)
    }

    /// Returns the edge stored under `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this graph.
    #[inline]
    pub fn edge(&self, id: EdgeId) -> &DependencyEdge {
        &self.edges[id.index()]
    }

    /// Union of edge kinds between a pair (empty if unconnected).
    pub fn kinds_between(&self, source: StatementId, target: StatementId) -> KindSet {
        self.find_edge(source, target)
            .map_or(KindSet::EMPTY, |id| self.edges[id.index()].kinds)
    }

    /// Ids of edges leaving `node`.
    #[inline]
    pub fn outgoing(&self, node: StatementId) -> &[EdgeId] {
        &self.outgoing[node.index()]
    }

    /// Ids of edges arriving at `node`.
    #[inline]
    pub fn incoming(&self, node: StatementId) -> &[EdgeId] {
        &self.incoming[node.index()]
    }

    /// Out-degree of `node`.
    #[inline]
    pub fn out_degree(&self, node: StatementId) -> usize {
        self.outgoing[node.index()].len()
    }

    /// In-degree of `node`.
    #[inline]
    pub fn in_degree(&self, node: StatementId) -> usize {
        self.incoming[node.index()].len()
    }

    /// Iterates all edges in arena order.
    pub fn edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.iter()
    }

    /// Iterates `(edge id, edge)` for the edges arriving at `node`.
    pub fn incoming_edges(
        &self,
        node: StatementId,
    ) -> impl Iterator<Item = (EdgeId, &DependencyEdge)> {
        self.incoming[node.index()]
            .iter()
            .map(|id| (*id, &self.edges[id.index()]))
    }

    /// Iterates `(edge id, edge)` for the edges leaving `node`.
    pub fn outgoing_edges(
        &self,
        node: StatementId,
    ) -> impl Iterator<Item = (EdgeId, &DependencyEdge)> {
        self.outgoing[node.index()]
            .iter()
            .map(|id| (*id, &self.edges[id.index()]))
    }

    /// Iterates all statement ids.
    pub fn statements(&self) -> impl Iterator<Item = StatementId> {
        (0..self.node_count as u32).map(StatementId)
    }
}
