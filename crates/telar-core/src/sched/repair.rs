//! Incremental schedule repair.
//!
//! Given the previous schedule and the invalidation state of the current
//! recompilation, [`repair_schedule`] produces a new valid schedule while
//! reusing the prior execution order wherever correctness allows.
//!
//! The engine replays the prior schedule left to right, tracking per-node
//! execution, settledness, and uniformity. A replayed occurrence whose
//! obligations are violated receives a minimal *insertion closure*: the
//! missing upstream executions are inserted immediately before it, in
//! ascending source order, each inserted execution fully satisfying its own
//! obligations. Insertions of statements whose `SkipIfUniform` input is
//! currently uniform are vetoed (their output would carry no information),
//! and obligations that would transitively require a vetoed statement are
//! waived for the pass. A `Fresh` cycle met inside a closure is emitted
//! twice in its topological member order. `Trigger` targets left
//! un-re-executed after the replay are appended with their closures.
//!
//! Initialization semantics during replay: a statement's first replayed
//! occurrence is its initializing execution. It may read whatever its
//! sources currently hold, including the uniform initial message, so its
//! obligations are waived unless explicitly stale-marked. From the second
//! occurrence on, every obligation is enforced. `NoInit`-qualified edges are
//! waived for the first occurrence even of closure insertions, unless their
//! source is initialized.

use std::collections::BTreeSet;

use crate::error::ScheduleError;
use crate::graph::edge::{DependencyEdge, EdgeId, EdgeKind};
use crate::graph::groups::GroupLayout;
use crate::graph::model::StatementGraph;
use crate::graph::node::StatementId;

use super::schedule::Schedule;
use super::topo;

/// Invalidation inputs of one repair call.
///
/// All three sets are read-only for the duration of the repair pass.
#[derive(Debug, Clone, Default)]
pub struct InvalidationState {
    invalid: BTreeSet<StatementId>,
    stale: BTreeSet<(StatementId, EdgeId)>,
    initialized: BTreeSet<StatementId>,
}

impl InvalidationState {
    /// An empty invalidation state (nothing invalid, stale, or initialized).
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a statement's last value as discarded; it must be recomputed.
    pub fn invalidate(&mut self, statement: StatementId) -> &mut Self {
        self.invalid.insert(statement);
        self
    }

    /// Marks one `(target, edge)` obligation as no longer satisfied by the
    /// prior schedule; the target's next occurrence demands an in-schedule
    /// witness.
    pub fn mark_stale(&mut self, target: StatementId, edge: EdgeId) -> &mut Self {
        self.stale.insert((target, edge));
        self
    }

    /// Marks a statement as already holding a valid value from an earlier
    /// pass; `NoInit` edges from it apply normally and `Requirement`
    /// obligations on it are permanently satisfied.
    pub fn initialize(&mut self, statement: StatementId) -> &mut Self {
        self.initialized.insert(statement);
        self
    }

    /// Statements marked invalid, ascending.
    pub fn invalid(&self) -> impl Iterator<Item = StatementId> + '_ {
        self.invalid.iter().copied()
    }

    fn is_invalid(&self, statement: StatementId) -> bool {
        self.invalid.contains(&statement)
    }

    /// Initialization holds only while the value is not discarded.
    fn is_initialized(&self, statement: StatementId) -> bool {
        self.initialized.contains(&statement) && !self.is_invalid(statement)
    }
}

/// Outcome of one insertion-closure attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closure {
    /// The requested state already holds, or an execution was inserted.
    Satisfied,
    /// The statement's output would be uniform; nothing was inserted and the
    /// caller's obligation is waived for this pass.
    Vetoed,
    /// The statement is upstream on the current closure stack; freshness is
    /// deferred to the cycle's second pass.
    Deferred,
}

/// What an obligation demands of its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Need {
    /// Demand a settled execution (the `Fresh` witness) rather than any
    /// usable value.
    fresh: bool,
    /// Demand an in-schedule execution; a virtual initialized value does not
    /// discharge a stale-marked obligation.
    in_schedule: bool,
}

/// Replay state of one repair pass.
struct Replay<'g> {
    graph: &'g StatementGraph,
    invalidation: &'g InvalidationState,
    exec_count: Vec<u32>,
    has_value: Vec<bool>,
    settled: Vec<bool>,
    uniform: Vec<bool>,
    pending_trigger: Vec<bool>,
    stale_pending: BTreeSet<(StatementId, EdgeId)>,
    /// Closure recursion stack (statements being inserted).
    stack: Vec<StatementId>,
    /// Emissions of the closure in progress, for cycle second passes.
    closure_log: Vec<StatementId>,
    /// Cycle members recorded by back-edges, keyed by their header.
    cycles: Vec<(StatementId, BTreeSet<StatementId>)>,
}

impl<'g> Replay<'g> {
    fn new(graph: &'g StatementGraph, invalidation: &'g InvalidationState) -> Self {
        let n = graph.node_count();
        let mut has_value = vec![false; n];
        let mut settled = vec![false; n];
        let mut uniform = vec![true; n];
        for statement in graph.statements() {
            if invalidation.is_initialized(statement) {
                has_value[statement.index()] = true;
                settled[statement.index()] = true;
                uniform[statement.index()] = false;
            }
        }
        Self {
            graph,
            invalidation,
            exec_count: vec![0; n],
            has_value,
            settled,
            uniform,
            pending_trigger: vec![false; n],
            stale_pending: invalidation.stale.clone(),
            stack: Vec::new(),
            closure_log: Vec::new(),
            cycles: Vec::new(),
        }
    }

    fn executed(&self, statement: StatementId) -> bool {
        self.exec_count[statement.index()] > 0
    }

    fn meets(&self, statement: StatementId, need: Need) -> bool {
        let base = if need.fresh {
            self.settled[statement.index()]
        } else {
            self.has_value[statement.index()]
        };
        base && (!need.in_schedule || self.executed(statement))
    }

    /// True when executing `statement` now would produce a uniform output:
    /// some `SkipIfUniform`-qualified input is currently uniform.
    fn would_be_uniform(&self, statement: StatementId) -> bool {
        self.graph.incoming_edges(statement).any(|(_, edge)| {
            edge.kinds.contains(EdgeKind::SkipIfUniform)
                && edge.source != statement
                && self.uniform[edge.source.index()]
        })
    }

    /// Appends an execution and updates freshness/trigger state.
    fn emit(&mut self, statement: StatementId, out: &mut Vec<StatementId>) {
        out.push(statement);
        self.closure_log.push(statement);
        let i = statement.index();
        self.exec_count[i] += 1;
        self.has_value[i] = true;
        self.settled[i] = true;
        self.uniform[i] = self.would_be_uniform(statement);

        for (_, edge) in self.graph.outgoing_edges(statement) {
            if edge.target == statement {
                continue;
            }
            // A re-executed input makes the consumer's value stale.
            if edge.kinds.contains(EdgeKind::Fresh) {
                self.settled[edge.target.index()] = false;
            }
            if edge.kinds.contains(EdgeKind::Trigger) {
                self.pending_trigger[edge.target.index()] = true;
            }
        }
        self.pending_trigger[i] = false;

        #[cfg(feature = "tracing")]
        tracing::trace!("sched_repair: emit {statement}");
    }

    /// Incoming edges of `target` in deterministic obligation order.
    fn obligations(&self, target: StatementId) -> Vec<(EdgeId, DependencyEdge)> {
        let mut edges: Vec<(EdgeId, DependencyEdge)> = self
            .graph
            .incoming_edges(target)
            .map(|(id, edge)| (id, *edge))
            .collect();
        edges.sort_by_key(|(id, edge)| (edge.source, *id));
        edges
    }

    /// Evaluates one obligation at an occurrence of `target`.
    ///
    /// `replayed` occurrences enjoy the initialization waiver for their first
    /// execution; closure insertions must satisfy everything.
    fn unmet_need(
        &self,
        target: StatementId,
        edge_id: EdgeId,
        edge: &DependencyEdge,
        replayed: bool,
    ) -> Option<Need> {
        let source = edge.source;
        if source == target || edge.kinds.is_hint_only() {
            return None;
        }
        let first = self.exec_count[target.index()] == 0;
        if edge.kinds.contains(EdgeKind::NoInit)
            && first
            && !self.invalidation.is_initialized(source)
        {
            return None;
        }
        let need = Need {
            fresh: edge.kinds.contains(EdgeKind::Fresh),
            in_schedule: self.stale_pending.contains(&(target, edge_id)),
        };
        if self.meets(source, need) {
            return None;
        }
        // A replayed first execution is the target's initialization: it may
        // read whatever its sources currently hold, including the uniform
        // initial message. Only stale-marked obligations pierce this.
        let init_waiver = replayed && first && !need.in_schedule;
        if init_waiver { None } else { Some(need) }
    }

    /// Resolves the obligations of one occurrence of `target`, inserting
    /// closures as needed and clearing satisfied stale marks.
    ///
    /// Returns true when an obligation was blocked by a uniform veto; in
    /// replayed mode the caller ignores this (the occurrence executes
    /// regardless), in insertion mode it propagates the veto.
    fn resolve_obligations(
        &mut self,
        target: StatementId,
        replayed: bool,
        out: &mut Vec<StatementId>,
    ) -> Result<bool, ScheduleError> {
        let mut vetoed = false;
        for (edge_id, edge) in self.obligations(target) {
            if let Some(need) = self.unmet_need(target, edge_id, &edge, replayed) {
                match self.ensure(edge.source, need, out)? {
                    Closure::Satisfied | Closure::Deferred => {}
                    Closure::Vetoed => {
                        vetoed = true;
                        if !replayed {
                            break;
                        }
                    }
                }
            }
            if self.unmet_need(target, edge_id, &edge, replayed).is_none() {
                self.stale_pending.remove(&(target, edge_id));
            }
        }
        Ok(vetoed)
    }

    /// Ensures `statement` meets `need`, inserting a fully-valid execution
    /// (with its own closure) when it does not.
    fn ensure(
        &mut self,
        statement: StatementId,
        need: Need,
        out: &mut Vec<StatementId>,
    ) -> Result<Closure, ScheduleError> {
        if self.meets(statement, need) {
            return Ok(Closure::Satisfied);
        }

        if let Some(position) = self.stack.iter().position(|s| *s == statement) {
            if need.fresh {
                // A Fresh back-edge: the cycle re-executes once more after
                // its first pass, restoring freshness.
                let members: BTreeSet<StatementId> =
                    self.stack[position..].iter().copied().collect();
                self.cycles.push((statement, members));
                return Ok(Closure::Deferred);
            }
            // A value-level back-edge cannot be deferred: the source has
            // never produced a value and never will inside this cycle.
            return Err(ScheduleError::FreshCycleUnsatisfiable {
                nodes: self.stack[position..].to_vec(),
                blocked_on: statement,
            });
        }

        if self.stack.is_empty() {
            self.closure_log.clear();
        }
        self.stack.push(statement);
        let mut vetoed = self.resolve_obligations(statement, false, out)?;

        if !vetoed && self.would_be_uniform(statement) {
            vetoed = true;
            #[cfg(feature = "tracing")]
            tracing::debug!("sched_repair: skip uniform {statement}");
        }

        if vetoed {
            self.stack.pop();
            return Ok(Closure::Vetoed);
        }

        self.emit(statement, out);
        self.stack.pop();

        // Second pass for any cycle headed here, in first-emission order.
        let mut headed = Vec::new();
        self.cycles.retain(|(header, members)| {
            if *header == statement {
                headed.push(members.clone());
                false
            } else {
                true
            }
        });
        for members in headed {
            let order: Vec<StatementId> = self
                .closure_log
                .clone()
                .into_iter()
                .filter(|s| members.contains(s))
                .collect();
            for member in order {
                self.emit(member, out);
            }
        }

        Ok(Closure::Satisfied)
    }
}

/// Repairs the prior schedule against the new invalidation state.
///
/// Every occurrence of the prior schedule is preserved in order; the engine
/// only inserts the executions required to restore each obligation and
/// appends re-executions demanded by `Trigger` edges or the `invalid` set.
/// A prior schedule the engine cannot reuse (empty, or referencing
/// statements outside the graph) silently degrades to a full
/// [`topo::schedule`] pass.
///
/// # Errors
///
/// Returns [`ScheduleError::FreshCycleUnsatisfiable`] when a `Fresh` cycle
/// needs a value that no member can ever produce, and the topological
/// scheduler's errors on the full-reschedule fallback path.
pub fn repair_schedule(
    graph: &StatementGraph,
    groups: &GroupLayout,
    prior: &Schedule,
    invalidation: &InvalidationState,
) -> Result<Schedule, ScheduleError> {
    let reusable = !prior.is_empty() && prior.iter().all(|s| s.index() < graph.node_count());
    if !reusable {
        #[cfg(feature = "tracing")]
        tracing::debug!("sched_repair: prior schedule unusable, rescheduling from scratch");
        return topo::schedule(graph, groups);
    }

    let mut replay = Replay::new(graph, invalidation);
    let mut out: Vec<StatementId> = Vec::with_capacity(prior.len());

    for target in prior.iter() {
        replay.resolve_obligations(target, true, &mut out)?;
        replay.emit(target, &mut out);
    }

    // Invalid statements with no surviving occurrence still need their
    // recomputation.
    for statement in invalidation.invalid() {
        if !replay.executed(statement) {
            replay.ensure(
                statement,
                Need {
                    fresh: true,
                    in_schedule: true,
                },
                &mut out,
            )?;
        }
    }

    // One round of trigger re-execution against the replayed order.
    let pending: Vec<StatementId> = graph
        .statements()
        .filter(|s| replay.pending_trigger[s.index()])
        .collect();
    for target in pending {
        if !replay.pending_trigger[target.index()] {
            continue;
        }
        replay.resolve_obligations(target, true, &mut out)?;
        replay.emit(target, &mut out);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "sched_repair: {} prior + {} repaired executions",
        prior.len(),
        out.len() - prior.len()
    );

    Ok(Schedule::new(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::KindSet;

    fn s(i: u32) -> StatementId {
        StatementId::new(i)
    }

    fn add(graph: &mut StatementGraph, source: u32, target: u32, kinds: KindSet) {
        graph.add_edge(s(source), s(target), kinds).unwrap();
    }

    fn fresh() -> KindSet {
        KindSet::of(EdgeKind::Fresh)
    }

    fn dep() -> KindSet {
        KindSet::of(EdgeKind::Dependency)
    }

    /// A valid schedule with no pending deltas is a fixpoint.
    #[test]
    fn valid_schedule_is_untouched() {
        let mut graph = StatementGraph::new(3);
        add(&mut graph, 0, 1, fresh());
        add(&mut graph, 1, 2, fresh());
        let prior = Schedule::from_indices([0, 1, 2]);
        let repaired = repair_schedule(
            &graph,
            &GroupLayout::new(3),
            &prior,
            &InvalidationState::new(),
        )
        .unwrap();
        assert_eq!(repaired, prior);
    }

    /// An empty prior schedule falls back to full scheduling.
    #[test]
    fn empty_prior_reschedules() {
        let mut graph = StatementGraph::new(2);
        add(&mut graph, 0, 1, dep());
        let repaired = repair_schedule(
            &graph,
            &GroupLayout::new(2),
            &Schedule::default(),
            &InvalidationState::new(),
        )
        .unwrap();
        assert_eq!(repaired, Schedule::from_indices([0, 1]));
    }

    /// A prior schedule referencing unknown statements falls back.
    #[test]
    fn out_of_range_prior_reschedules() {
        let mut graph = StatementGraph::new(2);
        add(&mut graph, 0, 1, dep());
        let repaired = repair_schedule(
            &graph,
            &GroupLayout::new(2),
            &Schedule::from_indices([0, 7, 1]),
            &InvalidationState::new(),
        )
        .unwrap();
        assert_eq!(repaired, Schedule::from_indices([0, 1]));
    }

    /// A second occurrence whose fresh source never ran pulls the source's
    /// whole closure in front of it.
    #[test]
    fn missing_fresh_witness_is_inserted() {
        let mut graph = StatementGraph::new(3);
        add(&mut graph, 1, 2, fresh());
        add(&mut graph, 2, 0, fresh());
        let prior = Schedule::from_indices([0, 1, 0]);
        let repaired = repair_schedule(
            &graph,
            &GroupLayout::new(3),
            &prior,
            &InvalidationState::new(),
        )
        .unwrap();
        assert_eq!(repaired, Schedule::from_indices([0, 1, 2, 0]));
    }

    /// Invalidating a statement with no surviving occurrence appends its
    /// recomputation.
    #[test]
    fn invalid_statement_is_recomputed() {
        let mut graph = StatementGraph::new(3);
        add(&mut graph, 0, 1, fresh());
        add(&mut graph, 1, 2, fresh());
        let prior = Schedule::from_indices([0, 1]);
        let mut invalidation = InvalidationState::new();
        invalidation.invalidate(s(2));
        let repaired =
            repair_schedule(&graph, &GroupLayout::new(3), &prior, &invalidation).unwrap();
        assert_eq!(repaired, Schedule::from_indices([0, 1, 2]));
    }

    /// A trigger source re-executing after its target forces the target's
    /// re-execution at the end of the pass.
    #[test]
    fn trigger_target_is_rescheduled() {
        let mut graph = StatementGraph::new(2);
        add(&mut graph, 0, 1, KindSet::of(EdgeKind::Trigger));
        let prior = Schedule::from_indices([1, 0]);
        let repaired = repair_schedule(
            &graph,
            &GroupLayout::new(2),
            &prior,
            &InvalidationState::new(),
        )
        .unwrap();
        assert_eq!(repaired, Schedule::from_indices([1, 0, 1]));
    }

    /// A stale-marked fresh obligation demands an in-schedule witness even
    /// when the source is initialized.
    #[test]
    fn stale_obligation_demands_new_witness() {
        let mut graph = StatementGraph::new(2);
        let edge = graph.add_edge(s(0), s(1), fresh()).unwrap();
        let prior = Schedule::from_indices([1]);
        let mut invalidation = InvalidationState::new();
        invalidation.initialize(s(0));
        invalidation.mark_stale(s(1), edge);
        let repaired =
            repair_schedule(&graph, &GroupLayout::new(2), &prior, &invalidation).unwrap();
        assert_eq!(repaired, Schedule::from_indices([0, 1]));
    }

    /// An initialized source satisfies obligations without re-executing.
    #[test]
    fn initialized_source_needs_no_insertion() {
        let mut graph = StatementGraph::new(2);
        add(&mut graph, 0, 1, fresh().with(EdgeKind::Requirement));
        let prior = Schedule::from_indices([1, 1]);
        let mut invalidation = InvalidationState::new();
        invalidation.initialize(s(0));
        let repaired =
            repair_schedule(&graph, &GroupLayout::new(2), &prior, &invalidation).unwrap();
        assert_eq!(repaired, prior);
    }

    /// A fresh cycle threaded by a requirement whose source can never
    /// produce a value is a fatal error.
    #[test]
    fn requirement_cycle_without_value_fails() {
        let mut graph = StatementGraph::new(3);
        // 0 needs a fresh 1; 1 requires 0 to have ever run; 2 needs a
        // fresh 0. Neither 0 nor 1 ever ran.
        add(&mut graph, 1, 0, fresh());
        add(&mut graph, 0, 1, KindSet::of(EdgeKind::Requirement));
        add(&mut graph, 0, 2, fresh());
        let prior = Schedule::from_indices([2, 2]);
        let err = repair_schedule(
            &graph,
            &GroupLayout::new(3),
            &prior,
            &InvalidationState::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ScheduleError::FreshCycleUnsatisfiable {
                nodes: vec![s(0), s(1)],
                blocked_on: s(0),
            }
        );
    }

    /// Fresh cycles found inside a closure are emitted twice.
    #[test]
    fn closure_fresh_cycle_runs_twice() {
        let mut graph = StatementGraph::new(3);
        // Cycle 0 ⇄ 1 through fresh edges; 2 fresh-depends on 1.
        add(&mut graph, 0, 1, fresh());
        add(&mut graph, 1, 0, fresh());
        add(&mut graph, 1, 2, fresh());
        let prior = Schedule::from_indices([2, 2]);
        let repaired = repair_schedule(
            &graph,
            &GroupLayout::new(3),
            &prior,
            &InvalidationState::new(),
        )
        .unwrap();
        // Second occurrence of 2 pulls in the 0⇄1 cycle, run twice.
        assert_eq!(repaired, Schedule::from_indices([2, 0, 1, 0, 1, 2]));
    }
}
