//! Initial topological scheduling with group contiguity.
//!
//! Produces the first schedule of a compilation: a single pass in which every
//! statement executes exactly once, honoring all `Dependency`-kind edges and
//! keeping each group's members contiguous by descending into the group's
//! own sub-schedule recursively.
//!
//! First-pass constraint filtering: `NoInit`-qualified edges, hint-only
//! edges (`Trigger`/`SkipIfUniform` without an ordering kind), and
//! self-edges impose no ordering on the initializing pass. Edges that carry
//! `SkipIfUniform` alongside `Dependency` are honored while possible and
//! waived only as an escape when the ready set would otherwise empty early.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::ScheduleError;
use crate::graph::edge::{EdgeKind, KindSet};
use crate::graph::groups::GroupLayout;
use crate::graph::model::StatementGraph;
use crate::graph::node::{GroupId, SchedNode, StatementId};

use super::schedule::Schedule;

/// Computes the initial schedule, seeding the ready set from every root.
///
/// Equivalent to [`schedule_with_groups`] with a selector admitting all
/// sources.
///
/// # Errors
///
/// See [`schedule_with_groups`].
pub fn schedule(graph: &StatementGraph, groups: &GroupLayout) -> Result<Schedule, ScheduleError> {
    schedule_with_groups(graph, groups, |_| true)
}

/// Computes the initial schedule with a source selector.
///
/// The selector filters which zero-in-degree roots seed the ready set;
/// rejected roots are deprioritized and admitted only after the seeded wave
/// drains, so scheduling stays total. Nodes unlocked by consumption are not
/// re-filtered.
///
/// # Errors
///
/// Returns [`ScheduleError::Malformed`] for a cyclically nested group
/// layout, and [`ScheduleError::DependencyCycle`] when the `Dependency`-kind
/// edges admit no topological order; the error carries every member of the
/// offending cycles.
pub fn schedule_with_groups<F>(
    graph: &StatementGraph,
    groups: &GroupLayout,
    source_selector: F,
) -> Result<Schedule, ScheduleError>
where
    F: Fn(SchedNode) -> bool,
{
    groups.validate()?;
    let mut out = Vec::with_capacity(graph.node_count());
    schedule_level(graph, groups, None, Some(&source_selector), &mut out)?;
    #[cfg(feature = "tracing")]
    tracing::debug!("sched_topo: {} statements in initial order", out.len());
    Ok(Schedule::new(out))
}

/// Schedules the members of one nesting level, recursing into child groups.
fn schedule_level(
    graph: &StatementGraph,
    groups: &GroupLayout,
    level: Option<GroupId>,
    source_selector: Option<&dyn Fn(SchedNode) -> bool>,
    out: &mut Vec<StatementId>,
) -> Result<(), ScheduleError> {
    let mut items: Vec<SchedNode> = graph
        .statements()
        .filter(|statement| groups.group_of(*statement) == level)
        .map(SchedNode::Statement)
        .collect();
    items.extend(groups.child_groups(level).into_iter().map(SchedNode::Group));
    items.sort_unstable();
    if items.is_empty() {
        return Ok(());
    }

    let index_of: BTreeMap<SchedNode, usize> =
        items.iter().enumerate().map(|(i, n)| (*n, i)).collect();

    // Constraining edges at this level, with their waivability.
    let coarse = groups.build_group_edges(graph, level);
    let mut successors: Vec<Vec<(usize, bool)>> = vec![Vec::new(); items.len()];
    let mut in_degree: Vec<usize> = vec![0; items.len()];
    for (source, target, kinds) in coarse {
        if !constrains_first_pass(kinds) {
            continue;
        }
        let (Some(&si), Some(&ti)) = (index_of.get(&source), index_of.get(&target)) else {
            continue;
        };
        let waivable = kinds.contains(EdgeKind::SkipIfUniform);
        successors[si].push((ti, waivable));
        in_degree[ti] += 1;
    }

    // Ready set ordered by (selector rank, node id): deprioritized roots are
    // drawn only once the seeded wave drains.
    let mut ready: BTreeSet<(u8, SchedNode)> = BTreeSet::new();
    for (i, &item) in items.iter().enumerate() {
        if in_degree[i] == 0 {
            let rank = match source_selector {
                Some(selector) if !selector(item) => 1,
                _ => 0,
            };
            ready.insert((rank, item));
        }
    }

    let mut scheduled = vec![false; items.len()];
    let mut remaining = items.len();
    let mut skip_waived = false;

    while remaining > 0 {
        let Some(&(rank, node)) = ready.iter().next() else {
            // Ready set emptied early: waive advisory SkipIfUniform edges
            // among the stuck items once, then report the cycle.
            if !skip_waived {
                skip_waived = true;
                let mut progressed = false;
                for (i, &item) in items.iter().enumerate() {
                    if scheduled[i] {
                        continue;
                    }
                    let hard_degree = hard_in_degree(i, &successors, &scheduled);
                    if hard_degree == 0 {
                        ready.insert((0, item));
                        progressed = true;
                    }
                }
                if progressed {
                    continue;
                }
            }
            return Err(cycle_error(groups, &items, &successors, &scheduled));
        };
        ready.remove(&(rank, node));

        let i = index_of[&node];
        if scheduled[i] {
            continue;
        }
        scheduled[i] = true;
        remaining -= 1;

        match node {
            SchedNode::Statement(statement) => out.push(statement),
            // Descend: the whole group is exhausted before leaving it.
            SchedNode::Group(group) => {
                schedule_level(graph, groups, Some(group), None, out)?;
            }
        }

        for &(ti, waivable) in &successors[i] {
            if scheduled[ti] {
                continue;
            }
            if skip_waived && waivable {
                continue;
            }
            in_degree[ti] -= 1;
            if in_degree[ti] == 0 {
                ready.insert((0, items[ti]));
            }
        }

        // After the waiver, readiness is governed by hard edges only.
        if skip_waived {
            for (j, &item) in items.iter().enumerate() {
                if !scheduled[j] && hard_in_degree(j, &successors, &scheduled) == 0 {
                    ready.insert((0, item));
                }
            }
        }
    }

    Ok(())
}

/// True when a coarse edge orders the initializing pass.
fn constrains_first_pass(kinds: KindSet) -> bool {
    kinds.contains(EdgeKind::Dependency) && !kinds.contains(EdgeKind::NoInit)
}

/// In-degree of `item` counting only unscheduled sources and non-waivable
/// edges.
fn hard_in_degree(item: usize, successors: &[Vec<(usize, bool)>], scheduled: &[bool]) -> usize {
    successors
        .iter()
        .enumerate()
        .filter(|(si, _)| !scheduled[*si])
        .flat_map(|(_, outs)| outs.iter())
        .filter(|(ti, waivable)| *ti == item && !waivable)
        .count()
}

/// Builds the cycle error from the stuck remainder of one level.
///
/// The implicated statements are the members of every non-trivial strongly
/// connected component among the unscheduled items, with group items
/// expanded to their contained statements.
fn cycle_error(
    groups: &GroupLayout,
    items: &[SchedNode],
    successors: &[Vec<(usize, bool)>],
    scheduled: &[bool],
) -> ScheduleError {
    let component_ids = strongly_connected(items.len(), successors, scheduled);

    // Count members per component; only components of size > 1 are cycles
    // (self-edges never constrain the first pass).
    let mut component_size: BTreeMap<usize, usize> = BTreeMap::new();
    for (i, &component) in component_ids.iter().enumerate() {
        if !scheduled[i] {
            *component_size.entry(component).or_insert(0) += 1;
        }
    }

    let mut nodes: BTreeSet<StatementId> = BTreeSet::new();
    for (i, &component) in component_ids.iter().enumerate() {
        if scheduled[i] || component_size[&component] < 2 {
            continue;
        }
        match items[i] {
            SchedNode::Statement(statement) => {
                nodes.insert(statement);
            }
            SchedNode::Group(group) => {
                nodes.extend(groups.statements_under(group));
            }
        }
    }

    // No multi-node component found: implicate the whole remainder rather
    // than dropping any node silently.
    if nodes.is_empty() {
        for (i, &item) in items.iter().enumerate() {
            if scheduled[i] {
                continue;
            }
            match item {
                SchedNode::Statement(statement) => {
                    nodes.insert(statement);
                }
                SchedNode::Group(group) => {
                    nodes.extend(groups.statements_under(group));
                }
            }
        }
    }

    ScheduleError::DependencyCycle {
        nodes: nodes.into_iter().collect(),
    }
}

/// Iterative Tarjan over the unscheduled items; returns a component id per
/// item (scheduled items keep a dummy id).
fn strongly_connected(
    item_count: usize,
    successors: &[Vec<(usize, bool)>],
    scheduled: &[bool],
) -> Vec<usize> {
    const UNVISITED: usize = usize::MAX;

    let mut index = vec![UNVISITED; item_count];
    let mut lowlink = vec![0usize; item_count];
    let mut on_stack = vec![false; item_count];
    let mut component = vec![0usize; item_count];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut next_component = 0usize;

    // Explicit DFS frames: (item, position in its successor list).
    let mut frames: Vec<(usize, usize)> = Vec::new();

    for start in 0..item_count {
        if scheduled[start] || index[start] != UNVISITED {
            continue;
        }
        frames.push((start, 0));
        index[start] = next_index;
        lowlink[start] = next_index;
        next_index += 1;
        stack.push(start);
        on_stack[start] = true;

        while let Some(&mut (v, ref mut pos)) = frames.last_mut() {
            if *pos < successors[v].len() {
                let (w, _) = successors[v][*pos];
                *pos += 1;
                if scheduled[w] {
                    continue;
                }
                if index[w] == UNVISITED {
                    index[w] = next_index;
                    lowlink[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    frames.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
            } else {
                frames.pop();
                if let Some(&(parent, _)) = frames.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }
                if lowlink[v] == index[v] {
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component[w] = next_component;
                        if w == v {
                            break;
                        }
                    }
                    next_component += 1;
                }
            }
        }
    }

    component
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(i: u32) -> StatementId {
        StatementId::new(i)
    }

    fn dep() -> KindSet {
        KindSet::of(EdgeKind::Dependency)
    }

    #[test]
    fn linear_chain_schedules_in_order() {
        let mut graph = StatementGraph::new(3);
        graph.add_edge(s(0), s(1), dep()).unwrap();
        graph.add_edge(s(1), s(2), dep()).unwrap();
        let layout = GroupLayout::new(3);
        let sched = schedule(&graph, &layout).unwrap();
        assert_eq!(sched, Schedule::from_indices([0, 1, 2]));
    }

    #[test]
    fn lowest_index_tie_break() {
        // 2 and 0 are both roots; 0 goes first.
        let mut graph = StatementGraph::new(3);
        graph.add_edge(s(2), s(1), dep()).unwrap();
        let layout = GroupLayout::new(3);
        let sched = schedule(&graph, &layout).unwrap();
        assert_eq!(sched, Schedule::from_indices([0, 2, 1]));
    }

    #[test]
    fn grouped_source_precedes_external_target() {
        // Edge 1 → 0 with 1 inside a group: 1 still runs first.
        let mut graph = StatementGraph::new(2);
        graph.add_edge(s(1), s(0), dep()).unwrap();
        let mut layout = GroupLayout::new(2);
        layout.set_group(s(1), GroupId::new(2)).unwrap();
        let sched = schedule(&graph, &layout).unwrap();
        assert_eq!(sched, Schedule::from_indices([1, 0]));
    }

    #[test]
    fn group_members_stay_contiguous() {
        // 0 → 3 crosses out of group 9 = {0, 2}; 1 is ungrouped.
        let mut graph = StatementGraph::new(4);
        graph.add_edge(s(0), s(3), dep()).unwrap();
        let mut layout = GroupLayout::new(4);
        let g9 = GroupId::new(9);
        layout.set_group(s(0), g9).unwrap();
        layout.set_group(s(2), g9).unwrap();
        let sched = schedule(&graph, &layout).unwrap();
        let order = sched.steps();
        let pos =
            |x: u32| order.iter().position(|v| *v == s(x)).unwrap();
        // Group members adjacent, and 0 before its external target 3.
        assert_eq!(pos(2).abs_diff(pos(0)), 1);
        assert!(pos(0) < pos(3));
    }

    #[test]
    fn dependency_cycle_reports_all_members() {
        let mut graph = StatementGraph::new(4);
        graph.add_edge(s(0), s(1), dep()).unwrap();
        graph.add_edge(s(1), s(2), dep()).unwrap();
        graph.add_edge(s(2), s(0), dep()).unwrap();
        let layout = GroupLayout::new(4);
        let err = schedule(&graph, &layout).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::DependencyCycle {
                nodes: vec![s(0), s(1), s(2)]
            }
        );
    }

    #[test]
    fn noinit_edge_breaks_first_pass_cycle() {
        let mut graph = StatementGraph::new(2);
        graph.add_edge(s(0), s(1), dep()).unwrap();
        graph
            .add_edge(s(1), s(0), KindSet::of(EdgeKind::NoInit))
            .unwrap();
        let layout = GroupLayout::new(2);
        let sched = schedule(&graph, &layout).unwrap();
        assert_eq!(sched, Schedule::from_indices([0, 1]));
    }

    #[test]
    fn skip_if_uniform_escape_breaks_cycle() {
        // 0 → 1 hard, 1 → 0 dependency-with-skip: the advisory edge is
        // waived instead of failing.
        let mut graph = StatementGraph::new(2);
        graph.add_edge(s(0), s(1), dep()).unwrap();
        graph
            .add_edge(s(1), s(0), dep().with(EdgeKind::SkipIfUniform))
            .unwrap();
        let layout = GroupLayout::new(2);
        let sched = schedule(&graph, &layout).unwrap();
        assert_eq!(sched, Schedule::from_indices([0, 1]));
    }

    #[test]
    fn selector_defers_unselected_roots() {
        let mut graph = StatementGraph::new(3);
        graph.add_edge(s(2), s(1), dep()).unwrap();
        let layout = GroupLayout::new(3);
        // Prefer statement 2 as the only seed; 0 drains afterward.
        let sched = schedule_with_groups(&graph, &layout, |n| {
            n == SchedNode::Statement(s(2))
        })
        .unwrap();
        assert_eq!(sched, Schedule::from_indices([2, 1, 0]));
    }
}
