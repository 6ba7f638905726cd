//! Reachable markings of role-state nets
use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};

use super::marking::{Marking, MarkingSignature};
use super::net_struct::TransitionID;
use super::semantics::{FiringError, FiringRule};

/// Depth-first exploration with an explicit stack
///
/// Returns all distinct markings (start first) and the `(from, transition, to)` edges between them.
fn explore<'n>(
    start: &Marking<'n>,
    rule: FiringRule,
) -> Result<(Vec<Marking<'n>>, Vec<(usize, TransitionID, usize)>), FiringError> {
    if start.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }
    let mut seen: HashMap<MarkingSignature, usize> = HashMap::new();
    let mut found = vec![start.clone()];
    let mut edges = Vec::new();
    seen.insert(start.signature(), 0);
    let mut stack = vec![0];
    while let Some(from) = stack.pop() {
        let current = found[from].clone();
        for t in rule.enabled(&current) {
            let next = rule.remark(&current, t.id)?;
            let signature = next.signature();
            let to = match seen.get(&signature) {
                Some(index) => *index,
                None => {
                    let index = found.len();
                    seen.insert(signature, index);
                    found.push(next);
                    stack.push(index);
                    index
                }
            };
            edges.push((from, t.id, to));
        }
    }
    Ok((found, edges))
}

///
/// All markings reachable from `start` (including `start` itself) under `rule`
///
/// Markings are returned in discovery order. An empty start marking yields no markings at all.
/// Terminates only if the reachable state space is finite.
///
pub fn reachable_markings<'n>(
    start: &Marking<'n>,
    rule: FiringRule,
) -> Result<Vec<Marking<'n>>, FiringError> {
    Ok(explore(start, rule)?.0)
}

///
/// Reachability graph: markings as nodes, fired transitions as edges
///
/// Node `0` is the start marking (unless it is empty, in which case the graph is empty).
///
pub fn reachability_graph<'n>(
    start: &Marking<'n>,
    rule: FiringRule,
) -> Result<DiGraph<Marking<'n>, TransitionID>, FiringError> {
    let (markings, edges) = explore(start, rule)?;
    let mut graph = DiGraph::with_capacity(markings.len(), edges.len());
    for m in markings {
        graph.add_node(m);
    }
    for (from, t, to) in edges {
        graph.add_edge(NodeIndex::new(from), NodeIndex::new(to), t);
    }
    Ok(graph)
}
