//! Cycle detection and breaking
//!
//! Breaking is a best-effort repair: it removes the lowest-priority edge of
//! one cycle at a time until the graph is acyclic, and never fails.

use log::debug;

use crate::graph::{EdgeId, HierarchicalGraph, LINKER_TAGS, NodeId};
use crate::traverse::{find_cycle, walk_cycles};

/// All cycles met in one depth-first walk, as node paths
pub fn detect_cycles(graph: &HierarchicalGraph) -> Vec<Vec<NodeId>> {
    let mut cycles = Vec::new();
    walk_cycles(graph, |cycle| {
        cycles.push(cycle.nodes(graph));
        true
    });
    cycles
}

/// Lower keys are removed first: remote before primary, then non-linker before linker
fn priority(graph: &HierarchicalGraph, edge: EdgeId) -> (bool, bool) {
    let edge = graph.edge(edge);
    (!edge.remote, LINKER_TAGS.contains(&edge.tag.as_str()))
}

/// Remove edges until no cycle remains, returning how many were removed
pub fn break_cycles(graph: &mut HierarchicalGraph) -> usize {
    let mut removed = 0;
    while let Some(cycle) = find_cycle(graph) {
        // the closing edge wins ties, then the earliest edge on the path
        let candidates = std::iter::once(cycle.closing).chain(cycle.path.iter().copied());
        let Some(victim) = candidates.min_by_key(|&e| priority(graph, e)) else {
            break;
        };
        let edge = graph.edge(victim).clone();
        debug!(
            "Breaking cycle in '{}': removing {}-[{}{}]->{}",
            graph.id,
            edge.parent,
            edge.tag,
            if edge.remote { "*" } else { "" },
            edge.child
        );
        graph.remove_edge(victim);
        removed += 1;
        if !edge.remote && graph.primary_incoming(edge.child).is_none() {
            if let Some(&promoted) = graph.incoming(edge.child).first() {
                graph.edge_mut(promoted).remote = false;
            }
        }
    }
    removed
}
