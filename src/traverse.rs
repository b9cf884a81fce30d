//! Graph traversal helpers
//!
//! All walks are iterative worklists over a visited bitset so that deep or
//! pathological graphs cannot exhaust the stack.

use std::collections::VecDeque;

use crate::graph::{EdgeId, HierarchicalGraph, NodeId, ROOT};

/// Bitset of visited arena indices
#[derive(Debug, Clone)]
pub struct VisitedSet(Vec<bool>);

impl VisitedSet {
    pub fn new(size: usize) -> Self {
        Self(vec![false; size])
    }

    /// Mark an index, returning true if it was not already marked
    #[inline]
    pub fn insert(&mut self, index: usize) -> bool {
        if index >= self.0.len() {
            self.0.resize(index + 1, false);
        }
        !std::mem::replace(&mut self.0[index], true)
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }

    #[inline]
    pub fn remove(&mut self, index: usize) {
        if let Some(slot) = self.0.get_mut(index) {
            *slot = false;
        }
    }
}

/// Is there a path from `from` to `to` over primary and remote edges?
pub fn reachable(graph: &HierarchicalGraph, from: NodeId, to: NodeId) -> bool {
    let mut visited = VisitedSet::new(graph.node_count());
    let mut queue = VecDeque::from([from]);
    while let Some(node) = queue.pop_front() {
        if node == to {
            return true;
        }
        if visited.insert(node) {
            queue.extend(graph.children(node));
        }
    }
    false
}

/// Terminal table indices below a node along primary edges, in order
pub fn terminal_yield(graph: &HierarchicalGraph, node: NodeId) -> Vec<usize> {
    let mut visited = VisitedSet::new(graph.node_count());
    let mut stack = vec![node];
    let mut terminals = Vec::new();
    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        if let Some(index) = graph.terminal_index(current) {
            terminals.push(index);
        }
        for &edge in graph.outgoing(current) {
            let edge = graph.edge(edge);
            if !edge.remote {
                stack.push(edge.child);
            }
        }
    }
    terminals.sort_unstable();
    terminals
}

/// Nodes below a node over all edges, breadth-first, the node itself excluded
pub fn descendants(graph: &HierarchicalGraph, node: NodeId) -> Vec<NodeId> {
    let mut visited = VisitedSet::new(graph.node_count());
    visited.insert(node);
    let mut queue = VecDeque::from([node]);
    let mut found = Vec::new();
    while let Some(current) = queue.pop_front() {
        for child in graph.children(current) {
            if visited.insert(child) {
                found.push(child);
                queue.push_back(child);
            }
        }
    }
    found
}

/// A cycle as the edges along the DFS path plus the edge that closes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    pub path: Vec<EdgeId>,
    pub closing: EdgeId,
}

impl Cycle {
    /// Nodes on the cycle, starting at the node the closing edge points to
    pub fn nodes(&self, graph: &HierarchicalGraph) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.path.iter().map(|&e| graph.edge(e).parent).collect();
        nodes.push(graph.edge(self.closing).parent);
        nodes
    }
}

/// Walk the graph depth-first from the root, then from every node not yet
/// seen, calling `on_cycle` for each edge into a node on the current path.
/// The walk stops early when the callback returns false.
pub fn walk_cycles(graph: &HierarchicalGraph, mut on_cycle: impl FnMut(Cycle) -> bool) {
    let size = graph.node_count();
    let mut visited = VisitedSet::new(size);
    let mut on_path = VisitedSet::new(size);
    let starts = std::iter::once(ROOT).chain(1..size);
    for start in starts {
        if visited.contains(start) {
            continue;
        }
        visited.insert(start);
        on_path.insert(start);
        // (node, next outgoing index, edge leading here)
        let mut stack: Vec<(NodeId, usize, Option<EdgeId>)> = vec![(start, 0, None)];
        while let Some(frame) = stack.last_mut() {
            let (node, next, _) = *frame;
            let outgoing = graph.outgoing(node);
            if next >= outgoing.len() {
                on_path.remove(node);
                stack.pop();
                continue;
            }
            frame.1 += 1;
            let edge = outgoing[next];
            let child = graph.edge(edge).child;
            if on_path.contains(child) {
                let entry = stack.iter().position(|&(n, _, _)| n == child).unwrap_or(0);
                let path = stack[entry + 1..].iter().filter_map(|&(_, _, e)| e).collect();
                if !on_cycle(Cycle { path, closing: edge }) {
                    return;
                }
            } else if visited.insert(child) {
                on_path.insert(child);
                stack.push((child, 0, Some(edge)));
            }
        }
    }
}

/// First cycle found, if any
pub fn find_cycle(graph: &HierarchicalGraph) -> Option<Cycle> {
    let mut found = None;
    walk_cycles(graph, |cycle| {
        found = Some(cycle);
        false
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dep::Token;
    use crate::format::Format;
    use crate::graph::{TERMINAL_TAG, TerminalExtra};

    fn chain() -> HierarchicalGraph {
        let mut graph = HierarchicalGraph::new("c", Format::Amr);
        let a = graph.add_unit(ROOT, "A");
        let b = graph.add_unit(a, "B");
        let c = graph.add_unit(b, "C");
        for (i, word) in ["x", "y"].into_iter().enumerate() {
            graph.add_terminal(Token::new(word), false, TerminalExtra::default());
            graph.link_terminal(if i == 0 { b } else { c }, i, TERMINAL_TAG);
        }
        graph
    }

    #[test]
    fn test_visited_set() {
        let mut visited = VisitedSet::new(2);
        assert!(visited.insert(1));
        assert!(!visited.insert(1));
        assert!(visited.insert(5));
        assert!(visited.contains(5));
        visited.remove(5);
        assert!(!visited.contains(5));
    }

    #[test]
    fn test_reachable() {
        let graph = chain();
        assert!(reachable(&graph, 1, 3));
        assert!(!reachable(&graph, 3, 1));
        assert!(reachable(&graph, 2, 2));
    }

    #[test]
    fn test_terminal_yield() {
        let mut graph = chain();
        assert_eq!(terminal_yield(&graph, 1), vec![0, 1]);
        assert_eq!(terminal_yield(&graph, 3), vec![1]);
        // remote edges do not count
        graph.add_remote(3, "R", 4);
        assert_eq!(terminal_yield(&graph, 3), vec![1]);
    }

    #[test]
    fn test_descendants() {
        let graph = chain();
        assert_eq!(descendants(&graph, 1), vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_find_cycle() {
        let mut graph = chain();
        assert!(find_cycle(&graph).is_none());
        let back = graph.add_remote(3, "R", 1);
        let cycle = find_cycle(&graph).unwrap();
        assert_eq!(cycle.closing, back);
        assert_eq!(cycle.path.len(), 2);
        assert_eq!(cycle.nodes(&graph), vec![1, 2, 3]);
    }

    #[test]
    fn test_cycle_unreachable_from_root() {
        let mut graph = HierarchicalGraph::new("c", Format::Amr);
        let a = graph.add_unit(ROOT, "A");
        let b = graph.add_unit(a, "B");
        let edge = graph.primary_incoming(a).unwrap();
        graph.remove_edge(edge);
        graph.add_edge(b, a, "C", false);
        let cycle = find_cycle(&graph).unwrap();
        assert_eq!(cycle.path.len(), 1);
    }
}
