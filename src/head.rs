//! Head selection
//!
//! Picks one head child per unit from a priority list of edge tags, and
//! descends to the head terminal. Used to flatten hierarchical graphs into
//! per-token dependency edges.

use crate::error::{ConvertError, Result};
use crate::graph::{EdgeId, HierarchicalGraph, NodeId, ROOT};
use crate::traverse::terminal_yield;

/// What to pick when no priority tag matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadFallback {
    /// First primary non-implicit child
    FirstChild,
    /// Child with the most terminal descendants, ties to the earliest
    LargestYield,
}

/// Priority-based head child resolution
#[derive(Debug, Clone, Copy)]
pub struct HeadSelector<'a> {
    priority: &'a [String],
    fallback: HeadFallback,
}

impl<'a> HeadSelector<'a> {
    pub fn new(priority: &'a [String], fallback: HeadFallback) -> Self {
        Self { priority, fallback }
    }

    /// Primary edges to non-implicit children, optionally restricted to a tag
    fn primary_edges<'g>(
        graph: &'g HierarchicalGraph,
        unit: NodeId,
        tag: Option<&'g str>,
    ) -> impl Iterator<Item = EdgeId> + 'g {
        graph.outgoing(unit).iter().copied().filter(move |&e| {
            let edge = graph.edge(e);
            !edge.remote
                && !graph.node(edge.child).implicit
                && tag.is_none_or(|t| edge.tag == t)
        })
    }

    /// The head child of a unit
    pub fn head_child(&self, graph: &HierarchicalGraph, unit: NodeId) -> Result<NodeId> {
        for tag in self.priority {
            if let Some(edge) = Self::primary_edges(graph, unit, Some(tag.as_str())).next() {
                return Ok(graph.edge(edge).child);
            }
        }
        let fallback = match self.fallback {
            HeadFallback::FirstChild => Self::primary_edges(graph, unit, None).next(),
            HeadFallback::LargestYield => {
                let mut best: Option<(usize, EdgeId)> = None;
                for edge in Self::primary_edges(graph, unit, None) {
                    let size = terminal_yield(graph, graph.edge(edge).child).len();
                    if best.is_none_or(|(s, _)| size > s) {
                        best = Some((size, edge));
                    }
                }
                best.map(|(_, edge)| edge)
            }
        };
        fallback.map(|edge| graph.edge(edge).child).ok_or_else(|| {
            ConvertError::structural(
                &graph.id,
                format!("Could not find head child for unit {unit}"),
            )
        })
    }

    /// Descend through head children until a terminal is reached
    pub fn head_terminal(&self, graph: &HierarchicalGraph, unit: NodeId) -> Result<NodeId> {
        let mut current = unit;
        let mut steps = 0;
        while !graph.outgoing(current).is_empty() && !graph.is_terminal(current) {
            current = self.head_child(graph, current)?;
            steps += 1;
            if steps > graph.node_count() {
                return Err(ConvertError::structural(&graph.id, "Cycle in head descent"));
            }
        }
        if !graph.is_terminal(current) {
            return Err(ConvertError::structural(
                &graph.id,
                format!("Implicit unit {current} in conversion to dependencies"),
            ));
        }
        Ok(current)
    }

    /// Is this node the head child of its primary parent?
    pub fn is_head_child(&self, graph: &HierarchicalGraph, node: NodeId) -> bool {
        match graph.parent(node) {
            Some(parent) if parent != ROOT => {
                self.head_child(graph, parent).is_ok_and(|h| h == node)
            }
            _ => false,
        }
    }

    /// Climb from a node while it heads its parent, stopping below the root
    pub fn headed_unit(&self, graph: &HierarchicalGraph, node: NodeId) -> NodeId {
        let mut current = node;
        while self.is_head_child(graph, current) {
            match graph.parent(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }
}
