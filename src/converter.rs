//! Dependency <-> hierarchical conversion for one format

use crate::builder::build;
use crate::dep::DependencyGraph;
use crate::error::Result;
use crate::flatten::flatten;
use crate::format::FormatSpec;
use crate::graph::HierarchicalGraph;
use crate::preprocess;

/// Which way a preprocessing pass runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Dependencies about to be built into a hierarchical graph
    ToGraph,
    /// Dependencies just flattened out of a hierarchical graph
    ToDependencies,
}

/// Converter bound to one format's configuration
#[derive(Debug, Clone, Copy)]
pub struct DependencyConverter<'a> {
    spec: &'a FormatSpec,
}

impl<'a> DependencyConverter<'a> {
    pub fn new(spec: &'a FormatSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &'a FormatSpec {
        self.spec
    }

    /// Build the hierarchical graph for a dependency graph
    pub fn to_graph(&self, dep: &mut DependencyGraph) -> HierarchicalGraph {
        build(dep, self.spec)
    }

    /// Flatten a hierarchical graph into dependencies
    pub fn from_graph(&self, graph: &HierarchicalGraph) -> Result<DependencyGraph> {
        flatten(graph, self.spec)
    }

    /// Relabel and re-attach edges in place
    pub fn preprocess(&self, dep: &mut DependencyGraph, direction: Direction, mark_aux: bool) {
        match direction {
            Direction::ToGraph => preprocess::forward(dep, self.spec),
            Direction::ToDependencies => preprocess::reverse(dep, self.spec, mark_aux),
        }
    }
}
