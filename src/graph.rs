//! Hierarchical graph
//!
//! Rooted graph of units and terminals. Every non-root node has one primary
//! parent edge; remote edges add reentrancy on top of that tree. Nodes and
//! edges are stored in arenas and addressed by index, node 0 being the root.

use crate::dep::{MultiWord, Position, Token};
use crate::format::Format;

/// Index of a node in the graph arena
pub type NodeId = usize;

/// Index of an edge in the graph arena
pub type EdgeId = usize;

/// The root node of every graph
pub const ROOT: NodeId = 0;

/// Edge tag linking a preterminal to its terminal
pub const TERMINAL_TAG: &str = "Terminal";

/// Edge tag of punctuation units
pub const PUNCTUATION_TAG: &str = "U";

/// Edge tag of intermediate head units
pub const HEAD_TAG: &str = "head";

/// Edge tag marking top nodes under the root
pub const TOP_TAG: &str = "TOP";

/// Edge tag of top-level units that are not marked top
pub const ROOT_TAG: &str = "ROOT";

/// Linker relations kept in preference when breaking cycles
pub const LINKER_TAGS: [&str; 3] = ["L", "LR", "LA"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTag {
    Root,
    Unit,
    Punctuation,
    Word,
    Punct,
}

impl NodeTag {
    /// Tag as written in treebank exports
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeTag::Root | NodeTag::Unit => "FN",
            NodeTag::Punctuation => "PNCT",
            NodeTag::Word => "Word",
            NodeTag::Punct => "Punctuation",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeTag::Word | NodeTag::Punct)
    }
}

/// Node attribute holding an AMR concept or constant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Concept(String),
    Constant(String),
}

impl Label {
    pub fn value(&self) -> &str {
        match self {
            Label::Concept(s) | Label::Constant(s) => s,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub tag: NodeTag,
    pub label: Option<Label>,
    /// No terminal descendants
    pub implicit: bool,
    /// Index into the terminal table for leaves
    pub terminal: Option<usize>,
    outgoing: Vec<EdgeId>,
    incoming: Vec<EdgeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub parent: NodeId,
    pub child: NodeId,
    pub tag: String,
    pub remote: bool,
}

/// Per-token annotation kept for round trips
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalExtra {
    pub enhanced: String,
    pub misc: String,
    pub frame: String,
    pub full_rel: Option<String>,
    /// Span metadata, kept on the first token of a multi-word span
    pub multi_word: Option<MultiWord>,
    /// Head of the primary edge before high attachment
    pub original_head: Option<Position>,
}

/// Empty columns read as `_`
impl Default for TerminalExtra {
    fn default() -> Self {
        Self {
            enhanced: "_".to_string(),
            misc: "_".to_string(),
            frame: "_".to_string(),
            full_rel: None,
            multi_word: None,
            original_head: None,
        }
    }
}

/// Leaf bound to an input token
#[derive(Debug, Clone)]
pub struct Terminal {
    pub node: NodeId,
    pub token: Token,
    pub punct: bool,
    pub extra: TerminalExtra,
}

#[derive(Debug, Clone)]
pub struct HierarchicalGraph {
    pub id: String,
    pub format: Format,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    pub terminals: Vec<Terminal>,
    /// Original wire lines, when the format keeps them
    pub original: Option<Vec<String>>,
}

impl HierarchicalGraph {
    /// Create a graph holding only the root
    pub fn new(id: impl Into<String>, format: Format) -> Self {
        let mut graph = Self {
            id: id.into(),
            format,
            nodes: Vec::new(),
            edges: Vec::new(),
            terminals: Vec::new(),
            original: None,
        };
        graph.push_node(NodeTag::Root);
        graph
    }

    fn push_node(&mut self, tag: NodeTag) -> NodeId {
        self.nodes.push(Node {
            tag,
            label: None,
            implicit: false,
            terminal: None,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Add a unit under `parent` with a primary edge
    pub fn add_unit(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let node = self.push_node(NodeTag::Unit);
        self.add_edge(parent, node, tag, false);
        node
    }

    /// Add a terminal leaf, not yet attached
    pub fn add_terminal(&mut self, token: Token, punct: bool, extra: TerminalExtra) -> NodeId {
        let node = self.push_node(if punct { NodeTag::Punct } else { NodeTag::Word });
        self.nodes[node].terminal = Some(self.terminals.len());
        self.terminals.push(Terminal {
            node,
            token,
            punct,
            extra,
        });
        node
    }

    pub fn add_edge(&mut self, parent: NodeId, child: NodeId, tag: &str, remote: bool) -> EdgeId {
        let id = self.edges.len();
        self.edges.push(Edge {
            parent,
            child,
            tag: tag.to_string(),
            remote,
        });
        self.nodes[parent].outgoing.push(id);
        self.nodes[child].incoming.push(id);
        id
    }

    pub fn add_remote(&mut self, parent: NodeId, tag: &str, child: NodeId) -> EdgeId {
        self.add_edge(parent, child, tag, true)
    }

    /// Detach an edge from both endpoints; the id is not reused
    pub fn remove_edge(&mut self, edge: EdgeId) {
        let Edge { parent, child, .. } = self.edges[edge];
        self.nodes[parent].outgoing.retain(|&e| e != edge);
        self.nodes[child].incoming.retain(|&e| e != edge);
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id]
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> &mut Edge {
        &mut self.edges[id]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn outgoing(&self, id: NodeId) -> &[EdgeId] {
        &self.nodes[id].outgoing
    }

    pub fn incoming(&self, id: NodeId) -> &[EdgeId] {
        &self.nodes[id].incoming
    }

    /// Children in edge order, remote ones included
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id].outgoing.iter().map(|&e| self.edges[e].child)
    }

    /// Attached edges, in node order
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.nodes.iter().flat_map(|n| n.outgoing.iter().copied())
    }

    /// The single non-remote incoming edge
    pub fn primary_incoming(&self, id: NodeId) -> Option<EdgeId> {
        self.nodes[id]
            .incoming
            .iter()
            .copied()
            .find(|&e| !self.edges[e].remote)
    }

    /// Parent along the primary edge
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.primary_incoming(id).map(|e| self.edges[e].parent)
    }

    pub fn has_child(&self, parent: NodeId, child: NodeId) -> bool {
        self.children(parent).any(|c| c == child)
    }

    pub fn is_terminal(&self, id: NodeId) -> bool {
        self.nodes[id].terminal.is_some()
    }

    /// Terminal table index for a node, if it is a leaf
    pub fn terminal_index(&self, id: NodeId) -> Option<usize> {
        self.nodes[id].terminal
    }

    /// Attach a terminal under a preterminal
    pub fn link_terminal(&mut self, parent: NodeId, terminal: usize, tag: &str) -> EdgeId {
        let node = self.terminals[terminal].node;
        self.add_edge(parent, node, tag, false)
    }

    /// Terminal table indices of direct terminal children
    pub fn direct_terminals(&self, id: NodeId) -> Vec<usize> {
        self.children(id)
            .filter_map(|c| self.nodes[c].terminal)
            .collect()
    }

    /// Mark every non-root unit without terminal descendants as implicit
    pub fn update_implicit(&mut self) {
        for node in &mut self.nodes {
            node.implicit = false;
        }
        loop {
            let mut changed = false;
            for id in 1..self.nodes.len() {
                let node = &self.nodes[id];
                if node.implicit || node.tag.is_terminal() {
                    continue;
                }
                if self.children(id).all(|c| self.nodes[c].implicit) {
                    self.nodes[id].implicit = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }
}
