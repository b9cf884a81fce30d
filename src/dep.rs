//! Flat dependency graphs
//!
//! Positional token/edge representation that the line codecs read and write.
//! Nodes and edges live in arenas; incoming and outgoing lists are views over
//! the edge table, so moving an edge to a new head is a single field write.

use crate::format::Format;
use crate::graph::NodeId;

/// Position of a token; 0 is the synthetic root
pub type Position = usize;

/// Index into the edge table
pub type DepEdgeId = usize;

/// Surface token with its annotation columns
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Token {
    pub text: String,
    /// Fine-grained tag (XPOS)
    pub tag: String,
    /// Coarse part of speech (UPOS)
    pub pos: String,
    pub lemma: String,
    pub features: String,
    pub paragraph: usize,
}

impl Token {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tag: "_".to_string(),
            pos: "_".to_string(),
            lemma: "_".to_string(),
            features: "_".to_string(),
            paragraph: 1,
        }
    }
}

/// Multi-word surface token spanning several analyzed tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiWord {
    pub start: Position,
    pub end: Position,
    pub text: String,
}

/// A token position in the dependency graph
#[derive(Debug, Clone, Default)]
pub struct DepNode {
    pub position: Position,
    pub token: Token,
    pub is_top: bool,
    pub is_head: bool,
    /// Index into the multi-word table, set on the first token of a span only
    pub multi_word: Option<usize>,
    /// Raw enhanced dependency column
    pub enhanced: String,
    pub misc: String,
    /// SDP frame column
    pub frame: String,
    /// Primary relation before suffix stripping
    pub full_rel: Option<String>,
    /// Hierarchical node built for this token
    pub node: Option<NodeId>,
    /// Nearest structural ancestor the terminal hangs from
    pub preterminal: Option<NodeId>,
}

impl DepNode {
    fn new(position: Position, token: Token) -> Self {
        Self {
            position,
            token,
            enhanced: "_".to_string(),
            misc: "_".to_string(),
            frame: "_".to_string(),
            ..Default::default()
        }
    }
}

/// Labeled head -> dependent edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepEdge {
    pub head: Position,
    pub dependent: Position,
    pub rel: String,
    pub remote: bool,
    /// Head before high-attachment re-parenting
    pub original_head: Option<Position>,
}

impl DepEdge {
    /// Relation without subtype suffix (`nsubj:pass` -> `nsubj`)
    pub fn stripped_rel(&self) -> &str {
        stripped_rel(&self.rel)
    }
}

/// Strip the subtype suffix from a relation label
pub fn stripped_rel(rel: &str) -> &str {
    rel.split_once(':').map_or(rel, |(base, _)| base)
}

/// A sentence as a flat list of positions and edges
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    pub id: String,
    pub format: Format,
    pub nodes: Vec<DepNode>,
    pub edges: Vec<DepEdge>,
    pub multi_words: Vec<MultiWord>,
}

impl DependencyGraph {
    /// Create an empty graph holding only the root sentinel
    pub fn new(id: impl Into<String>, format: Format) -> Self {
        Self {
            id: id.into(),
            format,
            nodes: vec![DepNode::new(0, Token::default())],
            edges: Vec::new(),
            multi_words: Vec::new(),
        }
    }

    /// Append a token, returning its position
    pub fn add_node(&mut self, token: Token) -> Position {
        let position = self.nodes.len();
        self.nodes.push(DepNode::new(position, token));
        position
    }

    pub fn add_edge(
        &mut self,
        head: Position,
        dependent: Position,
        rel: impl Into<String>,
        remote: bool,
    ) -> DepEdgeId {
        self.edges.push(DepEdge {
            head,
            dependent,
            rel: rel.into(),
            remote,
            original_head: None,
        });
        self.edges.len() - 1
    }

    /// Number of real tokens (root excluded)
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Incoming edges of a position, primary edges first, otherwise in insertion order
    pub fn incoming(&self, position: Position) -> Vec<DepEdgeId> {
        let mut ids: Vec<DepEdgeId> = (0..self.edges.len())
            .filter(|&i| self.edges[i].dependent == position)
            .collect();
        ids.sort_by_key(|&i| self.edges[i].remote);
        ids
    }

    /// Outgoing edges of a position in insertion order
    pub fn outgoing(&self, position: Position) -> Vec<DepEdgeId> {
        (0..self.edges.len())
            .filter(|&i| self.edges[i].head == position)
            .collect()
    }

    pub fn has_incoming(&self, position: Position) -> bool {
        self.edges.iter().any(|e| e.dependent == position)
    }

    pub fn has_outgoing(&self, position: Position) -> bool {
        self.edges.iter().any(|e| e.head == position)
    }

    /// First non-remote incoming edge
    pub fn primary_edge(&self, position: Position) -> Option<DepEdgeId> {
        self.edges
            .iter()
            .position(|e| e.dependent == position && !e.remote)
    }

    /// Move an edge to a new head; it leaves the old head's outgoing view
    pub fn set_head(&mut self, edge: DepEdgeId, head: Position) {
        self.edges[edge].head = head;
    }

    /// Multi-word span that starts at this position
    pub fn multi_word(&self, position: Position) -> Option<&MultiWord> {
        self.nodes[position]
            .multi_word
            .and_then(|i| self.multi_words.get(i))
    }

    /// Set `is_head` on every position that governs another
    pub fn update_heads(&mut self) {
        for position in 0..self.nodes.len() {
            let is_head = self.has_outgoing(position);
            self.nodes[position].is_head = is_head;
        }
    }

    /// Tokens of the sentence, root excluded
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.nodes.iter().skip(1).map(|n| &n.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DependencyGraph {
        let mut graph = DependencyGraph::new("1", Format::Conllu);
        for word in ["The", "dog", "runs"] {
            graph.add_node(Token::new(word));
        }
        graph.add_edge(2, 1, "det", false);
        graph.add_edge(3, 2, "nsubj", false);
        graph.add_edge(0, 3, "root", false);
        graph
    }

    #[test]
    fn test_views() {
        let graph = sample();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.outgoing(3), vec![1]);
        assert_eq!(graph.incoming(2), vec![1]);
        assert!(graph.has_outgoing(0));
        assert!(!graph.has_outgoing(1));
        let texts: Vec<_> = graph.tokens().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["The", "dog", "runs"]);
    }

    #[test]
    fn test_incoming_primary_first() {
        let mut graph = sample();
        let remote = graph.add_edge(3, 1, "nmod", true);
        let extra = graph.add_edge(1, 1, "x", false);
        assert_eq!(graph.incoming(1), vec![0, extra, remote]);
        assert_eq!(graph.primary_edge(1), Some(0));
    }

    #[test]
    fn test_set_head_relinks() {
        let mut graph = sample();
        graph.set_head(0, 3);
        assert!(graph.outgoing(2).is_empty());
        assert_eq!(graph.outgoing(3), vec![0, 1]);
        assert_eq!(graph.incoming(1), vec![0]);
    }

    #[test]
    fn test_stripped_rel() {
        assert_eq!(stripped_rel("nsubj:pass"), "nsubj");
        assert_eq!(stripped_rel("obj"), "obj");
        let graph = sample();
        assert_eq!(graph.edges[1].stripped_rel(), "nsubj");
    }

    #[test]
    fn test_update_heads() {
        let mut graph = sample();
        graph.update_heads();
        assert!(graph.nodes[2].is_head);
        assert!(!graph.nodes[1].is_head);
    }
}
