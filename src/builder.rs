//! Graph builder: dependency graph -> hierarchical graph
//!
//! Nodes are leveled topologically so that heads are created before their
//! dependents. Each token with dependents becomes a unit with an intermediate
//! `head` unit holding its terminal; extra incoming edges are deferred and
//! added as remote edges once the primary tree is complete.

use log::debug;
use rustc_hash::FxHashSet;

use crate::cycles::break_cycles;
use crate::dep::{DepEdgeId, DependencyGraph, Position, stripped_rel};
use crate::format::FormatSpec;
use crate::graph::{
    HEAD_TAG, HierarchicalGraph, NodeTag, ROOT, ROOT_TAG, TERMINAL_TAG, TOP_TAG, TerminalExtra,
};
use crate::traverse::reachable;

/// Heads used for leveling: primary heads, or all heads when none is primary
fn level_heads(dep: &DependencyGraph, incoming: &[DepEdgeId]) -> Vec<Position> {
    let primary: Vec<Position> = incoming
        .iter()
        .filter(|&&e| !dep.edges[e].remote)
        .map(|&e| dep.edges[e].head)
        .collect();
    if primary.is_empty() {
        incoming.iter().map(|&e| dep.edges[e].head).collect()
    } else {
        primary
    }
}

/// Topological level of every position: 0 for positions without heads,
/// otherwise one more than the deepest head
pub fn topological_levels(dep: &DependencyGraph) -> Vec<usize> {
    let size = dep.nodes.len();
    let heads: Vec<Vec<Position>> = (0..size)
        .map(|p| level_heads(dep, &dep.incoming(p)))
        .collect();
    let mut levels: Vec<Option<usize>> = vec![None; size];
    let mut heads_visited: Vec<FxHashSet<Position>> = vec![FxHashSet::default(); size];

    let mut run = |mut remaining: Vec<Position>, levels: &mut Vec<Option<usize>>| {
        while let Some(node) = remaining.pop() {
            if levels[node].is_some() {
                continue;
            }
            if heads[node].is_empty() {
                levels[node] = Some(0);
                continue;
            }
            let pending: Vec<Position> = heads[node]
                .iter()
                .copied()
                .filter(|&h| levels[h].is_none() && !heads_visited[node].contains(&h))
                .collect();
            if !pending.is_empty() {
                heads_visited[node].extend(pending.iter().copied());
                remaining.push(node);
                remaining.extend(pending);
                continue;
            }
            let deepest = heads[node]
                .iter()
                .map(|&h| levels[h].unwrap_or(0))
                .max()
                .unwrap_or(0);
            levels[node] = Some(deepest + 1);
        }
    };

    let leaves = (0..size).filter(|&p| !dep.has_outgoing(p)).collect();
    run(leaves, &mut levels);
    // positions never reached from a leaf sit on pure cycles
    for position in 0..size {
        if levels[position].is_none() {
            run(vec![position], &mut levels);
        }
    }
    levels.into_iter().map(|l| l.unwrap_or(0)).collect()
}

struct Builder<'a> {
    spec: &'a FormatSpec,
    graph: HierarchicalGraph,
    /// Relation a position was merged into its head with
    flat: Vec<Option<String>>,
    /// Deferred (head, dependent, relation) edges
    remotes: Vec<(Position, Position, String)>,
}

impl Builder<'_> {
    fn is_punct(&self, dep: &DependencyGraph, position: Position) -> bool {
        self.spec.is_punct(&dep.nodes[position].token)
            || dep
                .primary_edge(position)
                .is_some_and(|e| self.spec.is_punct_rel(dep.edges[e].stripped_rel()))
    }

    fn add_terminals(&mut self, dep: &DependencyGraph) {
        for position in 1..dep.nodes.len() {
            let node = &dep.nodes[position];
            let extra = TerminalExtra {
                enhanced: node.enhanced.clone(),
                misc: node.misc.clone(),
                frame: node.frame.clone(),
                full_rel: node.full_rel.clone(),
                multi_word: dep.multi_word(position).cloned(),
                original_head: dep
                    .primary_edge(position)
                    .and_then(|e| dep.edges[e].original_head),
            };
            let punct = self.is_punct(dep, position);
            self.graph.add_terminal(node.token.clone(), punct, extra);
        }
    }

    /// Units for positions without heads
    fn add_top_nodes(&mut self, dep: &mut DependencyGraph) {
        for position in 1..dep.nodes.len() {
            let has_outgoing = dep.has_outgoing(position);
            if dep.has_incoming(position) || !(has_outgoing || dep.nodes[position].is_top) {
                continue;
            }
            let tag = if dep.nodes[position].is_top { TOP_TAG } else { ROOT_TAG };
            let unit = self.graph.add_unit(ROOT, tag);
            let node = &mut dep.nodes[position];
            node.node = Some(unit);
            node.preterminal = Some(unit);
            if has_outgoing {
                node.preterminal = Some(self.graph.add_unit(unit, HEAD_TAG));
            }
        }
    }

    /// Create the unit for a position from its primary edge
    fn add_node(
        &mut self,
        dep: &mut DependencyGraph,
        position: Position,
        head: Position,
        rel: &str,
    ) {
        let base = stripped_rel(rel);
        let (head_node, head_preterminal) = (dep.nodes[head].node, dep.nodes[head].preterminal);
        let head_is_flat = self.flat[head].is_some();

        if head != 0 && self.spec.is_flat(base) {
            if let (Some(node), Some(preterminal)) = (head_node, head_preterminal) {
                dep.nodes[position].node = Some(node);
                dep.nodes[position].preterminal = Some(preterminal);
                self.flat[position] = Some(rel.to_string());
                return;
            }
        }

        if head != 0 && !head_is_flat && self.spec.is_sibling(base) {
            if let Some(preterminal) = head_preterminal.filter(|&p| Some(p) != head_node) {
                let unit = self.graph.add_unit(preterminal, rel);
                dep.nodes[position].node = Some(unit);
                dep.nodes[position].preterminal = Some(unit);
                dep.nodes[head].preterminal = Some(self.graph.add_unit(preterminal, HEAD_TAG));
                return;
            }
        }

        let parent = if head == 0 { ROOT } else { head_node.unwrap_or(ROOT) };
        let unit = self.graph.add_unit(parent, rel);
        dep.nodes[position].preterminal = Some(unit);
        // punctuation never governs: its dependents go to the enclosing unit
        dep.nodes[position].node = Some(if self.is_punct(dep, position) { parent } else { unit });
    }

    fn add_units(&mut self, dep: &mut DependencyGraph) {
        let levels = topological_levels(dep);
        let mut order: Vec<Position> = (1..dep.nodes.len()).filter(|&p| levels[p] > 0).collect();
        order.sort_by_key(|&p| (levels[p], p));

        for position in order {
            let mut incoming: Vec<(Position, String)> = dep
                .incoming(position)
                .into_iter()
                .map(|e| (dep.edges[e].head, dep.edges[e].rel.clone()))
                .collect();
            if dep.nodes[position].is_top && incoming.first().is_none_or(|(h, _)| *h != 0) {
                incoming.insert(0, (0, TOP_TAG.to_string()));
            }
            let mut edges = incoming.into_iter();
            let Some((head, rel)) = edges.next() else {
                continue;
            };
            self.remotes.extend(edges.map(|(h, r)| (h, position, r)));
            self.add_node(dep, position, head, &rel);
            if self.flat[position].is_none() && dep.has_outgoing(position) {
                let preterminal = dep.nodes[position].preterminal.unwrap_or(ROOT);
                dep.nodes[position].preterminal = Some(self.graph.add_unit(preterminal, HEAD_TAG));
            }
        }
    }

    fn add_remotes(&mut self, dep: &DependencyGraph) {
        for (head, dependent, rel) in std::mem::take(&mut self.remotes) {
            let parent = if head == 0 { ROOT } else { dep.nodes[head].node.unwrap_or(ROOT) };
            let Some(child) = dep.nodes[dependent].node else {
                continue;
            };
            if parent == child
                || self.graph.has_child(parent, child)
                || reachable(&self.graph, child, parent)
            {
                debug!(
                    "Skipping remote edge {head}-[{rel}]->{dependent} in '{}'",
                    self.graph.id
                );
                continue;
            }
            self.graph.add_remote(parent, &rel, child);
        }
    }

    fn link_terminals(&mut self, dep: &DependencyGraph) {
        for position in 1..dep.nodes.len() {
            let terminal = position - 1;
            match dep.nodes[position].preterminal {
                Some(preterminal) => {
                    let tag = self.flat[position].as_deref().unwrap_or(TERMINAL_TAG);
                    self.graph.link_terminal(preterminal, terminal, tag);
                }
                None if !self.spec.allow_orphans => debug!(
                    "Orphan terminal {position} ('{}') in '{}'",
                    dep.nodes[position].token.text, self.graph.id
                ),
                None => {}
            }
        }
        for unit in 1..self.graph.node_count() {
            if self.graph.node(unit).tag != NodeTag::Unit {
                continue;
            }
            let all_punct = {
                let mut children = self.graph.children(unit).peekable();
                if children.peek().is_none() {
                    continue;
                }
                children.all(|c| {
                    self.graph
                        .terminal_index(c)
                        .is_some_and(|t| self.graph.terminals[t].punct)
                })
            };
            if all_punct {
                self.graph.node_mut(unit).tag = NodeTag::Punctuation;
            }
        }
    }
}

/// Build a hierarchical graph from a (preprocessed) dependency graph
pub fn build(dep: &mut DependencyGraph, spec: &FormatSpec) -> HierarchicalGraph {
    let mut builder = Builder {
        spec,
        graph: HierarchicalGraph::new(dep.id.clone(), dep.format),
        flat: vec![None; dep.nodes.len()],
        remotes: Vec::new(),
    };
    dep.nodes[0].node = Some(ROOT);
    dep.nodes[0].preterminal = Some(ROOT);
    builder.add_terminals(dep);
    builder.add_top_nodes(dep);
    builder.add_units(dep);
    builder.add_remotes(dep);
    builder.link_terminals(dep);
    let mut graph = builder.graph;
    break_cycles(&mut graph);
    graph.update_implicit();
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dep::Token;
    use crate::format::Format;
    use crate::traverse::find_cycle;

    fn sentence(words: &[&str], edges: &[(Position, Position, &str)]) -> DependencyGraph {
        let mut dep = DependencyGraph::new("s", Format::Conllu);
        for word in words {
            dep.add_node(Token::new(*word));
        }
        for &(head, dependent, rel) in edges {
            dep.add_edge(head, dependent, rel, false);
        }
        dep
    }

    #[test]
    fn test_levels() {
        let dep = sentence(
            &["The", "dog", "barks"],
            &[(2, 1, "det"), (3, 2, "nsubj"), (0, 3, "root")],
        );
        assert_eq!(topological_levels(&dep), vec![0, 3, 2, 1]);
    }

    #[test]
    fn test_levels_with_cycle() {
        let dep = sentence(&["a", "b"], &[(1, 2, "x"), (2, 1, "y")]);
        let levels = topological_levels(&dep);
        assert!(levels[1] > 0 && levels[2] > 0);
    }

    #[test]
    fn test_build_simple() {
        let mut dep = sentence(
            &["The", "dog", "barks"],
            &[(2, 1, "det"), (3, 2, "nsubj"), (0, 3, "root")],
        );
        let spec = FormatSpec::conllu();
        let graph = build(&mut dep, &spec);
        assert_eq!(graph.terminals.len(), 3);

        // root -> root unit -> {head -> barks, nsubj -> {head -> dog, det -> The}}
        let top: Vec<_> = graph.outgoing(ROOT).iter().map(|&e| graph.edge(e).tag.clone()).collect();
        assert_eq!(top, ["root"]);
        let barks_unit = dep.nodes[3].node.unwrap();
        let tags: Vec<_> = graph
            .outgoing(barks_unit)
            .iter()
            .map(|&e| graph.edge(e).tag.as_str())
            .collect();
        assert_eq!(tags, ["head", "nsubj"]);
        let the = graph.terminals[0].node;
        assert_eq!(graph.parent(the), dep.nodes[1].preterminal);
        assert!(find_cycle(&graph).is_none());
    }

    #[test]
    fn test_remote_deferred() {
        let mut dep = sentence(
            &["a", "b", "c"],
            &[(0, 1, "root"), (1, 2, "x"), (2, 3, "y")],
        );
        dep.add_edge(1, 3, "z", true);
        // would close a cycle
        dep.add_edge(3, 1, "w", true);
        let graph = build(&mut dep, &FormatSpec::conll());
        let c = dep.nodes[3].node.unwrap();
        let remotes: Vec<_> = graph
            .incoming(c)
            .iter()
            .filter(|&&e| graph.edge(e).remote)
            .map(|&e| graph.edge(e).tag.clone())
            .collect();
        assert_eq!(remotes, ["z"]);
        let a = dep.nodes[1].node.unwrap();
        assert!(graph.incoming(a).iter().all(|&e| !graph.edge(e).remote));
        assert!(find_cycle(&graph).is_none());
    }

    #[test]
    fn test_flat_merges_into_head() {
        let mut dep = sentence(
            &["New", "York", "sleeps"],
            &[(3, 1, "nsubj"), (1, 2, "flat"), (0, 3, "root")],
        );
        let graph = build(&mut dep, &FormatSpec::conllu());
        assert_eq!(dep.nodes[2].preterminal, dep.nodes[1].preterminal);
        let york = graph.terminals[1].node;
        let edge = graph.primary_incoming(york).unwrap();
        assert_eq!(graph.edge(edge).tag, "flat");
    }

    #[test]
    fn test_parataxis_at_scene_level() {
        let mut dep = sentence(
            &["he", "came", "she", "left"],
            &[(2, 1, "nsubj"), (0, 2, "root"), (4, 3, "nsubj"), (2, 4, "parataxis")],
        );
        let spec = FormatSpec::conllu();
        crate::preprocess::forward(&mut dep, &spec);
        let graph = build(&mut dep, &spec);
        let top: Vec<_> = graph
            .outgoing(ROOT)
            .iter()
            .map(|&e| graph.edge(e).tag.as_str())
            .collect();
        assert_eq!(top, ["root", "parataxis"]);
        assert_eq!(graph.terminals[3].extra.original_head, Some(2));
    }

    #[test]
    fn test_aux_sibling() {
        let mut dep = sentence(
            &["he", "will", "go"],
            &[(3, 1, "nsubj"), (3, 2, "aux"), (0, 3, "root")],
        );
        let graph = build(&mut dep, &FormatSpec::conllu());
        let go = graph.terminals[2].node;
        let will = graph.terminals[1].node;
        let go_pre = graph.parent(go).unwrap();
        let will_unit = graph.parent(will).unwrap();
        // aux unit and the new head unit share a parent
        assert_eq!(graph.parent(go_pre), graph.parent(will_unit));
        assert_eq!(graph.edge(graph.primary_incoming(will_unit).unwrap()).tag, "aux");
    }

    #[test]
    fn test_punct_unit() {
        let mut dep = sentence(&["go", "!"], &[(0, 1, "root"), (1, 2, "U")]);
        dep.nodes[2].token.pos = "PUNCT".to_string();
        let graph = build(&mut dep, &FormatSpec::conllu());
        assert!(graph.terminals[1].punct);
        let unit = graph.parent(graph.terminals[1].node).unwrap();
        assert_eq!(graph.node(unit).tag, NodeTag::Punctuation);
        // dependents of punctuation attach to the enclosing unit
        assert_eq!(dep.nodes[2].node, dep.nodes[1].node);
    }

    #[test]
    fn test_top_nodes() {
        let mut dep = DependencyGraph::new("s", Format::Sdp);
        for word in ["a", "b", "c"] {
            dep.add_node(Token::new(word));
        }
        dep.add_edge(1, 2, "arg0", false);
        dep.nodes[3].is_top = true;
        dep.nodes[2].is_top = true;
        let graph = build(&mut dep, &FormatSpec::sdp());
        let tags: Vec<_> = graph
            .outgoing(ROOT)
            .iter()
            .map(|&e| graph.edge(e).tag.as_str())
            .collect();
        // a has dependents, c is an orphan top, b is top with a head
        assert_eq!(tags, [ROOT_TAG, TOP_TAG, TOP_TAG]);
        let b = dep.nodes[2].node.unwrap();
        assert!(graph.incoming(b).iter().any(|&e| graph.edge(e).remote));
    }
}
