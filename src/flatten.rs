//! Hierarchical graph -> dependency graph
//!
//! Each terminal climbs to the highest unit it heads; the incoming edges of
//! that unit become its dependency edges, headed by the head terminal of
//! each edge's parent.

use log::debug;

use crate::dep::DependencyGraph;
use crate::error::Result;
use crate::format::FormatSpec;
use crate::graph::{HierarchicalGraph, ROOT, ROOT_TAG, TOP_TAG};

/// Flatten a graph using the head priorities of the target format
pub fn flatten(graph: &HierarchicalGraph, spec: &FormatSpec) -> Result<DependencyGraph> {
    let selector = spec.head_selector();
    let mut dep = DependencyGraph::new(graph.id.clone(), graph.format);

    for terminal in &graph.terminals {
        let position = dep.add_node(terminal.token.clone());
        let extra = &terminal.extra;
        let node = &mut dep.nodes[position];
        node.enhanced = extra.enhanced.clone();
        node.misc = extra.misc.clone();
        node.frame = extra.frame.clone();
        node.full_rel = extra.full_rel.clone();
        if let Some(multi_word) = &extra.multi_word {
            node.multi_word = Some(dep.multi_words.len());
            dep.multi_words.push(multi_word.clone());
        }
    }

    for (index, terminal) in graph.terminals.iter().enumerate() {
        let position = index + 1;
        let unit = selector.headed_unit(graph, terminal.node);
        let mut incoming = graph.incoming(unit).to_vec();
        incoming.sort_by_key(|&e| graph.edge(e).remote);

        let mut primary_seen = false;
        for edge_id in incoming {
            let edge = graph.edge(edge_id);
            let head = if edge.parent == ROOT {
                match edge.tag.as_str() {
                    TOP_TAG => {
                        dep.nodes[position].is_top = true;
                        continue;
                    }
                    ROOT_TAG => continue,
                    _ => 0,
                }
            } else {
                let head_node = selector.head_terminal(graph, edge.parent)?;
                graph.terminal_index(head_node).map_or(0, |t| t + 1)
            };
            if head == position {
                debug!(
                    "Dropping self-loop {}-[{}]->{} in '{}'",
                    head, edge.tag, position, graph.id
                );
                continue;
            }
            let id = dep.add_edge(head, position, edge.tag.clone(), edge.remote);
            if !edge.remote && !primary_seen {
                primary_seen = true;
                dep.edges[id].original_head = terminal.extra.original_head;
            }
        }
    }

    dep.update_heads();
    Ok(dep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::dep::{Position, Token};
    use crate::format::Format;
    use crate::graph::{TERMINAL_TAG, TerminalExtra};

    fn pairs(dep: &DependencyGraph) -> Vec<(Position, String, bool)> {
        (1..dep.nodes.len())
            .flat_map(|p| {
                dep.incoming(p)
                    .into_iter()
                    .map(|e| (dep.edges[e].head, dep.edges[e].rel.clone(), dep.edges[e].remote))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn test_round_trip() {
        let mut dep = DependencyGraph::new("s", Format::Conllu);
        for word in ["New", "York", "will", "sleep", "."] {
            dep.add_node(Token::new(word));
        }
        dep.add_edge(4, 1, "nsubj", false);
        dep.add_edge(1, 2, "flat", false);
        dep.add_edge(4, 3, "aux", false);
        dep.add_edge(0, 4, "root", false);
        dep.add_edge(4, 5, "U", false);
        dep.add_edge(3, 1, "dep", true);
        let expected = pairs(&dep);

        let spec = FormatSpec::conllu();
        let graph = build(&mut dep, &spec);
        let flat = flatten(&graph, &spec).unwrap();
        assert_eq!(pairs(&flat), expected);
        assert!(flat.nodes[4].is_head);
        assert!(!flat.nodes[5].is_head);
    }

    #[test]
    fn test_top_edges() {
        let mut dep = DependencyGraph::new("s", Format::Sdp);
        for word in ["a", "b"] {
            dep.add_node(Token::new(word));
        }
        dep.add_edge(1, 2, "arg0", false);
        dep.nodes[1].is_top = true;
        dep.nodes[2].is_top = true;
        let spec = FormatSpec::sdp();
        let graph = build(&mut dep, &spec);
        let flat = flatten(&graph, &spec).unwrap();
        assert!(flat.nodes[1].is_top && flat.nodes[2].is_top);
        assert_eq!(pairs(&flat), vec![(1, "arg0".to_string(), true)]);
    }

    #[test]
    fn test_implicit_head_fails() {
        let mut graph = HierarchicalGraph::new("g", Format::Export);
        graph.add_terminal(Token::new("x"), false, TerminalExtra::default());
        let scene = graph.add_unit(ROOT, "H");
        let empty = graph.add_unit(scene, "P");
        let arg = graph.add_unit(scene, "A");
        graph.add_unit(empty, "C");
        graph.link_terminal(arg, 0, TERMINAL_TAG);
        graph.update_implicit();
        // P is implicit, so A heads the scene and x attaches to the root
        let flat = flatten(&graph, &FormatSpec::export()).unwrap();
        assert_eq!(pairs(&flat), vec![(0, "H".to_string(), false)]);

        // a remote parent with no primary content has no head terminal
        let remote_parent = graph.add_unit(ROOT, "H");
        graph.add_unit(remote_parent, "P");
        graph.add_remote(remote_parent, "D", scene);
        graph.update_implicit();
        assert!(flatten(&graph, &FormatSpec::export()).is_err());
    }
}
