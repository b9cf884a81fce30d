//! NeGra export codec
//!
//! A sentence is a `#BOS <id>` ... `#EOS <id>` block: one line per terminal
//! (`word tag morph edge parent`), then one line per non-terminal numbered
//! from `#500`, each followed by `edge parent` pairs. Parent `0` is the root.

use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::cycles::break_cycles;
use crate::dep::Token;
use crate::error::{ConvertError, Result};
use crate::format::Format;
use crate::graph::{
    HierarchicalGraph, NodeId, NodeTag, PUNCTUATION_TAG, ROOT, TERMINAL_TAG, TerminalExtra,
};
use crate::options::RenderOptions;

pub const MIN_NODE_ID: usize = 500;
pub const MAX_NODE_ID: usize = 999;

const LINK_RELATION: &str = "LR";
const LINK_ARGUMENT: &str = "LA";
const LINKAGE_TAG: &str = "LKG";
const NO_EDGE: &str = "--";

fn is_linkage(tag: &str) -> bool {
    tag == LINK_RELATION || tag == LINK_ARGUMENT
}

/// UPARSE writes `TAG-EDGE` into the tag field and `--` as the edge
fn split_tags<'a>(tag: &'a str, edge: &'a str) -> (&'a str, &'a str) {
    if edge == NO_EDGE {
        tag.split_once('-').unwrap_or((tag, ""))
    } else {
        (tag, edge)
    }
}

struct TerminalLine {
    text: String,
    tag: String,
    edge: String,
    parent: String,
}

/// Lines of one `#BOS` block, before the graph is built
#[derive(Default)]
struct Block {
    id: String,
    terminals: Vec<TerminalLine>,
    /// (parent, edge, node) waiting for their parent to exist
    pending: Vec<(String, String, String)>,
    remotes: Vec<(String, String, String)>,
    /// Linkage parent -> (child, LR or LA)
    linkages: Vec<(String, Vec<(String, String)>)>,
    with_children: FxHashSet<String>,
    root_aliases: Vec<String>,
    in_terminals: bool,
    next_id: usize,
}

impl Block {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            in_terminals: true,
            next_id: MIN_NODE_ID,
            ..Default::default()
        }
    }

    fn read_line(&mut self, line: &str) -> Result<()> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            return Err(ConvertError::structural(
                &self.id,
                format!("Expected at least 5 fields: '{line}'"),
            ));
        }
        let node_id = fields[0]
            .strip_prefix('#')
            .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
        if node_id.and_then(|n| n.parse::<usize>().ok()) == Some(MIN_NODE_ID) {
            self.in_terminals = false;
        }
        if self.in_terminals {
            let (tag, edge) = split_tags(fields[1], fields[3]);
            self.with_children.insert(fields[4].to_string());
            self.terminals.push(TerminalLine {
                text: fields[0].to_string(),
                tag: tag.to_string(),
                edge: edge.to_string(),
                parent: fields[4].to_string(),
            });
            return Ok(());
        }

        let expected = self.next_id.to_string();
        if node_id != Some(expected.as_str()) {
            return Err(ConvertError::structural(
                &self.id,
                format!("Node ID {} does not match order, expected #{expected}", fields[0]),
            ));
        }
        if self.next_id > MAX_NODE_ID {
            return Err(ConvertError::structural(
                &self.id,
                format!("More than {MAX_NODE_ID} nodes found"),
            ));
        }
        self.next_id += 1;
        for pair in fields[3..].chunks_exact(2) {
            let (_, edge) = split_tags(fields[1], pair[0]);
            let parent = pair[1];
            self.with_children.insert(parent.to_string());
            if parent == "0" {
                self.root_aliases.push(expected.clone());
            } else if let Some(edge) = edge.strip_suffix('*') {
                self.remotes.push((parent.to_string(), edge.to_string(), expected.clone()));
            } else if is_linkage(edge) {
                let link = (expected.clone(), edge.to_string());
                match self.linkages.iter_mut().find(|(p, _)| p == parent) {
                    Some((_, children)) => children.push(link),
                    None => self.linkages.push((parent.to_string(), vec![link])),
                }
            } else {
                self.pending.push((parent.to_string(), edge.to_string(), expected.clone()));
            }
        }
        Ok(())
    }

    fn build(self) -> Result<HierarchicalGraph> {
        let id = self.id;
        let mut graph = HierarchicalGraph::new(id.clone(), Format::Export);
        for terminal in &self.terminals {
            let token = Token {
                tag: terminal.tag.clone(),
                pos: terminal.tag.clone(),
                ..Token::new(terminal.text.as_str())
            };
            let punct = terminal.tag == NodeTag::Punct.as_str();
            graph.add_terminal(token, punct, TerminalExtra::default());
        }

        let mut nodes: FxHashMap<String, NodeId> = FxHashMap::default();
        for alias in self.root_aliases {
            nodes.insert(alias, ROOT);
        }
        let mut pending = self.pending;
        while !pending.is_empty() {
            let before = pending.len();
            let mut unresolved = Vec::new();
            for (parent_id, edge, node_id) in pending {
                let Some(&parent) = nodes.get(&parent_id) else {
                    unresolved.push((parent_id, edge, node_id));
                    continue;
                };
                let unit = graph.add_unit(parent, &edge);
                let node = graph.node_mut(unit);
                node.implicit = !self.with_children.contains(&node_id);
                if edge == PUNCTUATION_TAG {
                    node.tag = NodeTag::Punctuation;
                }
                nodes.insert(node_id, unit);
            }
            pending = unresolved;
            if pending.len() == before {
                let (parent, _, node_id) = &pending[0];
                return Err(ConvertError::structural(
                    &id,
                    format!("Node #{node_id} has unknown parent #{parent}"),
                ));
            }
        }

        let lookup = |nodes: &FxHashMap<String, NodeId>, key: &str| {
            nodes
                .get(key)
                .copied()
                .ok_or_else(|| ConvertError::structural(&id, format!("Unknown node #{key}")))
        };
        for (parent, edge, child) in &self.remotes {
            let (parent, child) = (lookup(&nodes, parent)?, lookup(&nodes, child)?);
            graph.add_remote(parent, edge, child);
        }
        for (parent, children) in &self.linkages {
            let linkage = match nodes.get(parent) {
                Some(&node) => node,
                None => graph.add_unit(ROOT, LINKAGE_TAG),
            };
            for (child, edge) in children {
                let child = lookup(&nodes, child)?;
                graph.add_remote(linkage, edge, child);
            }
        }

        for (index, terminal) in self.terminals.iter().enumerate() {
            let Some(&parent) = nodes.get(&terminal.parent) else {
                return Err(ConvertError::structural(
                    &id,
                    format!(
                        "Terminal ('{}') with bad parent ({})",
                        terminal.text, terminal.parent
                    ),
                ));
            };
            let parent = if parent == ROOT {
                warn!("Terminal is a child of the root in '{id}': '{}'", terminal.text);
                graph.add_unit(ROOT, &terminal.edge)
            } else {
                parent
            };
            if terminal.edge != TERMINAL_TAG {
                warn!(
                    "Terminal with incoming {} edge in '{id}': '{}'",
                    terminal.edge, terminal.text
                );
            }
            graph.link_terminal(parent, index, TERMINAL_TAG);
        }
        break_cycles(&mut graph);
        Ok(graph)
    }
}

/// Read every `#BOS` block in the lines
pub fn read<S: AsRef<str>>(lines: &[S], sentence_id: &str) -> Result<Vec<HierarchicalGraph>> {
    let mut graphs = Vec::new();
    let mut block: Option<Block> = None;
    for line in lines.iter().map(|l| l.as_ref().trim()).filter(|l| !l.is_empty()) {
        match block.as_mut() {
            None => {
                let id = line
                    .strip_prefix("#BOS")
                    .and_then(|rest| rest.split_whitespace().next())
                    .filter(|n| n.bytes().all(|b| b.is_ascii_digit()));
                let Some(id) = id else {
                    return Err(ConvertError::structural(
                        sentence_id,
                        format!("Invalid first line: '{line}'"),
                    ));
                };
                block = Some(Block::new(id));
            }
            Some(_) if line.starts_with("#EOS") => {
                if let Some(finished) = block.take() {
                    graphs.push(finished.build()?);
                }
            }
            Some(current) => current.read_line(line)?,
        }
    }
    if block.is_some() {
        return Err(ConvertError::structural(sentence_id, "Missing #EOS line"));
    }
    Ok(graphs)
}

/// Write a graph as one `#BOS` block
pub fn write(graph: &HierarchicalGraph, options: &RenderOptions) -> Result<Vec<String>> {
    let mut ids: FxHashMap<NodeId, usize> = FxHashMap::default();
    let mut entries: Vec<(String, &'static str, Vec<(String, NodeId)>)> = Vec::new();
    let mut nodes: Vec<NodeId> = graph.terminals.iter().map(|t| t.node).collect();

    while !nodes.is_empty() {
        let mut next = Vec::new();
        for node in nodes {
            if ids.contains_key(&node) {
                continue;
            }
            let mut children: Vec<NodeId> = graph
                .children(node)
                .filter(|&c| {
                    !graph.is_terminal(c)
                        && !ids.contains_key(&c)
                        && !(options.tree && graph.node(c).implicit)
                })
                .collect();
            if !children.is_empty() {
                children.sort_unstable();
                next.extend(children);
                continue;
            }

            // primary edges first, linkage edges last
            let mut incoming = graph.incoming(node).to_vec();
            incoming.sort_by_key(|&e| {
                let edge = graph.edge(e);
                (edge.remote, is_linkage(&edge.tag))
            });
            if options.tree {
                incoming.truncate(1);
            }
            let mut parents: Vec<NodeId> = incoming.iter().map(|&e| graph.edge(e).parent).collect();
            parents.sort_unstable();
            next.extend(parents);

            let identifier = match graph.terminal_index(node) {
                Some(index) => graph.terminals[index].token.text.clone(),
                None => {
                    let id = MIN_NODE_ID + ids.len();
                    if id > MAX_NODE_ID {
                        return Err(ConvertError::structural(
                            &graph.id,
                            format!("More than {MAX_NODE_ID} nodes found"),
                        ));
                    }
                    ids.insert(node, id);
                    format!("#{id}")
                }
            };
            let edges = incoming
                .iter()
                .map(|&e| {
                    let edge = graph.edge(e);
                    let mark = if edge.remote && !is_linkage(&edge.tag) { "*" } else { "" };
                    (format!("{}{mark}", edge.tag), edge.parent)
                })
                .collect();
            entries.push((identifier, graph.node(node).tag.as_str(), edges));
        }
        if options.test {
            break;
        }
        nodes = next;
    }

    let mut lines = vec![format!("#BOS {}", graph.id)];
    for (identifier, tag, edges) in entries {
        let mut fields = vec![identifier, tag.to_string(), NO_EDGE.to_string()];
        if !options.test {
            if edges.is_empty() {
                fields.extend([NO_EDGE.to_string(), "0".to_string()]);
            }
            for (edge, parent) in edges {
                let parent = ids.get(&parent).copied().unwrap_or(0);
                fields.extend([edge, parent.to_string()]);
            }
        }
        lines.push(fields.join("\t"));
    }
    lines.push(format!("#EOS {}", graph.id));
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// "John left ." with a scene, a participant and a process
    const PASSAGE: &str = "#BOS 120
John\tWord\t--\tTerminal\t502
left\tWord\t--\tTerminal\t503
.\tPunctuation\t--\tTerminal\t504
#500\tFN\t--\t--\t0
#501\tFN\t--\tH\t500
#502\tFN\t--\tA\t501
#503\tFN\t--\tP\t501
#504\tPNCT\t--\tU\t501
#EOS 120
";

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    fn tags(graph: &HierarchicalGraph, node: NodeId) -> Vec<&str> {
        graph
            .outgoing(node)
            .iter()
            .map(|&e| graph.edge(e).tag.as_str())
            .collect()
    }

    #[test]
    fn test_split_tags() {
        assert_eq!(split_tags("NN-SB", "--"), ("NN", "SB"));
        assert_eq!(split_tags("NN", "SB"), ("NN", "SB"));
        assert_eq!(split_tags("NN", "--"), ("NN", ""));
    }

    #[test]
    fn test_read() {
        let graphs = read(&lines(PASSAGE), "x").unwrap();
        assert_eq!(graphs.len(), 1);
        let graph = &graphs[0];
        assert_eq!(graph.id, "120");
        assert_eq!(graph.terminals.len(), 3);
        assert!(graph.terminals[2].punct);
        assert_eq!(tags(graph, ROOT), ["H"]);
        let scene = graph.children(ROOT).next().unwrap();
        assert_eq!(tags(graph, scene), ["A", "P", "U"]);
        let punct = graph.parent(graph.terminals[2].node).unwrap();
        assert_eq!(graph.node(punct).tag, NodeTag::Punctuation);
        assert!(graph.node_count() > 3);
    }

    #[test]
    fn test_round_trip() {
        let graph = read(&lines(PASSAGE), "x").unwrap().remove(0);
        let written = write(&graph, &RenderOptions::default()).unwrap();
        assert_eq!(written.first().map(String::as_str), Some("#BOS 120"));
        assert_eq!(written.last().map(String::as_str), Some("#EOS 120"));
        assert_eq!(written[1], "John\tWord\t--\tTerminal\t500");

        let again = read(&written, "x").unwrap().remove(0);
        assert_eq!(again.node_count(), graph.node_count());
        let scene = again.children(ROOT).next().unwrap();
        assert_eq!(tags(&again, scene), ["A", "P", "U"]);
        assert_eq!(write(&again, &RenderOptions::default()).unwrap(), written);
    }

    #[test]
    fn test_remote_and_implicit() {
        let text = "#BOS 7
John\tWord\t--\tTerminal\t501
left\tWord\t--\tTerminal\t502
#500\tFN\t--\tH\t0
#501\tFN\t--\tA\t500
#502\tFN\t--\tP\t500
#503\tFN\t--\tD\t500\tA*\t502
#EOS 7";
        let graph = read(&lines(text), "x").unwrap().remove(0);
        let implicit: Vec<_> = (1..graph.node_count())
            .filter(|&n| graph.node(n).implicit)
            .collect();
        assert_eq!(implicit.len(), 1);
        assert!(graph.edges().any(|e| graph.edge(e).remote && graph.edge(e).tag == "A"));

        let written = write(&graph, &RenderOptions::default()).unwrap();
        assert!(written.iter().any(|l| l.contains("\tA*\t")));
        let tree = write(&graph, &RenderOptions::default().with_tree(true)).unwrap();
        assert!(!tree.iter().any(|l| l.contains('*')));
    }

    #[test]
    fn test_test_mode() {
        let graph = read(&lines(PASSAGE), "x").unwrap().remove(0);
        let written = write(&graph, &RenderOptions::default().with_test(true)).unwrap();
        assert_eq!(
            written,
            [
                "#BOS 120",
                "John\tWord\t--",
                "left\tWord\t--",
                ".\tPunctuation\t--",
                "#EOS 120"
            ]
        );
    }

    #[test]
    fn test_errors() {
        let bad_parent = "#BOS 1\nJohn\tWord\t--\tTerminal\t501\n#500\tFN\t--\t--\t0\n#EOS 1";
        let bad_order = "#BOS 1\nJohn\tWord\t--\tTerminal\t500\n#501\tFN\t--\t--\t0\n#EOS 1";
        let bad_start = "John\tWord\t--\tTerminal\t500";
        for text in [bad_parent, bad_order, bad_start] {
            assert!(matches!(
                read(&lines(text), "x"),
                Err(ConvertError::Structural { .. })
            ));
        }
    }
}
