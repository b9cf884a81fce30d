//! AMR reader and writer
//!
//! Reading walks the PENMAN triples breadth-first from the top variable.
//! Variables become units, concepts and constants become node labels, and a
//! variable seen again becomes a remote edge. Tokens are attached through
//! the `~e.` alignments, widened by a surface-string heuristic.
//!
//! Writing runs the same walk over the graph and numbers variables in
//! discovery order.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, VecDeque};
use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::conll::blocks;
use crate::cycles::break_cycles;
use crate::dep::Token;
use crate::error::{ConvertError, Result};
use crate::format::Format;
use crate::graph::{
    EdgeId, HierarchicalGraph, Label, NodeId, NodeTag, PUNCTUATION_TAG, ROOT, TERMINAL_TAG,
    TerminalExtra,
};
use crate::options::{ParseOptions, RenderOptions};
use crate::penman::{self, INSTANCE, PenmanGraph, Target, Triple};
use crate::traverse::terminal_yield;

const NAME: &str = "name";
const OP: &str = "op";
const WIKI: &str = "wiki";
const PREP: &str = "prep";
const MINUS: &str = "-";
const FUNCTION_TAG: &str = "F";
const NUMBERED_RELATIONS: [&str; 2] = ["op", "snt"];

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\s*::id\s+(\S+)").expect("valid id pattern"));
static TOK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\s*::tok\s+(.*)$").expect("valid tok pattern"));
static SNT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\s*::snt\s+(.*)$").expect("valid snt pattern"));
static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(<+)([^<>]+)(>+)").expect("valid bracket pattern"));
static PREFIXED_RELATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(op|snt)\d+|(prep)-.+)$").expect("valid relation pattern")
});
static SENSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\d\d$").expect("valid sense pattern"));
static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("valid number pattern"));
static SKIP_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i:a|an|the|to|of|for|'s|[^\w]+)$").expect("valid skip pattern")
});

/// Read every AMR in the lines
pub fn read<S: AsRef<str>>(
    lines: &[S],
    sentence_id: &str,
    options: &ParseOptions,
) -> Result<Vec<HierarchicalGraph>> {
    blocks(lines)
        .into_iter()
        .filter(|block| block.iter().any(|l| !l.trim_start().starts_with('#')))
        .map(|block| read_sentence(&block, sentence_id, options))
        .collect()
}

/// Split a `::tok` line, dropping markup inside single angle brackets
fn clean_tokens(text: &str) -> Vec<String> {
    let text = text.replace('\\', "");
    let text = BRACKETED.replace_all(&text, |caps: &regex::Captures<'_>| {
        if &caps[1] == "<" && &caps[3] == ">" {
            "<>".to_string()
        } else {
            caps[0].to_string()
        }
    });
    text.split_whitespace()
        .map(|t| match t.trim_matches('@') {
            "" => "@".to_string(),
            t => t.to_string(),
        })
        .collect()
}

fn read_sentence(
    block: &[&str],
    sentence_id: &str,
    options: &ParseOptions,
) -> Result<HierarchicalGraph> {
    let mut id = None;
    let mut tok = None;
    let mut snt = None;
    let mut body = Vec::new();
    for line in block {
        let line = line.trim_start();
        if !line.starts_with('#') {
            body.push(line);
        } else if let Some(caps) = ID_PATTERN.captures(line) {
            id = Some(caps[1].to_string());
        } else if let Some(caps) = TOK_PATTERN.captures(line) {
            tok = Some(caps[1].to_string());
        } else if let Some(caps) = SNT_PATTERN.captures(line) {
            snt = Some(caps[1].to_string());
        }
    }
    let id = id.unwrap_or_else(|| sentence_id.to_string());
    let Some(text) = tok.or(snt) else {
        return Err(ConvertError::structural(
            &id,
            "Cannot convert AMR without input tokens",
        ));
    };
    let tokens = clean_tokens(&text);
    let amr = penman::decode(&body.join(" "))?;

    let mut graph = HierarchicalGraph::new(&id, Format::Amr);
    for token in &tokens {
        let punct = token.chars().all(|c| !c.is_alphanumeric());
        graph.add_terminal(Token::new(token.as_str()), punct, TerminalExtra::default());
    }
    let nodes = build_units(&mut graph, &amr, options)?;
    let preterminals = align(&graph.id, &amr, &nodes, &tokens)?;
    link_terminals(&mut graph, preterminals);
    graph.update_implicit();
    break_cycles(&mut graph);
    if !options.wiki {
        for node in 0..graph.node_count() {
            let is_wiki = graph
                .incoming(node)
                .iter()
                .any(|&e| graph.edge(e).tag == WIKI);
            if is_wiki && graph.node(node).label.is_some() {
                graph.node_mut(node).label = Some(Label::Constant(MINUS.to_string()));
            }
        }
    }
    if options.save_original {
        let mut original = header(&graph, &BTreeMap::new());
        original.extend(penman::encode(&amr.triples, false).lines().map(String::from));
        graph.original = Some(original);
    }
    Ok(graph)
}

/// Relation name without colon and numeric or prepositional suffix
fn normalize_role(role: &str) -> String {
    let rel = role.trim_start_matches(':');
    PREFIXED_RELATION.replace(rel, "${1}${2}").into_owned()
}

/// Is there a path between two variables over the triples?
fn triples_reach(amr: &PenmanGraph, from: &str, to: &str) -> bool {
    let mut visited = FxHashSet::default();
    let mut queue = VecDeque::from([from]);
    while let Some(variable) = queue.pop_front() {
        if variable == to {
            return true;
        }
        if visited.insert(variable) {
            queue.extend(amr.triples.iter().filter_map(|t| match &t.target {
                Target::Variable(v) if t.source == variable => Some(v.as_str()),
                _ => None,
            }));
        }
    }
    false
}

fn strip_quotes(label: &str) -> &str {
    if label.len() > 1 && label.starts_with('"') && label.ends_with('"') {
        &label[1..label.len() - 1]
    } else {
        label
    }
}

/// Create units for variables and labels for concepts and constants.
/// Returns the node each triple was mapped to, in walk order.
fn build_units(
    graph: &mut HierarchicalGraph,
    amr: &PenmanGraph,
    options: &ParseOptions,
) -> Result<Vec<(usize, NodeId)>> {
    let mut variables: FxHashMap<&str, NodeId> = FxHashMap::default();
    variables.insert(amr.top.as_str(), ROOT);
    let mut names: FxHashSet<&str> = FxHashSet::default();
    let mut visited = FxHashSet::default();
    let mut pending: VecDeque<usize> = amr.triples_from(&amr.top).collect();
    let mut nodes = Vec::new();

    while let Some(index) = pending.pop_front() {
        if !visited.insert(index) {
            continue;
        }
        let triple = &amr.triples[index];
        let rel = normalize_role(&triple.role);
        let dep = triple.target.value();
        if rel == NAME {
            names.insert(dep);
        }
        let Some(&parent) = variables.get(triple.source.as_str()) else {
            return Err(ConvertError::structural(
                &graph.id,
                format!(
                    "Outgoing edge from a non-variable: {} {} {dep}",
                    triple.source, triple.role
                ),
            ));
        };

        let seen = match &triple.target {
            Target::Variable(v) => variables.get(v.as_str()).copied(),
            _ => None,
        };
        let node = match seen {
            Some(node) => {
                if !options.remove_cycles || !triples_reach(amr, dep, &triple.source) {
                    graph.add_remote(parent, &rel, node);
                } else {
                    debug!("Skipping reentrancy {} {rel} {dep} in '{}'", triple.source, graph.id);
                }
                node
            }
            None => {
                let is_concept = matches!(triple.target, Target::Concept(_));
                let head_is_name = names.contains(triple.source.as_str());
                let node = if is_concept || head_is_name {
                    parent
                } else {
                    graph.add_unit(parent, &rel)
                };
                match &triple.target {
                    Target::Variable(v) => {
                        variables.insert(v.as_str(), node);
                        pending.extend(amr.triples_from(v));
                    }
                    _ if head_is_name && (is_concept || rel == OP) => {
                        // name ops collapse into one string; the name concept is dropped
                        if !is_concept {
                            let label = graph.node(node).label.as_ref().map(|l| l.value());
                            let joined: Vec<&str> = [label, Some(dep)]
                                .into_iter()
                                .flatten()
                                .map(strip_quotes)
                                .collect();
                            let collapsed = format!("\"{}\"", joined.join("_"));
                            graph.node_mut(node).label = Some(Label::Constant(collapsed));
                        }
                    }
                    Target::Concept(concept) => {
                        graph.node_mut(node).label = Some(Label::Concept(concept.clone()));
                    }
                    Target::Constant(constant) => {
                        graph.node_mut(node).label = Some(Label::Constant(constant.clone()));
                    }
                }
                node
            }
        };
        nodes.push((index, node));
    }
    Ok(nodes)
}

/// Map token indices to the nodes aligned to them, in first-seen order
fn align(
    id: &str,
    amr: &PenmanGraph,
    nodes: &[(usize, NodeId)],
    tokens: &[String],
) -> Result<Vec<(usize, Vec<NodeId>)>> {
    let lower: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
    let mut preterminals: Vec<(usize, Vec<NodeId>)> = Vec::new();
    for &(index, node) in nodes {
        let triple = &amr.triples[index];
        let mut indices = triple.alignment.clone().unwrap_or_default();
        if let Some(bad) = indices.iter().find(|&&i| i >= tokens.len()) {
            return Err(ConvertError::alignment(
                id,
                format!("{} tokens, invalid alignment index {bad}", tokens.len()),
            ));
        }
        if !matches!(triple.target, Target::Variable(_)) {
            indices = expand_alignments(triple.target.value(), indices, &lower);
        }
        for i in indices {
            match preterminals.iter_mut().find(|(t, _)| *t == i) {
                Some((_, parents)) => parents.push(node),
                None => preterminals.push((i, vec![node])),
            }
        }
    }
    Ok(preterminals)
}

/// Do the selected tokens, joined plain or with hyphens, occur in the label?
fn contains_substring(label: &str, tokens: &[String], indices: &[usize]) -> bool {
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    let selected: Vec<&str> = sorted.iter().map(|&i| tokens[i].as_str()).collect();
    label.contains(&selected.concat()) || label.contains(&selected.join("-"))
}

/// Widen or guess the token indices of a concept or constant label
pub fn expand_alignments(label: &str, indices: Vec<usize>, tokens: &[String]) -> Vec<usize> {
    let mut indices = indices;
    indices.sort_unstable();
    let stripped = strip_quotes(&SENSE.replace(label, "")).to_lowercase();

    if let (Some(&first), Some(&last)) = (indices.first(), indices.last()) {
        for (start, step) in [(first as isize, -1), (last as isize, 1)] {
            let mut i = start + step;
            while i >= 0 && (i as usize) < tokens.len() {
                let candidate = i as usize;
                let mut extended = indices.clone();
                extended.push(candidate);
                if contains_substring(&stripped, tokens, &extended) {
                    indices.push(candidate);
                } else if !SKIP_TOKEN.is_match(&tokens[candidate]) {
                    break;
                }
                i += step;
            }
        }
        let low = indices.iter().copied().min().unwrap_or(first);
        let high = indices.iter().copied().max().unwrap_or(last);
        let full: Vec<usize> = (low..=high).collect();
        if contains_substring(&stripped, tokens, &full) {
            indices = full;
        }
    } else if stripped.chars().count() > 1 {
        for (i, token) in tokens.iter().enumerate() {
            if !stripped.starts_with(token.as_str()) {
                continue;
            }
            let mut interval = vec![i];
            for j in i + 1..tokens.len() {
                if SKIP_TOKEN.is_match(&tokens[j]) {
                    continue;
                }
                let mut extended = interval.clone();
                extended.push(j);
                if !contains_substring(&stripped, tokens, &extended) {
                    break;
                }
                interval.push(j);
            }
            let last = &tokens[interval[interval.len() - 1]];
            let unique = tokens.iter().filter(|t| *t == token).count() == 1;
            if (interval.len() > 1 && stripped.ends_with(last.as_str())) || unique {
                return interval;
            }
        }
    }
    indices
}

/// Hang terminals under their aligned nodes
fn link_terminals(graph: &mut HierarchicalGraph, preterminals: Vec<(usize, Vec<NodeId>)>) {
    for (terminal, parents) in preterminals {
        let node = graph.terminals[terminal].node;
        if graph.terminals[terminal].punct {
            // one parent only, extra ones are alignment noise
            let unit = graph.add_unit(parents[0], PUNCTUATION_TAG);
            graph.node_mut(unit).tag = NodeTag::Punctuation;
            graph.link_terminal(unit, terminal, TERMINAL_TAG);
            continue;
        }
        for parent in parents {
            if !graph.has_child(parent, node) {
                graph.link_terminal(parent, terminal, TERMINAL_TAG);
            }
        }
    }
}

/// `# ::id` and `# ::tok` lines, plus alignments when there are any
fn header(graph: &HierarchicalGraph, alignments: &BTreeMap<usize, String>) -> Vec<String> {
    let tokens: Vec<&str> = graph.terminals.iter().map(|t| t.token.text.as_str()).collect();
    let mut lines = vec![
        format!("# ::id {}", graph.id),
        format!("# ::tok {}", tokens.join(" ")),
    ];
    if !alignments.is_empty() {
        let pairs: Vec<String> = alignments
            .iter()
            .map(|(i, path)| format!("{i}-{path}"))
            .collect();
        lines.push(format!("# ::alignments {}", pairs.join(" ")));
    }
    lines
}

/// Write one graph as PENMAN lines
pub fn write(graph: &HierarchicalGraph, options: &RenderOptions) -> Result<Vec<String>> {
    if options.use_original {
        if let Some(original) = &graph.original {
            return Ok(original.clone());
        }
    }
    let mut graph = graph.clone();
    expand_names(&mut graph);
    let mut alignments = BTreeMap::new();
    let mut triples = to_triples(&graph, options, &mut alignments)?;
    if triples.is_empty() {
        triples.push(Triple::new("y", INSTANCE, Target::Concept("yes".to_string())));
    }
    let mut lines = if options.metadata {
        header(&graph, &alignments)
    } else {
        Vec::new()
    };
    lines.extend(penman::encode(&triples, true).lines().map(String::from));
    Ok(lines)
}

/// Undo the name collapse: a `name` node with `op` constants below it
fn expand_names(graph: &mut HierarchicalGraph) {
    let name_edges: Vec<EdgeId> = graph
        .edges()
        .filter(|&e| graph.edge(e).tag == NAME)
        .collect();
    for edge in name_edges {
        let name = graph.edge(edge).child;
        let Some(label) = graph.node(name).label.clone() else {
            continue;
        };
        if label == Label::Concept(NAME.to_string()) {
            continue;
        }
        graph.node_mut(name).label = Some(Label::Concept(NAME.to_string()));
        for part in strip_quotes(label.value()).split('_') {
            let op = graph.add_unit(name, OP);
            let value = if NUMBER.is_match(part) {
                part.to_string()
            } else {
                format!("\"{part}\"")
            };
            graph.node_mut(op).label = Some(Label::Constant(value));
        }
    }
}

fn to_triples(
    graph: &HierarchicalGraph,
    options: &RenderOptions,
    alignments: &mut BTreeMap<usize, String>,
) -> Result<Vec<Triple>> {
    let mut pending: VecDeque<(Option<EdgeId>, Vec<usize>)> = graph
        .outgoing(ROOT)
        .iter()
        .enumerate()
        .map(|(i, &e)| (Some(e), vec![1, i + 1]))
        .collect();
    if pending.is_empty() {
        pending.push_back((None, vec![1]));
    }
    let mut visited = FxHashSet::default();
    let mut variables: FxHashMap<NodeId, String> = FxHashMap::default();
    let mut numbered: FxHashMap<(String, NodeId), usize> = FxHashMap::default();
    let mut triples = Vec::new();

    while let Some((edge, path)) = pending.pop_front() {
        let mut nodes = vec![ROOT];
        if let Some(edge) = edge {
            if !visited.insert(edge) {
                continue;
            }
            let e = graph.edge(edge);
            nodes[0] = e.parent;
            if e.tag == TERMINAL_TAG || e.tag == PUNCTUATION_TAG {
                let location: Vec<String> =
                    path[..path.len() - 1].iter().map(|p| p.to_string()).collect();
                for terminal in terminal_yield(graph, e.child) {
                    if !graph.terminals[terminal].punct {
                        alignments.insert(terminal, location.join("."));
                    }
                }
            } else if e.tag != FUNCTION_TAG {
                nodes.push(e.child);
                pending.extend(graph.outgoing(e.child).iter().enumerate().map(|(i, &c)| {
                    let mut child_path = path.clone();
                    child_path.push(i + 1);
                    (Some(c), child_path)
                }));
            }
        }

        let mut head_dep: Vec<(Target, Vec<usize>)> = Vec::with_capacity(2);
        for node in nodes {
            let label = match (&graph.node(node).label, &options.default_label) {
                (Some(label), _) => label.clone(),
                (None, Some(default)) => Label::Concept(default.clone()),
                (None, None) => {
                    return Err(ConvertError::MissingLabel {
                        id: graph.id.clone(),
                        node,
                    });
                }
            };
            match label {
                Label::Concept(concept) => {
                    let next = format!("v{}", variables.len() + 1);
                    let variable = match variables.entry(node) {
                        Entry::Occupied(entry) => entry.get().clone(),
                        Entry::Vacant(entry) => {
                            let variable = entry.insert(next).clone();
                            triples.push(
                                Triple::new(&variable, INSTANCE, Target::Concept(concept))
                                    .with_alignment(graph.direct_terminals(node)),
                            );
                            variable
                        }
                    };
                    head_dep.push((Target::Variable(variable), Vec::new()));
                }
                Label::Constant(value) => {
                    head_dep.push((Target::Constant(value), graph.direct_terminals(node)));
                }
            }
        }

        let (Some(edge), [(head, _), (dep, alignment)]) = (edge, head_dep.as_slice()) else {
            continue;
        };
        let e = graph.edge(edge);
        let mut rel = if e.tag.is_empty() {
            "label".to_string()
        } else {
            e.tag.clone()
        };
        if NUMBERED_RELATIONS.contains(&rel.as_str()) {
            let count = numbered.entry((rel.clone(), e.parent)).or_default();
            *count += 1;
            rel = format!("{rel}{count}");
        } else if rel == PREP {
            let mut words: Vec<&str> = vec![PREP];
            for terminal in terminal_yield(graph, e.child) {
                let text = graph.terminals[terminal].token.text.as_str();
                if !words[1..].contains(&text) {
                    words.push(text);
                }
            }
            rel = words.join("-");
        }
        triples.push(
            Triple::new(head.value(), format!(":{rel}"), dep.clone())
                .with_alignment(alignment.clone()),
        );
    }
    Ok(triples)
}
