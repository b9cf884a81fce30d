//! PENMAN notation reader and writer
//!
//! Decodes a single bracketed AMR into a list of triples in document order
//! (depth-first, instance triple first for each node) and encodes triples
//! back, nesting each variable at its first mention.

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::Result;

#[derive(Parser)]
#[grammar = "penman.pest"]
struct PenmanParser;

/// Role of the triple binding a variable to its concept
pub const INSTANCE: &str = ":instance";

const INDENT: &str = "    ";

/// Target of a triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Variable(String),
    Concept(String),
    /// A symbol or a quoted string, quotes kept
    Constant(String),
}

impl Target {
    pub fn value(&self) -> &str {
        match self {
            Target::Variable(s) | Target::Concept(s) | Target::Constant(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub source: String,
    /// Role with its leading colon
    pub role: String,
    pub target: Target,
    /// Token indices from a `~e.` suffix on the target
    pub alignment: Option<Vec<usize>>,
}

impl Triple {
    pub fn new(source: impl Into<String>, role: impl Into<String>, target: Target) -> Self {
        Self {
            source: source.into(),
            role: role.into(),
            target,
            alignment: None,
        }
    }

    pub fn with_alignment(mut self, alignment: Vec<usize>) -> Self {
        self.alignment = (!alignment.is_empty()).then_some(alignment);
        self
    }

    pub fn is_instance(&self) -> bool {
        self.role == INSTANCE
    }
}

#[derive(Debug, Clone)]
pub struct PenmanGraph {
    pub top: String,
    pub triples: Vec<Triple>,
}

impl PenmanGraph {
    /// Indices of the triples leaving a variable, in order
    pub fn triples_from<'a>(&'a self, source: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.triples
            .iter()
            .enumerate()
            .filter(move |(_, t)| t.source == source)
            .map(|(i, _)| i)
    }
}

/// Triple target before variables are told apart from constants
enum RawTarget {
    Concept(String),
    Node(String),
    Symbol(String),
    Quoted(String),
}

struct RawTriple {
    source: String,
    role: String,
    target: RawTarget,
    alignment: Option<Vec<usize>>,
}

/// Parse `~e.1,2` into indices
fn parse_alignment(text: &str) -> Vec<usize> {
    let text = text.trim_start_matches('~');
    let text = text.strip_prefix("e.").unwrap_or(text);
    text.split(',').filter_map(|i| i.parse().ok()).collect()
}

/// Value and alignment of a concept or atom pair
fn parse_atom(pair: Pair<'_, Rule>) -> (RawTarget, Option<Vec<usize>>) {
    let mut target = RawTarget::Symbol(String::new());
    let mut alignment = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::string => target = RawTarget::Quoted(inner.as_str().to_string()),
            Rule::symbol => target = RawTarget::Symbol(inner.as_str().to_string()),
            Rule::alignment => alignment = Some(parse_alignment(inner.as_str())),
            _ => {}
        }
    }
    (target, alignment)
}

/// Walk a node, pushing its triples and those of nested nodes
fn parse_node(
    pair: Pair<'_, Rule>,
    raw: &mut Vec<RawTriple>,
    variables: &mut FxHashSet<String>,
) -> String {
    let mut source = String::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::variable => {
                source = inner.as_str().to_string();
                variables.insert(source.clone());
            }
            Rule::concept => {
                let (target, alignment) = parse_atom(inner);
                let (RawTarget::Symbol(concept)
                | RawTarget::Quoted(concept)
                | RawTarget::Concept(concept)
                | RawTarget::Node(concept)) = target;
                raw.push(RawTriple {
                    source: source.clone(),
                    role: INSTANCE.to_string(),
                    target: RawTarget::Concept(concept),
                    alignment,
                });
            }
            Rule::relation => parse_relation(inner, &source, raw, variables),
            _ => {}
        }
    }
    source
}

fn parse_relation(
    pair: Pair<'_, Rule>,
    source: &str,
    raw: &mut Vec<RawTriple>,
    variables: &mut FxHashSet<String>,
) {
    let mut role = String::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::role => role = inner.as_str().to_string(),
            // alignments on roles are not kept
            Rule::alignment => {}
            Rule::target => {
                for target in inner.into_inner() {
                    match target.as_rule() {
                        Rule::node => {
                            let index = raw.len();
                            raw.push(RawTriple {
                                source: source.to_string(),
                                role: role.clone(),
                                target: RawTarget::Node(String::new()),
                                alignment: None,
                            });
                            let variable = parse_node(target, raw, variables);
                            raw[index].target = RawTarget::Node(variable);
                        }
                        Rule::atom => {
                            let (value, alignment) = parse_atom(target);
                            raw.push(RawTriple {
                                source: source.to_string(),
                                role: role.clone(),
                                target: value,
                                alignment,
                            });
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
}

/// Decode one PENMAN graph
pub fn decode(text: &str) -> Result<PenmanGraph> {
    let mut raw = Vec::new();
    let mut variables = FxHashSet::default();
    let mut top = String::new();
    for pair in PenmanParser::parse(Rule::graph, text)? {
        for inner in pair.into_inner() {
            if inner.as_rule() == Rule::node {
                top = parse_node(inner, &mut raw, &mut variables);
            }
        }
    }

    let triples = raw
        .into_iter()
        .map(|t| {
            let target = match t.target {
                RawTarget::Concept(s) => Target::Concept(s),
                RawTarget::Node(s) => Target::Variable(s),
                RawTarget::Symbol(s) if variables.contains(&s) => Target::Variable(s),
                RawTarget::Symbol(s) | RawTarget::Quoted(s) => Target::Constant(s),
            };
            Triple {
                source: t.source,
                role: t.role,
                target,
                alignment: t.alignment,
            }
        })
        .collect();
    Ok(PenmanGraph { top, triples })
}

fn push_alignment(out: &mut String, triple: &Triple) {
    if let Some(alignment) = &triple.alignment {
        let indices: Vec<String> = alignment.iter().map(|i| i.to_string()).collect();
        out.push_str("~e.");
        out.push_str(&indices.join(","));
    }
}

/// Instance triple and relation triples of one variable
#[derive(Default)]
struct Outgoing<'a> {
    instance: Option<&'a Triple>,
    relations: Vec<&'a Triple>,
}

/// Encode triples, the first triple's source being the top
pub fn encode(triples: &[Triple], alignments: bool) -> String {
    let Some(top) = triples.first().map(|t| t.source.as_str()) else {
        return String::new();
    };
    let mut by_source: FxHashMap<&str, Outgoing<'_>> = FxHashMap::default();
    for triple in triples {
        let entry = by_source.entry(triple.source.as_str()).or_default();
        if triple.is_instance() && entry.instance.is_none() {
            entry.instance = Some(triple);
        } else {
            entry.relations.push(triple);
        }
    }

    let mut placed = FxHashSet::default();
    let mut out = String::new();
    let open = |variable: &str, out: &mut String| {
        out.push('(');
        out.push_str(variable);
        if let Some(instance) = by_source.get(variable).and_then(|o| o.instance) {
            out.push_str(" / ");
            out.push_str(instance.target.value());
            if alignments {
                push_alignment(out, instance);
            }
        }
    };

    // (variable, depth, next relation)
    let mut stack: Vec<(&str, usize, usize)> = vec![(top, 0, 0)];
    placed.insert(top);
    open(top, &mut out);
    while let Some(frame) = stack.last_mut() {
        let (variable, depth, next) = *frame;
        let relations = by_source
            .get(variable)
            .map_or(&[][..], |o| o.relations.as_slice());
        let Some(&triple) = relations.get(next) else {
            out.push(')');
            stack.pop();
            continue;
        };
        frame.2 += 1;
        out.push('\n');
        out.push_str(&INDENT.repeat(depth + 1));
        out.push_str(&triple.role);
        out.push(' ');
        match &triple.target {
            Target::Variable(v)
                if by_source.contains_key(v.as_str()) && placed.insert(v.as_str()) =>
            {
                open(v, &mut out);
                stack.push((v, depth + 1, 0));
            }
            target => {
                out.push_str(target.value());
                if alignments {
                    push_alignment(&mut out, triple);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const WANT: &str = "(w / want-01~e.1
    :ARG0 (b / boy~e.0)
    :ARG1 (g / go-01 :ARG0 b)
    :polarity -~e.2
    :name (n / name :op1 \"New\" :op2 \"York\"))";

    #[test]
    fn test_decode_order() {
        let graph = decode(WANT).unwrap();
        assert_eq!(graph.top, "w");
        let summary: Vec<_> = graph
            .triples
            .iter()
            .map(|t| (t.source.as_str(), t.role.as_str(), t.target.value()))
            .collect();
        assert_eq!(
            summary,
            [
                ("w", ":instance", "want-01"),
                ("w", ":ARG0", "b"),
                ("b", ":instance", "boy"),
                ("w", ":ARG1", "g"),
                ("g", ":instance", "go-01"),
                ("g", ":ARG0", "b"),
                ("w", ":polarity", "-"),
                ("w", ":name", "n"),
                ("n", ":instance", "name"),
                ("n", ":op1", "\"New\""),
                ("n", ":op2", "\"York\""),
            ]
        );
        assert_eq!(graph.triples[5].target, Target::Variable("b".into()));
        assert_eq!(graph.triples[6].target, Target::Constant("-".into()));
        assert_eq!(graph.triples[6].alignment, Some(vec![2]));
        assert_eq!(graph.triples[0].alignment, Some(vec![1]));
        assert_eq!(graph.triples_from("g").collect::<Vec<_>>(), vec![4, 5]);
    }

    #[test]
    fn test_alignment_forms() {
        assert_eq!(parse_alignment("~e.3,4"), vec![3, 4]);
        assert_eq!(parse_alignment("~7"), vec![7]);
        let graph = decode("(a / and :op1~e.2 (x / thing))").unwrap();
        assert_eq!(graph.triples[1].alignment, None);
    }

    #[test]
    fn test_syntax_error() {
        assert!(decode("(a / and :op1").is_err());
        assert!(decode("").is_err());
    }

    #[test]
    fn test_encode() {
        let graph = decode(WANT).unwrap();
        let text = encode(&graph.triples, true);
        assert_eq!(
            text,
            "(w / want-01~e.1
    :ARG0 (b / boy~e.0)
    :ARG1 (g / go-01
        :ARG0 b)
    :polarity -~e.2
    :name (n / name
        :op1 \"New\"
        :op2 \"York\"))"
        );
        let plain = encode(&graph.triples, false);
        assert!(plain.starts_with("(w / want-01\n"));
        assert_eq!(decode(&plain).unwrap().triples.len(), graph.triples.len());
    }
}
