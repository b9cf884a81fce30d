//! CoNLL and CoNLL-U line codec
//!
//! Ten tab-separated columns: id, form, lemma, coarse pos, fine tag,
//! features, head, relation, enhanced, misc. Sentences are separated by
//! blank lines. Plain CoNLL repeats a token line once per head and marks
//! remote edges with a `*` suffix; CoNLL-U carries extra heads in the
//! enhanced column.
//!
//! CoNLL-U format: https://universaldependencies.org/format.html

use atoi::FromRadix10Checked;
use memchr::memchr_iter;
use rustc_hash::FxHashSet;

use crate::dep::{DependencyGraph, MultiWord, Position, Token};
use crate::error::{ConvertError, Result};
use crate::format::{Format, FormatSpec};
use crate::options::{ParseOptions, RenderOptions};

const REMOTE_MARK: char = '*';

/// Split a line on tabs
pub(crate) fn split_tabs(line: &str) -> Vec<&str> {
    let mut fields = Vec::with_capacity(10);
    let mut start = 0;
    for tab in memchr_iter(b'\t', line.as_bytes()) {
        fields.push(&line[start..tab]);
        start = tab + 1;
    }
    fields.push(&line[start..]);
    fields
}

/// Empty columns are written as `_`
fn column(value: &str) -> &str {
    if value.is_empty() { "_" } else { value }
}

/// Parse a whole field as a non-negative integer
pub(crate) fn parse_index(field: &str) -> Option<usize> {
    match usize::from_radix_10_checked(field.as_bytes()) {
        (Some(n), used) if used == field.len() && used > 0 => Some(n),
        _ => None,
    }
}

/// Split lines into blank-line separated blocks
pub(crate) fn blocks<S: AsRef<str>>(lines: &[S]) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    for line in lines {
        let line = line.as_ref().trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Read every sentence in the lines
pub fn read<S: AsRef<str>>(
    lines: &[S],
    sentence_id: &str,
    spec: &FormatSpec,
    options: &ParseOptions,
) -> Result<Vec<DependencyGraph>> {
    blocks(lines)
        .into_iter()
        .map(|block| read_sentence(&block, sentence_id, spec.format, options))
        .collect()
}

struct PendingEdge {
    head: Position,
    dependent: Position,
    rel: String,
    remote: bool,
}

fn read_sentence(
    block: &[&str],
    sentence_id: &str,
    format: Format,
    options: &ParseOptions,
) -> Result<DependencyGraph> {
    let mut id = sentence_id.to_string();
    for line in block.iter().filter_map(|l| l.strip_prefix('#')) {
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == "sent_id" {
                id = value.trim().to_string();
            }
        }
    }

    let mut dep = DependencyGraph::new(id.clone(), format);
    let mut pending: Vec<PendingEdge> = Vec::new();
    let mut seen: FxHashSet<(Position, Position)> = FxHashSet::default();
    let mut span: Option<MultiWord> = None;

    for line in block.iter().filter(|l| !l.starts_with('#')) {
        let fields = split_tabs(line);
        if fields.len() < 8 {
            return Err(ConvertError::structural(
                &id,
                format!("Expected at least 8 columns, found {}: '{line}'", fields.len()),
            ));
        }
        let position_field = fields[0];
        if position_field.contains('.') {
            continue;
        }
        if let Some((start, end)) = position_field.split_once('-') {
            let (Some(start), Some(end)) = (parse_index(start), parse_index(end)) else {
                return Err(ConvertError::structural(
                    &id,
                    format!("Invalid multi-word span '{position_field}'"),
                ));
            };
            span = Some(MultiWord {
                start,
                end,
                text: fields[1].to_string(),
            });
            continue;
        }
        let Some(position) = parse_index(position_field) else {
            return Err(ConvertError::structural(
                &id,
                format!("Invalid token id '{position_field}'"),
            ));
        };

        let repeated = position > 0 && position + 1 == dep.nodes.len();
        if !repeated {
            if position != dep.nodes.len() {
                return Err(ConvertError::structural(
                    &id,
                    format!("Non-contiguous position {position} after {}", dep.len()),
                ));
            }
            dep.add_node(Token {
                text: fields[1].to_string(),
                lemma: fields[2].to_string(),
                pos: fields[3].to_string(),
                tag: fields[4].to_string(),
                features: fields[5].to_string(),
                paragraph: 1,
            });
            if let Some(multi_word) = span.take_if(|s| s.start == position) {
                dep.nodes[position].multi_word = Some(dep.multi_words.len());
                dep.multi_words.push(multi_word);
            }
        }

        let mut head = None;
        if fields[6] != "_" {
            let Some(index) = parse_index(fields[6]) else {
                return Err(ConvertError::structural(
                    &id,
                    format!("Invalid head '{}' of token {position}", fields[6]),
                ));
            };
            let (rel, remote) = match fields[7].strip_suffix(REMOTE_MARK) {
                Some(rel) => (rel, true),
                None => (fields[7], false),
            };
            head = Some(index);
            if seen.insert((index, position)) {
                pending.push(PendingEdge {
                    head: index,
                    dependent: position,
                    rel: rel.to_string(),
                    remote,
                });
            }
        }
        if repeated {
            continue;
        }

        let enhanced = fields.get(8).copied().unwrap_or("_");
        dep.nodes[position].enhanced = enhanced.to_string();
        dep.nodes[position].misc = fields.get(9).copied().unwrap_or("_").to_string();
        if options.enhanced && enhanced != "_" {
            for item in enhanced.split('|') {
                let (head_field, rel) = item.split_once(':').unwrap_or((item, ""));
                // empty-node heads such as 8.1 are skipped
                let Some(index) = parse_index(head_field) else {
                    continue;
                };
                if index == position || Some(index) == head || !seen.insert((index, position)) {
                    continue;
                }
                pending.push(PendingEdge {
                    head: index,
                    dependent: position,
                    rel: rel.to_string(),
                    remote: true,
                });
            }
        }
    }

    let size = dep.nodes.len();
    for edge in &pending {
        if edge.head >= size {
            return Err(ConvertError::structural(
                &id,
                format!(
                    "Head {} of token {} does not exist",
                    edge.head, edge.dependent
                ),
            ));
        }
    }
    if !dep.is_empty() && !pending.iter().any(|e| e.head == 0) {
        return Err(ConvertError::structural(&id, "Missing root edge"));
    }
    for edge in pending {
        dep.add_edge(edge.head, edge.dependent, edge.rel, edge.remote);
    }
    dep.update_heads();
    Ok(dep)
}

/// Write one sentence
pub fn write(
    dep: &DependencyGraph,
    spec: &FormatSpec,
    source: Format,
    options: &RenderOptions,
) -> Vec<String> {
    let conllu = spec.format == Format::Conllu;
    let mut lines = vec![format!("# sent_id = {}", dep.id)];
    if conllu {
        let text: Vec<&str> = dep.tokens().map(|t| t.text.as_str()).collect();
        lines.push(format!("# text = {}", text.join(" ")));
        if let Some((doc, _)) = dep.id.rsplit_once('.') {
            lines.push(format!("# doc_id = {doc}"));
        }
    }

    for position in 1..dep.nodes.len() {
        let node = &dep.nodes[position];
        if let Some(multi_word) = dep.multi_word(position) {
            lines.push(format!(
                "{}-{}\t{}{}",
                multi_word.start,
                multi_word.end,
                multi_word.text,
                "\t_".repeat(8)
            ));
        }
        let token = &node.token;
        let fields = format!(
            "{position}\t{}\t{}\t{}\t{}\t{}",
            token.text, token.lemma, token.pos, token.tag, token.features
        );
        if options.test {
            lines.push(format!("{fields}{}", "\t_".repeat(4)));
            continue;
        }

        let incoming = dep.incoming(position);
        let mut heads: Vec<(Position, String)> = if conllu {
            dep.primary_edge(position)
                .or(incoming.first().copied())
                .map(|e| (dep.edges[e].head, dep.edges[e].rel.clone()))
                .into_iter()
                .collect()
        } else {
            incoming
                .iter()
                .map(|&e| {
                    let edge = &dep.edges[e];
                    let mark = if edge.remote { "*" } else { "" };
                    (edge.head, format!("{}{mark}", edge.rel))
                })
                .collect()
        };
        if heads.is_empty() {
            heads.push((0, spec.root_rel.clone()));
        }
        if options.tree {
            heads.truncate(1);
        }

        let enhanced = if !options.enhanced {
            "_".to_string()
        } else if conllu && source != Format::Conllu && !incoming.is_empty() {
            incoming
                .iter()
                .map(|&e| format!("{}:{}", dep.edges[e].head, dep.edges[e].rel))
                .collect::<Vec<_>>()
                .join("|")
        } else {
            node.enhanced.clone()
        };
        for (head, rel) in heads {
            lines.push(format!(
                "{fields}\t{head}\t{rel}\t{}\t{}",
                column(&enhanced),
                column(&node.misc)
            ));
        }
    }
    lines
}
