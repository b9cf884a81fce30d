//! SDP (semantic dependency parsing) line codec
//!
//! Columns: id, form, lemma, pos, top, pred, frame, then one argument column
//! per predicate in token order. A file may start with an `#SDP 2015`
//! header; each sentence starts with a `#<id>` line.

use crate::conll::{blocks, parse_index, split_tabs};
use crate::dep::{DependencyGraph, Position, Token};
use crate::error::{ConvertError, Result};
use crate::format::Format;
use crate::options::RenderOptions;

const YES: &str = "+";
const NO: &str = "-";
const EMPTY: &str = "_";

/// Read every sentence in the lines
pub fn read<S: AsRef<str>>(lines: &[S], sentence_id: &str) -> Result<Vec<DependencyGraph>> {
    blocks(lines)
        .into_iter()
        .filter_map(|block| {
            let block: Vec<&str> = block
                .into_iter()
                .filter(|l| !l.starts_with("#SDP"))
                .collect();
            (!block.is_empty()).then(|| read_sentence(&block, sentence_id))
        })
        .collect()
}

fn read_sentence(block: &[&str], sentence_id: &str) -> Result<DependencyGraph> {
    let id = block
        .iter()
        .find_map(|l| l.strip_prefix('#'))
        .map_or(sentence_id, str::trim)
        .to_string();
    let mut dep = DependencyGraph::new(id.clone(), Format::Sdp);
    let mut predicates: Vec<Position> = Vec::new();
    let mut arguments: Vec<(Position, Vec<String>)> = Vec::new();

    for line in block.iter().filter(|l| !l.starts_with('#')) {
        let fields = split_tabs(line);
        if fields.len() < 4 {
            return Err(ConvertError::structural(
                &id,
                format!("Expected at least 4 columns, found {}: '{line}'", fields.len()),
            ));
        }
        let position = parse_index(fields[0]).filter(|&p| p == dep.nodes.len());
        let Some(position) = position else {
            return Err(ConvertError::structural(
                &id,
                format!("Non-contiguous position '{}' after {}", fields[0], dep.len()),
            ));
        };
        dep.add_node(Token {
            lemma: fields[2].to_string(),
            pos: fields[3].to_string(),
            tag: fields[3].to_string(),
            ..Token::new(fields[1])
        });
        let node = &mut dep.nodes[position];
        node.is_top = fields.get(4) == Some(&YES);
        if fields.get(5) == Some(&YES) {
            predicates.push(position);
        }
        node.frame = fields.get(6).copied().unwrap_or(EMPTY).to_string();
        let args = fields.iter().skip(7).map(|a| a.to_string()).collect();
        arguments.push((position, args));
    }

    for (dependent, args) in arguments {
        for (column, rel) in args.into_iter().enumerate() {
            if rel == EMPTY {
                continue;
            }
            let Some(&head) = predicates.get(column) else {
                return Err(ConvertError::structural(
                    &id,
                    format!("Argument column {column} of token {dependent} has no predicate"),
                ));
            };
            dep.add_edge(head, dependent, rel, false);
        }
    }
    dep.update_heads();
    Ok(dep)
}

/// Write one sentence
pub fn write(dep: &DependencyGraph, options: &RenderOptions) -> Vec<String> {
    let predicates: Vec<Position> = (1..dep.nodes.len())
        .filter(|&p| dep.has_outgoing(p))
        .collect();
    let mut lines = vec![format!("#{}", dep.id)];
    for position in 1..dep.nodes.len() {
        let node = &dep.nodes[position];
        let token = &node.token;
        let mut fields = vec![
            position.to_string(),
            token.text.clone(),
            token.lemma.clone(),
            token.tag.clone(),
        ];
        if !options.test {
            let flag = |b: bool| (if b { YES } else { NO }).to_string();
            fields.push(flag(node.is_top));
            fields.push(flag(predicates.contains(&position)));
            fields.push(node.frame.clone());
            let incoming = dep.incoming(position);
            for &predicate in &predicates {
                let rel = incoming
                    .iter()
                    .map(|&e| &dep.edges[e])
                    .find(|e| e.head == predicate)
                    .map_or(EMPTY, |e| e.rel.as_str());
                fields.push(rel.to_string());
            }
        }
        lines.push(fields.join("\t"));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENTENCE: &str = "#SDP 2015
#22000001
1\tDogs\tdog\tNNS\t-\t-\t_\t_\t_
2\tchase\tchase\tVBP\t+\t+\tv:e-x-x\t_\t_
3\tcats\tcat\tNNS\t-\t+\t_\t_\t_
4\tquickly\tquickly\tRB\t-\t-\t_\tARG0\t_
";

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    #[test]
    fn test_read() {
        let text = SENTENCE.replace("NNS\t-\t-\t_\t_\t_", "NNS\t-\t-\t_\tARG1\t_");
        let graphs = read(&lines(&text), "x").unwrap();
        assert_eq!(graphs.len(), 1);
        let dep = &graphs[0];
        assert_eq!(dep.id, "22000001");
        assert_eq!(dep.len(), 4);
        assert!(dep.nodes[2].is_top);
        assert_eq!(dep.nodes[2].frame, "v:e-x-x");
        let edges: Vec<_> = dep
            .edges
            .iter()
            .map(|e| (e.head, e.dependent, e.rel.as_str()))
            .collect();
        assert_eq!(edges, [(2, 1, "ARG1"), (2, 4, "ARG0")]);
        assert!(!dep.nodes[3].is_head);
    }

    #[test]
    fn test_missing_predicate() {
        let text = "#1\n1\ta\ta\tX\t-\t-\t_\t_\tARG1";
        assert!(matches!(
            read(&lines(text), "x"),
            Err(ConvertError::Structural { .. })
        ));
    }

    #[test]
    fn test_write() {
        let graphs = read(&lines(SENTENCE), "x").unwrap();
        let written = write(&graphs[0], &RenderOptions::default());
        // "cats" governs nothing, so only "chase" keeps a column
        assert_eq!(
            written,
            [
                "#22000001",
                "1\tDogs\tdog\tNNS\t-\t-\t_\t_",
                "2\tchase\tchase\tVBP\t+\t+\tv:e-x-x\t_",
                "3\tcats\tcat\tNNS\t-\t-\t_\t_",
                "4\tquickly\tquickly\tRB\t-\t-\t_\tARG0",
            ]
        );
        let test = write(&graphs[0], &RenderOptions::default().with_test(true));
        assert_eq!(test[1], "1\tDogs\tdog\tNNS");
    }
}
