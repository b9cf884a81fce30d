//! Relation relabeling and re-attachment
//!
//! Runs once over a dependency graph, tail to head, so that the heads a
//! re-attachment climbs through are already final. The forward pass prepares
//! dependencies for building; the reverse pass undoes it after flattening.

use log::debug;

use crate::dep::{DepEdgeId, DependencyGraph, Position, stripped_rel};
use crate::format::{AttachmentRule, FormatSpec};
use crate::graph::HEAD_TAG;

const CONJ: &str = "conj";
const APPOS: &str = "appos";
const CC: &str = "cc";

fn contains(items: &[String], rel: &str) -> bool {
    items.iter().any(|r| r == rel)
}

/// Prepare a dependency graph for building
pub fn forward(dep: &mut DependencyGraph, spec: &FormatSpec) {
    for position in (1..dep.nodes.len()).rev() {
        let primary = dep.primary_edge(position);
        for edge in dep.incoming(position) {
            if spec.strip_suffixes && dep.edges[edge].rel.contains(':') {
                let full = std::mem::take(&mut dep.edges[edge].rel);
                if Some(edge) == primary && dep.nodes[position].full_rel.is_none() {
                    dep.nodes[position].full_rel = Some(full.clone());
                }
                dep.edges[edge].rel = stripped_rel(&full).to_string();
            }
            let replaced = spec
                .replacements
                .iter()
                .find(|(rels, _)| contains(rels, dep.edges[edge].stripped_rel()));
            if let Some((rels, tag)) = replaced {
                let previous = std::mem::replace(&mut dep.edges[edge].rel, tag.clone());
                // only the first relation of a group is written back
                if Some(edge) == primary
                    && rels.first() != Some(&previous)
                    && dep.nodes[position].full_rel.is_none()
                {
                    dep.nodes[position].full_rel = Some(previous);
                }
            }
            if dep.edges[edge].rel == HEAD_TAG {
                dep.edges[edge].rel = spec.head_fallback_rel.clone();
            }
            if Some(edge) == primary {
                attach_high(dep, spec, edge);
            }
        }
    }
}

/// Move an edge up to the head it attaches to in the hierarchy
fn attach_high(dep: &mut DependencyGraph, spec: &FormatSpec, edge: DepEdgeId) {
    if dep.edges[edge].original_head.is_some() {
        return;
    }
    let Some(rule) = spec.high_attaching.get(dep.edges[edge].stripped_rel()) else {
        return;
    };
    let (start, position) = (dep.edges[edge].head, dep.edges[edge].dependent);
    dep.edges[edge].original_head = Some(start);
    if rule.forward && start < position {
        return;
    }

    let mut head = start;
    let mut relations = &rule.relations;
    let mut steps = 0;
    while !relations.is_empty() && steps < dep.nodes.len() {
        let parent = dep.incoming(head).into_iter().find(|&e| {
            let candidate = &dep.edges[e];
            !candidate.remote && contains(relations, candidate.stripped_rel())
        });
        let Some(parent) = parent else {
            break;
        };
        let next = dep.edges[parent].head;
        if next == position || next == head {
            break;
        }
        head = next;
        relations = &rule.recursive;
        steps += 1;
    }
    if head != start {
        debug!(
            "Attaching {position} ({}) to {head} instead of {start} in '{}'",
            dep.edges[edge].rel, dep.id
        );
        dep.set_head(edge, head);
    }
}

/// Undo the forward pass on a flattened graph
pub fn reverse(dep: &mut DependencyGraph, spec: &FormatSpec, mark_aux: bool) {
    for position in (1..dep.nodes.len()).rev() {
        let primary = dep.primary_edge(position);
        for edge in dep.incoming(position) {
            let group = spec
                .replacements
                .iter()
                .find(|(_, tag)| tag == dep.edges[edge].stripped_rel())
                .map(|(rels, _)| rels);
            let rel = &mut dep.edges[edge].rel;
            if let Some(source) = group.and_then(|rels| rels.first()) {
                *rel = source.clone();
            }
            if *rel == HEAD_TAG {
                *rel = if mark_aux {
                    format!("+{}", spec.head_fallback_rel)
                } else {
                    spec.head_fallback_rel.clone()
                };
            }
            if Some(edge) != primary {
                continue;
            }
            if let Some(full) = &dep.nodes[position].full_rel {
                let base = stripped_rel(full);
                if base == dep.edges[edge].rel || group.is_some_and(|rels| contains(rels, base)) {
                    dep.edges[edge].rel = full.clone();
                }
            }
            attach_low(dep, spec, edge);
        }
    }
    if spec.punct_reattachment && dep.format != spec.format {
        fix_punctuation(dep, spec);
    }
}

/// Restore or lower a high-attached edge
fn attach_low(dep: &mut DependencyGraph, spec: &FormatSpec, edge: DepEdgeId) {
    let (head, position) = (dep.edges[edge].head, dep.edges[edge].dependent);
    match dep.edges[edge].original_head {
        Some(original)
            if original != head && original < dep.nodes.len() && original != position =>
        {
            dep.set_head(edge, original);
        }
        Some(_) => {}
        None => {
            if let Some(rule) = spec.high_attaching.get(dep.edges[edge].stripped_rel()) {
                let lowered = lower(dep, rule, head, position);
                if lowered != head {
                    dep.set_head(edge, lowered);
                }
            }
        }
    }
}

/// Descend from a head through trigger-relation dependents
fn lower(
    dep: &DependencyGraph,
    rule: &AttachmentRule,
    start: Position,
    position: Position,
) -> Position {
    let mut head = start;
    let mut relations = &rule.relations;
    let mut steps = 0;
    while !relations.is_empty() && steps < dep.nodes.len() {
        let candidates = dep.outgoing(head).into_iter().filter_map(|e| {
            let candidate = &dep.edges[e];
            let dependent = candidate.dependent;
            (!candidate.remote
                && dependent != position
                && dependent != head
                && contains(relations, candidate.stripped_rel())
                && (!rule.forward || dependent > position))
                .then_some(dependent)
        });
        let nearest = if rule.forward {
            candidates.min()
        } else {
            candidates.min_by_key(|&d| (d.abs_diff(position), d))
        };
        let Some(next) = nearest else {
            break;
        };
        head = next;
        relations = &rule.recursive;
        steps += 1;
    }
    head
}

/// Does an edge with one of the relations span the position strictly?
fn spans(dep: &DependencyGraph, edges: &[DepEdgeId], position: Position, rel: &str) -> bool {
    edges.iter().any(|&e| {
        let edge = &dep.edges[e];
        edge.stripped_rel() == rel && edge.head < position && position < edge.dependent
    })
}

/// Move punctuation into the coordinated or appositive span around it
fn fix_punctuation(dep: &mut DependencyGraph, spec: &FormatSpec) {
    let size = dep.nodes.len();
    for position in 1..size {
        let Some(edge) = dep.primary_edge(position) else {
            continue;
        };
        if !spec.is_punct_rel(dep.edges[edge].stripped_rel()) {
            continue;
        }
        let coordinated = (1..size).find(|&d| {
            spans(dep, &dep.incoming(d), position, CONJ)
                && !dep.outgoing(d).into_iter().any(|e| {
                    let other = &dep.edges[e];
                    let rel = other.stripped_rel();
                    (spec.is_punct_rel(rel) || rel == CC)
                        && position < other.dependent
                        && other.dependent < d
                })
        });
        let head = coordinated
            .or_else(|| (1..size).find(|&d| spans(dep, &dep.outgoing(d), position, APPOS)));
        if let Some(head) = head {
            dep.set_head(edge, head);
        }
    }
}
