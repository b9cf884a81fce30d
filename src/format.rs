//! Format registry
//!
//! Per-format behavior is plain configuration: tag sets, priority lists and
//! re-attachment rules. The registry is built once and passed by reference;
//! `parse` and `render` dispatch to the line codecs through it.

use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashMap;

use crate::converter::{DependencyConverter, Direction};
use crate::dep::Token;
use crate::error::{ConvertError, Result};
use crate::graph::{HEAD_TAG, HierarchicalGraph, PUNCTUATION_TAG, TERMINAL_TAG, TOP_TAG};
use crate::head::{HeadFallback, HeadSelector};
use crate::options::{ParseOptions, RenderOptions};
use crate::{amr, conll, export, sdp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// CoNLL-X style dependencies, one line per head
    Conll,
    Conllu,
    Sdp,
    /// NeGra export
    Export,
    Amr,
}

impl Format {
    pub const ALL: [Format; 5] = [
        Format::Conll,
        Format::Conllu,
        Format::Sdp,
        Format::Export,
        Format::Amr,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Format::Conll => "conll",
            Format::Conllu => "conllu",
            Format::Sdp => "sdp",
            Format::Export => "export",
            Format::Amr => "amr",
        }
    }

    /// Formats read through a positional dependency graph
    pub fn is_dependency(&self) -> bool {
        matches!(self, Format::Conll | Format::Conllu | Format::Sdp)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        Format::ALL
            .into_iter()
            .find(|f| f.name() == s.trim_start_matches('.'))
            .ok_or_else(|| ConvertError::UnknownFormat(s.to_string()))
    }
}

/// Generic edge tags tried after the format's own, most head-like first
pub const TAG_PRIORITY: [&str; 18] = [
    "C", "N", "H", "P", "S", "A", "D", "T", "Q", "E", "R", "F", "L", "LR", "LA", "G", TERMINAL_TAG,
    PUNCTUATION_TAG,
];

/// High-attachment rule for one relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRule {
    /// Relations of the head's incoming edge that trigger re-parenting
    pub relations: Vec<String>,
    /// Relations to keep climbing through afterwards
    pub recursive: Vec<String>,
    /// Only applies to left dependents of their head
    pub forward: bool,
}

impl AttachmentRule {
    fn new(relations: &[&str], recursive: &[&str], forward: bool) -> Self {
        Self {
            relations: strings(relations),
            recursive: strings(recursive),
            forward,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Configuration of one format
#[derive(Debug, Clone)]
pub struct FormatSpec {
    pub format: Format,
    pub punct_tags: Vec<String>,
    pub punct_rels: Vec<String>,
    /// Relations whose dependents join the head's unit
    pub flat_rels: Vec<String>,
    /// Relations whose dependents become siblings of the head
    pub sibling_rels: Vec<String>,
    /// Full head child priority list
    pub priority: Vec<String>,
    pub fallback: HeadFallback,
    pub high_attaching: FxHashMap<String, AttachmentRule>,
    /// Dependency relations sharing one hierarchical tag; the first relation
    /// is written back
    pub replacements: Vec<(Vec<String>, String)>,
    pub strip_suffixes: bool,
    /// Move punctuation of foreign graphs into coordinated or appositive spans
    pub punct_reattachment: bool,
    pub allow_orphans: bool,
    /// Relation written for tokens without a head
    pub root_rel: String,
    /// Replacement for a `head` relation leaking into the output
    pub head_fallback_rel: String,
}

impl FormatSpec {
    fn base(format: Format, tags: &[&str], fallback: HeadFallback) -> Self {
        let mut priority = vec![HEAD_TAG.to_string()];
        priority.extend(strings(tags));
        priority.extend(strings(&TAG_PRIORITY));
        Self {
            format,
            punct_tags: Vec::new(),
            punct_rels: Vec::new(),
            flat_rels: Vec::new(),
            sibling_rels: Vec::new(),
            priority,
            fallback,
            high_attaching: FxHashMap::default(),
            replacements: Vec::new(),
            strip_suffixes: false,
            punct_reattachment: false,
            allow_orphans: false,
            root_rel: "root".to_string(),
            head_fallback_rel: "xcomp".to_string(),
        }
    }

    pub fn conll() -> Self {
        let mut spec = Self::base(Format::Conll, &[], HeadFallback::LargestYield);
        spec.punct_tags = strings(&["PUNCT"]);
        spec.punct_rels = strings(&["punct"]);
        spec
    }

    pub fn conllu() -> Self {
        let mut spec = Self::base(
            Format::Conllu,
            &[TOP_TAG, "parataxis", "conj", "advcl", "xcomp"],
            HeadFallback::FirstChild,
        );
        spec.punct_tags = strings(&["PUNCT"]);
        spec.punct_rels = strings(&["punct", PUNCTUATION_TAG]);
        spec.flat_rels = strings(&["flat", "fixed", "goeswith", TERMINAL_TAG]);
        spec.sibling_rels = strings(&["aux"]);
        spec.high_attaching = [
            ("cc", AttachmentRule::new(&["conj", "root"], &[], true)),
            ("mark", AttachmentRule::new(&["advcl"], &[], true)),
            (
                "advcl",
                AttachmentRule::new(&["appos", "root"], &["appos", "root"], false),
            ),
            ("appos", AttachmentRule::new(&["root"], &[], false)),
            (
                "conj",
                AttachmentRule::new(&["parataxis", "root"], &["parataxis", "root"], false),
            ),
            ("parataxis", AttachmentRule::new(&["root"], &[], false)),
            // connectors and linkers of hierarchical graphs
            ("N", AttachmentRule::new(&["conj"], &[], true)),
            ("L", AttachmentRule::new(&["H"], &[], false)),
        ]
        .into_iter()
        .map(|(rel, rule)| (rel.to_string(), rule))
        .collect();
        spec.replacements = vec![
            (strings(&["punct"]), PUNCTUATION_TAG.to_string()),
            (strings(&["flat", "fixed", "goeswith"]), TERMINAL_TAG.to_string()),
        ];
        spec.strip_suffixes = true;
        spec.punct_reattachment = true;
        spec
    }

    pub fn sdp() -> Self {
        let mut spec = Self::base(Format::Sdp, &[TOP_TAG], HeadFallback::FirstChild);
        spec.allow_orphans = true;
        spec
    }

    pub fn export() -> Self {
        Self::base(Format::Export, &[], HeadFallback::LargestYield)
    }

    pub fn amr() -> Self {
        let mut spec = Self::base(Format::Amr, &[], HeadFallback::LargestYield);
        spec.allow_orphans = true;
        spec
    }

    pub fn is_flat(&self, rel: &str) -> bool {
        self.flat_rels.iter().any(|r| r == rel)
    }

    pub fn is_sibling(&self, rel: &str) -> bool {
        self.sibling_rels.iter().any(|r| r == rel)
    }

    pub fn is_punct_rel(&self, rel: &str) -> bool {
        self.punct_rels.iter().any(|r| r == rel)
    }

    /// Punctuation by tag or coarse POS
    pub fn is_punct(&self, token: &Token) -> bool {
        self.punct_tags
            .iter()
            .any(|t| *t == token.tag || *t == token.pos)
    }

    pub fn head_selector(&self) -> HeadSelector<'_> {
        HeadSelector::new(&self.priority, self.fallback)
    }
}

/// Read-only table of format configurations
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    specs: FxHashMap<Format, FormatSpec>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatRegistry {
    /// Create a registry holding every supported format
    pub fn new() -> Self {
        let specs = [
            FormatSpec::conll(),
            FormatSpec::conllu(),
            FormatSpec::sdp(),
            FormatSpec::export(),
            FormatSpec::amr(),
        ]
        .into_iter()
        .map(|spec| (spec.format, spec))
        .collect();
        Self { specs }
    }

    /// Replace the configuration of one format
    pub fn with_spec(mut self, spec: FormatSpec) -> Self {
        self.specs.insert(spec.format, spec);
        self
    }

    pub fn spec(&self, format: Format) -> Result<&FormatSpec> {
        self.specs
            .get(&format)
            .ok_or_else(|| ConvertError::UnknownFormat(format.name().to_string()))
    }

    /// Look a format up by name
    pub fn format(&self, name: &str) -> Result<Format> {
        let format = name.parse()?;
        self.spec(format)?;
        Ok(format)
    }

    /// Parse one block of lines into graphs; a block may hold several sentences
    pub fn parse<S: AsRef<str>>(
        &self,
        format: Format,
        lines: &[S],
        sentence_id: &str,
        options: &ParseOptions,
    ) -> Result<Vec<HierarchicalGraph>> {
        let spec = self.spec(format)?;
        let dependencies = match format {
            Format::Conll | Format::Conllu => conll::read(lines, sentence_id, spec, options)?,
            Format::Sdp => sdp::read(lines, sentence_id)?,
            Format::Export => return export::read(lines, sentence_id),
            Format::Amr => return amr::read(lines, sentence_id, options),
        };
        let converter = DependencyConverter::new(spec);
        Ok(dependencies
            .into_iter()
            .map(|mut dep| {
                if options.preprocess {
                    converter.preprocess(&mut dep, Direction::ToGraph, false);
                }
                converter.to_graph(&mut dep)
            })
            .collect())
    }

    /// Parse a block holding exactly one sentence
    pub fn parse_one<S: AsRef<str>>(
        &self,
        format: Format,
        lines: &[S],
        sentence_id: &str,
        options: &ParseOptions,
    ) -> Result<HierarchicalGraph> {
        let mut graphs = self.parse(format, lines, sentence_id, options)?;
        match graphs.len() {
            1 => Ok(graphs.remove(0)),
            n => Err(ConvertError::structural(
                sentence_id,
                format!("Expected one sentence, found {n}"),
            )),
        }
    }

    /// Render a graph as lines of the given format
    pub fn render(
        &self,
        format: Format,
        graph: &HierarchicalGraph,
        options: &RenderOptions,
    ) -> Result<Vec<String>> {
        let spec = self.spec(format)?;
        match format {
            Format::Export => export::write(graph, options),
            Format::Amr => amr::write(graph, options),
            Format::Conll | Format::Conllu | Format::Sdp => {
                let converter = DependencyConverter::new(spec);
                let mut dep = converter.from_graph(graph)?;
                converter.preprocess(&mut dep, Direction::ToDependencies, options.mark_aux);
                Ok(match format {
                    Format::Sdp => sdp::write(&dep, options),
                    _ => conll::write(&dep, spec, graph.format, options),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        for format in Format::ALL {
            assert_eq!(format.name().parse::<Format>().unwrap(), format);
        }
        assert_eq!(".conllu".parse::<Format>().unwrap(), Format::Conllu);
        assert!(matches!(
            "ptb".parse::<Format>(),
            Err(ConvertError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_conllu_spec() {
        let spec = FormatSpec::conllu();
        assert_eq!(&spec.priority[..3], ["head", "TOP", "parataxis"]);
        assert_eq!(spec.priority.last().map(String::as_str), Some("U"));
        assert!(spec.is_flat("fixed"));
        assert!(spec.is_sibling("aux"));
        assert!(spec.is_punct(&Token {
            pos: "PUNCT".to_string(),
            ..Token::new(".")
        }));
        let cc = &spec.high_attaching["cc"];
        assert!(cc.forward);
        assert_eq!(cc.relations, ["conj", "root"]);
        assert!(cc.recursive.is_empty());
        assert!(spec.is_flat(TERMINAL_TAG));
        assert_eq!(spec.replacements[1].0, ["flat", "fixed", "goeswith"]);
        assert_eq!(spec.high_attaching["N"].relations, ["conj"]);
        assert!(!spec.high_attaching["L"].forward);
    }

    #[test]
    fn test_registry() {
        let registry = FormatRegistry::new();
        for format in Format::ALL {
            assert_eq!(registry.spec(format).unwrap().format, format);
        }
        assert_eq!(registry.format("sdp").unwrap(), Format::Sdp);
        let mut sdp = FormatSpec::sdp();
        sdp.allow_orphans = false;
        let registry = registry.with_spec(sdp);
        assert!(!registry.spec(Format::Sdp).unwrap().allow_orphans);
    }
}
