//! Treeconvert: bidirectional conversion of linguistic graphs
//!
//! Reads CoNLL, CoNLL-U, SDP, AMR and NeGra export annotations into one
//! hierarchical graph representation and writes them back out.

// Graph model
pub mod dep; // Positional dependency graphs
pub mod graph; // Hierarchical graphs of units and terminals
pub mod traverse; // Iterative walks and reachability

// Conversion engine
pub mod builder; // Dependencies to hierarchy
pub mod converter;
pub mod cycles; // Cycle detection and repair
pub mod flatten; // Hierarchy to dependencies
pub mod head; // Head child selection
pub mod preprocess; // Relabeling and re-attachment

// Formats
pub mod amr;
pub mod conll; // CoNLL and CoNLL-U
pub mod export; // NeGra export
pub mod format; // Format table and registry
pub mod penman; // PENMAN notation
pub mod sdp;

pub mod error;
pub mod options;
pub mod reader; // Corpus blocks and batch conversion

// Re-exports for convenience
pub use cycles::{break_cycles, detect_cycles};
pub use dep::{DependencyGraph, Token};
pub use error::{ConvertError, Result};
pub use format::{Format, FormatRegistry, FormatSpec};
pub use graph::HierarchicalGraph;
pub use options::{ParseOptions, RenderOptions};
pub use reader::{SentenceReader, convert_all};

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    const CONLLU: &str = "# sent_id = s1
# text = The dog barked .
1\tThe\tthe\tDET\tDT\t_\t2\tdet\t_\t_
2\tdog\tdog\tNOUN\tNN\t_\t3\tnsubj\t_\t_
3\tbarked\tbark\tVERB\tVBD\t_\t0\troot\t_\t_
4\t.\t.\tPUNCT\t.\t_\t3\tpunct\t_\t_";

    #[test]
    fn test_conllu_round_trip() {
        let registry = FormatRegistry::new();
        let graph = registry
            .parse_one(Format::Conllu, &lines(CONLLU), "x", &ParseOptions::default())
            .unwrap();
        assert_eq!(graph.terminals.len(), 4);
        assert!(detect_cycles(&graph).is_empty());
        let written = registry
            .render(Format::Conllu, &graph, &RenderOptions::default())
            .unwrap();
        assert_eq!(written, lines(CONLLU));
    }

    #[test]
    fn test_multi_word_round_trip() {
        let text = "# sent_id = s2
# text = da me lo ya
1-3\tdámelo\t_\t_\t_\t_\t_\t_\t_\t_
1\tda\tdar\tVERB\tVB\t_\t0\troot\t_\t_
2\tme\tyo\tPRON\tPRP\t_\t1\tiobj\t_\t_
3\tlo\tél\tPRON\tPRP\t_\t1\tobj\t_\t_
4\tya\tya\tADV\tRB\t_\t1\tadvmod\t_\t_";
        let registry = FormatRegistry::new();
        let graph = registry
            .parse_one(Format::Conllu, &lines(text), "x", &ParseOptions::default())
            .unwrap();
        let written = registry
            .render(Format::Conllu, &graph, &RenderOptions::default())
            .unwrap();
        assert_eq!(written, lines(text));
    }

    #[test]
    fn test_high_attachment_round_trip() {
        let text = "# sent_id = s3
# text = I left because it rained and he stayed , you know
1\tI\tI\tPRON\tPRP\t_\t2\tnsubj\t_\t_
2\tleft\tleave\tVERB\tVBD\t_\t0\troot\t_\t_
3\tbecause\tbecause\tSCONJ\tIN\t_\t5\tmark\t_\t_
4\tit\tit\tPRON\tPRP\t_\t5\tnsubj\t_\t_
5\trained\train\tVERB\tVBD\t_\t2\tadvcl\t_\t_
6\tand\tand\tCCONJ\tCC\t_\t8\tcc\t_\t_
7\the\the\tPRON\tPRP\t_\t8\tnsubj\t_\t_
8\tstayed\tstay\tVERB\tVBD\t_\t2\tconj\t_\t_
9\t,\t,\tPUNCT\t,\t_\t11\tpunct\t_\t_
10\tyou\tyou\tPRON\tPRP\t_\t11\tnsubj\t_\t_
11\tknow\tknow\tVERB\tVBP\t_\t2\tparataxis\t_\t_";
        let registry = FormatRegistry::new();
        let graph = registry
            .parse_one(Format::Conllu, &lines(text), "x", &ParseOptions::default())
            .unwrap();
        // high-attached dependents hang from the root
        let top = graph
            .outgoing(crate::graph::ROOT)
            .iter()
            .filter(|&&e| !graph.edge(e).remote)
            .count();
        assert_eq!(top, 6);
        let written = registry
            .render(Format::Conllu, &graph, &RenderOptions::default())
            .unwrap();
        assert_eq!(written, lines(text));
    }

    #[test]
    fn test_export_to_conllu() {
        let text = "#BOS 9
New\tWord\t--\tTerminal\t501
York\tWord\t--\tTerminal\t501
sleeps\tWord\t--\tTerminal\t502
#500\tFN\t--\tH\t0
#501\tFN\t--\tA\t500
#502\tFN\t--\tP\t500
#EOS 9";
        let registry = FormatRegistry::new();
        let graph = registry
            .parse_one(Format::Export, &lines(text), "x", &ParseOptions::default())
            .unwrap();
        let written = registry
            .render(Format::Conllu, &graph, &RenderOptions::default())
            .unwrap();
        let tokens: Vec<&str> = written
            .iter()
            .map(String::as_str)
            .filter(|l| !l.starts_with('#'))
            .collect();
        assert_eq!(tokens.len(), 3);
        for line in &tokens {
            let fields: Vec<&str> = line.split('\t').collect();
            assert_eq!(fields.len(), 10);
            assert!(fields.iter().all(|f| !f.is_empty()), "{line}");
        }
        assert_eq!(tokens[0], "1\tNew\t_\tWord\tWord\t_\t3\tA\t3:A\t_");
        assert_eq!(tokens[1], "2\tYork\t_\tWord\tWord\t_\t1\tflat\t1:flat\t_");
    }

    #[test]
    fn test_sdp_round_trip() {
        let text = "#20001
1\tDogs\tdog\tNNS\t-\t-\t_\tARG1
2\tchase\tchase\tVBP\t+\t+\tv:e-x-x\t_";
        let registry = FormatRegistry::new();
        let graph = registry
            .parse_one(Format::Sdp, &lines(text), "x", &ParseOptions::default())
            .unwrap();
        let written = registry
            .render(Format::Sdp, &graph, &RenderOptions::default())
            .unwrap();
        assert_eq!(written, lines(text));
    }

    #[test]
    fn test_amr_example() {
        let text = "# ::snt a b\n(a / x :arg0 (b / y) :arg1 (c / z :arg0 b))";
        let registry = FormatRegistry::new();
        let graph = registry
            .parse_one(Format::Amr, &lines(text), "amr.1", &ParseOptions::default())
            .unwrap();
        assert_eq!(graph.id, "amr.1");
        let remote = graph.edges().filter(|&e| graph.edge(e).remote).count();
        assert_eq!(remote, 1);

        let options = RenderOptions::default()
            .with_use_original(false)
            .with_metadata(false);
        let written = registry.render(Format::Amr, &graph, &options).unwrap();
        assert_eq!(
            written,
            [
                "(v1 / x",
                "    :arg0 (v2 / y)",
                "    :arg1 (v3 / z",
                "        :arg0 v2))",
            ]
        );
    }

    #[test]
    fn test_conllu_to_amr_needs_labels() {
        let registry = FormatRegistry::new();
        let graph = registry
            .parse_one(Format::Conllu, &lines(CONLLU), "x", &ParseOptions::default())
            .unwrap();
        assert!(matches!(
            registry.render(Format::Amr, &graph, &RenderOptions::default()),
            Err(ConvertError::MissingLabel { .. })
        ));
        let options = RenderOptions::default().with_default_label("thing");
        assert!(registry.render(Format::Amr, &graph, &options).is_ok());
    }
}
