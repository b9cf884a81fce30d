//! Parse and render options

/// Options for reading a format into hierarchical graphs
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Run the format's relabeling and re-attachment pass before building
    pub preprocess: bool,
    /// Read enhanced dependencies as remote edges
    pub enhanced: bool,
    /// Skip AMR reentrancies that would close a cycle
    pub remove_cycles: bool,
    /// Keep `:wiki` values instead of replacing them with `-`
    pub wiki: bool,
    /// Keep the original AMR lines on the graph
    pub save_original: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            preprocess: true,
            enhanced: true,
            remove_cycles: true,
            wiki: false,
            save_original: true,
        }
    }
}

impl ParseOptions {
    pub fn with_preprocess(mut self, preprocess: bool) -> Self {
        self.preprocess = preprocess;
        self
    }

    pub fn with_enhanced(mut self, enhanced: bool) -> Self {
        self.enhanced = enhanced;
        self
    }

    pub fn with_remove_cycles(mut self, remove_cycles: bool) -> Self {
        self.remove_cycles = remove_cycles;
        self
    }

    pub fn with_wiki(mut self, wiki: bool) -> Self {
        self.wiki = wiki;
        self
    }

    pub fn with_save_original(mut self, save_original: bool) -> Self {
        self.save_original = save_original;
        self
    }
}

/// Options for writing hierarchical graphs
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Collapse to a single parent per token, dropping non-primary parents
    pub tree: bool,
    /// Omit gold columns
    pub test: bool,
    /// Prefix synthesized relation labels with `+`
    pub mark_aux: bool,
    /// Write the enhanced dependency column
    pub enhanced: bool,
    /// Concept used for unlabeled AMR nodes instead of failing
    pub default_label: Option<String>,
    /// Write `# ::id`, `# ::tok` and `# ::alignments` for AMR
    pub metadata: bool,
    /// Return stored original lines when the graph has them
    pub use_original: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            tree: false,
            test: false,
            mark_aux: false,
            enhanced: true,
            default_label: None,
            metadata: true,
            use_original: true,
        }
    }
}

impl RenderOptions {
    pub fn with_tree(mut self, tree: bool) -> Self {
        self.tree = tree;
        self
    }

    pub fn with_test(mut self, test: bool) -> Self {
        self.test = test;
        self
    }

    pub fn with_mark_aux(mut self, mark_aux: bool) -> Self {
        self.mark_aux = mark_aux;
        self
    }

    pub fn with_enhanced(mut self, enhanced: bool) -> Self {
        self.enhanced = enhanced;
        self
    }

    pub fn with_default_label(mut self, label: impl Into<String>) -> Self {
        self.default_label = Some(label.into());
        self
    }

    pub fn with_metadata(mut self, metadata: bool) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_use_original(mut self, use_original: bool) -> Self {
        self.use_original = use_original;
        self
    }
}
