//! Sentence block reading and batch conversion
//!
//! Corpora are read as blank-line separated blocks of lines, from plain
//! or gzip-compressed files.

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Lines};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use log::{debug, warn};

use crate::error::Result;
use crate::format::{Format, FormatRegistry};
use crate::options::{ParseOptions, RenderOptions};

/// Reader that iterates over blank-line separated blocks
pub struct SentenceReader<R: BufRead> {
    lines: Lines<R>,
}

impl SentenceReader<Box<dyn BufRead>> {
    /// Create a reader from a file path, decompressing `.gz` files
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let reader: Box<dyn BufRead> = if path.extension().is_some_and(|e| e == "gz") {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        Ok(Self::new(reader))
    }
}

impl SentenceReader<BufReader<Cursor<String>>> {
    /// Create a reader from a string
    pub fn from_str(text: &str) -> Self {
        Self::new(BufReader::new(Cursor::new(text.to_string())))
    }
}

impl<R: BufRead> SentenceReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

impl<R: BufRead> Iterator for SentenceReader<R> {
    type Item = std::io::Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut block = Vec::new();
        loop {
            match self.lines.next() {
                None if block.is_empty() => return None,
                None => break,
                Some(Err(e)) => return Some(Err(e)),
                Some(Ok(line)) => {
                    if line.trim().is_empty() {
                        if !block.is_empty() {
                            break;
                        }
                        continue;
                    }
                    block.push(line);
                }
            }
        }
        Some(Ok(block))
    }
}

/// Convert every block from one format to another.
///
/// Sentences that fail to parse or render are logged and skipped; read
/// errors abort. Block `n` (from 1) gets the id `{base_id}.{n}` unless its
/// lines carry one.
pub fn convert_all<I>(
    registry: &FormatRegistry,
    blocks: I,
    from: Format,
    to: Format,
    base_id: &str,
    parse_options: &ParseOptions,
    render_options: &RenderOptions,
) -> Result<Vec<Vec<String>>>
where
    I: IntoIterator<Item = std::io::Result<Vec<String>>>,
{
    let mut converted = Vec::new();
    for (index, block) in blocks.into_iter().enumerate() {
        let block = block?;
        let sentence_id = format!("{base_id}.{}", index + 1);
        let graphs = match registry.parse(from, &block, &sentence_id, parse_options) {
            Ok(graphs) => graphs,
            Err(e) => {
                warn!("Skipping block {sentence_id}: {e}");
                continue;
            }
        };
        for graph in graphs {
            match registry.render(to, &graph, render_options) {
                Ok(lines) => converted.push(lines),
                Err(e) => warn!("Skipping sentence '{}': {e}", graph.id),
            }
        }
    }
    debug!("Converted {} sentences from {from} to {to}", converted.len());
    Ok(converted)
}
