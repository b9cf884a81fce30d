//! Conversion errors
//!
//! Cycles are repaired silently and never show up here.

use thiserror::Error;

use crate::penman::Rule;

/// Error type for conversion failures
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Malformed input graph: bad head index, discontiguous positions, missing root or head
    #[error("Structural error in '{id}': {message}")]
    Structural { id: String, message: String },

    /// A node has no label at render time and no default was given
    #[error("Missing label for node {node} in '{id}'")]
    MissingLabel { id: String, node: usize },

    /// AMR alignment index out of token range
    #[error("Alignment error in '{id}': {message}")]
    Alignment { id: String, message: String },

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("PENMAN error: {0}")]
    Penman(#[from] pest::error::Error<Rule>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    pub fn structural(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Structural {
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn alignment(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Alignment {
            id: id.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
