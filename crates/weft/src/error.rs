//! Error types for Weft operations.
//!
//! This module provides the main error type [`WeftError`] which wraps
//! the error conditions that abort loading a document. Linking errors are
//! not among them: they are collected in a
//! [`LinkReport`](crate::linker::LinkReport) instead.

use std::io;

use thiserror::Error;

use weft_parser::error::ParseError;

use crate::{linker::UnresolvedReference, loader::LoadError, model::GraphError};

/// The main error type for Weft operations.
///
/// # Diagnostic Variants
///
/// The `Parse` variant contains structured error information with source code
/// spans, along with the source text and URI of the document it belongs to.
#[derive(Debug, Error)]
pub enum WeftError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("{err}")]
    Parse {
        err: ParseError,
        src: String,
        uri: String,
    },

    #[error("circular import: {}", chain.join(" -> "))]
    CircularImport { chain: Vec<String> },

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("{} unresolved reference(s)", .0.len())]
    Unresolved(Vec<UnresolvedReference>),
}

impl WeftError {
    /// Create a new `Parse` error with the associated source code.
    pub fn new_parse_error(
        err: ParseError,
        src: impl Into<String>,
        uri: impl Into<String>,
    ) -> Self {
        Self::Parse {
            err,
            src: src.into(),
            uri: uri.into(),
        }
    }
}
