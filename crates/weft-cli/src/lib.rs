//! CLI logic for the Weft document linker.
//!
//! This module loads a document with every document it imports, reports
//! the diagnostics left on its elements and writes the linked document back
//! out.

pub mod error_adapter;

mod args;
mod config;

pub use args::Args;

use std::{
    fs,
    io::{self, Write},
};

use log::{error, info, warn};

use weft::{Session, UnresolvedReference, WeftError, loader::FileLoader};
use weft_parser::error::Severity;

use error_adapter::{element_reportables, render};

/// Run the Weft CLI application
///
/// Loads and links `args.input`, renders every element diagnostic, and
/// writes the re-serialized document to `args.output` (stdout if absent).
///
/// # Errors
///
/// Returns `WeftError` for:
/// - File I/O and configuration errors
/// - Malformed or structurally invalid documents, including imports
/// - Circular imports
/// - Unresolved references, after the output has been written
pub fn run(args: &Args) -> Result<(), WeftError> {
    info!(
        input_path = args.input,
        output_path:? = args.output;
        "Processing document"
    );

    let app_config = config::load_config(args.config.as_ref())?;

    let loader = FileLoader::current_dir()?;
    let mut session = Session::new(loader).with_config(app_config);
    let document = session.load(&args.input)?;

    for (uri, diagnostic, reportable) in element_reportables(session.workspace()) {
        let rendered = render(&reportable);
        match diagnostic.severity() {
            Severity::Error => error!(uri; "{rendered}"),
            Severity::Warning => warn!(uri; "{rendered}"),
        }
    }

    let text = session.serialize(document)?;
    match &args.output {
        Some(path) => {
            fs::write(path, &text)?;
            info!(output_file = path.as_str(); "Document written");
        }
        None => io::stdout().write_all(text.as_bytes())?,
    }

    let unresolved: Vec<UnresolvedReference> = session
        .reports()
        .flat_map(|report| report.unresolved.iter().cloned())
        .collect();
    if unresolved.is_empty() {
        Ok(())
    } else {
        Err(WeftError::Unresolved(unresolved))
    }
}
