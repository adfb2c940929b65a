//! Accumulates the diagnostics of one build pass.

use crate::error::{Diagnostic, ParseError};

/// Gathers every structural diagnostic of a document so a single pass can
/// report all of them.
///
/// ```
/// # use weft_parser::error::{Diagnostic, DiagnosticCollector, ErrorCode};
/// # use weft_parser::Span;
/// let mut collector = DiagnosticCollector::new();
/// collector.emit(Diagnostic::warning("unknown element `video`"));
/// assert!(!collector.has_errors());
///
/// collector.emit(
///     Diagnostic::error("id `m` is already defined in nodes")
///         .with_code(ErrorCode::E201)
///         .with_label(Span::new(30..45), "duplicate definition"),
/// );
/// assert_eq!(collector.error_count(), 1);
/// assert_eq!(collector.finish().unwrap_err().diagnostics().len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.severity().is_error())
            .count()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The warnings if nothing worse was emitted, otherwise a [`ParseError`]
    /// with every diagnostic in source order. Diagnostics without a primary
    /// label keep their emission order after the located ones.
    pub fn finish(mut self) -> Result<Vec<Diagnostic>, ParseError> {
        if !self.has_errors() {
            return Ok(self.diagnostics);
        }
        self.diagnostics.sort_by_key(|diagnostic| {
            diagnostic
                .primary_span()
                .map_or(usize::MAX, |span| span.start())
        });
        Err(ParseError::new(self.diagnostics))
    }
}
