//! Rendering weft errors and diagnostics with miette.
//!
//! A load can fail in an imported document, and linking diagnostics sit on
//! elements of every document of the session, so each diagnostic is
//! rendered against the source of its own document and named by its URI.

use std::fmt;

use miette::{
    Diagnostic as MietteDiagnostic, GraphicalReportHandler, LabeledSpan, NamedSource, SourceSpan,
};

use weft::{WeftError, model::Workspace};
use weft_parser::error::{Diagnostic, ErrorCode, LabelStyle};

/// One weft [`Diagnostic`] together with the document it points into.
pub struct DiagnosticAdapter<'a> {
    diag: &'a Diagnostic,
    source: NamedSource<String>,
}

impl<'a> DiagnosticAdapter<'a> {
    pub fn new(diag: &'a Diagnostic, uri: &str, src: &str) -> Self {
        Self {
            diag,
            source: NamedSource::new(uri, src.to_string()),
        }
    }

    /// The URI the snippet is named by.
    pub fn uri(&self) -> &str {
        self.source.name()
    }
}

impl fmt::Debug for DiagnosticAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticAdapter")
            .field("uri", &self.uri())
            .field("diag", &self.diag)
            .finish()
    }
}

impl fmt::Display for DiagnosticAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.diag.message())
    }
}

impl std::error::Error for DiagnosticAdapter<'_> {}

impl MietteDiagnostic for DiagnosticAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diag
            .code()
            .map(|code| Box::new(code) as Box<dyn fmt::Display>)
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(if self.diag.severity().is_warning() {
            miette::Severity::Warning
        } else {
            miette::Severity::Error
        })
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diag
            .help()
            .map(|help| Box::new(help) as Box<dyn fmt::Display>)
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let labels = self.diag.labels();
        if labels.is_empty() {
            return None;
        }

        Some(Box::new(labels.iter().map(|label| {
            let span = SourceSpan::new(label.span().start().into(), label.span().len());
            let message = Some(label.message().to_string());
            match label.style() {
                LabelStyle::Primary => LabeledSpan::new_primary_with_span(message, span),
                LabelStyle::Secondary => LabeledSpan::new_with_span(message, span),
            }
        })))
    }
}

/// A [`WeftError`] without source locations.
pub struct ErrorAdapter<'a>(pub &'a WeftError);

impl fmt::Debug for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ErrorAdapter<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl MietteDiagnostic for ErrorAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code: Box<dyn fmt::Display> = match &self.0 {
            WeftError::Io(_) => Box::new("weft::io"),
            WeftError::Load(_) => Box::new("weft::load"),
            WeftError::Parse { .. } => return None,
            WeftError::CircularImport { .. } => Box::new(ErrorCode::E303),
            WeftError::Graph(_) => Box::new("weft::graph"),
            WeftError::Unresolved(_) => Box::new("weft::unresolved"),
        };
        Some(code)
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match &self.0 {
            WeftError::CircularImport { .. } => Some(Box::new(
                "move the shared definitions into a document both can import",
            )),
            WeftError::Unresolved(_) => Some(Box::new(
                "each unresolved reference is reported above with its location",
            )),
            _ => None,
        }
    }
}

/// Something the CLI can hand to miette.
#[derive(Debug)]
pub enum Reportable<'a> {
    Diagnostic(DiagnosticAdapter<'a>),
    Error(ErrorAdapter<'a>),
}

impl fmt::Display for Reportable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reportable::Diagnostic(d) => fmt::Display::fmt(d, f),
            Reportable::Error(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for Reportable<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Reportable::Diagnostic(_) => None,
            Reportable::Error(e) => e.source(),
        }
    }
}

impl MietteDiagnostic for Reportable<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Diagnostic(d) => d.code(),
            Reportable::Error(e) => e.code(),
        }
    }

    fn severity(&self) -> Option<miette::Severity> {
        match self {
            Reportable::Diagnostic(d) => d.severity(),
            Reportable::Error(e) => e.severity(),
        }
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Diagnostic(d) => d.help(),
            Reportable::Error(e) => e.help(),
        }
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        match self {
            Reportable::Diagnostic(d) => d.source_code(),
            Reportable::Error(e) => e.source_code(),
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        match self {
            Reportable::Diagnostic(d) => d.labels(),
            Reportable::Error(e) => e.labels(),
        }
    }
}

/// One [`Reportable`] per structural diagnostic of a [`WeftError::Parse`],
/// otherwise a single one for the error itself.
pub fn to_reportables(err: &WeftError) -> Vec<Reportable<'_>> {
    match err {
        WeftError::Parse {
            err: parse_err,
            src,
            uri,
        } => parse_err
            .diagnostics()
            .iter()
            .map(|d| Reportable::Diagnostic(DiagnosticAdapter::new(d, uri, src)))
            .collect(),
        _ => vec![Reportable::Error(ErrorAdapter(err))],
    }
}

/// Every diagnostic attached to an element of `workspace`, in document and
/// arena order.
pub fn element_reportables(workspace: &Workspace) -> Vec<(&str, &Diagnostic, Reportable<'_>)> {
    workspace
        .documents()
        .flat_map(|doc| {
            let src = doc.source().unwrap_or_default();
            doc.elements().flat_map(move |(_, element)| {
                element.diagnostics().iter().map(move |diagnostic| {
                    let adapter = DiagnosticAdapter::new(diagnostic, doc.uri(), src);
                    (doc.uri(), diagnostic, Reportable::Diagnostic(adapter))
                })
            })
        })
        .collect()
}

/// Render with miette's graphical handler, falling back to the plain
/// message.
pub fn render(reportable: &Reportable<'_>) -> String {
    let mut out = String::new();
    match GraphicalReportHandler::new().render_report(&mut out, reportable) {
        Ok(()) => out,
        Err(_) => reportable.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use weft::{Session, loader::MemoryLoader};
    use weft_parser::{Span, error::ParseError};

    use super::*;

    #[test]
    fn test_parse_error_yields_one_reportable_per_diagnostic() {
        let diags = vec![
            Diagnostic::error("id `m` is already defined in nodes")
                .with_code(ErrorCode::E201)
                .with_label(Span::new(30..45), "duplicate definition")
                .with_secondary_label(Span::new(11..26), "first defined here"),
            Diagnostic::error("`importBase` requires a `documentURI` attribute")
                .with_code(ErrorCode::E204)
                .with_label(Span::new(50..70), "missing `documentURI`"),
        ];
        let err = WeftError::new_parse_error(
            ParseError::new(diags),
            "<ncl><body><media id='m'/><media id='m'/></body></ncl>",
            "lib/main.ncl",
        );

        let reportables = to_reportables(&err);
        assert_eq!(reportables.len(), 2);
        let Reportable::Diagnostic(first) = &reportables[0] else {
            panic!("expected a diagnostic");
        };
        assert_eq!(first.uri(), "lib/main.ncl");
        assert_eq!(first.to_string(), "id `m` is already defined in nodes");

        let labels: Vec<LabeledSpan> = first.labels().unwrap().collect();
        assert_eq!(labels.len(), 2);
        assert!(labels[0].primary());
        assert!(!labels[1].primary());
        assert_eq!(labels[1].label(), Some("first defined here"));
    }

    #[test]
    fn test_circular_import() {
        let err = WeftError::CircularImport {
            chain: vec!["a.ncl".to_string(), "b.ncl".to_string(), "a.ncl".to_string()],
        };

        let reportables = to_reportables(&err);
        assert_eq!(reportables.len(), 1);
        let Reportable::Error(e) = &reportables[0] else {
            panic!("expected an error");
        };
        assert_eq!(e.to_string(), "circular import: a.ncl -> b.ncl -> a.ncl");
        assert_eq!(e.code().unwrap().to_string(), "E303");
        assert!(e.help().is_some());
    }

    #[test]
    fn test_element_reportables() {
        let mut session = Session::new(MemoryLoader::new());
        let doc = session
            .load_source(
                "main.ncl",
                "<ncl><head><descriptorBase/></head>\
                 <body><media id='m' descriptor='missing'/><blink/></body></ncl>",
            )
            .unwrap();
        assert!(!session.report(doc).unwrap().is_clean());

        let reportables = element_reportables(session.workspace());
        let codes: Vec<_> = reportables
            .iter()
            .map(|(_, diagnostic, _)| diagnostic.code())
            .collect();
        assert_eq!(codes, vec![Some(ErrorCode::E205), Some(ErrorCode::E300)]);

        let (uri, _, warning) = &reportables[0];
        assert_eq!(*uri, "main.ncl");
        assert_eq!(warning.severity(), Some(miette::Severity::Warning));

        let rendered = render(&reportables[1].2);
        assert!(rendered.contains("main.ncl"));
        assert!(rendered.contains("missing"));
    }
}
