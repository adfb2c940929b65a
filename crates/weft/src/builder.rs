//! Tree construction from element events.
//!
//! A [`DocumentBuilder`] receives `begin_element`/`end_element` calls, asks
//! its session's [`ElementFactory`] what kind each tag denotes, and grows the
//! document's element tree. References are resolved on the spot when their
//! target already exists and queued for the drain phase otherwise.
//!
//! Structural problems in the document (bad keys, duplicate ids, imports
//! without an alias) are collected as diagnostics; the offending element and
//! its subtree are dropped and building continues, so one pass reports every
//! structural error of the document. [`DocumentBuilder::finish`] turns them
//! into a [`WeftError::Parse`]. Failures inside an imported document abort
//! building at once.

use log::{debug, warn};

use weft_core::{
    reference::RefName,
    schema::{ElementKind, PARAMETER_ATTRIBUTES, RefKind},
};
use weft_parser::{
    Attribute, ElementSink, Span, XmlEvent, XmlNode,
    error::{Diagnostic, DiagnosticCollector, ErrorCode},
    feed,
};

use crate::{
    error::WeftError,
    linker::{ImportFailure, Session},
    model::{DocumentId, ElementRef, GraphError},
    queue::PendingReference,
    resolve::{Resolution, Resolver},
};

/// Maps tags to element kinds.
pub trait ElementFactory {
    /// The kind to create for `tag`, or `None` to skip the element.
    fn kind_for(&self, tag: &str) -> Option<ElementKind>;
}

/// Knows every tag of the built-in element schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFactory;

impl ElementFactory for DefaultFactory {
    fn kind_for(&self, tag: &str) -> Option<ElementKind> {
        ElementKind::from_tag(tag)
    }
}

/// Builds one document of a [`Session`].
pub struct DocumentBuilder<'s> {
    session: &'s mut Session,
    document: DocumentId,
    open: Vec<ElementRef>,
    /// Depth inside a skipped subtree; zero when building.
    skipping: usize,
    collector: DiagnosticCollector,
}

impl<'s> DocumentBuilder<'s> {
    /// Build into `document`, which must already exist in the session workspace.
    pub fn new(session: &'s mut Session, document: DocumentId) -> Self {
        Self {
            session,
            document,
            open: Vec::new(),
            skipping: 0,
            collector: DiagnosticCollector::new(),
        }
    }

    /// Build from a recorded event sequence.
    pub fn build_from_events(mut self, events: &[XmlEvent]) -> Result<(), WeftError> {
        feed(events, &mut self)?;
        self.finish()
    }

    /// Build from an element tree.
    pub fn build_from_tree(mut self, tree: &XmlNode) -> Result<(), WeftError> {
        tree.walk(&mut self)?;
        self.finish()
    }

    /// Report the structural errors collected while building.
    ///
    /// # Errors
    ///
    /// [`WeftError::Parse`] carrying every structural diagnostic, together
    /// with the document's source text and URI.
    pub fn finish(mut self) -> Result<(), WeftError> {
        let document = self
            .session
            .workspace()
            .document(self.document)
            .ok_or(GraphError::UnknownDocument(self.document))?;
        let (uri, src) = (
            document.uri().to_string(),
            document.source().unwrap_or_default().to_string(),
        );

        if document.root().is_none() && !self.collector.has_errors() {
            self.collector.emit(
                Diagnostic::error("document has no root element")
                    .with_code(ErrorCode::E104)
                    .with_label(Span::new(0..0), "expected `ncl` here"),
            );
        }

        let errors = self.collector.error_count();
        match self.collector.finish() {
            Ok(_) => {
                debug!(uri = uri.as_str(); "Built document");
                Ok(())
            }
            Err(err) => {
                warn!(uri = uri.as_str(), errors; "Document has structural errors");
                Err(WeftError::new_parse_error(err, src, uri))
            }
        }
    }

    fn create(
        &mut self,
        kind: ElementKind,
        attributes: &[Attribute],
        span: Span,
        parent: Option<ElementRef>,
    ) -> Result<Option<ElementRef>, WeftError> {
        let ws = self.session.workspace_mut();
        let element = ws.create_element(self.document, kind)?;
        ws.set_span(element, Some(span))?;

        let mut references: Vec<(String, RefKind)> = Vec::new();
        for attribute in attributes {
            let name = attribute.name.as_str();
            let value = attribute.value.as_str();

            if let Some(declared) = kind.reference(name) {
                ws.declare_reference(element, name, RefName::parse(value))?;
                references.push((name.to_string(), declared.kind));
            } else if kind.accepts_parameters()
                && PARAMETER_ATTRIBUTES.contains(&name)
                && RefName::is_parameter_syntax(value)
            {
                ws.declare_reference(element, name, RefName::parse(value))?;
                references.push((name.to_string(), RefKind::Parameter));
            } else if let Err(err) = ws.set_literal(element, name, value) {
                let diagnostic = Diagnostic::error(err.to_string())
                    .with_code(ErrorCode::E200)
                    .with_label(attribute.span, "invalid identifier")
                    .with_help("identifiers match `[_:A-Za-z][-._:A-Za-z0-9]*`");
                return self.reject(element, diagnostic);
            }
        }

        // Declared references first, in schema order; parameters keep source order.
        let order = |name: &str| {
            kind.references()
                .iter()
                .position(|declared| declared.name == name)
                .unwrap_or(usize::MAX)
        };
        references.sort_by_key(|(name, _)| order(name));

        if kind.is_import() {
            if let Some(rejected) = self.import(element, kind, span)? {
                return self.reject(element, rejected);
            }
        }

        let ws = self.session.workspace_mut();
        let attached = match parent {
            Some(parent) => ws.attach(element, parent),
            None => ws.set_root(element),
        };
        if let Err(err) = attached {
            let diagnostic = self.structural(err, span);
            return self.reject(element, diagnostic);
        }

        for (name, kind) in references {
            self.resolve_or_defer(element, &name, kind)?;
        }
        Ok(Some(element))
    }

    /// Load the document named by an import element and record it.
    ///
    /// Returns the diagnostic to reject the element with, if any.
    fn import(
        &mut self,
        element: ElementRef,
        kind: ElementKind,
        span: Span,
    ) -> Result<Option<Diagnostic>, WeftError> {
        let ws = self.session.workspace();
        let literal = |name: &str| {
            ws.element(element)
                .and_then(|e| e.literal(name))
                .map(str::to_string)
        };
        let (alias, uri) = (literal("alias"), literal("documentURI"));

        let Some(uri) = uri else {
            return Ok(Some(missing_attribute(kind, "documentURI", span)));
        };
        if alias.is_none() {
            return Ok(Some(missing_attribute(kind, "alias", span)));
        }

        match self.session.import(self.document, &uri) {
            Ok(imported) => {
                self.session
                    .workspace_mut()
                    .set_imported(element, Some(imported))?;
                Ok(None)
            }
            Err(ImportFailure::Depth(limit)) => Ok(Some(
                Diagnostic::error(format!("import of `{uri}` exceeds the nesting limit of {limit}"))
                    .with_code(ErrorCode::E206)
                    .with_label(span, "imported here")
                    .with_help("raise `linker.max_import_depth` in the configuration"),
            )),
            Err(ImportFailure::Load(err)) => Ok(Some(
                Diagnostic::error(format!("cannot import `{uri}`"))
                    .with_code(ErrorCode::E207)
                    .with_label(span, err.to_string()),
            )),
            Err(ImportFailure::Fatal(err)) => Err(err),
        }
    }

    fn resolve_or_defer(
        &mut self,
        element: ElementRef,
        attribute: &str,
        kind: RefKind,
    ) -> Result<(), WeftError> {
        let ws = self.session.workspace();
        let Some(raw) = ws
            .element(element)
            .and_then(|e| e.slot(attribute))
            .map(|slot| slot.spelled().clone())
        else {
            return Ok(());
        };

        match Resolver::new(ws).resolve(element, kind, &raw) {
            Resolution::Resolved(target) => {
                self.session
                    .workspace_mut()
                    .set_reference(element, attribute, target)?;
            }
            Resolution::NotYetAvailable | Resolution::NoSuchScope(_) => {
                self.session.enqueue(
                    self.document,
                    PendingReference::new(element, attribute, raw, kind),
                );
            }
        }
        Ok(())
    }

    fn structural(&self, err: GraphError, span: Span) -> Diagnostic {
        let ws = self.session.workspace();
        let first_defined = |existing: ElementRef| ws.element(existing).and_then(|e| e.span());

        match err {
            GraphError::DuplicateId {
                namespace,
                id,
                existing,
            } => {
                let diagnostic =
                    Diagnostic::error(format!("id `{id}` is already defined in {namespace}"))
                        .with_code(ErrorCode::E201)
                        .with_label(span, "duplicate definition");
                match first_defined(existing) {
                    Some(first) => diagnostic.with_secondary_label(first, "first defined here"),
                    None => diagnostic,
                }
            }
            GraphError::DuplicateAlias { alias, existing } => {
                let diagnostic = Diagnostic::error(format!("alias `{alias}` is already bound"))
                    .with_code(ErrorCode::E202)
                    .with_label(span, "duplicate alias");
                match first_defined(existing) {
                    Some(first) => diagnostic.with_secondary_label(first, "first bound here"),
                    None => diagnostic,
                }
            }
            other => Diagnostic::error(other.to_string())
                .with_code(ErrorCode::E203)
                .with_label(span, "cannot place element here"),
        }
    }

    /// Drop a detached element and skip its subtree.
    fn reject(
        &mut self,
        element: ElementRef,
        diagnostic: Diagnostic,
    ) -> Result<Option<ElementRef>, WeftError> {
        warn!(element:% = element, diagnostic:% = diagnostic; "Rejected element");
        self.collector.emit(diagnostic);
        self.session.workspace_mut().remove(element)?;
        Ok(None)
    }
}

fn missing_attribute(kind: ElementKind, attribute: &str, span: Span) -> Diagnostic {
    Diagnostic::error(format!("`{kind}` requires a `{attribute}` attribute"))
        .with_code(ErrorCode::E204)
        .with_label(span, format!("missing `{attribute}`"))
}

impl ElementSink for DocumentBuilder<'_> {
    type Error = WeftError;

    fn begin_element(
        &mut self,
        tag: &str,
        attributes: &[Attribute],
        span: Span,
    ) -> Result<(), Self::Error> {
        if self.skipping > 0 {
            self.skipping += 1;
            return Ok(());
        }
        let parent = self.open.last().copied();

        let Some(kind) = self.session.factory().kind_for(tag) else {
            match parent {
                Some(parent) => {
                    debug!(tag; "Skipping unknown element");
                    let warning = Diagnostic::warning(format!("unknown element `{tag}`"))
                        .with_code(ErrorCode::E205)
                        .with_label(span, "element skipped");
                    self.session.workspace_mut().add_diagnostic(parent, warning)?;
                }
                None => self.collector.emit(
                    Diagnostic::error(format!("unknown root element `{tag}`"))
                        .with_code(ErrorCode::E205)
                        .with_label(span, "expected `ncl`"),
                ),
            }
            self.skipping = 1;
            return Ok(());
        };

        match self.create(kind, attributes, span, parent)? {
            Some(element) => self.open.push(element),
            None => self.skipping = 1,
        }
        Ok(())
    }

    fn end_element(&mut self, _tag: &str, _span: Span) -> Result<(), Self::Error> {
        if self.skipping > 0 {
            self.skipping -= 1;
        } else {
            self.open.pop();
        }
        Ok(())
    }
}
