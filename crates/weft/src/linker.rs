//! Document loading and linking.
//!
//! A [`Session`] owns a [`Workspace`], the loader documents are read from,
//! the factory elements are created by, and one deferred queue per document.
//! Loading a document runs two phases:
//!
//! 1. **Build**: the tree is built from the source. Imports are loaded, built
//!    and linked recursively before their import element is attached.
//!    References are resolved as soon as their target exists and queued
//!    otherwise.
//! 2. **Drain**: the queue is walked once in discovery order. References
//!    still missing become linking diagnostics on their referrer and entries
//!    of the document's [`LinkReport`].
//!
//! A failed top-level load removes every document it created, so a session
//! never holds a partially built document.

use indexmap::IndexMap;
use log::{debug, info, warn};
use petgraph::{
    algo::{has_path_connecting, toposort},
    graphmap::DiGraphMap,
};

use weft_core::{reference::RefName, schema::RefKind};
use weft_parser::{
    XmlNode,
    error::{Diagnostic, ErrorCode},
    read_events,
};

use crate::{
    builder::{DefaultFactory, DocumentBuilder, ElementFactory},
    config::AppConfig,
    error::WeftError,
    loader::{DocumentLoader, LoadError},
    model::{Document, DocumentId, ElementRef, GraphError, Named, RefSlot, Workspace},
    observer::ModelEvent,
    queue::{DeferredQueue, PendingReference},
    resolve::{MissingScope, Resolution, Resolver},
    serialize::Serializer,
};

/// Why a reference stayed unresolved after the drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The scope exists but has no element with this name.
    NotFound,
    MissingScope(MissingScope),
}

/// A reference the drain could not bind.
#[derive(Debug, Clone)]
pub struct UnresolvedReference {
    pub referrer: ElementRef,
    pub attribute: String,
    pub raw: RefName,
    pub kind: RefKind,
    pub reason: UnresolvedReason,
    /// The diagnostic also attached to the referrer.
    pub diagnostic: Diagnostic,
}

/// Outcome of draining one document's queue.
#[derive(Debug, Clone)]
pub struct LinkReport {
    pub document: DocumentId,
    /// References bound during the drain.
    pub resolved: usize,
    pub unresolved: Vec<UnresolvedReference>,
}

impl LinkReport {
    fn new(document: DocumentId) -> Self {
        Self {
            document,
            resolved: 0,
            unresolved: Vec::new(),
        }
    }

    /// Whether every reference of the drain was bound.
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Fail with [`WeftError::Unresolved`] if any reference is unresolved.
    pub fn ensure_resolved(&self) -> Result<(), WeftError> {
        if self.is_clean() {
            Ok(())
        } else {
            Err(WeftError::Unresolved(self.unresolved.clone()))
        }
    }
}

/// Why an import element could not get its document.
#[derive(Debug)]
pub(crate) enum ImportFailure {
    /// Nesting would exceed the configured limit.
    Depth(usize),
    /// The document could not be located or read.
    Load(LoadError),
    /// The imported document itself failed; aborts the whole load.
    Fatal(WeftError),
}

/// Loads, builds and links documents into one workspace.
pub struct Session {
    workspace: Workspace,
    loader: Box<dyn DocumentLoader>,
    factory: Box<dyn ElementFactory>,
    config: AppConfig,
    /// Canonical URIs currently being loaded, outermost first.
    loading: Vec<String>,
    loaded: IndexMap<String, DocumentId>,
    queues: IndexMap<DocumentId, DeferredQueue>,
    /// Edges point from importer to imported document.
    imports: DiGraphMap<DocumentId, ()>,
    reports: IndexMap<DocumentId, LinkReport>,
}

impl Session {
    /// A session reading documents through `loader`, with the default
    /// factory and configuration.
    pub fn new(loader: impl DocumentLoader + 'static) -> Self {
        Self {
            workspace: Workspace::new(),
            loader: Box::new(loader),
            factory: Box::new(DefaultFactory),
            config: AppConfig::default(),
            loading: Vec::new(),
            loaded: IndexMap::new(),
            queues: IndexMap::new(),
            imports: DiGraphMap::new(),
            reports: IndexMap::new(),
        }
    }

    /// Replace the configuration. Applies to later loads.
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the factory used to create elements while building.
    pub fn with_factory(mut self, factory: impl ElementFactory + 'static) -> Self {
        self.factory = Box::new(factory);
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Every document loaded so far.
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Edits made here are not queued; call [`Session::relink`] to bind
    /// references they leave unresolved.
    pub fn workspace_mut(&mut self) -> &mut Workspace {
        &mut self.workspace
    }

    pub(crate) fn factory(&self) -> &dyn ElementFactory {
        self.factory.as_ref()
    }

    /// The document loaded from `canonical`, if any.
    pub fn document_for(&self, canonical: &str) -> Option<DocumentId> {
        self.loaded.get(canonical).copied()
    }

    /// The report of the last drain of `document`.
    pub fn report(&self, document: DocumentId) -> Option<&LinkReport> {
        self.reports.get(&document)
    }

    /// Reports of every linked document, in link order.
    pub fn reports(&self) -> impl Iterator<Item = &LinkReport> + '_ {
        self.reports.values()
    }

    /// Documents imported directly by `document`.
    pub fn imports_of(&self, document: DocumentId) -> Vec<DocumentId> {
        if !self.imports.contains_node(document) {
            return Vec::new();
        }
        self.imports.neighbors(document).collect()
    }

    /// Load, build and link the document at `uri` and everything it imports.
    ///
    /// A URI that was already loaded returns the existing document.
    ///
    /// # Errors
    ///
    /// - [`WeftError::Load`] if the document cannot be read;
    /// - [`WeftError::Parse`] for reader or structural errors, in this
    ///   document or an imported one;
    /// - [`WeftError::CircularImport`] if an import chain leads back to a
    ///   document being loaded.
    ///
    /// Documents created by a failed load are removed again.
    pub fn load(&mut self, uri: &str) -> Result<DocumentId, WeftError> {
        let canonical = self.loader.canonicalize(uri, None)?;
        if let Some(document) = self.document_for(&canonical) {
            return Ok(document);
        }
        self.transaction(|session| {
            let source = session.loader.read(&canonical)?;
            session.load_text(canonical, source)
        })
    }

    /// Load a document from text. Its imports still go through the loader,
    /// relative to `uri`.
    pub fn load_source(&mut self, uri: &str, source: &str) -> Result<DocumentId, WeftError> {
        self.transaction(|session| session.load_text(uri.to_string(), source.to_string()))
    }

    /// Build and link a document from an element tree.
    pub fn load_tree(&mut self, uri: &str, tree: &XmlNode) -> Result<DocumentId, WeftError> {
        self.transaction(|session| {
            let document = session.register(uri.to_string(), None);
            session.loading.push(uri.to_string());
            let built = DocumentBuilder::new(session, document).build_from_tree(tree);
            session.loading.pop();
            built?;
            session.link(document);
            Ok(document)
        })
    }

    fn transaction(
        &mut self,
        load: impl FnOnce(&mut Self) -> Result<DocumentId, WeftError>,
    ) -> Result<DocumentId, WeftError> {
        let checkpoint = self.workspace.next_document_id();
        let result = load(self);
        self.loading.clear();
        if let Err(err) = &result {
            warn!(err:% = err; "Load failed, rolling back");
            self.rollback(checkpoint);
        }
        result
    }

    fn register(&mut self, canonical: String, source: Option<String>) -> DocumentId {
        let document = self.workspace.create_document(canonical.clone(), source);
        self.loaded.insert(canonical, document);
        self.imports.add_node(document);
        document
    }

    fn load_text(&mut self, canonical: String, source: String) -> Result<DocumentId, WeftError> {
        info!(uri = canonical.as_str(), depth = self.loading.len(); "Loading document");
        let events = read_events(&source)
            .map_err(|err| WeftError::new_parse_error(err, source.as_str(), canonical.as_str()))?;

        let document = self.register(canonical.clone(), Some(source));
        self.loading.push(canonical);
        let built = DocumentBuilder::new(self, document).build_from_events(&events);
        self.loading.pop();
        built?;

        self.link(document);
        Ok(document)
    }

    /// Resolve, load and link the document an import element names.
    pub(crate) fn import(
        &mut self,
        importer: DocumentId,
        uri: &str,
    ) -> Result<DocumentId, ImportFailure> {
        let base = self
            .workspace
            .document(importer)
            .map(|document| document.uri().to_string());
        let canonical = self
            .loader
            .canonicalize(uri, base.as_deref())
            .map_err(ImportFailure::Load)?;

        if self.loading.contains(&canonical) {
            let mut chain = self.loading.clone();
            chain.push(canonical);
            return Err(ImportFailure::Fatal(WeftError::CircularImport { chain }));
        }

        if let Some(existing) = self.document_for(&canonical) {
            if has_path_connecting(&self.imports, existing, importer, None) {
                let chain = base.into_iter().chain([canonical]).collect();
                return Err(ImportFailure::Fatal(WeftError::CircularImport { chain }));
            }
            debug!(uri = canonical.as_str(); "Sharing loaded document");
            self.imports.add_edge(importer, existing, ());
            return Ok(existing);
        }

        let limit = self.config.linker().max_import_depth();
        if self.loading.len() > limit {
            return Err(ImportFailure::Depth(limit));
        }

        let source = self.loader.read(&canonical).map_err(ImportFailure::Load)?;
        let imported = self
            .load_text(canonical, source)
            .map_err(ImportFailure::Fatal)?;
        self.imports.add_edge(importer, imported, ());
        Ok(imported)
    }

    fn rollback(&mut self, checkpoint: DocumentId) {
        let doomed: Vec<DocumentId> = self
            .workspace
            .documents()
            .map(Document::id)
            .filter(|document| *document >= checkpoint)
            .collect();

        self.workspace.remove_documents(&doomed);
        self.loaded.retain(|_, document| !doomed.contains(document));
        for document in &doomed {
            self.queues.shift_remove(document);
            self.reports.shift_remove(document);
            self.imports.remove_node(*document);
        }
    }

    pub(crate) fn enqueue(&mut self, document: DocumentId, reference: PendingReference) {
        self.queues.entry(document).or_default().push(reference);
    }

    /// Number of references waiting for the next drain of `document`.
    pub fn pending(&self, document: DocumentId) -> usize {
        self.queues.get(&document).map_or(0, DeferredQueue::len)
    }

    /// Drain the queue of `document` once.
    pub fn link(&mut self, document: DocumentId) -> LinkReport {
        let pending: Vec<PendingReference> = self
            .queues
            .get_mut(&document)
            .map(|queue| queue.drain().collect())
            .unwrap_or_default();
        let mut report = LinkReport::new(document);

        for reference in pending {
            let still_pending = matches!(
                self.workspace
                    .element(reference.referrer)
                    .and_then(|element| element.slot(&reference.attribute)),
                Some(RefSlot::Unresolved(raw)) if *raw == reference.raw
            );
            if !still_pending {
                continue;
            }

            let resolution = Resolver::new(&self.workspace).resolve(
                reference.referrer,
                reference.kind,
                &reference.raw,
            );
            match resolution {
                Resolution::Resolved(target) => {
                    match self
                        .workspace
                        .set_reference(reference.referrer, &reference.attribute, target)
                    {
                        Ok(()) => report.resolved += 1,
                        Err(err) => warn!(err:% = err; "Cannot bind resolved reference"),
                    }
                }
                Resolution::NotYetAvailable => {
                    self.unresolved(&mut report, reference, UnresolvedReason::NotFound);
                }
                Resolution::NoSuchScope(scope) => {
                    self.unresolved(&mut report, reference, UnresolvedReason::MissingScope(scope));
                }
            }
        }

        info!(
            document = document.to_raw(),
            resolved = report.resolved,
            unresolved = report.unresolved.len();
            "Linked document"
        );
        self.workspace.emit(ModelEvent::DocumentLinked {
            document,
            unresolved: report.unresolved.len(),
        });
        self.reports.insert(document, report.clone());
        report
    }

    fn unresolved(
        &mut self,
        report: &mut LinkReport,
        reference: PendingReference,
        reason: UnresolvedReason,
    ) {
        let PendingReference {
            referrer,
            attribute,
            raw,
            kind,
        } = reference;

        let diagnostic = match &reason {
            UnresolvedReason::NotFound => {
                Diagnostic::error(format!("unresolved {kind} reference `{raw}`"))
                    .with_code(ErrorCode::E300)
                    .with_help(format!("define a {kind} with this name"))
            }
            UnresolvedReason::MissingScope(scope @ MissingScope::Alias(_)) => {
                Diagnostic::error(format!("cannot resolve `{raw}`: {scope}"))
                    .with_code(ErrorCode::E301)
                    .with_help("import the document with `importBase` or `importNCL`")
            }
            UnresolvedReason::MissingScope(scope) => {
                Diagnostic::error(format!("cannot resolve `{raw}`: {scope}"))
                    .with_code(ErrorCode::E302)
            }
        };
        let diagnostic = match self.workspace.element(referrer).and_then(|e| e.span()) {
            Some(span) => diagnostic.with_label(span, format!("in `{attribute}`")),
            None => diagnostic,
        };

        debug!(referrer:% = referrer, attribute = attribute.as_str(), raw:% = raw; "Unresolved reference");
        if let Err(err) = self.workspace.add_diagnostic(referrer, diagnostic.clone()) {
            warn!(err:% = err; "Cannot attach diagnostic");
        }
        report.unresolved.push(UnresolvedReference {
            referrer,
            attribute,
            raw,
            kind,
            reason,
            diagnostic,
        });
    }

    /// Queue every unresolved slot of `document` again and drain.
    ///
    /// Linking diagnostics from earlier drains are cleared first.
    pub fn relink(&mut self, document: DocumentId) -> Result<LinkReport, WeftError> {
        let doc = self
            .workspace
            .document(document)
            .ok_or(GraphError::UnknownDocument(document))?;

        let mut queue = DeferredQueue::new();
        let elements = doc.root().map(|root| doc.preorder(root)).unwrap_or_default();
        for id in elements {
            let Some(element) = doc.element(id) else {
                continue;
            };
            let referrer = ElementRef::new(document, id);
            let declared = element.kind().references();

            for reference in declared {
                if let Some(RefSlot::Unresolved(raw)) = element.slot(reference.name) {
                    queue.push(PendingReference::new(
                        referrer,
                        reference.name,
                        raw.clone(),
                        reference.kind,
                    ));
                }
            }
            for (name, slot) in element.slots() {
                if declared.iter().any(|reference| reference.name == name) {
                    continue;
                }
                if let RefSlot::Unresolved(raw) = slot {
                    queue.push(PendingReference::new(
                        referrer,
                        name,
                        raw.clone(),
                        RefKind::Parameter,
                    ));
                }
            }
        }

        self.workspace
            .retain_diagnostics(document, |diagnostic| !diagnostic.is_linking())?;
        debug!(document = document.to_raw(), pending = queue.len(); "Relinking document");
        self.queues.insert(document, queue);
        Ok(self.link(document))
    }

    /// Relink every document, imported documents before their importers.
    pub fn relink_all(&mut self) -> Result<Vec<LinkReport>, WeftError> {
        let order: Vec<DocumentId> = match toposort(&self.imports, None) {
            Ok(order) => order.into_iter().rev().collect(),
            Err(cycle) => {
                warn!(document = cycle.node_id().to_raw(); "Import graph has a cycle");
                self.workspace.documents().map(Document::id).collect()
            }
        };
        let live: Vec<DocumentId> = order
            .into_iter()
            .filter(|document| self.workspace.document(*document).is_some())
            .collect();
        live.into_iter()
            .map(|document| self.relink(document))
            .collect()
    }

    /// Write `document` back to text using the configured format.
    pub fn serialize(&self, document: DocumentId) -> Result<String, WeftError> {
        Serializer::new(self.config.serializer().clone()).serialize(&self.workspace, document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::LinkerConfig, loader::MemoryLoader, model::ReferenceTarget};

    const LIB: &str = "<ncl id='lib'><head><ruleBase>\
        <rule id='r1' var='x' comparator='eq' value='1'/>\
        </ruleBase></head></ncl>";

    fn session(documents: &[(&str, &str)]) -> Session {
        let loader = documents
            .iter()
            .fold(MemoryLoader::new(), |loader, (uri, source)| loader.with_document(uri, *source));
        Session::new(loader)
    }

    #[test]
    fn test_forward_reference_is_drained() {
        let mut session = session(&[(
            "main.ncl",
            "<ncl><body><port id='p' component='late'/><media id='late'/></body></ncl>",
        )]);
        let doc = session.load("main.ncl").unwrap();
        let report = session.report(doc).unwrap();
        assert_eq!(report.resolved, 1);
        assert!(report.is_clean());
    }

    #[test]
    fn test_unresolved_reference_is_reported_not_thrown() {
        let mut session = session(&[(
            "main.ncl",
            "<ncl><head><descriptorBase/></head>\
             <body><media id='m' descriptor='nope'/><media id='n' descriptor='x#d'/></body></ncl>",
        )]);
        let doc = session.load("main.ncl").unwrap();
        let report = session.report(doc).unwrap().clone();

        let codes: Vec<_> = report
            .unresolved
            .iter()
            .map(|entry| entry.diagnostic.code())
            .collect();
        assert_eq!(codes, vec![Some(ErrorCode::E300), Some(ErrorCode::E301)]);
        assert!(matches!(report.ensure_resolved(), Err(WeftError::Unresolved(list)) if list.len() == 2));

        let media = session.workspace().element(report.unresolved[0].referrer).unwrap();
        assert_eq!(media.diagnostics()[0].code(), Some(ErrorCode::E300));
    }

    #[test]
    fn test_missing_base_is_a_scope_error() {
        let mut session = session(&[(
            "main.ncl",
            "<ncl><body><media id='m' descriptor='d1'/></body></ncl>",
        )]);
        let doc = session.load("main.ncl").unwrap();
        let report = session.report(doc).unwrap();
        assert_eq!(report.unresolved[0].diagnostic.code(), Some(ErrorCode::E302));
        assert_eq!(
            report.unresolved[0].reason,
            UnresolvedReason::MissingScope(MissingScope::Base(
                weft_core::schema::BaseKind::Descriptor
            ))
        );
    }

    #[test]
    fn test_shared_import_is_loaded_once() {
        let mut session = session(&[
            ("lib.ncl", LIB),
            (
                "main.ncl",
                "<ncl><head>\
                 <importedDocumentBase><importNCL alias='a' documentURI='lib.ncl'/></importedDocumentBase>\
                 <ruleBase><importBase alias='b' documentURI='lib.ncl'/></ruleBase>\
                 </head></ncl>",
            ),
        ]);
        let main = session.load("main.ncl").unwrap();
        let lib = session.document_for("lib.ncl").unwrap();

        assert_eq!(session.workspace().documents().count(), 2);
        assert_eq!(session.imports_of(main), vec![lib]);
        assert_eq!(session.load("lib.ncl").unwrap(), lib);
    }

    #[test]
    fn test_import_depth_limit() {
        let mut session = session(&[
            (
                "a.ncl",
                "<ncl><head><ruleBase><importBase alias='b' documentURI='b.ncl'/></ruleBase></head></ncl>",
            ),
            (
                "b.ncl",
                "<ncl><head><ruleBase><importBase alias='c' documentURI='c.ncl'/></ruleBase></head></ncl>",
            ),
            ("c.ncl", LIB),
        ])
        .with_config(AppConfig::new(LinkerConfig::new(1), Default::default()));

        let err = session.load("a.ncl").unwrap_err();
        match err {
            WeftError::Parse { err, uri, .. } => {
                assert_eq!(uri, "b.ncl");
                assert_eq!(err.diagnostics()[0].code(), Some(ErrorCode::E206));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(session.workspace().documents().count(), 0);
    }

    #[test]
    fn test_relink_after_adding_definition() {
        let mut session = session(&[(
            "main.ncl",
            "<ncl><head><ruleBase id='rules'/></head>\
             <body><switch id='sw'><bindRule constituent='m' rule='r1'/><media id='m'/></switch></body></ncl>",
        )]);
        let doc = session.load("main.ncl").unwrap();
        assert_eq!(session.report(doc).unwrap().unresolved.len(), 1);
        assert_eq!(session.pending(doc), 0);

        let ws = session.workspace_mut();
        let base = ws
            .document(doc)
            .unwrap()
            .bases(weft_core::schema::BaseKind::Rule)[0];
        let rule = ws.create_element(doc, weft_core::schema::ElementKind::Rule).unwrap();
        ws.set_literal(rule, "id", "r1").unwrap();
        ws.attach(rule, ElementRef::new(doc, base)).unwrap();

        let report = session.relink(doc).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.resolved, 1);
        assert!(session.workspace().element(rule).unwrap().is_referenced());

        let switch_children = session
            .workspace()
            .document(doc)
            .unwrap()
            .elements()
            .filter(|(_, e)| !e.diagnostics().is_empty())
            .count();
        assert_eq!(switch_children, 0);
    }

    #[test]
    fn test_relink_all_orders_imports_first() {
        let mut session = session(&[
            ("lib.ncl", LIB),
            (
                "main.ncl",
                "<ncl><head><ruleBase><importBase alias='b' documentURI='lib.ncl'/></ruleBase></head></ncl>",
            ),
        ]);
        let main = session.load("main.ncl").unwrap();
        let lib = session.document_for("lib.ncl").unwrap();

        let order: Vec<DocumentId> = session
            .relink_all()
            .unwrap()
            .into_iter()
            .map(|report| report.document)
            .collect();
        assert_eq!(order, vec![lib, main]);
    }
}
