//! Graph mutations: ownership, registration and reference edges.
//!
//! Every structural change goes through [`Workspace`]. Attaching and
//! detaching keep the symbol and alias tables in step with the tree: keys
//! are registered in the tables of the scopes an element enters and removed
//! from the scopes it leaves. Reference slots and back-edges are updated as
//! a pair.

use std::sync::mpsc::Receiver;

use indexmap::IndexMap;
use log::{debug, trace};
use thiserror::Error;

use weft_core::{
    identifier::{Id, InvalidId},
    reference::RefName,
    schema::{ElementKind, IndexScope},
};
use weft_parser::{Span, error::Diagnostic};

use crate::{
    alias::DuplicateAlias,
    model::{
        AttrValue, Document, DocumentId, Element, ElementId, ElementRef, Named, RefSlot,
        ReferenceTarget,
    },
    observer::{ModelEvent, Observers},
    symbols::{DuplicateId, Namespace, OwnerRule, owner_rule},
};

/// Structural errors of the element graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("id `{id}` is already defined in {namespace}")]
    DuplicateId {
        namespace: Namespace,
        id: Id,
        existing: ElementRef,
    },

    #[error("alias `{alias}` is already bound")]
    DuplicateAlias { alias: String, existing: ElementRef },

    #[error("element {element} is already attached to {parent}")]
    AlreadyAttached {
        element: ElementRef,
        parent: ElementRef,
    },

    #[error("element {element} is still referenced by {} element(s)", referrers.len())]
    HasReferences {
        element: ElementRef,
        referrers: Vec<ElementRef>,
    },

    #[error("attaching {element} to {parent} would make it its own ancestor")]
    WouldCycle {
        element: ElementRef,
        parent: ElementRef,
    },

    #[error("unknown element {0}")]
    UnknownElement(ElementRef),

    #[error("unknown document {0}")]
    UnknownDocument(DocumentId),

    #[error("cannot attach {element} to {parent} in another document")]
    CrossDocument {
        element: ElementRef,
        parent: ElementRef,
    },

    #[error("document {document} already has root {root}")]
    RootAlreadySet {
        document: DocumentId,
        root: ElementRef,
    },

    #[error(transparent)]
    InvalidId(#[from] InvalidId),
}

// =============================================================================
// Table registration
// =============================================================================

/// One table entry an element holds by virtue of its position in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Registration {
    Table {
        owner: ElementId,
        namespace: Namespace,
        id: Id,
    },
    NodeIndex {
        id: Id,
    },
    ElementAlias {
        owner: ElementId,
        alias: String,
    },
    DocumentAlias {
        alias: String,
    },
}

fn owner_of(doc: &Document, element: ElementId, rule: OwnerRule) -> Option<ElementId> {
    match rule {
        OwnerRule::Parent => doc.element(element).and_then(Element::parent),
        OwnerRule::Base(base) => doc.nearest_ancestor(element, |kind| kind.as_base() == Some(base)),
        OwnerRule::Composite => doc.nearest_ancestor(element, ElementKind::is_composite),
        OwnerRule::Connector => doc.nearest_ancestor(element, ElementKind::is_connector),
    }
}

/// The entries `element` should hold given its current ancestors.
fn registrations(doc: &Document, element: ElementId) -> Vec<Registration> {
    let Some(e) = doc.element(element) else {
        return Vec::new();
    };
    let mut regs = Vec::new();

    if let (Some(id), Some(scope)) = (e.key(), e.kind().index_scope()) {
        if let Some(owner) = owner_of(doc, element, owner_rule(scope)) {
            regs.push(Registration::Table {
                owner,
                namespace: scope.into(),
                id,
            });
        }
        if scope == IndexScope::Node && doc.is_connected(element) {
            regs.push(Registration::NodeIndex { id });
        }
    }

    if let (Some(_), Some(alias)) = (e.imported(), e.literal("alias")) {
        match e.kind() {
            ElementKind::ImportBase => {
                let base = doc.nearest_ancestor(element, |kind| kind.as_base().is_some());
                if let Some(owner) = base {
                    regs.push(Registration::ElementAlias {
                        owner,
                        alias: alias.to_string(),
                    });
                }
            }
            ElementKind::ImportNcl if doc.is_connected(element) => {
                regs.push(Registration::DocumentAlias {
                    alias: alias.to_string(),
                });
            }
            _ => {}
        }
    }

    regs
}

fn subtree_registrations(doc: &Document, root: ElementId) -> Vec<(ElementId, Registration)> {
    doc.preorder(root)
        .into_iter()
        .flat_map(|id| registrations(doc, id).into_iter().map(move |reg| (id, reg)))
        .collect()
}

fn difference(
    from: Vec<(ElementId, Registration)>,
    without: &[(ElementId, Registration)],
) -> Vec<(ElementId, Registration)> {
    from.into_iter()
        .filter(|entry| !without.contains(entry))
        .collect()
}

fn duplicate_id(document: DocumentId, namespace: Namespace, err: DuplicateId) -> GraphError {
    GraphError::DuplicateId {
        namespace,
        id: err.id,
        existing: ElementRef::new(document, err.existing),
    }
}

fn duplicate_alias(document: DocumentId, err: DuplicateAlias) -> GraphError {
    GraphError::DuplicateAlias {
        alias: err.alias,
        existing: ElementRef::new(document, err.existing.declared_by),
    }
}

/// Add one entry. Holding the entry already is not an error.
fn apply(doc: &mut Document, element: ElementId, reg: &Registration) -> Result<(), GraphError> {
    let document = doc.id();
    let unknown = |id: ElementId| GraphError::UnknownElement(ElementRef::new(document, id));

    match reg {
        Registration::Table {
            owner,
            namespace,
            id,
        } => {
            let table = doc
                .element_mut(*owner)
                .ok_or_else(|| unknown(*owner))?
                .table_mut(*namespace);
            if table.lookup(*id) == Some(element) {
                return Ok(());
            }
            table
                .insert(*id, element)
                .map_err(|err| duplicate_id(document, *namespace, err))
        }
        Registration::NodeIndex { id } => {
            let table = doc.node_index_mut();
            if table.lookup(*id) == Some(element) {
                return Ok(());
            }
            table
                .insert(*id, element)
                .map_err(|err| duplicate_id(document, Namespace::Nodes, err))
        }
        Registration::ElementAlias { owner, alias } => {
            let imported = doc
                .element(element)
                .and_then(Element::imported)
                .ok_or_else(|| unknown(element))?;
            let table = doc
                .element_mut(*owner)
                .ok_or_else(|| unknown(*owner))?
                .aliases_mut();
            if table
                .binding(alias)
                .is_some_and(|binding| binding.declared_by == element)
            {
                return Ok(());
            }
            table
                .bind(alias.clone(), imported, element)
                .map_err(|err| duplicate_alias(document, err))
        }
        Registration::DocumentAlias { alias } => {
            let imported = doc
                .element(element)
                .and_then(Element::imported)
                .ok_or_else(|| unknown(element))?;
            let table = doc.aliases_mut();
            if table
                .binding(alias)
                .is_some_and(|binding| binding.declared_by == element)
            {
                return Ok(());
            }
            table
                .bind(alias.clone(), imported, element)
                .map_err(|err| duplicate_alias(document, err))
        }
    }
}

/// Remove one entry if it is held by `element`.
fn revoke(doc: &mut Document, element: ElementId, reg: &Registration) {
    match reg {
        Registration::Table {
            owner,
            namespace,
            id,
        } => {
            if let Some(owner) = doc.element_mut(*owner) {
                let table = owner.table_mut(*namespace);
                if table.lookup(*id) == Some(element) {
                    table.remove(*id);
                }
            }
        }
        Registration::NodeIndex { id } => {
            let table = doc.node_index_mut();
            if table.lookup(*id) == Some(element) {
                table.remove(*id);
            }
        }
        Registration::ElementAlias { owner, alias } => {
            if let Some(owner) = doc.element_mut(*owner) {
                let table = owner.aliases_mut();
                if table
                    .binding(alias)
                    .is_some_and(|binding| binding.declared_by == element)
                {
                    table.unbind(alias);
                }
            }
        }
        Registration::DocumentAlias { alias } => {
            let table = doc.aliases_mut();
            if table
                .binding(alias)
                .is_some_and(|binding| binding.declared_by == element)
            {
                table.unbind(alias);
            }
        }
    }
}

/// Apply every entry, undoing the ones already applied on the first failure.
fn apply_all(doc: &mut Document, entries: &[(ElementId, Registration)]) -> Result<(), GraphError> {
    for (done, (element, reg)) in entries.iter().enumerate() {
        if let Err(err) = apply(doc, *element, reg) {
            for (element, reg) in entries[..done].iter().rev() {
                revoke(doc, *element, reg);
            }
            return Err(err);
        }
    }
    Ok(())
}

fn revoke_all(doc: &mut Document, entries: &[(ElementId, Registration)]) {
    for (element, reg) in entries.iter().rev() {
        revoke(doc, *element, reg);
    }
}

// =============================================================================
// Workspace
// =============================================================================

/// All documents of a session, and the listeners observing them.
#[derive(Debug, Default)]
pub struct Workspace {
    documents: IndexMap<DocumentId, Document>,
    next_document: u32,
    observers: Observers,
}

impl Workspace {
    /// An empty workspace without listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty document.
    pub fn create_document(
        &mut self,
        uri: impl Into<String>,
        source: Option<String>,
    ) -> DocumentId {
        let id = DocumentId::from_raw(self.next_document);
        self.next_document += 1;
        let uri = uri.into();
        debug!(document = id.to_raw(), uri = uri.as_str(); "Created document");
        self.documents.insert(id, Document::new(id, uri, source));
        id
    }

    /// `None` once the document was removed.
    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(&id)
    }

    /// Documents in creation order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> + '_ {
        self.documents.values()
    }

    /// Look up a document by the URI it was created with.
    pub fn document_by_uri(&self, uri: &str) -> Option<DocumentId> {
        self.documents
            .values()
            .find(|doc| doc.uri() == uri)
            .map(Document::id)
    }

    /// The id the next created document will get.
    pub(crate) fn next_document_id(&self) -> DocumentId {
        DocumentId::from_raw(self.next_document)
    }

    /// A live element of any document.
    pub fn element(&self, element: ElementRef) -> Option<&Element> {
        self.documents
            .get(&element.document)
            .and_then(|doc| doc.element(element.element))
    }

    pub(crate) fn element_mut(&mut self, element: ElementRef) -> Option<&mut Element> {
        self.documents
            .get_mut(&element.document)
            .and_then(|doc| doc.element_mut(element.element))
    }

    fn doc(&self, id: DocumentId) -> Result<&Document, GraphError> {
        self.documents
            .get(&id)
            .ok_or(GraphError::UnknownDocument(id))
    }

    fn doc_mut(&mut self, id: DocumentId) -> Result<&mut Document, GraphError> {
        self.documents
            .get_mut(&id)
            .ok_or(GraphError::UnknownDocument(id))
    }

    fn live(&self, element: ElementRef) -> Result<&Element, GraphError> {
        self.element(element)
            .ok_or(GraphError::UnknownElement(element))
    }

    fn live_mut(&mut self, element: ElementRef) -> Result<&mut Element, GraphError> {
        self.element_mut(element)
            .ok_or(GraphError::UnknownElement(element))
    }

    /// Register a listener for model changes.
    pub fn subscribe(&mut self) -> Receiver<ModelEvent> {
        self.observers.subscribe()
    }

    pub(crate) fn emit(&mut self, event: ModelEvent) {
        self.observers.emit(event);
    }

    /// Create a detached element in `document`.
    pub fn create_element(
        &mut self,
        document: DocumentId,
        kind: ElementKind,
    ) -> Result<ElementRef, GraphError> {
        let id = self.doc_mut(document)?.push(Element::new(kind));
        trace!(document = document.to_raw(), element = id.to_raw(), kind:% = kind; "Created element");
        Ok(ElementRef::new(document, id))
    }

    /// Record where `element` was read from.
    pub fn set_span(&mut self, element: ElementRef, span: Option<Span>) -> Result<(), GraphError> {
        self.live_mut(element)?.set_span(span);
        Ok(())
    }

    pub(crate) fn set_imported(
        &mut self,
        element: ElementRef,
        imported: Option<DocumentId>,
    ) -> Result<(), GraphError> {
        self.live_mut(element)?.set_imported(imported);
        Ok(())
    }

    /// Attach a diagnostic to `element`.
    pub fn add_diagnostic(
        &mut self,
        element: ElementRef,
        diagnostic: Diagnostic,
    ) -> Result<(), GraphError> {
        self.live_mut(element)?.push_diagnostic(diagnostic);
        Ok(())
    }

    /// Drop the diagnostics of every element of `document` for which `keep`
    /// returns `false`.
    pub(crate) fn retain_diagnostics(
        &mut self,
        document: DocumentId,
        keep: impl Fn(&Diagnostic) -> bool,
    ) -> Result<(), GraphError> {
        for element in self.doc_mut(document)?.elements_mut() {
            element.retain_diagnostics(&keep);
        }
        Ok(())
    }

    /// Set a literal attribute.
    ///
    /// Writing the kind's key attribute (or an import's `alias`) also moves
    /// the element's table entries. A resolved slot previously stored under
    /// `name` is cleared first.
    ///
    /// # Errors
    ///
    /// [`GraphError::InvalidId`] if the new key breaks the identifier grammar,
    /// [`GraphError::DuplicateId`] or [`GraphError::DuplicateAlias`] if the new
    /// entry collides; the element is left unchanged.
    pub fn set_literal(
        &mut self,
        element: ElementRef,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), GraphError> {
        let value = value.into();
        let kind = self.live(element)?.kind();
        let key = if kind.key_attribute() == Some(name) {
            Some(Id::parse(&value)?)
        } else {
            None
        };

        if self.live(element)?.slot(name).is_some_and(RefSlot::is_resolved) {
            self.clear_reference(element, name)?;
        }

        let doc = self.doc_mut(element.document)?;
        let before = registrations(doc, element.element);
        revoke_all(doc, &tagged(element.element, &before));

        let (old_key, old_value) = {
            let e = doc
                .element_mut(element.element)
                .ok_or(GraphError::UnknownElement(element))?;
            let old_key = e.key();
            if key.is_some() {
                e.set_key(key);
            }
            (old_key, e.set_attribute(name, AttrValue::Literal(value)))
        };

        let after = tagged(element.element, &registrations(doc, element.element));
        if let Err(err) = apply_all(doc, &after) {
            if let Some(e) = doc.element_mut(element.element) {
                e.set_key(old_key);
                match old_value {
                    Some(old) => {
                        e.set_attribute(name, old);
                    }
                    None => {
                        e.remove_attribute(name);
                    }
                }
            }
            // Restoring what was held before cannot collide.
            let _ = apply_all(doc, &tagged(element.element, &before));
            return Err(err);
        }

        self.emit(ModelEvent::AttributeChanged {
            element,
            attribute: name.to_string(),
        });
        Ok(())
    }

    /// Store an unresolved reference slot under `name`.
    ///
    /// A resolved slot previously stored under `name` is cleared first.
    pub fn declare_reference(
        &mut self,
        element: ElementRef,
        name: &str,
        raw: RefName,
    ) -> Result<(), GraphError> {
        if self.live(element)?.slot(name).is_some_and(RefSlot::is_resolved) {
            self.clear_reference(element, name)?;
        }
        self.live_mut(element)?
            .set_attribute(name, AttrValue::Reference(RefSlot::Unresolved(raw)));
        self.emit(ModelEvent::AttributeChanged {
            element,
            attribute: name.to_string(),
        });
        Ok(())
    }

    /// Make a detached element the root of its document.
    pub fn set_root(&mut self, element: ElementRef) -> Result<(), GraphError> {
        let doc = self.doc(element.document)?;
        if let Some(root) = doc.root() {
            return Err(GraphError::RootAlreadySet {
                document: element.document,
                root: ElementRef::new(element.document, root),
            });
        }
        if let Some(parent) = self.live(element)?.parent() {
            return Err(GraphError::AlreadyAttached {
                element,
                parent: ElementRef::new(element.document, parent),
            });
        }

        let doc = self.doc_mut(element.document)?;
        let before = subtree_registrations(doc, element.element);
        doc.set_root(Some(element.element));
        let added = difference(subtree_registrations(doc, element.element), &before);
        if let Err(err) = apply_all(doc, &added) {
            doc.set_root(None);
            return Err(err);
        }
        debug!(document = element.document.to_raw(), root = element.element.to_raw(); "Set document root");
        Ok(())
    }

    /// Attach `child` (with its subtree) under `parent`.
    ///
    /// # Errors
    ///
    /// - [`GraphError::AlreadyAttached`] if `child` already has a parent;
    /// - [`GraphError::WouldCycle`] if `parent` is `child` or one of its
    ///   descendants;
    /// - [`GraphError::DuplicateId`] / [`GraphError::DuplicateAlias`] if a key
    ///   or alias of the subtree collides in a scope it enters. The attach is
    ///   undone.
    pub fn attach(&mut self, child: ElementRef, parent: ElementRef) -> Result<(), GraphError> {
        if child.document != parent.document {
            return Err(GraphError::CrossDocument {
                element: child,
                parent,
            });
        }
        self.live(parent)?;
        if let Some(current) = self.live(child)?.parent() {
            return Err(GraphError::AlreadyAttached {
                element: child,
                parent: ElementRef::new(child.document, current),
            });
        }

        let doc = self.doc_mut(child.document)?;
        if doc.is_ancestor_or_self(child.element, parent.element) {
            return Err(GraphError::WouldCycle {
                element: child,
                parent,
            });
        }

        let before = subtree_registrations(doc, child.element);
        link(doc, child.element, parent.element);
        let added = difference(subtree_registrations(doc, child.element), &before);
        if let Err(err) = apply_all(doc, &added) {
            unlink(doc, child.element);
            return Err(err);
        }

        trace!(element:% = child, parent:% = parent; "Attached element");
        self.emit(ModelEvent::Attached {
            element: child,
            parent,
        });
        Ok(())
    }

    /// Detach `element` from its parent, returning the former parent.
    ///
    /// Keys and aliases of the subtree leave the scopes above it. Reference
    /// slots in the subtree are not touched.
    pub fn detach(&mut self, element: ElementRef) -> Result<Option<ElementRef>, GraphError> {
        let Some(parent) = self.live(element)?.parent() else {
            return Ok(None);
        };

        let doc = self.doc_mut(element.document)?;
        let before = subtree_registrations(doc, element.element);
        unlink(doc, element.element);
        let after = subtree_registrations(doc, element.element);
        revoke_all(doc, &difference(before, &after));

        let parent = ElementRef::new(element.document, parent);
        trace!(element:% = element, parent:% = parent; "Detached element");
        self.emit(ModelEvent::Detached { element, parent });
        Ok(Some(parent))
    }

    /// Bind the slot `attribute` of `referrer` to `target`.
    ///
    /// The slot keeps the spelling it was written with; a slot created here
    /// is spelled with the target's key. A previous target loses its
    /// back-edge.
    pub fn set_reference(
        &mut self,
        referrer: ElementRef,
        attribute: &str,
        target: ElementRef,
    ) -> Result<(), GraphError> {
        let target_element = self.live(target)?;
        let default_spelling = {
            let key = target_element.key().map(|key| key.to_string()).unwrap_or_default();
            let referrer_kind = self.live(referrer)?.kind();
            if target_element.kind() == ElementKind::ConnectorParam
                && referrer_kind.accepts_parameters()
            {
                RefName::Parameter(key)
            } else {
                RefName::Plain(key)
            }
        };

        let (previous, spelled) = match self.live(referrer)?.attribute(attribute) {
            Some(AttrValue::Reference(RefSlot::Resolved { target, spelled })) => {
                (Some(*target), spelled.clone())
            }
            Some(AttrValue::Reference(RefSlot::Unresolved(name))) => (None, name.clone()),
            Some(AttrValue::Literal(value)) => (None, RefName::parse(value)),
            None => (None, default_spelling),
        };

        if let Some(previous) = previous {
            self.remove_back_edge(previous, referrer);
            self.emit(ModelEvent::ReferenceCleared {
                referrer,
                attribute: attribute.to_string(),
                target: previous,
            });
        }

        self.live_mut(referrer)?.set_attribute(
            attribute,
            AttrValue::Reference(RefSlot::Resolved { target, spelled }),
        );
        self.live_mut(target)?.referrers_mut().push(referrer);

        self.emit(ModelEvent::ReferenceSet {
            referrer,
            attribute: attribute.to_string(),
            target,
        });
        Ok(())
    }

    /// Unbind the slot `attribute` of `referrer`, keeping its spelling.
    ///
    /// Returns the former target, or `None` if the slot was not resolved.
    pub fn clear_reference(
        &mut self,
        referrer: ElementRef,
        attribute: &str,
    ) -> Result<Option<ElementRef>, GraphError> {
        let Some(slot) = self.live_mut(referrer)?.slot_mut(attribute) else {
            return Ok(None);
        };
        let (target, spelled) = match slot {
            RefSlot::Resolved { target, spelled } => (*target, spelled.clone()),
            RefSlot::Unresolved(_) => return Ok(None),
        };
        *slot = RefSlot::Unresolved(spelled);

        self.remove_back_edge(target, referrer);
        self.emit(ModelEvent::ReferenceCleared {
            referrer,
            attribute: attribute.to_string(),
            target,
        });
        Ok(Some(target))
    }

    fn remove_back_edge(&mut self, target: ElementRef, referrer: ElementRef) {
        if let Some(target) = self.element_mut(target) {
            let referrers = target.referrers_mut();
            if let Some(pos) = referrers.iter().position(|r| *r == referrer) {
                referrers.remove(pos);
            }
        }
    }

    /// Remove `element` and its subtree.
    ///
    /// # Errors
    ///
    /// [`GraphError::HasReferences`] while any element of the subtree is
    /// referred to from outside it. Nothing is changed in that case.
    pub fn remove(&mut self, element: ElementRef) -> Result<(), GraphError> {
        self.live(element)?;
        let doc = self.doc(element.document)?;
        let subtree = doc.preorder(element.element);

        let inside =
            |r: &ElementRef| r.document == element.document && subtree.contains(&r.element);
        let inbound: Vec<ElementRef> = subtree
            .iter()
            .filter_map(|id| doc.element(*id))
            .flat_map(|e| e.referrers().iter().copied())
            .filter(|r| !inside(r))
            .collect();
        if !inbound.is_empty() {
            return Err(GraphError::HasReferences {
                element,
                referrers: inbound,
            });
        }

        let outgoing: Vec<(ElementRef, String)> = subtree
            .iter()
            .filter_map(|id| doc.element(*id).map(|e| (*id, e)))
            .flat_map(|(id, e)| {
                e.slots()
                    .filter(|(_, slot)| slot.is_resolved())
                    .map(move |(name, _)| (ElementRef::new(element.document, id), name.to_string()))
            })
            .collect();
        for (referrer, attribute) in outgoing {
            self.clear_reference(referrer, &attribute)?;
        }

        if self.detach(element)?.is_none() {
            let doc = self.doc_mut(element.document)?;
            if doc.root() == Some(element.element) {
                let before = subtree_registrations(doc, element.element);
                doc.set_root(None);
                let after = subtree_registrations(doc, element.element);
                revoke_all(doc, &difference(before, &after));
            }
        }

        let doc = self.doc_mut(element.document)?;
        for id in &subtree {
            doc.tombstone(*id);
        }

        debug!(element:% = element, count = subtree.len(); "Removed element");
        self.emit(ModelEvent::Removed { element });
        Ok(())
    }

    /// Remove documents created by a failed load.
    ///
    /// Back-edges, resolved slots and alias bindings that surviving documents
    /// hold into the removed ones are dropped as well.
    pub(crate) fn remove_documents(&mut self, doomed: &[DocumentId]) {
        for id in doomed {
            self.documents.shift_remove(id);
        }
        for doc in self.documents.values_mut() {
            doc.aliases_mut()
                .retain_documents(|document| !doomed.contains(&document));
            for element in doc.elements_mut() {
                element
                    .referrers_mut()
                    .retain(|referrer| !doomed.contains(&referrer.document));
                for slot in element.slots_mut() {
                    if let RefSlot::Resolved { target, spelled } = slot {
                        if doomed.contains(&target.document) {
                            *slot = RefSlot::Unresolved(spelled.clone());
                        }
                    }
                }
                element
                    .aliases_mut()
                    .retain_documents(|document| !doomed.contains(&document));
                if element
                    .imported()
                    .is_some_and(|document| doomed.contains(&document))
                {
                    element.set_imported(None);
                }
            }
        }
        if !doomed.is_empty() {
            debug!(count = doomed.len(); "Rolled back documents");
        }
    }
}

fn tagged(element: ElementId, regs: &[Registration]) -> Vec<(ElementId, Registration)> {
    regs.iter().cloned().map(|reg| (element, reg)).collect()
}

fn link(doc: &mut Document, child: ElementId, parent: ElementId) {
    if let Some(p) = doc.element_mut(parent) {
        p.children_mut().push(child);
    }
    if let Some(c) = doc.element_mut(child) {
        c.set_parent(Some(parent));
    }
}

fn unlink(doc: &mut Document, child: ElementId) {
    let Some(parent) = doc.element(child).and_then(Element::parent) else {
        return;
    };
    if let Some(p) = doc.element_mut(parent) {
        p.children_mut().retain(|c| *c != child);
    }
    if let Some(c) = doc.element_mut(child) {
        c.set_parent(None);
    }
}

#[cfg(test)]
mod tests {
    use weft_core::schema::BaseKind;

    use super::*;

    struct Fixture {
        ws: Workspace,
        doc: DocumentId,
        ncl: ElementRef,
    }

    impl Fixture {
        fn new() -> Self {
            let mut ws = Workspace::new();
            let doc = ws.create_document("mem://test.ncl", None);
            let ncl = ws.create_element(doc, ElementKind::Ncl).unwrap();
            ws.set_root(ncl).unwrap();
            Self { ws, doc, ncl }
        }

        fn add(&mut self, kind: ElementKind, key: Option<&str>, parent: ElementRef) -> ElementRef {
            let element = self.ws.create_element(self.doc, kind).unwrap();
            if let (Some(key), Some(attr)) = (key, kind.key_attribute()) {
                self.ws.set_literal(element, attr, key).unwrap();
            }
            self.ws.attach(element, parent).unwrap();
            element
        }

        fn table(&self, owner: ElementRef, namespace: Namespace) -> Vec<String> {
            self.ws
                .element(owner)
                .and_then(|e| e.table(namespace))
                .map(|t| t.iter().map(|(id, _)| id.to_string()).collect())
                .unwrap_or_default()
        }
    }

    #[test]
    fn test_attach_twice_fails_until_detached() {
        let mut f = Fixture::new();
        let body = f.add(ElementKind::Body, Some("body"), f.ncl);
        let ctx_a = f.add(ElementKind::Context, Some("a"), body);
        let ctx_b = f.add(ElementKind::Context, Some("b"), body);
        let media = f.add(ElementKind::Media, Some("m1"), ctx_a);

        let err = f.ws.attach(media, ctx_b).unwrap_err();
        assert_eq!(
            err,
            GraphError::AlreadyAttached {
                element: media,
                parent: ctx_a
            }
        );

        assert_eq!(f.ws.detach(media).unwrap(), Some(ctx_a));
        f.ws.attach(media, ctx_b).unwrap();
        assert_eq!(f.table(ctx_a, Namespace::Nodes), Vec::<String>::new());
        assert_eq!(f.table(ctx_b, Namespace::Nodes), vec!["m1"]);
    }

    #[test]
    fn test_would_cycle() {
        let mut f = Fixture::new();
        let body = f.add(ElementKind::Body, None, f.ncl);
        let ctx = f.add(ElementKind::Context, Some("c"), body);
        let inner = f.add(ElementKind::Context, Some("inner"), ctx);

        f.ws.detach(ctx).unwrap();
        let err = f.ws.attach(ctx, inner).unwrap_err();
        assert!(matches!(err, GraphError::WouldCycle { .. }));
        let err = f.ws.attach(ctx, ctx).unwrap_err();
        assert!(matches!(err, GraphError::WouldCycle { .. }));
    }

    #[test]
    fn test_duplicate_node_id_is_rolled_back() {
        let mut f = Fixture::new();
        let body = f.add(ElementKind::Body, None, f.ncl);
        let ctx = f.add(ElementKind::Context, Some("c"), body);
        f.add(ElementKind::Media, Some("m1"), body);

        let dup = f.ws.create_element(f.doc, ElementKind::Media).unwrap();
        f.ws.set_literal(dup, "id", "m1").unwrap();
        let err = f.ws.attach(dup, ctx).unwrap_err();

        assert!(matches!(err, GraphError::DuplicateId { namespace: Namespace::Nodes, .. }));
        assert_eq!(f.ws.element(dup).unwrap().parent(), None);
        assert!(f.ws.element(ctx).unwrap().children().is_empty());
        assert!(f.table(ctx, Namespace::Nodes).is_empty());
    }

    #[test]
    fn test_definitions_register_in_nearest_base() {
        let mut f = Fixture::new();
        let head = f.add(ElementKind::Head, None, f.ncl);
        let base = f.add(ElementKind::RuleBase, None, head);
        let composite = f.add(ElementKind::CompositeRule, Some("cr"), base);
        f.add(ElementKind::Rule, Some("r1"), composite);
        f.add(ElementKind::Rule, Some("r2"), composite);

        assert_eq!(f.table(base, Namespace::Definitions), vec!["cr", "r1", "r2"]);

        let dup = f.ws.create_element(f.doc, ElementKind::Rule).unwrap();
        f.ws.set_literal(dup, "id", "r1").unwrap();
        assert!(matches!(
            f.ws.attach(dup, base),
            Err(GraphError::DuplicateId { .. })
        ));
    }

    #[test]
    fn test_detached_subtree_keeps_inner_tables() {
        let mut f = Fixture::new();
        let head = f.add(ElementKind::Head, None, f.ncl);
        let base = f.add(ElementKind::ConnectorBase, None, head);
        let connector = f.add(ElementKind::CausalConnector, Some("onBeginStart"), base);
        f.add(ElementKind::SimpleCondition, Some("onBegin"), connector);
        f.add(ElementKind::ConnectorParam, Some("delay"), connector);

        f.ws.detach(connector).unwrap();

        assert!(f.table(base, Namespace::Definitions).is_empty());
        assert_eq!(f.table(connector, Namespace::Roles), vec!["onBegin"]);
        assert_eq!(f.table(connector, Namespace::Parameters), vec!["delay"]);
    }

    #[test]
    fn test_node_index_follows_connectivity() {
        let mut f = Fixture::new();
        let body = f.add(ElementKind::Body, None, f.ncl);
        let ctx = f.add(ElementKind::Context, Some("c"), body);
        f.add(ElementKind::Media, Some("m1"), ctx);

        let index = |f: &Fixture| -> Vec<String> {
            f.ws.document(f.doc)
                .unwrap()
                .node_index()
                .iter()
                .map(|(id, _)| id.to_string())
                .collect()
        };
        assert_eq!(index(&f), vec!["c", "m1"]);

        f.ws.detach(ctx).unwrap();
        assert!(index(&f).is_empty());

        f.ws.attach(ctx, body).unwrap();
        assert_eq!(index(&f), vec!["c", "m1"]);
    }

    #[test]
    fn test_set_key_moves_entry() {
        let mut f = Fixture::new();
        let head = f.add(ElementKind::Head, None, f.ncl);
        let base = f.add(ElementKind::RegionBase, None, head);
        let region = f.add(ElementKind::Region, Some("left"), base);
        f.add(ElementKind::Region, Some("right"), base);

        f.ws.set_literal(region, "id", "center").unwrap();
        assert_eq!(f.table(base, Namespace::Definitions), vec!["right", "center"]);

        let err = f.ws.set_literal(region, "id", "right").unwrap_err();
        assert!(matches!(err, GraphError::DuplicateId { .. }));
        assert_eq!(f.ws.element(region).unwrap().literal("id"), Some("center"));
        assert_eq!(f.table(base, Namespace::Definitions), vec!["right", "center"]);

        assert!(matches!(
            f.ws.set_literal(region, "id", "9bad"),
            Err(GraphError::InvalidId(_))
        ));
    }

    #[test]
    fn test_reference_back_edges_balance() {
        let mut f = Fixture::new();
        let head = f.add(ElementKind::Head, None, f.ncl);
        let base = f.add(ElementKind::DescriptorBase, None, head);
        let d1 = f.add(ElementKind::Descriptor, Some("d1"), base);
        let d2 = f.add(ElementKind::Descriptor, Some("d2"), base);
        let body = f.add(ElementKind::Body, None, f.ncl);
        let media = f.add(ElementKind::Media, Some("m"), body);

        f.ws.set_reference(media, "descriptor", d1).unwrap();
        assert_eq!(f.ws.element(d1).unwrap().referrers(), &[media]);

        f.ws.set_reference(media, "descriptor", d2).unwrap();
        assert!(f.ws.element(d1).unwrap().referrers().is_empty());
        assert_eq!(f.ws.element(d2).unwrap().referrers(), &[media]);

        let slot = f.ws.element(media).unwrap().slot("descriptor").unwrap().clone();
        assert_eq!(slot.spelled().to_string(), "d1");

        assert_eq!(f.ws.clear_reference(media, "descriptor").unwrap(), Some(d2));
        assert!(f.ws.element(d2).unwrap().referrers().is_empty());
        assert_eq!(f.ws.clear_reference(media, "descriptor").unwrap(), None);
    }

    #[test]
    fn test_same_referrer_twice_is_listed_twice() {
        let mut f = Fixture::new();
        let body = f.add(ElementKind::Body, None, f.ncl);
        let media = f.add(ElementKind::Media, Some("m"), body);
        let port = f.add(ElementKind::Port, Some("p"), body);

        f.ws.set_reference(port, "component", media).unwrap();
        f.ws.set_reference(port, "other", media).unwrap();
        assert_eq!(f.ws.element(media).unwrap().referrers(), &[port, port]);

        f.ws.clear_reference(port, "other").unwrap();
        assert_eq!(f.ws.element(media).unwrap().referrers(), &[port]);
    }

    #[test]
    fn test_removal_guard() {
        let mut f = Fixture::new();
        let head = f.add(ElementKind::Head, None, f.ncl);
        let base = f.add(ElementKind::RuleBase, None, head);
        let rule = f.add(ElementKind::Rule, Some("r1"), base);
        let body = f.add(ElementKind::Body, None, f.ncl);
        let switch = f.add(ElementKind::Switch, Some("sw"), body);
        let bind_rule = f.add(ElementKind::BindRule, None, switch);
        f.ws.set_reference(bind_rule, "rule", rule).unwrap();

        let err = f.ws.remove(rule).unwrap_err();
        assert_eq!(
            err,
            GraphError::HasReferences {
                element: rule,
                referrers: vec![bind_rule]
            }
        );
        assert!(f.ws.element(rule).is_some());

        f.ws.clear_reference(bind_rule, "rule").unwrap();
        f.ws.remove(rule).unwrap();
        assert!(f.ws.element(rule).is_none());
        assert!(f.table(base, Namespace::Definitions).is_empty());
    }

    #[test]
    fn test_removal_guard_across_documents() {
        let mut f = Fixture::new();
        let head = f.add(ElementKind::Head, None, f.ncl);
        let base = f.add(ElementKind::RuleBase, None, head);
        let rule = f.add(ElementKind::Rule, Some("r1"), base);

        let other = f.ws.create_document("mem://main.ncl", None);
        let ncl = f.ws.create_element(other, ElementKind::Ncl).unwrap();
        f.ws.set_root(ncl).unwrap();
        let body = f.ws.create_element(other, ElementKind::Body).unwrap();
        f.ws.attach(body, ncl).unwrap();
        let switch = f.ws.create_element(other, ElementKind::Switch).unwrap();
        f.ws.attach(switch, body).unwrap();
        let bind_rule = f.ws.create_element(other, ElementKind::BindRule).unwrap();
        f.ws.attach(bind_rule, switch).unwrap();
        f.ws.set_reference(bind_rule, "rule", rule).unwrap();

        let err = f.ws.remove(base).unwrap_err();
        assert_eq!(
            err,
            GraphError::HasReferences {
                element: base,
                referrers: vec![bind_rule]
            }
        );
        assert!(f.ws.element(rule).is_some());

        f.ws.remove(switch).unwrap();
        assert!(f.ws.element(rule).unwrap().referrers().is_empty());
        f.ws.remove(base).unwrap();
        assert!(f.ws.element(rule).is_none());
    }

    #[test]
    fn test_remove_subtree_clears_outgoing_edges() {
        let mut f = Fixture::new();
        let head = f.add(ElementKind::Head, None, f.ncl);
        let base = f.add(ElementKind::RuleBase, None, head);
        let rule = f.add(ElementKind::Rule, Some("r1"), base);
        let body = f.add(ElementKind::Body, None, f.ncl);
        let switch = f.add(ElementKind::Switch, Some("sw"), body);
        let media = f.add(ElementKind::Media, Some("m"), switch);
        let bind_rule = f.add(ElementKind::BindRule, None, switch);
        f.ws.set_reference(bind_rule, "rule", rule).unwrap();
        f.ws.set_reference(bind_rule, "constituent", media).unwrap();

        f.ws.remove(switch).unwrap();

        assert!(f.ws.element(rule).unwrap().referrers().is_empty());
        assert!(f.ws.element(media).is_none());
        assert!(f.ws.document(f.doc).unwrap().node_index().is_empty());
    }

    #[test]
    fn test_import_alias_registration() {
        let mut f = Fixture::new();
        let other = f.ws.create_document("mem://other.ncl", None);
        let head = f.add(ElementKind::Head, None, f.ncl);
        let base = f.add(ElementKind::RuleBase, None, head);

        let import = f.ws.create_element(f.doc, ElementKind::ImportBase).unwrap();
        f.ws.set_literal(import, "alias", "b").unwrap();
        f.ws.set_imported(import, Some(other)).unwrap();
        f.ws.attach(import, base).unwrap();
        assert_eq!(f.ws.element(base).unwrap().aliases().resolve("b"), Some(other));

        let second = f.ws.create_element(f.doc, ElementKind::ImportBase).unwrap();
        f.ws.set_literal(second, "alias", "b").unwrap();
        f.ws.set_imported(second, Some(other)).unwrap();
        assert!(matches!(
            f.ws.attach(second, base),
            Err(GraphError::DuplicateAlias { .. })
        ));

        f.ws.detach(import).unwrap();
        assert!(f.ws.element(base).unwrap().aliases().is_empty());
        assert!(f.ws.document(f.doc).unwrap().bases(BaseKind::Rule).contains(&base.element));
    }

    #[test]
    fn test_events_in_order() {
        let mut f = Fixture::new();
        let events = f.ws.subscribe();
        let body = f.add(ElementKind::Body, None, f.ncl);
        let media = f.add(ElementKind::Media, Some("m"), body);
        f.ws.remove(media).unwrap();

        let seen: Vec<ModelEvent> = events.try_iter().collect();
        assert_eq!(
            seen,
            vec![
                ModelEvent::Attached {
                    element: body,
                    parent: f.ncl,
                },
                ModelEvent::AttributeChanged {
                    element: media,
                    attribute: "id".into(),
                },
                ModelEvent::Attached {
                    element: media,
                    parent: body,
                },
                ModelEvent::Detached {
                    element: media,
                    parent: body,
                },
                ModelEvent::Removed { element: media },
            ]
        );
    }
}
