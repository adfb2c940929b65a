//! Elements, attribute values and reference slots.

use indexmap::IndexMap;

use weft_core::{identifier::Id, reference::RefName, schema::ElementKind};
use weft_parser::{Span, error::Diagnostic};

use crate::{
    alias::AliasTable,
    model::{DocumentId, ElementId, ElementRef},
    symbols::{Namespace, SymbolTable},
};

/// A reference attribute's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefSlot {
    /// The name as written, not yet bound to an element.
    Unresolved(RefName),
    /// Bound to `target`; `spelled` is how the name was written.
    Resolved { target: ElementRef, spelled: RefName },
}

impl RefSlot {
    /// The bound element, if resolved.
    pub fn target(&self) -> Option<ElementRef> {
        match self {
            RefSlot::Resolved { target, .. } => Some(*target),
            RefSlot::Unresolved(_) => None,
        }
    }

    /// The name as written in the source.
    pub fn spelled(&self) -> &RefName {
        match self {
            RefSlot::Unresolved(name) | RefSlot::Resolved { spelled: name, .. } => name,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, RefSlot::Resolved { .. })
    }
}

/// An attribute value: an opaque literal or a reference slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Literal(String),
    Reference(RefSlot),
}

impl AttrValue {
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            AttrValue::Literal(value) => Some(value),
            AttrValue::Reference(_) => None,
        }
    }

    pub fn as_slot(&self) -> Option<&RefSlot> {
        match self {
            AttrValue::Reference(slot) => Some(slot),
            AttrValue::Literal(_) => None,
        }
    }
}

/// An element that can be indexed under a key.
pub trait Named {
    fn kind(&self) -> ElementKind;
    fn key(&self) -> Option<Id>;
}

/// An element that other elements can refer to.
pub trait ReferenceTarget {
    /// Every current referrer, once per referring slot.
    fn referrers(&self) -> &[ElementRef];

    fn is_referenced(&self) -> bool {
        !self.referrers().is_empty()
    }
}

/// A node of the element graph.
#[derive(Debug, Clone)]
pub struct Element {
    kind: ElementKind,
    key: Option<Id>,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    attributes: IndexMap<String, AttrValue>,
    referrers: Vec<ElementRef>,
    tables: IndexMap<Namespace, SymbolTable>,
    aliases: AliasTable,
    imported: Option<DocumentId>,
    diagnostics: Vec<Diagnostic>,
    span: Option<Span>,
}

impl Element {
    pub(crate) fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            key: None,
            parent: None,
            children: Vec::new(),
            attributes: IndexMap::new(),
            referrers: Vec::new(),
            tables: IndexMap::new(),
            aliases: AliasTable::new(),
            imported: None,
            diagnostics: Vec::new(),
            span: None,
        }
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    /// Children in document order.
    pub fn children(&self) -> &[ElementId] {
        &self.children
    }

    /// Attributes in source order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttrValue)> + '_ {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    /// The value of a literal attribute.
    pub fn literal(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(AttrValue::as_literal)
    }

    /// The reference slot stored under `name`.
    pub fn slot(&self, name: &str) -> Option<&RefSlot> {
        self.attributes.get(name).and_then(AttrValue::as_slot)
    }

    /// Reference slots in source order.
    pub fn slots(&self) -> impl Iterator<Item = (&str, &RefSlot)> + '_ {
        self.attributes
            .iter()
            .filter_map(|(name, value)| value.as_slot().map(|slot| (name.as_str(), slot)))
    }

    /// The table this element owns in `namespace`, if any entry was ever added.
    pub fn table(&self, namespace: Namespace) -> Option<&SymbolTable> {
        self.tables.get(&namespace)
    }

    /// Aliases declared by `importBase` children of this base.
    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// The document loaded for an import element.
    pub fn imported(&self) -> Option<DocumentId> {
        self.imported
    }

    /// Errors and warnings attached to this element.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn span(&self) -> Option<Span> {
        self.span
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ElementId>) {
        self.parent = parent;
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<ElementId> {
        &mut self.children
    }

    pub(crate) fn set_key(&mut self, key: Option<Id>) {
        self.key = key;
    }

    pub(crate) fn set_attribute(
        &mut self,
        name: impl Into<String>,
        value: AttrValue,
    ) -> Option<AttrValue> {
        self.attributes.insert(name.into(), value)
    }

    pub(crate) fn remove_attribute(&mut self, name: &str) -> Option<AttrValue> {
        self.attributes.shift_remove(name)
    }

    pub(crate) fn slot_mut(&mut self, name: &str) -> Option<&mut RefSlot> {
        match self.attributes.get_mut(name) {
            Some(AttrValue::Reference(slot)) => Some(slot),
            _ => None,
        }
    }

    pub(crate) fn slots_mut(&mut self) -> impl Iterator<Item = &mut RefSlot> + '_ {
        self.attributes.values_mut().filter_map(|value| match value {
            AttrValue::Reference(slot) => Some(slot),
            AttrValue::Literal(_) => None,
        })
    }

    pub(crate) fn referrers_mut(&mut self) -> &mut Vec<ElementRef> {
        &mut self.referrers
    }

    pub(crate) fn table_mut(&mut self, namespace: Namespace) -> &mut SymbolTable {
        self.tables.entry(namespace).or_default()
    }

    pub(crate) fn aliases_mut(&mut self) -> &mut AliasTable {
        &mut self.aliases
    }

    pub(crate) fn set_imported(&mut self, document: Option<DocumentId>) {
        self.imported = document;
    }

    pub(crate) fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn retain_diagnostics(&mut self, keep: impl FnMut(&Diagnostic) -> bool) {
        self.diagnostics.retain(keep);
    }

    pub(crate) fn set_span(&mut self, span: Option<Span>) {
        self.span = span;
    }
}

impl Named for Element {
    fn kind(&self) -> ElementKind {
        self.kind
    }

    fn key(&self) -> Option<Id> {
        self.key
    }
}

impl ReferenceTarget for Element {
    fn referrers(&self) -> &[ElementRef] {
        &self.referrers
    }
}
