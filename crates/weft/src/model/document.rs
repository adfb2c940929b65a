//! A document: an element arena with its document-level tables.

use weft_core::schema::{BaseKind, ElementKind};

use crate::{
    alias::AliasTable,
    model::{DocumentId, Element, ElementId, Named},
    symbols::SymbolTable,
};

/// One loaded (or programmatically created) document.
///
/// Removed elements leave a tombstone in the arena, so an [`ElementId`] is
/// never reused for a different element.
#[derive(Debug, Clone)]
pub struct Document {
    id: DocumentId,
    uri: String,
    source: Option<String>,
    elements: Vec<Option<Element>>,
    root: Option<ElementId>,
    nodes: SymbolTable,
    aliases: AliasTable,
}

impl Document {
    pub(crate) fn new(id: DocumentId, uri: String, source: Option<String>) -> Self {
        Self {
            id,
            uri,
            source,
            elements: Vec::new(),
            root: None,
            nodes: SymbolTable::new(),
            aliases: AliasTable::new(),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// The canonical URI the document was loaded from.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The source text, when the document was read from text.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// The `ncl` element, once attached.
    pub fn root(&self) -> Option<ElementId> {
        self.root
    }

    /// The document-wide index of nodes connected to the root.
    pub fn node_index(&self) -> &SymbolTable {
        &self.nodes
    }

    /// Aliases declared by `importNCL` elements.
    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// `None` for a removed element.
    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.index()).and_then(Option::as_ref)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.element(id).is_some()
    }

    /// Live elements in creation order.
    pub fn elements(&self) -> impl Iterator<Item = (ElementId, &Element)> + '_ {
        self.elements.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref()
                .map(|element| (ElementId::from_raw(index as u32), element))
        })
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.elements.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Strict ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        std::iter::successors(self.element(id).and_then(Element::parent), move |current| {
            self.element(*current).and_then(Element::parent)
        })
    }

    /// Returns `true` if `ancestor` is `id` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: ElementId, id: ElementId) -> bool {
        ancestor == id || self.ancestors(id).any(|current| current == ancestor)
    }

    /// Returns `true` if `id` is the root or hangs below it.
    pub fn is_connected(&self, id: ElementId) -> bool {
        self.root
            .is_some_and(|root| self.is_ancestor_or_self(root, id))
    }

    /// `from` and all its descendants, in document order.
    pub fn preorder(&self, from: ElementId) -> Vec<ElementId> {
        let mut order = Vec::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            let Some(element) = self.element(current) else {
                continue;
            };
            order.push(current);
            stack.extend(element.children().iter().rev().copied());
        }
        order
    }

    /// Bases of `kind` connected to the root, in document order.
    pub fn bases(&self, kind: BaseKind) -> Vec<ElementId> {
        let Some(root) = self.root else {
            return Vec::new();
        };
        let base = kind.base_element();
        self.preorder(root)
            .into_iter()
            .filter(|id| self.element(*id).is_some_and(|e| e.kind() == base))
            .collect()
    }

    /// The nearest strict ancestor of `id` whose kind satisfies `matches`.
    pub fn nearest_ancestor(
        &self,
        id: ElementId,
        matches: impl Fn(ElementKind) -> bool,
    ) -> Option<ElementId> {
        self.ancestors(id)
            .find(|ancestor| self.element(*ancestor).is_some_and(|e| matches(e.kind())))
    }

    pub(crate) fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub(crate) fn push(&mut self, element: Element) -> ElementId {
        let id = ElementId::from_raw(self.elements.len() as u32);
        self.elements.push(Some(element));
        id
    }

    pub(crate) fn tombstone(&mut self, id: ElementId) -> Option<Element> {
        self.elements.get_mut(id.index()).and_then(Option::take)
    }

    pub(crate) fn set_root(&mut self, root: Option<ElementId>) {
        self.root = root;
    }

    pub(crate) fn node_index_mut(&mut self) -> &mut SymbolTable {
        &mut self.nodes
    }

    pub(crate) fn aliases_mut(&mut self) -> &mut AliasTable {
        &mut self.aliases
    }

    pub(crate) fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> + '_ {
        self.elements.iter_mut().filter_map(Option::as_mut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (Document, [ElementId; 4]) {
        let mut doc = Document::new(DocumentId::from_raw(0), "mem://a.ncl".into(), None);
        let ncl = doc.push(Element::new(ElementKind::Ncl));
        let head = doc.push(Element::new(ElementKind::Head));
        let base = doc.push(Element::new(ElementKind::RuleBase));
        let rule = doc.push(Element::new(ElementKind::Rule));

        for (child, parent) in [(head, ncl), (base, head), (rule, base)] {
            doc.element_mut(child).unwrap().set_parent(Some(parent));
            doc.element_mut(parent).unwrap().children_mut().push(child);
        }
        doc.set_root(Some(ncl));
        (doc, [ncl, head, base, rule])
    }

    #[test]
    fn test_ancestors_and_connectivity() {
        let (doc, [ncl, head, base, rule]) = tree();

        let ancestors: Vec<ElementId> = doc.ancestors(rule).collect();
        assert_eq!(ancestors, vec![base, head, ncl]);
        assert!(doc.is_connected(rule));
        assert!(doc.is_ancestor_or_self(head, rule));
        assert!(!doc.is_ancestor_or_self(rule, head));
    }

    #[test]
    fn test_preorder_and_bases() {
        let (doc, [ncl, head, base, rule]) = tree();

        assert_eq!(doc.preorder(ncl), vec![ncl, head, base, rule]);
        assert_eq!(doc.bases(BaseKind::Rule), vec![base]);
        assert!(doc.bases(BaseKind::Connector).is_empty());
        assert_eq!(
            doc.nearest_ancestor(rule, |kind| kind.as_base().is_some()),
            Some(base)
        );
    }

    #[test]
    fn test_tombstones_are_not_reused() {
        let (mut doc, [_, _, _, rule]) = tree();

        assert!(doc.tombstone(rule).is_some());
        assert!(!doc.contains(rule));
        let fresh = doc.push(Element::new(ElementKind::Rule));
        assert_ne!(fresh, rule);
        assert_eq!(doc.len(), 4);
    }
}
