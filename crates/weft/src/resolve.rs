//! Scope-aware name lookup.
//!
//! The [`Resolver`] answers one question: given the element holding a
//! reference slot, the kind of element the slot expects, and the name as
//! written, which element does the name denote right now? It never fails;
//! a name that cannot be bound yet is reported as
//! [`Resolution::NotYetAvailable`] and one that can never be bound where it
//! stands as [`Resolution::NoSuchScope`].

use std::{collections::HashSet, fmt};

use log::trace;

use weft_core::{
    identifier::Id,
    reference::{RefName, Separator},
    schema::{BaseKind, ElementKind, RefKind},
};

use crate::{
    model::{Document, DocumentId, Element, ElementRef, Named, RefSlot, Workspace},
    symbols::Namespace,
};

/// The scope a reference needed but could not find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingScope {
    /// No alias table in scope binds this alias.
    Alias(String),
    /// The document has no base of this kind.
    Base(BaseKind),
    /// The referrer is not inside a composite node.
    Composite,
    /// The sibling `component` slot is not resolved.
    Component,
    /// The referrer is not inside a link.
    Link,
    /// No connector is available: no enclosing connector, or the link's
    /// `xconnector` is not resolved.
    Connector,
    /// A `bindRule` outside a switch or descriptor switch.
    Switch,
}

impl fmt::Display for MissingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingScope::Alias(alias) => write!(f, "alias `{alias}` is not bound in scope"),
            MissingScope::Base(kind) => write!(f, "the document has no {kind} base"),
            MissingScope::Composite => write!(f, "not inside a composite node"),
            MissingScope::Component => write!(f, "the `component` reference is not resolved"),
            MissingScope::Link => write!(f, "not inside a link"),
            MissingScope::Connector => write!(f, "no connector is available"),
            MissingScope::Switch => write!(f, "not inside a switch"),
        }
    }
}

/// Outcome of a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ElementRef),
    /// The scope exists but holds no element under this name yet.
    NotYetAvailable,
    NoSuchScope(MissingScope),
}

impl Resolution {
    pub fn target(&self) -> Option<ElementRef> {
        match self {
            Resolution::Resolved(target) => Some(*target),
            _ => None,
        }
    }
}

/// Resolves reference names against a workspace.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    workspace: &'a Workspace,
}

impl<'a> Resolver<'a> {
    /// A resolver over the current state of `workspace`.
    pub fn new(workspace: &'a Workspace) -> Self {
        Self { workspace }
    }

    /// Look up `raw` as a `kind` reference held by `referrer`.
    pub fn resolve(&self, referrer: ElementRef, kind: RefKind, raw: &RefName) -> Resolution {
        let Some(doc) = self.workspace.document(referrer.document) else {
            return Resolution::NotYetAvailable;
        };

        let resolution = match raw {
            RefName::Qualified {
                alias,
                separator: Separator::Hash,
                name,
            } => match self.bound_alias(doc, kind, alias) {
                Some(target) => self.lookup_imported(target, kind, name),
                None => Resolution::NoSuchScope(MissingScope::Alias(alias.clone())),
            },
            RefName::Qualified {
                alias,
                separator: Separator::Dot,
                name,
            } => match self.bound_alias(doc, kind, alias) {
                Some(target) => self.lookup_imported(target, kind, name),
                None => self.lookup_local(doc, referrer, kind, &format!("{alias}.{name}")),
            },
            RefName::Plain(name) => match raw
                .dotted()
                .and_then(|(alias, rest)| Some((self.bound_alias(doc, kind, alias)?, rest)))
            {
                Some((target, rest)) => self.lookup_imported(target, kind, rest),
                None => self.lookup_local(doc, referrer, kind, name),
            },
            RefName::Parameter(name) => self.lookup_local(doc, referrer, kind, name),
        };

        trace!(referrer:% = referrer, raw:% = raw, kind:% = kind, resolution:? = resolution; "Resolved reference");
        resolution
    }

    /// The document bound to `alias` in a table visible to a `kind` reference.
    ///
    /// Base tables of the expected kind come first, then the document table.
    fn bound_alias(&self, doc: &Document, kind: RefKind, alias: &str) -> Option<DocumentId> {
        let from_bases = match kind {
            RefKind::Definition(base) => doc.bases(base).into_iter().find_map(|id| {
                doc.element(id)
                    .and_then(|element| element.aliases().resolve(alias))
            }),
            _ => None,
        };
        from_bases.or_else(|| match kind {
            RefKind::Definition(_) | RefKind::Node | RefKind::ReusedNode => {
                doc.aliases().resolve(alias)
            }
            _ => None,
        })
    }

    fn lookup_imported(&self, target: DocumentId, kind: RefKind, name: &str) -> Resolution {
        let Ok(id) = Id::parse(name) else {
            return Resolution::NotYetAvailable;
        };
        let found = match kind {
            RefKind::Definition(base) => {
                let mut visited = HashSet::new();
                self.definition_in(target, base, id, &mut visited)
            }
            RefKind::Node | RefKind::ReusedNode => self
                .workspace
                .document(target)
                .and_then(|doc| doc.node_index().lookup(id))
                .map(|element| ElementRef::new(target, element)),
            _ => None,
        };
        found.map_or(Resolution::NotYetAvailable, Resolution::Resolved)
    }

    /// Search the bases of `document`, then what those bases import.
    fn definition_in(
        &self,
        document: DocumentId,
        base: BaseKind,
        id: Id,
        visited: &mut HashSet<DocumentId>,
    ) -> Option<ElementRef> {
        if !visited.insert(document) {
            return None;
        }
        let doc = self.workspace.document(document)?;
        let bases = doc.bases(base);

        let local = bases.iter().find_map(|base| {
            doc.element(*base)
                .and_then(|element| element.table(Namespace::Definitions))
                .and_then(|table| table.lookup(id))
        });
        if let Some(element) = local {
            return Some(ElementRef::new(document, element));
        }

        let imported: Vec<DocumentId> = bases
            .iter()
            .filter_map(|base| doc.element(*base))
            .flat_map(|element| element.aliases().documents())
            .collect();
        imported
            .into_iter()
            .find_map(|next| self.definition_in(next, base, id, visited))
    }

    fn lookup_local(
        &self,
        doc: &Document,
        referrer: ElementRef,
        kind: RefKind,
        name: &str,
    ) -> Resolution {
        let Ok(id) = Id::parse(name) else {
            return Resolution::NotYetAvailable;
        };
        match kind {
            RefKind::Definition(base) => self.local_definition(doc, base, id),
            RefKind::Node => self.local_node(doc, referrer, id),
            RefKind::ReusedNode => found(doc, doc.node_index().lookup(id)),
            RefKind::Interface => self.local_interface(doc, referrer, id),
            RefKind::Role => self.through_link(doc, referrer, Namespace::Roles, id),
            RefKind::Parameter => self.local_parameter(doc, referrer, id),
            RefKind::Constituent => local_constituent(doc, referrer, id),
        }
    }

    fn local_definition(&self, doc: &Document, base: BaseKind, id: Id) -> Resolution {
        let bases = doc.bases(base);
        if bases.is_empty() {
            return Resolution::NoSuchScope(MissingScope::Base(base));
        }
        let element = bases.iter().find_map(|base| {
            doc.element(*base)
                .and_then(|element| element.table(Namespace::Definitions))
                .and_then(|table| table.lookup(id))
        });
        found(doc, element)
    }

    fn local_node(&self, doc: &Document, referrer: ElementRef, id: Id) -> Resolution {
        let composites: Vec<_> = doc
            .ancestors(referrer.element)
            .filter(|ancestor| {
                doc.element(*ancestor)
                    .is_some_and(|element| element.kind().is_composite())
            })
            .collect();
        if composites.is_empty() {
            return Resolution::NoSuchScope(MissingScope::Composite);
        }

        let element = composites.into_iter().find_map(|composite| {
            let element = doc.element(composite)?;
            if element.key() == Some(id) {
                return Some(composite);
            }
            element
                .table(Namespace::Nodes)
                .and_then(|table| table.lookup(id))
        });
        found(doc, element)
    }

    fn local_interface(&self, doc: &Document, referrer: ElementRef, id: Id) -> Resolution {
        let Some(element) = doc.element(referrer.element) else {
            return Resolution::NotYetAvailable;
        };
        let owner = match element.slot("component") {
            Some(RefSlot::Resolved { target, .. }) => *target,
            Some(RefSlot::Unresolved(_)) => {
                return Resolution::NoSuchScope(MissingScope::Component);
            }
            None => match element.parent() {
                Some(parent) => ElementRef::new(referrer.document, parent),
                None => return Resolution::NoSuchScope(MissingScope::Component),
            },
        };
        self.in_table(owner, Namespace::Interfaces, id)
    }

    fn local_parameter(&self, doc: &Document, referrer: ElementRef, id: Id) -> Resolution {
        let kind = doc.element(referrer.element).map(Element::kind);
        if matches!(kind, Some(ElementKind::LinkParam | ElementKind::BindParam)) {
            return self.through_link(doc, referrer, Namespace::Parameters, id);
        }
        match doc.nearest_ancestor(referrer.element, ElementKind::is_connector) {
            Some(connector) => {
                self.in_table(
                    ElementRef::new(referrer.document, connector),
                    Namespace::Parameters,
                    id,
                )
            }
            None => Resolution::NoSuchScope(MissingScope::Connector),
        }
    }

    /// Look up `id` in the `namespace` table of the connector used by the
    /// link enclosing `referrer`.
    fn through_link(
        &self,
        doc: &Document,
        referrer: ElementRef,
        namespace: Namespace,
        id: Id,
    ) -> Resolution {
        let Some(link) = doc.nearest_ancestor(referrer.element, |kind| kind == ElementKind::Link)
        else {
            return Resolution::NoSuchScope(MissingScope::Link);
        };
        let connector = doc
            .element(link)
            .and_then(|link| link.slot("xconnector"))
            .and_then(RefSlot::target);
        match connector {
            Some(connector) => self.in_table(connector, namespace, id),
            None => Resolution::NoSuchScope(MissingScope::Connector),
        }
    }

    fn in_table(&self, owner: ElementRef, namespace: Namespace, id: Id) -> Resolution {
        self.workspace
            .element(owner)
            .and_then(|element| element.table(namespace))
            .and_then(|table| table.lookup(id))
            .map_or(Resolution::NotYetAvailable, |element| {
                Resolution::Resolved(ElementRef::new(owner.document, element))
            })
    }
}

fn found(doc: &Document, element: Option<crate::model::ElementId>) -> Resolution {
    element.map_or(Resolution::NotYetAvailable, |element| {
        Resolution::Resolved(ElementRef::new(doc.id(), element))
    })
}

/// A switch's constituents are its nodes; a descriptor switch's are its
/// descriptors.
fn local_constituent(doc: &Document, referrer: ElementRef, id: Id) -> Resolution {
    let Some(parent) = doc
        .element(referrer.element)
        .and_then(Element::parent)
        .and_then(|parent| doc.element(parent))
    else {
        return Resolution::NoSuchScope(MissingScope::Switch);
    };
    let accepts: fn(ElementKind) -> bool = match parent.kind() {
        ElementKind::Switch => ElementKind::is_node,
        ElementKind::DescriptorSwitch => |kind| kind == ElementKind::Descriptor,
        _ => return Resolution::NoSuchScope(MissingScope::Switch),
    };
    let element = parent.children().iter().copied().find(|child| {
        doc.element(*child)
            .is_some_and(|element| accepts(element.kind()) && element.key() == Some(id))
    });
    found(doc, element)
}

#[cfg(test)]
mod tests {
    use weft_core::schema::ElementKind as K;

    use super::*;
    use crate::model::DocumentId;

    struct Doc<'a> {
        ws: &'a mut Workspace,
        id: DocumentId,
    }

    impl Doc<'_> {
        fn add(&mut self, kind: K, key: Option<&str>, parent: Option<ElementRef>) -> ElementRef {
            let element = self.ws.create_element(self.id, kind).unwrap();
            if let (Some(key), Some(attr)) = (key, kind.key_attribute()) {
                self.ws.set_literal(element, attr, key).unwrap();
            }
            match parent {
                Some(parent) => self.ws.attach(element, parent).unwrap(),
                None => self.ws.set_root(element).unwrap(),
            }
            element
        }
    }

    fn resolve(ws: &Workspace, referrer: ElementRef, kind: RefKind, raw: &str) -> Resolution {
        Resolver::new(ws).resolve(referrer, kind, &RefName::parse(raw))
    }

    #[test]
    fn test_definition_scope() {
        let mut ws = Workspace::new();
        let id = ws.create_document("mem://a.ncl", None);
        let mut d = Doc { ws: &mut ws, id };
        let ncl = d.add(K::Ncl, None, None);
        let head = d.add(K::Head, None, Some(ncl));
        let body = d.add(K::Body, None, Some(ncl));
        let media = d.add(K::Media, Some("m"), Some(body));

        let desc = RefKind::Definition(BaseKind::Descriptor);
        assert_eq!(
            resolve(&ws, media, desc, "d1"),
            Resolution::NoSuchScope(MissingScope::Base(BaseKind::Descriptor))
        );

        let mut d = Doc { ws: &mut ws, id };
        let base = d.add(K::DescriptorBase, None, Some(head));
        assert_eq!(resolve(&ws, media, desc, "d1"), Resolution::NotYetAvailable);

        let mut d = Doc { ws: &mut ws, id };
        let d1 = d.add(K::Descriptor, Some("d1"), Some(base));
        assert_eq!(resolve(&ws, media, desc, "d1"), Resolution::Resolved(d1));
    }

    #[test]
    fn test_node_scope_walks_outward() {
        let mut ws = Workspace::new();
        let id = ws.create_document("mem://a.ncl", None);
        let mut d = Doc { ws: &mut ws, id };
        let ncl = d.add(K::Ncl, None, None);
        let body = d.add(K::Body, Some("body"), Some(ncl));
        let outer = d.add(K::Media, Some("outer"), Some(body));
        let ctx = d.add(K::Context, Some("ctx"), Some(body));
        let link = d.add(K::Link, Some("l"), Some(ctx));
        let bind = d.add(K::Bind, None, Some(link));
        let inner = d.add(K::Media, Some("inner"), Some(ctx));

        assert_eq!(resolve(&ws, bind, RefKind::Node, "inner"), Resolution::Resolved(inner));
        assert_eq!(resolve(&ws, bind, RefKind::Node, "outer"), Resolution::Resolved(outer));
        assert_eq!(resolve(&ws, bind, RefKind::Node, "ctx"), Resolution::Resolved(ctx));
        assert_eq!(resolve(&ws, bind, RefKind::Node, "nope"), Resolution::NotYetAvailable);

        assert_eq!(
            resolve(&ws, ncl, RefKind::Node, "inner"),
            Resolution::NoSuchScope(MissingScope::Composite)
        );
        assert_eq!(
            resolve(&ws, outer, RefKind::ReusedNode, "inner"),
            Resolution::Resolved(inner)
        );
    }

    #[test]
    fn test_interface_follows_component_slot() {
        let mut ws = Workspace::new();
        let id = ws.create_document("mem://a.ncl", None);
        let mut d = Doc { ws: &mut ws, id };
        let ncl = d.add(K::Ncl, None, None);
        let body = d.add(K::Body, None, Some(ncl));
        let media = d.add(K::Media, Some("video"), Some(body));
        let area = d.add(K::Area, Some("a1"), Some(media));
        let port = d.add(K::Port, Some("p"), Some(body));

        ws.declare_reference(port, "component", RefName::parse("video"))
            .unwrap();
        assert_eq!(
            resolve(&ws, port, RefKind::Interface, "a1"),
            Resolution::NoSuchScope(MissingScope::Component)
        );

        ws.set_reference(port, "component", media).unwrap();
        assert_eq!(resolve(&ws, port, RefKind::Interface, "a1"), Resolution::Resolved(area));
    }

    #[test]
    fn test_roles_and_parameters() {
        let mut ws = Workspace::new();
        let id = ws.create_document("mem://a.ncl", None);
        let mut d = Doc { ws: &mut ws, id };
        let ncl = d.add(K::Ncl, None, None);
        let head = d.add(K::Head, None, Some(ncl));
        let base = d.add(K::ConnectorBase, None, Some(head));
        let conn = d.add(K::CausalConnector, Some("onBeginStart"), Some(base));
        let param = d.add(K::ConnectorParam, Some("delay"), Some(conn));
        let cond = d.add(K::SimpleCondition, Some("onBegin"), Some(conn));
        let body = d.add(K::Body, None, Some(ncl));
        let link = d.add(K::Link, Some("l1"), Some(body));
        let bind = d.add(K::Bind, None, Some(link));
        let link_param = d.add(K::LinkParam, None, Some(link));

        assert_eq!(
            resolve(&ws, bind, RefKind::Role, "onBegin"),
            Resolution::NoSuchScope(MissingScope::Connector)
        );
        ws.set_reference(link, "xconnector", conn).unwrap();
        assert_eq!(resolve(&ws, bind, RefKind::Role, "onBegin"), Resolution::Resolved(cond));
        assert_eq!(
            resolve(&ws, link_param, RefKind::Parameter, "delay"),
            Resolution::Resolved(param)
        );
        assert_eq!(
            resolve(&ws, cond, RefKind::Parameter, "$delay"),
            Resolution::Resolved(param)
        );
        assert_eq!(
            resolve(&ws, body, RefKind::Role, "onBegin"),
            Resolution::NoSuchScope(MissingScope::Link)
        );
    }

    #[test]
    fn test_constituents() {
        let mut ws = Workspace::new();
        let id = ws.create_document("mem://a.ncl", None);
        let mut d = Doc { ws: &mut ws, id };
        let ncl = d.add(K::Ncl, None, None);
        let body = d.add(K::Body, None, Some(ncl));
        let switch = d.add(K::Switch, Some("sw"), Some(body));
        let en = d.add(K::Media, Some("en"), Some(switch));
        let rule = d.add(K::BindRule, None, Some(switch));
        let stray = d.add(K::BindRule, None, Some(body));

        assert_eq!(resolve(&ws, rule, RefKind::Constituent, "en"), Resolution::Resolved(en));
        assert_eq!(
            resolve(&ws, stray, RefKind::Constituent, "en"),
            Resolution::NoSuchScope(MissingScope::Switch)
        );
    }

    #[test]
    fn test_qualified_names() {
        let mut ws = Workspace::new();
        let lib = ws.create_document("mem://lib.ncl", None);
        let mut d = Doc { ws: &mut ws, id: lib };
        let ncl = d.add(K::Ncl, None, None);
        let head = d.add(K::Head, None, Some(ncl));
        let base = d.add(K::RuleBase, None, Some(head));
        let r1 = d.add(K::Rule, Some("r1"), Some(base));

        let main = ws.create_document("mem://main.ncl", None);
        let mut d = Doc { ws: &mut ws, id: main };
        let ncl = d.add(K::Ncl, None, None);
        let head = d.add(K::Head, None, Some(ncl));
        let base = d.add(K::RuleBase, None, Some(head));
        let local = d.add(K::Rule, Some("b.r1"), Some(base));
        let body = d.add(K::Body, None, Some(ncl));
        let switch = d.add(K::Switch, Some("sw"), Some(body));
        let bind_rule = d.add(K::BindRule, None, Some(switch));

        let rule = RefKind::Definition(BaseKind::Rule);
        assert_eq!(
            resolve(&ws, bind_rule, rule, "b#r1"),
            Resolution::NoSuchScope(MissingScope::Alias("b".into()))
        );
        assert_eq!(resolve(&ws, bind_rule, rule, "b.r1"), Resolution::Resolved(local));

        let import = ws.create_element(main, K::ImportBase).unwrap();
        ws.set_literal(import, "alias", "b").unwrap();
        ws.set_imported(import, Some(lib)).unwrap();
        ws.attach(import, base).unwrap();

        assert_eq!(resolve(&ws, bind_rule, rule, "b#r1"), Resolution::Resolved(r1));
        assert_eq!(resolve(&ws, bind_rule, rule, "b.r1"), Resolution::Resolved(r1));
        assert_eq!(resolve(&ws, bind_rule, rule, "b#r2"), Resolution::NotYetAvailable);
    }

    #[test]
    fn test_transitive_imports() {
        let mut ws = Workspace::new();
        let deep = ws.create_document("mem://deep.ncl", None);
        let mut d = Doc { ws: &mut ws, id: deep };
        let ncl = d.add(K::Ncl, None, None);
        let head = d.add(K::Head, None, Some(ncl));
        let base = d.add(K::RegionBase, None, Some(head));
        let screen = d.add(K::Region, Some("screen"), Some(base));

        let mid = ws.create_document("mem://mid.ncl", None);
        let mut d = Doc { ws: &mut ws, id: mid };
        let ncl = d.add(K::Ncl, None, None);
        let head = d.add(K::Head, None, Some(ncl));
        let mid_base = d.add(K::RegionBase, None, Some(head));
        let import = ws.create_element(mid, K::ImportBase).unwrap();
        ws.set_literal(import, "alias", "deep").unwrap();
        ws.set_imported(import, Some(deep)).unwrap();
        ws.attach(import, mid_base).unwrap();

        let main = ws.create_document("mem://main.ncl", None);
        let mut d = Doc { ws: &mut ws, id: main };
        let ncl = d.add(K::Ncl, None, None);
        let head = d.add(K::Head, None, Some(ncl));
        let base = d.add(K::RegionBase, None, Some(head));
        let desc_base = d.add(K::DescriptorBase, None, Some(head));
        let desc = d.add(K::Descriptor, Some("d"), Some(desc_base));
        let import = ws.create_element(main, K::ImportBase).unwrap();
        ws.set_literal(import, "alias", "mid").unwrap();
        ws.set_imported(import, Some(mid)).unwrap();
        ws.attach(import, base).unwrap();

        let region = RefKind::Definition(BaseKind::Region);
        assert_eq!(resolve(&ws, desc, region, "mid#screen"), Resolution::Resolved(screen));
    }
}
