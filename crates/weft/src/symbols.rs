//! Per-scope symbol tables.
//!
//! A [`SymbolTable`] maps keys to elements of one document. Tables are owned
//! by the element that opens the scope (a base, a composite node, a
//! connector, ...) under a [`Namespace`], plus one document-wide node index.
//! Entries keep insertion order so traversal and serialization are
//! deterministic.

use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

use weft_core::{
    identifier::Id,
    schema::{BaseKind, IndexScope},
};

use crate::model::ElementId;

/// The kind of table an element key is registered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Definitions owned by a base.
    Definitions,
    /// Child nodes of a composite.
    Nodes,
    /// Interface points of a node.
    Interfaces,
    /// Links of a composite.
    Links,
    /// Roles of a connector.
    Roles,
    /// Parameters of a connector.
    Parameters,
}

impl From<IndexScope> for Namespace {
    fn from(scope: IndexScope) -> Self {
        match scope {
            IndexScope::Definition(_) => Namespace::Definitions,
            IndexScope::Node => Namespace::Nodes,
            IndexScope::Interface => Namespace::Interfaces,
            IndexScope::Link => Namespace::Links,
            IndexScope::Role => Namespace::Roles,
            IndexScope::Parameter => Namespace::Parameters,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Namespace::Definitions => "definitions",
            Namespace::Nodes => "nodes",
            Namespace::Interfaces => "interfaces",
            Namespace::Links => "links",
            Namespace::Roles => "roles",
            Namespace::Parameters => "parameters",
        };
        write!(f, "{name}")
    }
}

/// Where an [`IndexScope`] looks for the element owning its table.
///
/// Returned by [`owner_rule`] and walked by the graph when registering keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OwnerRule {
    /// The nearest ancestor that is a base of this kind.
    Base(BaseKind),
    /// The nearest composite ancestor.
    Composite,
    /// The direct parent.
    Parent,
    /// The nearest connector ancestor.
    Connector,
}

pub(crate) fn owner_rule(scope: IndexScope) -> OwnerRule {
    match scope {
        IndexScope::Definition(base) => OwnerRule::Base(base),
        IndexScope::Node | IndexScope::Link => OwnerRule::Composite,
        IndexScope::Interface => OwnerRule::Parent,
        IndexScope::Role | IndexScope::Parameter => OwnerRule::Connector,
    }
}

/// Error returned when a key is already taken in a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("id `{id}` is already defined")]
pub struct DuplicateId {
    pub id: Id,
    pub existing: ElementId,
}

/// An insertion-ordered map from key to element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    entries: IndexMap<Id, ElementId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `element` under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateId`] if `id` is already registered, even for the
    /// same element.
    pub fn insert(&mut self, id: Id, element: ElementId) -> Result<(), DuplicateId> {
        match self.entries.get(&id) {
            Some(&existing) => Err(DuplicateId { id, existing }),
            None => {
                self.entries.insert(id, element);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, id: Id) -> Option<ElementId> {
        self.entries.get(&id).copied()
    }

    /// Remove `id`, keeping the order of the remaining entries.
    pub fn remove(&mut self, id: Id) -> Option<ElementId> {
        self.entries.shift_remove(&id)
    }

    pub fn contains(&self, id: Id) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Id, ElementId)> + '_ {
        self.entries.iter().map(|(id, element)| (*id, *element))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_twice_fails() {
        let mut table = SymbolTable::new();
        let id = Id::new("r1");

        table.insert(id, ElementId::from_raw(1)).unwrap();
        let err = table.insert(id, ElementId::from_raw(2)).unwrap_err();

        assert_eq!(err.id, id);
        assert_eq!(err.existing, ElementId::from_raw(1));
        assert_eq!(err.to_string(), "id `r1` is already defined");
    }

    #[test]
    fn test_remove_then_reinsert() {
        let mut table = SymbolTable::new();
        let id = Id::new("r1");

        table.insert(id, ElementId::from_raw(1)).unwrap();
        assert_eq!(table.remove(id), Some(ElementId::from_raw(1)));
        assert!(table.lookup(id).is_none());

        table.insert(id, ElementId::from_raw(2)).unwrap();
        assert_eq!(table.lookup(id), Some(ElementId::from_raw(2)));
    }

    #[test]
    fn test_iteration_keeps_insertion_order() {
        let mut table = SymbolTable::new();
        for (raw, name) in ["c", "a", "b"].iter().enumerate() {
            table.insert(Id::new(name), ElementId::from_raw(raw as u32)).unwrap();
        }
        table.remove(Id::new("a"));

        let keys: Vec<String> = table.iter().map(|(id, _)| id.to_string()).collect();
        assert_eq!(keys, vec!["c", "b"]);
    }

    #[test]
    fn test_namespace_from_scope() {
        assert_eq!(
            Namespace::from(IndexScope::Definition(BaseKind::Rule)),
            Namespace::Definitions
        );
        assert_eq!(Namespace::from(IndexScope::Role), Namespace::Roles);
        assert_eq!(owner_rule(IndexScope::Link), OwnerRule::Composite);
        assert_eq!(
            owner_rule(IndexScope::Definition(BaseKind::Region)),
            OwnerRule::Base(BaseKind::Region)
        );
    }
}
