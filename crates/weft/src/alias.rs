//! Import alias tables.
//!
//! An [`AliasTable`] binds alias tokens to documents that were loaded for an
//! import element. Each base owns one (for `importBase`) and each document
//! owns one (for `importNCL`). The table only records bindings; loading is
//! done by the session through a [`DocumentLoader`](crate::loader::DocumentLoader).

use indexmap::IndexMap;
use thiserror::Error;

use crate::model::{DocumentId, ElementId};

/// An alias bound to an imported document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AliasBinding {
    /// The imported document.
    pub document: DocumentId,
    /// The import element that declared the alias.
    pub declared_by: ElementId,
}

/// Error returned when an alias is already bound in a table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("alias `{alias}` is already bound")]
pub struct DuplicateAlias {
    pub alias: String,
    pub existing: AliasBinding,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: IndexMap<String, AliasBinding>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `alias` to `document`, declared by the import element `declared_by`.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateAlias`] if `alias` is already bound.
    pub fn bind(
        &mut self,
        alias: impl Into<String>,
        document: DocumentId,
        declared_by: ElementId,
    ) -> Result<(), DuplicateAlias> {
        let alias = alias.into();
        if let Some(existing) = self.entries.get(&alias) {
            return Err(DuplicateAlias {
                alias,
                existing: *existing,
            });
        }
        self.entries.insert(
            alias,
            AliasBinding {
                document,
                declared_by,
            },
        );
        Ok(())
    }

    /// The document bound to `alias`.
    pub fn resolve(&self, alias: &str) -> Option<DocumentId> {
        self.entries.get(alias).map(|binding| binding.document)
    }

    pub fn binding(&self, alias: &str) -> Option<AliasBinding> {
        self.entries.get(alias).copied()
    }

    pub fn unbind(&mut self, alias: &str) -> Option<AliasBinding> {
        self.entries.shift_remove(alias)
    }

    /// Bound documents, in binding order.
    pub fn documents(&self) -> impl Iterator<Item = DocumentId> + '_ {
        self.entries.values().map(|binding| binding.document)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, AliasBinding)> + '_ {
        self.entries
            .iter()
            .map(|(alias, binding)| (alias.as_str(), *binding))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every binding to a document for which `keep` returns `false`.
    pub(crate) fn retain_documents(&mut self, mut keep: impl FnMut(DocumentId) -> bool) {
        self.entries.retain(|_, binding| keep(binding.document));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(raw: u32) -> DocumentId {
        DocumentId::from_raw(raw)
    }

    #[test]
    fn test_bind_and_resolve() {
        let mut table = AliasTable::new();
        table.bind("b", doc(1), ElementId::from_raw(4)).unwrap();

        assert_eq!(table.resolve("b"), Some(doc(1)));
        assert_eq!(table.resolve("c"), None);
        assert_eq!(table.binding("b").unwrap().declared_by, ElementId::from_raw(4));
    }

    #[test]
    fn test_duplicate_alias() {
        let mut table = AliasTable::new();
        table.bind("b", doc(1), ElementId::from_raw(4)).unwrap();

        let err = table.bind("b", doc(2), ElementId::from_raw(5)).unwrap_err();
        assert_eq!(err.alias, "b");
        assert_eq!(err.existing.document, doc(1));
        assert_eq!(table.resolve("b"), Some(doc(1)));
    }

    #[test]
    fn test_unbind_allows_rebinding() {
        let mut table = AliasTable::new();
        table.bind("b", doc(1), ElementId::from_raw(4)).unwrap();
        table.unbind("b");
        table.bind("b", doc(2), ElementId::from_raw(5)).unwrap();

        assert_eq!(table.resolve("b"), Some(doc(2)));
    }

    #[test]
    fn test_retain_documents() {
        let mut table = AliasTable::new();
        table.bind("x", doc(1), ElementId::from_raw(1)).unwrap();
        table.bind("y", doc(2), ElementId::from_raw(2)).unwrap();
        table.bind("z", doc(1), ElementId::from_raw(3)).unwrap();

        table.retain_documents(|document| document != doc(1));
        let left: Vec<&str> = table.iter().map(|(alias, _)| alias).collect();
        assert_eq!(left, vec!["y"]);
    }
}
