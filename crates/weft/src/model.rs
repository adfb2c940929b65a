//! The element graph.
//!
//! Elements live in a per-document arena and are addressed by [`ElementId`].
//! A [`Workspace`] holds every document of a session, so a reference edge
//! from one document into another is an [`ElementRef`] pair of handles.
//!
//! The graph is a strict ownership tree (parent/children) overlaid with
//! reference edges. Each reference edge is recorded twice: as a resolved
//! slot on the referrer and as a back-edge in the referent's referrer list.
//! [`Workspace`] mutations keep both sides in balance.

mod document;
mod element;
mod graph;

pub use document::Document;
pub use element::{AttrValue, Element, Named, RefSlot, ReferenceTarget};
pub use graph::{GraphError, Workspace};

use std::fmt;

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Default)]
        pub struct $name(u32);

        impl $name {
            /// Construct a handle from a raw value.
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            /// Retrieve the underlying integer value.
            pub const fn to_raw(self) -> u32 {
                self.0
            }

            pub(crate) fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id!(ElementId, "e");
define_id!(DocumentId, "d");

/// A handle to an element in any document of a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct ElementRef {
    pub document: DocumentId,
    pub element: ElementId,
}

impl ElementRef {
    pub fn new(document: DocumentId, element: ElementId) -> Self {
        Self { document, element }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.document, self.element)
    }
}
