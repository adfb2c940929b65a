//! Deferred resolution queue.
//!
//! References that cannot be resolved while the tree is being built are
//! queued in discovery order and drained once the document (and everything
//! it imports) exists.

use std::collections::VecDeque;

use weft_core::{reference::RefName, schema::RefKind};

use crate::model::ElementRef;

/// A reference slot waiting for its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReference {
    pub referrer: ElementRef,
    pub attribute: String,
    pub raw: RefName,
    pub kind: RefKind,
}

impl PendingReference {
    pub fn new(
        referrer: ElementRef,
        attribute: impl Into<String>,
        raw: RefName,
        kind: RefKind,
    ) -> Self {
        Self {
            referrer,
            attribute: attribute.into(),
            raw,
            kind,
        }
    }
}

/// FIFO of pending references for one document.
#[derive(Debug, Clone, Default)]
pub struct DeferredQueue {
    pending: VecDeque<PendingReference>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, reference: PendingReference) {
        self.pending.push_back(reference);
    }

    /// Take every queued reference, oldest first, leaving the queue empty.
    pub fn drain(&mut self) -> impl Iterator<Item = PendingReference> + '_ {
        self.pending.drain(..)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
