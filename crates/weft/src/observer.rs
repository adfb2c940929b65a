//! Model-change notifications.
//!
//! Listeners subscribe to a workspace and receive every [`ModelEvent`] in
//! emission order through their own channel. A listener unsubscribes by
//! dropping its receiver; the sender is pruned on the next emission.

use std::sync::mpsc::{self, Receiver, Sender};

use log::trace;

use crate::model::{DocumentId, ElementRef};

/// A change to the element graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    Attached {
        element: ElementRef,
        parent: ElementRef,
    },
    Detached {
        element: ElementRef,
        parent: ElementRef,
    },
    Removed {
        element: ElementRef,
    },
    ReferenceSet {
        referrer: ElementRef,
        attribute: String,
        target: ElementRef,
    },
    ReferenceCleared {
        referrer: ElementRef,
        attribute: String,
        target: ElementRef,
    },
    AttributeChanged {
        element: ElementRef,
        attribute: String,
    },
    /// A drain pass finished for `document`.
    DocumentLinked {
        document: DocumentId,
        unresolved: usize,
    },
}

/// The set of live listener channels.
#[derive(Debug, Default)]
pub struct Observers {
    senders: Vec<Sender<ModelEvent>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new listener.
    pub fn subscribe(&mut self) -> Receiver<ModelEvent> {
        let (sender, receiver) = mpsc::channel();
        self.senders.push(sender);
        receiver
    }

    /// Send `event` to every listener, dropping closed channels.
    pub fn emit(&mut self, event: ModelEvent) {
        if self.senders.is_empty() {
            return;
        }
        let before = self.senders.len();
        self.senders
            .retain(|sender| sender.send(event.clone()).is_ok());

        let pruned = before - self.senders.len();
        if pruned > 0 {
            trace!(pruned; "Dropped closed listeners");
        }
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}
