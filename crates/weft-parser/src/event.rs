//! Element events and the generic attribute tree.
//!
//! Document construction consumes a sequence of "element started / element
//! ended" events through the [`ElementSink`] trait. The same sequence can be
//! produced from source text ([`crate::read_events`]) or from an already
//! built [`XmlNode`] tree ([`XmlNode::walk`]), so a builder only has to
//! implement one interface.

use crate::span::Span;

/// An attribute as written in a start tag, with entities decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    pub span: Span,
}

impl Attribute {
    /// Create an attribute without source location.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            span: Span::default(),
        }
    }
}

/// Receiver of element events.
///
/// Every `begin_element` is matched by exactly one `end_element` with the
/// same tag, in properly nested order.
pub trait ElementSink {
    type Error;

    /// Called when a start tag (or the start of a self-closing tag) is read.
    fn begin_element(
        &mut self,
        tag: &str,
        attributes: &[Attribute],
        span: Span,
    ) -> Result<(), Self::Error>;

    /// Called when the matching end tag is read.
    fn end_element(&mut self, tag: &str, span: Span) -> Result<(), Self::Error>;
}

/// A single element event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    Start {
        tag: String,
        attributes: Vec<Attribute>,
        span: Span,
    },
    End {
        tag: String,
        span: Span,
    },
}

/// Replay a recorded event sequence into a sink.
pub fn feed<S: ElementSink>(events: &[XmlEvent], sink: &mut S) -> Result<(), S::Error> {
    for event in events {
        match event {
            XmlEvent::Start {
                tag,
                attributes,
                span,
            } => sink.begin_element(tag, attributes, *span)?,
            XmlEvent::End { tag, span } => sink.end_element(tag, *span)?,
        }
    }
    Ok(())
}

/// A generic element tree: tag, ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNode {
    pub tag: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<XmlNode>,
    pub span: Span,
}

impl XmlNode {
    /// Create an element with no attributes or children.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            span: Span::default(),
        }
    }

    /// Append an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(name, value));
        self
    }

    /// Append a child element.
    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(child);
        self
    }

    /// Returns the value of the attribute `name`, if present.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Emit this tree depth-first as element events.
    pub fn walk<S: ElementSink>(&self, sink: &mut S) -> Result<(), S::Error> {
        sink.begin_element(&self.tag, &self.attributes, self.span)?;
        for child in &self.children {
            child.walk(sink)?;
        }
        sink.end_element(&self.tag, self.span)
    }

    /// Build a tree from a well-nested event sequence.
    ///
    /// Returns `None` if the sequence is empty or not properly nested.
    pub fn from_events(events: &[XmlEvent]) -> Option<XmlNode> {
        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root = None;

        for event in events {
            match event {
                XmlEvent::Start {
                    tag,
                    attributes,
                    span,
                } => {
                    if root.is_some() {
                        return None;
                    }
                    stack.push(XmlNode {
                        tag: tag.clone(),
                        attributes: attributes.clone(),
                        children: Vec::new(),
                        span: *span,
                    });
                }
                XmlEvent::End { tag, .. } => {
                    let node = stack.pop()?;
                    if &node.tag != tag {
                        return None;
                    }
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => root = Some(node),
                    }
                }
            }
        }

        if stack.is_empty() { root } else { None }
    }
}
