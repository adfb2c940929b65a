//! Spans with a message attached.

use crate::span::Span;

/// Whether a label marks the problem itself or context around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
    /// Where the problem is, such as the duplicate `id` or the unbound alias.
    Primary,
    /// Related context, such as the first definition of a duplicated id.
    Secondary,
}

/// A message pinned to a span of the document source.
///
/// ```text
/// error[E202]: alias `lib` is already bound
///  4 |       <importBase alias="lib" documentURI="b.ncl"/>
///    |       ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^ duplicate alias
///  3 |       <importBase alias="lib" documentURI="a.ncl"/>
///    |       --------------------------------------------- first bound here
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    style: LabelStyle,
    span: Span,
    message: String,
}

impl Label {
    pub fn new(style: LabelStyle, span: Span, message: impl Into<String>) -> Self {
        Self {
            style,
            span,
            message: message.into(),
        }
    }

    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Self::new(LabelStyle::Primary, span, message)
    }

    pub fn secondary(span: Span, message: impl Into<String>) -> Self {
        Self::new(LabelStyle::Secondary, span, message)
    }

    pub fn style(&self) -> LabelStyle {
        self.style
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_primary(&self) -> bool {
        self.style == LabelStyle::Primary
    }

    pub fn is_secondary(&self) -> bool {
        self.style == LabelStyle::Secondary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_styles() {
        let duplicate = Label::primary(Span::new(40..72), "duplicate definition");
        let first = Label::secondary(Span::new(10..38), "first defined here");

        assert!(duplicate.is_primary());
        assert_eq!(duplicate.span(), Span::new(40..72));
        assert_eq!(first.style(), LabelStyle::Secondary);
        assert_eq!(first.message(), "first defined here");
        assert_eq!(
            first,
            Label::new(LabelStyle::Secondary, Span::new(10..38), "first defined here")
        );
    }
}
