//! Reader for XML document source text.
//!
//! The reader turns source text into a flat sequence of [`XmlEvent`]s. It
//! skips the XML declaration, processing instructions, comments, CDATA
//! sections and whitespace-only text, decodes entity references in attribute
//! values and checks that tags are properly nested. Anything the model does
//! not need (namespaces, DTDs, mixed content) is read and discarded.
//!
//! Reading stops at the first malformed construct and reports it as a single
//! [`Diagnostic`] inside a [`ParseError`].

use std::borrow::Cow;

use log::trace;
use winnow::{
    Parser as _,
    combinator::{alt, preceded, repeat},
    error::{ContextError, ErrMode},
    stream::Stream,
    token::{any, take_till, take_until, take_while},
};

use crate::{
    error::{Diagnostic, ErrorCode, ParseError},
    event::{Attribute, XmlEvent, XmlNode},
    span::Span,
};

/// Context type for reader errors
#[derive(Debug, Clone, PartialEq, Eq)]
enum Context {
    /// Description of what was expected
    Label(&'static str),
    /// Error code to report
    Code(ErrorCode),
    /// Remaining length (`eof_offset()`) at error start position
    ///
    /// Converted to a byte offset as `source.len() - value`.
    StartOffset(usize),
}

type Input<'src> = &'src str;
type IResult<O> = std::result::Result<O, ErrMode<ContextError<Context>>>;

#[derive(Debug, Clone)]
struct RawAttribute<'src> {
    name: &'src str,
    value: &'src str,
    start: usize,
    value_start: usize,
    end: usize,
}

#[derive(Debug, Clone)]
struct RawStartTag<'src> {
    name: &'src str,
    attributes: Vec<RawAttribute<'src>>,
    self_closing: bool,
}

#[derive(Debug, Clone)]
enum Markup<'src> {
    Start(RawStartTag<'src>),
    End(&'src str),
    Text(&'src str),
    Skip,
}

/// Run `f`, turning any failure into a cut error carrying `code` and `label`.
fn cut_err<'src, O, F>(
    input: &mut Input<'src>,
    code: ErrorCode,
    label: &'static str,
    f: F,
) -> IResult<O>
where
    F: FnOnce(&mut Input<'src>) -> IResult<O>,
{
    let start_remaining = input.eof_offset();

    match f(input) {
        Ok(o) => Ok(o),
        Err(ErrMode::Backtrack(mut e)) | Err(ErrMode::Cut(mut e)) => {
            e.push(Context::Label(label));
            e.push(Context::Code(code));
            e.push(Context::StartOffset(start_remaining));
            Err(ErrMode::Cut(e))
        }
        Err(e) => Err(e),
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == ':'
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_alphanumeric() || c == '-' || c == '.'
}

fn ws0<'src>(input: &mut Input<'src>) -> IResult<()> {
    take_while(0.., char::is_whitespace)
        .void()
        .parse_next(input)
}

fn ws1<'src>(input: &mut Input<'src>) -> IResult<()> {
    take_while(1.., char::is_whitespace)
        .void()
        .parse_next(input)
}

fn name<'src>(input: &mut Input<'src>) -> IResult<&'src str> {
    take_while(1.., is_name_char)
        .verify(|s: &str| s.starts_with(is_name_start))
        .parse_next(input)
}

/// Parse a quoted value, returning the raw text and its start position
fn quoted_value<'src>(input: &mut Input<'src>) -> IResult<(&'src str, usize)> {
    let quote = alt(('"', '\'')).parse_next(input)?;

    cut_err(input, ErrorCode::E001, "a closing quote", |input| {
        let start = input.eof_offset();
        let text = take_till(0.., |c: char| c == quote || c == '<').parse_next(input)?;
        any.verify(|c: &char| *c == quote).parse_next(input)?;
        Ok((text, start))
    })
}

fn attribute<'src>(input: &mut Input<'src>) -> IResult<RawAttribute<'src>> {
    let start = input.eof_offset();
    let name = name(input)?;

    let (value, value_start) = cut_err(
        input,
        ErrorCode::E100,
        "`=` followed by a quoted value",
        |input| {
            (ws0, '=', ws0).parse_next(input)?;
            quoted_value(input)
        },
    )?;

    Ok(RawAttribute {
        name,
        value,
        start,
        value_start,
        end: input.eof_offset(),
    })
}

fn start_tag<'src>(input: &mut Input<'src>) -> IResult<RawStartTag<'src>> {
    '<'.parse_next(input)?;

    let name = cut_err(input, ErrorCode::E100, "an element name", name)?;
    let attributes: Vec<RawAttribute<'src>> =
        repeat(0.., preceded(ws1, attribute)).parse_next(input)?;

    let self_closing = cut_err(
        input,
        ErrorCode::E100,
        "`>` or `/>` closing the start tag",
        |input| {
            ws0(input)?;
            alt(("/>".value(true), ">".value(false))).parse_next(input)
        },
    )?;

    Ok(RawStartTag {
        name,
        attributes,
        self_closing,
    })
}

fn end_tag<'src>(input: &mut Input<'src>) -> IResult<&'src str> {
    "</".parse_next(input)?;

    cut_err(input, ErrorCode::E100, "an element name and `>`", |input| {
        let name = name(input)?;
        (ws0, '>').parse_next(input)?;
        Ok(name)
    })
}

fn comment<'src>(input: &mut Input<'src>) -> IResult<()> {
    "<!--".parse_next(input)?;

    cut_err(input, ErrorCode::E004, "`-->` closing the comment", |input| {
        (take_until(0.., "-->"), "-->").void().parse_next(input)
    })
}

fn cdata<'src>(input: &mut Input<'src>) -> IResult<()> {
    "<![CDATA[".parse_next(input)?;

    cut_err(input, ErrorCode::E004, "`]]>` closing the CDATA section", |input| {
        (take_until(0.., "]]>"), "]]>").void().parse_next(input)
    })
}

fn declaration<'src>(input: &mut Input<'src>) -> IResult<()> {
    "<!".parse_next(input)?;

    cut_err(input, ErrorCode::E100, "`>` closing the declaration", |input| {
        (take_till(0.., '>'), '>').void().parse_next(input)
    })
}

fn processing_instruction<'src>(input: &mut Input<'src>) -> IResult<()> {
    "<?".parse_next(input)?;

    cut_err(
        input,
        ErrorCode::E004,
        "`?>` closing the processing instruction",
        |input| (take_until(0.., "?>"), "?>").void().parse_next(input),
    )
}

fn text<'src>(input: &mut Input<'src>) -> IResult<&'src str> {
    take_till(1.., '<').parse_next(input)
}

fn markup<'src>(input: &mut Input<'src>) -> IResult<Markup<'src>> {
    alt((
        comment.map(|_| Markup::Skip),
        cdata.map(|_| Markup::Skip),
        declaration.map(|_| Markup::Skip),
        processing_instruction.map(|_| Markup::Skip),
        end_tag.map(Markup::End),
        start_tag.map(Markup::Start),
        text.map(Markup::Text),
    ))
    .parse_next(input)
}

/// Decode the predefined and numeric entity references in `raw`.
///
/// On failure returns the byte offset of the offending `&` within `raw`.
fn decode_entities(raw: &str) -> Result<Cow<'_, str>, usize> {
    if !raw.contains('&') {
        return Ok(Cow::Borrowed(raw));
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(pos) = rest.find('&') {
        let offset = raw.len() - rest.len() + pos;
        out.push_str(&rest[..pos]);

        let after = &rest[pos + 1..];
        let end = after.find(';').ok_or(offset)?;
        let decoded = match &after[..end] {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            entity => numeric_reference(entity).ok_or(offset)?,
        };
        out.push(decoded);
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(Cow::Owned(out))
}

fn numeric_reference(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None if digits.bytes().all(|b| b.is_ascii_digit()) => digits.parse().ok()?,
        None => return None,
    };
    char::from_u32(code)
}

struct Reader<'src> {
    source: &'src str,
    events: Vec<XmlEvent>,
    open: Vec<(&'src str, Span)>,
    saw_root: bool,
    root_closed: bool,
}

impl<'src> Reader<'src> {
    fn new(source: &'src str) -> Self {
        Self {
            source,
            events: Vec::new(),
            open: Vec::new(),
            saw_root: false,
            root_closed: false,
        }
    }

    fn span(&self, start_remaining: usize, end_remaining: usize) -> Span {
        let len = self.source.len();
        Span::new(len - start_remaining..len - end_remaining)
    }

    fn run(mut self) -> Result<Vec<XmlEvent>, ParseError> {
        let mut input: Input<'src> = self.source;

        while !input.is_empty() {
            let start = input.eof_offset();
            let markup = markup(&mut input)
                .map_err(|err| self.convert_error(err, input.eof_offset()))?;
            let span = self.span(start, input.eof_offset());

            match markup {
                Markup::Skip => {}
                Markup::Text(text) => self.text(text, span)?,
                Markup::Start(tag) => self.start(tag, span)?,
                Markup::End(name) => self.end(name, span)?,
            }
        }

        if let Some((tag, span)) = self.open.last() {
            let eof = Span::new(self.source.len()..self.source.len());
            return Err(Diagnostic::error(format!("element `{tag}` is never closed"))
                .with_code(ErrorCode::E101)
                .with_label(*span, "opened here")
                .with_secondary_label(eof, "input ends here")
                .with_help(format!("add `</{tag}>`"))
                .into());
        }

        if !self.saw_root {
            return Err(Diagnostic::error("document has no root element")
                .with_code(ErrorCode::E104)
                .with_label(Span::new(0..self.source.len()), "no element found")
                .into());
        }

        trace!(events = self.events.len(); "Document read");
        Ok(self.events)
    }

    fn text(&self, text: &str, span: Span) -> Result<(), ParseError> {
        if self.open.is_empty() && !text.trim().is_empty() {
            return Err(Diagnostic::error("text outside the root element")
                .with_code(ErrorCode::E103)
                .with_label(span, "unexpected text")
                .into());
        }
        Ok(())
    }

    fn start(&mut self, tag: RawStartTag<'src>, span: Span) -> Result<(), ParseError> {
        if self.root_closed {
            return Err(Diagnostic::error(format!(
                "element `{}` follows the root element",
                tag.name
            ))
            .with_code(ErrorCode::E103)
            .with_label(span, "second root element")
            .with_help("a document has exactly one root element")
            .into());
        }

        let mut attributes: Vec<Attribute> = Vec::with_capacity(tag.attributes.len());
        for raw in &tag.attributes {
            let attr_span = self.span(raw.start, raw.end);

            if let Some(first) = attributes.iter().find(|attr| attr.name == raw.name) {
                return Err(Diagnostic::error(format!(
                    "attribute `{}` is specified more than once",
                    raw.name
                ))
                .with_code(ErrorCode::E005)
                .with_label(attr_span, "duplicate attribute")
                .with_secondary_label(first.span, "first specified here")
                .into());
            }

            let value = decode_entities(raw.value).map_err(|offset| {
                let at = self.source.len() - raw.value_start + offset;
                Diagnostic::error(format!("invalid character reference in `{}`", raw.name))
                    .with_code(ErrorCode::E003)
                    .with_label(Span::new(at..at + 1), "unrecognized reference")
                    .with_help("use `&amp;` for a literal ampersand")
            })?;

            attributes.push(Attribute {
                name: raw.name.to_string(),
                value: value.into_owned(),
                span: attr_span,
            });
        }

        self.saw_root = true;
        self.events.push(XmlEvent::Start {
            tag: tag.name.to_string(),
            attributes,
            span,
        });

        if tag.self_closing {
            self.events.push(XmlEvent::End {
                tag: tag.name.to_string(),
                span,
            });
            if self.open.is_empty() {
                self.root_closed = true;
            }
        } else {
            self.open.push((tag.name, span));
        }
        Ok(())
    }

    fn end(&mut self, name: &str, span: Span) -> Result<(), ParseError> {
        let Some((open, open_span)) = self.open.pop() else {
            return Err(Diagnostic::error(format!("closing tag `</{name}>` has no open element"))
                .with_code(ErrorCode::E102)
                .with_label(span, "unexpected closing tag")
                .into());
        };

        if open != name {
            return Err(Diagnostic::error(format!(
                "closing tag `</{name}>` does not match `<{open}>`"
            ))
            .with_code(ErrorCode::E102)
            .with_label(span, "mismatched closing tag")
            .with_secondary_label(open_span, "innermost open element")
            .with_help(format!("close `{open}` first"))
            .into());
        }

        self.events.push(XmlEvent::End {
            tag: name.to_string(),
            span,
        });
        if self.open.is_empty() {
            self.root_closed = true;
        }
        Ok(())
    }

    /// Convert a winnow error into a diagnostic
    ///
    /// The position comes from the innermost `StartOffset` context, the code
    /// and message from the innermost `Code` and `Label` contexts.
    fn convert_error(
        &self,
        error: ErrMode<ContextError<Context>>,
        current_remaining: usize,
    ) -> ParseError {
        let len = self.source.len();
        let end = len - current_remaining;

        match error {
            ErrMode::Backtrack(e) | ErrMode::Cut(e) => {
                let start = e
                    .context()
                    .find_map(|ctx| match ctx {
                        Context::StartOffset(n) => Some(len - *n),
                        _ => None,
                    })
                    .unwrap_or(end);
                let code = e
                    .context()
                    .find_map(|ctx| match ctx {
                        Context::Code(code) => Some(*code),
                        _ => None,
                    })
                    .unwrap_or(ErrorCode::E002);
                let expected = e.context().find_map(|ctx| match ctx {
                    Context::Label(label) => Some(*label),
                    _ => None,
                });

                let span = if start < end {
                    Span::new(start..end)
                } else {
                    Span::new(end..(end + 1).min(len))
                };

                let message = match expected {
                    Some(label) => format!("{}: expected {label}", code.description()),
                    None => code.description().to_string(),
                };

                Diagnostic::error(message)
                    .with_code(code)
                    .with_label(span, "here")
                    .into()
            }
            ErrMode::Incomplete(_) => {
                // Not produced for complete `&str` input.
                Diagnostic::error("incomplete input")
                    .with_code(ErrorCode::E101)
                    .with_label(Span::new(end..len), "incomplete")
                    .into()
            }
        }
    }
}

/// Read `source` into a sequence of element events.
///
/// # Errors
///
/// Returns a [`ParseError`] holding one diagnostic for the first malformed
/// construct found.
pub fn read_events(source: &str) -> Result<Vec<XmlEvent>, ParseError> {
    Reader::new(source).run()
}

/// Read `source` into an element tree.
///
/// # Errors
///
/// Same as [`read_events`].
pub fn read_tree(source: &str) -> Result<XmlNode, ParseError> {
    let events = read_events(source)?;
    XmlNode::from_events(&events).ok_or_else(|| {
        Diagnostic::error("document has no root element")
            .with_code(ErrorCode::E104)
            .into()
    })
}
