//! Writing documents back to text.
//!
//! Reference slots are written in symbolic form from their current target,
//! so renaming a referenced element renames every reference to it.

use std::fmt::Write;

use weft_core::reference::{RefName, Separator};

use crate::{
    config::SerializerConfig,
    error::WeftError,
    model::{
        AttrValue, Document, DocumentId, ElementId, ElementRef, GraphError, Named, RefSlot,
        Workspace,
    },
};

/// Writes documents with the configured quoting and indentation.
#[derive(Debug, Clone, Default)]
pub struct Serializer {
    config: SerializerConfig,
}

impl Serializer {
    pub fn new(config: SerializerConfig) -> Self {
        Self { config }
    }

    /// Serialize `document` to text.
    pub fn serialize(
        &self,
        workspace: &Workspace,
        document: DocumentId,
    ) -> Result<String, WeftError> {
        let doc = workspace
            .document(document)
            .ok_or(GraphError::UnknownDocument(document))?;

        let mut out = String::new();
        if self.config.xml_declaration() {
            let q = self.config.quote().as_char();
            let _ = writeln!(out, "<?xml version={q}1.0{q} encoding={q}UTF-8{q}?>");
        }
        if let Some(root) = doc.root() {
            self.write_element(workspace, doc, root, 0, &mut out);
        }
        Ok(out)
    }

    fn write_element(
        &self,
        workspace: &Workspace,
        doc: &Document,
        id: ElementId,
        depth: usize,
        out: &mut String,
    ) {
        let Some(element) = doc.element(id) else {
            return;
        };
        let indent = " ".repeat(depth * self.config.indent());
        let tag = element.kind().tag();
        let q = self.config.quote().as_char();

        let _ = write!(out, "{indent}<{tag}");
        for (name, value) in element.attributes() {
            let text = match value {
                AttrValue::Literal(text) => text.clone(),
                AttrValue::Reference(slot) => {
                    symbolic(workspace, doc, ElementRef::new(doc.id(), id), slot)
                }
            };
            let _ = write!(out, " {name}={q}{}{q}", escape(&text, q));
        }

        if element.children().is_empty() {
            out.push_str("/>\n");
            return;
        }
        out.push_str(">\n");
        for child in element.children() {
            self.write_element(workspace, doc, *child, depth + 1, out);
        }
        let _ = writeln!(out, "{indent}</{tag}>");
    }
}

/// The text of a reference slot as seen from `referrer`.
fn symbolic(workspace: &Workspace, doc: &Document, referrer: ElementRef, slot: &RefSlot) -> String {
    let (target, spelled) = match slot {
        RefSlot::Unresolved(raw) => return raw.to_string(),
        RefSlot::Resolved { target, spelled } => (*target, spelled),
    };
    let key = workspace
        .element(target)
        .and_then(|element| element.key())
        .map_or_else(|| spelled.name().to_string(), |key| key.to_string());

    let local = match spelled {
        RefName::Parameter(_) => format!("${key}"),
        _ => key.clone(),
    };
    if target.document == referrer.document {
        return local;
    }

    // Scoped names reach other documents through a resolved connector or
    // component and carry no alias.
    let (original, separator) = match spelled {
        RefName::Qualified {
            alias, separator, ..
        } => (alias.as_str(), *separator),
        RefName::Plain(_) => match spelled.dotted() {
            Some((alias, _)) if bound_alias(doc, |name, _| name == alias).is_some() => {
                (alias, Separator::Dot)
            }
            _ => return local,
        },
        RefName::Parameter(_) => return local,
    };

    let alias = if bound_alias(doc, |name, _| name == original).is_some() {
        Some(original.to_string())
    } else {
        bound_alias(doc, |_, document| document == target.document)
    };
    match alias {
        Some(alias) => format!("{alias}{}{key}", separator.as_char()),
        None => spelled.to_string(),
    }
}

/// The first alias in `doc` satisfying `matches`: base tables first, then
/// the document table.
fn bound_alias(doc: &Document, matches: impl Fn(&str, DocumentId) -> bool) -> Option<String> {
    let base_tables = doc.root().into_iter().flat_map(|root| doc.preorder(root)).filter_map(|id| {
        doc.element(id)
            .filter(|element| element.kind().as_base().is_some())
            .map(|element| element.aliases())
    });
    base_tables
        .chain(std::iter::once(doc.aliases()))
        .flat_map(|table| table.iter())
        .find(|(alias, binding)| matches(alias, binding.document))
        .map(|(alias, _)| alias.to_string())
}

fn escape(text: &str, quote: char) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' if quote == '\'' => escaped.push_str("&apos;"),
            '"' if quote == '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::QuoteStyle, linker::Session, loader::MemoryLoader};

    fn write(source: &str, config: SerializerConfig) -> String {
        let mut session = Session::new(MemoryLoader::new());
        let doc = session.load_source("main.ncl", source).unwrap();
        Serializer::new(config)
            .serialize(session.workspace(), doc)
            .unwrap()
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b & 'c'", '\''), "a&lt;b &amp; &apos;c&apos;");
        assert_eq!(escape("say \"hi\"", '\''), "say \"hi\"");
        assert_eq!(escape("say \"hi\"", '"'), "say &quot;hi&quot;");
    }

    #[test]
    fn test_layout() {
        let out = write(
            "<ncl id=\"main\"><body><media id=\"m\" src=\"a&amp;b.mp4\"/></body></ncl>",
            SerializerConfig::default(),
        );
        assert_eq!(
            out,
            "<?xml version='1.0' encoding='UTF-8'?>\n\
             <ncl id='main'>\n  <body>\n    <media id='m' src='a&amp;b.mp4'/>\n  </body>\n</ncl>\n"
        );
    }

    #[test]
    fn test_double_quotes_without_declaration() {
        let out = write(
            "<ncl><body/></ncl>",
            SerializerConfig::new(QuoteStyle::Double, 4, false),
        );
        assert_eq!(out, "<ncl>\n    <body/>\n</ncl>\n");
    }

    #[test]
    fn test_renamed_target_is_written_with_new_key() {
        let mut session = Session::new(MemoryLoader::new());
        let doc = session
            .load_source(
                "main.ncl",
                "<ncl><head><connectorBase><causalConnector id='c'>\
                 <connectorParam name='var'/><simpleAction role='set' value='$var'/>\
                 </causalConnector></connectorBase></head></ncl>",
            )
            .unwrap();
        let ws = session.workspace_mut();
        let (param, _) = ws
            .document(doc)
            .unwrap()
            .elements()
            .find(|(_, e)| e.kind() == weft_core::schema::ElementKind::ConnectorParam)
            .unwrap();
        ws.set_literal(ElementRef::new(doc, param), "name", "level").unwrap();

        let out = session.serialize(doc).unwrap();
        assert!(out.contains("<connectorParam name='level'/>"));
        assert!(out.contains("<simpleAction role='set' value='$level'/>"));
    }
}
