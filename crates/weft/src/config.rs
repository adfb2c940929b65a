//! Configuration types for loading, linking and writing documents.
//!
//! All types implement [`serde::Deserialize`] so they can be loaded from
//! external sources; every field has a default.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining linker and serializer settings.
//! - [`LinkerConfig`] - Limits applied while loading imports.
//! - [`SerializerConfig`] - Output formatting.
//!
//! # Example
//!
//! ```
//! # use weft::config::{AppConfig, QuoteStyle};
//! let config = AppConfig::default();
//! assert_eq!(config.linker().max_import_depth(), 16);
//! assert_eq!(config.serializer().quote(), QuoteStyle::Single);
//! ```

use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    linker: LinkerConfig,

    #[serde(default)]
    serializer: SerializerConfig,
}

impl AppConfig {
    pub fn new(linker: LinkerConfig, serializer: SerializerConfig) -> Self {
        Self { linker, serializer }
    }

    pub fn linker(&self) -> &LinkerConfig {
        &self.linker
    }

    pub fn serializer(&self) -> &SerializerConfig {
        &self.serializer
    }
}

/// Limits applied by the session while loading imports.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkerConfig {
    /// How many imports may be nested below the top-level document.
    #[serde(default = "default_max_import_depth")]
    max_import_depth: usize,
}

fn default_max_import_depth() -> usize {
    16
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            max_import_depth: default_max_import_depth(),
        }
    }
}

impl LinkerConfig {
    pub fn new(max_import_depth: usize) -> Self {
        Self { max_import_depth }
    }

    pub fn max_import_depth(&self) -> usize {
        self.max_import_depth
    }
}

/// The quote character used around attribute values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStyle {
    #[default]
    Single,
    Double,
}

impl QuoteStyle {
    pub fn as_char(self) -> char {
        match self {
            QuoteStyle::Single => '\'',
            QuoteStyle::Double => '"',
        }
    }
}

/// Output formatting for [`Serializer`](crate::serialize::Serializer).
#[derive(Debug, Clone, Deserialize)]
pub struct SerializerConfig {
    #[serde(default)]
    quote: QuoteStyle,

    /// Spaces per nesting level.
    #[serde(default = "default_indent")]
    indent: usize,

    /// Write `<?xml version="1.0" encoding="UTF-8"?>` first.
    #[serde(default = "default_xml_declaration")]
    xml_declaration: bool,
}

fn default_indent() -> usize {
    2
}

fn default_xml_declaration() -> bool {
    true
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            quote: QuoteStyle::default(),
            indent: default_indent(),
            xml_declaration: default_xml_declaration(),
        }
    }
}

impl SerializerConfig {
    pub fn new(quote: QuoteStyle, indent: usize, xml_declaration: bool) -> Self {
        Self {
            quote,
            indent,
            xml_declaration,
        }
    }

    pub fn quote(&self) -> QuoteStyle {
        self.quote
    }

    pub fn indent(&self) -> usize {
        self.indent
    }

    pub fn xml_declaration(&self) -> bool {
        self.xml_declaration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [serializer]
            quote = "double"
            "#,
        )
        .unwrap();

        assert_eq!(config.serializer().quote(), QuoteStyle::Double);
        assert_eq!(config.serializer().indent(), 2);
        assert!(config.serializer().xml_declaration());
        assert_eq!(config.linker().max_import_depth(), 16);
    }

    #[test]
    fn test_full_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [linker]
            max_import_depth = 3

            [serializer]
            quote = "single"
            indent = 4
            xml_declaration = false
            "#,
        )
        .unwrap();

        assert_eq!(config.linker().max_import_depth(), 3);
        assert_eq!(config.serializer().indent(), 4);
        assert!(!config.serializer().xml_declaration());
    }

    #[test]
    fn test_unknown_quote_style_is_rejected() {
        let result: Result<AppConfig, _> = toml::from_str("[serializer]\nquote = \"backtick\"");
        assert!(result.is_err());
    }
}
