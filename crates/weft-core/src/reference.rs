//! Reference-name grammar.
//!
//! A reference attribute value is one of:
//!
//! - `name` - a local name,
//! - `alias#name` - a name in the document imported under `alias`,
//! - `alias.name` - same, but only when `alias` is bound in scope; the id
//!   grammar allows `.`, so this form is decided by the resolver,
//! - `$name` - a connector parameter, inside a connector body.

use std::fmt;

/// Separator between an alias and a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Separator {
    Hash,
    Dot,
}

impl Separator {
    pub fn as_char(self) -> char {
        match self {
            Separator::Hash => '#',
            Separator::Dot => '.',
        }
    }
}

/// A parsed reference attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefName {
    /// A name without `#` or `$`. May still be `alias.name`.
    Plain(String),
    /// `$name`.
    Parameter(String),
    /// An alias-qualified name.
    Qualified {
        alias: String,
        separator: Separator,
        name: String,
    },
}

impl RefName {
    /// Parse a raw attribute value.
    ///
    /// # Examples
    ///
    /// ```
    /// use weft_core::reference::{RefName, Separator};
    ///
    /// assert_eq!(RefName::parse("r1"), RefName::Plain("r1".into()));
    /// assert_eq!(RefName::parse("$delay"), RefName::Parameter("delay".into()));
    /// assert_eq!(
    ///     RefName::parse("b#r1"),
    ///     RefName::Qualified { alias: "b".into(), separator: Separator::Hash, name: "r1".into() }
    /// );
    /// ```
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(param) = raw.strip_prefix('$') {
            return RefName::Parameter(param.to_string());
        }
        match raw.split_once('#') {
            Some((alias, name)) => RefName::Qualified {
                alias: alias.to_string(),
                separator: Separator::Hash,
                name: name.to_string(),
            },
            None => RefName::Plain(raw.to_string()),
        }
    }

    /// Returns `true` if the raw value denotes a connector parameter.
    pub fn is_parameter_syntax(raw: &str) -> bool {
        raw.trim_start().starts_with('$')
    }

    /// The local name, ignoring any alias.
    pub fn name(&self) -> &str {
        match self {
            RefName::Plain(name) | RefName::Parameter(name) => name,
            RefName::Qualified { name, .. } => name,
        }
    }

    /// Splits `alias.name` at the first dot, for the resolver to try as a
    /// qualified name.
    pub fn dotted(&self) -> Option<(&str, &str)> {
        match self {
            RefName::Plain(name) => name
                .split_once('.')
                .filter(|(alias, rest)| !alias.is_empty() && !rest.is_empty()),
            _ => None,
        }
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefName::Plain(name) => write!(f, "{name}"),
            RefName::Parameter(name) => write!(f, "${name}"),
            RefName::Qualified {
                alias,
                separator,
                name,
            } => write!(f, "{alias}{}{name}", separator.as_char()),
        }
    }
}
