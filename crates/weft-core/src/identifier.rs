//! Interned names.
//!
//! Every key a document indexes is an [`Id`]: element ids, connector role
//! and parameter names, import aliases. Symbol tables hash and compare the
//! interned symbol rather than the text.
//!
//! Names follow `[_:A-Za-z][-._:A-Za-z0-9]*`. [`Id::parse`] enforces that;
//! [`Id::new`] is for text that was already checked.

use std::{
    fmt,
    sync::{Mutex, MutexGuard, OnceLock, PoisonError},
};

use string_interner::{DefaultStringInterner, DefaultSymbol};
use thiserror::Error;

static INTERNER: OnceLock<Mutex<DefaultStringInterner>> = OnceLock::new();

// The interner only ever grows, so a poisoned lock still guards a usable table.
fn interner() -> MutexGuard<'static, DefaultStringInterner> {
    INTERNER
        .get_or_init(|| Mutex::new(DefaultStringInterner::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{0}` is not a valid identifier")]
pub struct InvalidId(pub String);

/// Checks `name` against the identifier grammar.
///
/// ```
/// use weft_core::identifier::is_valid_identifier;
///
/// assert!(is_valid_identifier("video1"));
/// assert!(is_valid_identifier("_a.b-c:d"));
/// assert!(!is_valid_identifier("1video"));
/// assert!(!is_valid_identifier(""));
/// ```
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_' || first == ':') {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | ':'))
}

/// An interned document name.
///
/// ```
/// use weft_core::identifier::Id;
///
/// let media = Id::parse("video1").unwrap();
/// assert_eq!(media, "video1");
/// assert_eq!(media, Id::new("video1"));
///
/// assert!(Id::parse("9lives").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id(DefaultSymbol);

impl Id {
    /// Interns `name` as is.
    pub fn new(name: &str) -> Self {
        Self(interner().get_or_intern(name))
    }

    /// Interns `name` if it is a valid identifier.
    ///
    /// # Errors
    ///
    /// [`InvalidId`] when `name` is empty or falls outside the grammar.
    pub fn parse(name: &str) -> Result<Self, InvalidId> {
        if is_valid_identifier(name) {
            Ok(Self::new(name))
        } else {
            Err(InvalidId(name.to_string()))
        }
    }

    fn with_text<R>(self, f: impl FnOnce(&str) -> R) -> R {
        let interner = interner();
        // Symbols are only minted by this interner.
        f(interner.resolve(self.0).unwrap_or_default())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.with_text(str::to_owned);
        f.write_str(&text)
    }
}

impl std::str::FromStr for Id {
    type Err = InvalidId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        self.with_text(|text| text == other)
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}
