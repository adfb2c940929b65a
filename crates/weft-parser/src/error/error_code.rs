//! Stable codes for diagnostics, one block of a hundred per phase: `E0xx` for
//! tokens the reader rejects, `E1xx` for markup structure, `E2xx` for the
//! document model and `E3xx` for linking.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // reader lexical errors
    /// Unterminated attribute value.
    ///
    /// An attribute value was opened with a quote but never closed.
    E001,

    /// A character that cannot appear at this point of a tag.
    E002,

    /// Invalid character reference.
    ///
    /// An `&...;` sequence is neither a predefined entity (`&amp;`, `&lt;`,
    /// `&gt;`, `&quot;`, `&apos;`) nor a valid numeric reference.
    E003,

    /// Unterminated comment or processing instruction.
    E004,

    /// Duplicate attribute.
    ///
    /// The same attribute name appears twice in one start tag.
    E005,

    // reader structure errors
    /// Malformed tag.
    ///
    /// A start or end tag could not be read.
    E100,

    /// The input ended while elements were still open.
    E101,

    /// Mismatched closing tag.
    ///
    /// An end tag does not match the innermost open element.
    E102,

    /// Content outside the root element.
    ///
    /// A second root element or stray text follows the root element.
    E103,

    /// Missing root element.
    E104,

    // model structure errors
    /// Invalid identifier.
    ///
    /// A key does not match `[_:A-Za-z][-._:A-Za-z0-9]*`.
    E200,

    /// Duplicate id.
    ///
    /// Two elements share a key within the scope that indexes them.
    E201,

    /// Duplicate alias.
    ///
    /// An import alias is bound twice in the same alias table.
    E202,

    /// Invalid nesting.
    ///
    /// An element was placed where the model cannot attach it.
    E203,

    /// Missing required attribute.
    E204,

    /// Unknown element.
    ///
    /// The tag is not recognized; the element and its content are skipped.
    E205,

    /// Import depth exceeded.
    E206,

    /// Imported document could not be loaded.
    E207,

    // linking errors
    /// Unresolved reference.
    ///
    /// No element with this name exists in the scope searched.
    E300,

    /// Unknown alias.
    ///
    /// A qualified name uses an alias that is not bound in scope.
    E301,

    /// Missing scope.
    ///
    /// The scope a reference must be searched in does not exist (no base of
    /// the expected kind, no enclosing connector, unresolved component).
    E302,

    /// Circular import.
    E303,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            // Reader lexical errors
            ErrorCode::E001 => "E001",
            ErrorCode::E002 => "E002",
            ErrorCode::E003 => "E003",
            ErrorCode::E004 => "E004",
            ErrorCode::E005 => "E005",
            // Reader structure errors
            ErrorCode::E100 => "E100",
            ErrorCode::E101 => "E101",
            ErrorCode::E102 => "E102",
            ErrorCode::E103 => "E103",
            ErrorCode::E104 => "E104",
            // Model structure errors
            ErrorCode::E200 => "E200",
            ErrorCode::E201 => "E201",
            ErrorCode::E202 => "E202",
            ErrorCode::E203 => "E203",
            ErrorCode::E204 => "E204",
            ErrorCode::E205 => "E205",
            ErrorCode::E206 => "E206",
            ErrorCode::E207 => "E207",
            // Linking errors
            ErrorCode::E300 => "E300",
            ErrorCode::E301 => "E301",
            ErrorCode::E302 => "E302",
            ErrorCode::E303 => "E303",
        }
    }

    /// One-line summary, as listed in the code index.
    pub fn description(&self) -> &'static str {
        match self {
            // Reader lexical errors
            ErrorCode::E001 => "unterminated attribute value",
            ErrorCode::E002 => "unexpected character",
            ErrorCode::E003 => "invalid character reference",
            ErrorCode::E004 => "unterminated comment",
            ErrorCode::E005 => "duplicate attribute",
            // Reader structure errors
            ErrorCode::E100 => "malformed tag",
            ErrorCode::E101 => "incomplete input",
            ErrorCode::E102 => "mismatched closing tag",
            ErrorCode::E103 => "content outside root element",
            ErrorCode::E104 => "missing root element",
            // Model structure errors
            ErrorCode::E200 => "invalid identifier",
            ErrorCode::E201 => "duplicate id",
            ErrorCode::E202 => "duplicate alias",
            ErrorCode::E203 => "invalid nesting",
            ErrorCode::E204 => "missing required attribute",
            ErrorCode::E205 => "unknown element",
            ErrorCode::E206 => "import depth exceeded",
            ErrorCode::E207 => "import failed",
            // Linking errors
            ErrorCode::E300 => "unresolved reference",
            ErrorCode::E301 => "unknown alias",
            ErrorCode::E302 => "missing scope",
            ErrorCode::E303 => "circular import",
        }
    }

    /// Returns `true` for codes produced by the drain phase of linking.
    pub fn is_linking(&self) -> bool {
        matches!(self, ErrorCode::E300 | ErrorCode::E301 | ErrorCode::E302)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(ErrorCode::E005.to_string(), "E005");
        assert_eq!(format!("[{}]", ErrorCode::E207), "[E207]");

        assert_eq!(ErrorCode::E001.description(), "unterminated attribute value");
        assert_eq!(ErrorCode::E201.description(), "duplicate id");
        assert_eq!(ErrorCode::E303.description(), "circular import");
    }

    #[test]
    fn test_linking_codes() {
        assert!(ErrorCode::E300.is_linking());
        assert!(ErrorCode::E302.is_linking());
        assert!(!ErrorCode::E201.is_linking());
        assert!(!ErrorCode::E303.is_linking());
    }
}
