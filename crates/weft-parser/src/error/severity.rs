use std::fmt;

/// How bad a [`Diagnostic`](super::Diagnostic) is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Aborts a build, or leaves a reference unresolved when raised by the
    /// linker.
    Error,
    /// Stays on the element and never stops a load.
    Warning,
}

impl Severity {
    pub fn is_error(self) -> bool {
        self == Severity::Error
    }

    pub fn is_warning(self) -> bool {
        self == Severity::Warning
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        })
    }
}
