//! Diagnostics for Weft documents.
//!
//! A [`Diagnostic`] carries a severity, an optional [`ErrorCode`], labeled
//! spans into the document source and help text. Reading and building stop
//! at the first stage that reports an error and return every diagnostic of
//! that stage as a [`ParseError`]. Linking never fails a load; its
//! diagnostics are attached to the referring element instead.
//!
//! ```
//! # use weft_parser::error::{Diagnostic, ErrorCode};
//! # use weft_parser::Span;
//! let diag = Diagnostic::error("id `video1` is defined multiple times")
//!     .with_code(ErrorCode::E201)
//!     .with_label(Span::new(100..120), "duplicate definition")
//!     .with_secondary_label(Span::new(50..70), "first defined here")
//!     .with_help("ids must be unique within their scope");
//!
//! assert_eq!(diag.labels().len(), 2);
//! ```

mod collector;
mod diagnostic;
mod error_code;
mod label;
mod parse_error;
mod severity;

pub use collector::DiagnosticCollector;
pub use diagnostic::Diagnostic;
pub use error_code::ErrorCode;
pub use label::{Label, LabelStyle};
pub use parse_error::ParseError;
pub use severity::Severity;
