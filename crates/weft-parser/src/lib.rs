//! # Weft Parser
//!
//! Source reading and diagnostics for Weft presentation documents. This
//! crate turns XML source text into element events and provides the
//! diagnostic types shared by every phase of the document lifecycle.
//!
//! ## Usage
//!
//! ```
//! # use weft_parser::{read_events, XmlEvent, error::ParseError};
//!
//! fn main() -> Result<(), ParseError> {
//!     let source = r#"
//!         <ncl id="hello">
//!           <body><media id="video1" src="intro.mp4"/></body>
//!         </ncl>
//!     "#;
//!
//!     let events = read_events(source)?;
//!     assert!(matches!(&events[0], XmlEvent::Start { tag, .. } if tag == "ncl"));
//!     Ok(())
//! }
//! ```

pub mod error;
mod event;
mod reader;
mod span;

pub use event::{Attribute, ElementSink, XmlEvent, XmlNode, feed};
pub use reader::{read_events, read_tree};
pub use span::Span;
