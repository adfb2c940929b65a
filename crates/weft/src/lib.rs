//! Weft - a document model and reference linker for declarative multimedia
//! presentations.
//!
//! Documents are XML-shaped trees rooted at `ncl`. Besides containment,
//! their elements refer to each other by name: a media names its
//! descriptor, a link names its connector, a bind names a role of that
//! connector. Weft builds the tree, binds every such name to a live element
//! (across imported documents too), keeps the graph consistent under
//! editing, and writes it back to text.
//!
//! # Examples
//!
//! ```
//! use weft::{Session, loader::MemoryLoader};
//!
//! let loader = MemoryLoader::new()
//!     .with_document(
//!         "rules.ncl",
//!         "<ncl><head><ruleBase><rule id='r1' var='lang' comparator='eq' value='en'/></ruleBase></head></ncl>",
//!     )
//!     .with_document(
//!         "main.ncl",
//!         "<ncl><head><ruleBase><importBase alias='b' documentURI='rules.ncl'/></ruleBase></head>\
//!          <body><switch id='sw'><bindRule constituent='en' rule='b#r1'/><media id='en'/></switch></body></ncl>",
//!     );
//!
//! let mut session = Session::new(loader);
//! let main = session.load("main.ncl").expect("Failed to load");
//! assert!(session.report(main).unwrap().is_clean());
//!
//! let text = session.serialize(main).expect("Failed to serialize");
//! assert!(text.contains("rule='b#r1'"));
//! ```

pub mod alias;
pub mod builder;
pub mod config;
pub mod linker;
pub mod loader;
pub mod model;
pub mod observer;
pub mod queue;
pub mod resolve;
pub mod serialize;
pub mod symbols;

mod error;

pub use weft_core::{identifier, reference, schema};

pub use error::WeftError;
pub use linker::{LinkReport, Session, UnresolvedReference};
