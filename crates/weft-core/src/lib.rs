//! Weft Core Types and Definitions
//!
//! This crate provides the shared vocabulary for Weft presentation documents.
//! It includes:
//!
//! - **Identifiers**: Interned, grammar-checked keys ([`identifier::Id`])
//! - **Schema**: Element kinds, the scopes they are indexed in and the
//!   reference attributes they carry ([`schema`] module)
//! - **Reference names**: The `name` / `alias#name` / `alias.name` / `$name`
//!   grammar of reference attribute values ([`reference`] module)

pub mod identifier;
pub mod reference;
pub mod schema;
