//! # ER Schema
//!
//! The definition layer of the entity-relationship graph. This crate describes
//! *what* can be loaded: entity types, relationship types, the line-oriented
//! definition file that declares them, and the record sources and templates the
//! loader reads through. It holds no graph state.
//!
//! ## Core Components
//!
//! - **types**: Entity and relationship type descriptors, polymorphic over [`Mode`]
//! - **definition**: The definition-file loader producing a [`Schema`]
//! - **record**: Named-field records read from tab-delimited or JSON files
//! - **template**: `{{field}}` substitution used by text-walk specifications

pub mod definition;
pub mod error;
pub mod record;
pub mod template;
pub mod types;

pub use definition::*;
pub use error::*;
pub use record::*;
pub use template::*;
pub use types::*;
