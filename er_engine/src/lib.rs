//! # ER Engine
//!
//! The runtime half of the entity-relationship graph. This crate materializes
//! records into an in-memory graph according to an [`er_schema::Schema`], then
//! either drains it into random-walk prose or mines it for question/answer sets.
//!
//! ## Core Components
//!
//! - **database**: The graph instance and the record-to-graph builder
//! - **walk**: Destructive random walks over a text-walk graph
//! - **proposal**: Breadth-first path expansion into list, count and choice questions
//! - **config**: TOML-loadable engine settings
//!
//! ## Design Philosophy
//!
//! - **Mode-Driven**: One closed [`er_schema::Mode`] decides what instances carry
//! - **Lookup, Not Pointers**: Crossings name their target by key and may miss
//! - **Explicit State**: Counters and statistics live in a build context passed by the caller

pub mod config;
pub mod database;
pub mod error;
pub mod proposal;
pub mod walk;

#[cfg(test)]
mod test_support;

pub use config::*;
pub use database::*;
pub use error::*;
pub use proposal::*;
pub use walk::*;
