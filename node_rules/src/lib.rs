//! # Node Rules
//!
//! The vocabulary crate for the interactive node graph. It defines what nodes and
//! relations *are* - identifiers, lifecycle states, relation semantics, capability
//! configurations, spawn descriptors and system configuration - and contains no
//! engine logic of its own.
//!
//! ## Core Components
//!
//! - **entities**: Node identity, node types/states/classes, tags, positions and spawn specs
//! - **mechanics**: Relation types and their propagation table, interaction and capability data
//! - **loader**: JSON descriptor loading with lenient string-to-enum mapping
//! - **config**: TOML-backed configuration for the graph manager

pub mod config;
pub mod entities;
pub mod loader;
pub mod mechanics;

pub use config::*;
pub use entities::*;
pub use loader::*;
pub use mechanics::*;
