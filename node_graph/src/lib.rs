//! # Node Graph
//!
//! The engine of the interactive node system. Nodes (scenes, items, triggers,
//! story beats) are linked by typed relations through which state changes,
//! interactions and story events propagate. A single [`GraphManager`] owns every
//! node and connection, keeps the lookup indices, and runs the rate-limited
//! generation pipeline.
//!
//! ## Core Components
//!
//! - **graph**: The node state machine and the per-relation propagation policy
//! - **capability**: The six pluggable item behaviours and their effects
//! - **manager**: Registries, queries, propagation cascades, scenes, timers and the generation queue
//! - **events**: Notifications emitted to explicitly subscribed observers
//!
//! ## Design Philosophy
//!
//! - **Single Owner**: The manager owns all nodes and connections; everything else holds IDs
//! - **Deterministic**: Insertion-ordered registries and a sequenced timer queue make runs reproducible
//! - **Forgiving**: Invalid requests are logged and rejected, never fatal

pub mod capability;
pub mod error;
pub mod events;
pub mod graph;
pub mod manager;

pub use capability::*;
pub use error::*;
pub use events::*;
pub use graph::*;
pub use manager::*;
