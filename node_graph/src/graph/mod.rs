//! Graph elements - nodes and the typed connections between them.

mod connection;
mod node;

pub use connection::*;
pub use node::*;
