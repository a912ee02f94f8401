//! strand-core: Shared types and primitives for the strand property graph.
//!
//! This crate provides the pieces the graph engine is built from:
//! - Node types (Vertex, Edge) with open JSON property bags and adjacency lists
//! - The shared `NodeRef` handle through which traversals alias live nodes
//! - Structural equality and pattern matching over dynamic values
//! - Pluggable unique-ID generation
//! - Configuration management
//! - The graph error taxonomy

pub mod config;
pub mod error;
pub mod ids;
pub mod types;
pub mod value;

pub use config::{GraphConfig, IdStrategy};
pub use error::{GraphError, Result};
pub use ids::{IdGenerator, SequentialGenerator, UuidGenerator};
pub use types::{
    Adjacency, Direction, Edge, Node, NodeId, NodeKind, NodeRef, Properties, Snapshot, Vertex,
};
