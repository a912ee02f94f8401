//! Strand Graph: an embeddable in-memory property graph.
//!
//! Vertices and edges carry open JSON property bags. Queries are built from
//! chainable, immutable [`Traversal`] steps whose lineage can be revisited by
//! name. [`Graph::learn`] upserts batches of loosely-typed facts, and
//! [`Graph::manifest`] materializes the graph as directly linked handles.
//!
//! All handles are single-threaded (`Rc`/`RefCell`).

pub mod graph;
pub mod learn;
pub mod manifest;
pub mod traversal;

pub use graph::{Graph, Selector};
pub use learn::Refs;
pub use manifest::{Manifest, ManifestEdge, ManifestVertex};
pub use traversal::{merge, Branch, Projection, Selection, Traversal};

pub use strand_core::{
    Direction, GraphConfig, GraphError, IdGenerator, IdStrategy, Node, NodeId, NodeKind, NodeRef,
    Properties, Result, SequentialGenerator, Snapshot, UuidGenerator,
};
