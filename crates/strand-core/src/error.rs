use thiserror::Error;

use crate::types::{NodeId, NodeKind};

/// Errors raised by graph storage, traversal steps, and knowledge ingestion.
///
/// Every error is raised synchronously at the violating call. Single-step
/// operations leave the graph unchanged on failure; `learn` does not roll
/// back facts committed before the failing one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Expected {expected}, got {found}")]
    Validation { expected: NodeKind, found: NodeKind },

    #[error("Expected 1 {kind}. Got {found}.")]
    Cardinality { kind: NodeKind, found: usize },

    #[error("Expected non-empty string as label, got {0:?}")]
    InvalidLabel(String),

    #[error("Properties must be an object or null, got {0}")]
    InvalidProperties(String),

    #[error("Field {0:?} is reserved and cannot be written as a property")]
    ReservedField(String),

    #[error("Duplicate @rid: {0}")]
    DuplicateId(NodeId),

    #[error("ID generator repeated taken IDs {attempts} times in a row")]
    IdExhausted { attempts: u32 },

    #[error("Unknown {field} ref: {reference}")]
    UnknownReference { field: String, reference: String },

    #[error("Cannot infer node type: {0}")]
    TypeInference(String),

    #[error("Expected 1 item to be deleted. Got {removed}.")]
    Consistency { id: NodeId, removed: usize },

    #[error("Invalid snapshot record: {0}")]
    InvalidRecord(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for GraphError {
    fn from(err: config::ConfigError) -> Self {
        GraphError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
