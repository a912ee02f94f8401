//! Unique ID generation for graph nodes.

use uuid::Uuid;

use crate::types::NodeId;

/// Source of fresh node IDs.
///
/// A generator must never repeat an ID it has handed out. The graph still
/// checks each ID against its index and draws again on collision.
pub trait IdGenerator {
    /// Produce the next ID.
    fn next_id(&mut self) -> NodeId;

    /// Independent copy continuing from the current state, used by graph clones.
    fn fork(&self) -> Box<dyn IdGenerator>;
}

/// Random UUID v4 IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&mut self) -> NodeId {
        NodeId(Uuid::new_v4().to_string())
    }

    fn fork(&self) -> Box<dyn IdGenerator> {
        Box::new(*self)
    }
}

/// Monotonic counter IDs: `{prefix}1`, `{prefix}2`, ...
#[derive(Debug, Clone)]
pub struct SequentialGenerator {
    prefix: String,
    next: u64,
}

impl SequentialGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl Default for SequentialGenerator {
    fn default() -> Self {
        Self::new("")
    }
}

impl IdGenerator for SequentialGenerator {
    fn next_id(&mut self) -> NodeId {
        let id = NodeId(format!("{}{}", self.prefix, self.next));
        self.next += 1;
        id
    }

    fn fork(&self) -> Box<dyn IdGenerator> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_uuid_ids_are_unique() {
        let mut gen = UuidGenerator;
        let ids: HashSet<NodeId> = (0..100).map(|_| gen.next_id()).collect();
        assert_eq!(ids.len(), 100);
        assert!(Uuid::parse_str(ids.iter().next().unwrap().as_str()).is_ok());
    }

    #[test]
    fn test_sequential_fork_continues() {
        let mut gen = SequentialGenerator::new("n");
        assert_eq!(gen.next_id(), NodeId::from("n1"));
        assert_eq!(gen.next_id(), NodeId::from("n2"));

        let mut fork = gen.fork();
        assert_eq!(fork.next_id(), NodeId::from("n3"));
        assert_eq!(gen.next_id(), NodeId::from("n3"));
    }
}
