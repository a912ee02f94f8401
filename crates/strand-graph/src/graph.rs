//! Graph storage: node sequences, the shared ID index, and mutation primitives.
//!
//! The graph is an arena. Vertices and edges live in insertion-ordered
//! sequences, a single ID→node index spans both kinds, and relations between
//! nodes (adjacency lists, edge endpoints) are stored as IDs.

use std::cell::{Ref, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use strand_core::types::{IN, LABEL, OUT, RID, TYPE};
use strand_core::{
    Adjacency, Direction, Edge, GraphConfig, GraphError, IdGenerator, Node, NodeId, NodeKind,
    NodeRef, Properties, Result, Snapshot, UuidGenerator, Vertex,
};

use crate::traversal::Traversal;

const DEFAULT_MAX_ID_ATTEMPTS: u32 = 16;

// ── Store ────────────────────────────────────────────────────────

pub(crate) struct Store {
    pub(crate) vertices: Vec<NodeRef>,
    pub(crate) edges: Vec<NodeRef>,
    index: HashMap<NodeId, NodeRef>,
    ids: Box<dyn IdGenerator>,
    max_id_attempts: u32,
}

impl Store {
    fn new(ids: Box<dyn IdGenerator>, max_id_attempts: u32) -> Self {
        Self {
            vertices: Vec::new(),
            edges: Vec::new(),
            index: HashMap::new(),
            ids,
            max_id_attempts: max_id_attempts.max(1),
        }
    }

    pub(crate) fn lookup(&self, id: &NodeId) -> Option<NodeRef> {
        self.index.get(id).cloned()
    }

    /// The handle is the one this graph currently indexes under its ID.
    pub(crate) fn is_registered(&self, node: &NodeRef) -> bool {
        self.index
            .get(&node.id())
            .is_some_and(|indexed| NodeRef::ptr_eq(indexed, node))
    }

    fn register(&mut self, node: &NodeRef) -> Result<()> {
        let id = node.id();
        if self.index.contains_key(&id) {
            return Err(GraphError::DuplicateId(id));
        }
        self.index.insert(id, node.clone());
        Ok(())
    }

    /// Draw until the generator yields an unused ID.
    ///
    /// Colliding draws are fine as long as they keep producing new candidates
    /// (a sequential generator walking past imported IDs). Only a run of
    /// `max_id_attempts` already-tried candidates gives up.
    fn fresh_id(&mut self) -> Result<NodeId> {
        let mut tried = HashSet::new();
        let mut repeats = 0;
        while repeats < self.max_id_attempts {
            let id = self.ids.next_id();
            if !self.index.contains_key(&id) {
                return Ok(id);
            }
            if tried.insert(id) {
                repeats = 0;
            } else {
                repeats += 1;
            }
        }
        Err(GraphError::IdExhausted {
            attempts: self.max_id_attempts,
        })
    }

    fn insert_vertex(&mut self, vertex: Vertex) -> Result<NodeRef> {
        let node = NodeRef::new(Node::Vertex(vertex));
        self.register(&node)?;
        self.vertices.push(node.clone());
        Ok(node)
    }

    /// Register an edge whose endpoints are already indexed vertices and wire
    /// its ID into both endpoints' adjacency lists.
    fn insert_edge(&mut self, edge: Edge) -> Result<NodeRef> {
        let out_v = self.endpoint(&edge.out_v)?;
        let in_v = self.endpoint(&edge.in_v)?;
        let (id, label) = (edge.id.clone(), edge.label.clone());

        let node = NodeRef::new(Node::Edge(edge));
        self.register(&node)?;
        attach(&out_v, Direction::Out, &label, &id);
        attach(&in_v, Direction::In, &label, &id);
        self.edges.push(node.clone());
        Ok(node)
    }

    fn endpoint(&self, id: &NodeId) -> Result<NodeRef> {
        match self.lookup(id) {
            Some(node) if node.is_vertex() => Ok(node),
            Some(node) => Err(GraphError::Validation {
                expected: NodeKind::Vertex,
                found: node.kind(),
            }),
            None => Err(GraphError::Cardinality {
                kind: NodeKind::Vertex,
                found: 0,
            }),
        }
    }

    fn remove(&mut self, node: &NodeRef) -> Result<()> {
        if !self.is_registered(node) {
            tracing::debug!(id = %node.id(), "Skipping removal of unregistered node");
            return Ok(());
        }

        let snapshot = node.snapshot();
        match &snapshot {
            Node::Vertex(vertex) => {
                for edge_id in vertex.adjacency.edge_ids() {
                    if let Some(edge) = self.lookup(&edge_id) {
                        self.remove(&edge)?;
                    }
                }
            }
            Node::Edge(edge) => {
                let endpoints = [(Direction::Out, &edge.out_v), (Direction::In, &edge.in_v)];
                for (direction, endpoint) in endpoints {
                    if let Some(vertex) = self.lookup(endpoint) {
                        if let Some(v) = vertex.borrow_mut().as_vertex_mut() {
                            v.adjacency.detach(direction, &edge.label, &edge.id);
                        }
                    }
                }
            }
        }
        self.unlink(node, snapshot.kind(), snapshot.id())
    }

    fn unlink(&mut self, node: &NodeRef, kind: NodeKind, id: &NodeId) -> Result<()> {
        let sequence = match kind {
            NodeKind::Vertex => &mut self.vertices,
            NodeKind::Edge => &mut self.edges,
        };
        let before = sequence.len();
        sequence.retain(|n| !NodeRef::ptr_eq(n, node));
        let removed = before - sequence.len();
        if removed != 1 {
            tracing::warn!(id = %id, removed, "Node sequence out of sync with index");
            return Err(GraphError::Consistency {
                id: id.clone(),
                removed,
            });
        }
        self.index.remove(id);
        tracing::debug!(id = %id, kind = %kind, "Node removed");
        Ok(())
    }

    fn deep_copy(&self) -> Self {
        let copy = |n: &NodeRef| NodeRef::new(n.snapshot());
        let vertices: Vec<NodeRef> = self.vertices.iter().map(copy).collect();
        let edges: Vec<NodeRef> = self.edges.iter().map(copy).collect();
        let index = vertices
            .iter()
            .chain(edges.iter())
            .map(|n| (n.id(), n.clone()))
            .collect();
        Self {
            vertices,
            edges,
            index,
            ids: self.ids.fork(),
            max_id_attempts: self.max_id_attempts,
        }
    }
}

fn attach(vertex: &NodeRef, direction: Direction, label: &str, edge: &NodeId) {
    if let Some(v) = vertex.borrow_mut().as_vertex_mut() {
        v.adjacency.attach(direction, label, edge.clone());
    }
}

// ── Selector ─────────────────────────────────────────────────────

/// Anything that can name edge endpoints: a traversal, a list of nodes, or one node.
///
/// Endpoint selectors must resolve to exactly one registered vertex.
#[derive(Debug, Clone)]
pub enum Selector {
    Traversal(Traversal),
    Nodes(Vec<NodeRef>),
    Node(NodeRef),
}

impl Selector {
    fn into_nodes(self) -> Vec<NodeRef> {
        match self {
            Selector::Traversal(t) => t.to_vec(),
            Selector::Nodes(nodes) => nodes,
            Selector::Node(node) => vec![node],
        }
    }
}

impl From<Traversal> for Selector {
    fn from(t: Traversal) -> Self {
        Selector::Traversal(t)
    }
}

impl From<&Traversal> for Selector {
    fn from(t: &Traversal) -> Self {
        Selector::Traversal(t.clone())
    }
}

impl From<Vec<NodeRef>> for Selector {
    fn from(nodes: Vec<NodeRef>) -> Self {
        Selector::Nodes(nodes)
    }
}

impl From<NodeRef> for Selector {
    fn from(node: NodeRef) -> Self {
        Selector::Node(node)
    }
}

impl From<&NodeRef> for Selector {
    fn from(node: &NodeRef) -> Self {
        Selector::Node(node.clone())
    }
}

// ── Graph ────────────────────────────────────────────────────────

/// An embeddable in-memory property graph.
///
/// `Clone` produces an independent deep copy. Traversals created from a graph
/// share its storage and see every later mutation.
pub struct Graph {
    store: Rc<RefCell<Store>>,
}

impl Graph {
    /// Create an empty graph with UUID node IDs.
    pub fn new() -> Self {
        Self::with_id_generator(UuidGenerator)
    }

    /// Create an empty graph from configuration.
    pub fn with_config(config: &GraphConfig) -> Self {
        Self::from_store(Store::new(config.id_generator(), config.max_id_attempts))
    }

    /// Create an empty graph drawing IDs from a custom generator.
    pub fn with_id_generator(ids: impl IdGenerator + 'static) -> Self {
        Self::from_store(Store::new(Box::new(ids), DEFAULT_MAX_ID_ATTEMPTS))
    }

    /// Build a graph from a raw snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        let graph = Self::new();
        graph.import(snapshot)?;
        Ok(graph)
    }

    fn from_store(store: Store) -> Self {
        Self {
            store: Rc::new(RefCell::new(store)),
        }
    }

    /// Another handle onto the same storage.
    pub(crate) fn share(&self) -> Graph {
        Graph {
            store: Rc::clone(&self.store),
        }
    }

    pub(crate) fn store(&self) -> Ref<'_, Store> {
        self.store.borrow()
    }

    // ── Mutation ─────────────────────────────────────────────────

    /// Add a vertex and return a single-node traversal over it.
    ///
    /// A string `@rid` in `properties` is used as the vertex ID instead of a
    /// generated one. `@type` is ignored.
    pub fn add_vertex(&self, properties: impl Into<Value>) -> Result<Traversal> {
        let vertex = self.insert_vertex(into_properties(properties.into())?)?;
        Ok(Traversal::root(self.share(), vec![vertex]))
    }

    pub(crate) fn insert_vertex(&self, mut properties: Properties) -> Result<NodeRef> {
        properties.remove(TYPE);
        let mut store = self.store.borrow_mut();
        let id = take_id(&mut properties, &mut store)?;
        let vertex = store.insert_vertex(Vertex {
            id,
            properties,
            adjacency: Adjacency::default(),
        })?;
        tracing::debug!(id = %vertex.id(), "Vertex added");
        Ok(vertex)
    }

    /// Add a `label` edge from the `out_v` vertex to the `in_v` vertex.
    ///
    /// Each selector must resolve to exactly one vertex registered in this
    /// graph. `out`, `in` and `label` keys in `properties` are ignored.
    pub fn add_edge(
        &self,
        out_v: impl Into<Selector>,
        in_v: impl Into<Selector>,
        label: &str,
        properties: impl Into<Value>,
    ) -> Result<Traversal> {
        let out_v = self.single_vertex(out_v.into())?;
        let in_v = self.single_vertex(in_v.into())?;
        let edge = self.connect(&out_v, &in_v, label, into_properties(properties.into())?)?;
        Ok(Traversal::root(self.share(), vec![edge]))
    }

    /// Create one edge between two vertices already known to be valid endpoints.
    pub(crate) fn connect(
        &self,
        out_v: &NodeRef,
        in_v: &NodeRef,
        label: &str,
        mut properties: Properties,
    ) -> Result<NodeRef> {
        check_label(label)?;
        self.check_endpoint(out_v)?;
        self.check_endpoint(in_v)?;
        for key in [TYPE, OUT, IN, LABEL] {
            properties.remove(key);
        }

        let mut store = self.store.borrow_mut();
        let id = take_id(&mut properties, &mut store)?;
        let edge = store.insert_edge(Edge {
            id,
            label: label.to_string(),
            out_v: out_v.id(),
            in_v: in_v.id(),
            properties,
        })?;
        tracing::debug!(
            id = %edge.id(),
            label,
            out_v = %out_v.id(),
            in_v = %in_v.id(),
            "Edge added"
        );
        Ok(edge)
    }

    fn single_vertex(&self, selector: Selector) -> Result<NodeRef> {
        let mut nodes = selector.into_nodes();
        if nodes.len() != 1 {
            return Err(GraphError::Cardinality {
                kind: NodeKind::Vertex,
                found: nodes.len(),
            });
        }
        let node = nodes.remove(0);
        self.check_endpoint(&node)?;
        Ok(node)
    }

    /// The node is a vertex currently registered in this graph.
    pub(crate) fn check_endpoint(&self, node: &NodeRef) -> Result<()> {
        if !node.is_vertex() {
            return Err(GraphError::Validation {
                expected: NodeKind::Vertex,
                found: node.kind(),
            });
        }
        if !self.store().is_registered(node) {
            return Err(GraphError::Cardinality {
                kind: NodeKind::Vertex,
                found: 0,
            });
        }
        Ok(())
    }

    /// Remove a node. Removing a vertex first removes every incident edge.
    ///
    /// Removing a node that is no longer registered is a no-op.
    pub fn remove(&self, node: &NodeRef) -> Result<()> {
        self.store.borrow_mut().remove(node)
    }

    // ── Lookup ───────────────────────────────────────────────────

    /// Traversal over all vertices. It re-reads the vertex sequence on each use.
    pub fn v(&self) -> Traversal {
        Traversal::all(self.share(), NodeKind::Vertex)
    }

    /// Traversal over all edges. It re-reads the edge sequence on each use.
    pub fn e(&self) -> Traversal {
        Traversal::all(self.share(), NodeKind::Edge)
    }

    /// Traversal over the vertex with this ID, or an empty one.
    pub fn v_id(&self, id: impl Into<NodeId>) -> Traversal {
        self.by_id(id.into(), NodeKind::Vertex)
    }

    /// Traversal over the edge with this ID, or an empty one.
    pub fn e_id(&self, id: impl Into<NodeId>) -> Traversal {
        self.by_id(id.into(), NodeKind::Edge)
    }

    fn by_id(&self, id: NodeId, kind: NodeKind) -> Traversal {
        let nodes = self
            .get(&id)
            .filter(|n| n.kind() == kind)
            .into_iter()
            .collect();
        Traversal::root(self.share(), nodes)
    }

    /// Look up any node by ID.
    pub fn get(&self, id: &NodeId) -> Option<NodeRef> {
        self.store().lookup(id)
    }

    pub(crate) fn all_nodes(&self, kind: NodeKind) -> Vec<NodeRef> {
        let store = self.store();
        match kind {
            NodeKind::Vertex => store.vertices.clone(),
            NodeKind::Edge => store.edges.clone(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.store().vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.store().edges.len()
    }

    // ── Snapshots ────────────────────────────────────────────────

    /// Deep copy of the raw, ID-based form.
    pub fn export(&self) -> Snapshot {
        let store = self.store();
        let records = |nodes: &[NodeRef]| -> Vec<Properties> {
            nodes.iter().map(|n| n.borrow().to_record()).collect()
        };
        Snapshot {
            vertices: records(&store.vertices),
            edges: records(&store.edges),
        }
    }

    /// Load a raw snapshot into this graph.
    ///
    /// The whole snapshot is validated first (record shapes, ID collisions
    /// with itself and with existing nodes, edge endpoints), so a rejected
    /// snapshot leaves the graph unchanged.
    pub fn import(&self, snapshot: Snapshot) -> Result<()> {
        let vertices = snapshot
            .vertices
            .into_iter()
            .map(|r| Node::from_record(NodeKind::Vertex, r))
            .collect::<Result<Vec<_>>>()?;
        let edges = snapshot
            .edges
            .into_iter()
            .map(|r| Node::from_record(NodeKind::Edge, r))
            .collect::<Result<Vec<_>>>()?;

        let mut store = self.store.borrow_mut();
        let mut seen = HashSet::new();
        for node in vertices.iter().chain(edges.iter()) {
            let id = node.id();
            if store.index.contains_key(id) || !seen.insert(id.clone()) {
                return Err(GraphError::DuplicateId(id.clone()));
            }
        }
        let new_vertices: HashSet<&NodeId> = vertices.iter().map(Node::id).collect();
        for edge in edges.iter().filter_map(Node::as_edge) {
            for endpoint in [&edge.out_v, &edge.in_v] {
                let known = new_vertices.contains(endpoint)
                    || store.lookup(endpoint).is_some_and(|n| n.is_vertex());
                if !known {
                    return Err(GraphError::InvalidRecord(format!(
                        "edge {} references unknown vertex {endpoint}",
                        edge.id
                    )));
                }
            }
        }

        let (vertex_count, edge_count) = (vertices.len(), edges.len());
        for node in vertices {
            if let Node::Vertex(vertex) = node {
                store.insert_vertex(vertex)?;
            }
        }
        for node in edges {
            if let Node::Edge(edge) = node {
                store.insert_edge(edge)?;
            }
        }
        tracing::debug!(vertices = vertex_count, edges = edge_count, "Snapshot imported");
        Ok(())
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Graph {
    fn clone(&self) -> Self {
        Self::from_store(self.store().deep_copy())
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("vertices", &self.vertex_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}

// ── Helpers ──────────────────────────────────────────────────────

pub(crate) fn into_properties(value: Value) -> Result<Properties> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Properties::new()),
        other => Err(GraphError::InvalidProperties(other.to_string())),
    }
}

pub(crate) fn check_label(label: &str) -> Result<()> {
    if label.is_empty() {
        return Err(GraphError::InvalidLabel(label.to_string()));
    }
    Ok(())
}

/// Use a caller-supplied `@rid`, or draw a fresh one.
fn take_id(properties: &mut Properties, store: &mut Store) -> Result<NodeId> {
    match properties.remove(RID) {
        Some(Value::String(s)) if !s.is_empty() => Ok(NodeId(s)),
        Some(other) => Err(GraphError::InvalidProperties(format!(
            "{RID} must be a non-empty string, got {other}"
        ))),
        None => store.fresh_id(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strand_core::SequentialGenerator;

    fn graph() -> Graph {
        Graph::with_id_generator(SequentialGenerator::new("n"))
    }

    struct Constant;

    impl IdGenerator for Constant {
        fn next_id(&mut self) -> NodeId {
            NodeId::from("same")
        }

        fn fork(&self) -> Box<dyn IdGenerator> {
            Box::new(Constant)
        }
    }

    #[test]
    fn test_add_vertex_assigns_fresh_ids() {
        let g = graph();
        let a = g.add_vertex(json!({"a": 1})).unwrap().first().unwrap();
        let b = g.add_vertex(json!(null)).unwrap().first().unwrap();
        assert_eq!(a.id(), NodeId::from("n1"));
        assert_eq!(b.id(), NodeId::from("n2"));
        assert_eq!(g.vertex_count(), 2);
        assert!(NodeRef::ptr_eq(&g.get(&a.id()).unwrap(), &a));
    }

    #[test]
    fn test_add_vertex_rejects_non_object_properties() {
        let g = graph();
        assert!(matches!(
            g.add_vertex(json!([1, 2])),
            Err(GraphError::InvalidProperties(_))
        ));
        assert_eq!(g.vertex_count(), 0);
    }

    #[test]
    fn test_explicit_rid_and_duplicate() {
        let g = graph();
        let v = g.add_vertex(json!({"@rid": "alice", "@type": "EDGE"})).unwrap();
        let v = v.first().unwrap();
        assert_eq!(v.id(), NodeId::from("alice"));
        assert!(v.is_vertex());
        assert!(v.borrow().properties().is_empty());

        assert_eq!(
            g.add_vertex(json!({"@rid": "alice"})).unwrap_err(),
            GraphError::DuplicateId("alice".into())
        );
        assert_eq!(g.vertex_count(), 1);
    }

    #[test]
    fn test_colliding_generator_gives_up() {
        let g = Graph::with_id_generator(Constant);
        g.add_vertex(json!({})).unwrap();
        assert_eq!(
            g.add_vertex(json!({})).unwrap_err(),
            GraphError::IdExhausted { attempts: 16 }
        );
    }

    #[test]
    fn test_sequential_ids_skip_past_imported_ids() {
        let src = graph();
        for _ in 0..20 {
            src.add_vertex(json!({})).unwrap();
        }
        let dst = graph();
        dst.import(src.export()).unwrap();

        let fresh = dst.add_vertex(json!({})).unwrap().first().unwrap();
        assert_eq!(fresh.id(), NodeId::from("n21"));
        assert_eq!(dst.vertex_count(), 21);

        let configured = Graph::with_config(&GraphConfig {
            id_strategy: strand_core::IdStrategy::Sequential,
            id_prefix: "n".into(),
            max_id_attempts: 4,
        });
        configured.import(src.export()).unwrap();
        let fresh = configured.add_vertex(json!({})).unwrap().first().unwrap();
        assert_eq!(fresh.id(), NodeId::from("n21"));
    }

    #[test]
    fn test_add_edge_cardinality_and_kind() {
        let g = graph();
        let a = g.add_vertex(json!({"a": 1})).unwrap();
        let b = g.add_vertex(json!({"b": 2})).unwrap();

        assert_eq!(
            g.add_edge(g.v(), &b, "likes", json!({})).unwrap_err(),
            GraphError::Cardinality {
                kind: NodeKind::Vertex,
                found: 2
            }
        );
        assert_eq!(
            g.add_edge(Vec::<NodeRef>::new(), &b, "likes", json!({})).unwrap_err(),
            GraphError::Cardinality {
                kind: NodeKind::Vertex,
                found: 0
            }
        );
        assert!(matches!(
            g.add_edge(&a, &b, "", json!({})),
            Err(GraphError::InvalidLabel(_))
        ));

        let e = g.add_edge(&a, &b, "likes", json!({})).unwrap();
        assert_eq!(
            g.add_edge(&e, &b, "likes", json!({})).unwrap_err(),
            GraphError::Validation {
                expected: NodeKind::Vertex,
                found: NodeKind::Edge
            }
        );
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_add_edge_ignores_core_keys_in_properties() {
        let g = graph();
        let a = g.add_vertex(json!({})).unwrap();
        let b = g.add_vertex(json!({})).unwrap();
        let e = g
            .add_edge(&a, &b, "likes", json!({"label": "x", "out": "y", "c": 3}))
            .unwrap()
            .first()
            .unwrap();
        let node = e.borrow();
        let edge = node.as_edge().unwrap();
        assert_eq!(edge.label, "likes");
        assert_eq!(edge.out_v, a.first().unwrap().id());
        assert_eq!(edge.properties, json!({"c": 3}).as_object().cloned().unwrap());
    }

    #[test]
    fn test_removed_vertex_cannot_be_an_endpoint() {
        let g = graph();
        let a = g.add_vertex(json!({})).unwrap().first().unwrap();
        let b = g.add_vertex(json!({})).unwrap().first().unwrap();
        g.remove(&a).unwrap();
        assert_eq!(
            g.add_edge(&a, &b, "likes", json!({})).unwrap_err(),
            GraphError::Cardinality {
                kind: NodeKind::Vertex,
                found: 0
            }
        );
        // Second removal is a no-op.
        g.remove(&a).unwrap();
    }

    #[test]
    fn test_self_loop_removal() {
        let g = graph();
        let a = g.add_vertex(json!({})).unwrap();
        g.add_edge(&a, &a, "self", json!({})).unwrap();
        a.remove().unwrap();
        assert_eq!(g.vertex_count(), 0);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_consistency_check_on_desynced_sequence() {
        let g = graph();
        let a = g.add_vertex(json!({})).unwrap().first().unwrap();
        g.store.borrow_mut().vertices.clear();
        assert_eq!(
            g.remove(&a).unwrap_err(),
            GraphError::Consistency {
                id: a.id(),
                removed: 0
            }
        );
    }

    #[test]
    fn test_v_and_e_by_id_filter_kind() {
        let g = graph();
        let a = g.add_vertex(json!({})).unwrap();
        let b = g.add_vertex(json!({})).unwrap();
        let e = g.add_edge(&a, &b, "likes", json!({})).unwrap().first().unwrap();
        let a = a.first().unwrap();

        assert_eq!(g.v_id(a.id()).len(), 1);
        assert_eq!(g.e_id(a.id()).len(), 0);
        assert_eq!(g.e_id(&e.id()).len(), 1);
        assert_eq!(g.v_id("missing").len(), 0);
    }

    #[test]
    fn test_import_validates_before_mutating() {
        let g = graph();
        let snapshot = Snapshot {
            vertices: vec![json!({"@rid": "a", "@type": "VERTEX"})
                .as_object()
                .cloned()
                .unwrap()],
            edges: vec![json!({"@rid": "e", "out": "a", "in": "ghost", "label": "x"})
                .as_object()
                .cloned()
                .unwrap()],
        };
        assert!(matches!(
            g.import(snapshot),
            Err(GraphError::InvalidRecord(_))
        ));
        assert_eq!(g.vertex_count(), 0);

        let dup = Snapshot {
            vertices: vec![
                json!({"@rid": "a"}).as_object().cloned().unwrap(),
                json!({"@rid": "a"}).as_object().cloned().unwrap(),
            ],
            edges: vec![],
        };
        assert_eq!(g.import(dup), Err(GraphError::DuplicateId("a".into())));
        assert_eq!(g.vertex_count(), 0);
    }

    #[test]
    fn test_clone_is_independent_and_keeps_counting() {
        let g = graph();
        let a = g.add_vertex(json!({"a": 1})).unwrap();
        let b = g.add_vertex(json!({"b": 2})).unwrap();
        g.add_edge(&a, &b, "likes", json!({})).unwrap();

        let copy = g.clone();
        assert_eq!(copy.export(), g.export());

        copy.v().has(json!({"a": 1})).first().unwrap().set("a", 9).unwrap();
        assert_eq!(a.first().unwrap().get("a"), Some(json!(1)));

        let fresh = copy.add_vertex(json!({})).unwrap().first().unwrap();
        assert_eq!(fresh.id(), NodeId::from("n4"));
        assert_eq!(g.vertex_count(), 2);
    }
}
