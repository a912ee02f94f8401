//! Node types for the property graph.
//!
//! A graph node is either a [`Vertex`] or an [`Edge`]. Both carry a fixed core
//! (ID, kind, and for edges the label and endpoints) plus an open property bag
//! of dynamic JSON values. Relations between nodes are stored as IDs; the
//! [`NodeRef`] handle is how traversals alias live nodes.

use std::borrow::Cow;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GraphError, Result};
use crate::value;

// ── Reserved Fields ──────────────────────────────────────────────

/// Node ID field in records and patterns.
pub const RID: &str = "@rid";
/// Kind discriminant field (`VERTEX` / `EDGE`).
pub const TYPE: &str = "@type";
/// Call-scoped alias field in learned facts.
pub const REF: &str = "@ref";
/// Upsert key field in learned facts.
pub const UPSERT: &str = "@upsert";
/// Edge out-vertex field.
pub const OUT: &str = "out";
/// Edge in-vertex field.
pub const IN: &str = "in";
/// Edge label field.
pub const LABEL: &str = "label";

/// Open, schema-less property bag.
pub type Properties = serde_json::Map<String, Value>;

// ── Identity ─────────────────────────────────────────────────────

/// Unique identifier of a vertex or edge. Unique across both kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&NodeId> for NodeId {
    fn from(id: &NodeId) -> Self {
        id.clone()
    }
}

/// Node kind discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeKind {
    Vertex,
    Edge,
}

impl NodeKind {
    /// The wire form stored under `@type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Vertex => "VERTEX",
            NodeKind::Edge => "EDGE",
        }
    }

    /// Parse the wire form. Only the exact uppercase names are accepted.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "VERTEX" => Some(NodeKind::Vertex),
            "EDGE" => Some(NodeKind::Edge),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Vertex => f.write_str("Vertex"),
            NodeKind::Edge => f.write_str("Edge"),
        }
    }
}

/// Edge direction relative to a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Out,
    In,
}

// ── Adjacency ────────────────────────────────────────────────────

/// Per-(direction, label) ordered lists of incident edge IDs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Adjacency {
    outgoing: IndexMap<String, Vec<NodeId>>,
    incoming: IndexMap<String, Vec<NodeId>>,
}

impl Adjacency {
    fn lists(&self, direction: Direction) -> &IndexMap<String, Vec<NodeId>> {
        match direction {
            Direction::Out => &self.outgoing,
            Direction::In => &self.incoming,
        }
    }

    fn lists_mut(&mut self, direction: Direction) -> &mut IndexMap<String, Vec<NodeId>> {
        match direction {
            Direction::Out => &mut self.outgoing,
            Direction::In => &mut self.incoming,
        }
    }

    /// Edge IDs for one (direction, label) pair, empty if never seen.
    pub fn edges(&self, direction: Direction, label: &str) -> &[NodeId] {
        self.lists(direction)
            .get(label)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Labels encountered in one direction, in first-seen order.
    pub fn labels(&self, direction: Direction) -> impl Iterator<Item = &str> {
        self.lists(direction).keys().map(String::as_str)
    }

    /// Append an edge ID to the (direction, label) list.
    pub fn attach(&mut self, direction: Direction, label: &str, edge: NodeId) {
        self.lists_mut(direction)
            .entry(label.to_string())
            .or_default()
            .push(edge);
    }

    /// Remove every occurrence of an edge ID from the (direction, label) list.
    /// Returns how many entries were removed. The (now possibly empty) list is kept.
    pub fn detach(&mut self, direction: Direction, label: &str, edge: &NodeId) -> usize {
        match self.lists_mut(direction).get_mut(label) {
            Some(list) => {
                let before = list.len();
                list.retain(|id| id != edge);
                before - list.len()
            }
            None => 0,
        }
    }

    /// Every edge ID in every list, outgoing lists first. May repeat for self-loops.
    pub fn edge_ids(&self) -> Vec<NodeId> {
        self.outgoing
            .values()
            .chain(self.incoming.values())
            .flatten()
            .cloned()
            .collect()
    }

    /// Total number of entries across all lists.
    pub fn degree(&self) -> usize {
        self.outgoing
            .values()
            .chain(self.incoming.values())
            .map(Vec::len)
            .sum()
    }
}

// ── Nodes ────────────────────────────────────────────────────────

/// A graph vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub id: NodeId,
    pub properties: Properties,
    pub adjacency: Adjacency,
}

/// A directed, labeled edge between two vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: NodeId,
    pub label: String,
    /// Tail vertex.
    pub out_v: NodeId,
    /// Head vertex.
    pub in_v: NodeId,
    pub properties: Properties,
}

/// Either kind of graph node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Vertex(Vertex),
    Edge(Edge),
}

impl Node {
    pub fn id(&self) -> &NodeId {
        match self {
            Node::Vertex(v) => &v.id,
            Node::Edge(e) => &e.id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Vertex(_) => NodeKind::Vertex,
            Node::Edge(_) => NodeKind::Edge,
        }
    }

    pub fn properties(&self) -> &Properties {
        match self {
            Node::Vertex(v) => &v.properties,
            Node::Edge(e) => &e.properties,
        }
    }

    pub fn properties_mut(&mut self) -> &mut Properties {
        match self {
            Node::Vertex(v) => &mut v.properties,
            Node::Edge(e) => &mut e.properties,
        }
    }

    pub fn as_vertex(&self) -> Option<&Vertex> {
        match self {
            Node::Vertex(v) => Some(v),
            Node::Edge(_) => None,
        }
    }

    pub fn as_vertex_mut(&mut self) -> Option<&mut Vertex> {
        match self {
            Node::Vertex(v) => Some(v),
            Node::Edge(_) => None,
        }
    }

    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            Node::Edge(e) => Some(e),
            Node::Vertex(_) => None,
        }
    }

    /// Read a field by name.
    ///
    /// Core fields (`@rid`, `@type`, and `label`/`out`/`in` on edges) take
    /// precedence over the property bag.
    pub fn get(&self, key: &str) -> Option<Cow<'_, Value>> {
        match key {
            RID => return Some(Cow::Owned(Value::String(self.id().0.clone()))),
            TYPE => return Some(Cow::Owned(Value::String(self.kind().as_str().into()))),
            _ => {}
        }
        match self {
            Node::Vertex(v) => v.properties.get(key).map(Cow::Borrowed),
            Node::Edge(e) => match key {
                LABEL => Some(Cow::Owned(Value::String(e.label.clone()))),
                OUT => Some(Cow::Owned(Value::String(e.out_v.0.clone()))),
                IN => Some(Cow::Owned(Value::String(e.in_v.0.clone()))),
                _ => e.properties.get(key).map(Cow::Borrowed),
            },
        }
    }

    /// Whether `key` names a core field of this node rather than a property.
    pub fn is_reserved(&self, key: &str) -> bool {
        is_reserved(self.kind(), key)
    }

    /// True if every key in `pattern` deep-equals this node's value for it.
    pub fn matches(&self, pattern: &Properties) -> bool {
        value::matches(pattern, |key| self.get(key))
    }

    /// Raw ID-based record: `@rid`, `@type`, properties, then `out`/`in`/`label` for edges.
    pub fn to_record(&self) -> Properties {
        let mut record = Properties::new();
        record.insert(RID.into(), Value::String(self.id().0.clone()));
        record.insert(TYPE.into(), Value::String(self.kind().as_str().into()));
        for (key, value) in self.properties() {
            record.insert(key.clone(), value.clone());
        }
        if let Node::Edge(e) = self {
            record.insert(OUT.into(), Value::String(e.out_v.0.clone()));
            record.insert(IN.into(), Value::String(e.in_v.0.clone()));
            record.insert(LABEL.into(), Value::String(e.label.clone()));
        }
        record
    }

    /// Parse a raw record of the expected kind. Adjacency starts empty.
    pub fn from_record(kind: NodeKind, mut record: Properties) -> Result<Self> {
        let id = match record.remove(RID) {
            Some(Value::String(s)) if !s.is_empty() => NodeId(s),
            other => {
                return Err(GraphError::InvalidRecord(format!(
                    "{kind} record needs a non-empty string {RID}, got {other:?}"
                )))
            }
        };
        match record.remove(TYPE) {
            None => {}
            Some(Value::String(s)) => match NodeKind::parse(&s) {
                Some(found) if found == kind => {}
                Some(found) => return Err(GraphError::Validation { expected: kind, found }),
                None => {
                    return Err(GraphError::InvalidRecord(format!(
                        "unknown {TYPE} {s:?} on {id}"
                    )))
                }
            },
            Some(other) => {
                return Err(GraphError::InvalidRecord(format!(
                    "{TYPE} must be a string on {id}, got {other}"
                )))
            }
        }

        match kind {
            NodeKind::Vertex => Ok(Node::Vertex(Vertex {
                id,
                properties: record,
                adjacency: Adjacency::default(),
            })),
            NodeKind::Edge => {
                let out_v = take_endpoint(&mut record, OUT, &id)?;
                let in_v = take_endpoint(&mut record, IN, &id)?;
                let label = match record.remove(LABEL) {
                    Some(Value::String(s)) if !s.is_empty() => s,
                    other => {
                        return Err(GraphError::InvalidLabel(
                            other.map(|v| v.to_string()).unwrap_or_default(),
                        ))
                    }
                };
                Ok(Node::Edge(Edge {
                    id,
                    label,
                    out_v,
                    in_v,
                    properties: record,
                }))
            }
        }
    }
}

fn take_endpoint(record: &mut Properties, field: &str, id: &NodeId) -> Result<NodeId> {
    match record.remove(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(NodeId(s)),
        other => Err(GraphError::InvalidRecord(format!(
            "edge {id} needs a string {field:?} endpoint, got {other:?}"
        ))),
    }
}

/// Whether `key` is a core field for nodes of `kind`.
pub fn is_reserved(kind: NodeKind, key: &str) -> bool {
    match kind {
        NodeKind::Vertex => matches!(key, RID | TYPE),
        NodeKind::Edge => matches!(key, RID | TYPE | OUT | IN | LABEL),
    }
}

// ── Shared Handle ────────────────────────────────────────────────

/// Shared, mutable handle to a live graph node.
///
/// Traversals hold these, so writes through a handle are visible to the graph
/// and to every other traversal over the same node. Clone is cheap (inner Rc).
/// A handle outlives the node's removal from the graph; it then points at a
/// detached node with emptied adjacency.
#[derive(Clone)]
pub struct NodeRef(Rc<RefCell<Node>>);

impl NodeRef {
    pub fn new(node: Node) -> Self {
        Self(Rc::new(RefCell::new(node)))
    }

    pub fn id(&self) -> NodeId {
        self.0.borrow().id().clone()
    }

    pub fn kind(&self) -> NodeKind {
        self.0.borrow().kind()
    }

    pub fn is_vertex(&self) -> bool {
        self.kind() == NodeKind::Vertex
    }

    pub fn is_edge(&self) -> bool {
        self.kind() == NodeKind::Edge
    }

    /// Immutable access. Do not hold across graph mutations touching this node.
    pub fn borrow(&self) -> Ref<'_, Node> {
        self.0.borrow()
    }

    /// Mutable access. Do not hold across graph mutations touching this node.
    pub fn borrow_mut(&self) -> RefMut<'_, Node> {
        self.0.borrow_mut()
    }

    /// Owned copy of a field value (see [`Node::get`]).
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key).map(Cow::into_owned)
    }

    /// Write a property, returning the previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<Option<Value>> {
        let key = key.into();
        let mut node = self.0.borrow_mut();
        if node.is_reserved(&key) {
            return Err(GraphError::ReservedField(key));
        }
        Ok(node.properties_mut().insert(key, value.into()))
    }

    /// Remove a property, returning its value.
    pub fn unset(&self, key: &str) -> Option<Value> {
        self.0.borrow_mut().properties_mut().remove(key)
    }

    /// Deep copy of the node as it is now.
    pub fn snapshot(&self) -> Node {
        self.0.borrow().clone()
    }

    /// Identity comparison: both handles point at the same node object.
    pub fn ptr_eq(a: &NodeRef, b: &NodeRef) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(node) => f.debug_tuple("NodeRef").field(&*node).finish(),
            Err(_) => f.write_str("NodeRef(<mutably borrowed>)"),
        }
    }
}

// ── Snapshot ─────────────────────────────────────────────────────

/// Raw, ID-based serializable form of a whole graph.
///
/// Adjacency lists are not stored; they are rebuilt from the edge sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub vertices: Vec<Properties>,
    #[serde(default)]
    pub edges: Vec<Properties>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Properties {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn edge() -> Node {
        Node::Edge(Edge {
            id: "e1".into(),
            label: "likes".into(),
            out_v: "v1".into(),
            in_v: "v2".into(),
            properties: props(json!({"c": 3})),
        })
    }

    #[test]
    fn test_node_kind_wire_form() {
        assert_eq!(NodeKind::Vertex.as_str(), "VERTEX");
        assert_eq!(NodeKind::parse("EDGE"), Some(NodeKind::Edge));
        assert_eq!(NodeKind::parse("edge"), None);
        assert_eq!(serde_json::to_value(NodeKind::Edge).unwrap(), json!("EDGE"));
        assert_eq!(format!("{}", NodeKind::Vertex), "Vertex");
    }

    #[test]
    fn test_adjacency_attach_detach() {
        let mut adj = Adjacency::default();
        adj.attach(Direction::Out, "likes", "e1".into());
        adj.attach(Direction::Out, "likes", "e2".into());
        adj.attach(Direction::In, "knows", "e3".into());

        assert_eq!(adj.edges(Direction::Out, "likes").len(), 2);
        assert!(adj.edges(Direction::In, "likes").is_empty());
        assert_eq!(adj.degree(), 3);
        assert_eq!(adj.edge_ids(), vec![NodeId::from("e1"), "e2".into(), "e3".into()]);

        assert_eq!(adj.detach(Direction::Out, "likes", &"e1".into()), 1);
        assert_eq!(adj.detach(Direction::Out, "missing", &"e1".into()), 0);
        assert_eq!(adj.edges(Direction::Out, "likes"), &[NodeId::from("e2")]);
        assert_eq!(adj.labels(Direction::Out).collect::<Vec<_>>(), vec!["likes"]);
    }

    #[test]
    fn test_edge_core_fields_shadow_properties() {
        let e = edge();
        assert_eq!(e.get(LABEL).unwrap().as_ref(), &json!("likes"));
        assert_eq!(e.get(OUT).unwrap().as_ref(), &json!("v1"));
        assert_eq!(e.get(RID).unwrap().as_ref(), &json!("e1"));
        assert_eq!(e.get(TYPE).unwrap().as_ref(), &json!("EDGE"));
        assert_eq!(e.get("c").unwrap().as_ref(), &json!(3));
        assert!(e.get("missing").is_none());
    }

    #[test]
    fn test_record_round_trip() {
        let e = edge();
        let record = e.to_record();
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(keys, vec![RID, TYPE, "c", OUT, IN, LABEL]);
        assert_eq!(Node::from_record(NodeKind::Edge, record).unwrap(), e);
    }

    #[test]
    fn test_from_record_rejects_bad_shapes() {
        let missing_id = props(json!({"a": 1}));
        assert!(matches!(
            Node::from_record(NodeKind::Vertex, missing_id),
            Err(GraphError::InvalidRecord(_))
        ));

        let wrong_kind = props(json!({"@rid": "x", "@type": "EDGE"}));
        assert_eq!(
            Node::from_record(NodeKind::Vertex, wrong_kind),
            Err(GraphError::Validation {
                expected: NodeKind::Vertex,
                found: NodeKind::Edge
            })
        );

        let no_label = props(json!({"@rid": "e", "out": "a", "in": "b"}));
        assert!(matches!(
            Node::from_record(NodeKind::Edge, no_label),
            Err(GraphError::InvalidLabel(_))
        ));
    }

    #[test]
    fn test_node_ref_aliases_and_guards_reserved() {
        let a = NodeRef::new(edge());
        let b = a.clone();
        assert!(NodeRef::ptr_eq(&a, &b));

        b.set("weight", 0.5).unwrap();
        assert_eq!(a.get("weight"), Some(json!(0.5)));
        assert_eq!(
            a.set(LABEL, "hates"),
            Err(GraphError::ReservedField(LABEL.into()))
        );

        let copy = NodeRef::new(a.snapshot());
        copy.set("weight", 1).unwrap();
        assert_eq!(a.get("weight"), Some(json!(0.5)));
        assert!(!NodeRef::ptr_eq(&a, &copy));
    }
}
