//! Chainable, immutable query steps over graph nodes.
//!
//! Every step returns a new [`Traversal`] whose parent is the traversal it was
//! called on. The resulting lineage is a persistent `Rc` chain, so named-step
//! lookups (`back`, `select`) cost the chain depth and never copy node lists.
//! Node lists hold live [`NodeRef`] handles, not copies.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use strand_core::types::{RID, TYPE};
use strand_core::{value, Direction, Node, NodeId, NodeKind, NodeRef, Properties, Result};

use crate::graph::{check_label, into_properties, Graph};

/// Named node lists collected by [`Traversal::select`], in first-bound order.
pub type Selection = IndexMap<String, Vec<NodeRef>>;

/// A node projected onto a subset of its fields by [`Traversal::map`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    #[serde(rename = "@rid")]
    pub id: NodeId,
    #[serde(rename = "@type")]
    pub kind: NodeKind,
    #[serde(flatten)]
    pub fields: Properties,
}

/// One operand of `merge` and the boolean steps: a traversal, or a step
/// function evaluated against the traversal the operator is called on.
#[derive(Clone)]
pub enum Branch {
    Traversal(Traversal),
    Step(Rc<dyn Fn(&Traversal) -> Traversal>),
}

impl Branch {
    /// Wrap a step function, e.g. `Branch::step(|t| t.out("likes"))`.
    pub fn step<F>(f: F) -> Self
    where
        F: Fn(&Traversal) -> Traversal + 'static,
    {
        Branch::Step(Rc::new(f))
    }

    fn evaluate(&self, parent: &Traversal) -> Traversal {
        match self {
            Branch::Traversal(t) => t.clone(),
            Branch::Step(f) => f(parent),
        }
    }
}

impl From<Traversal> for Branch {
    fn from(t: Traversal) -> Self {
        Branch::Traversal(t)
    }
}

impl From<&Traversal> for Branch {
    fn from(t: &Traversal) -> Self {
        Branch::Traversal(t.clone())
    }
}

impl fmt::Debug for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Traversal(t) => f.debug_tuple("Traversal").field(t).finish(),
            Branch::Step(_) => f.write_str("Step(<fn>)"),
        }
    }
}

/// Concatenate every branch's nodes, evaluated against `parent`, into one
/// child of `parent`. Argument order is kept and duplicates are not removed.
pub fn merge<I>(parent: &Traversal, branches: I) -> Traversal
where
    I: IntoIterator<Item = Branch>,
{
    let nodes = branches
        .into_iter()
        .flat_map(|b| b.evaluate(parent).to_vec())
        .collect();
    parent.child(nodes)
}

enum Source {
    /// Every vertex or every edge, read from the graph on each access.
    All(NodeKind),
    Nodes(Vec<NodeRef>),
}

struct Step {
    graph: Graph,
    parent: Option<Traversal>,
    source: Source,
    name: Option<String>,
}

/// An immutable view over a sequence of graph nodes.
///
/// Clone is cheap (inner Rc).
#[derive(Clone)]
pub struct Traversal {
    step: Rc<Step>,
}

impl Traversal {
    pub(crate) fn root(graph: Graph, nodes: Vec<NodeRef>) -> Self {
        Self::build(graph, None, Source::Nodes(nodes), None)
    }

    pub(crate) fn all(graph: Graph, kind: NodeKind) -> Self {
        Self::build(graph, None, Source::All(kind), None)
    }

    fn build(
        graph: Graph,
        parent: Option<Traversal>,
        source: Source,
        name: Option<String>,
    ) -> Self {
        Self {
            step: Rc::new(Step {
                graph,
                parent,
                source,
                name,
            }),
        }
    }

    fn child(&self, nodes: Vec<NodeRef>) -> Self {
        Self::build(
            self.step.graph.share(),
            Some(self.clone()),
            Source::Nodes(nodes),
            None,
        )
    }

    fn nodes(&self) -> Vec<NodeRef> {
        match &self.step.source {
            Source::All(kind) => self.step.graph.all_nodes(*kind),
            Source::Nodes(nodes) => nodes.clone(),
        }
    }

    // ── Inspection ───────────────────────────────────────────────

    /// All current nodes.
    pub fn to_vec(&self) -> Vec<NodeRef> {
        self.nodes()
    }

    /// The first current node, if any.
    pub fn first(&self) -> Option<NodeRef> {
        match &self.step.source {
            Source::All(_) => self.nodes().into_iter().next(),
            Source::Nodes(nodes) => nodes.first().cloned(),
        }
    }

    pub fn len(&self) -> usize {
        match &self.step.source {
            Source::All(NodeKind::Vertex) => self.step.graph.vertex_count(),
            Source::All(NodeKind::Edge) => self.step.graph.edge_count(),
            Source::Nodes(nodes) => nodes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// IDs of the current nodes, in order.
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes().iter().map(NodeRef::id).collect()
    }

    /// The name bound with [`as_`](Self::as_), if any.
    pub fn name(&self) -> Option<&str> {
        self.step.name.as_deref()
    }

    /// The traversal this one was derived from. `None` for roots.
    pub fn parent(&self) -> Option<&Traversal> {
        self.step.parent.as_ref()
    }

    // ── Filtering ────────────────────────────────────────────────

    /// Keep nodes where every key in `pattern` deep-equals the node's value.
    ///
    /// A pattern that is not an object matches nothing.
    pub fn has(&self, pattern: impl Into<Value>) -> Traversal {
        match pattern.into() {
            Value::Object(pattern) => self.filter(|n| n.matches(&pattern)),
            _ => self.child(Vec::new()),
        }
    }

    /// Drop nodes that [`has`](Self::has) would keep.
    pub fn has_not(&self, pattern: impl Into<Value>) -> Traversal {
        match pattern.into() {
            Value::Object(pattern) => self.filter(|n| !n.matches(&pattern)),
            _ => self.child(self.nodes()),
        }
    }

    /// Keep nodes satisfying an arbitrary predicate.
    ///
    /// The predicate sees a shared borrow of each node and must not mutate
    /// the graph.
    pub fn filter<P>(&self, mut predicate: P) -> Traversal
    where
        P: FnMut(&Node) -> bool,
    {
        let kept = self
            .nodes()
            .into_iter()
            .filter(|n| predicate(&n.borrow()))
            .collect();
        self.child(kept)
    }

    /// Keep nodes with `lower <= node[prop] < upper`.
    ///
    /// Nodes lacking `prop`, or whose value is not comparable with the bounds,
    /// are dropped.
    pub fn interval(
        &self,
        prop: &str,
        lower: impl Into<Value>,
        upper: impl Into<Value>,
    ) -> Traversal {
        use std::cmp::Ordering::{Equal, Greater, Less};

        let (lower, upper) = (lower.into(), upper.into());
        self.filter(|n| {
            n.get(prop).is_some_and(|v| {
                matches!(value::compare(&v, &lower), Some(Greater | Equal))
                    && value::compare(&v, &upper) == Some(Less)
            })
        })
    }

    /// Keep each node independently with probability `bias`.
    pub fn random(&self, bias: f64) -> Traversal {
        self.random_with(bias, &mut rand::thread_rng())
    }

    /// [`random`](Self::random) with an injected random source.
    pub fn random_with<R>(&self, bias: f64, rng: &mut R) -> Traversal
    where
        R: Rng + ?Sized,
    {
        self.filter(|_| rng.gen::<f64>() < bias)
    }

    /// Stable keep-first-occurrence filter by ID.
    pub fn dedup(&self) -> Traversal {
        let mut seen = HashSet::new();
        self.filter(|n| seen.insert(n.id().clone()))
    }

    // ── Expansion ────────────────────────────────────────────────

    fn expand(&self, direction: Direction, label: &str) -> Traversal {
        let store = self.step.graph.store();
        let mut edges = Vec::new();
        for node in self.nodes() {
            if let Some(vertex) = node.borrow().as_vertex() {
                edges.extend(
                    vertex
                        .adjacency
                        .edges(direction, label)
                        .iter()
                        .filter_map(|id| store.lookup(id)),
                );
            }
        }
        drop(store);
        self.child(edges)
    }

    fn endpoints(&self, direction: Direction) -> Traversal {
        let store = self.step.graph.store();
        let vertices = self
            .nodes()
            .iter()
            .filter_map(|node| {
                let node = node.borrow();
                let edge = node.as_edge()?;
                match direction {
                    Direction::Out => store.lookup(&edge.out_v),
                    Direction::In => store.lookup(&edge.in_v),
                }
            })
            .collect();
        drop(store);
        self.child(vertices)
    }

    /// Outgoing `label` edges of each vertex.
    pub fn out_e(&self, label: &str) -> Traversal {
        self.expand(Direction::Out, label)
    }

    /// Incoming `label` edges of each vertex.
    pub fn in_e(&self, label: &str) -> Traversal {
        self.expand(Direction::In, label)
    }

    /// Tail vertex of each edge.
    pub fn out_v(&self) -> Traversal {
        self.endpoints(Direction::Out)
    }

    /// Head vertex of each edge.
    pub fn in_v(&self) -> Traversal {
        self.endpoints(Direction::In)
    }

    /// Vertices reached over outgoing `label` edges.
    pub fn out(&self, label: &str) -> Traversal {
        self.out_e(label).in_v()
    }

    /// Vertices reached over incoming `label` edges.
    pub fn in_(&self, label: &str) -> Traversal {
        self.in_e(label).out_v()
    }

    /// `out(label)` followed by `in_(label)`, parented directly to `self`.
    ///
    /// Mutually connected pairs appear once per edge; use
    /// [`dedup`](Self::dedup) to collapse them.
    pub fn both(&self, label: &str) -> Traversal {
        merge(self, [Branch::from(self.out(label)), Branch::from(self.in_(label))])
    }

    /// `out_e(label)` followed by `in_e(label)`, parented directly to `self`.
    pub fn both_e(&self, label: &str) -> Traversal {
        merge(self, [Branch::from(self.out_e(label)), Branch::from(self.in_e(label))])
    }

    /// Tail then head vertex of each edge, parented directly to `self`.
    pub fn both_v(&self) -> Traversal {
        merge(self, [Branch::from(self.out_v()), Branch::from(self.in_v())])
    }

    // ── Boolean Algebra ──────────────────────────────────────────

    fn boolean<I>(&self, branches: I, seed: bool, op: fn(bool, bool) -> bool) -> Traversal
    where
        I: IntoIterator<Item = Branch>,
    {
        let memberships: Vec<HashSet<NodeId>> = branches
            .into_iter()
            .map(|b| b.evaluate(self).ids().into_iter().collect())
            .collect();
        self.filter(|n| {
            memberships
                .iter()
                .fold(seed, |acc, set| op(acc, set.contains(n.id())))
        })
    }

    /// Keep nodes present in at least one branch.
    pub fn or<I>(&self, branches: I) -> Traversal
    where
        I: IntoIterator<Item = Branch>,
    {
        self.boolean(branches, false, |acc, member| acc || member)
    }

    /// Keep nodes present in every branch.
    pub fn and<I>(&self, branches: I) -> Traversal
    where
        I: IntoIterator<Item = Branch>,
    {
        self.boolean(branches, true, |acc, member| acc && member)
    }

    /// Keep nodes present in no branch.
    pub fn except<I>(&self, branches: I) -> Traversal
    where
        I: IntoIterator<Item = Branch>,
    {
        self.boolean(branches, true, |acc, member| acc && !member)
    }

    /// Keep nodes present in the union of the branches.
    pub fn retain<I>(&self, branches: I) -> Traversal
    where
        I: IntoIterator<Item = Branch>,
    {
        self.and([Branch::from(merge(self, branches))])
    }

    // ── Named Steps ──────────────────────────────────────────────

    /// Bind `name` to this step's node set.
    pub fn as_(&self, name: &str) -> Traversal {
        Self::build(
            self.step.graph.share(),
            Some(self.clone()),
            Source::Nodes(self.nodes()),
            Some(name.to_string()),
        )
    }

    /// The nearest traversal in the lineage (starting with `self`) bound to `name`.
    pub fn back(&self, name: &str) -> Option<Traversal> {
        self.lineage().find(|t| t.name() == Some(name)).cloned()
    }

    /// Node lists of the named steps in the lineage, collected from the root
    /// down. A later step bound to the same name overwrites an earlier one.
    /// An empty `names` collects every named step.
    pub fn select<I, S>(&self, names: I) -> Selection
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let wanted: Vec<String> = names.into_iter().map(|s| s.as_ref().to_string()).collect();
        let chain: Vec<&Traversal> = self.lineage().collect();

        let mut selection = Selection::new();
        for t in chain.into_iter().rev() {
            if let Some(name) = t.name() {
                if wanted.is_empty() || wanted.iter().any(|w| w == name) {
                    selection.insert(name.to_string(), t.nodes());
                }
            }
        }
        selection
    }

    /// [`select`](Self::select) over every named step.
    pub fn select_all(&self) -> Selection {
        self.select(std::iter::empty::<&str>())
    }

    fn lineage(&self) -> impl Iterator<Item = &Traversal> {
        std::iter::successors(Some(self), |t| t.parent())
    }

    // ── Projection ───────────────────────────────────────────────

    /// Project each node onto `fields` plus its ID and kind. Absent fields are skipped.
    pub fn map<I, S>(&self, fields: I) -> Vec<Projection>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields: Vec<String> = fields.into_iter().map(|s| s.as_ref().to_string()).collect();
        self.nodes()
            .iter()
            .map(|n| {
                let node = n.borrow();
                let mut projected = Properties::new();
                for field in &fields {
                    if field == RID || field == TYPE {
                        continue;
                    }
                    if let Some(value) = node.get(field) {
                        projected.insert(field.clone(), value.into_owned());
                    }
                }
                Projection {
                    id: node.id().clone(),
                    kind: node.kind(),
                    fields: projected,
                }
            })
            .collect()
    }

    // ── Mutation ─────────────────────────────────────────────────

    /// Add a `label` edge from every node here to every node of `other`.
    ///
    /// All endpoints are validated before any edge is created. An empty side
    /// creates nothing.
    pub fn add_edge(
        &self,
        label: &str,
        other: &Traversal,
        properties: impl Into<Value>,
    ) -> Result<Traversal> {
        let graph = &self.step.graph;
        let tails = self.nodes();
        let heads = other.nodes();
        let properties = into_properties(properties.into())?;
        check_label(label)?;
        for node in tails.iter().chain(heads.iter()) {
            graph.check_endpoint(node)?;
        }

        let mut created = Vec::with_capacity(tails.len() * heads.len());
        for tail in &tails {
            for head in &heads {
                created.push(graph.connect(tail, head, label, properties.clone())?);
            }
        }
        Ok(self.child(created))
    }

    /// Remove every current node from the graph. Returns an empty child.
    pub fn remove(&self) -> Result<Traversal> {
        for node in self.nodes() {
            self.step.graph.remove(&node)?;
        }
        Ok(self.child(Vec::new()))
    }
}

impl fmt::Debug for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Traversal")
            .field("name", &self.step.name)
            .field("ids", &self.ids())
            .field("root", &self.step.parent.is_none())
            .finish()
    }
}
