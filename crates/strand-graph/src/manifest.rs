//! Dereferenced graph snapshots.
//!
//! A [`Manifest`] is a deep copy of the graph in which every adjacency entry
//! and edge endpoint is a direct handle instead of an ID. Vertices own their
//! edges through `Rc`; edges point back at their endpoints through `Weak`, so
//! the cyclic structure is released when the manifest is dropped.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde_json::Value;
use strand_core::{Direction, Edge, NodeId, Properties, Vertex};

use crate::graph::Graph;

type Links<V, E> = IndexMap<String, Vec<Rc<ManifestEdge<V, E>>>>;

/// Materialized vertices and edges in graph order.
#[derive(Debug)]
pub struct Manifest<V = (), E = ()> {
    pub vertices: Vec<Rc<ManifestVertex<V, E>>>,
    pub edges: Vec<Rc<ManifestEdge<V, E>>>,
}

impl<V, E> Manifest<V, E> {
    pub fn vertex(&self, id: &NodeId) -> Option<&Rc<ManifestVertex<V, E>>> {
        self.vertices.iter().find(|v| &v.id == id)
    }

    pub fn edge(&self, id: &NodeId) -> Option<&Rc<ManifestEdge<V, E>>> {
        self.edges.iter().find(|e| &e.id == id)
    }
}

#[derive(Debug)]
pub struct ManifestVertex<V = (), E = ()> {
    pub id: NodeId,
    pub properties: Properties,
    /// Caller data attached by `Graph::manifest_with`.
    pub decoration: V,
    outgoing: OnceCell<Links<V, E>>,
    incoming: OnceCell<Links<V, E>>,
}

impl<V, E> ManifestVertex<V, E> {
    fn links(&self, direction: Direction) -> Option<&Links<V, E>> {
        match direction {
            Direction::Out => self.outgoing.get(),
            Direction::In => self.incoming.get(),
        }
    }

    fn edges(&self, direction: Direction, label: &str) -> &[Rc<ManifestEdge<V, E>>] {
        self.links(direction)
            .and_then(|links| links.get(label))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Outgoing `label` edges, in adjacency order.
    pub fn out_edges(&self, label: &str) -> &[Rc<ManifestEdge<V, E>>] {
        self.edges(Direction::Out, label)
    }

    /// Incoming `label` edges, in adjacency order.
    pub fn in_edges(&self, label: &str) -> &[Rc<ManifestEdge<V, E>>] {
        self.edges(Direction::In, label)
    }

    pub fn out_labels(&self) -> impl Iterator<Item = &str> {
        self.links(Direction::Out)
            .into_iter()
            .flat_map(|links| links.keys().map(String::as_str))
    }

    pub fn in_labels(&self) -> impl Iterator<Item = &str> {
        self.links(Direction::In)
            .into_iter()
            .flat_map(|links| links.keys().map(String::as_str))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

#[derive(Debug)]
pub struct ManifestEdge<V = (), E = ()> {
    pub id: NodeId,
    pub label: String,
    pub properties: Properties,
    /// Caller data attached by `Graph::manifest_with`.
    pub decoration: E,
    out_v: OnceCell<Weak<ManifestVertex<V, E>>>,
    in_v: OnceCell<Weak<ManifestVertex<V, E>>>,
}

impl<V, E> ManifestEdge<V, E> {
    /// Tail vertex. `None` once the owning manifest has been dropped.
    pub fn out_v(&self) -> Option<Rc<ManifestVertex<V, E>>> {
        self.out_v.get().and_then(Weak::upgrade)
    }

    /// Head vertex. `None` once the owning manifest has been dropped.
    pub fn in_v(&self) -> Option<Rc<ManifestVertex<V, E>>> {
        self.in_v.get().and_then(Weak::upgrade)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

impl Graph {
    /// Undecorated [`manifest_with`](Self::manifest_with).
    pub fn manifest(&self) -> Manifest {
        self.manifest_with(|_| (), |_| ())
    }

    /// Build a manifest, attaching `decorate_vertex(v)` / `decorate_edge(e)`
    /// to every node.
    pub fn manifest_with<V, E, FV, FE>(
        &self,
        mut decorate_vertex: FV,
        mut decorate_edge: FE,
    ) -> Manifest<V, E>
    where
        FV: FnMut(&Vertex) -> V,
        FE: FnMut(&Edge) -> E,
    {
        let store = self.store();

        let mut vertices = Vec::with_capacity(store.vertices.len());
        let mut adjacency = Vec::with_capacity(store.vertices.len());
        for node in &store.vertices {
            let node = node.borrow();
            if let Some(v) = node.as_vertex() {
                vertices.push(Rc::new(ManifestVertex {
                    id: v.id.clone(),
                    properties: v.properties.clone(),
                    decoration: decorate_vertex(v),
                    outgoing: OnceCell::new(),
                    incoming: OnceCell::new(),
                }));
                adjacency.push(v.adjacency.clone());
            }
        }

        let mut edges = Vec::with_capacity(store.edges.len());
        let mut endpoints = Vec::with_capacity(store.edges.len());
        for node in &store.edges {
            let node = node.borrow();
            if let Some(e) = node.as_edge() {
                edges.push(Rc::new(ManifestEdge {
                    id: e.id.clone(),
                    label: e.label.clone(),
                    properties: e.properties.clone(),
                    decoration: decorate_edge(e),
                    out_v: OnceCell::new(),
                    in_v: OnceCell::new(),
                }));
                endpoints.push((e.out_v.clone(), e.in_v.clone()));
            }
        }
        drop(store);

        {
            let vertex_by_id: HashMap<&NodeId, &Rc<ManifestVertex<V, E>>> =
                vertices.iter().map(|v| (&v.id, v)).collect();
            let edge_by_id: HashMap<&NodeId, &Rc<ManifestEdge<V, E>>> =
                edges.iter().map(|e| (&e.id, e)).collect();

            for (edge, (out_v, in_v)) in edges.iter().zip(&endpoints) {
                if let Some(v) = vertex_by_id.get(out_v) {
                    let _ = edge.out_v.set(Rc::downgrade(v));
                }
                if let Some(v) = vertex_by_id.get(in_v) {
                    let _ = edge.in_v.set(Rc::downgrade(v));
                }
            }

            for (vertex, adjacency) in vertices.iter().zip(&adjacency) {
                let resolve = |direction: Direction| -> Links<V, E> {
                    adjacency
                        .labels(direction)
                        .map(|label| {
                            let list = adjacency
                                .edges(direction, label)
                                .iter()
                                .filter_map(|id| edge_by_id.get(id).map(|e| Rc::clone(e)))
                                .collect();
                            (label.to_string(), list)
                        })
                        .collect()
                };
                let _ = vertex.outgoing.set(resolve(Direction::Out));
                let _ = vertex.incoming.set(resolve(Direction::In));
            }
        }

        Manifest { vertices, edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strand_core::SequentialGenerator;

    fn likes() -> Graph {
        let g = Graph::with_id_generator(SequentialGenerator::new("n"));
        let a = g.add_vertex(json!({"a": 1})).unwrap();
        let b = g.add_vertex(json!({"b": 2})).unwrap();
        g.add_edge(&a, &b, "likes", json!({"c": 3})).unwrap();
        g
    }

    #[test]
    fn test_manifest_resolves_handles() {
        let g = likes();
        let m = g.manifest();
        assert_eq!(m.vertices.len(), 2);
        assert_eq!(m.edges.len(), 1);

        let a = &m.vertices[0];
        let edge = &a.out_edges("likes")[0];
        assert_eq!(edge.get("c"), Some(&json!(3)));
        assert_eq!(edge.in_v().unwrap().get("b"), Some(&json!(2)));
        assert!(Rc::ptr_eq(&edge.out_v().unwrap(), a));

        let b = m.vertex(&"n2".into()).unwrap();
        assert!(Rc::ptr_eq(&b.in_edges("likes")[0], edge));
        assert!(a.out_edges("hates").is_empty());
        assert_eq!(a.out_labels().collect::<Vec<_>>(), vec!["likes"]);
        assert_eq!(a.in_labels().count(), 0);
    }

    #[test]
    fn test_manifest_is_a_copy() {
        let g = likes();
        let m = g.manifest();
        g.v().has(json!({"a": 1})).first().unwrap().set("a", 5).unwrap();
        g.v().remove().unwrap();
        assert_eq!(m.vertices[0].get("a"), Some(&json!(1)));
        assert_eq!(m.edges.len(), 1);
    }

    #[test]
    fn test_self_loop_and_decorations() {
        let g = Graph::with_id_generator(SequentialGenerator::new("n"));
        let a = g.add_vertex(json!({"name": "a"})).unwrap();
        g.add_edge(&a, &a, "self", json!({})).unwrap();

        let m = g.manifest_with(|v| v.adjacency.degree(), |e| e.label.len());
        let a = &m.vertices[0];
        assert_eq!(a.decoration, 2);
        assert_eq!(m.edges[0].decoration, 4);
        assert!(Rc::ptr_eq(&a.out_edges("self")[0], &a.in_edges("self")[0]));
        assert!(Rc::ptr_eq(&m.edges[0].in_v().unwrap(), a));
    }

    #[test]
    fn test_dropped_manifest_releases_vertices() {
        let g = likes();
        let m = g.manifest();
        let edge = Rc::clone(&m.edges[0]);
        drop(m);
        assert!(edge.out_v().is_none());
    }
}
