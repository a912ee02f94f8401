//! Knowledge ingestion.
//!
//! `learn` merges a batch of loosely-typed fact records into the graph. Each
//! record is parsed once into a [`Fact`], then upserted: a record whose
//! upsert fields match an existing node reuses that node; anything else is
//! created. Records tagged with `@ref` are bound in a call-scoped table that
//! later edge facts resolve their `out`/`in` endpoints through.

use indexmap::IndexMap;
use serde_json::Value;
use strand_core::types::{IN, LABEL, OUT, REF, TYPE, UPSERT};
use strand_core::{GraphError, NodeKind, NodeRef, Properties, Result};

use crate::graph::Graph;
use crate::traversal::Traversal;

/// `@ref` alias → node, in first-bound order.
pub type Refs = IndexMap<String, NodeRef>;

/// Which fields identify an existing node.
#[derive(Debug, Clone, PartialEq)]
enum UpsertKey {
    Fields(Vec<String>),
    Disabled,
}

#[derive(Debug, Clone, PartialEq)]
enum Fact {
    Vertex {
        reference: Option<String>,
        upsert: UpsertKey,
        body: Properties,
    },
    Edge {
        reference: Option<String>,
        upsert: UpsertKey,
        out_ref: String,
        in_ref: String,
        /// Remaining fields, including `label`.
        body: Properties,
    },
}

impl Fact {
    fn parse(index: usize, value: Value) -> Result<Self> {
        let mut body = match value {
            Value::Object(map) => map,
            other => {
                return Err(GraphError::TypeInference(format!(
                    "fact {index} is not an object: {other}"
                )))
            }
        };

        let reference = match body.remove(REF) {
            None | Some(Value::Null) => None,
            Some(value) => Some(ref_key(&value).ok_or_else(|| {
                GraphError::TypeInference(format!("fact {index} has non-scalar {REF} {value}"))
            })?),
        };
        let explicit = match body.remove(TYPE) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(NodeKind::parse(&s).ok_or_else(|| {
                GraphError::TypeInference(format!("fact {index} has unknown {TYPE} {s:?}"))
            })?),
            Some(other) => {
                return Err(GraphError::TypeInference(format!(
                    "fact {index} has unknown {TYPE} {other}"
                )))
            }
        };
        let upsert = match body.remove(UPSERT) {
            None | Some(Value::Bool(true)) => UpsertKey::Fields(body.keys().cloned().collect()),
            Some(value) => parse_upsert(index, value)?,
        };

        let has_out = body.get(OUT).is_some_and(is_truthy);
        let has_in = body.get(IN).is_some_and(is_truthy);
        let kind = match (explicit, has_out, has_in) {
            (Some(kind), _, _) => kind,
            (None, false, false) => NodeKind::Vertex,
            (None, true, true) => NodeKind::Edge,
            (None, _, _) => {
                return Err(GraphError::TypeInference(format!(
                    "fact {index} has only one of {OUT}/{IN}"
                )))
            }
        };

        match kind {
            NodeKind::Vertex => Ok(Fact::Vertex {
                reference,
                upsert,
                body,
            }),
            NodeKind::Edge => {
                let endpoint = |field: &str| {
                    body.get(field).and_then(ref_key).ok_or_else(|| {
                        GraphError::TypeInference(format!(
                            "edge fact {index} needs a scalar {field} reference"
                        ))
                    })
                };
                let out_ref = endpoint(OUT)?;
                let in_ref = endpoint(IN)?;
                Ok(Fact::Edge {
                    reference,
                    upsert,
                    out_ref,
                    in_ref,
                    body,
                })
            }
        }
    }
}

/// `null`, `false`, `0` and `""` do not count as an endpoint during kind inference.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Strings are used as-is; numbers and booleans by their JSON text.
fn ref_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_upsert(index: usize, value: Value) -> Result<UpsertKey> {
    match value {
        Value::Null | Value::Bool(false) => Ok(UpsertKey::Disabled),
        Value::String(s) if s.is_empty() => Ok(UpsertKey::Disabled),
        Value::String(s) => Ok(UpsertKey::Fields(
            s.split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(String::from)
                .collect(),
        )),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(GraphError::InvalidProperties(format!(
                    "fact {index} has non-string {UPSERT} field {other}"
                ))),
            })
            .collect::<Result<Vec<_>>>()
            .map(UpsertKey::Fields),
        other => Err(GraphError::InvalidProperties(format!(
            "fact {index} has invalid {UPSERT} {other}"
        ))),
    }
}

/// First node of `source` agreeing with `body` on every upsert field.
///
/// A field missing from `body` only matches nodes that lack it too.
fn find_existing(source: &Traversal, upsert: &UpsertKey, body: &Properties) -> Option<NodeRef> {
    let UpsertKey::Fields(fields) = upsert else {
        return None;
    };

    let mut pattern = Properties::new();
    let mut absent = Vec::new();
    for field in fields {
        match body.get(field) {
            Some(value) => {
                pattern.insert(field.clone(), value.clone());
            }
            None => absent.push(field.as_str()),
        }
    }
    source
        .has(pattern)
        .filter(|n| absent.iter().all(|f| n.get(f).is_none()))
        .first()
}

fn resolve(refs: &Refs, field: &str, reference: &str) -> Result<NodeRef> {
    refs.get(reference)
        .cloned()
        .ok_or_else(|| GraphError::UnknownReference {
            field: field.to_string(),
            reference: reference.to_string(),
        })
}

impl Graph {
    /// Upsert a batch of fact records and return the nodes bound to `@ref` aliases.
    ///
    /// Vertex facts carry properties. Edge facts carry `out` and `in` aliases
    /// of earlier facts in the same batch, a `label`, and properties. Kind is
    /// inferred from `out`/`in` unless `@type` names it. `@upsert` selects the
    /// identifying fields (array or comma-separated string); without it every
    /// field is compared, and `false`/`null` always creates.
    ///
    /// Not transactional: facts before a failing one stay applied.
    pub fn learn(&self, facts: &[Value]) -> Result<Refs> {
        let mut refs = Refs::new();
        let (mut created, mut reused) = (0usize, 0usize);

        for (index, raw) in facts.iter().enumerate() {
            let (reference, node, fresh) = match Fact::parse(index, raw.clone())? {
                Fact::Vertex {
                    reference,
                    upsert,
                    body,
                } => match find_existing(&self.v(), &upsert, &body) {
                    Some(node) => (reference, node, false),
                    None => (reference, self.insert_vertex(body)?, true),
                },
                Fact::Edge {
                    reference,
                    upsert,
                    out_ref,
                    in_ref,
                    mut body,
                } => {
                    let out_v = resolve(&refs, OUT, &out_ref)?;
                    let in_v = resolve(&refs, IN, &in_ref)?;
                    body.insert(OUT.into(), Value::String(out_v.id().0));
                    body.insert(IN.into(), Value::String(in_v.id().0));

                    match find_existing(&self.e(), &upsert, &body) {
                        Some(node) => (reference, node, false),
                        None => {
                            let label = match body.get(LABEL) {
                                Some(Value::String(label)) => label.clone(),
                                Some(other) => {
                                    return Err(GraphError::InvalidLabel(other.to_string()))
                                }
                                None => return Err(GraphError::InvalidLabel(String::new())),
                            };
                            (reference, self.connect(&out_v, &in_v, &label, body)?, true)
                        }
                    }
                }
            };

            tracing::debug!(
                index,
                id = %node.id(),
                kind = %node.kind(),
                created = fresh,
                "Fact learned"
            );
            if fresh {
                created += 1;
            } else {
                reused += 1;
            }
            if let Some(reference) = reference {
                refs.insert(reference, node);
            }
        }

        tracing::info!(facts = facts.len(), created, reused, "Knowledge learned");
        Ok(refs)
    }
}
