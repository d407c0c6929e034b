//! In-memory graph store.
//!
//! This module provides a thread-safe in-memory implementation of the store
//! traits. It interprets [`Operation`]s directly instead of parsing Cypher,
//! and follows the store semantics IYP relies on: MERGE creates only when no
//! match exists, uniqueness constraints reject conflicting writes, and a
//! transaction's writes become visible to others only on commit.
//!
//! The committed graph is shared behind an `Arc`. A transaction reads through
//! it and records its own writes in a private overlay, so `begin` costs the
//! same regardless of graph size. Node lookups go through a
//! `(label, property, value)` index kept by every write. Commit is
//! optimistic: if another transaction committed since `begin`, the commit
//! fails with [`StoreError::TransactionConflict`] and nothing is applied.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::schema::ConstraintKind;
use crate::statement::{LinkSpec, Operation, Statement, EXTERNAL_ID};
use crate::storage::traits::{GraphStore, Row, StoreError, Transaction};
use crate::value::{NodeId, Properties, Value};

fn lock_err(context: &'static str) -> StoreError {
    StoreError::BackendError(format!("poisoned lock: {context}"))
}

/// Store edition, which decides the supported constraint kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Edition {
    /// Only uniqueness constraints.
    #[default]
    Community,
    /// Uniqueness and not-null constraints.
    Enterprise,
}

#[derive(Debug, Clone, Default)]
struct Node {
    labels: BTreeSet<String>,
    properties: Properties,
}

impl Node {
    fn matches(&self, labels: &[String], props: &Properties) -> bool {
        labels.iter().all(|l| self.labels.contains(l))
            && props.iter().all(|(k, v)| self.properties.get(k) == Some(v))
    }
}

#[derive(Debug, Clone)]
struct Relationship {
    source: NodeId,
    target: NodeId,
    rel_type: String,
    properties: Properties,
}

/// Index key of one `(label, property, value)` triple.
type IndexKey = (String, String, String);

/// Encodes a value so that equal values share a key.
fn index_key(label: &str, property: &str, value: &Value) -> IndexKey {
    let encoded = match value {
        // 0.0 and -0.0 compare equal.
        #[allow(clippy::float_cmp)]
        Value::Float(f) if *f == 0.0 => "float:0".to_string(),
        other => format!("{}:{other}", other.type_name()),
    };
    (label.to_string(), property.to_string(), encoded)
}

/// Nodes and relationships plus their lookup indexes.
#[derive(Debug, Clone, Default)]
struct Graph {
    nodes: BTreeMap<NodeId, Node>,
    relationships: Vec<Relationship>,
    by_property: HashMap<IndexKey, BTreeSet<NodeId>>,
    by_source: HashMap<NodeId, Vec<usize>>,
    by_target: HashMap<NodeId, Vec<usize>>,
}

impl Graph {
    fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }

    fn insert_node(&mut self, id: NodeId, node: Node) {
        if let Some(previous) = self.nodes.remove(&id) {
            for key in index_keys(&previous) {
                if let Some(ids) = self.by_property.get_mut(&key) {
                    ids.remove(&id);
                    if ids.is_empty() {
                        self.by_property.remove(&key);
                    }
                }
            }
        }
        for key in index_keys(&node) {
            self.by_property.entry(key).or_default().insert(id);
        }
        self.nodes.insert(id, node);
    }

    fn push_relationship(&mut self, rel: Relationship) {
        let at = self.relationships.len();
        self.by_source.entry(rel.source).or_default().push(at);
        self.by_target.entry(rel.target).or_default().push(at);
        self.relationships.push(rel);
    }

    fn absorb(&mut self, other: Self) {
        for (id, node) in other.nodes {
            self.insert_node(id, node);
        }
        for rel in other.relationships {
            self.push_relationship(rel);
        }
    }

    /// Nodes carrying `label` with `property = value`.
    fn indexed(&self, label: &str, property: &str, value: &Value) -> Option<&BTreeSet<NodeId>> {
        self.by_property.get(&index_key(label, property, value))
    }

    fn outgoing(&self, source: NodeId) -> impl Iterator<Item = &Relationship> {
        self.by_source
            .get(&source)
            .into_iter()
            .flatten()
            .map(|at| &self.relationships[*at])
    }

    fn incoming(&self, target: NodeId) -> impl Iterator<Item = &Relationship> {
        self.by_target
            .get(&target)
            .into_iter()
            .flatten()
            .map(|at| &self.relationships[*at])
    }
}

fn index_keys(node: &Node) -> impl Iterator<Item = IndexKey> + '_ {
    node.labels.iter().flat_map(move |label| {
        node.properties
            .iter()
            .map(move |(k, v)| index_key(label, k, v))
    })
}

#[derive(Debug, Clone, Default)]
struct Committed {
    graph: Graph,
    next_id: i64,
    version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ConstraintDef {
    label: String,
    property: String,
    kind: ConstraintKind,
}

#[derive(Debug, Default)]
struct SchemaState {
    constraints: BTreeMap<String, ConstraintDef>,
    indexes: BTreeSet<(String, String)>,
}

#[derive(Debug, Default)]
struct Shared {
    state: RwLock<Arc<Committed>>,
    schema: RwLock<SchemaState>,
    edition: Edition,
    statements: AtomicU64,
    closed: AtomicBool,
}

impl Shared {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::ConnectionError("store is closed".to_string()))
        } else {
            Ok(())
        }
    }

    fn constraints(&self) -> Result<Vec<(String, ConstraintDef)>, StoreError> {
        let schema = self.schema.read().map_err(|_| lock_err("schema"))?;
        Ok(schema
            .constraints
            .iter()
            .map(|(name, def)| (name.clone(), def.clone()))
            .collect())
    }

    fn snapshot(&self) -> Result<Arc<Committed>, StoreError> {
        let state = self.state.read().map_err(|_| lock_err("state"))?;
        Ok(Arc::clone(&state))
    }
}

/// Read access shared by the committed graph and a transaction's view.
trait NodeView {
    fn node(&self, id: NodeId) -> Option<&Node>;

    /// Superset of the nodes carrying `label` with `property = value`.
    fn candidates(&self, label: &str, property: &str, value: &Value) -> BTreeSet<NodeId>;
}

impl NodeView for Graph {
    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    fn candidates(&self, label: &str, property: &str, value: &Value) -> BTreeSet<NodeId> {
        self.indexed(label, property, value).cloned().unwrap_or_default()
    }
}

/// Checks `node`, about to be stored under `id`, against the given constraints.
fn check_node(
    view: &impl NodeView,
    id: NodeId,
    node: &Node,
    constraints: &[(String, ConstraintDef)],
) -> Result<(), StoreError> {
    for (name, def) in constraints {
        if !node.labels.contains(&def.label) {
            continue;
        }
        let value = node.properties.get(&def.property);
        match def.kind {
            ConstraintKind::NotNull if value.is_none() => {
                return Err(StoreError::ConstraintViolation {
                    constraint: name.clone(),
                    detail: format!("node {id} has no property {}", def.property),
                });
            }
            ConstraintKind::Unique => {
                let Some(value) = value else { continue };
                let clash = view
                    .candidates(&def.label, &def.property, value)
                    .into_iter()
                    .find(|other| {
                        *other != id
                            && view.node(*other).is_some_and(|n| {
                                n.labels.contains(&def.label)
                                    && n.properties.get(&def.property) == Some(value)
                            })
                    });
                if let Some(other) = clash {
                    return Err(StoreError::ConstraintViolation {
                        constraint: name.clone(),
                        detail: format!(
                            "node {other} already has {}.{} = {value}",
                            def.label, def.property
                        ),
                    });
                }
            }
            ConstraintKind::NotNull => {}
        }
    }
    Ok(())
}

/// Thread-safe in-memory graph store.
///
/// Clones share the same graph.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraph {
    shared: Arc<Shared>,
}

impl InMemoryGraph {
    /// Creates an empty community-edition store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_edition(Edition::Community)
    }

    /// Creates an empty store of the given edition.
    #[must_use]
    pub fn with_edition(edition: Edition) -> Self {
        Self {
            shared: Arc::new(Shared {
                edition,
                ..Shared::default()
            }),
        }
    }

    /// Number of statements executed so far, schema statements included.
    #[must_use]
    pub fn statements_executed(&self) -> u64 {
        self.shared.statements.load(Ordering::Relaxed)
    }

    /// Number of committed nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.shared.snapshot().map_or(0, |s| s.graph.nodes.len())
    }

    /// Committed labels of a node.
    #[must_use]
    pub fn node_labels(&self, id: NodeId) -> Option<BTreeSet<String>> {
        let state = self.shared.snapshot().ok()?;
        state.graph.nodes.get(&id).map(|n| n.labels.clone())
    }

    /// Committed properties of a node.
    #[must_use]
    pub fn node_properties(&self, id: NodeId) -> Option<Properties> {
        let state = self.shared.snapshot().ok()?;
        state.graph.nodes.get(&id).map(|n| n.properties.clone())
    }

    /// Committed relationships from `source` to `target` with the given type.
    #[must_use]
    pub fn relationships(&self, source: NodeId, target: NodeId, rel_type: &str) -> Vec<Properties> {
        self.shared.snapshot().map_or_else(
            |_| Vec::new(),
            |s| {
                s.graph
                    .outgoing(source)
                    .filter(|r| r.target == target && r.rel_type == rel_type)
                    .map(|r| r.properties.clone())
                    .collect()
            },
        )
    }

    /// Total number of committed relationships.
    #[must_use]
    pub fn relationship_count(&self) -> usize {
        self.shared
            .snapshot()
            .map_or(0, |s| s.graph.relationships.len())
    }

    /// Names of declared constraints.
    #[must_use]
    pub fn constraint_names(&self) -> Vec<String> {
        self.shared
            .schema
            .read()
            .map_or_else(|_| Vec::new(), |s| s.constraints.keys().cloned().collect())
    }

    /// Number of declared indexes.
    #[must_use]
    pub fn index_count(&self) -> usize {
        self.shared.schema.read().map_or(0, |s| s.indexes.len())
    }

    fn declare(&self, op: &Operation) -> Result<(), StoreError> {
        match op {
            Operation::CreateConstraint {
                label,
                property,
                kind,
            } => {
                if *kind == ConstraintKind::NotNull && self.shared.edition == Edition::Community {
                    return Err(StoreError::Unsupported(format!(
                        "{} constraints require the enterprise edition",
                        kind.cypher()
                    )));
                }
                let name = kind.constraint_name(label, property);
                let def = ConstraintDef {
                    label: label.clone(),
                    property: property.clone(),
                    kind: *kind,
                };

                // Existing data must already satisfy a new constraint.
                let state = self.shared.snapshot()?;
                let single = [(name.clone(), def.clone())];
                for (id, node) in &state.graph.nodes {
                    check_node(&state.graph, *id, node, &single)?;
                }

                let mut schema = self.shared.schema.write().map_err(|_| lock_err("schema"))?;
                schema.constraints.entry(name).or_insert(def);
                Ok(())
            }
            Operation::CreateIndex { label, property } => {
                // Every (label, property, value) triple is indexed already.
                let mut schema = self.shared.schema.write().map_err(|_| lock_err("schema"))?;
                schema.indexes.insert((label.clone(), property.clone()));
                Ok(())
            }
            _ => Err(StoreError::Unsupported(
                "only schema statements run outside a transaction".to_string(),
            )),
        }
    }
}

impl GraphStore for InMemoryGraph {
    fn verify_connectivity(&self) -> Result<(), StoreError> {
        self.shared.ensure_open()
    }

    fn run_schema(&self, statement: &Statement) -> Result<(), StoreError> {
        self.shared.ensure_open()?;
        self.shared.statements.fetch_add(1, Ordering::Relaxed);
        self.declare(statement.operation())
    }

    fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        self.shared.ensure_open()?;
        let base = self.shared.snapshot()?;
        Ok(Box::new(InMemoryTransaction {
            shared: Arc::clone(&self.shared),
            next_id: base.next_id,
            base,
            overlay: Graph::default(),
        }))
    }

    fn close(&self) -> Result<(), StoreError> {
        self.shared.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// A committed snapshot plus the writes made on top of it.
struct InMemoryTransaction {
    shared: Arc<Shared>,
    base: Arc<Committed>,
    overlay: Graph,
    next_id: i64,
}

fn id_row(id: Option<NodeId>) -> Vec<Row> {
    id.map(|id| vec![Row::from([("id".to_string(), Value::from(id))])])
        .unwrap_or_default()
}

impl NodeView for InMemoryTransaction {
    fn node(&self, id: NodeId) -> Option<&Node> {
        self.overlay
            .nodes
            .get(&id)
            .or_else(|| self.base.graph.nodes.get(&id))
    }

    fn candidates(&self, label: &str, property: &str, value: &Value) -> BTreeSet<NodeId> {
        let mut ids = self.base.graph.candidates(label, property, value);
        if let Some(written) = self.overlay.indexed(label, property, value) {
            ids.extend(written);
        }
        ids
    }
}

impl InMemoryTransaction {
    /// Lowest node id matching `labels` and `props`.
    fn find_node(&self, labels: &[String], props: &Properties) -> Option<NodeId> {
        let matching = |id: &NodeId| self.node(*id).is_some_and(|n| n.matches(labels, props));

        let Some(label) = labels.first() else {
            return self.scan().find(matching);
        };
        let size = |(k, v): &(&String, &Value)| {
            let count = |g: &Graph| g.indexed(label, k, v).map_or(0, BTreeSet::len);
            count(&self.base.graph) + count(&self.overlay)
        };
        match props.iter().min_by_key(size) {
            Some((k, v)) => self.candidates(label, k, v).into_iter().find(matching),
            None => self.scan().find(matching),
        }
    }

    /// Every visible node id, in order.
    fn scan(&self) -> impl Iterator<Item = NodeId> {
        self.base
            .graph
            .nodes
            .keys()
            .chain(self.overlay.nodes.keys())
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
    }

    /// Writes `node` under `id` if it satisfies every constraint.
    fn put_node(&mut self, id: NodeId, node: Node) -> Result<(), StoreError> {
        let constraints = self.shared.constraints()?;
        check_node(&*self, id, &node, &constraints)?;
        self.overlay.insert_node(id, node);
        Ok(())
    }

    fn allocate(&mut self) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn merge_on_key(
        &mut self,
        label: &str,
        key: &Properties,
        labels: &[String],
        properties: &Properties,
    ) -> Result<NodeId, StoreError> {
        let matched = self.find_node(&[label.to_string()], key);
        let (id, mut node) = match matched {
            Some(id) => (id, self.node(id).cloned().unwrap_or_default()),
            None => {
                let mut node = Node::default();
                node.labels.insert(label.to_string());
                node.properties.clone_from(key);
                (self.allocate(), node)
            }
        };
        node.labels.extend(labels.iter().cloned());
        node.properties
            .extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.put_node(id, node)?;
        Ok(id)
    }

    fn merge(&mut self, labels: &[String], properties: &Properties) -> Result<NodeId, StoreError> {
        if let Some(id) = self.find_node(labels, properties) {
            return Ok(id);
        }
        let id = self.allocate();
        let node = Node {
            labels: labels.iter().cloned().collect(),
            properties: properties.clone(),
        };
        self.put_node(id, node)?;
        Ok(id)
    }

    fn match_external_id(&self, id_type: &str, id: &Value) -> Option<NodeId> {
        let pattern = Properties::from([("id".to_string(), id.clone())]);
        self.candidates(id_type, "id", id)
            .into_iter()
            .filter(|target| {
                self.node(*target)
                    .is_some_and(|n| n.matches(&[id_type.to_string()], &pattern))
            })
            .find_map(|target| {
                self.base
                    .graph
                    .incoming(target)
                    .chain(self.overlay.incoming(target))
                    .find(|r| r.rel_type == EXTERNAL_ID)
                    .map(|r| r.source)
            })
    }

    fn merge_links(&mut self, source: NodeId, destinations: &[NodeId], links: &[LinkSpec]) -> Vec<Row> {
        let all_present = std::iter::once(&source)
            .chain(destinations)
            .all(|id| self.node(*id).is_some());
        if !all_present {
            return vec![Row::from([("matched".to_string(), Value::Int(0))])];
        }

        for link in links {
            let target = destinations[link.destination];
            let exists = self
                .base
                .graph
                .outgoing(source)
                .chain(self.overlay.outgoing(source))
                .any(|r| {
                    r.target == target
                        && r.rel_type == link.rel_type
                        && link
                            .properties
                            .iter()
                            .all(|(k, v)| r.properties.get(k) == Some(v))
                });
            if !exists {
                self.overlay.push_relationship(Relationship {
                    source,
                    target,
                    rel_type: link.rel_type.clone(),
                    properties: link.properties.clone(),
                });
            }
        }
        vec![Row::from([("matched".to_string(), Value::Int(1))])]
    }
}

impl Transaction for InMemoryTransaction {
    fn run(&mut self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        self.shared.ensure_open()?;
        self.shared.statements.fetch_add(1, Ordering::Relaxed);
        debug!(statement = statement.name(), "in-memory run");

        match statement.operation() {
            Operation::MergeOnKey {
                label,
                key,
                labels,
                properties,
            } => self
                .merge_on_key(label, key, labels, properties)
                .map(|id| id_row(Some(id))),
            Operation::Merge { labels, properties } => {
                self.merge(labels, properties).map(|id| id_row(Some(id)))
            }
            Operation::Match { labels, properties } => {
                Ok(id_row(self.find_node(labels, properties)))
            }
            Operation::MatchExternalId { id_type, id } => {
                Ok(id_row(self.match_external_id(id_type, id)))
            }
            Operation::MergeLinks {
                source,
                destinations,
                links,
            } => Ok(self.merge_links(*source, destinations, links)),
            Operation::CreateConstraint { .. } | Operation::CreateIndex { .. } => Err(
                StoreError::Unsupported("schema statements cannot run inside a transaction".to_string()),
            ),
        }
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let Self {
            shared,
            base,
            overlay,
            next_id,
        } = *self;
        shared.ensure_open()?;
        if overlay.is_empty() {
            return Ok(());
        }

        let mut state = shared.state.write().map_err(|_| lock_err("state"))?;
        if state.version != base.version {
            return Err(StoreError::TransactionConflict {
                expected: base.version,
                found: state.version,
            });
        }
        // Release the snapshot so the committed graph is updated in place
        // unless another transaction still reads it.
        drop(base);
        let committed = Arc::make_mut(&mut *state);
        committed.graph.absorb(overlay);
        committed.next_id = next_id;
        committed.version += 1;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
