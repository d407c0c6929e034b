//! Node and external-id resolution.
//!
//! Resolution is read-through: the identity cache is consulted first, the
//! store only on a miss. Creating lookups on a constrained label merge on the
//! label's key properties and overwrite every supplied property, so the node
//! always reflects the latest caller (last writer wins). Unconstrained labels
//! merge on the full property map.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::cache::{CacheKey, IdentityCache};
use crate::error::{IypResult, ValidationError};
use crate::normalize::normalize;
use crate::schema::ConstraintRegistry;
use crate::statement::Statement;
use crate::storage::{Row, StoreError, Transaction};
use crate::value::{NodeId, Properties, Value};

fn first_id(rows: &[Row]) -> Option<NodeId> {
    rows.first()
        .and_then(|r| r.get("id"))
        .and_then(Value::as_int)
        .map(NodeId::new)
}

fn require_id(rows: &[Row], statement: &Statement) -> Result<NodeId, StoreError> {
    first_id(rows).ok_or_else(|| {
        StoreError::BackendError(format!("{} returned no node id", statement.name()))
    })
}

/// Borrowed view of the state a resolution needs.
pub struct Resolver<'a> {
    tx: &'a mut dyn Transaction,
    registry: &'a ConstraintRegistry,
    cache: &'a mut IdentityCache,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver over the current transaction and cache.
    pub fn new(
        tx: &'a mut dyn Transaction,
        registry: &'a ConstraintRegistry,
        cache: &'a mut IdentityCache,
    ) -> Self {
        Self {
            tx,
            registry,
            cache,
        }
    }

    /// Finds the node described by `labels` and `properties`, creating it
    /// when `create` is set.
    ///
    /// Returns `None` when no node matches a non-creating lookup, or when a
    /// creating lookup collided with another node's unique property and the
    /// fallback match found nothing.
    ///
    /// # Errors
    ///
    /// Validation errors for empty label sets, invalid identifiers, missing
    /// key properties and malformed ASNs. Store errors other than constraint
    /// violations propagate.
    pub fn resolve<S: AsRef<str>>(
        &mut self,
        labels: impl IntoIterator<Item = S>,
        properties: &Properties,
        create: bool,
    ) -> IypResult<Option<NodeId>> {
        let properties = normalize(properties)?;
        let labels: BTreeSet<String> = labels.into_iter().map(|l| l.as_ref().to_string()).collect();
        if labels.is_empty() {
            return Err(ValidationError::NoLabels.into());
        }

        let registry = self.registry;
        let key = CacheKey::node(&labels, &properties);
        match self.cache.get(&key) {
            // A cached "not found" does not answer a creating lookup.
            Some(hit) if hit.is_some() || !create => {
                debug!(?key, "node cache hit");
                return Ok(hit);
            }
            _ => {}
        }

        let resolved = if !create {
            let stmt = Statement::match_node(labels.into_iter().collect(), properties)?;
            first_id(&self.tx.run(&stmt)?)
        } else if let Some(label) = registry.merge_label(&labels) {
            self.merge_constrained(label, labels.iter().cloned().collect(), properties)?
        } else {
            let stmt = Statement::merge(labels.into_iter().collect(), properties)?;
            Some(require_id(&self.tx.run(&stmt)?, &stmt)?)
        };

        if resolved.is_some() || !create {
            self.cache.insert(key, resolved);
        }
        Ok(resolved)
    }

    fn merge_constrained(
        &mut self,
        label: &str,
        labels: Vec<String>,
        properties: Properties,
    ) -> IypResult<Option<NodeId>> {
        let key = self
            .registry
            .key_properties(label)
            .map(|p| {
                properties
                    .get(p)
                    .map(|v| (p.to_string(), v.clone()))
                    .ok_or_else(|| ValidationError::MissingKeyProperty {
                        label: label.to_string(),
                        property: p.to_string(),
                    })
            })
            .collect::<Result<Properties, _>>()?;

        let stmt = Statement::merge_on_key(label, key.clone(), labels, properties)?;
        match self.tx.run(&stmt) {
            Ok(rows) => Ok(Some(require_id(&rows, &stmt)?)),
            Err(e) if e.is_constraint_violation() => {
                warn!(label, key = ?key, error = %e, "cannot merge node, falling back to match on key");
                let fallback = Statement::match_node(vec![label.to_string()], key)?;
                Ok(first_id(&self.tx.run(&fallback)?))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Finds the node linked by `EXTERNAL_ID` to `(:id_type {id: id})`.
    ///
    /// # Errors
    ///
    /// Validation error if `id_type` is not an identifier; store errors propagate.
    pub fn resolve_external_id(&mut self, id_type: &str, id: Value) -> IypResult<Option<NodeId>> {
        let key = CacheKey::external_id(id_type, &id);
        if let Some(hit) = self.cache.get(&key) {
            debug!(?key, "external id cache hit");
            return Ok(hit);
        }

        let stmt = Statement::match_external_id(id_type, id)?;
        let resolved = first_id(&self.tx.run(&stmt)?);
        self.cache.insert(key, resolved);
        Ok(resolved)
    }
}
