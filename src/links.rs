//! Relationship batcher.
//!
//! Creates every link from one source node in a single statement, so a batch
//! is applied entirely or not at all. Links are merged, never duplicated: an
//! existing relationship with the same type, endpoints and properties is
//! reused.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{IypResult, ValidationError};
use crate::normalize::normalize;
use crate::provenance::MANDATORY_KEYS;
use crate::statement::{LinkSpec, Statement};
use crate::storage::Transaction;
use crate::value::{NodeId, Properties, Value};

/// A relationship to create from a source node.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// Relationship type, by convention in uppercase.
    pub rel_type: String,
    /// Destination node.
    pub target: NodeId,
    /// Relationship properties, including the provenance keys.
    pub properties: Properties,
}

impl Link {
    /// Creates a link.
    #[must_use]
    pub fn new(rel_type: impl Into<String>, target: NodeId, properties: Properties) -> Self {
        Self {
            rel_type: rel_type.into(),
            target,
            properties,
        }
    }
}

/// Builds the batch statement, rejecting the whole batch if any link lacks
/// provenance.
fn batch_statement(source: NodeId, links: &[Link]) -> Result<Statement, ValidationError> {
    for (index, link) in links.iter().enumerate() {
        if let Some(key) = MANDATORY_KEYS
            .into_iter()
            .find(|k| !link.properties.contains_key(*k))
        {
            return Err(ValidationError::MissingProvenance { index, key });
        }
    }

    let mut slots: BTreeMap<NodeId, usize> = BTreeMap::new();
    let mut destinations = Vec::new();
    let mut specs = Vec::with_capacity(links.len());
    for link in links {
        let destination = *slots.entry(link.target).or_insert_with(|| {
            destinations.push(link.target);
            destinations.len() - 1
        });
        specs.push(LinkSpec {
            rel_type: link.rel_type.clone(),
            destination,
            properties: normalize(&link.properties)?,
        });
    }

    Statement::merge_links(source, destinations, specs)
}

/// Merges `links` from `source` inside `tx`.
///
/// # Errors
///
/// Returns a validation error, before anything is sent to the store, if any
/// link is missing a provenance property or carries an invalid type or key.
/// Store errors propagate and leave the transaction unchanged.
pub fn add_links(tx: &mut dyn Transaction, source: NodeId, links: &[Link]) -> IypResult<()> {
    if links.is_empty() {
        return Ok(());
    }

    let stmt = batch_statement(source, links)?;
    let rows = tx.run(&stmt)?;

    let matched = rows
        .first()
        .and_then(|r| r.get("matched"))
        .and_then(Value::as_int)
        .unwrap_or(0);
    if matched == 0 {
        warn!(%source, links = links.len(), "source or destination node not found, no link created");
    } else {
        debug!(%source, links = links.len(), "links merged");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::{Provenance, REFERENCE_URL};
    use crate::statement::Operation;

    #[test]
    fn test_missing_key_rejects_batch() {
        let p = Provenance::new("X", "http://x");
        let mut broken = p.link("PEERS_WITH", NodeId::new(3));
        broken.properties.remove(REFERENCE_URL);
        let links = vec![p.link("PEERS_WITH", NodeId::new(2)), broken];

        let err = batch_statement(NodeId::new(1), &links).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingProvenance { index: 1, key: REFERENCE_URL }
        ));
    }

    #[test]
    fn test_destinations_deduplicated() {
        let p = Provenance::new("X", "http://x");
        let links = vec![
            p.link("A", NodeId::new(2)),
            p.link("B", NodeId::new(2)),
            p.link("A", NodeId::new(3)),
        ];
        let stmt = batch_statement(NodeId::new(1), &links).unwrap();
        let Operation::MergeLinks { destinations, links, .. } = stmt.operation() else {
            panic!("expected merge_links");
        };
        assert_eq!(destinations, &vec![NodeId::new(2), NodeId::new(3)]);
        assert_eq!(links[1].destination, 0);
        assert_eq!(links[2].destination, 1);
    }
}
