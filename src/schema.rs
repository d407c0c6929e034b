//! Constraint and index registry, and the startup schema pass.
//!
//! The registry is the contract between the resolver and the store schema:
//! which labels carry identity keys, and which properties deserve a
//! secondary index. [`SchemaManager::declare`] pushes it to the store once,
//! before the first transaction opens.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ExecutionError, IypResult};
use crate::statement::{validate_identifier, Statement};
use crate::storage::GraphStore;

/// Kind of property constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    /// No two nodes with the label share the property value.
    Unique,
    /// Every node with the label has the property. Enterprise editions only.
    NotNull,
}

impl ConstraintKind {
    /// Cypher spelling of the constraint predicate.
    #[must_use]
    pub const fn cypher(self) -> &'static str {
        match self {
            Self::Unique => "UNIQUE",
            Self::NotNull => "NOT NULL",
        }
    }

    /// Store-side name of the constraint, e.g. `AS_UNIQUE_asn`.
    #[must_use]
    pub fn constraint_name(self, label: &str, property: &str) -> String {
        let tag = match self {
            Self::Unique => "UNIQUE",
            Self::NotNull => "NOTNULL",
        };
        format!("{label}_{tag}_{property}")
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cypher())
    }
}

type PropertyConstraints = BTreeMap<String, BTreeSet<ConstraintKind>>;

/// Per-label constraints and indexes.
///
/// Labels are kept in declaration order, which doubles as the priority order
/// when an entity carries more than one constrained label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintRegistry {
    constraints: Vec<(String, PropertyConstraints)>,
    indexes: Vec<(String, Vec<String>)>,
}

impl ConstraintRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry used by IYP crawlers.
    #[must_use]
    pub fn iyp_default() -> Self {
        use ConstraintKind::{NotNull, Unique};

        Self::new()
            .with_constraint("AS", "asn", [Unique, NotNull])
            .with_constraint("PREFIX", "prefix", [Unique, NotNull])
            .with_constraint("PREFIX", "af", [NotNull])
            .with_constraint("IP", "ip", [Unique, NotNull])
            .with_constraint("IP", "af", [NotNull])
            .with_constraint("DOMAIN_NAME", "name", [Unique, NotNull])
            .with_constraint("COUNTRY", "country_code", [Unique, NotNull])
            .with_constraint("ORGANIZATION", "name", [NotNull])
            .with_index("PEERINGDB_ORG_ID", "id")
    }

    /// Adds constraint kinds on `label.property`.
    #[must_use]
    pub fn with_constraint(
        mut self,
        label: &str,
        property: &str,
        kinds: impl IntoIterator<Item = ConstraintKind>,
    ) -> Self {
        let idx = match self.constraints.iter().position(|(l, _)| l == label) {
            Some(idx) => idx,
            None => {
                self.constraints.push((label.to_string(), BTreeMap::new()));
                self.constraints.len() - 1
            }
        };
        self.constraints[idx]
            .1
            .entry(property.to_string())
            .or_default()
            .extend(kinds);
        self
    }

    /// Adds a secondary index on `label.property`.
    #[must_use]
    pub fn with_index(mut self, label: &str, property: &str) -> Self {
        match self.indexes.iter_mut().find(|(l, _)| l == label) {
            Some((_, props)) => {
                if !props.iter().any(|p| p == property) {
                    props.push(property.to_string());
                }
            }
            None => self
                .indexes
                .push((label.to_string(), vec![property.to_string()])),
        }
        self
    }

    /// Moves the listed labels to the front of the priority order, keeping
    /// the relative order of the others. Unknown labels are ignored.
    #[must_use]
    pub fn with_priority<S: AsRef<str>>(mut self, order: impl IntoIterator<Item = S>) -> Self {
        let order: Vec<String> = order.into_iter().map(|s| s.as_ref().to_string()).collect();
        let rank = |label: &str| {
            order
                .iter()
                .position(|o| o == label)
                .unwrap_or(order.len())
        };
        self.constraints.sort_by_key(|(label, _)| rank(label));
        self
    }

    /// Returns true if `label` has at least one constrained property.
    #[must_use]
    pub fn is_constrained(&self, label: &str) -> bool {
        self.constraints.iter().any(|(l, _)| l == label)
    }

    /// Constrained properties of `label`, i.e. its identity key.
    pub fn key_properties<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.constraints
            .iter()
            .filter(move |(l, _)| l == label)
            .flat_map(|(_, props)| props.keys().map(String::as_str))
    }

    /// Picks the merge label among `labels`: the constrained label that comes
    /// first in priority order, independent of the caller's label order.
    #[must_use]
    pub fn merge_label<'a>(&'a self, labels: &BTreeSet<String>) -> Option<&'a str> {
        let mut candidates = self
            .constraints
            .iter()
            .map(|(l, _)| l.as_str())
            .filter(|l| labels.contains(*l));
        let chosen = candidates.next()?;
        let others: Vec<&str> = candidates.collect();
        if !others.is_empty() {
            warn!(
                chosen,
                ignored = ?others,
                "entity carries several constrained labels; merging on the highest priority one"
            );
        }
        Some(chosen)
    }

    /// Every `(label, property, kind)` triple, in declaration order.
    pub fn constraints(&self) -> impl Iterator<Item = (&str, &str, ConstraintKind)> {
        self.constraints.iter().flat_map(|(label, props)| {
            props.iter().flat_map(move |(prop, kinds)| {
                kinds
                    .iter()
                    .map(move |kind| (label.as_str(), prop.as_str(), *kind))
            })
        })
    }

    /// Every `(label, property)` index, in declaration order.
    pub fn indexes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.indexes.iter().flat_map(|(label, props)| {
            props.iter().map(move |p| (label.as_str(), p.as_str()))
        })
    }

    /// Checks that every label and property name is a plain identifier.
    ///
    /// # Errors
    ///
    /// Returns the first invalid identifier found.
    pub fn validate(&self) -> Result<(), crate::error::ValidationError> {
        for (label, prop, _) in self.constraints() {
            validate_identifier("label", label)?;
            validate_identifier("property", prop)?;
        }
        for (label, prop) in self.indexes() {
            validate_identifier("label", label)?;
            validate_identifier("property", prop)?;
        }
        Ok(())
    }
}

/// Outcome of a schema pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    /// Names of constraints the store accepted.
    pub constraints: Vec<String>,
    /// Constraints skipped because the store edition does not support them.
    pub skipped: Vec<String>,
    /// Optional schema items (indexes, not-null constraints) that failed.
    pub failed: Vec<String>,
}

/// Declares the registry's constraints and indexes on a store.
#[derive(Debug, Clone, Copy)]
pub struct SchemaManager<'a> {
    registry: &'a ConstraintRegistry,
    enterprise: bool,
}

impl<'a> SchemaManager<'a> {
    /// Creates a manager. Community editions (`enterprise == false`) only
    /// receive uniqueness constraints.
    #[must_use]
    pub const fn new(registry: &'a ConstraintRegistry, enterprise: bool) -> Self {
        Self {
            registry,
            enterprise,
        }
    }

    /// Issues every constraint and index declaration, outside any long-lived
    /// transaction.
    ///
    /// # Errors
    ///
    /// A failed uniqueness constraint is fatal and returned as
    /// [`ExecutionError::ConstraintDeclaration`]. Failed indexes and not-null
    /// constraints are logged and listed in the report.
    pub fn declare(&self, store: &dyn GraphStore) -> IypResult<SchemaReport> {
        self.registry.validate()?;
        let mut report = SchemaReport::default();

        for (label, property, kind) in self.registry.constraints() {
            let name = kind.constraint_name(label, property);
            if !self.enterprise && kind != ConstraintKind::Unique {
                debug!(constraint = %name, "skipping constraint unsupported by community edition");
                report.skipped.push(name);
                continue;
            }

            let stmt = Statement::create_constraint(label, property, kind)?;
            match store.run_schema(&stmt) {
                Ok(()) => report.constraints.push(name),
                Err(source) if kind == ConstraintKind::Unique => {
                    return Err(ExecutionError::ConstraintDeclaration { name, source }.into());
                }
                Err(e) => {
                    warn!(constraint = %name, error = %e, "cannot create constraint");
                    report.failed.push(name);
                }
            }
        }

        for (label, property) in self.registry.indexes() {
            let stmt = Statement::create_index(label, property)?;
            if let Err(e) = store.run_schema(&stmt) {
                warn!(label, property, error = %e, "cannot create index");
                report.failed.push(format!("{label}_INDEX_{property}"));
            }
        }

        info!(
            constraints = report.constraints.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "schema declared"
        );
        Ok(report)
    }
}
