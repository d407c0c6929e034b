//! Parametrized graph statements.
//!
//! Every statement IYP sends to the store is built here. Values are always
//! bound parameters; only labels, relationship types and property keys are
//! spliced into the query text, and those are validated as plain identifiers
//! first so that no caller-supplied string can change the statement's shape.
//!
//! A [`Statement`] exposes both its Cypher rendering ([`Statement::cypher`],
//! [`Statement::params`]) for Bolt-speaking executors and its structured
//! [`Operation`] for backends that interpret statements directly.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::ValidationError;
use crate::schema::ConstraintKind;
use crate::value::{NodeId, Properties, Value};

/// Relationship type linking an entity to its foreign-identifier node.
pub const EXTERNAL_ID: &str = "EXTERNAL_ID";

/// Bound parameters of a statement, by parameter name.
pub type Params = BTreeMap<String, Value>;

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is a valid regex")
    })
}

/// Checks that `value` can be used verbatim as a label, type or key.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidIdentifier`] if `value` is not a plain identifier.
pub fn validate_identifier(kind: &'static str, value: &str) -> Result<(), ValidationError> {
    if identifier_regex().is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidIdentifier {
            kind,
            value: value.to_string(),
        })
    }
}

fn validate_keys(props: &Properties) -> Result<(), ValidationError> {
    props
        .keys()
        .try_for_each(|k| validate_identifier("property", k))
}

fn validate_labels(labels: &[String]) -> Result<(), ValidationError> {
    if labels.is_empty() {
        return Err(ValidationError::NoLabels);
    }
    labels
        .iter()
        .try_for_each(|l| validate_identifier("label", l))
}

/// One relationship inside a [`Operation::MergeLinks`] batch.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSpec {
    /// Relationship type.
    pub rel_type: String,
    /// Index into the batch's distinct destination list.
    pub destination: usize,
    /// Relationship properties, already normalized.
    pub properties: Properties,
}

/// Structured form of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Idempotent constraint declaration.
    CreateConstraint {
        /// Constrained label.
        label: String,
        /// Constrained property.
        property: String,
        /// Constraint kind.
        kind: ConstraintKind,
    },
    /// Idempotent secondary index declaration.
    CreateIndex {
        /// Indexed label.
        label: String,
        /// Indexed property.
        property: String,
    },
    /// Merge on the key of a constrained label, then overwrite every supplied
    /// property and add every supplied label on both branches.
    MergeOnKey {
        /// Constrained label used for the match.
        label: String,
        /// Unique key properties.
        key: Properties,
        /// All labels to apply.
        labels: Vec<String>,
        /// All properties to apply.
        properties: Properties,
    },
    /// Merge on the full label set and property map.
    Merge {
        /// Labels of the pattern.
        labels: Vec<String>,
        /// Properties of the pattern.
        properties: Properties,
    },
    /// Read-only match on labels and properties.
    Match {
        /// Labels of the pattern.
        labels: Vec<String>,
        /// Properties of the pattern.
        properties: Properties,
    },
    /// Read-only match through an `EXTERNAL_ID` relationship.
    MatchExternalId {
        /// Label of the foreign-identifier node.
        id_type: String,
        /// Value of its `id` property.
        id: Value,
    },
    /// Merge a batch of relationships from one source node.
    MergeLinks {
        /// Source node.
        source: NodeId,
        /// Distinct destination nodes.
        destinations: Vec<NodeId>,
        /// Relationships to merge.
        links: Vec<LinkSpec>,
    },
}

/// A validated, parametrized statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    op: Operation,
}

impl Statement {
    /// `CREATE CONSTRAINT ... IF NOT EXISTS`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the label or property is not an identifier.
    pub fn create_constraint(
        label: &str,
        property: &str,
        kind: ConstraintKind,
    ) -> Result<Self, ValidationError> {
        validate_identifier("label", label)?;
        validate_identifier("property", property)?;
        Ok(Self {
            op: Operation::CreateConstraint {
                label: label.to_string(),
                property: property.to_string(),
                kind,
            },
        })
    }

    /// `CREATE INDEX ... IF NOT EXISTS`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the label or property is not an identifier.
    pub fn create_index(label: &str, property: &str) -> Result<Self, ValidationError> {
        validate_identifier("label", label)?;
        validate_identifier("property", property)?;
        Ok(Self {
            op: Operation::CreateIndex {
                label: label.to_string(),
                property: property.to_string(),
            },
        })
    }

    /// Merge a node on the unique key of `label`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if any label or key is not an identifier.
    pub fn merge_on_key(
        label: &str,
        key: Properties,
        labels: Vec<String>,
        properties: Properties,
    ) -> Result<Self, ValidationError> {
        validate_identifier("label", label)?;
        validate_labels(&labels)?;
        validate_keys(&key)?;
        validate_keys(&properties)?;
        Ok(Self {
            op: Operation::MergeOnKey {
                label: label.to_string(),
                key,
                labels,
                properties,
            },
        })
    }

    /// Merge a node on its full label set and property map.
    ///
    /// # Errors
    ///
    /// Returns a validation error if any label or key is not an identifier.
    pub fn merge(labels: Vec<String>, properties: Properties) -> Result<Self, ValidationError> {
        validate_labels(&labels)?;
        validate_keys(&properties)?;
        Ok(Self {
            op: Operation::Merge { labels, properties },
        })
    }

    /// Match a node on labels and properties.
    ///
    /// # Errors
    ///
    /// Returns a validation error if any label or key is not an identifier.
    pub fn match_node(
        labels: Vec<String>,
        properties: Properties,
    ) -> Result<Self, ValidationError> {
        validate_labels(&labels)?;
        validate_keys(&properties)?;
        Ok(Self {
            op: Operation::Match { labels, properties },
        })
    }

    /// Match the node holding an `EXTERNAL_ID` link to `(:id_type {id})`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `id_type` is not an identifier.
    pub fn match_external_id(id_type: &str, id: Value) -> Result<Self, ValidationError> {
        validate_identifier("label", id_type)?;
        Ok(Self {
            op: Operation::MatchExternalId {
                id_type: id_type.to_string(),
                id,
            },
        })
    }

    /// Merge a batch of relationships from `source`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a type or property key is not an
    /// identifier, or a link refers to a destination index out of range.
    pub fn merge_links(
        source: NodeId,
        destinations: Vec<NodeId>,
        links: Vec<LinkSpec>,
    ) -> Result<Self, ValidationError> {
        for link in &links {
            validate_identifier("relationship type", &link.rel_type)?;
            validate_keys(&link.properties)?;
            if link.destination >= destinations.len() {
                return Err(ValidationError::InvalidIdentifier {
                    kind: "destination",
                    value: link.destination.to_string(),
                });
            }
        }
        Ok(Self {
            op: Operation::MergeLinks {
                source,
                destinations,
                links,
            },
        })
    }

    /// Returns the structured form of this statement.
    #[must_use]
    pub const fn operation(&self) -> &Operation {
        &self.op
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self.op {
            Operation::CreateConstraint { .. } => "create_constraint",
            Operation::CreateIndex { .. } => "create_index",
            Operation::MergeOnKey { .. } => "merge_on_key",
            Operation::Merge { .. } => "merge",
            Operation::Match { .. } => "match",
            Operation::MatchExternalId { .. } => "match_external_id",
            Operation::MergeLinks { .. } => "merge_links",
        }
    }

    /// Renders the Cypher text of this statement.
    #[must_use]
    pub fn cypher(&self) -> String {
        match &self.op {
            Operation::CreateConstraint {
                label,
                property,
                kind,
            } => format!(
                "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:{label}) REQUIRE n.{property} IS {}",
                kind.constraint_name(label, property),
                kind.cypher()
            ),
            Operation::CreateIndex { label, property } => format!(
                "CREATE INDEX {label}_INDEX_{property} IF NOT EXISTS FOR (n:{label}) ON (n.{property})"
            ),
            Operation::MergeOnKey {
                label,
                key,
                labels,
                properties,
            } => {
                let sets = set_clause("a", "p", properties, labels);
                format!(
                    "MERGE (a:{label}{}) ON CREATE SET {sets} ON MATCH SET {sets} RETURN id(a) AS id",
                    pattern("k", key)
                )
            }
            Operation::Merge { labels, properties } => format!(
                "MERGE (a:{}{}) RETURN id(a) AS id",
                labels.join(":"),
                pattern("p", properties)
            ),
            Operation::Match { labels, properties } => format!(
                "MATCH (a:{}{}) RETURN id(a) AS id LIMIT 1",
                labels.join(":"),
                pattern("p", properties)
            ),
            Operation::MatchExternalId { id_type, .. } => format!(
                "MATCH (a)-[:{EXTERNAL_ID}]->(:{id_type} {{id: $id}}) RETURN id(a) AS id LIMIT 1"
            ),
            Operation::MergeLinks {
                destinations,
                links,
                ..
            } => {
                let mut q = String::from("MATCH (x) WHERE id(x) = $src");
                for i in 0..destinations.len() {
                    let _ = write!(q, " MATCH (d{i}) WHERE id(d{i}) = $dst{i}");
                }
                for (i, link) in links.iter().enumerate() {
                    let _ = write!(
                        q,
                        " MERGE (x)-[:{}{}]->(d{})",
                        link.rel_type,
                        pattern(&format!("l{i}"), &link.properties),
                        link.destination
                    );
                }
                q.push_str(" RETURN count(x) AS matched");
                q
            }
        }
    }

    /// Returns the bound parameters referenced by [`Statement::cypher`].
    #[must_use]
    pub fn params(&self) -> Params {
        let mut params = Params::new();
        match &self.op {
            Operation::CreateConstraint { .. } | Operation::CreateIndex { .. } => {}
            Operation::MergeOnKey {
                key, properties, ..
            } => {
                bind(&mut params, "k", key);
                bind(&mut params, "p", properties);
            }
            Operation::Merge { properties, .. } | Operation::Match { properties, .. } => {
                bind(&mut params, "p", properties);
            }
            Operation::MatchExternalId { id, .. } => {
                params.insert("id".to_string(), id.clone());
            }
            Operation::MergeLinks {
                source,
                destinations,
                links,
            } => {
                params.insert("src".to_string(), (*source).into());
                for (i, dst) in destinations.iter().enumerate() {
                    params.insert(format!("dst{i}"), (*dst).into());
                }
                for (i, link) in links.iter().enumerate() {
                    bind(&mut params, &format!("l{i}"), &link.properties);
                }
            }
        }
        params
    }
}

fn pattern(prefix: &str, props: &Properties) -> String {
    if props.is_empty() {
        return String::new();
    }
    let fields: Vec<String> = props
        .keys()
        .map(|k| format!("{k}: ${prefix}_{k}"))
        .collect();
    format!(" {{{}}}", fields.join(", "))
}

fn set_clause(var: &str, prefix: &str, props: &Properties, labels: &[String]) -> String {
    let mut parts: Vec<String> = props
        .keys()
        .map(|k| format!("{var}.{k} = ${prefix}_{k}"))
        .collect();
    parts.push(format!("{var}:{}", labels.join(":")));
    parts.join(", ")
}

fn bind(params: &mut Params, prefix: &str, props: &Properties) {
    for (k, v) in props {
        params.insert(format!("{prefix}_{k}"), v.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::properties;

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("label", "DOMAIN_NAME").is_ok());
        assert!(validate_identifier("label", "_x1").is_ok());
        assert!(validate_identifier("label", "1abc").is_err());
        assert!(validate_identifier("label", "AS) DETACH DELETE (n").is_err());
        assert!(validate_identifier("property", "point in time").is_err());
        assert!(validate_identifier("property", "").is_err());
    }

    #[test]
    fn test_values_never_spliced_into_text() {
        let hostile = "x\"}) DETACH DELETE a //";
        let stmt =
            Statement::match_node(vec!["ORGANIZATION".to_string()], properties([("name", hostile)]))
                .unwrap();
        assert!(!stmt.cypher().contains(hostile));
        assert_eq!(stmt.params()["p_name"], Value::from(hostile));
    }

    #[test]
    fn test_constraint_cypher() {
        let stmt = Statement::create_constraint("PREFIX", "af", ConstraintKind::NotNull).unwrap();
        assert_eq!(
            stmt.cypher(),
            "CREATE CONSTRAINT PREFIX_NOTNULL_af IF NOT EXISTS FOR (n:PREFIX) REQUIRE n.af IS NOT NULL"
        );
        assert!(stmt.params().is_empty());
    }

    #[test]
    fn test_merge_on_key_cypher() {
        let stmt = Statement::merge_on_key(
            "AS",
            properties([("asn", 2497)]),
            vec!["AS".to_string()],
            properties([("asn", Value::from(2497)), ("name", Value::from("IIJ"))]),
        )
        .unwrap();
        let q = stmt.cypher();
        assert!(q.starts_with("MERGE (a:AS {asn: $k_asn})"));
        assert!(q.contains("ON MATCH SET a.asn = $p_asn, a.name = $p_name, a:AS"));
        let params = stmt.params();
        assert_eq!(params["k_asn"], Value::Int(2497));
        assert_eq!(params["p_name"], Value::from("IIJ"));
    }

    #[test]
    fn test_merge_links_cypher() {
        let stmt = Statement::merge_links(
            NodeId::new(1),
            vec![NodeId::new(2)],
            vec![LinkSpec {
                rel_type: "ORIGINATE".to_string(),
                destination: 0,
                properties: properties([("reference_org", "TEST")]),
            }],
        )
        .unwrap();
        assert_eq!(
            stmt.cypher(),
            "MATCH (x) WHERE id(x) = $src MATCH (d0) WHERE id(d0) = $dst0 \
             MERGE (x)-[:ORIGINATE {reference_org: $l0_reference_org}]->(d0) RETURN count(x) AS matched"
        );
        assert_eq!(stmt.params()["dst0"], Value::Int(2));
    }

    #[test]
    fn test_merge_links_rejects_bad_type() {
        let err = Statement::merge_links(
            NodeId::new(1),
            vec![NodeId::new(2)],
            vec![LinkSpec {
                rel_type: "PEERS WITH".to_string(),
                destination: 0,
                properties: Properties::new(),
            }],
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_empty_labels_rejected() {
        let err = Statement::merge(Vec::new(), Properties::new()).unwrap_err();
        assert!(matches!(err, ValidationError::NoLabels));
    }
}
