use iyp::{
    properties, ConstraintKind, ConstraintRegistry, Edition, GraphStore, InMemoryGraph,
    SchemaManager, Statement, StoreError,
};

#[test]
fn enterprise_not_null_rejects_missing_property() {
    let store = InMemoryGraph::with_edition(Edition::Enterprise);
    let registry = ConstraintRegistry::iyp_default();
    SchemaManager::new(&registry, true).declare(&store).unwrap();

    let mut tx = store.begin().unwrap();
    let stmt = Statement::merge_on_key(
        "PREFIX",
        properties([("prefix", "10.0.0.0/8")]),
        vec!["PREFIX".to_string()],
        properties([("prefix", "10.0.0.0/8")]),
    )
    .unwrap();
    let err = tx.run(&stmt).unwrap_err();
    assert!(matches!(err, StoreError::ConstraintViolation { ref constraint, .. } if constraint == "PREFIX_NOTNULL_af"));
}

#[test]
fn unique_constraint_on_duplicated_data_fails() {
    let store = InMemoryGraph::new();
    let mut tx = store.begin().unwrap();
    let stmt = Statement::merge(vec!["AS".to_string()], properties([("asn", 1)])).unwrap();
    tx.run(&stmt).unwrap();
    let stmt = Statement::merge(
        vec!["AS".to_string()],
        properties([("asn", iyp::Value::from(1)), ("name", iyp::Value::from("dup"))]),
    )
    .unwrap();
    tx.run(&stmt).unwrap();
    tx.commit().unwrap();

    let registry = ConstraintRegistry::new().with_constraint("AS", "asn", [ConstraintKind::Unique]);
    let err = SchemaManager::new(&registry, false).declare(&store).unwrap_err();
    assert!(err.is_execution());
    assert!(err.to_string().contains("AS_UNIQUE_asn"));
}

#[test]
fn invalid_registry_identifiers_are_rejected() {
    let store = InMemoryGraph::new();
    let registry = ConstraintRegistry::new().with_index("BAD LABEL", "id");
    let err = SchemaManager::new(&registry, false).declare(&store).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(store.statements_executed(), 0);
}
