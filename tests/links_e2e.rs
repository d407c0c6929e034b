use std::sync::Arc;

use iyp::{properties, InMemoryGraph, Iyp, IypConfig, Link, NodeId, Provenance, ValidationError, Value};

fn open_with_nodes(n: i64) -> (Arc<InMemoryGraph>, Iyp, Vec<NodeId>) {
    let store = Arc::new(InMemoryGraph::new());
    let mut iyp = Iyp::open(store.clone(), &IypConfig::default()).unwrap();
    let ids = (1..=n)
        .map(|asn| {
            iyp.resolve(["AS"], &properties([("asn", asn)]), true)
                .unwrap()
                .unwrap()
        })
        .collect();
    (store, iyp, ids)
}

#[test]
fn batch_with_missing_provenance_creates_nothing() {
    let (store, mut iyp, ids) = open_with_nodes(4);
    let reference = Provenance::new("TEST", "http://x");

    let mut broken = reference.link("PEERS_WITH", ids[2]);
    broken.properties.remove("reference_time");
    let links = vec![
        reference.link("PEERS_WITH", ids[1]),
        broken,
        reference.link("PEERS_WITH", ids[3]),
    ];

    let executed = store.statements_executed();
    let err = iyp.add_links(ids[0], &links).unwrap_err();
    assert!(err.is_validation());
    assert!(matches!(
        err,
        iyp::IypError::Validation(ValidationError::MissingProvenance { index: 1, key: "reference_time" })
    ));
    assert_eq!(store.statements_executed(), executed);

    iyp.commit().unwrap();
    assert_eq!(store.relationship_count(), 0);
}

#[test]
fn batch_creates_one_relationship_per_link() {
    let (store, mut iyp, ids) = open_with_nodes(3);
    let reference = Provenance::new("TEST", "http://x");

    let links = vec![
        reference.link("PEERS_WITH", ids[1]),
        reference.link_with("PEERS_WITH", ids[2], properties([("rel", 0)])),
        reference.link("DEPENDS_ON", ids[1]),
    ];
    let executed = store.statements_executed();
    iyp.add_links(ids[0], &links).unwrap();
    assert_eq!(store.statements_executed(), executed + 1);
    iyp.commit().unwrap();

    assert_eq!(store.relationship_count(), 3);
    assert_eq!(store.relationships(ids[0], ids[1], "PEERS_WITH").len(), 1);
    assert_eq!(store.relationships(ids[0], ids[1], "DEPENDS_ON").len(), 1);
    let rels = store.relationships(ids[0], ids[2], "PEERS_WITH");
    assert_eq!(rels[0]["rel"], Value::Int(0));
}

#[test]
fn repeated_batches_merge_instead_of_duplicating() {
    let (store, mut iyp, ids) = open_with_nodes(2);
    let reference = Provenance::new("TEST", "http://x");
    let links = [reference.link("PEERS_WITH", ids[1])];

    iyp.add_links(ids[0], &links).unwrap();
    iyp.commit().unwrap();
    iyp.add_links(ids[0], &links).unwrap();
    iyp.commit().unwrap();

    assert_eq!(store.relationship_count(), 1);
}

#[test]
fn different_provenance_creates_distinct_relationships() {
    let (store, mut iyp, ids) = open_with_nodes(2);
    let a = Provenance::new("A", "http://a");
    let b = Provenance::new("B", "http://b");

    iyp.add_links(ids[0], &[a.link("PEERS_WITH", ids[1])]).unwrap();
    iyp.add_links(ids[0], &[b.link("PEERS_WITH", ids[1])]).unwrap();
    iyp.commit().unwrap();

    assert_eq!(store.relationships(ids[0], ids[1], "PEERS_WITH").len(), 2);
}

#[test]
fn link_properties_are_normalized() {
    let (store, mut iyp, ids) = open_with_nodes(2);
    let reference = Provenance::new("TEST", "http://x");

    let link = reference.link_with("ROUTE_ORIGIN", ids[1], properties([("prefix", "2001:DB8::/48")]));
    iyp.add_links(ids[0], &[link]).unwrap();
    iyp.commit().unwrap();

    let rels = store.relationships(ids[0], ids[1], "ROUTE_ORIGIN");
    assert_eq!(rels[0]["prefix"], Value::from("2001:db8::/48"));
}

#[test]
fn missing_endpoint_creates_nothing() {
    let (store, mut iyp, ids) = open_with_nodes(2);
    let reference = Provenance::new("TEST", "http://x");

    let links = vec![
        reference.link("PEERS_WITH", ids[1]),
        reference.link("PEERS_WITH", NodeId::new(9_999)),
    ];
    iyp.add_links(ids[0], &links).unwrap();
    iyp.commit().unwrap();

    assert_eq!(store.relationship_count(), 0);
}

#[test]
fn invalid_relationship_type_is_rejected() {
    let (store, mut iyp, ids) = open_with_nodes(2);
    let reference = Provenance::new("TEST", "http://x");

    let links = [Link::new("PEERS WITH", ids[1], reference.properties())];
    let err = iyp.add_links(ids[0], &links).unwrap_err();
    assert!(err.is_validation());
    iyp.commit().unwrap();
    assert_eq!(store.relationship_count(), 0);
}

#[test]
fn empty_batch_is_a_no_op() {
    let (store, mut iyp, ids) = open_with_nodes(1);
    let executed = store.statements_executed();
    iyp.add_links(ids[0], &[]).unwrap();
    assert_eq!(store.statements_executed(), executed);
}
