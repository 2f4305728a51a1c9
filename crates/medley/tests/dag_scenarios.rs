//! Collection DAG and query scenarios.

use medley::query::Projection;
use medley::{
    Collection, CollectionBuilder, CollectionChange, CollectionDag, ErrorKind, MemoryLibrary,
    Namespace, Signal, SignalBus, Value,
};

fn collections(name: &str) -> Collection {
    Collection::reference("Collections", name)
}

#[test]
fn test_cycle_leaves_dag_unchanged() {
    let dag = CollectionDag::default();
    let original = CollectionBuilder::universe().has("artist").build();
    dag.save("X", Namespace::Collections, original.clone()).unwrap();
    dag.save("Y", Namespace::Collections, collections("X")).unwrap();

    let mut sub = dag.signals().subscribe();
    let err = dag
        .save("X", Namespace::Collections, collections("Y"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CyclicCollection);
    assert_eq!(dag.get("X", Namespace::Collections).unwrap(), original);
    assert!(sub.drain().is_empty());

    let err = dag
        .save("Z", Namespace::Collections, collections("Z"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CyclicCollection);
    assert!(!dag.contains("Z", Namespace::Collections));
}

#[test]
fn test_save_signals_add_then_update() {
    let dag = CollectionDag::new(SignalBus::new(8));
    let mut sub = dag.signals().subscribe();

    dag.save("Test", Namespace::Collections, Collection::universe())
        .unwrap();
    let signals = sub.drain();
    assert_eq!(signals.len(), 1);
    let payload = signals[0].to_value();
    let payload = payload.as_dict().unwrap();
    assert_eq!(payload.get_int("type"), Some(CollectionChange::Add as i64));
    assert_eq!(payload.get_str("namespace"), Some("Collections"));
    assert_eq!(payload.get_str("name"), Some("Test"));

    dag.save(
        "Test",
        Namespace::Collections,
        CollectionBuilder::universe().has("title").build(),
    )
    .unwrap();
    assert!(matches!(
        sub.drain().as_slice(),
        [Signal::CollectionChanged { change: CollectionChange::Update, .. }]
    ));
}

#[test]
fn test_rename_rewrites_referrers_across_namespaces() {
    let dag = CollectionDag::default();
    dag.save("base", Namespace::Collections, Collection::universe())
        .unwrap();
    dag.save(
        "filtered",
        Namespace::Collections,
        CollectionBuilder::reference("Collections", "base")
            .has("artist")
            .build(),
    )
    .unwrap();

    let mut sub = dag.signals().subscribe();
    dag.rename("base", "renamed", Namespace::Collections).unwrap();

    let filtered = dag.get("filtered", Namespace::Collections).unwrap();
    assert_eq!(filtered.references(), vec![("Collections", "renamed")]);
    assert!(dag.get("base", Namespace::Collections).is_err());

    let signals = sub.drain();
    assert!(matches!(
        &signals[0],
        Signal::CollectionChanged { change: CollectionChange::Rename, new_name: Some(n), .. } if n == "renamed"
    ));
    assert!(matches!(
        &signals[1],
        Signal::CollectionChanged { change: CollectionChange::Update, name, .. } if name == "filtered"
    ));
}

#[test]
fn test_referenced_binding_cannot_be_removed() {
    let dag = CollectionDag::default();
    dag.save("base", Namespace::Collections, Collection::universe())
        .unwrap();
    dag.save("user", Namespace::Collections, collections("base"))
        .unwrap();

    let err = dag.remove("base", Namespace::Collections).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    dag.remove("user", Namespace::Collections).unwrap();
    dag.remove("base", Namespace::Collections).unwrap();
    assert_eq!(
        dag.remove("base", Namespace::Collections).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn test_find_and_list() {
    let library = MemoryLibrary::new();
    let a = library.insert_with([("genre", "rock")]);
    let b = library.insert_with([("genre", "jazz")]);

    let dag = CollectionDag::default();
    dag.save(
        "rock",
        Namespace::Collections,
        CollectionBuilder::universe().equals("genre", "rock").build(),
    )
    .unwrap();
    dag.save(
        "everything",
        Namespace::Collections,
        Collection::reference("Collections", medley::ALL_MEDIA),
    )
    .unwrap();

    assert_eq!(dag.list(Namespace::Collections), vec!["rock", "everything"]);
    assert_eq!(
        dag.find(a, Namespace::Collections, &library).unwrap(),
        vec!["rock", "everything"]
    );
    assert_eq!(
        dag.find(b, Namespace::Collections, &library).unwrap(),
        vec!["everything"]
    );
}

#[test]
fn test_query_infos_ordered_projection() {
    let library = MemoryLibrary::new();
    let second = library.insert_with([
        ("artist", Value::from("Vibrasphere")),
        ("album", Value::from("Lungs of the Earth")),
        ("title", Value::from("Breathing Place")),
        ("tracknr", Value::from(2i64)),
    ]);
    let first = library.insert_with([
        ("artist", Value::from("Vibrasphere")),
        ("album", Value::from("Lungs of the Earth")),
        ("title", Value::from("Decade")),
        ("tracknr", Value::from(1i64)),
        ("date", Value::from("2008")),
    ]);

    let dag = CollectionDag::default();
    let coll = CollectionBuilder::universe()
        .order_by(&["artist", "album", "tracknr"])
        .build();
    let projection = Projection::new(["artist", "album", "title", "tracknr", "date"])
        .group_by(["position"]);
    let rows = dag.query_infos(&coll, &library, &projection).unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get_str("title"), Some("Decade"));
    assert_eq!(rows[0].get_str("date"), Some("2008"));
    assert_eq!(rows[0].len(), 5);
    assert_eq!(rows[1].get_str("title"), Some("Breathing Place"));
    assert!(!rows[1].contains_key("date"));
    assert_eq!(rows[1].len(), 4);

    let ids = dag.query_ids(&coll, &library).unwrap();
    assert_eq!(ids, vec![first, second]);
}

#[test]
fn test_evaluation_errors_surface() {
    let library = MemoryLibrary::new();
    let dag = CollectionDag::default();
    let err = dag
        .query_ids(&collections("missing"), &library)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let broken = Collection::new(medley::CollectionType::Intersection);
    let err = dag.query_ids(&broken, &library).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[test]
fn test_snapshot_restore_replaces_state() {
    let dag = CollectionDag::default();
    dag.save("keep", Namespace::Collections, Collection::universe())
        .unwrap();
    let snapshot = dag.snapshot();

    dag.save("later", Namespace::Collections, Collection::universe())
        .unwrap();
    let mut sub = dag.signals().subscribe();
    dag.restore(&snapshot).unwrap();

    assert_eq!(dag.list(Namespace::Collections), vec!["keep"]);
    assert_eq!(dag.snapshot(), snapshot);
    assert!(sub.drain().is_empty());

    let mut cyclic = snapshot.as_dict().unwrap().clone();
    let mut bindings = cyclic.get("Collections").unwrap().as_dict().unwrap().clone();
    bindings.set("loop", collections("loop"));
    cyclic.set("Collections", bindings);
    assert_eq!(
        dag.restore(&Value::Dict(cyclic)).unwrap_err().kind(),
        ErrorKind::CyclicCollection
    );
    assert_eq!(dag.snapshot(), snapshot);
}
