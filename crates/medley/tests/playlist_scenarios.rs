//! Playlist, party shuffle and persistence scenarios.

use std::sync::Arc;
use std::time::Duration;

use medley::config::{PersistConfig, PlaylistConfig};
use medley::playlist::ACTIVE_PLAYLIST;
use medley::{
    CollectionBuilder, CollectionDag, CoreConfig, CoreService, DEFAULT_PLAYLIST, ErrorKind,
    MediaLibrary, MemoryLibrary, Method, Namespace, PlaylistChange, PlaylistEngine, Signal,
    SignalBus, Value, persist,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn engine_with(entries: usize) -> (Arc<PlaylistEngine>, Arc<MemoryLibrary>, Vec<i64>) {
    let bus = SignalBus::default();
    let dag = Arc::new(CollectionDag::new(bus.clone()));
    let library = Arc::new(MemoryLibrary::with_signals(bus));
    let ids = (0..entries)
        .map(|i| library.insert_with([("title", format!("song {i}"))]))
        .collect();
    let engine = Arc::new(PlaylistEngine::new(
        dag,
        library.clone(),
        PlaylistConfig::default(),
    ));
    (engine, library, ids)
}

#[test]
fn test_advance_scenario() {
    let (engine, _, ids) = engine_with(2);
    engine.add_entry(ACTIVE_PLAYLIST, ids[0]).unwrap();
    engine.add_entry(ACTIVE_PLAYLIST, ids[1]).unwrap();

    assert_eq!(
        engine.current_entry(ACTIVE_PLAYLIST).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert!(engine.advance(ACTIVE_PLAYLIST).unwrap());
    assert_eq!(engine.current_position(ACTIVE_PLAYLIST).unwrap(), 0);
    assert_eq!(engine.current_entry(ACTIVE_PLAYLIST).unwrap(), ids[0]);
    assert!(engine.advance(ACTIVE_PLAYLIST).unwrap());
    assert_eq!(engine.current_entry(ACTIVE_PLAYLIST).unwrap(), ids[1]);
    assert!(!engine.advance(ACTIVE_PLAYLIST).unwrap());
    assert_eq!(engine.current_position(ACTIVE_PLAYLIST).unwrap(), 0);
}

#[test]
fn test_mutations_announce_update_first() {
    let (engine, _, ids) = engine_with(3);
    for id in &ids {
        engine.add_entry(DEFAULT_PLAYLIST, *id).unwrap();
    }
    let mut sub = engine.dag().signals().subscribe();

    engine.move_entry(DEFAULT_PLAYLIST, 0, 2).unwrap();
    engine.shuffle(DEFAULT_PLAYLIST).unwrap();
    engine.sort(DEFAULT_PLAYLIST, &["title"]).unwrap();
    engine.clear(DEFAULT_PLAYLIST).unwrap();

    let changes: Vec<PlaylistChange> = sub
        .drain()
        .into_iter()
        .filter_map(|s| match s {
            Signal::PlaylistChanged { change, .. } => Some(change),
            Signal::CollectionChanged { .. } => None,
            other => panic!("unexpected signal {other:?}"),
        })
        .collect();
    assert_eq!(
        changes,
        vec![
            PlaylistChange::Move,
            PlaylistChange::Shuffle,
            PlaylistChange::Sort,
            PlaylistChange::Clear
        ]
    );
}

#[test]
fn test_removing_last_current_entry_clears_cursor() {
    init_tracing();
    let (engine, _, ids) = engine_with(3);
    engine.add_entry(DEFAULT_PLAYLIST, ids[0]).unwrap();
    engine.add_entry(DEFAULT_PLAYLIST, ids[1]).unwrap();
    engine.set_next(DEFAULT_PLAYLIST, 1).unwrap();

    let mut sub = engine.dag().signals().subscribe();
    engine.remove_entry(DEFAULT_PLAYLIST, 1).unwrap();
    assert_eq!(engine.current_position(DEFAULT_PLAYLIST).unwrap(), -1);

    engine.add_entry(DEFAULT_PLAYLIST, ids[2]).unwrap();
    assert_eq!(engine.current_position(DEFAULT_PLAYLIST).unwrap(), -1);
    assert_eq!(
        engine.current_entry(DEFAULT_PLAYLIST).unwrap_err().kind(),
        ErrorKind::NotFound
    );

    let positions: Vec<i32> = sub
        .drain()
        .into_iter()
        .filter_map(|s| match s {
            Signal::PlaylistCurrentPos { position, .. } => Some(position),
            _ => None,
        })
        .collect();
    assert_eq!(positions, vec![-1]);
}

#[test]
fn test_party_shuffle_bounded_after_every_advance() {
    init_tracing();
    let (engine, _, _) = engine_with(10);
    let mut updater = medley::PartyShuffleUpdater::new(engine.clone());
    engine.create_party_shuffle("party", None, 1, 2).unwrap();
    engine.load("party").unwrap();
    updater.process_pending();

    for _ in 0..20 {
        engine.advance(ACTIVE_PLAYLIST).unwrap();
        updater.process_pending();
        let len = engine.entries(ACTIVE_PLAYLIST).unwrap().len();
        assert!(len <= 1 + 1 + 2, "party shuffle grew to {len}");
        assert!(engine.current_entry(ACTIVE_PLAYLIST).is_ok());
    }
}

#[test]
fn test_party_shuffle_pool_by_reference() {
    let (engine, library, _) = engine_with(0);
    let jazz = library.insert_with([("genre", "jazz")]);
    library.insert_with([("genre", "rock")]);
    engine
        .dag()
        .save(
            "jazz",
            Namespace::Collections,
            CollectionBuilder::universe().equals("genre", "jazz").build(),
        )
        .unwrap();

    let pool = medley::Collection::reference("Collections", "jazz");
    engine.create_party_shuffle("party", Some(pool), 0, 4).unwrap();
    assert_eq!(engine.entries("party").unwrap(), vec![jazz; 4]);

    // the pool keeps the referenced collection alive
    let err = engine
        .dag()
        .remove("jazz", Namespace::Collections)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[test]
fn test_entry_removal_reaches_every_playlist() {
    let (engine, library, ids) = engine_with(3);
    let mut updater = medley::PartyShuffleUpdater::new(engine.clone());
    engine.create("other").unwrap();
    for id in &ids {
        engine.add_entry(DEFAULT_PLAYLIST, *id).unwrap();
        engine.add_entry("other", *id).unwrap();
    }
    engine.set_next(DEFAULT_PLAYLIST, 2).unwrap();

    let mut sub = engine.dag().signals().subscribe();
    library.remove(ids[1]).unwrap();
    updater.process_pending();

    assert_eq!(engine.entries(DEFAULT_PLAYLIST).unwrap(), vec![ids[0], ids[2]]);
    assert_eq!(engine.entries("other").unwrap(), vec![ids[0], ids[2]]);
    assert_eq!(engine.current_entry(DEFAULT_PLAYLIST).unwrap(), ids[2]);

    let signals = sub.drain();
    assert!(signals.contains(&Signal::MedialibEntryRemoved { id: ids[1] }));
    assert!(signals.contains(&Signal::PlaylistCurrentPos {
        name: DEFAULT_PLAYLIST.to_string(),
        position: 1
    }));
}

#[tokio::test]
async fn test_updater_runs_in_background() {
    init_tracing();
    let (engine, _, _) = engine_with(6);
    engine.create_party_shuffle("party", None, 0, 3).unwrap();
    let updater = medley::PartyShuffleUpdater::new(engine.clone());
    let task = tokio::spawn(updater.run());

    engine.advance("party").unwrap();
    engine.advance("party").unwrap();

    let mut settled = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let entries = engine.entries("party").unwrap();
        let position = engine.current_position("party").unwrap();
        if position == 0 && entries.len() == 4 {
            settled = true;
            break;
        }
    }
    assert!(settled, "updater did not replenish the playlist");
    task.abort();
}

#[tokio::test]
async fn test_subscription_sees_only_later_signals() {
    let (service, library) = CoreService::in_memory(&CoreConfig::default());
    let id = library.insert_with([("title", "x")]);
    service.call(Method::PlaylistAddId, &[DEFAULT_PLAYLIST.into(), Value::Int64(id)]);

    let mut sub = service.subscribe();
    service.call(Method::PlaylistSetNext, &[DEFAULT_PLAYLIST.into(), Value::Int64(0)]);
    let signal = tokio::time::timeout(Duration::from_secs(1), sub.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        signal,
        Signal::PlaylistCurrentPos {
            name: DEFAULT_PLAYLIST.to_string(),
            position: 0
        }
    );
    assert_eq!(sub.drain_value(), Value::List(Default::default()));
}

#[test]
fn test_playlists_survive_persistence() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.mdag");

    let (engine, _, ids) = engine_with(3);
    engine.create("road trip").unwrap();
    for id in &ids {
        engine.add_entry("road trip", *id).unwrap();
    }
    engine.set_next("road trip", 1).unwrap();
    engine.load("road trip").unwrap();
    persist::save(engine.dag(), &path, &PersistConfig::default()).unwrap();

    let (restored, _, _) = engine_with(3);
    persist::load(restored.dag(), &path).unwrap();
    assert_eq!(restored.dag().active_playlist(), "road trip");
    assert_eq!(restored.entries(ACTIVE_PLAYLIST).unwrap(), ids);
    assert_eq!(restored.current_position(ACTIVE_PLAYLIST).unwrap(), -1);
    let saved = restored.dag().get("road trip", Namespace::Playlists).unwrap();
    assert_eq!(saved.attribute("position"), None);
}
