//! The collection DAG: named collections in two namespaces.
//!
//! Saved collections may reference each other by name. The store keeps a
//! reverse index from every binding to the bindings that reference it, so
//! renames can rewrite referrers and removals can refuse to orphan them.
//! Reference chains never form a cycle: the check and the commit of a save
//! happen under one write lock.
//!
//! Each playlist's cursor is kept beside its binding, keyed by playlist
//! name, and never inside the collection. A cursor is either absent (-1, no
//! current entry) or an index into the playlist's id list.

use std::fmt;
use std::str::FromStr;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};

use crate::error::{CoreError, Result};
use crate::medialib::MediaLibrary;
use crate::model::{Collection, Dict, Value};
use crate::query::{self, Projection};
use crate::signal::{CollectionChange, Signal, SignalBus};
use crate::validate::{check_references, reference_targets, validate_collection, validate_tree};

/// Name of the built-in reference that evaluates to the whole library.
pub const ALL_MEDIA: &str = "All Media";

/// Name of the playlist created with every new DAG.
pub const DEFAULT_PLAYLIST: &str = "Default";

/// Collection namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    Collections,
    Playlists,
}

impl Namespace {
    pub const ALL: [Namespace; 2] = [Namespace::Collections, Namespace::Playlists];

    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Collections => "Collections",
            Namespace::Playlists => "Playlists",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for Namespace {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Collections" => Ok(Namespace::Collections),
            "Playlists" => Ok(Namespace::Playlists),
            other => Err(CoreError::InvalidNamespace(other.to_string())),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Looks up saved collections by namespace and name.
pub trait CollectionResolver {
    fn resolve(&self, namespace: Namespace, name: &str) -> Option<&Collection>;
}

type BindingKey = (Namespace, String);

fn targets_of(coll: &Collection) -> Vec<BindingKey> {
    reference_targets(coll).unwrap_or_default()
}

#[derive(Debug, Clone)]
struct DagState {
    bindings: [IndexMap<String, Collection>; 2],
    /// target -> bindings whose trees reference it
    referrers: FxHashMap<BindingKey, FxHashSet<BindingKey>>,
    active_playlist: String,
    /// playlist name -> current position
    positions: FxHashMap<String, i32>,
}

impl CollectionResolver for DagState {
    fn resolve(&self, namespace: Namespace, name: &str) -> Option<&Collection> {
        self.bindings[namespace.index()].get(name)
    }
}

impl DagState {
    fn with_default_playlist() -> Self {
        let mut state = Self {
            bindings: [IndexMap::new(), IndexMap::new()],
            referrers: FxHashMap::default(),
            active_playlist: DEFAULT_PLAYLIST.to_string(),
            positions: FxHashMap::default(),
        };
        state.ensure_active_playlist();
        state
    }

    fn ensure_active_playlist(&mut self) {
        let playlists = &mut self.bindings[Namespace::Playlists.index()];
        if !playlists.contains_key(&self.active_playlist) {
            playlists.insert(self.active_playlist.clone(), Collection::idlist_of([]));
        }
    }

    fn link(&mut self, referrer: &BindingKey, targets: Vec<BindingKey>) {
        for target in targets {
            self.referrers
                .entry(target)
                .or_default()
                .insert(referrer.clone());
        }
    }

    fn unlink(&mut self, referrer: &BindingKey, targets: Vec<BindingKey>) {
        for target in targets {
            if let Some(set) = self.referrers.get_mut(&target) {
                set.remove(referrer);
                if set.is_empty() {
                    self.referrers.remove(&target);
                }
            }
        }
    }

    fn rebuild_referrers(&mut self) {
        self.referrers.clear();
        let edges: Vec<(BindingKey, Vec<BindingKey>)> = Namespace::ALL
            .iter()
            .flat_map(|ns| {
                self.bindings[ns.index()]
                    .iter()
                    .map(move |(name, coll)| ((*ns, name.clone()), targets_of(coll)))
            })
            .collect();
        for (referrer, targets) in edges {
            self.link(&referrer, targets);
        }
    }

    fn position(&self, playlist: &str) -> i32 {
        self.positions.get(playlist).copied().unwrap_or(-1)
    }

    /// Stores a cursor, dropping it when it falls outside `len` entries.
    fn set_position(&mut self, playlist: &str, position: i32, len: usize) {
        if position >= 0 && (position as usize) < len {
            self.positions.insert(playlist.to_string(), position);
        } else {
            self.positions.remove(playlist);
        }
    }

    fn require(&self, namespace: Namespace, name: &str) -> Result<&Collection> {
        self.resolve(namespace, name)
            .ok_or_else(|| not_found(namespace, name))
    }
}

/// Outcome of [`CollectionDag::update_playlist`].
#[derive(Debug)]
pub(crate) struct PlaylistUpdate<R> {
    pub(crate) output: R,
    /// Cursor before the update.
    pub(crate) before: i32,
    /// Cursor as committed.
    pub(crate) after: i32,
}

fn not_found(namespace: Namespace, name: &str) -> CoreError {
    CoreError::CollectionNotFound {
        name: name.to_string(),
        namespace,
    }
}

/// The store of named collections.
///
/// All methods take `&self`; the store is meant to be shared behind an `Arc`
/// between the IPC surface, the playlist engine and the updater.
#[derive(Debug)]
pub struct CollectionDag {
    state: RwLock<DagState>,
    signals: SignalBus,
}

impl Default for CollectionDag {
    fn default() -> Self {
        Self::new(SignalBus::default())
    }
}

impl CollectionDag {
    /// Creates a DAG holding only the empty default playlist.
    pub fn new(signals: SignalBus) -> Self {
        Self {
            state: RwLock::new(DagState::with_default_playlist()),
            signals,
        }
    }

    pub fn signals(&self) -> &SignalBus {
        &self.signals
    }

    fn read(&self) -> RwLockReadGuard<'_, DagState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, DagState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Binds `coll` to `name`, replacing any previous binding.
    ///
    /// Emits an Add change for a new name and an Update change otherwise.
    /// Replacing a playlist keeps its cursor unless the new id list is too
    /// short for it, in which case the cursor is cleared and announced.
    pub fn save(&self, name: &str, namespace: Namespace, coll: Collection) -> Result<()> {
        if name.is_empty() {
            return Err(CoreError::invalid_request("collection name is empty"));
        }
        validate_collection(&coll, namespace)?;

        let (existed, cursor_cleared) = {
            let mut state = self.write();
            check_references(&*state, name, namespace, &coll)?;

            let key = (namespace, name.to_string());
            if let Some(previous) = state.resolve(namespace, name) {
                let old_targets = targets_of(previous);
                state.unlink(&key, old_targets);
            }
            state.link(&key, targets_of(&coll));

            let mut cursor_cleared = false;
            if namespace == Namespace::Playlists {
                let before = state.position(name);
                state.set_position(name, before, coll.idlist_len());
                cursor_cleared = before != state.position(name);
            }
            let existed = state.bindings[namespace.index()]
                .insert(name.to_string(), coll)
                .is_some();
            (existed, cursor_cleared)
        };

        let change = if existed {
            CollectionChange::Update
        } else {
            CollectionChange::Add
        };
        debug!(name, %namespace, ?change, "collection saved");
        self.signals.emit(Signal::collection(change, namespace, name));
        if cursor_cleared {
            self.signals.emit(Signal::PlaylistCurrentPos {
                name: name.to_string(),
                position: -1,
            });
        }
        Ok(())
    }

    /// Returns a copy of the collection bound to `name`.
    pub fn get(&self, name: &str, namespace: Namespace) -> Result<Collection> {
        self.read().require(namespace, name).cloned()
    }

    pub fn contains(&self, name: &str, namespace: Namespace) -> bool {
        self.read().resolve(namespace, name).is_some()
    }

    /// Removes the binding `name`.
    ///
    /// Refused while another binding references it, and for the active
    /// playlist.
    pub fn remove(&self, name: &str, namespace: Namespace) -> Result<()> {
        {
            let mut state = self.write();
            state.require(namespace, name)?;

            let key = (namespace, name.to_string());
            if let Some((_, referrer)) = state
                .referrers
                .get(&key)
                .and_then(|set| set.iter().min().cloned())
            {
                return Err(CoreError::CollectionInUse {
                    name: name.to_string(),
                    namespace,
                    referrer,
                });
            }
            if namespace == Namespace::Playlists && state.active_playlist == name {
                return Err(CoreError::invalid_request(format!(
                    "cannot remove the active playlist '{name}'"
                )));
            }

            let removed = state.bindings[namespace.index()]
                .shift_remove(name)
                .ok_or_else(|| not_found(namespace, name))?;
            state.unlink(&key, targets_of(&removed));
            if namespace == Namespace::Playlists {
                state.positions.remove(name);
            }
        }

        debug!(name, %namespace, "collection removed");
        self.signals.emit(Signal::collection(
            CollectionChange::Remove,
            namespace,
            name,
        ));
        Ok(())
    }

    /// Renames a binding and repoints every reference to it.
    ///
    /// Emits a Rename change, then an Update change for each rewritten
    /// referrer.
    pub fn rename(&self, old: &str, new: &str, namespace: Namespace) -> Result<()> {
        if new.is_empty() {
            return Err(CoreError::invalid_request("collection name is empty"));
        }
        let rewritten = {
            let mut state = self.write();
            state.require(namespace, old)?;
            if state.resolve(namespace, new).is_some() {
                return Err(CoreError::invalid_request(format!(
                    "a collection named '{new}' already exists in {namespace}"
                )));
            }

            let old_key = (namespace, old.to_string());
            let new_key = (namespace, new.to_string());
            let coll = state.bindings[namespace.index()]
                .shift_remove(old)
                .ok_or_else(|| not_found(namespace, old))?;
            let targets = targets_of(&coll);
            state.unlink(&old_key, targets.clone());
            state.link(&new_key, targets);
            state.bindings[namespace.index()].insert(new.to_string(), coll);

            let referrers = state.referrers.remove(&old_key).unwrap_or_default();
            let mut rewritten: Vec<BindingKey> = referrers.iter().cloned().collect();
            rewritten.sort();
            for (ns, name) in &rewritten {
                if let Some(referrer) = state.bindings[ns.index()].get_mut(name) {
                    referrer.rewrite_references(namespace.as_str(), old, new);
                }
            }
            if !referrers.is_empty() {
                state.referrers.insert(new_key, referrers);
            }

            if namespace == Namespace::Playlists {
                if state.active_playlist == old {
                    state.active_playlist = new.to_string();
                }
                if let Some(position) = state.positions.remove(old) {
                    state.positions.insert(new.to_string(), position);
                }
            }
            rewritten
        };

        debug!(old, new, %namespace, referrers = rewritten.len(), "collection renamed");
        self.signals.emit(Signal::CollectionChanged {
            change: CollectionChange::Rename,
            namespace,
            name: old.to_string(),
            new_name: Some(new.to_string()),
        });
        for (ns, name) in rewritten {
            self.signals
                .emit(Signal::collection(CollectionChange::Update, ns, &name));
        }
        Ok(())
    }

    /// Returns the names bound in `namespace`, in binding order.
    pub fn list(&self, namespace: Namespace) -> Vec<String> {
        self.read().bindings[namespace.index()]
            .keys()
            .cloned()
            .collect()
    }

    /// Returns the names in `namespace` whose evaluation contains `id`.
    pub fn find<L>(&self, id: i64, namespace: Namespace, library: &L) -> Result<Vec<String>>
    where
        L: MediaLibrary + ?Sized,
    {
        let state = self.read();
        let mut names = Vec::new();
        for (name, coll) in &state.bindings[namespace.index()] {
            if query::evaluate(&*state, library, coll)?.contains(&id) {
                names.push(name.clone());
            }
        }
        Ok(names)
    }

    /// Evaluates a collection against the library.
    pub fn query_ids<L>(&self, coll: &Collection, library: &L) -> Result<Vec<i64>>
    where
        L: MediaLibrary + ?Sized,
    {
        validate_tree(coll)?;
        query::evaluate(&*self.read(), library, coll)
    }

    /// Evaluates a collection and projects the result into rows.
    pub fn query_infos<L>(
        &self,
        coll: &Collection,
        library: &L,
        projection: &Projection,
    ) -> Result<Vec<Dict>>
    where
        L: MediaLibrary + ?Sized,
    {
        let ids = self.query_ids(coll, library)?;
        Ok(query::project(library, &ids, projection))
    }

    /// Evaluates the collection bound to `name`.
    pub fn evaluate_binding<L>(&self, name: &str, namespace: Namespace, library: &L) -> Result<Vec<i64>>
    where
        L: MediaLibrary + ?Sized,
    {
        let state = self.read();
        let coll = state.require(namespace, name)?;
        query::evaluate(&*state, library, coll)
    }

    /// Runs `f` on the collection bound to `name` without copying it.
    pub fn with<R>(&self, name: &str, namespace: Namespace, f: impl FnOnce(&Collection) -> R) -> Result<R> {
        let state = self.read();
        Ok(f(state.require(namespace, name)?))
    }

    /// Runs `f` on playlist `name` and its cursor.
    pub fn with_playlist<R>(&self, name: &str, f: impl FnOnce(&Collection, i32) -> R) -> Result<R> {
        let state = self.read();
        let coll = state.require(Namespace::Playlists, name)?;
        Ok(f(coll, state.position(name)))
    }

    /// Returns the cursor of playlist `name`, -1 when it has no current entry.
    pub fn playlist_position(&self, name: &str) -> Result<i32> {
        self.with_playlist(name, |_, position| position)
    }

    /// Mutates playlist `name` and its cursor together.
    ///
    /// Both are committed only if `f` succeeds, and a cursor left outside
    /// the id list is committed as -1. No signal is emitted; callers announce
    /// their own changes. `f` must not alter references.
    pub(crate) fn update_playlist<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Collection, &mut i32) -> Result<R>,
    ) -> Result<PlaylistUpdate<R>> {
        let mut state = self.write();
        let before = state.position(name);
        let slot = state.bindings[Namespace::Playlists.index()]
            .get_mut(name)
            .ok_or_else(|| not_found(Namespace::Playlists, name))?;
        let mut working = slot.clone();
        let mut position = before;
        let output = f(&mut working, &mut position)?;
        let len = working.idlist_len();
        *slot = working;
        state.set_position(name, position, len);
        Ok(PlaylistUpdate {
            output,
            before,
            after: state.position(name),
        })
    }

    pub fn active_playlist(&self) -> String {
        self.read().active_playlist.clone()
    }

    /// Makes `name` the active playlist.
    pub(crate) fn set_active_playlist(&self, name: &str) -> Result<()> {
        let mut state = self.write();
        state.require(Namespace::Playlists, name)?;
        state.active_playlist = name.to_string();
        Ok(())
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Captures every binding and the active playlist as a value.
    ///
    /// The result is a dict with one dict per namespace (name to collection)
    /// and the active playlist name under `active_playlist`. Playlist cursors
    /// are not part of it.
    pub fn snapshot(&self) -> Value {
        let state = self.read();
        let mut root = Dict::new();
        for ns in Namespace::ALL {
            let bindings: Dict = state.bindings[ns.index()]
                .iter()
                .map(|(name, coll)| (name.clone(), Value::Collection(coll.clone())))
                .collect();
            root.set(ns.as_str(), bindings);
        }
        root.set("active_playlist", state.active_playlist.as_str());
        Value::Dict(root)
    }

    /// Replaces the whole store with a snapshot taken by [`snapshot`](Self::snapshot).
    ///
    /// The snapshot is fully checked before anything is replaced. Every
    /// playlist starts without a current entry. No signals are emitted.
    pub fn restore(&self, snapshot: &Value) -> Result<()> {
        let root = snapshot.as_dict()?;
        let mut state = DagState {
            bindings: [IndexMap::new(), IndexMap::new()],
            referrers: FxHashMap::default(),
            active_playlist: root
                .get_str("active_playlist")
                .unwrap_or(DEFAULT_PLAYLIST)
                .to_string(),
            positions: FxHashMap::default(),
        };
        for ns in Namespace::ALL {
            let Some(bindings) = root.get(ns.as_str()) else {
                continue;
            };
            for (name, value) in bindings.as_dict()?.iter() {
                let coll = value.as_collection()?;
                validate_collection(coll, ns)?;
                state.bindings[ns.index()].insert(name.to_string(), coll.clone());
            }
        }
        for ns in Namespace::ALL {
            for (name, coll) in &state.bindings[ns.index()] {
                check_references(&state, name, ns, coll)?;
            }
        }
        state.ensure_active_playlist();
        state.rebuild_referrers();

        info!(
            collections = state.bindings[Namespace::Collections.index()].len(),
            playlists = state.bindings[Namespace::Playlists.index()].len(),
            active = %state.active_playlist,
            "collection DAG restored"
        );
        *self.write() = state;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::medialib::MemoryLibrary;
    use crate::model::CollectionBuilder;

    fn dag() -> CollectionDag {
        CollectionDag::default()
    }

    #[test]
    fn test_namespace_parse() {
        assert_eq!("Playlists".parse::<Namespace>().unwrap(), Namespace::Playlists);
        let err = "playlists".parse::<Namespace>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_save_emits_add_then_update() {
        let dag = dag();
        let mut sub = dag.signals().subscribe();
        dag.save("test", Namespace::Collections, Collection::universe())
            .unwrap();
        dag.save("test", Namespace::Collections, Collection::idlist_of([1]))
            .unwrap();

        let changes: Vec<CollectionChange> = sub
            .drain()
            .into_iter()
            .filter_map(|s| match s {
                Signal::CollectionChanged { change, .. } => Some(change),
                _ => None,
            })
            .collect();
        assert_eq!(changes, vec![CollectionChange::Add, CollectionChange::Update]);
        assert_eq!(
            dag.get("test", Namespace::Collections).unwrap().ids(),
            vec![1]
        );
    }

    #[test]
    fn test_get_copy_is_independent() {
        let dag = dag();
        dag.save("a", Namespace::Collections, Collection::idlist_of([1]))
            .unwrap();
        let mut copy = dag.get("a", Namespace::Collections).unwrap();
        copy.push_id(2);
        assert_eq!(dag.get("a", Namespace::Collections).unwrap().ids(), vec![1]);
    }

    #[test]
    fn test_cycle_rejected_and_dag_unchanged() {
        let dag = dag();
        dag.save("x", Namespace::Collections, Collection::universe())
            .unwrap();
        dag.save(
            "y",
            Namespace::Collections,
            Collection::reference("Collections", "x"),
        )
        .unwrap();

        let before = dag.snapshot();
        let err = dag
            .save(
                "x",
                Namespace::Collections,
                Collection::reference("Collections", "y"),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CyclicCollection);
        assert_eq!(dag.snapshot(), before);
    }

    #[test]
    fn test_remove_referenced_rejected() {
        let dag = dag();
        dag.save("x", Namespace::Collections, Collection::universe())
            .unwrap();
        dag.save(
            "y",
            Namespace::Collections,
            Collection::reference("Collections", "x"),
        )
        .unwrap();

        let err = dag.remove("x", Namespace::Collections).unwrap_err();
        assert!(matches!(err, CoreError::CollectionInUse { ref referrer, .. } if referrer == "y"));

        dag.remove("y", Namespace::Collections).unwrap();
        dag.remove("x", Namespace::Collections).unwrap();
        assert!(dag.list(Namespace::Collections).is_empty());

        let err = dag.remove("x", Namespace::Collections).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_rename_rewrites_referrers() {
        let dag = dag();
        dag.save("x", Namespace::Collections, Collection::universe())
            .unwrap();
        dag.save(
            "y",
            Namespace::Collections,
            CollectionBuilder::reference("Collections", "x")
                .equals("artist", "Foo")
                .build(),
        )
        .unwrap();
        let mut sub = dag.signals().subscribe();

        dag.rename("x", "z", Namespace::Collections).unwrap();

        let y = dag.get("y", Namespace::Collections).unwrap();
        assert_eq!(y.references(), vec![("Collections", "z")]);
        assert!(!dag.contains("x", Namespace::Collections));

        let signals = sub.drain();
        assert!(matches!(
            &signals[0],
            Signal::CollectionChanged { change: CollectionChange::Rename, new_name: Some(n), .. } if n == "z"
        ));
        assert!(matches!(
            &signals[1],
            Signal::CollectionChanged { change: CollectionChange::Update, name, .. } if name == "y"
        ));

        // The reverse index followed the rename
        assert!(dag.remove("z", Namespace::Collections).is_err());
    }

    #[test]
    fn test_rename_conflicts() {
        let dag = dag();
        dag.save("a", Namespace::Collections, Collection::universe())
            .unwrap();
        dag.save("b", Namespace::Collections, Collection::universe())
            .unwrap();
        assert_eq!(
            dag.rename("a", "b", Namespace::Collections)
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidRequest
        );
        assert_eq!(
            dag.rename("nope", "c", Namespace::Collections)
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_playlists_namespace() {
        let dag = dag();
        assert_eq!(dag.list(Namespace::Playlists), vec![DEFAULT_PLAYLIST]);
        assert!(
            dag.save("p", Namespace::Playlists, Collection::universe())
                .is_err()
        );
        assert!(
            dag.remove(DEFAULT_PLAYLIST, Namespace::Playlists)
                .is_err()
        );

        dag.save("p", Namespace::Playlists, Collection::idlist_of([1]))
            .unwrap();
        dag.set_active_playlist("p").unwrap();
        dag.rename("p", "q", Namespace::Playlists).unwrap();
        assert_eq!(dag.active_playlist(), "q");
    }

    #[test]
    fn test_find() {
        let lib = MemoryLibrary::new();
        let a = lib.insert_with([("artist", "Foo")]);
        let b = lib.insert_with([("artist", "Bar")]);

        let dag = dag();
        dag.save(
            "foo",
            Namespace::Collections,
            CollectionBuilder::universe().equals("artist", "Foo").build(),
        )
        .unwrap();
        dag.save("all", Namespace::Collections, Collection::universe())
            .unwrap();

        assert_eq!(
            dag.find(a, Namespace::Collections, &lib).unwrap(),
            vec!["foo", "all"]
        );
        assert_eq!(dag.find(b, Namespace::Collections, &lib).unwrap(), vec!["all"]);
    }

    #[test]
    fn test_snapshot_restore() {
        let dag = dag();
        dag.save("x", Namespace::Collections, Collection::universe())
            .unwrap();
        dag.save(
            "y",
            Namespace::Collections,
            Collection::reference("Collections", "x"),
        )
        .unwrap();
        dag.save("p", Namespace::Playlists, Collection::idlist_of([3, 4]))
            .unwrap();
        dag.set_active_playlist("p").unwrap();
        let snapshot = dag.snapshot();

        let restored = CollectionDag::default();
        restored.restore(&snapshot).unwrap();
        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.active_playlist(), "p");
        // Reverse index is rebuilt
        assert!(restored.remove("x", Namespace::Collections).is_err());
    }

    #[test]
    fn test_restore_rejects_dangling_reference() {
        let dag = dag();
        let mut root = dag.snapshot().into_dict().unwrap();
        let mut collections = Dict::new();
        collections.set("y", Collection::reference("Collections", "missing"));
        root.set("Collections", collections);

        let err = dag.restore(&Value::Dict(root)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(dag.list(Namespace::Collections).len(), 0);
    }

    fn place_cursor(dag: &CollectionDag, playlist: &str, position: i32) {
        dag.update_playlist(playlist, |_, cursor| {
            *cursor = position;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_cursor_outside_idlist_is_dropped() {
        let dag = dag();
        dag.save("p", Namespace::Playlists, Collection::idlist_of([1, 2]))
            .unwrap();
        place_cursor(&dag, "p", 1);
        assert_eq!(dag.playlist_position("p").unwrap(), 1);

        let update = dag
            .update_playlist("p", |coll, _| coll.idlist_remove(1))
            .unwrap();
        assert_eq!((update.output, update.before, update.after), (2, 1, -1));

        // Growing the list again must not bring the old cursor back
        dag.update_playlist("p", |coll, _| {
            coll.push_id(3);
            Ok(())
        })
        .unwrap();
        assert_eq!(dag.playlist_position("p").unwrap(), -1);
    }

    #[test]
    fn test_cursor_is_not_stored_in_collection() {
        let dag = dag();
        dag.save("p", Namespace::Playlists, Collection::idlist_of([1, 2, 3]))
            .unwrap();
        place_cursor(&dag, "p", 2);

        let coll = dag.get("p", Namespace::Playlists).unwrap();
        assert_eq!(coll.attribute("position"), None);
        assert_eq!(coll, Collection::idlist_of([1, 2, 3]));

        // An attribute of that name is plain data
        let mut replacement = Collection::idlist_of([4, 5, 6]);
        replacement.set_attribute("position", "0");
        dag.save("p", Namespace::Playlists, replacement).unwrap();
        assert_eq!(dag.playlist_position("p").unwrap(), 2);
    }

    #[test]
    fn test_save_clears_cursor_past_new_end() {
        let dag = dag();
        dag.save("p", Namespace::Playlists, Collection::idlist_of([1, 2, 3]))
            .unwrap();
        place_cursor(&dag, "p", 2);

        let mut sub = dag.signals().subscribe();
        dag.save("p", Namespace::Playlists, Collection::idlist_of([1]))
            .unwrap();
        assert_eq!(dag.playlist_position("p").unwrap(), -1);
        let signals = sub.drain();
        assert_eq!(signals.len(), 2);
        assert_eq!(
            signals[1],
            Signal::PlaylistCurrentPos {
                name: "p".to_string(),
                position: -1
            }
        );
    }

    #[test]
    fn test_cursor_follows_rename_and_remove() {
        let dag = dag();
        dag.save("p", Namespace::Playlists, Collection::idlist_of([1, 2]))
            .unwrap();
        place_cursor(&dag, "p", 1);

        dag.rename("p", "q", Namespace::Playlists).unwrap();
        assert_eq!(dag.playlist_position("q").unwrap(), 1);
        assert!(dag.playlist_position("p").is_err());

        dag.remove("q", Namespace::Playlists).unwrap();
        dag.save("q", Namespace::Playlists, Collection::idlist_of([1, 2]))
            .unwrap();
        assert_eq!(dag.playlist_position("q").unwrap(), -1);
    }

    #[test]
    fn test_restore_resets_cursors() {
        let dag = dag();
        dag.save("p", Namespace::Playlists, Collection::idlist_of([1, 2]))
            .unwrap();
        place_cursor(&dag, "p", 1);
        let snapshot = dag.snapshot();

        dag.restore(&snapshot).unwrap();
        assert_eq!(dag.playlist_position("p").unwrap(), -1);
        assert_eq!(dag.snapshot(), snapshot);
    }
}
