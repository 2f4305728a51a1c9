//! Playlists: id lists bound in the Playlists namespace, with a cursor.
//!
//! A playlist is an [`Idlist`](CollectionType::Idlist) collection. Its
//! current position is tracked by the [`CollectionDag`] under the playlist's
//! name, apart from the collection, and is either -1 (no current entry) or
//! an index into the id list.
//!
//! Every mutation goes through [`CollectionDag`] and, on success, emits a
//! CollectionChanged Update for the playlist, then the PlaylistChanged
//! signal(s) describing the change, then PlaylistCurrentPos if the cursor
//! moved or its entry went away. Failed mutations leave the playlist
//! untouched and emit nothing.
//!
//! Party shuffle playlists carry `type = "pshuffle"`, the `history` and
//! `upcoming` window sizes, and optionally one operand naming the pool of
//! candidate entries (the whole library otherwise).

pub mod updater;

pub use updater::PartyShuffleUpdater;

use std::cmp::Ordering;
use std::sync::{Arc, Mutex, RwLock};

use rand::seq::SliceRandom;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::PlaylistConfig;
use crate::dag::{CollectionDag, Namespace};
use crate::error::{CoreError, Result};
use crate::medialib::MediaLibrary;
use crate::model::{Collection, CollectionType, Value, add_order_operators};
use crate::query::compare_optional;
use crate::signal::{CollectionChange, PlaylistChange, Signal};
use crate::validate::ATTR_PLAYLIST_TYPE;

/// Playlist name that stands for the active playlist.
pub const ACTIVE_PLAYLIST: &str = "_active";

/// `type` attribute value of party shuffle playlists.
pub const PARTY_SHUFFLE: &str = "pshuffle";

/// Default number of played entries a party shuffle keeps.
pub const DEFAULT_HISTORY: usize = 0;

/// Default number of entries a party shuffle queues after the current one.
pub const DEFAULT_UPCOMING: usize = 20;

fn is_party_shuffle(coll: &Collection) -> bool {
    coll.kind() == CollectionType::Idlist && coll.attribute(ATTR_PLAYLIST_TYPE) == Some(PARTY_SHUFFLE)
}

fn window_attribute(coll: &Collection, key: &str, default: usize) -> usize {
    coll.attribute_int(key)
        .map(|n| n.max(0) as usize)
        .unwrap_or(default)
}

fn check_new_name(name: &str) -> Result<()> {
    if name == ACTIVE_PLAYLIST {
        return Err(CoreError::invalid_request(format!(
            "'{ACTIVE_PLAYLIST}' is reserved for the active playlist"
        )));
    }
    Ok(())
}

/// Signals produced by one playlist update.
#[derive(Debug, Default)]
struct Changes {
    signals: Vec<Signal>,
    /// The current entry changed even if its index did not.
    cursor_touched: bool,
}

impl Changes {
    fn push(&mut self, signal: Signal) {
        self.signals.push(signal);
    }
}

/// Party shuffles being replenished, each with a request for another pass.
type ReplenishSet = Mutex<FxHashMap<String, bool>>;

/// Marks a party shuffle as being replenished until dropped.
struct Replenishing<'a> {
    names: &'a ReplenishSet,
    name: String,
}

impl Replenishing<'_> {
    /// Clears and returns the request for another pass.
    fn take_rerun(&self) -> bool {
        self.names
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(&self.name)
            .is_some_and(|rerun| std::mem::take(rerun))
    }
}

impl Drop for Replenishing<'_> {
    fn drop(&mut self) {
        self.names
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.name);
    }
}

/// Playlist operations over a shared DAG and media library.
///
/// Public methods accept [`ACTIVE_PLAYLIST`] wherever they take a playlist
/// name and resolve it once per call.
pub struct PlaylistEngine {
    dag: Arc<CollectionDag>,
    library: Arc<dyn MediaLibrary>,
    options: RwLock<PlaylistConfig>,
    replenishing: ReplenishSet,
}

impl std::fmt::Debug for PlaylistEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistEngine")
            .field("options", &self.options())
            .finish_non_exhaustive()
    }
}

impl PlaylistEngine {
    pub fn new(dag: Arc<CollectionDag>, library: Arc<dyn MediaLibrary>, options: PlaylistConfig) -> Self {
        Self {
            dag,
            library,
            options: RwLock::new(options),
            replenishing: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn dag(&self) -> &Arc<CollectionDag> {
        &self.dag
    }

    pub fn library(&self) -> &Arc<dyn MediaLibrary> {
        &self.library
    }

    pub fn options(&self) -> PlaylistConfig {
        *self.options.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_repeat_one(&self, enabled: bool) {
        self.options.write().unwrap_or_else(|e| e.into_inner()).repeat_one = enabled;
    }

    pub fn set_repeat_all(&self, enabled: bool) {
        self.options.write().unwrap_or_else(|e| e.into_inner()).repeat_all = enabled;
    }

    /// Resolves the active playlist alias.
    pub fn resolve_name(&self, name: &str) -> String {
        if name == ACTIVE_PLAYLIST {
            self.dag.active_playlist()
        } else {
            name.to_string()
        }
    }

    /// Updates the resolved playlist `name` and its cursor, then announces
    /// the outcome. Returns `f`'s output and the committed cursor.
    fn apply<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Collection, &mut i32, &mut Changes) -> Result<R>,
    ) -> Result<(R, i32)> {
        let mut changes = Changes::default();
        let update = self
            .dag
            .update_playlist(name, |coll, cursor| f(coll, cursor, &mut changes))?;

        let signals = self.dag.signals();
        if !changes.signals.is_empty() {
            signals.emit(Signal::collection(
                CollectionChange::Update,
                Namespace::Playlists,
                name,
            ));
        }
        for signal in changes.signals {
            signals.emit(signal);
        }
        if update.before != update.after || changes.cursor_touched {
            signals.emit(Signal::PlaylistCurrentPos {
                name: name.to_string(),
                position: update.after,
            });
        }
        Ok((update.output, update.after))
    }

    fn require_entry(&self, id: i64) -> Result<()> {
        if self.library.contains(id) {
            Ok(())
        } else {
            Err(CoreError::EntryNotFound(id))
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn list_playlists(&self) -> Vec<String> {
        self.dag.list(Namespace::Playlists)
    }

    pub fn entries(&self, name: &str) -> Result<Vec<i64>> {
        self.dag
            .with(&self.resolve_name(name), Namespace::Playlists, Collection::ids)
    }

    /// Returns the cursor position, -1 when there is no current entry.
    pub fn current_position(&self, name: &str) -> Result<i32> {
        self.dag.playlist_position(&self.resolve_name(name))
    }

    pub fn current_entry(&self, name: &str) -> Result<i64> {
        let name = self.resolve_name(name);
        let entry = self.dag.with_playlist(&name, |coll, position| match position {
            -1 => None,
            p => coll.idlist_get(i64::from(p)).ok(),
        })?;
        entry.ok_or(CoreError::NoCurrentEntry(name))
    }

    // =========================================================================
    // Cursor
    // =========================================================================

    /// Moves the cursor to the next entry.
    ///
    /// At the end of the list `repeat_one` keeps the cursor in place and
    /// `repeat_all` wraps it to the first entry. Without either flag the
    /// cursor resets to the first entry and `false` is returned.
    pub fn advance(&self, name: &str) -> Result<bool> {
        let name = self.resolve_name(name);
        let options = self.options();
        let (advanced, position) = self.apply(&name, |coll, cursor, _| {
            let len = coll.idlist_len() as i32;
            let (next, advanced) = if *cursor + 1 < len {
                (*cursor + 1, true)
            } else if options.repeat_one && *cursor >= 0 {
                (*cursor, true)
            } else if options.repeat_all && len > 0 {
                (0, true)
            } else if len > 0 {
                (0, false)
            } else {
                (-1, false)
            };
            *cursor = next;
            Ok(advanced)
        })?;
        debug!(playlist = %name, position, advanced, "advance");
        Ok(advanced)
    }

    /// Places the cursor on `position`.
    pub fn set_next(&self, name: &str, position: i64) -> Result<i32> {
        let name = self.resolve_name(name);
        let ((), current) = self.apply(&name, |coll, cursor, _| {
            *cursor = coll.idlist_index(position, false)? as i32;
            Ok(())
        })?;
        Ok(current)
    }

    /// Moves the cursor by `delta` entries, wrapping around when
    /// `repeat_all` is set.
    pub fn set_next_relative(&self, name: &str, delta: i64) -> Result<i32> {
        let name = self.resolve_name(name);
        let repeat_all = self.options().repeat_all;
        let ((), current) = self.apply(&name, |coll, cursor, _| {
            let len = coll.idlist_len() as i64;
            let mut target = i64::from((*cursor).max(0)) + delta;
            if repeat_all && len > 0 {
                target = target.rem_euclid(len);
            }
            if target < 0 || target >= len {
                return Err(CoreError::InvalidIndex {
                    index: target,
                    len: len as usize,
                });
            }
            *cursor = target as i32;
            Ok(())
        })?;
        Ok(current)
    }

    /// Makes `name` the active playlist.
    pub fn load(&self, name: &str) -> Result<()> {
        let name = self.resolve_name(name);
        self.dag.set_active_playlist(&name)?;
        debug!(playlist = %name, "playlist loaded");
        self.dag
            .signals()
            .emit(Signal::PlaylistLoaded { name });
        Ok(())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Creates an empty playlist.
    pub fn create(&self, name: &str) -> Result<()> {
        check_new_name(name)?;
        if self.dag.contains(name, Namespace::Playlists) {
            return Err(CoreError::invalid_request(format!(
                "playlist '{name}' already exists"
            )));
        }
        self.dag
            .save(name, Namespace::Playlists, Collection::idlist_of([]))
    }

    /// Appends `id`, which must name an existing media entry.
    pub fn add_entry(&self, name: &str, id: i64) -> Result<()> {
        self.append_ids(&self.resolve_name(name), vec![id])
    }

    /// Appends the entry at `url`, adding it to the library if needed.
    pub fn add_url(&self, name: &str, url: &str) -> Result<i64> {
        let name = self.resolve_name(name);
        let id = self.library.entry_for_url(url)?;
        self.append_ids(&name, vec![id])?;
        Ok(id)
    }

    /// Appends every id of an id list.
    pub fn add_idlist(&self, name: &str, idlist: &Collection) -> Result<()> {
        if idlist.kind() != CollectionType::Idlist {
            return Err(CoreError::invalid_request(format!(
                "expected an idlist, got {}",
                idlist.kind()
            )));
        }
        self.append_ids(&self.resolve_name(name), idlist.ids())
    }

    /// Evaluates `coll`, ordered by `order` keys, and appends the result.
    pub fn add_collection<S: AsRef<str>>(&self, name: &str, coll: Collection, order: &[S]) -> Result<()> {
        let name = self.resolve_name(name);
        let ordered = add_order_operators(coll, order);
        let ids = self.dag.query_ids(&ordered, self.library.as_ref())?;
        self.append_ids(&name, ids)
    }

    fn append_ids(&self, playlist: &str, ids: Vec<i64>) -> Result<()> {
        for id in &ids {
            self.require_entry(*id)?;
        }
        if ids.is_empty() {
            return Ok(());
        }
        self.apply(playlist, |coll, _, changes| {
            for id in ids {
                coll.push_id(id);
                changes.push(Signal::PlaylistChanged {
                    change: PlaylistChange::Add,
                    name: playlist.to_string(),
                    position: Some(coll.idlist_len() as i32 - 1),
                    new_position: None,
                    id: Some(id),
                });
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Inserts `id` at `position`; the length itself appends.
    pub fn insert_entry(&self, name: &str, position: i64, id: i64) -> Result<()> {
        self.insert_id(&self.resolve_name(name), position, id)
    }

    pub fn insert_url(&self, name: &str, position: i64, url: &str) -> Result<i64> {
        let name = self.resolve_name(name);
        let id = self.library.entry_for_url(url)?;
        self.insert_id(&name, position, id)?;
        Ok(id)
    }

    fn insert_id(&self, playlist: &str, position: i64, id: i64) -> Result<()> {
        self.require_entry(id)?;
        self.apply(playlist, |coll, cursor, changes| {
            let index = coll.idlist_index(position, true)? as i32;
            coll.idlist_insert(i64::from(index), id)?;
            if *cursor >= 0 && index <= *cursor {
                *cursor += 1;
            }
            changes.push(Signal::PlaylistChanged {
                change: PlaylistChange::Insert,
                name: playlist.to_string(),
                position: Some(index),
                new_position: None,
                id: Some(id),
            });
            Ok(())
        })?;
        Ok(())
    }

    /// Removes the entry at `position` and returns its id.
    ///
    /// Removing the current entry makes the following entry current, or
    /// leaves no current entry when it was the last one.
    pub fn remove_entry(&self, name: &str, position: i64) -> Result<i64> {
        let playlist = self.resolve_name(name);
        let (removed, _) = self.apply(&playlist, |coll, cursor, changes| {
            let index = coll.idlist_index(position, false)? as i32;
            let id = coll.idlist_remove(i64::from(index))?;
            changes.push(Signal::PlaylistChanged {
                change: PlaylistChange::Remove,
                name: playlist.clone(),
                position: Some(index),
                new_position: None,
                id: Some(id),
            });
            if *cursor >= 0 && index <= *cursor {
                changes.cursor_touched = true;
                if index < *cursor {
                    *cursor -= 1;
                } else if *cursor as usize >= coll.idlist_len() {
                    *cursor = -1;
                }
            }
            Ok(id)
        })?;
        Ok(removed)
    }

    /// Moves the entry at `from` to `to`. The cursor follows the entry it
    /// points at.
    pub fn move_entry(&self, name: &str, from: i64, to: i64) -> Result<()> {
        let playlist = self.resolve_name(name);
        self.apply(&playlist, |coll, cursor, changes| {
            let from = coll.idlist_index(from, false)? as i32;
            let to = coll.idlist_index(to, false)? as i32;
            let id = coll.idlist_get(i64::from(from))?;
            coll.idlist_move(i64::from(from), i64::from(to))?;
            let current = *cursor;
            *cursor = if current == from {
                to
            } else if from < current && current <= to {
                current - 1
            } else if to <= current && current < from {
                current + 1
            } else {
                current
            };
            changes.push(Signal::PlaylistChanged {
                change: PlaylistChange::Move,
                name: playlist.clone(),
                position: Some(from),
                new_position: Some(to),
                id: Some(id),
            });
            Ok(())
        })?;
        Ok(())
    }

    pub fn clear(&self, name: &str) -> Result<()> {
        let playlist = self.resolve_name(name);
        self.apply(&playlist, |coll, cursor, changes| {
            coll.idlist_clear();
            *cursor = -1;
            changes.push(Signal::playlist(PlaylistChange::Clear, &playlist));
            Ok(())
        })?;
        Ok(())
    }

    /// Shuffles the entries. The current entry, if any, moves to the front
    /// and stays current.
    pub fn shuffle(&self, name: &str) -> Result<()> {
        let playlist = self.resolve_name(name);
        self.apply(&playlist, |coll, cursor, changes| {
            let mut ids = coll.ids();
            let current = (*cursor >= 0).then(|| ids.remove(*cursor as usize));
            ids.shuffle(&mut rand::thread_rng());
            *cursor = match current {
                Some(id) => {
                    ids.insert(0, id);
                    0
                }
                None => -1,
            };
            coll.set_ids(ids);
            changes.push(Signal::playlist(PlaylistChange::Shuffle, &playlist));
            Ok(())
        })?;
        Ok(())
    }

    /// Stably sorts the entries by media properties. A key prefixed with
    /// `-` sorts descending; entries lacking a property sort last.
    pub fn sort<S: AsRef<str>>(&self, name: &str, properties: &[S]) -> Result<()> {
        if properties.is_empty() {
            return Err(CoreError::invalid_request("sort needs at least one property"));
        }
        let keys: Vec<(&str, bool)> = properties
            .iter()
            .map(|p| {
                let p = p.as_ref();
                match p.strip_prefix('-') {
                    Some(field) => (field, true),
                    None => (p, false),
                }
            })
            .collect();

        let playlist = self.resolve_name(name);
        let ids = self
            .dag
            .with(&playlist, Namespace::Playlists, Collection::ids)?;
        let values: Vec<Vec<Option<Value>>> = ids
            .iter()
            .map(|id| keys.iter().map(|(k, _)| self.library.get(*id, k)).collect())
            .collect();

        self.apply(&playlist, |coll, cursor, changes| {
            if coll.ids() != ids {
                return Err(CoreError::invalid_request(format!(
                    "playlist '{playlist}' changed while sorting"
                )));
            }
            let mut order: Vec<usize> = (0..ids.len()).collect();
            order.sort_by(|a, b| {
                keys.iter()
                    .enumerate()
                    .map(|(k, (_, descending))| {
                        let ord = compare_optional(values[*a][k].as_ref(), values[*b][k].as_ref());
                        if *descending { ord.reverse() } else { ord }
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
            *cursor = match *cursor {
                -1 => -1,
                p => order.iter().position(|i| *i == p as usize).map_or(-1, |i| i as i32),
            };
            coll.set_ids(order.iter().map(|i| ids[*i]));
            changes.push(Signal::playlist(PlaylistChange::Sort, &playlist));
            Ok(())
        })?;
        Ok(())
    }

    /// Drops every row holding `id` from every playlist.
    pub fn handle_entry_removed(&self, id: i64) -> Result<()> {
        for name in self.list_playlists() {
            let (rows, _) = self.apply(&name, |coll, cursor, changes| {
                let mut rows = 0;
                let mut index = coll.idlist_len();
                while index > 0 {
                    index -= 1;
                    if coll.idlist_get(index as i64)? != id {
                        continue;
                    }
                    coll.idlist_remove(index as i64)?;
                    rows += 1;
                    let index = index as i32;
                    if *cursor >= 0 && index <= *cursor {
                        changes.cursor_touched = true;
                        if index < *cursor {
                            *cursor -= 1;
                        }
                    }
                    changes.push(Signal::PlaylistChanged {
                        change: PlaylistChange::Remove,
                        name: name.clone(),
                        position: Some(index),
                        new_position: None,
                        id: Some(id),
                    });
                }
                if *cursor >= 0 && *cursor as usize >= coll.idlist_len() {
                    *cursor = -1;
                }
                Ok(rows)
            })?;
            if rows > 0 {
                debug!(playlist = %name, id, rows, "removed deleted entry");
            }
        }
        Ok(())
    }

    // =========================================================================
    // Party shuffle
    // =========================================================================

    /// Creates a party shuffle playlist drawing from `pool` (the whole
    /// library when `None`) and fills its upcoming window.
    pub fn create_party_shuffle(
        &self,
        name: &str,
        pool: Option<Collection>,
        history: usize,
        upcoming: usize,
    ) -> Result<()> {
        check_new_name(name)?;
        let mut coll = Collection::idlist_of([]);
        coll.set_attribute(ATTR_PLAYLIST_TYPE, PARTY_SHUFFLE);
        coll.set_attribute("history", history.to_string());
        coll.set_attribute("upcoming", upcoming.to_string());
        if let Some(pool) = pool {
            coll.add_operand(pool);
        }
        self.dag.save(name, Namespace::Playlists, coll)?;
        self.update_party_shuffle(name)?;
        Ok(())
    }

    /// Trims a party shuffle's history and refills its upcoming window.
    ///
    /// Returns true if the playlist changed. Playlists that are not party
    /// shuffles are left alone. A call made while the same playlist is being
    /// replenished returns false at once and has the running replenishment
    /// make one more pass.
    pub fn update_party_shuffle(&self, name: &str) -> Result<bool> {
        let name = self.resolve_name(name);
        let Some(guard) = self.begin_replenish(&name) else {
            debug!(playlist = %name, "party shuffle busy, pass requested");
            return Ok(false);
        };
        let mut changed = self.replenish(&name)?;
        while guard.take_rerun() {
            changed |= self.replenish(&name)?;
        }
        Ok(changed)
    }

    fn replenish(&self, name: &str) -> Result<bool> {
        let coll = self.dag.get(name, Namespace::Playlists)?;
        if !is_party_shuffle(&coll) {
            return Ok(false);
        }
        let history = window_attribute(&coll, "history", DEFAULT_HISTORY);
        let upcoming = window_attribute(&coll, "upcoming", DEFAULT_UPCOMING);

        let pool = coll.operand(0).cloned().unwrap_or_else(Collection::universe);
        let candidates = self.dag.query_ids(&pool, self.library.as_ref())?;
        let mut rng = rand::thread_rng();
        let picks: Vec<i64> = (0..upcoming)
            .filter_map(|_| candidates.choose(&mut rng).copied())
            .collect();

        let (changed, _) = self.apply(name, |coll, cursor, changes| {
            if *cursor > history as i32 {
                let excess = *cursor - history as i32;
                for _ in 0..excess {
                    let id = coll.idlist_remove(0)?;
                    changes.push(Signal::PlaylistChanged {
                        change: PlaylistChange::Remove,
                        name: name.to_string(),
                        position: Some(0),
                        new_position: None,
                        id: Some(id),
                    });
                }
                *cursor -= excess;
            }

            let queued = coll.idlist_len() - (*cursor + 1) as usize;
            for id in picks.into_iter().take(upcoming.saturating_sub(queued)) {
                coll.push_id(id);
                changes.push(Signal::PlaylistChanged {
                    change: PlaylistChange::Add,
                    name: name.to_string(),
                    position: Some(coll.idlist_len() as i32 - 1),
                    new_position: None,
                    id: Some(id),
                });
            }
            Ok(changes.signals.len())
        })?;

        if changed > 0 {
            debug!(playlist = %name, changed, "party shuffle replenished");
        }
        Ok(changed > 0)
    }

    fn begin_replenish(&self, name: &str) -> Option<Replenishing<'_>> {
        let mut names = self.replenishing.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(rerun) = names.get_mut(name) {
            *rerun = true;
            return None;
        }
        names.insert(name.to_string(), false);
        Some(Replenishing {
            names: &self.replenishing,
            name: name.to_string(),
        })
    }
}
