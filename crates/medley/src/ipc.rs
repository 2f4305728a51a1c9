//! Value-in, value-out call surface.
//!
//! A transport decodes a call frame into a [`Method`] and its argument
//! values, hands them to [`CoreService::call`] and encodes the returned
//! value. Failures come back as [`Value::Error`] whose message starts with
//! the error kind code, e.g. `"[E002] ..."`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::config::CoreConfig;
use crate::dag::{CollectionDag, Namespace};
use crate::error::{CoreError, Result};
use crate::medialib::{MediaLibrary, MemoryLibrary};
use crate::model::{Collection, Dict, List, Value};
use crate::playlist::{PartyShuffleUpdater, PlaylistEngine};
use crate::query::Projection;
use crate::signal::{SignalBus, Subscription};

macro_rules! methods {
    ($($variant:ident => $name:literal,)+) => {
        /// Callable methods and their wire names.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Method {
            $($variant,)+
        }

        impl Method {
            pub const ALL: &'static [Method] = &[$(Method::$variant,)+];

            pub fn name(self) -> &'static str {
                match self {
                    $(Method::$variant => $name,)+
                }
            }

            pub fn from_name(name: &str) -> Option<Method> {
                match name {
                    $($name => Some(Method::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

methods! {
    CollectionSave => "collection_save",
    CollectionGet => "collection_get",
    CollectionRemove => "collection_remove",
    CollectionRename => "collection_rename",
    CollectionFind => "collection_find",
    CollectionList => "collection_list",
    QueryIds => "query_ids",
    QueryInfos => "query_infos",
    PlaylistAddCollection => "playlist_add_collection",
    PlaylistAddIdlist => "playlist_add_idlist",
    PlaylistAddId => "playlist_add_id",
    PlaylistAddUrl => "playlist_add_url",
    PlaylistInsertId => "playlist_insert_id",
    PlaylistInsertUrl => "playlist_insert_url",
    PlaylistClear => "playlist_clear",
    PlaylistList => "playlist_list",
    PlaylistListEntries => "playlist_list_entries",
    PlaylistMoveEntry => "playlist_move_entry",
    PlaylistRemoveEntry => "playlist_remove_entry",
    PlaylistShuffle => "playlist_shuffle",
    PlaylistSort => "playlist_sort",
    PlaylistSetNext => "playlist_set_next",
    PlaylistSetNextRel => "playlist_set_next_rel",
    PlaylistCurrentPos => "playlist_current_pos",
    PlaylistCurrentActive => "playlist_current_active",
    PlaylistLoad => "playlist_load",
    PlaylistCreate => "playlist_create",
    PlaylistAdvance => "playlist_advance",
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Method::from_name(s).ok_or_else(|| CoreError::invalid_request(format!("unknown method '{s}'")))
    }
}

/// Positional call arguments.
struct Args<'a> {
    method: Method,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    fn expect(&self, count: usize) -> Result<()> {
        if self.values.len() == count {
            Ok(())
        } else {
            Err(CoreError::invalid_request(format!(
                "{} takes {count} argument(s), got {}",
                self.method,
                self.values.len()
            )))
        }
    }

    fn get(&self, index: usize) -> Result<&'a Value> {
        self.values.get(index).ok_or_else(|| {
            CoreError::invalid_request(format!("{} is missing argument {index}", self.method))
        })
    }

    fn str(&self, index: usize) -> Result<&'a str> {
        self.get(index)?.as_str()
    }

    fn int(&self, index: usize) -> Result<i64> {
        self.get(index)?.as_int()
    }

    fn namespace(&self, index: usize) -> Result<Namespace> {
        self.str(index)?.parse()
    }

    fn collection(&self, index: usize) -> Result<&'a Collection> {
        self.get(index)?.as_collection()
    }

    fn strings(&self, index: usize) -> Result<Vec<String>> {
        self.get(index)?
            .as_list()?
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect()
    }
}

fn string_list(names: impl IntoIterator<Item = String>) -> Value {
    Value::List(names.into_iter().map(Value::from).collect::<List>())
}

fn id_list(ids: impl IntoIterator<Item = i64>) -> Value {
    Value::List(ids.into_iter().map(Value::Int64).collect::<List>())
}

/// The request handler behind a transport.
#[derive(Debug, Clone)]
pub struct CoreService {
    dag: Arc<CollectionDag>,
    engine: Arc<PlaylistEngine>,
}

impl CoreService {
    pub fn new(engine: Arc<PlaylistEngine>) -> Self {
        Self {
            dag: engine.dag().clone(),
            engine,
        }
    }

    /// Builds a service over an in-memory library. The DAG, the library and
    /// the playlists share one signal bus.
    pub fn in_memory(config: &CoreConfig) -> (Self, Arc<MemoryLibrary>) {
        let bus = SignalBus::new(config.signals.capacity);
        let dag = Arc::new(CollectionDag::new(bus.clone()));
        let library = Arc::new(MemoryLibrary::with_signals(bus));
        let engine = Arc::new(PlaylistEngine::new(dag, library.clone(), config.playlist));
        (Self::new(engine), library)
    }

    pub fn dag(&self) -> &Arc<CollectionDag> {
        &self.dag
    }

    pub fn engine(&self) -> &Arc<PlaylistEngine> {
        &self.engine
    }

    pub fn subscribe(&self) -> Subscription {
        self.dag.signals().subscribe()
    }

    /// Creates a party shuffle updater listening from now on.
    pub fn updater(&self) -> PartyShuffleUpdater {
        PartyShuffleUpdater::new(self.engine.clone())
    }

    /// Calls `method`. Errors are returned as error values.
    pub fn call(&self, method: Method, args: &[Value]) -> Value {
        match self.dispatch(method, args) {
            Ok(value) => value,
            Err(err) => {
                debug!(%method, %err, "call failed");
                Value::Error(err.to_string())
            }
        }
    }

    /// Calls a method by wire name.
    pub fn call_by_name(&self, name: &str, args: &[Value]) -> Value {
        match name.parse::<Method>() {
            Ok(method) => self.call(method, args),
            Err(err) => Value::Error(err.to_string()),
        }
    }

    fn dispatch(&self, method: Method, values: &[Value]) -> Result<Value> {
        let args = Args { method, values };
        let library: &dyn MediaLibrary = self.engine.library().as_ref();
        let playlists = &self.engine;

        let value = match method {
            Method::CollectionSave => {
                args.expect(3)?;
                self.dag
                    .save(args.str(0)?, args.namespace(1)?, args.collection(2)?.clone())?;
                Value::None
            }
            Method::CollectionGet => {
                args.expect(2)?;
                Value::Collection(self.dag.get(args.str(0)?, args.namespace(1)?)?)
            }
            Method::CollectionRemove => {
                args.expect(2)?;
                self.dag.remove(args.str(0)?, args.namespace(1)?)?;
                Value::None
            }
            Method::CollectionRename => {
                args.expect(3)?;
                self.dag
                    .rename(args.str(0)?, args.str(1)?, args.namespace(2)?)?;
                Value::None
            }
            Method::CollectionFind => {
                args.expect(2)?;
                string_list(self.dag.find(args.int(0)?, args.namespace(1)?, library)?)
            }
            Method::CollectionList => {
                args.expect(1)?;
                string_list(self.dag.list(args.namespace(0)?))
            }
            Method::QueryIds => {
                args.expect(1)?;
                id_list(self.dag.query_ids(args.collection(0)?, library)?)
            }
            Method::QueryInfos => {
                args.expect(5)?;
                let offset = args.int(1)?;
                let length = args.int(2)?;
                if offset < 0 || length < 0 {
                    return Err(CoreError::invalid_request(
                        "offset and length must not be negative",
                    ));
                }
                let projection = Projection::new(args.strings(3)?)
                    .group_by(args.strings(4)?)
                    .window(offset as usize, length as usize);
                let rows = self
                    .dag
                    .query_infos(args.collection(0)?, library, &projection)?;
                Value::List(rows.into_iter().map(Value::Dict).collect::<List>())
            }
            Method::PlaylistAddCollection => {
                args.expect(3)?;
                playlists.add_collection(args.str(0)?, args.collection(1)?.clone(), args.strings(2)?.as_slice())?;
                Value::None
            }
            Method::PlaylistAddIdlist => {
                args.expect(2)?;
                playlists.add_idlist(args.str(0)?, args.collection(1)?)?;
                Value::None
            }
            Method::PlaylistAddId => {
                args.expect(2)?;
                playlists.add_entry(args.str(0)?, args.int(1)?)?;
                Value::None
            }
            Method::PlaylistAddUrl => {
                args.expect(2)?;
                Value::Int64(playlists.add_url(args.str(0)?, args.str(1)?)?)
            }
            Method::PlaylistInsertId => {
                args.expect(3)?;
                playlists.insert_entry(args.str(0)?, args.int(1)?, args.int(2)?)?;
                Value::None
            }
            Method::PlaylistInsertUrl => {
                args.expect(3)?;
                Value::Int64(playlists.insert_url(args.str(0)?, args.int(1)?, args.str(2)?)?)
            }
            Method::PlaylistClear => {
                args.expect(1)?;
                playlists.clear(args.str(0)?)?;
                Value::None
            }
            Method::PlaylistList => {
                args.expect(0)?;
                string_list(playlists.list_playlists())
            }
            Method::PlaylistListEntries => {
                args.expect(1)?;
                id_list(playlists.entries(args.str(0)?)?)
            }
            Method::PlaylistMoveEntry => {
                args.expect(3)?;
                playlists.move_entry(args.str(0)?, args.int(1)?, args.int(2)?)?;
                Value::None
            }
            Method::PlaylistRemoveEntry => {
                args.expect(2)?;
                Value::Int64(playlists.remove_entry(args.str(0)?, args.int(1)?)?)
            }
            Method::PlaylistShuffle => {
                args.expect(1)?;
                playlists.shuffle(args.str(0)?)?;
                Value::None
            }
            Method::PlaylistSort => {
                args.expect(2)?;
                playlists.sort(args.str(0)?, args.strings(1)?.as_slice())?;
                Value::None
            }
            Method::PlaylistSetNext => {
                args.expect(2)?;
                Value::from(playlists.set_next(args.str(0)?, args.int(1)?)?)
            }
            Method::PlaylistSetNextRel => {
                args.expect(2)?;
                Value::from(playlists.set_next_relative(args.str(0)?, args.int(1)?)?)
            }
            Method::PlaylistCurrentPos => {
                args.expect(1)?;
                let name = playlists.resolve_name(args.str(0)?);
                let mut dict = Dict::new();
                dict.set("position", playlists.current_position(&name)?);
                dict.set("name", name);
                Value::Dict(dict)
            }
            Method::PlaylistCurrentActive => {
                args.expect(0)?;
                Value::from(self.dag.active_playlist())
            }
            Method::PlaylistLoad => {
                args.expect(1)?;
                playlists.load(args.str(0)?)?;
                Value::None
            }
            Method::PlaylistCreate => {
                args.expect(1)?;
                playlists.create(args.str(0)?)?;
                Value::None
            }
            Method::PlaylistAdvance => {
                args.expect(1)?;
                Value::from(i64::from(playlists.advance(args.str(0)?)?))
            }
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::DEFAULT_PLAYLIST;
    use crate::model::CollectionBuilder;

    fn service() -> (CoreService, Vec<i64>) {
        let (service, library) = CoreService::in_memory(&CoreConfig::default());
        let ids = vec![
            library.insert_with([("artist", "A"), ("title", "x")]),
            library.insert_with([("artist", "B"), ("title", "y")]),
        ];
        (service, ids)
    }

    #[test]
    fn test_method_names_roundtrip() {
        for method in Method::ALL {
            assert_eq!(Method::from_name(method.name()), Some(*method));
        }
        assert_eq!(Method::from_name("nope"), None);
    }

    #[test]
    fn test_save_get_list() {
        let (svc, _) = service();
        let coll = CollectionBuilder::universe().has("artist").build();
        let out = svc.call(
            Method::CollectionSave,
            &["rock".into(), "Collections".into(), coll.clone().into()],
        );
        assert_eq!(out, Value::None);
        assert_eq!(
            svc.call(Method::CollectionGet, &["rock".into(), "Collections".into()]),
            Value::Collection(coll)
        );
        assert_eq!(
            svc.call(Method::CollectionList, &["Collections".into()]),
            string_list(["rock".to_string()])
        );
    }

    #[test]
    fn test_errors_carry_kind_code() {
        let (svc, _) = service();
        let out = svc.call(Method::CollectionGet, &["nope".into(), "Collections".into()]);
        assert!(out.as_error().unwrap().starts_with("[E001]"));

        let out = svc.call(Method::CollectionGet, &["nope".into()]);
        assert!(out.as_error().unwrap().starts_with("[E005]"));

        let out = svc.call(Method::CollectionGet, &[Value::Int64(1), "Collections".into()]);
        assert!(out.as_error().unwrap().starts_with("[E003]"));

        let out = svc.call_by_name("bogus", &[]);
        assert!(out.is_error());
    }

    #[test]
    fn test_query_infos() {
        let (svc, ids) = service();
        let fetch: List = ["id", "artist"].into_iter().map(Value::from).collect();
        let out = svc.call(
            Method::QueryInfos,
            &[
                Collection::universe().into(),
                Value::Int64(1),
                Value::Int64(0),
                fetch.into(),
                List::new().into(),
            ],
        );
        let rows = out.as_list().unwrap();
        assert_eq!(rows.len(), 1);
        let row = rows.get(0).unwrap().as_dict().unwrap();
        assert_eq!(row.get_int("id"), Some(ids[1]));
        assert_eq!(row.get_str("artist"), Some("B"));
    }

    #[test]
    fn test_playlist_calls() {
        let (svc, ids) = service();
        for id in &ids {
            assert_eq!(
                svc.call(Method::PlaylistAddId, &["_active".into(), Value::Int64(*id)]),
                Value::None
            );
        }
        assert_eq!(
            svc.call(Method::PlaylistListEntries, &[DEFAULT_PLAYLIST.into()]),
            id_list(ids.clone())
        );
        svc.call(Method::PlaylistMoveEntry, &[DEFAULT_PLAYLIST.into(), Value::Int64(1), Value::Int64(0)]);
        assert_eq!(
            svc.call(Method::PlaylistListEntries, &[DEFAULT_PLAYLIST.into()]),
            id_list([ids[1], ids[0]])
        );
        assert_eq!(
            svc.call(Method::PlaylistAdvance, &["_active".into()]),
            Value::Int64(1)
        );
        let pos = svc.call(Method::PlaylistCurrentPos, &["_active".into()]);
        let pos = pos.as_dict().unwrap();
        assert_eq!(pos.get_int("position"), Some(0));
        assert_eq!(pos.get_str("name"), Some(DEFAULT_PLAYLIST));

        let empty_sort = svc.call(
            Method::PlaylistSort,
            &[DEFAULT_PLAYLIST.into(), List::new().into()],
        );
        assert!(empty_sort.as_error().unwrap().starts_with("[E005]"));
    }
}
