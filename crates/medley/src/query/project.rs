//! Projection of evaluated ids into property rows.

use crate::codec::encode_value;
use crate::medialib::MediaLibrary;
use crate::model::{Dict, List, Value};

/// Key naming the row's index in the evaluated result.
pub const KEY_POSITION: &str = "position";
/// Key naming the media id.
pub const KEY_ID: &str = "id";

/// Which properties to fetch, how to group rows and which window to return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    /// Rows to skip after grouping.
    pub offset: usize,
    /// Maximum number of rows after grouping; 0 means unbounded.
    pub length: usize,
    /// Properties to include in each row.
    pub fetch: Vec<String>,
    /// Properties whose combined values identify a group.
    pub group: Vec<String>,
}

impl Projection {
    pub fn new<S: Into<String>>(fetch: impl IntoIterator<Item = S>) -> Self {
        Self {
            fetch: fetch.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn group_by<S: Into<String>>(mut self, group: impl IntoIterator<Item = S>) -> Self {
        self.group = group.into_iter().map(Into::into).collect();
        self
    }

    pub fn window(mut self, offset: usize, length: usize) -> Self {
        self.offset = offset;
        self.length = length;
        self
    }
}

fn lookup<L: MediaLibrary + ?Sized>(library: &L, id: i64, position: usize, key: &str) -> Option<Value> {
    match key {
        KEY_ID => Some(Value::Int64(id)),
        KEY_POSITION => Some(Value::Int64(position as i64)),
        _ => library.get(id, key),
    }
}

/// Builds one row per id, collapses runs of consecutive rows sharing group
/// values (keeping the first of each run), then applies the offset/length
/// window.
///
/// Rows only carry fetched properties the entry actually has.
pub fn project<L>(library: &L, ids: &[i64], projection: &Projection) -> Vec<Dict>
where
    L: MediaLibrary + ?Sized,
{
    let mut previous_group: Option<Vec<u8>> = None;
    let length = match projection.length {
        0 => usize::MAX,
        n => n,
    };

    ids.iter()
        .enumerate()
        .filter(|(position, id)| {
            if projection.group.is_empty() {
                return true;
            }
            let key: List = projection
                .group
                .iter()
                .map(|g| lookup(library, **id, *position, g).unwrap_or_default())
                .collect();
            match encode_value(&Value::List(key)) {
                Ok(bytes) if previous_group.as_ref() == Some(&bytes) => false,
                Ok(bytes) => {
                    previous_group = Some(bytes);
                    true
                }
                Err(_) => true,
            }
        })
        .skip(projection.offset)
        .take(length)
        .map(|(position, id)| {
            let mut row = Dict::new();
            for key in &projection.fetch {
                if let Some(value) = lookup(library, *id, position, key) {
                    row.set(key.as_str(), value);
                }
            }
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medialib::MemoryLibrary;

    #[test]
    fn test_fetch_special_keys() {
        let lib = MemoryLibrary::new();
        let a = lib.insert_with([("title", "x")]);
        let b = lib.insert_with([("artist", "y")]);

        let rows = project(&lib, &[b, a], &Projection::new(["id", "position", "title"]));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get_int("id"), Some(b));
        assert_eq!(rows[0].get_int("position"), Some(0));
        assert!(!rows[0].contains_key("title"));
        assert_eq!(rows[1].get_str("title"), Some("x"));
        assert_eq!(rows[1].get_int("position"), Some(1));
    }

    #[test]
    fn test_group_then_window() {
        let lib = MemoryLibrary::new();
        let ids: Vec<i64> = [("A", "1"), ("A", "1"), ("A", "2"), ("B", "1"), ("A", "1")]
            .iter()
            .map(|(artist, album)| lib.insert_with([("artist", *artist), ("album", *album)]))
            .collect();

        let projection = Projection::new(["id"]).group_by(["artist", "album"]);
        let rows = project(&lib, &ids, &projection);
        let got: Vec<i64> = rows.iter().filter_map(|r| r.get_int("id")).collect();
        assert_eq!(got, vec![ids[0], ids[2], ids[3], ids[4]]);

        let rows = project(&lib, &ids, &projection.clone().window(1, 1));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_int("id"), Some(ids[2]));
    }

    #[test]
    fn test_missing_group_values_group_together() {
        let lib = MemoryLibrary::new();
        let a = lib.insert_with([("title", "x")]);
        let b = lib.insert_with([("title", "y")]);
        let rows = project(&lib, &[a, b], &Projection::new(["title"]).group_by(["album"]));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("title"), Some("x"));
    }
}
