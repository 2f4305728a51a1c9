//! String-keyed dictionaries of values.

use indexmap::IndexMap;

use crate::error::{CoreError, Result};
use crate::model::Value;

/// A mapping from string keys to values.
///
/// Iteration follows insertion order. Equality ignores order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dict {
    entries: IndexMap<String, Value>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Returns the value stored under `key`, or `NotFound`.
    pub fn require(&self, key: &str) -> Result<&Value> {
        self.entries
            .get(key)
            .ok_or_else(|| CoreError::KeyNotFound(key.to_string()))
    }

    /// Returns the string stored under `key`, if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str().ok())
    }

    /// Returns the integer stored under `key`, if it is an integer.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_int().ok())
    }

    /// Inserts or replaces the value under `key`. Replacing keeps the key's
    /// position in iteration order.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Removes the value under `key`, or returns `NotFound`.
    pub fn remove(&mut self, key: &str) -> Result<Value> {
        self.entries
            .shift_remove(key)
            .ok_or_else(|| CoreError::KeyNotFound(key.to_string()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns a cursor positioned at the first entry.
    pub fn cursor(&self) -> DictCursor {
        let mut cursor = DictCursor {
            key: None,
            position: 0,
        };
        cursor.first(self);
        cursor
    }

    /// Expands `${key}` placeholders in `template` with values from this dict.
    ///
    /// Strings are inserted verbatim, integers in decimal and floats with six
    /// decimals. `${seconds}` and `${minutes}` are derived from a `duration`
    /// entry in milliseconds. Unknown keys and other value types expand to
    /// nothing; an unterminated `${` is copied literally.
    ///
    /// The output is truncated to at most `capacity - 1` bytes (on a char
    /// boundary). The second element of the result is the length the full
    /// expansion would have had, so callers can detect truncation.
    pub fn format(&self, template: &str, capacity: usize) -> (String, usize) {
        let mut full = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("${") {
            full.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    self.expand_key(&after[..end], &mut full);
                    rest = &after[end + 1..];
                }
                None => {
                    full.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        full.push_str(rest);

        let total = full.len();
        let mut limit = capacity.saturating_sub(1).min(total);
        while !full.is_char_boundary(limit) {
            limit -= 1;
        }
        full.truncate(limit);
        (full, total)
    }

    fn expand_key(&self, key: &str, out: &mut String) {
        let duration = || self.get_int("duration").unwrap_or(0) + 500;
        match key {
            "seconds" => out.push_str(&format!("{:02}", (duration() / 1000) % 60)),
            "minutes" => out.push_str(&format!("{:02}", duration() / 60000)),
            _ => match self.get(key) {
                Some(Value::String(s)) => out.push_str(s),
                Some(Value::Int64(i)) => out.push_str(&i.to_string()),
                Some(Value::Float(f)) => out.push_str(&format!("{f:.6}")),
                _ => {}
            },
        }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Dict {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// A position within a [`Dict`].
///
/// Like [`ListCursor`](crate::model::ListCursor) the cursor is detached and
/// tracks an entry by key. Removing the current entry through the dict
/// invalidates it; iteration must then be restarted with
/// [`first`](Self::first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictCursor {
    key: Option<String>,
    position: usize,
}

impl DictCursor {
    fn locate(&self, dict: &Dict) -> Option<usize> {
        self.key
            .as_deref()
            .and_then(|k| dict.entries.get_index_of(k))
    }

    fn point_at(&mut self, dict: &Dict, idx: Option<usize>) {
        match idx.and_then(|i| dict.entries.get_index(i).map(|(k, _)| (i, k))) {
            Some((i, key)) => {
                self.key = Some(key.clone());
                self.position = i;
            }
            None => {
                self.key = None;
                self.position = dict.len();
            }
        }
    }

    pub fn valid(&self, dict: &Dict) -> bool {
        self.locate(dict).is_some()
    }

    pub fn first(&mut self, dict: &Dict) {
        self.point_at(dict, Some(0));
    }

    pub fn last(&mut self, dict: &Dict) {
        self.point_at(dict, dict.len().checked_sub(1));
    }

    pub fn next(&mut self, dict: &Dict) {
        if let Some(idx) = self.locate(dict) {
            self.point_at(dict, Some(idx + 1));
        }
    }

    pub fn prev(&mut self, dict: &Dict) {
        if let Some(idx) = self.locate(dict) {
            self.point_at(dict, idx.checked_sub(1));
        }
    }

    /// Positions the cursor at `key`; returns false (and invalidates) if the
    /// key is absent.
    pub fn seek(&mut self, dict: &Dict, key: &str) -> bool {
        let idx = dict.entries.get_index_of(key);
        self.point_at(dict, idx);
        idx.is_some()
    }

    /// Returns the entry under the cursor.
    pub fn pair<'a>(&self, dict: &'a Dict) -> Option<(&'a str, &'a Value)> {
        self.locate(dict)
            .and_then(|i| dict.entries.get_index(i))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Replaces the value under the cursor.
    pub fn set(&self, dict: &mut Dict, value: Value) -> Result<()> {
        let idx = self.locate(dict).ok_or(CoreError::InvalidIndex {
            index: self.position as i64,
            len: dict.len(),
        })?;
        if let Some((_, slot)) = dict.entries.get_index_mut(idx) {
            *slot = value;
        }
        Ok(())
    }

    /// Removes the entry under the cursor, then points at the entry that
    /// followed it.
    pub fn remove(&mut self, dict: &mut Dict) -> Result<(String, Value)> {
        let idx = self.locate(dict).ok_or(CoreError::InvalidIndex {
            index: self.position as i64,
            len: dict.len(),
        })?;
        let removed = dict
            .entries
            .shift_remove_index(idx)
            .ok_or(CoreError::InvalidIndex {
                index: idx as i64,
                len: dict.len(),
            })?;
        self.point_at(dict, Some(idx));
        Ok(removed)
    }
}
