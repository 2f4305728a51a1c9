//! Ordered, optionally type-restricted lists of values.
//!
//! Every element carries a stable key assigned on insertion. A
//! [`ListCursor`] refers to an element by that key, so it keeps pointing at
//! the same element when the list is reordered by [`List::move_entry`] or
//! [`List::sort_by`].

use std::cmp::Ordering;

use crate::error::{CoreError, Result};
use crate::model::{Value, ValueType};

type ElementKey = u64;

#[derive(Debug, Clone)]
struct Slot {
    key: ElementKey,
    value: Value,
}

/// An ordered sequence of values.
///
/// A list may be restricted to a single element type. The restriction is
/// sticky: once set it can never change, and every later insertion is checked
/// against it.
#[derive(Debug, Clone, Default)]
pub struct List {
    slots: Vec<Slot>,
    next_key: ElementKey,
    restriction: Option<ValueType>,
}

impl PartialEq for List {
    fn eq(&self, other: &Self) -> bool {
        self.restriction == other.restriction
            && self.slots.len() == other.slots.len()
            && self
                .slots
                .iter()
                .zip(&other.slots)
                .all(|(a, b)| a.value == b.value)
    }
}

/// Resolves a possibly negative index against a list of `len` elements.
///
/// Negative indices count from the end. The accepted range is `[-len, len-1]`,
/// widened to `[-len, len]` when `allow_append` is set.
pub(crate) fn normalize_index(index: i64, len: usize, allow_append: bool) -> Result<usize> {
    let n = len as i64;
    let upper = if allow_append { n } else { n - 1 };
    if index < -n || index > upper {
        return Err(CoreError::InvalidIndex { index, len });
    }
    let pos = if index < 0 { index + n } else { index };
    Ok(pos as usize)
}

impl List {
    /// Creates an empty, unrestricted list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty list restricted to `ty`.
    pub fn restricted(ty: ValueType) -> Self {
        Self {
            restriction: Some(ty),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the element type restriction, if any.
    pub fn restriction(&self) -> Option<ValueType> {
        self.restriction
    }

    /// Restricts the list to elements of type `ty`.
    ///
    /// Allowed only while the list is empty or already homogeneous in `ty`.
    /// Re-applying the current restriction is a no-op.
    pub fn restrict(&mut self, ty: ValueType) -> Result<()> {
        match self.restriction {
            Some(current) if current == ty => return Ok(()),
            Some(current) => {
                return Err(CoreError::invalid_request(format!(
                    "list is already restricted to {current}"
                )));
            }
            None => {}
        }
        if let Some(slot) = self.slots.iter().find(|s| s.value.value_type() != ty) {
            return Err(CoreError::RestrictionViolated {
                restricted: ty,
                found: slot.value.value_type(),
            });
        }
        self.restriction = Some(ty);
        Ok(())
    }

    fn check(&self, value: &Value) -> Result<()> {
        match self.restriction {
            Some(ty) if value.value_type() != ty => Err(CoreError::RestrictionViolated {
                restricted: ty,
                found: value.value_type(),
            }),
            _ => Ok(()),
        }
    }

    fn make_slot(&mut self, value: Value) -> Slot {
        let key = self.next_key;
        self.next_key += 1;
        Slot { key, value }
    }

    fn position_of_key(&self, key: ElementKey) -> Option<usize> {
        self.slots.iter().position(|s| s.key == key)
    }

    /// Returns the element at `index` (negative counts from the end).
    pub fn get(&self, index: i64) -> Result<&Value> {
        let pos = normalize_index(index, self.len(), false)?;
        Ok(&self.slots[pos].value)
    }

    /// Replaces the element at `index`.
    pub fn set(&mut self, index: i64, value: Value) -> Result<()> {
        let pos = normalize_index(index, self.len(), false)?;
        self.set_at(pos, value)
    }

    fn set_at(&mut self, pos: usize, value: Value) -> Result<()> {
        self.check(&value)?;
        self.slots[pos].value = value;
        Ok(())
    }

    /// Appends an element.
    pub fn append(&mut self, value: Value) -> Result<()> {
        self.check(&value)?;
        let slot = self.make_slot(value);
        self.slots.push(slot);
        Ok(())
    }

    /// Inserts an element before `index`; `index == len` appends.
    pub fn insert(&mut self, index: i64, value: Value) -> Result<()> {
        let pos = normalize_index(index, self.len(), true)?;
        self.insert_at(pos, value)
    }

    fn insert_at(&mut self, pos: usize, value: Value) -> Result<()> {
        self.check(&value)?;
        let slot = self.make_slot(value);
        self.slots.insert(pos, slot);
        Ok(())
    }

    /// Removes and returns the element at `index`.
    pub fn remove(&mut self, index: i64) -> Result<Value> {
        let pos = normalize_index(index, self.len(), false)?;
        Ok(self.slots.remove(pos).value)
    }

    /// Removes every element. The restriction is kept.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Moves the element at `from` so that it ends up at index `to`.
    ///
    /// `to` may equal the length, which is treated as the last index. Cursors
    /// keep referring to the same elements.
    pub fn move_entry(&mut self, from: i64, to: i64) -> Result<()> {
        let len = self.len();
        let from = normalize_index(from, len, false)?;
        let to = normalize_index(to, len, true)?.min(len - 1);
        let slot = self.slots.remove(from);
        self.slots.insert(to, slot);
        Ok(())
    }

    /// Stable sort by the given comparator. Cursors follow their elements.
    pub fn sort_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        self.slots.sort_by(|a, b| compare(&a.value, &b.value));
    }

    /// Returns a new list with nested lists flattened `depth` levels deep.
    ///
    /// At depth 0 the elements are copied as they are; at any other depth
    /// each element must itself be a list.
    pub fn flatten(&self, depth: usize) -> Result<List> {
        let mut out = List::new();
        self.flatten_into(depth, &mut out)?;
        Ok(out)
    }

    fn flatten_into(&self, depth: usize, out: &mut List) -> Result<()> {
        for value in self.iter() {
            if depth == 0 {
                out.append(value.clone())?;
            } else {
                value.as_list()?.flatten_into(depth - 1, out)?;
            }
        }
        Ok(())
    }

    /// Iterates over the elements in order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Value> + ExactSizeIterator {
        self.slots.iter().map(|s| &s.value)
    }

    /// Mutable iteration for in-place edits that keep element types intact.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.slots.iter_mut().map(|s| &mut s.value)
    }

    /// Returns the index of the first element equal to `value`.
    pub fn index_of(&self, value: &Value) -> Option<usize> {
        self.slots.iter().position(|s| &s.value == value)
    }

    /// Returns a cursor positioned at the first element.
    pub fn cursor(&self) -> ListCursor {
        let mut cursor = ListCursor {
            key: None,
            position: 0,
        };
        cursor.first(self);
        cursor
    }

    /// Consumes the list and returns its elements.
    pub fn into_values(self) -> Vec<Value> {
        self.slots.into_iter().map(|s| s.value).collect()
    }
}

impl FromIterator<Value> for List {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut list = List::new();
        for value in iter {
            let slot = list.make_slot(value);
            list.slots.push(slot);
        }
        list
    }
}

/// A position within a [`List`].
///
/// The cursor is detached from the list and is passed the list on every call.
/// It tracks an element rather than an index: moving or sorting the list
/// leaves it on the same element. A cursor whose element was removed through
/// the list itself becomes invalid until it is repositioned with
/// [`first`](Self::first), [`last`](Self::last) or [`seek`](Self::seek).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListCursor {
    key: Option<ElementKey>,
    position: isize,
}

impl ListCursor {
    fn locate(&self, list: &List) -> Option<usize> {
        self.key.and_then(|k| list.position_of_key(k))
    }

    fn point_at(&mut self, list: &List, idx: isize) {
        let len = list.len() as isize;
        if idx >= 0 && idx < len {
            self.key = Some(list.slots[idx as usize].key);
            self.position = idx;
        } else {
            self.key = None;
            self.position = idx.clamp(-1, len);
        }
    }

    /// Returns true if the cursor refers to an element of `list`.
    pub fn valid(&self, list: &List) -> bool {
        self.locate(list).is_some()
    }

    /// Returns the current index of the element the cursor refers to.
    pub fn index(&self, list: &List) -> Option<usize> {
        self.locate(list)
    }

    pub fn first(&mut self, list: &List) {
        self.point_at(list, 0);
    }

    pub fn last(&mut self, list: &List) {
        self.point_at(list, list.len() as isize - 1);
    }

    /// Advances to the following element. Stepping past the end invalidates.
    pub fn next(&mut self, list: &List) {
        if let Some(idx) = self.locate(list) {
            self.point_at(list, idx as isize + 1);
        }
    }

    /// Steps back to the preceding element. Stepping before the start invalidates.
    pub fn prev(&mut self, list: &List) {
        if let Some(idx) = self.locate(list) {
            self.point_at(list, idx as isize - 1);
        }
    }

    /// Positions the cursor at `index` (negative counts from the end).
    pub fn seek(&mut self, list: &List, index: i64) -> Result<()> {
        let pos = normalize_index(index, list.len(), false)?;
        self.point_at(list, pos as isize);
        Ok(())
    }

    /// Returns the element under the cursor.
    pub fn entry<'a>(&self, list: &'a List) -> Option<&'a Value> {
        self.locate(list).map(|idx| &list.slots[idx].value)
    }

    fn require(&self, list: &List) -> Result<usize> {
        self.locate(list).ok_or(CoreError::InvalidIndex {
            index: self.position as i64,
            len: list.len(),
        })
    }

    /// Replaces the element under the cursor.
    pub fn set(&self, list: &mut List, value: Value) -> Result<()> {
        let idx = self.require(list)?;
        list.set_at(idx, value)
    }

    /// Inserts before the element under the cursor, then points at the new
    /// element. An invalid cursor past the end appends.
    pub fn insert(&mut self, list: &mut List, value: Value) -> Result<()> {
        let idx = match self.locate(list) {
            Some(idx) => idx,
            None => self.position.clamp(0, list.len() as isize) as usize,
        };
        list.insert_at(idx, value)?;
        self.point_at(list, idx as isize);
        Ok(())
    }

    /// Removes the element under the cursor, then points at the element that
    /// followed it.
    pub fn remove(&mut self, list: &mut List) -> Result<Value> {
        let idx = self.require(list)?;
        let removed = list.slots.remove(idx).value;
        self.point_at(list, idx as isize);
        Ok(removed)
    }
}
