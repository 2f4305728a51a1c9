//! Collection expression trees.
//!
//! A [`Collection`] is a node of a query over the media library: a set
//! operation, a filter on a media property, an ordering or windowing stage,
//! a literal id list, or a reference to a collection saved by name.

use std::fmt;

use crate::error::{CoreError, Result};
use crate::model::list::normalize_index;
use crate::model::{Dict, List, Value, ValueType};

/// Attribute naming the target of a Reference node.
pub const ATTR_REFERENCE: &str = "reference";
/// Attribute naming the namespace of a Reference node's target.
pub const ATTR_NAMESPACE: &str = "namespace";

/// Collection node types (wire representation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CollectionType {
    Reference = 0,
    Universe = 1,
    Union = 2,
    Intersection = 3,
    Complement = 4,
    Has = 5,
    Match = 6,
    Token = 7,
    Equals = 8,
    NotEqual = 9,
    Smaller = 10,
    SmallerEq = 11,
    Greater = 12,
    GreaterEq = 13,
    Order = 14,
    Limit = 15,
    MediaSet = 16,
    Idlist = 17,
}

impl CollectionType {
    /// Creates a CollectionType from its wire representation.
    pub fn from_u32(v: u32) -> Option<CollectionType> {
        use CollectionType::*;
        const ALL: [CollectionType; 18] = [
            Reference,
            Universe,
            Union,
            Intersection,
            Complement,
            Has,
            Match,
            Token,
            Equals,
            NotEqual,
            Smaller,
            SmallerEq,
            Greater,
            GreaterEq,
            Order,
            Limit,
            MediaSet,
            Idlist,
        ];
        ALL.get(v as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            CollectionType::Reference => "reference",
            CollectionType::Universe => "universe",
            CollectionType::Union => "union",
            CollectionType::Intersection => "intersection",
            CollectionType::Complement => "complement",
            CollectionType::Has => "has",
            CollectionType::Match => "match",
            CollectionType::Token => "token",
            CollectionType::Equals => "equals",
            CollectionType::NotEqual => "notequal",
            CollectionType::Smaller => "smaller",
            CollectionType::SmallerEq => "smallereq",
            CollectionType::Greater => "greater",
            CollectionType::GreaterEq => "greatereq",
            CollectionType::Order => "order",
            CollectionType::Limit => "limit",
            CollectionType::MediaSet => "mediaset",
            CollectionType::Idlist => "idlist",
        }
    }

    /// Returns true for property filters (Has through GreaterEq).
    pub fn is_filter(self) -> bool {
        (CollectionType::Has as u32..=CollectionType::GreaterEq as u32).contains(&(self as u32))
    }
}

impl fmt::Display for CollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A node of a collection expression tree.
///
/// Operands are held in a list restricted to collections and the id list in
/// a list restricted to integers, so neither can ever hold a foreign value.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    kind: CollectionType,
    attributes: Dict,
    operands: List,
    idlist: List,
}

impl Collection {
    /// Creates an empty node of the given type.
    pub fn new(kind: CollectionType) -> Self {
        Self {
            kind,
            attributes: Dict::new(),
            operands: List::restricted(ValueType::Collection),
            idlist: List::restricted(ValueType::Int64),
        }
    }

    /// Creates a Universe node.
    pub fn universe() -> Self {
        Self::new(CollectionType::Universe)
    }

    /// Creates an Idlist node holding `ids`.
    pub fn idlist_of(ids: impl IntoIterator<Item = i64>) -> Self {
        let mut coll = Self::new(CollectionType::Idlist);
        for id in ids {
            coll.push_id(id);
        }
        coll
    }

    /// Creates a Reference node pointing at `name` in `namespace`.
    pub fn reference(namespace: &str, name: &str) -> Self {
        let mut coll = Self::new(CollectionType::Reference);
        coll.set_attribute(ATTR_NAMESPACE, namespace);
        coll.set_attribute(ATTR_REFERENCE, name);
        coll
    }

    /// Assembles a node from decoded parts, enforcing the list restrictions.
    pub fn from_parts(
        kind: CollectionType,
        attributes: Dict,
        mut idlist: List,
        mut operands: List,
    ) -> Result<Self> {
        idlist.restrict(ValueType::Int64)?;
        operands.restrict(ValueType::Collection)?;
        Ok(Self {
            kind,
            attributes,
            operands,
            idlist,
        })
    }

    pub fn kind(&self) -> CollectionType {
        self.kind
    }

    pub fn set_kind(&mut self, kind: CollectionType) {
        self.kind = kind;
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub fn attributes(&self) -> &Dict {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Dict {
        &mut self.attributes
    }

    /// Returns a string attribute.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get_str(key)
    }

    /// Returns an attribute as an integer, parsing string attributes.
    pub fn attribute_int(&self, key: &str) -> Option<i64> {
        match self.attributes.get(key)? {
            Value::Int64(v) => Some(*v),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.set(key, value);
    }

    pub fn remove_attribute(&mut self, key: &str) -> Result<Value> {
        self.attributes.remove(key)
    }

    // =========================================================================
    // Operands
    // =========================================================================

    /// Returns the raw operand list.
    pub fn operand_list(&self) -> &List {
        &self.operands
    }

    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }

    pub fn operands(&self) -> impl Iterator<Item = &Collection> {
        self.operands.iter().filter_map(|v| v.as_collection().ok())
    }

    pub(crate) fn operands_mut(&mut self) -> impl Iterator<Item = &mut Collection> {
        self.operands
            .iter_mut()
            .filter_map(|v| v.as_collection_mut().ok())
    }

    pub fn operand(&self, index: usize) -> Option<&Collection> {
        self.operands().nth(index)
    }

    pub fn add_operand(&mut self, operand: Collection) {
        self.operands.append(Value::Collection(operand)).ok();
    }

    /// Removes the operand at `index` (negative counts from the end).
    pub fn remove_operand(&mut self, index: i64) -> Result<Collection> {
        self.operands.remove(index)?.into_collection()
    }

    pub fn clear_operands(&mut self) {
        self.operands.clear();
    }

    // =========================================================================
    // Id list
    // =========================================================================

    /// Returns the raw id list.
    pub fn idlist(&self) -> &List {
        &self.idlist
    }

    pub fn idlist_len(&self) -> usize {
        self.idlist.len()
    }

    /// Returns the ids in order.
    pub fn ids(&self) -> Vec<i64> {
        self.idlist.iter().filter_map(|v| v.as_int().ok()).collect()
    }

    pub fn idlist_get(&self, index: i64) -> Result<i64> {
        self.idlist.get(index)?.as_int()
    }

    pub fn idlist_set(&mut self, index: i64, id: i64) -> Result<()> {
        self.idlist.set(index, Value::Int64(id))
    }

    /// Appends an id.
    pub fn push_id(&mut self, id: i64) {
        self.idlist.append(Value::Int64(id)).ok();
    }

    pub fn idlist_insert(&mut self, index: i64, id: i64) -> Result<()> {
        self.idlist.insert(index, Value::Int64(id))
    }

    pub fn idlist_remove(&mut self, index: i64) -> Result<i64> {
        self.idlist.remove(index)?.as_int()
    }

    pub fn idlist_move(&mut self, from: i64, to: i64) -> Result<()> {
        self.idlist.move_entry(from, to)
    }

    pub fn idlist_clear(&mut self) {
        self.idlist.clear();
    }

    /// Replaces the whole id list.
    pub fn set_ids(&mut self, ids: impl IntoIterator<Item = i64>) {
        self.idlist.clear();
        for id in ids {
            self.push_id(id);
        }
    }

    /// Resolves `index` against the id list (negative counts from the end).
    pub fn idlist_index(&self, index: i64, allow_append: bool) -> Result<usize> {
        normalize_index(index, self.idlist.len(), allow_append)
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Returns `(namespace, name)` for every Reference node in the tree.
    pub fn references(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<(&'a str, &'a str)>) {
        if self.kind == CollectionType::Reference {
            if let (Some(ns), Some(name)) =
                (self.attribute(ATTR_NAMESPACE), self.attribute(ATTR_REFERENCE))
            {
                out.push((ns, name));
            }
        }
        for operand in self.operands() {
            operand.collect_references(out);
        }
    }

    /// Repoints every Reference to `old` in `namespace` at `new`. Returns true
    /// if anything changed.
    pub fn rewrite_references(&mut self, namespace: &str, old: &str, new: &str) -> bool {
        let mut changed = false;
        if self.kind == CollectionType::Reference
            && self.attribute(ATTR_NAMESPACE) == Some(namespace)
            && self.attribute(ATTR_REFERENCE) == Some(old)
        {
            self.set_attribute(ATTR_REFERENCE, new);
            changed = true;
        }
        for operand in self.operands_mut() {
            changed |= operand.rewrite_references(namespace, old, new);
        }
        changed
    }

    /// Returns the first operand, or an error naming the node type.
    pub(crate) fn single_operand(&self) -> Result<&Collection> {
        match self.operand_count() {
            1 => self.operand(0).ok_or_else(|| self.arity_error("exactly one")),
            _ => Err(self.arity_error("exactly one")),
        }
    }

    pub(crate) fn arity_error(&self, expected: &str) -> CoreError {
        CoreError::InvalidCollection(format!(
            "{} node requires {expected} operand(s), has {}",
            self.kind,
            self.operand_count()
        ))
    }
}
