//! Builder API for ergonomic collection construction.
//!
//! # Example
//!
//! ```rust
//! use medley::model::builder::CollectionBuilder;
//!
//! // Tracks by Foo that are not in the "skip" collection, newest first
//! let coll = CollectionBuilder::universe()
//!     .equals("artist", "Foo")
//!     .intersect_with(
//!         CollectionBuilder::reference("Collections", "skip")
//!             .complement()
//!             .build(),
//!     )
//!     .order_by(&["-year", "tracknr"])
//!     .limit(0, 20)
//!     .build();
//! assert_eq!(coll.kind(), medley::CollectionType::Limit);
//! ```

use crate::model::{Collection, CollectionType, Value};

/// Builder for constructing a collection tree bottom-up.
///
/// Each wrapping method (`equals`, `order_by`, `limit`, ...) makes the tree
/// built so far the single operand of a new node.
#[derive(Debug, Clone)]
pub struct CollectionBuilder {
    coll: Collection,
}

impl CollectionBuilder {
    /// Starts from an empty node of the given type.
    pub fn new(kind: CollectionType) -> Self {
        Self {
            coll: Collection::new(kind),
        }
    }

    /// Starts from an existing collection.
    pub fn from_collection(coll: Collection) -> Self {
        Self { coll }
    }

    pub fn universe() -> Self {
        Self::from_collection(Collection::universe())
    }

    pub fn idlist(ids: impl IntoIterator<Item = i64>) -> Self {
        Self::from_collection(Collection::idlist_of(ids))
    }

    pub fn reference(namespace: &str, name: &str) -> Self {
        Self::from_collection(Collection::reference(namespace, name))
    }

    /// Sets an attribute on the current root node.
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.coll.set_attribute(key, value);
        self
    }

    /// Adds an operand to the current root node.
    pub fn operand(mut self, operand: Collection) -> Self {
        self.coll.add_operand(operand);
        self
    }

    /// Adds an operand built by a nested builder.
    pub fn operand_with<F>(mut self, kind: CollectionType, f: F) -> Self
    where
        F: FnOnce(CollectionBuilder) -> CollectionBuilder,
    {
        self.coll.add_operand(f(CollectionBuilder::new(kind)).build());
        self
    }

    /// Appends an id to the current root node's id list.
    pub fn id(mut self, id: i64) -> Self {
        self.coll.push_id(id);
        self
    }

    fn wrap(self, kind: CollectionType) -> Self {
        let mut outer = Collection::new(kind);
        outer.add_operand(self.coll);
        Self { coll: outer }
    }

    /// Wraps the tree in a property filter.
    pub fn filter(self, kind: CollectionType, field: &str, value: impl Into<Value>) -> Self {
        self.wrap(kind)
            .attribute("field", field)
            .attribute("value", value)
    }

    pub fn has(self, field: &str) -> Self {
        self.wrap(CollectionType::Has).attribute("field", field)
    }

    pub fn equals(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(CollectionType::Equals, field, value)
    }

    pub fn not_equal(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(CollectionType::NotEqual, field, value)
    }

    pub fn matching(self, field: &str, pattern: &str) -> Self {
        self.filter(CollectionType::Match, field, pattern)
    }

    pub fn complement(self) -> Self {
        self.wrap(CollectionType::Complement)
    }

    /// Unions the tree with another collection.
    pub fn union_with(self, other: Collection) -> Self {
        self.wrap(CollectionType::Union).operand(other)
    }

    /// Intersects the tree with another collection.
    pub fn intersect_with(self, other: Collection) -> Self {
        self.wrap(CollectionType::Intersection).operand(other)
    }

    /// Deduplicates the tree's result.
    pub fn media_set(self) -> Self {
        self.wrap(CollectionType::MediaSet)
    }

    /// Wraps the tree in Order nodes, see [`add_order_operators`].
    pub fn order_by<S: AsRef<str>>(self, keys: &[S]) -> Self {
        Self {
            coll: add_order_operators(self.coll, keys),
        }
    }

    /// Wraps the tree in a Limit node, see [`add_limit_operator`].
    pub fn limit(self, start: i64, length: i64) -> Self {
        Self {
            coll: add_limit_operator(self.coll, start, length),
        }
    }

    pub fn build(self) -> Collection {
        self.coll
    }
}

/// Wraps `coll` in one Order node per key, the first key outermost so that it
/// is the primary sort key.
///
/// A key is a property name, optionally prefixed with `-` for descending
/// order. The special keys `id` and `random` order by media id and shuffle
/// respectively.
pub fn add_order_operators<S: AsRef<str>>(coll: Collection, keys: &[S]) -> Collection {
    keys.iter().rev().fold(coll, |inner, key| {
        let key = key.as_ref();
        let (direction, name) = match key.strip_prefix('-') {
            Some(rest) => ("DESC", rest),
            None => ("ASC", key),
        };
        let mut order = Collection::new(CollectionType::Order);
        match name {
            "id" => order.set_attribute("type", "id"),
            "random" => order.set_attribute("type", "random"),
            field => {
                order.set_attribute("type", "value");
                order.set_attribute("field", field);
            }
        }
        order.set_attribute("direction", direction);
        order.add_operand(inner);
        order
    })
}

/// Wraps `coll` in a Limit node. A length of 0 means unbounded.
pub fn add_limit_operator(coll: Collection, start: i64, length: i64) -> Collection {
    let mut limit = Collection::new(CollectionType::Limit);
    limit.set_attribute("start", start.to_string());
    limit.set_attribute("length", length.to_string());
    limit.add_operand(coll);
    limit
}
