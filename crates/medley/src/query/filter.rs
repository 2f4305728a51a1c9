//! Property filters (Has, Match, Token, Equals, NotEqual and the ordering
//! comparisons).
//!
//! Filter nodes carry these attributes:
//! - `type`: `value` (default) compares a media property, `id` the media id
//! - `field`: the property name
//! - `value`: the operand; compared numerically when it is an integer or a
//!   string that parses as one
//! - `collation`: `NOCASE`, `BINARY` or `NATCOLL`; the ordering comparisons
//!   default to `NATCOLL`, everything else to `NOCASE`

use std::cmp::Ordering;

use crate::error::{CoreError, Result};
use crate::medialib::MediaLibrary;
use crate::model::{Collection, CollectionType, Value};
use crate::query::collate::Collation;

#[derive(Debug, Clone)]
struct Operand {
    text: String,
    number: Option<i64>,
}

/// A filter node's predicate, parsed once per evaluation.
#[derive(Debug, Clone)]
pub(crate) struct Filter {
    kind: CollectionType,
    field: Option<String>,
    by_id: bool,
    operand: Option<Operand>,
    collation: Collation,
}

impl Filter {
    pub(crate) fn from_collection(coll: &Collection) -> Result<Self> {
        let kind = coll.kind();
        let by_id = coll.attribute("type") == Some("id");
        let field = coll.attribute("field").map(str::to_string);
        if !by_id && field.is_none() {
            return Err(CoreError::InvalidCollection(format!(
                "{kind} filter lacks the 'field' attribute"
            )));
        }

        let operand = match coll.attributes().get("value") {
            Some(Value::Int64(n)) => Some(Operand {
                text: n.to_string(),
                number: Some(*n),
            }),
            Some(Value::String(s)) => Some(Operand {
                text: s.clone(),
                number: s.trim().parse().ok(),
            }),
            Some(other) => {
                return Err(CoreError::InvalidCollection(format!(
                    "{kind} filter value must be a string or integer, not {}",
                    other.value_type()
                )));
            }
            None if kind == CollectionType::Has => None,
            None => {
                return Err(CoreError::InvalidCollection(format!(
                    "{kind} filter lacks the 'value' attribute"
                )));
            }
        };

        let collation = match coll.attribute("collation") {
            Some(name) => Collation::parse(name).ok_or_else(|| {
                CoreError::InvalidCollection(format!("unknown collation '{name}'"))
            })?,
            None => match kind {
                CollectionType::Smaller
                | CollectionType::SmallerEq
                | CollectionType::Greater
                | CollectionType::GreaterEq => Collation::Natural,
                _ => Collation::NoCase,
            },
        };

        Ok(Self {
            kind,
            field,
            by_id,
            operand,
            collation,
        })
    }

    /// Returns true if entry `id` passes the filter. Entries lacking the
    /// property never pass.
    pub(crate) fn matches<L: MediaLibrary + ?Sized>(&self, library: &L, id: i64) -> bool {
        let property = if self.by_id {
            Value::Int64(id)
        } else {
            match self.field.as_deref().and_then(|f| library.get(id, f)) {
                Some(v) => v,
                None => return false,
            }
        };
        let Some(operand) = &self.operand else {
            return self.kind == CollectionType::Has;
        };

        match self.kind {
            CollectionType::Has => true,
            CollectionType::Match => property_text(&property)
                .is_some_and(|text| glob_match(&self.collation.fold(&operand.text), &self.collation.fold(&text))),
            CollectionType::Token => property_text(&property)
                .is_some_and(|text| token_match(&self.collation.fold(&operand.text), &self.collation.fold(&text))),
            kind => {
                let Some(ord) = self.compare(&property, operand) else {
                    return false;
                };
                match kind {
                    CollectionType::Equals => ord == Ordering::Equal,
                    CollectionType::NotEqual => ord != Ordering::Equal,
                    CollectionType::Smaller => ord == Ordering::Less,
                    CollectionType::SmallerEq => ord != Ordering::Greater,
                    CollectionType::Greater => ord == Ordering::Greater,
                    CollectionType::GreaterEq => ord != Ordering::Less,
                    _ => false,
                }
            }
        }
    }

    fn compare(&self, property: &Value, operand: &Operand) -> Option<Ordering> {
        match (property, operand.number) {
            (Value::Int64(p), Some(n)) => Some(p.cmp(&n)),
            (Value::Float(p), Some(n)) => p.partial_cmp(&(n as f64)),
            (Value::Float(p), None) => operand
                .text
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(|n| p.partial_cmp(&n)),
            _ => property_text(property).map(|text| self.collation.compare(&text, &operand.text)),
        }
    }
}

fn property_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Int64(n) => Some(n.to_string()),
        Value::Float(f) => Some(f.to_string()),
        _ => None,
    }
}

/// Matches `text` against a glob pattern where `*` matches any run of
/// characters and `?` exactly one.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}

/// Matches when some word of `text` equals `token`, or starts with it when
/// `token` ends in `*`.
pub(crate) fn token_match(token: &str, text: &str) -> bool {
    let (needle, prefix) = match token.strip_suffix('*') {
        Some(stem) => (stem, true),
        None => (token, false),
    };
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .any(|word| {
            if prefix {
                word.starts_with(needle)
            } else {
                word == needle
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medialib::MemoryLibrary;
    use crate::model::CollectionBuilder;

    #[test]
    fn test_glob() {
        assert!(glob_match("foo*", "foobar"));
        assert!(glob_match("*bar", "foobar"));
        assert!(glob_match("f?o*r", "foobar"));
        assert!(glob_match("*", ""));
        assert!(!glob_match("foo", "foobar"));
        assert!(!glob_match("?", ""));
        assert!(glob_match("*o*o*", "foo boo"));
    }

    #[test]
    fn test_token() {
        assert!(token_match("love", "all you need is love"));
        assert!(token_match("lov*", "lovely day"));
        assert!(!token_match("love", "lovely day"));
    }

    fn filter(coll: Collection) -> Filter {
        Filter::from_collection(&coll).unwrap()
    }

    #[test]
    fn test_equals_is_caseless_by_default() {
        let lib = MemoryLibrary::new();
        let id = lib.insert_with([("artist", "Foo Fighters")]);
        let f = filter(
            CollectionBuilder::universe()
                .equals("artist", "foo fighters")
                .build(),
        );
        assert!(f.matches(&lib, id));

        let f = filter(
            CollectionBuilder::universe()
                .equals("artist", "foo fighters")
                .attribute("collation", "BINARY")
                .build(),
        );
        assert!(!f.matches(&lib, id));
    }

    #[test]
    fn test_numeric_comparison() {
        let lib = MemoryLibrary::new();
        let id = lib.insert_with([("tracknr", 9)]);
        let f = filter(
            CollectionBuilder::universe()
                .filter(CollectionType::Smaller, "tracknr", "10")
                .build(),
        );
        assert!(f.matches(&lib, id));

        let f = filter(
            CollectionBuilder::universe()
                .filter(CollectionType::GreaterEq, "tracknr", 9)
                .build(),
        );
        assert!(f.matches(&lib, id));
    }

    #[test]
    fn test_missing_property_never_matches() {
        let lib = MemoryLibrary::new();
        let id = lib.insert_with([("title", "x")]);
        let f = filter(CollectionBuilder::universe().not_equal("artist", "Foo").build());
        assert!(!f.matches(&lib, id));
        let f = filter(CollectionBuilder::universe().has("title").build());
        assert!(f.matches(&lib, id));
    }

    #[test]
    fn test_filter_by_id() {
        let lib = MemoryLibrary::new();
        let a = lib.insert_with([("x", 1)]);
        let b = lib.insert_with([("x", 1)]);
        let mut coll = CollectionBuilder::universe()
            .filter(CollectionType::Greater, "", a)
            .attribute("type", "id")
            .build();
        coll.remove_attribute("field").unwrap();
        let f = filter(coll);
        assert!(!f.matches(&lib, a));
        assert!(f.matches(&lib, b));
    }
}
