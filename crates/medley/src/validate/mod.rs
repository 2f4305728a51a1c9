//! Structural and referential validation of collections.
//!
//! Structural validation checks a tree in isolation: operand arity per node
//! type and the attributes each node needs to be evaluated. Referential
//! validation needs the saved bindings: every reference must resolve and no
//! reference chain may lead back to the binding being saved.

use rustc_hash::FxHashSet;

use crate::dag::{ALL_MEDIA, CollectionResolver, Namespace};
use crate::error::{CoreError, Result};
use crate::model::{ATTR_NAMESPACE, ATTR_REFERENCE, Collection, CollectionType};

/// Attribute marking an id list as a party shuffle playlist.
pub const ATTR_PLAYLIST_TYPE: &str = "type";

/// Validates a whole tree about to be bound in `namespace`.
///
/// The Playlists namespace only accepts id lists at the root.
pub fn validate_collection(coll: &Collection, namespace: Namespace) -> Result<()> {
    if namespace == Namespace::Playlists && coll.kind() != CollectionType::Idlist {
        return Err(CoreError::InvalidCollection(format!(
            "the Playlists namespace only holds idlists, not {}",
            coll.kind()
        )));
    }
    validate_tree(coll)
}

/// Validates a tree without namespace constraints.
pub fn validate_tree(coll: &Collection) -> Result<()> {
    validate_node(coll)?;
    coll.operands().try_for_each(validate_tree)
}

fn validate_node(coll: &Collection) -> Result<()> {
    let operands = coll.operand_count();
    match coll.kind() {
        CollectionType::Reference => {
            if operands != 0 {
                return Err(coll.arity_error("no"));
            }
            let target = coll
                .attribute(ATTR_REFERENCE)
                .ok_or_else(|| missing(coll, ATTR_REFERENCE))?;
            if target != ALL_MEDIA {
                let ns = coll
                    .attribute(ATTR_NAMESPACE)
                    .ok_or_else(|| missing(coll, ATTR_NAMESPACE))?;
                ns.parse::<Namespace>()?;
            }
        }
        CollectionType::Universe => {
            if operands != 0 {
                return Err(coll.arity_error("no"));
            }
        }
        CollectionType::Union | CollectionType::Intersection => {
            if operands == 0 {
                return Err(coll.arity_error("at least one"));
            }
        }
        CollectionType::Idlist => {
            let pshuffle = coll.attribute(ATTR_PLAYLIST_TYPE) == Some("pshuffle");
            if operands > usize::from(pshuffle) {
                return Err(coll.arity_error(if pshuffle { "at most one" } else { "no" }));
            }
        }
        CollectionType::Complement | CollectionType::MediaSet => {
            coll.single_operand()?;
        }
        CollectionType::Order => {
            coll.single_operand()?;
            validate_order(coll)?;
        }
        CollectionType::Limit => {
            coll.single_operand()?;
            for key in ["start", "length"] {
                if coll.attributes().contains_key(key)
                    && !coll.attribute_int(key).is_some_and(|v| v >= 0)
                {
                    return Err(CoreError::InvalidCollection(format!(
                        "limit {key} must be a non-negative integer"
                    )));
                }
            }
        }
        kind if kind.is_filter() => {
            coll.single_operand()?;
            validate_filter(coll)?;
        }
        _ => {}
    }
    Ok(())
}

fn missing(coll: &Collection, key: &str) -> CoreError {
    CoreError::InvalidCollection(format!("{} node lacks the '{key}' attribute", coll.kind()))
}

fn validate_order(coll: &Collection) -> Result<()> {
    match coll.attribute("type").unwrap_or("value") {
        "value" => {
            coll.attribute("field").ok_or_else(|| missing(coll, "field"))?;
        }
        "id" | "random" => {}
        other => {
            return Err(CoreError::InvalidCollection(format!(
                "unknown order type '{other}'"
            )));
        }
    }
    match coll.attribute("direction") {
        None | Some("ASC") | Some("DESC") => Ok(()),
        Some(other) => Err(CoreError::InvalidCollection(format!(
            "unknown order direction '{other}'"
        ))),
    }
}

fn validate_filter(coll: &Collection) -> Result<()> {
    let by_id = match coll.attribute("type").unwrap_or("value") {
        "value" => false,
        "id" => true,
        other => {
            return Err(CoreError::InvalidCollection(format!(
                "unknown filter type '{other}'"
            )));
        }
    };
    if !by_id {
        coll.attribute("field").ok_or_else(|| missing(coll, "field"))?;
    }
    if coll.kind() != CollectionType::Has && !coll.attributes().contains_key("value") {
        return Err(missing(coll, "value"));
    }
    match coll.attribute("collation") {
        None | Some("NOCASE") | Some("BINARY") | Some("NATCOLL") => Ok(()),
        Some(other) => Err(CoreError::InvalidCollection(format!(
            "unknown collation '{other}'"
        ))),
    }
}

/// Checks that every reference in `coll` resolves and that binding it as
/// `name` in `namespace` would not close a reference cycle.
pub fn check_references<R>(
    resolver: &R,
    name: &str,
    namespace: Namespace,
    coll: &Collection,
) -> Result<()>
where
    R: CollectionResolver + ?Sized,
{
    let mut visited: FxHashSet<(Namespace, String)> = FxHashSet::default();
    let mut pending = reference_targets(coll)?;

    while let Some((ns, target)) = pending.pop() {
        if ns == namespace && target == name {
            return Err(CoreError::CyclicCollection {
                name: name.to_string(),
                namespace,
            });
        }
        if !visited.insert((ns, target.clone())) {
            continue;
        }
        let next = resolver
            .resolve(ns, &target)
            .ok_or(CoreError::CollectionNotFound {
                name: target,
                namespace: ns,
            })?;
        pending.extend(reference_targets(next)?);
    }
    Ok(())
}

/// Returns the parsed `(namespace, name)` targets of every Reference in the
/// tree, skipping the built-in "All Media" reference.
pub fn reference_targets(coll: &Collection) -> Result<Vec<(Namespace, String)>> {
    coll.references()
        .into_iter()
        .filter(|(_, name)| *name != ALL_MEDIA)
        .map(|(ns, name)| Ok((ns.parse::<Namespace>()?, name.to_string())))
        .collect()
}
