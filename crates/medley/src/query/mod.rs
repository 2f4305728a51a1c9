//! Collection evaluation.
//!
//! Evaluating a collection yields an ordered list of media ids:
//! - Universe and "All Media" references: every id, ascending
//! - Idlist: its literal ids
//! - Union: operand results concatenated in order, first occurrence kept
//! - Intersection: the first operand's order, restricted to ids in all others
//! - Complement: every id not in the operand, ascending
//! - Filters: the operand's order, restricted to passing entries
//! - Order: the operand's result, stably sorted
//! - Limit: a window of the operand's result
//! - MediaSet: the operand's result with duplicates removed

pub mod collate;
mod filter;
mod project;

pub use collate::{Collation, compare_optional, compare_values, natural_cmp};
pub use project::{Projection, project};

use rand::seq::SliceRandom;
use rustc_hash::FxHashSet;

use crate::dag::{ALL_MEDIA, CollectionResolver, Namespace};
use crate::error::{CoreError, Result};
use crate::limits::MAX_REFERENCE_DEPTH;
use crate::medialib::MediaLibrary;
use crate::model::{ATTR_NAMESPACE, ATTR_REFERENCE, Collection, CollectionType, Value};
use filter::Filter;

/// Evaluates `coll`, resolving references through `resolver`.
pub fn evaluate<R, L>(resolver: &R, library: &L, coll: &Collection) -> Result<Vec<i64>>
where
    R: CollectionResolver + ?Sized,
    L: MediaLibrary + ?Sized,
{
    Evaluator { resolver, library }.eval(coll, 0)
}

struct Evaluator<'a, R: ?Sized, L: ?Sized> {
    resolver: &'a R,
    library: &'a L,
}

impl<R, L> Evaluator<'_, R, L>
where
    R: CollectionResolver + ?Sized,
    L: MediaLibrary + ?Sized,
{
    fn universe(&self) -> Vec<i64> {
        let mut ids = self.library.ids();
        ids.sort_unstable();
        ids
    }

    fn eval(&self, coll: &Collection, depth: usize) -> Result<Vec<i64>> {
        match coll.kind() {
            CollectionType::Reference => self.eval_reference(coll, depth),
            CollectionType::Universe => Ok(self.universe()),
            CollectionType::Idlist => Ok(coll.ids()),
            CollectionType::Union => {
                if coll.operand_count() == 0 {
                    return Err(coll.arity_error("at least one"));
                }
                let mut seen = FxHashSet::default();
                let mut out = Vec::new();
                for operand in coll.operands() {
                    for id in self.eval(operand, depth)? {
                        if seen.insert(id) {
                            out.push(id);
                        }
                    }
                }
                Ok(out)
            }
            CollectionType::Intersection => {
                let mut operands = coll.operands();
                let first = operands
                    .next()
                    .ok_or_else(|| coll.arity_error("at least one"))?;
                let mut result = dedup(self.eval(first, depth)?);
                for operand in operands {
                    let keep: FxHashSet<i64> = self.eval(operand, depth)?.into_iter().collect();
                    result.retain(|id| keep.contains(id));
                }
                Ok(result)
            }
            CollectionType::Complement => {
                let excluded: FxHashSet<i64> = self
                    .eval(coll.single_operand()?, depth)?
                    .into_iter()
                    .collect();
                Ok(self
                    .universe()
                    .into_iter()
                    .filter(|id| !excluded.contains(id))
                    .collect())
            }
            CollectionType::MediaSet => Ok(dedup(self.eval(coll.single_operand()?, depth)?)),
            CollectionType::Order => {
                let mut ids = self.eval(coll.single_operand()?, depth)?;
                self.order(coll, &mut ids)?;
                Ok(ids)
            }
            CollectionType::Limit => {
                let ids = self.eval(coll.single_operand()?, depth)?;
                let start = coll.attribute_int("start").unwrap_or(0).max(0) as usize;
                let length = match coll.attribute_int("length").unwrap_or(0) {
                    n if n > 0 => n as usize,
                    _ => usize::MAX,
                };
                Ok(ids.into_iter().skip(start).take(length).collect())
            }
            _ => {
                let filter = Filter::from_collection(coll)?;
                let ids = self.eval(coll.single_operand()?, depth)?;
                Ok(ids
                    .into_iter()
                    .filter(|id| filter.matches(self.library, *id))
                    .collect())
            }
        }
    }

    fn eval_reference(&self, coll: &Collection, depth: usize) -> Result<Vec<i64>> {
        let name = coll.attribute(ATTR_REFERENCE).ok_or_else(|| {
            CoreError::InvalidCollection("reference node lacks a target".to_string())
        })?;
        if name == ALL_MEDIA {
            return Ok(self.universe());
        }
        if depth >= MAX_REFERENCE_DEPTH {
            return Err(CoreError::invalid_request(format!(
                "reference chain through '{name}' is deeper than {MAX_REFERENCE_DEPTH}"
            )));
        }
        let namespace: Namespace = coll
            .attribute(ATTR_NAMESPACE)
            .ok_or_else(|| {
                CoreError::InvalidCollection("reference node lacks a namespace".to_string())
            })?
            .parse()?;
        let target = self
            .resolver
            .resolve(namespace, name)
            .ok_or_else(|| CoreError::CollectionNotFound {
                name: name.to_string(),
                namespace,
            })?;
        self.eval(target, depth + 1)
    }

    fn order(&self, coll: &Collection, ids: &mut [i64]) -> Result<()> {
        let descending = match coll.attribute("direction") {
            None | Some("ASC") => false,
            Some("DESC") => true,
            Some(other) => {
                return Err(CoreError::InvalidCollection(format!(
                    "unknown order direction '{other}'"
                )));
            }
        };
        match coll.attribute("type").unwrap_or("value") {
            "id" => ids.sort_by(|a, b| directed(a.cmp(b), descending)),
            "random" => ids.shuffle(&mut rand::thread_rng()),
            "value" => {
                let field = coll.attribute("field").ok_or_else(|| {
                    CoreError::InvalidCollection("order node lacks the 'field' attribute".to_string())
                })?;
                let mut keyed: Vec<(i64, Option<Value>)> = ids
                    .iter()
                    .map(|id| (*id, self.library.get(*id, field)))
                    .collect();
                keyed.sort_by(|a, b| directed(compare_optional(a.1.as_ref(), b.1.as_ref()), descending));
                for (slot, (id, _)) in ids.iter_mut().zip(keyed) {
                    *slot = id;
                }
            }
            other => {
                return Err(CoreError::InvalidCollection(format!(
                    "unknown order type '{other}'"
                )));
            }
        }
        Ok(())
    }
}

fn directed(ord: std::cmp::Ordering, descending: bool) -> std::cmp::Ordering {
    if descending { ord.reverse() } else { ord }
}

fn dedup(ids: Vec<i64>) -> Vec<i64> {
    let mut seen = FxHashSet::default();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use rustc_hash::FxHashMap;

    use super::*;
    use crate::error::ErrorKind;
    use crate::medialib::MemoryLibrary;
    use crate::model::CollectionBuilder;

    #[derive(Default)]
    struct Bindings(FxHashMap<(Namespace, String), Collection>);

    impl CollectionResolver for Bindings {
        fn resolve(&self, namespace: Namespace, name: &str) -> Option<&Collection> {
            self.0.get(&(namespace, name.to_string()))
        }
    }

    fn library() -> (MemoryLibrary, Vec<i64>) {
        let lib = MemoryLibrary::new();
        let ids = vec![
            lib.insert_with([("artist", "B"), ("title", "t2")]),
            lib.insert_with([("artist", "A"), ("title", "t10")]),
            lib.insert_with([("artist", "B"), ("title", "t1")]),
            lib.insert_with([("artist", "A"), ("title", "t3")]),
        ];
        (lib, ids)
    }

    fn eval(lib: &MemoryLibrary, coll: &Collection) -> Result<Vec<i64>> {
        evaluate(&Bindings::default(), lib, coll)
    }

    #[test]
    fn test_set_operations() {
        let (lib, ids) = library();
        let union = CollectionBuilder::idlist([ids[2], ids[0]])
            .union_with(Collection::idlist_of([ids[0], ids[1]]))
            .build();
        assert_eq!(eval(&lib, &union).unwrap(), vec![ids[2], ids[0], ids[1]]);

        let inter = CollectionBuilder::idlist([ids[3], ids[1], ids[0]])
            .intersect_with(Collection::idlist_of([ids[0], ids[3]]))
            .build();
        assert_eq!(eval(&lib, &inter).unwrap(), vec![ids[3], ids[0]]);

        let comp = CollectionBuilder::idlist([ids[1]]).complement().build();
        assert_eq!(eval(&lib, &comp).unwrap(), vec![ids[0], ids[2], ids[3]]);
    }

    #[test]
    fn test_order_by_multiple_keys() {
        let (lib, ids) = library();
        let coll = CollectionBuilder::universe()
            .order_by(&["artist", "-title"])
            .build();
        assert_eq!(
            eval(&lib, &coll).unwrap(),
            vec![ids[1], ids[3], ids[0], ids[2]]
        );
    }

    #[test]
    fn test_limit_window() {
        let (lib, ids) = library();
        let coll = CollectionBuilder::universe().limit(1, 2).build();
        assert_eq!(eval(&lib, &coll).unwrap(), vec![ids[1], ids[2]]);

        let unbounded = CollectionBuilder::universe().limit(3, 0).build();
        assert_eq!(eval(&lib, &unbounded).unwrap(), vec![ids[3]]);
    }

    #[test]
    fn test_random_order_is_permutation() {
        let (lib, ids) = library();
        let coll = CollectionBuilder::universe().order_by(&["random"]).build();
        let mut result = eval(&lib, &coll).unwrap();
        result.sort_unstable();
        assert_eq!(result, ids);
    }

    #[test]
    fn test_unresolved_reference() {
        let (lib, _) = library();
        let err = eval(&lib, &Collection::reference("Collections", "nope")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let mut all_media = Collection::new(CollectionType::Reference);
        all_media.set_attribute(ATTR_REFERENCE, ALL_MEDIA);
        assert_eq!(eval(&lib, &all_media).unwrap().len(), 4);
    }

    #[test]
    fn test_reference_loop_is_bounded() {
        let (lib, _) = library();
        let mut bindings = Bindings::default();
        bindings.0.insert(
            (Namespace::Collections, "a".to_string()),
            Collection::reference("Collections", "a"),
        );
        let err = evaluate(&bindings, &lib, &Collection::reference("Collections", "a")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_broken_arity_is_an_error() {
        let (lib, _) = library();
        let err = eval(&lib, &Collection::new(CollectionType::Complement)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }
}
