//! Data model types.
//!
//! This module contains the value system shared by every other part of the
//! crate:
//! - Values (the dynamically typed unit of exchange)
//! - Lists and dicts (with detached cursors)
//! - Bitbuffers
//! - Collections (query expression trees)
//! - Builders (ergonomic collection construction)

pub mod bitbuffer;
pub mod builder;
pub mod collection;
pub mod dict;
pub mod list;
pub mod value;

pub use bitbuffer::Bitbuffer;
pub use builder::{CollectionBuilder, add_limit_operator, add_order_operators};
pub use collection::{ATTR_NAMESPACE, ATTR_REFERENCE, Collection, CollectionType};
pub use dict::{Dict, DictCursor};
pub use list::{List, ListCursor};
pub use value::{Value, ValueType};
