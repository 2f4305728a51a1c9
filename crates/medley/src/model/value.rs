//! The dynamically typed value.
//!
//! A [`Value`] is the unit of exchange between the core and its clients:
//! command arguments, results, signal payloads and collection attributes are
//! all values.

use std::fmt;

use crate::error::{CoreError, Result};
use crate::model::{Bitbuffer, Collection, Dict, List};

/// Value type tags (wire representation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ValueType {
    None = 0,
    Error = 1,
    Int64 = 2,
    String = 3,
    Collection = 4,
    Bin = 5,
    List = 6,
    Dict = 7,
    Bitbuffer = 8,
    Float = 9,
}

impl ValueType {
    /// Creates a ValueType from its wire representation.
    pub fn from_u32(v: u32) -> Option<ValueType> {
        match v {
            0 => Some(ValueType::None),
            1 => Some(ValueType::Error),
            2 => Some(ValueType::Int64),
            3 => Some(ValueType::String),
            4 => Some(ValueType::Collection),
            5 => Some(ValueType::Bin),
            6 => Some(ValueType::List),
            7 => Some(ValueType::Dict),
            8 => Some(ValueType::Bitbuffer),
            9 => Some(ValueType::Float),
            _ => None,
        }
    }

    /// Returns the lowercase type name.
    pub fn name(self) -> &'static str {
        match self {
            ValueType::None => "none",
            ValueType::Error => "error",
            ValueType::Int64 => "int64",
            ValueType::String => "string",
            ValueType::Collection => "collection",
            ValueType::Bin => "bin",
            ValueType::List => "list",
            ValueType::Dict => "dict",
            ValueType::Bitbuffer => "bitbuffer",
            ValueType::Float => "float",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A dynamically typed value.
///
/// Values own their contents; `clone()` is a deep copy, so a copy never
/// observes later mutation of the original.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    None,
    Error(String),
    Int64(i64),
    Float(f64),
    String(String),
    Bin(Vec<u8>),
    List(List),
    Dict(Dict),
    Collection(Collection),
    Bitbuffer(Bitbuffer),
}

macro_rules! accessor {
    ($name:ident, $mut_name:ident, $variant:ident, $ty:ty) => {
        #[doc = concat!("Returns the inner ", stringify!($variant), ", or `TypeMismatch`.")]
        pub fn $name(&self) -> Result<&$ty> {
            match self {
                Value::$variant(inner) => Ok(inner),
                other => Err(other.mismatch(ValueType::$variant)),
            }
        }

        #[doc = concat!("Returns the inner ", stringify!($variant), " mutably, or `TypeMismatch`.")]
        pub fn $mut_name(&mut self) -> Result<&mut $ty> {
            match self {
                Value::$variant(inner) => Ok(inner),
                other => Err(other.mismatch(ValueType::$variant)),
            }
        }
    };
}

impl Value {
    /// Returns the type tag of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::None => ValueType::None,
            Value::Error(_) => ValueType::Error,
            Value::Int64(_) => ValueType::Int64,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::Bin(_) => ValueType::Bin,
            Value::List(_) => ValueType::List,
            Value::Dict(_) => ValueType::Dict,
            Value::Collection(_) => ValueType::Collection,
            Value::Bitbuffer(_) => ValueType::Bitbuffer,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Creates an Error value.
    pub fn error(message: impl Into<String>) -> Value {
        Value::Error(message.into())
    }

    fn mismatch(&self, expected: ValueType) -> CoreError {
        CoreError::TypeMismatch {
            expected,
            found: self.value_type(),
        }
    }

    /// Returns the integer, or `TypeMismatch`.
    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int64(v) => Ok(*v),
            other => Err(other.mismatch(ValueType::Int64)),
        }
    }

    /// Returns the float, or `TypeMismatch`.
    pub fn as_float(&self) -> Result<f64> {
        match self {
            Value::Float(v) => Ok(*v),
            other => Err(other.mismatch(ValueType::Float)),
        }
    }

    /// Returns the string, or `TypeMismatch`.
    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(other.mismatch(ValueType::String)),
        }
    }

    /// Returns the error message, or `TypeMismatch`.
    pub fn as_error(&self) -> Result<&str> {
        match self {
            Value::Error(s) => Ok(s),
            other => Err(other.mismatch(ValueType::Error)),
        }
    }

    /// Returns the binary contents, or `TypeMismatch`.
    pub fn as_bin(&self) -> Result<&[u8]> {
        match self {
            Value::Bin(b) => Ok(b),
            other => Err(other.mismatch(ValueType::Bin)),
        }
    }

    accessor!(as_list, as_list_mut, List, List);
    accessor!(as_dict, as_dict_mut, Dict, Dict);
    accessor!(as_collection, as_collection_mut, Collection, Collection);
    accessor!(as_bitbuffer, as_bitbuffer_mut, Bitbuffer, Bitbuffer);

    /// Consumes the value and returns the inner collection.
    pub fn into_collection(self) -> Result<Collection> {
        match self {
            Value::Collection(c) => Ok(c),
            other => Err(other.mismatch(ValueType::Collection)),
        }
    }

    /// Consumes the value and returns the inner list.
    pub fn into_list(self) -> Result<List> {
        match self {
            Value::List(l) => Ok(l),
            other => Err(other.mismatch(ValueType::List)),
        }
    }

    /// Consumes the value and returns the inner dict.
    pub fn into_dict(self) -> Result<Dict> {
        match self {
            Value::Dict(d) => Ok(d),
            other => Err(other.mismatch(ValueType::Dict)),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int64(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int64(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bin(v)
    }
}

impl From<List> for Value {
    fn from(v: List) -> Self {
        Value::List(v)
    }
}

impl From<Dict> for Value {
    fn from(v: Dict) -> Self {
        Value::Dict(v)
    }
}

impl From<Collection> for Value {
    fn from(v: Collection) -> Self {
        Value::Collection(v)
    }
}

impl From<Bitbuffer> for Value {
    fn from(v: Bitbuffer) -> Self {
        Value::Bitbuffer(v)
    }
}
