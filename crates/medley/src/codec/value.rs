//! Value encoding/decoding.
//!
//! Every value starts with a big-endian u32 type tag followed by a
//! type-specific payload:
//!
//! | Type       | Payload                                                   |
//! |------------|-----------------------------------------------------------|
//! | None       | (nothing)                                                 |
//! | Error      | `[u32 len][bytes + NUL]`                                  |
//! | Int64      | `[i64]`                                                   |
//! | Float      | `[f32]`                                                   |
//! | String     | `[u32 len][bytes + NUL]`                                  |
//! | Bin        | `[u32 len][bytes]`                                        |
//! | List       | `[u32 restrict tag][u32 count]` elements                  |
//! | Dict       | `[u32 count]` then `[key string][tagged value]` per entry |
//! | Collection | `[u32 type][u32 attr count]` attrs, id list, operands     |
//!
//! List elements are tagged unless the list is restricted, in which case
//! only their payloads are written. Collection attributes are written sorted
//! by key; the id list and operand list are written as restricted list
//! payloads. Bitbuffers are not serializable.

use crate::codec::primitives::{Reader, Writer};
use crate::error::{DecodeError, EncodeError};
use crate::limits::{MAX_BIN_LEN, MAX_CONTAINER_LEN, MAX_DEPTH, MAX_STRING_LEN};
use crate::model::{Collection, CollectionType, Dict, List, Value, ValueType};

// =============================================================================
// DECODING
// =============================================================================

/// Decodes a single tagged value occupying all of `data`.
pub fn decode_value(data: &[u8]) -> Result<Value, DecodeError> {
    let mut reader = Reader::new(data);
    let value = read_value(&mut reader, 0)?;
    if !reader.is_empty() {
        return Err(DecodeError::TrailingBytes {
            count: reader.remaining_len(),
        });
    }
    Ok(value)
}

/// Reads a tagged value.
pub fn read_value(reader: &mut Reader<'_>, depth: usize) -> Result<Value, DecodeError> {
    let ty = read_type_tag(reader, "value type")?;
    read_payload(reader, ty, depth)
}

fn read_type_tag(reader: &mut Reader<'_>, context: &'static str) -> Result<ValueType, DecodeError> {
    let tag = reader.read_u32(context)?;
    ValueType::from_u32(tag).ok_or(DecodeError::InvalidTypeTag { tag })
}

fn read_payload(reader: &mut Reader<'_>, ty: ValueType, depth: usize) -> Result<Value, DecodeError> {
    if depth > MAX_DEPTH {
        return Err(DecodeError::DepthExceeded { max: MAX_DEPTH });
    }
    match ty {
        ValueType::None => Ok(Value::None),
        ValueType::Error => Ok(Value::Error(reader.read_cstring(MAX_STRING_LEN, "error")?)),
        ValueType::Int64 => Ok(Value::Int64(reader.read_i64("int64")?)),
        ValueType::Float => Ok(Value::Float(reader.read_f32("float")?)),
        ValueType::String => Ok(Value::String(reader.read_cstring(MAX_STRING_LEN, "string")?)),
        ValueType::Bin => Ok(Value::Bin(reader.read_bin(MAX_BIN_LEN, "bin")?)),
        ValueType::List => Ok(Value::List(read_list(reader, depth)?)),
        ValueType::Dict => Ok(Value::Dict(read_dict(reader, depth)?)),
        ValueType::Collection => Ok(Value::Collection(read_collection(reader, depth)?)),
        ValueType::Bitbuffer => Err(DecodeError::InvalidTypeTag {
            tag: ValueType::Bitbuffer as u32,
        }),
    }
}

fn read_list(reader: &mut Reader<'_>, depth: usize) -> Result<List, DecodeError> {
    let restrict_tag = reader.read_u32("list restriction")?;
    let restriction = match restrict_tag {
        0 => None,
        tag => Some(ValueType::from_u32(tag).ok_or(DecodeError::InvalidTypeTag { tag })?),
    };
    let count = reader.read_count(MAX_CONTAINER_LEN, "list count")?;

    let mut list = match restriction {
        Some(ty) => List::restricted(ty),
        None => List::new(),
    };
    for _ in 0..count {
        let element = match restriction {
            Some(ty) => read_payload(reader, ty, depth + 1)?,
            None => read_value(reader, depth + 1)?,
        };
        list.append(element)
            .map_err(|_| DecodeError::InvalidTypeTag { tag: restrict_tag })?;
    }
    Ok(list)
}

fn read_dict(reader: &mut Reader<'_>, depth: usize) -> Result<Dict, DecodeError> {
    let count = reader.read_count(MAX_CONTAINER_LEN, "dict count")?;
    let mut dict = Dict::new();
    for _ in 0..count {
        let key = reader.read_cstring(MAX_STRING_LEN, "dict key")?;
        let value = read_value(reader, depth + 1)?;
        dict.set(key, value);
    }
    Ok(dict)
}

fn read_restricted(
    reader: &mut Reader<'_>,
    expected: ValueType,
    depth: usize,
) -> Result<List, DecodeError> {
    let list = read_list(reader, depth)?;
    match list.restriction() {
        Some(ty) if ty == expected => Ok(list),
        Some(found) => Err(DecodeError::RestrictionViolated {
            restricted: expected,
            found,
        }),
        // An empty unrestricted list carries no elements to violate anything
        None if list.is_empty() => Ok(List::restricted(expected)),
        None => Err(DecodeError::RestrictionViolated {
            restricted: expected,
            found: ValueType::None,
        }),
    }
}

fn read_collection(reader: &mut Reader<'_>, depth: usize) -> Result<Collection, DecodeError> {
    let raw = reader.read_u32("collection type")?;
    let kind =
        CollectionType::from_u32(raw).ok_or(DecodeError::InvalidCollectionType { kind: raw })?;

    let count = reader.read_count(MAX_CONTAINER_LEN, "attribute count")?;
    let mut attributes = Dict::new();
    for _ in 0..count {
        let key = reader.read_cstring(MAX_STRING_LEN, "attribute key")?;
        let value = read_value(reader, depth + 1)?;
        attributes.set(key, value);
    }

    let idlist = read_restricted(reader, ValueType::Int64, depth + 1)?;
    let operands = read_restricted(reader, ValueType::Collection, depth + 1)?;

    Collection::from_parts(kind, attributes, idlist, operands).map_err(|_| {
        DecodeError::RestrictionViolated {
            restricted: ValueType::Collection,
            found: ValueType::None,
        }
    })
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encodes a value with its type tag.
pub fn encode_value(value: &Value) -> Result<Vec<u8>, EncodeError> {
    let mut writer = Writer::with_capacity(64);
    write_value(&mut writer, value, 0)?;
    Ok(writer.into_bytes())
}

/// Writes a tagged value.
pub fn write_value(writer: &mut Writer, value: &Value, depth: usize) -> Result<(), EncodeError> {
    let ty = value.value_type();
    if ty == ValueType::Bitbuffer {
        return Err(EncodeError::NotSerializable(ty));
    }
    writer.write_u32(ty as u32);
    write_payload(writer, value, depth)
}

fn write_payload(writer: &mut Writer, value: &Value, depth: usize) -> Result<(), EncodeError> {
    if depth > MAX_DEPTH {
        return Err(EncodeError::DepthExceeded { max: MAX_DEPTH });
    }
    match value {
        Value::None => Ok(()),
        Value::Error(s) => writer.write_cstring(s, MAX_STRING_LEN, "error"),
        Value::Int64(v) => {
            writer.write_i64(*v);
            Ok(())
        }
        Value::Float(v) => {
            writer.write_f32(*v);
            Ok(())
        }
        Value::String(s) => writer.write_cstring(s, MAX_STRING_LEN, "string"),
        Value::Bin(b) => writer.write_bin(b, MAX_BIN_LEN, "bin"),
        Value::List(list) => write_list(writer, list, depth),
        Value::Dict(dict) => write_dict(writer, dict, depth),
        Value::Collection(coll) => write_collection(writer, coll, depth),
        Value::Bitbuffer(_) => Err(EncodeError::NotSerializable(ValueType::Bitbuffer)),
    }
}

fn write_list(writer: &mut Writer, list: &List, depth: usize) -> Result<(), EncodeError> {
    writer.write_u32(list.restriction().map_or(0, |ty| ty as u32));
    writer.write_count(list.len(), MAX_CONTAINER_LEN, "list count")?;
    for element in list.iter() {
        match list.restriction() {
            Some(_) => write_payload(writer, element, depth + 1)?,
            None => write_value(writer, element, depth + 1)?,
        }
    }
    Ok(())
}

fn write_dict(writer: &mut Writer, dict: &Dict, depth: usize) -> Result<(), EncodeError> {
    writer.write_count(dict.len(), MAX_CONTAINER_LEN, "dict count")?;
    for (key, value) in dict.iter() {
        writer.write_cstring(key, MAX_STRING_LEN, "dict key")?;
        write_value(writer, value, depth + 1)?;
    }
    Ok(())
}

fn write_collection(writer: &mut Writer, coll: &Collection, depth: usize) -> Result<(), EncodeError> {
    writer.write_u32(coll.kind() as u32);

    let mut attributes: Vec<(&str, &Value)> = coll.attributes().iter().collect();
    attributes.sort_by(|a, b| a.0.cmp(b.0));
    writer.write_count(attributes.len(), MAX_CONTAINER_LEN, "attribute count")?;
    for (key, value) in attributes {
        writer.write_cstring(key, MAX_STRING_LEN, "attribute key")?;
        write_value(writer, value, depth + 1)?;
    }

    write_list(writer, coll.idlist(), depth + 1)?;
    write_list(writer, coll.operand_list(), depth + 1)
}
