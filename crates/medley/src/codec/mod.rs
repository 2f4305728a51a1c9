//! Binary encoding/decoding of values.
//!
//! This module implements the tagged, big-endian value wire format used for
//! IPC payloads and DAG snapshots.

pub mod primitives;
pub mod value;

pub use primitives::{Reader, Writer};
pub use value::{decode_value, encode_value, read_value, write_value};
