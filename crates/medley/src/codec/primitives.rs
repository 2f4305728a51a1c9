//! Primitive encoding/decoding for the value wire format.
//!
//! All integers are big-endian. Strings are length-prefixed and carry a
//! trailing NUL that is counted in the length.

use crate::error::{DecodeError, EncodeError};

// =============================================================================
// DECODING
// =============================================================================

/// Reader for decoding binary data.
///
/// Wraps a byte slice and provides methods for reading primitives
/// with bounds checking and error handling.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the current position in the data.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the number of remaining bytes.
    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_byte(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        let [byte] = self.read_array::<1>(context)?;
        Ok(byte)
    }

    /// Reads exactly n bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining_len() {
            return Err(DecodeError::UnexpectedEof { context });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    #[inline]
    fn read_array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N], DecodeError> {
        let bytes = self.read_bytes(N, context)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Reads a big-endian u32.
    #[inline]
    pub fn read_u32(&mut self, context: &'static str) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.read_array(context)?))
    }

    /// Reads a big-endian i64.
    #[inline]
    pub fn read_i64(&mut self, context: &'static str) -> Result<i64, DecodeError> {
        Ok(i64::from_be_bytes(self.read_array(context)?))
    }

    /// Reads a big-endian IEEE-754 single and widens it.
    #[inline]
    pub fn read_f32(&mut self, context: &'static str) -> Result<f64, DecodeError> {
        Ok(f32::from_be_bytes(self.read_array(context)?) as f64)
    }

    /// Reads a u32 count and checks it against `max`.
    pub fn read_count(&mut self, max: usize, field: &'static str) -> Result<usize, DecodeError> {
        let len = self.read_u32(field)? as usize;
        if len > max {
            return Err(DecodeError::LengthExceedsLimit { field, len, max });
        }
        Ok(len)
    }

    /// Reads a length-prefixed, NUL-terminated UTF-8 string.
    pub fn read_cstring(&mut self, max_len: usize, field: &'static str) -> Result<String, DecodeError> {
        let len = self.read_count(max_len, field)?;
        let bytes = self.read_bytes(len, field)?;
        let Some((&0, text)) = bytes.split_last() else {
            return Err(DecodeError::MissingNul { field });
        };
        std::str::from_utf8(text)
            .map(|s| s.to_string())
            .map_err(|_| DecodeError::InvalidUtf8 { field })
    }

    /// Reads a length-prefixed byte array.
    pub fn read_bin(&mut self, max_len: usize, field: &'static str) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_count(max_len, field)?;
        Ok(self.read_bytes(len, field)?.to_vec())
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Writer for encoding binary data.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Creates a new writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Creates a new writer with capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns a reference to the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    #[inline]
    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Writes a float narrowed to IEEE-754 single precision.
    #[inline]
    pub fn write_f32(&mut self, value: f64) {
        self.buf.extend_from_slice(&(value as f32).to_be_bytes());
    }

    /// Writes a container count, checked against `max`.
    pub fn write_count(
        &mut self,
        len: usize,
        max: usize,
        field: &'static str,
    ) -> Result<(), EncodeError> {
        if len > max {
            return Err(EncodeError::LengthExceedsLimit { field, len, max });
        }
        self.write_u32(len as u32);
        Ok(())
    }

    /// Writes a length-prefixed, NUL-terminated string.
    pub fn write_cstring(
        &mut self,
        s: &str,
        max_len: usize,
        field: &'static str,
    ) -> Result<(), EncodeError> {
        if s.as_bytes().contains(&0) {
            return Err(EncodeError::InteriorNul { field });
        }
        self.write_count(s.len() + 1, max_len, field)?;
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    /// Writes a length-prefixed byte array.
    pub fn write_bin(
        &mut self,
        bytes: &[u8],
        max_len: usize,
        field: &'static str,
    ) -> Result<(), EncodeError> {
        self.write_count(bytes.len(), max_len, field)?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }
}
