//! Bit-granular read/write buffers.
//!
//! Bits are addressed most significant first within each byte. A buffer is
//! either owned (growable, writable) or a read-only view over shared bytes.

use std::sync::Arc;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, PartialEq)]
enum Storage {
    Owned(Vec<u8>),
    Shared(Arc<[u8]>),
}

impl Storage {
    fn bytes(&self) -> &[u8] {
        match self {
            Storage::Owned(v) => v,
            Storage::Shared(s) => s,
        }
    }
}

/// A buffer with a bit-level read/write position.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitbuffer {
    storage: Storage,
    /// Current position in bits.
    pos: usize,
    /// Length in bits.
    len: usize,
}

impl Default for Bitbuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Bitbuffer {
    /// Creates an empty, writable buffer.
    pub fn new() -> Self {
        Self {
            storage: Storage::Owned(Vec::new()),
            pos: 0,
            len: 0,
        }
    }

    /// Creates a writable buffer holding a copy of `data`.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            storage: Storage::Owned(data.to_vec()),
            pos: 0,
            len: data.len() * 8,
        }
    }

    /// Creates a read-only view over shared bytes.
    pub fn shared(data: Arc<[u8]>) -> Self {
        let len = data.len() * 8;
        Self {
            storage: Storage::Shared(data),
            pos: 0,
            len,
        }
    }

    pub fn is_readonly(&self) -> bool {
        matches!(self.storage, Storage::Shared(_))
    }

    /// Length in bits.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current position in bits.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the underlying bytes (the last byte may be partially used).
    pub fn as_bytes(&self) -> &[u8] {
        self.storage.bytes()
    }

    /// Moves the position to `bit`, which may be at most the length.
    pub fn goto(&mut self, bit: usize) -> Result<()> {
        if bit > self.len {
            return Err(CoreError::InvalidIndex {
                index: bit as i64,
                len: self.len,
            });
        }
        self.pos = bit;
        Ok(())
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    /// Moves the position to the end of the buffer.
    pub fn end(&mut self) {
        self.pos = self.len;
    }

    /// Advances the position to the next byte boundary.
    pub fn align(&mut self) -> Result<()> {
        let aligned = self.pos.div_ceil(8) * 8;
        if aligned > self.len {
            if self.is_readonly() {
                return Err(CoreError::InvalidIndex {
                    index: aligned as i64,
                    len: self.len,
                });
            }
            self.grow_to(aligned);
        }
        self.pos = aligned;
        Ok(())
    }

    fn grow_to(&mut self, bits: usize) {
        if let Storage::Owned(bytes) = &mut self.storage {
            let needed = bits.div_ceil(8);
            if bytes.len() < needed {
                bytes.resize(needed, 0);
            }
        }
        self.len = self.len.max(bits);
    }

    /// Reads `bits` bits (1 to 64) as an unsigned integer, most significant
    /// bit first.
    pub fn get_bits(&mut self, bits: u32) -> Result<u64> {
        if bits == 0 || bits > 64 {
            return Err(CoreError::invalid_request(format!(
                "cannot read {bits} bits at once"
            )));
        }
        let end = self.pos + bits as usize;
        if end > self.len {
            return Err(CoreError::InvalidIndex {
                index: end as i64,
                len: self.len,
            });
        }
        let bytes = self.storage.bytes();
        let mut out = 0u64;
        for bit in self.pos..end {
            let set = bytes[bit / 8] & (0x80 >> (bit % 8)) != 0;
            out = (out << 1) | set as u64;
        }
        self.pos = end;
        Ok(out)
    }

    /// Writes the low `bits` bits (1 to 64) of `value`, most significant bit
    /// first, growing the buffer as needed.
    pub fn put_bits(&mut self, bits: u32, value: u64) -> Result<()> {
        if bits == 0 || bits > 64 {
            return Err(CoreError::invalid_request(format!(
                "cannot write {bits} bits at once"
            )));
        }
        if bits < 64 && value >> bits != 0 {
            return Err(CoreError::invalid_request(format!(
                "value {value} does not fit in {bits} bits"
            )));
        }
        let end = self.pos + bits as usize;
        if self.is_readonly() {
            return Err(CoreError::invalid_request("bitbuffer is read-only"));
        }
        self.grow_to(end);
        if let Storage::Owned(bytes) = &mut self.storage {
            for (i, bit) in (self.pos..end).enumerate() {
                let shift = bits as usize - 1 - i;
                let mask = 0x80u8 >> (bit % 8);
                if (value >> shift) & 1 == 1 {
                    bytes[bit / 8] |= mask;
                } else {
                    bytes[bit / 8] &= !mask;
                }
            }
        }
        self.pos = end;
        Ok(())
    }

    /// Reads `n` whole bytes starting at the current bit position.
    pub fn get_data(&mut self, n: usize) -> Result<Vec<u8>> {
        let end = self.pos + n * 8;
        if end > self.len {
            return Err(CoreError::InvalidIndex {
                index: end as i64,
                len: self.len,
            });
        }
        (0..n).map(|_| self.get_bits(8).map(|b| b as u8)).collect()
    }

    /// Writes `data` starting at the current bit position.
    pub fn put_data(&mut self, data: &[u8]) -> Result<()> {
        for byte in data {
            self.put_bits(8, *byte as u64)?;
        }
        Ok(())
    }
}
