//! Bit-level reader with bounded operations.

use crate::error::{BitError, BitResult};

/// A bit-level reader for decoding packed binary data.
///
/// All read operations are bounds-checked and return errors on failure.
/// The reader never panics on malformed input.
#[derive(Debug)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    /// Creates a new `BitReader` from a byte slice.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    /// Returns the number of bits remaining to read.
    #[must_use]
    pub const fn bits_remaining(&self) -> usize {
        self.data
            .len()
            .saturating_mul(8)
            .saturating_sub(self.bit_pos)
    }

    /// Returns `true` if there are no more bits to read.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bits_remaining() == 0
    }

    /// Returns the current bit position.
    #[must_use]
    pub const fn bit_position(&self) -> usize {
        self.bit_pos
    }

    /// Reads a single bit as a boolean.
    pub fn read_bit(&mut self) -> BitResult<bool> {
        if self.bits_remaining() == 0 {
            return Err(BitError::EndOfBuffer {
                requested: 1,
                available: 0,
            });
        }
        let byte_idx = self.bit_pos / 8;
        let bit_idx = self.bit_pos % 8;
        let bit = (self.data[byte_idx] >> (7 - bit_idx)) & 1;
        self.bit_pos += 1;
        Ok(bit == 1)
    }

    /// Reads up to 64 bits as an unsigned integer, most significant first.
    pub fn read_bits(&mut self, bits: u8) -> BitResult<u64> {
        if bits > 64 {
            return Err(BitError::InvalidBitCount {
                bits: bits as usize,
                max_bits: 64,
            });
        }
        if bits as usize > self.bits_remaining() {
            return Err(BitError::EndOfBuffer {
                requested: bits as usize,
                available: self.bits_remaining(),
            });
        }

        let mut value = 0u64;
        for _ in 0..bits {
            value = (value << 1) | u64::from(self.read_bit()?);
        }
        Ok(value)
    }

    /// Skips to the next byte boundary, verifying the padding bits are zero.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::NonZeroPadding`] if any skipped bit is set.
    pub fn align_to_byte(&mut self) -> BitResult<()> {
        while self.bit_pos % 8 != 0 {
            let position = self.bit_pos;
            if self.read_bit()? {
                return Err(BitError::NonZeroPadding {
                    bit_position: position,
                });
            }
        }
        Ok(())
    }

    /// Reads `out.len()` bytes at a byte-aligned position.
    pub fn read_bytes(&mut self, out: &mut [u8]) -> BitResult<()> {
        if self.bit_pos % 8 != 0 {
            return Err(BitError::MisalignedAccess {
                bit_position: self.bit_pos,
            });
        }
        let needed = out.len() * 8;
        if needed > self.bits_remaining() {
            return Err(BitError::EndOfBuffer {
                requested: needed,
                available: self.bits_remaining(),
            });
        }
        let idx = self.bit_pos / 8;
        out.copy_from_slice(&self.data[idx..idx + out.len()]);
        self.bit_pos += needed;
        Ok(())
    }
}
