//! Bit-level writer for encoding packed binary data.

use crate::error::{BitError, BitResult};

/// A bit-level writer for encoding packed binary data.
///
/// Bits are packed most-significant-first within each byte. Writes are
/// accumulated in an internal buffer; call [`finish`](Self::finish) to get
/// the final byte buffer, or [`clear`](Self::clear) to reuse the allocation
/// for the next package.
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    /// Current byte being written (not yet pushed to `bytes`).
    current_byte: u8,
    /// Number of bits written to `current_byte` (0-7).
    bit_count: u8,
}

impl BitWriter {
    /// Creates a new empty `BitWriter`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `BitWriter` with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            current_byte: 0,
            bit_count: 0,
        }
    }

    /// Returns the number of bits written so far.
    #[must_use]
    pub fn bits_written(&self) -> usize {
        self.bytes.len() * 8 + self.bit_count as usize
    }

    /// Resets the writer, keeping the allocation.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.current_byte = 0;
        self.bit_count = 0;
    }

    /// Writes a single bit.
    pub fn write_bit(&mut self, value: bool) {
        self.current_byte = (self.current_byte << 1) | u8::from(value);
        self.bit_count += 1;
        if self.bit_count == 8 {
            self.bytes.push(self.current_byte);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }

    /// Writes up to 64 bits from an unsigned integer, most significant first.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::InvalidBitCount`] if `bits > 64`.
    /// Returns [`BitError::ValueOutOfRange`] if `value` doesn't fit in `bits`.
    pub fn write_bits(&mut self, value: u64, bits: u8) -> BitResult<()> {
        if bits > 64 {
            return Err(BitError::InvalidBitCount {
                bits: bits as usize,
                max_bits: 64,
            });
        }
        if bits == 0 {
            return Ok(());
        }
        if bits < 64 && value >= (1u64 << bits) {
            return Err(BitError::ValueOutOfRange {
                value,
                bits: bits as usize,
            });
        }

        for i in (0..bits).rev() {
            self.write_bit((value >> i) & 1 == 1);
        }
        Ok(())
    }

    /// Pads with zero bits up to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        while self.bit_count != 0 {
            self.write_bit(false);
        }
    }

    /// Writes a byte slice at a byte-aligned position.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::MisalignedAccess`] if the writer is not aligned.
    pub fn write_bytes(&mut self, data: &[u8]) -> BitResult<()> {
        if self.bit_count != 0 {
            return Err(BitError::MisalignedAccess {
                bit_position: self.bits_written(),
            });
        }
        self.bytes.extend_from_slice(data);
        Ok(())
    }

    /// Finishes writing and returns the byte buffer.
    ///
    /// If the last byte is incomplete, it is padded with zeros on the right.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            self.current_byte <<= 8 - self.bit_count;
            self.bytes.push(self.current_byte);
        }
        self.bytes
    }

    /// Finishes writing and appends to the provided buffer.
    pub fn finish_into(mut self, buf: &mut Vec<u8>) {
        if self.bit_count > 0 {
            self.current_byte <<= 8 - self.bit_count;
            self.bytes.push(self.current_byte);
        }
        buf.append(&mut self.bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_writer() {
        let writer = BitWriter::new();
        assert_eq!(writer.bits_written(), 0);
        assert!(writer.finish().is_empty());
    }

    #[test]
    fn write_single_bit_true() {
        let mut writer = BitWriter::new();
        writer.write_bit(true);
        assert_eq!(writer.bits_written(), 1);
        // Single bit 1, padded with 7 zeros = 0b1000_0000
        assert_eq!(writer.finish(), vec![0b1000_0000]);
    }

    #[test]
    fn write_full_byte() {
        let mut writer = BitWriter::new();
        for bit in [true, false, true, false, true, false, true, false] {
            writer.write_bit(bit);
        }
        assert_eq!(writer.finish(), vec![0b1010_1010]);
    }

    #[test]
    fn write_bits_across_byte_boundary() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b1111, 4).unwrap();
        writer.write_bits(0b1010_1010, 8).unwrap();
        // 1111 + 10101010 = 1111_1010 1010_0000
        assert_eq!(writer.finish(), vec![0b1111_1010, 0b1010_0000]);
    }

    #[test]
    fn write_bits_invalid_count() {
        let mut writer = BitWriter::new();
        assert!(matches!(
            writer.write_bits(0, 65),
            Err(BitError::InvalidBitCount {
                bits: 65,
                max_bits: 64
            })
        ));
    }

    #[test]
    fn write_bits_value_out_of_range() {
        let mut writer = BitWriter::new();
        assert!(matches!(
            writer.write_bits(256, 8),
            Err(BitError::ValueOutOfRange {
                value: 256,
                bits: 8
            })
        ));
    }

    #[test]
    fn write_bits_64_bits() {
        let mut writer = BitWriter::new();
        writer.write_bits(u64::MAX, 64).unwrap();
        assert_eq!(writer.finish(), vec![0xFF; 8]);
    }

    #[test]
    fn align_pads_with_zeros() {
        let mut writer = BitWriter::new();
        writer.write_bit(true);
        writer.align_to_byte();
        assert_eq!(writer.bits_written(), 8);
        writer.write_bits(0xAB, 8).unwrap();
        assert_eq!(writer.finish(), vec![0b1000_0000, 0xAB]);
    }

    #[test]
    fn write_bytes_requires_alignment() {
        let mut writer = BitWriter::new();
        writer.write_bit(true);
        let err = writer.write_bytes(&[1, 2]).unwrap_err();
        assert!(matches!(err, BitError::MisalignedAccess { .. }));
    }

    #[test]
    fn write_bytes_aligned() {
        let mut writer = BitWriter::new();
        writer.write_bytes(&[0xDE, 0xAD]).unwrap();
        assert_eq!(writer.finish(), vec![0xDE, 0xAD]);
    }

    #[test]
    fn clear_keeps_allocation() {
        let mut writer = BitWriter::with_capacity(64);
        writer.write_bits(0xFFFF, 16).unwrap();
        writer.clear();
        assert_eq!(writer.bits_written(), 0);
        writer.write_bit(false);
        assert_eq!(writer.finish(), vec![0]);
    }

    #[test]
    fn finish_into_appends() {
        let mut writer = BitWriter::new();
        writer.write_bits(0xAB, 8).unwrap();
        let mut buf = vec![0x00, 0x11];
        writer.finish_into(&mut buf);
        assert_eq!(buf, vec![0x00, 0x11, 0xAB]);
    }
}
