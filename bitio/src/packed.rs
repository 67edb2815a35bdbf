//! Packed unsigned integer and zig-zag delta coding.
//!
//! Values are split into a bucket index and an offset within the bucket.
//! Bucket widths grow (1, 2, 4, 8, 16, 32, 64 bits) so small values cost
//! very few bits: 0 and 1 encode in two bits total in raw mode. The bucket
//! index is what the entropy-coded stream models per context; the offset is
//! always written as raw bits.

use crate::error::{BitError, BitResult};
use crate::reader::BitReader;
use crate::writer::BitWriter;

/// Number of packed-integer buckets.
pub const BUCKET_COUNT: usize = 7;

/// Offset field width per bucket, in bits.
pub const BUCKET_WIDTHS: [u8; BUCKET_COUNT] = [1, 2, 4, 8, 16, 32, 64];

/// First value covered by each bucket (cumulative capacities).
pub const BUCKET_OFFSETS: [u64; BUCKET_COUNT] = [0, 2, 6, 22, 278, 65_814, 4_295_033_110];

/// Splits a value into its bucket index and in-bucket offset.
#[must_use]
pub fn split_packed(value: u64) -> (usize, u64) {
    let mut bucket = BUCKET_COUNT - 1;
    while bucket > 0 && value < BUCKET_OFFSETS[bucket] {
        bucket -= 1;
    }
    (bucket, value - BUCKET_OFFSETS[bucket])
}

/// Rebuilds a value from its bucket index and in-bucket offset.
///
/// Returns `None` if the combination does not name a canonical value.
#[must_use]
pub fn join_packed(bucket: usize, offset: u64) -> Option<u64> {
    if bucket >= BUCKET_COUNT {
        return None;
    }
    let width = BUCKET_WIDTHS[bucket];
    if width < 64 && offset >= (1u64 << width) {
        return None;
    }
    BUCKET_OFFSETS[bucket].checked_add(offset)
}

/// Writes a packed unsigned integer with a unary bucket prefix.
pub fn write_packed(writer: &mut BitWriter, value: u64) -> BitResult<()> {
    let (bucket, offset) = split_packed(value);
    for _ in 0..bucket {
        writer.write_bit(false);
    }
    writer.write_bit(true);
    writer.write_bits(offset, BUCKET_WIDTHS[bucket])
}

/// Reads a packed unsigned integer with a unary bucket prefix.
pub fn read_packed(reader: &mut BitReader<'_>) -> BitResult<u64> {
    let mut bucket = 0usize;
    while !reader.read_bit()? {
        bucket += 1;
        if bucket >= BUCKET_COUNT {
            return Err(BitError::InvalidPacked);
        }
    }
    let offset = reader.read_bits(BUCKET_WIDTHS[bucket])?;
    join_packed(bucket, offset).ok_or(BitError::InvalidPacked)
}

/// Maps a signed delta to an unsigned code.
///
/// Even codes are non-negative deltas, odd codes negative; the magnitude is
/// `(code + 1) >> 1`.
#[must_use]
pub const fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
#[must_use]
pub const fn zigzag_decode(code: u64) -> i64 {
    ((code >> 1) as i64) ^ -((code & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_offsets_are_cumulative_capacities() {
        let mut expected = 0u64;
        for bucket in 0..BUCKET_COUNT {
            assert_eq!(BUCKET_OFFSETS[bucket], expected);
            if bucket + 1 < BUCKET_COUNT {
                expected += 1u64 << BUCKET_WIDTHS[bucket];
            }
        }
    }

    #[test]
    fn small_values_cost_two_bits() {
        for value in [0u64, 1] {
            let mut writer = BitWriter::new();
            write_packed(&mut writer, value).unwrap();
            assert_eq!(writer.bits_written(), 2);
        }
    }

    #[test]
    fn packed_roundtrip_boundaries() {
        let values = [
            0u64,
            1,
            2,
            5,
            6,
            21,
            22,
            255,
            256,
            257,
            65_535,
            65_536,
            65_537,
            u64::from(u32::MAX),
            u64::from(u32::MAX) + 1,
            u64::MAX,
        ];
        for value in values {
            let mut writer = BitWriter::new();
            write_packed(&mut writer, value).unwrap();
            let bytes = writer.finish();
            let mut reader = BitReader::new(&bytes);
            assert_eq!(read_packed(&mut reader).unwrap(), value, "value {value}");
        }
    }

    #[test]
    fn split_join_inverse() {
        for value in [0u64, 1, 6, 22, 300, 70_000, u64::MAX] {
            let (bucket, offset) = split_packed(value);
            assert_eq!(join_packed(bucket, offset), Some(value));
        }
    }

    #[test]
    fn join_rejects_out_of_range_offset() {
        assert_eq!(join_packed(0, 2), None);
        assert_eq!(join_packed(BUCKET_COUNT, 0), None);
    }

    #[test]
    fn read_rejects_runaway_prefix() {
        // All-zero prefix longer than the bucket table.
        let bytes = [0u8; 2];
        let mut reader = BitReader::new(&bytes);
        assert!(matches!(
            read_packed(&mut reader),
            Err(BitError::InvalidPacked)
        ));
    }

    #[test]
    fn zigzag_mapping() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        for value in [0i64, 1, -1, 2, -2, i64::MAX, i64::MIN, 123_456, -654_321] {
            assert_eq!(zigzag_decode(zigzag_encode(value)), value);
        }
    }
}
