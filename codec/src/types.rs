//! Small value types shared across the codec.

use schema::MAX_FIELDS;

/// A per-field bitmap sized for the largest allowed schema.
///
/// Crossing the wire it is split into 32-bit chunks, one packed integer per
/// chunk, so an all-zero bitmap stays cheap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeBitmap {
    bits: [u64; MAX_FIELDS / 64],
}

impl ChangeBitmap {
    /// Creates an empty bitmap.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bits: [0; MAX_FIELDS / 64],
        }
    }

    /// Sets the bit for `field`.
    pub fn set(&mut self, field: usize) {
        self.bits[field / 64] |= 1 << (field % 64);
    }

    /// Returns the bit for `field`.
    #[must_use]
    pub const fn get(&self, field: usize) -> bool {
        self.bits[field / 64] & (1 << (field % 64)) != 0
    }

    /// Returns true if no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&w| w == 0)
    }

    /// Returns the number of set bits.
    #[must_use]
    pub fn count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns the 32-bit wire chunk at `index`.
    #[must_use]
    pub const fn chunk(&self, index: usize) -> u32 {
        (self.bits[index / 2] >> ((index % 2) * 32)) as u32
    }

    /// Stores the 32-bit wire chunk at `index`.
    pub fn set_chunk(&mut self, index: usize, chunk: u32) {
        let shift = (index % 2) * 32;
        self.bits[index / 2] &= !(0xFFFF_FFFFu64 << shift);
        self.bits[index / 2] |= u64::from(chunk) << shift;
    }

    /// Returns this bitmap XORed with another.
    #[must_use]
    pub fn xor(&self, other: &Self) -> Self {
        let mut out = Self::new();
        for (i, word) in out.bits.iter_mut().enumerate() {
            *word = self.bits[i] ^ other.bits[i];
        }
        out
    }

    /// Returns the number of 32-bit chunks needed for `field_count` fields.
    #[must_use]
    pub const fn chunks_for(field_count: usize) -> usize {
        field_count.div_ceil(32)
    }
}

/// Running consistency hash over decoded field words.
///
/// Accumulates `hash = hash * 179 + word + 1` per word. String and bytes
/// fields are skipped, a known gap in desync detection coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotHash(u64);

impl SnapshotHash {
    /// Creates a zeroed hash.
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Folds one field word into the hash.
    pub fn mix(&mut self, word: u32) {
        self.0 = self
            .0
            .wrapping_mul(179)
            .wrapping_add(u64::from(word))
            .wrapping_add(1);
    }

    /// Returns the accumulated hash.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_set_get_chunks() {
        let mut bitmap = ChangeBitmap::new();
        assert!(bitmap.is_empty());
        bitmap.set(0);
        bitmap.set(33);
        bitmap.set(127);
        assert!(bitmap.get(0) && bitmap.get(33) && bitmap.get(127));
        assert!(!bitmap.get(1));
        assert_eq!(bitmap.count(), 3);
        assert_eq!(bitmap.chunk(0), 1);
        assert_eq!(bitmap.chunk(1), 2);
        assert_eq!(bitmap.chunk(3), 0x8000_0000);

        let mut restored = ChangeBitmap::new();
        for i in 0..4 {
            restored.set_chunk(i, bitmap.chunk(i));
        }
        assert_eq!(restored, bitmap);
    }

    #[test]
    fn bitmap_xor_cancels() {
        let mut a = ChangeBitmap::new();
        a.set(5);
        a.set(70);
        let b = a;
        assert!(a.xor(&b).is_empty());
        let mut c = ChangeBitmap::new();
        c.set(5);
        let d = a.xor(&c);
        assert!(!d.get(5));
        assert!(d.get(70));
    }

    #[test]
    fn chunk_counts() {
        assert_eq!(ChangeBitmap::chunks_for(1), 1);
        assert_eq!(ChangeBitmap::chunks_for(32), 1);
        assert_eq!(ChangeBitmap::chunks_for(33), 2);
        assert_eq!(ChangeBitmap::chunks_for(128), 4);
    }

    #[test]
    fn hash_formula() {
        let mut hash = SnapshotHash::new();
        hash.mix(10);
        assert_eq!(hash.value(), 11);
        hash.mix(0);
        assert_eq!(hash.value(), 11 * 179 + 1);
    }
}
