//! A fixed-size ring mapping sequence numbers to per-package state.

/// A ring of `capacity` slots indexed by sequence number modulo capacity.
///
/// Inserting a sequence whose slot is occupied by an older sequence evicts
/// the older entry and returns it; the caller decides what eviction means
/// (usually: treat as lost).
#[derive(Debug)]
pub struct SequenceBuffer<T> {
    slots: Vec<Option<(u32, T)>>,
    len: usize,
}

impl<T> SequenceBuffer<T> {
    /// Creates a buffer with `capacity` slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots, len: 0 }
    }

    /// Returns the slot capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of occupied slots.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true when no slot is occupied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true when every slot is occupied.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    fn slot(&self, sequence: u32) -> usize {
        sequence as usize % self.slots.len()
    }

    /// Inserts state for `sequence`, returning any evicted older entry.
    pub fn insert(&mut self, sequence: u32, value: T) -> Option<(u32, T)> {
        let slot = self.slot(sequence);
        let evicted = self.slots[slot].take();
        if evicted.is_none() {
            self.len += 1;
        }
        self.slots[slot] = Some((sequence, value));
        evicted
    }

    /// Returns the state stored for exactly `sequence`.
    #[must_use]
    pub fn get(&self, sequence: u32) -> Option<&T> {
        match &self.slots[self.slot(sequence)] {
            Some((seq, value)) if *seq == sequence => Some(value),
            _ => None,
        }
    }

    /// Returns mutable state stored for exactly `sequence`.
    pub fn get_mut(&mut self, sequence: u32) -> Option<&mut T> {
        let slot = self.slot(sequence);
        match &mut self.slots[slot] {
            Some((seq, value)) if *seq == sequence => Some(value),
            _ => None,
        }
    }

    /// Removes and returns the state stored for exactly `sequence`.
    pub fn remove(&mut self, sequence: u32) -> Option<T> {
        let slot = self.slot(sequence);
        match &self.slots[slot] {
            Some((seq, _)) if *seq == sequence => {
                self.len -= 1;
                self.slots[slot].take().map(|(_, value)| value)
            }
            _ => None,
        }
    }

    /// Returns the oldest occupied sequence.
    #[must_use]
    pub fn oldest_sequence(&self) -> Option<u32> {
        self.slots
            .iter()
            .flatten()
            .map(|(seq, _)| *seq)
            .min()
    }

    /// Iterates occupied entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots
            .iter()
            .flatten()
            .map(|(seq, value)| (*seq, value))
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove() {
        let mut buffer = SequenceBuffer::with_capacity(8);
        assert!(buffer.is_empty());
        assert_eq!(buffer.insert(3, "a"), None);
        assert_eq!(buffer.insert(5, "b"), None);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.get(3), Some(&"a"));
        assert_eq!(buffer.get(11), None);
        assert_eq!(buffer.remove(3), Some("a"));
        assert_eq!(buffer.get(3), None);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn wrapping_sequence_evicts() {
        let mut buffer = SequenceBuffer::with_capacity(8);
        buffer.insert(3, "old");
        // Sequence 11 shares slot 3.
        assert_eq!(buffer.insert(11, "new"), Some((3, "old")));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.get(3), None);
        assert_eq!(buffer.get(11), Some(&"new"));
    }

    #[test]
    fn oldest_and_full() {
        let mut buffer = SequenceBuffer::with_capacity(4);
        for seq in 10..14 {
            buffer.insert(seq, seq);
        }
        assert!(buffer.is_full());
        assert_eq!(buffer.oldest_sequence(), Some(10));
        buffer.remove(10);
        assert_eq!(buffer.oldest_sequence(), Some(11));
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
