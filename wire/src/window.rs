//! Receive-side sequence window and loss accounting.

/// Classification of an incoming package sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageClass {
    /// Advances the window; `lost` sequences were skipped to get here.
    New {
        /// Sequences skipped between the previous head and this one.
        lost: u32,
    },
    /// Behind the head but inside the 16-sequence window and not yet seen.
    OutOfOrder,
    /// Already recorded.
    Duplicate,
    /// Behind the head by more than the window covers.
    Stale,
}

/// Tracks which of the peer's recent sequences arrived.
///
/// Skipped sequences are counted lost immediately when the head advances; a
/// late out-of-order arrival recovers its loss. The window's head and mask
/// feed the ack fields of every outgoing package.
#[derive(Debug, Default)]
pub struct ReceiveWindow {
    head: Option<u32>,
    mask: u16,
    received: u64,
    lost: u64,
    duplicates: u64,
    stale: u64,
    out_of_order: u64,
}

impl ReceiveWindow {
    /// Creates an empty window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest accepted sequence, the ack sequence for outgoing packages.
    #[must_use]
    pub const fn ack_sequence(&self) -> Option<u32> {
        self.head
    }

    /// Receipt bits for the 16 sequences before the head.
    #[must_use]
    pub const fn ack_mask(&self) -> u16 {
        self.mask
    }

    /// Packages accepted (new or out of order).
    #[must_use]
    pub const fn received(&self) -> u64 {
        self.received
    }

    /// Sequences currently counted as lost.
    #[must_use]
    pub const fn lost(&self) -> u64 {
        self.lost
    }

    /// Duplicate packages dropped.
    #[must_use]
    pub const fn duplicates(&self) -> u64 {
        self.duplicates
    }

    /// Stale packages dropped.
    #[must_use]
    pub const fn stale(&self) -> u64 {
        self.stale
    }

    /// Packages accepted behind the head.
    #[must_use]
    pub const fn out_of_order(&self) -> u64 {
        self.out_of_order
    }

    /// Classifies and records an incoming (already widened) sequence.
    pub fn process(&mut self, sequence: u32) -> PackageClass {
        let Some(head) = self.head else {
            self.head = Some(sequence);
            self.mask = 0;
            self.received += 1;
            return PackageClass::New { lost: 0 };
        };

        if sequence > head {
            let advance = sequence - head;
            self.mask = if advance >= 17 {
                0
            } else {
                (((u32::from(self.mask) << advance) | (1u32 << (advance - 1))) & 0xFFFF) as u16
            };
            self.head = Some(sequence);
            let skipped = advance - 1;
            self.lost += u64::from(skipped);
            self.received += 1;
            return PackageClass::New { lost: skipped };
        }

        if sequence == head {
            self.duplicates += 1;
            return PackageClass::Duplicate;
        }

        let behind = head - sequence;
        if behind > 16 {
            self.stale += 1;
            return PackageClass::Stale;
        }
        let bit = 1u16 << (behind - 1);
        if self.mask & bit != 0 {
            self.duplicates += 1;
            return PackageClass::Duplicate;
        }
        self.mask |= bit;
        self.out_of_order += 1;
        self.received += 1;
        // Recovered a sequence provisionally counted lost.
        self.lost = self.lost.saturating_sub(1);
        PackageClass::OutOfOrder
    }
}
