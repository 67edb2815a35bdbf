//! Send-side outstanding-package tracking and ack resolution.

use crate::limits::{ACK_MASK_BITS, OUTSTANDING_PACKAGES};
use crate::seqbuf::SequenceBuffer;

/// Terminal fate of a tracked package, reported exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageFate {
    /// The peer acknowledged receipt.
    Delivered,
    /// The package fell out of the ack window or its ring slot.
    Lost,
}

/// Ring of not-yet-acknowledged outgoing packages.
///
/// Each entry carries the caller's content summary for the package; the
/// summary is handed back exactly once, when the package is resolved as
/// delivered or lost. A full ring signals choke: the caller retires the
/// oldest entry as lost and falls back to keepalives.
#[derive(Debug)]
pub struct OutstandingRing<T> {
    slots: SequenceBuffer<T>,
}

impl<T> Default for OutstandingRing<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OutstandingRing<T> {
    /// Creates a ring with [`OUTSTANDING_PACKAGES`] slots.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: SequenceBuffer::with_capacity(OUTSTANDING_PACKAGES),
        }
    }

    /// Returns the number of tracked packages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true when nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns true when the ring cannot track another package.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.slots.is_full()
    }

    /// Tracks a sent package. If the sequence's slot was still occupied by
    /// an older package, that package is returned and must be treated as
    /// lost.
    pub fn track(&mut self, sequence: u32, summary: T) -> Option<(u32, T)> {
        self.slots.insert(sequence, summary)
    }

    /// Retires the oldest tracked package, for choke recovery.
    pub fn retire_oldest(&mut self) -> Option<(u32, T)> {
        let oldest = self.slots.oldest_sequence()?;
        self.slots.remove(oldest).map(|summary| (oldest, summary))
    }

    /// Resolves tracked packages against a received ack pair.
    ///
    /// `ack_sequence` is the peer's highest received sequence of ours;
    /// `ack_mask` bit `i` covers `ack_sequence - 1 - i`. Sequences older
    /// than the mask window resolve as lost; newer ones stay tracked.
    pub fn process_acks(
        &mut self,
        ack_sequence: u32,
        ack_mask: u16,
        mut visit: impl FnMut(u32, T, PackageFate),
    ) {
        let pending: Vec<u32> = self
            .slots
            .iter()
            .map(|(sequence, _)| sequence)
            .filter(|&sequence| sequence <= ack_sequence)
            .collect();
        for sequence in pending {
            let distance = ack_sequence - sequence;
            let fate = if distance == 0 {
                Some(PackageFate::Delivered)
            } else if distance <= ACK_MASK_BITS {
                if ack_mask & (1u16 << (distance - 1)) != 0 {
                    Some(PackageFate::Delivered)
                } else {
                    // Still inside the mask window; a later ack may cover it.
                    None
                }
            } else {
                Some(PackageFate::Lost)
            };
            if let Some(fate) = fate {
                if let Some(summary) = self.slots.remove(sequence) {
                    visit(sequence, summary, fate);
                }
            }
        }
    }
}
