//! Protocol constants shared by both peers.

/// Unacknowledged packages tracked per connection before choking.
pub const OUTSTANDING_PACKAGES: usize = 64;

/// Server ticks of entity snapshot history retained for delta baselines.
pub const SNAPSHOT_CACHE_SIZE: usize = 128;

/// Snapshot ticks of per-entity baseline history retained client-side.
pub const CLIENT_ACK_CACHE_SIZE: usize = 128;

/// Commands buffered client-side awaiting acknowledgment.
pub const COMMAND_BUFFER_SIZE: usize = 32;

/// Sequences covered by the 16-bit ack mask, exclusive of the ack sequence.
pub const ACK_MASK_BITS: u32 = 16;

/// Maximum fragments one package may split into.
pub const MAX_FRAGMENTS: usize = 16;

/// Bytes reserved below the transport MTU for headers and transport
/// framing; packages larger than `mtu - FRAGMENT_HEADROOM` are fragmented.
pub const FRAGMENT_HEADROOM: usize = 128;

/// Default transport MTU assumed when the caller supplies none.
pub const DEFAULT_MTU: usize = 1280;

/// Returns the largest package body that fits unfragmented under `mtu`.
#[must_use]
pub const fn fragment_threshold(mtu: usize) -> usize {
    mtu.saturating_sub(FRAGMENT_HEADROOM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_reserves_headroom() {
        assert_eq!(fragment_threshold(DEFAULT_MTU), 1152);
        assert_eq!(fragment_threshold(64), 0);
    }
}
