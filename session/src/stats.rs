//! Read-only connection counters.

/// Aggregate counters for one connection, updated as packages flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Packages sent, fragments included.
    pub packages_sent: u64,
    /// Bytes handed to the transport.
    pub bytes_sent: u64,
    /// Packages accepted from the peer.
    pub packages_received: u64,
    /// Bytes received from the transport.
    pub bytes_received: u64,
    /// Own packages the peer never acknowledged.
    pub packages_lost: u64,
    /// Peer packages counted lost by the receive window.
    pub incoming_lost: u64,
    /// Duplicate packages dropped.
    pub duplicates: u64,
    /// Stale packages dropped.
    pub stale: u64,
    /// Packages accepted out of order.
    pub out_of_order: u64,
    /// Keepalive-only sends while choked.
    pub choked_sends: u64,
    /// Duplicate fragments dropped during reassembly.
    pub duplicate_fragments: u64,
    /// Reliable events re-queued after loss.
    pub events_resent: u64,
    /// Packages dropped for malformed content.
    pub malformed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_zeroed() {
        let stats = ConnectionStats::default();
        assert_eq!(stats.packages_sent, 0);
        assert_eq!(stats.events_resent, 0);
    }
}
