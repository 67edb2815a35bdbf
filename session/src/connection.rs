//! Shared per-connection package pump.
//!
//! Client and server both drive an [`Endpoint`]: it owns the sequence
//! counters, the receive window, the outstanding-package ring, fragment
//! reassembly, RTT estimation, and the choke state. Content blocks are the
//! caller's business; the endpoint deals in framed packages only.

use bitio::{CompressionModel, StreamMode};
use wire::{
    carries_rtt, fragment_header, fragment_threshold, from_wire, split, to_wire, ContentFlags,
    FragmentAssembler, OutstandingRing, PackageClass, PackageFate, PackageHeader, ReceiveWindow,
};

use crate::context::MODEL_CONTEXTS;
use crate::error::SessionResult;
use crate::events::Event;
use crate::stats::ConnectionStats;
use crate::traits::Transport;

const RTT_GAIN: f32 = 0.125;

/// What a sent package carried, kept until the package resolves.
///
/// Handed back exactly once per package so reliable content can be
/// re-queued on loss and per-connection ack state advanced on delivery.
#[derive(Debug, Clone, Default)]
pub(crate) struct PackageSummary {
    /// Send time, for RTT samples.
    pub sent_ms: u64,
    /// Reliable events that ride only in this package.
    pub reliable_events: Vec<Event>,
    /// Event type ids whose schema was attached.
    pub event_schema_types: Vec<u16>,
    /// Entity type ids whose schema was attached.
    pub entity_schema_types: Vec<u16>,
    /// Highest command tick included, for client-side pruning.
    pub max_command_tick: Option<u64>,
    /// Carried the client-info handshake block.
    pub client_info: bool,
    /// Carried the map-info block.
    pub map_info: bool,
}

/// One resolved outgoing package.
#[derive(Debug)]
pub(crate) struct Resolution {
    pub summary: PackageSummary,
    pub fate: PackageFate,
}

/// An accepted incoming package, reassembled if it was fragmented.
#[derive(Debug)]
pub(crate) struct Received {
    pub flags: ContentFlags,
    pub body: Vec<u8>,
}

/// Sequencing, ack, and framing state for one connection.
#[derive(Debug)]
pub(crate) struct Endpoint {
    out_sequence: u32,
    window: ReceiveWindow,
    outstanding: OutstandingRing<PackageSummary>,
    assembler: FragmentAssembler,
    /// Entropy coding for post-handshake package bodies.
    pub mode: StreamMode,
    /// Model both peers agreed on; uniform until the handshake replaces it.
    pub model: CompressionModel,
    mtu: usize,
    rtt_ms: f32,
    peer_rtt_ms: u8,
    choked: bool,
    pub last_received_ms: u64,
    pub last_sent_ms: u64,
    pub stats: ConnectionStats,
}

impl Endpoint {
    pub fn new(mtu: usize, now_ms: u64) -> Self {
        Self {
            out_sequence: 0,
            window: ReceiveWindow::new(),
            outstanding: OutstandingRing::new(),
            assembler: FragmentAssembler::new(),
            mode: StreamMode::Raw,
            model: CompressionModel::uniform(MODEL_CONTEXTS),
            mtu,
            rtt_ms: 0.0,
            peer_rtt_ms: 0,
            choked: false,
            last_received_ms: now_ms,
            last_sent_ms: 0,
            stats: ConnectionStats::default(),
        }
    }

    /// Smoothed round-trip estimate in milliseconds.
    pub fn rtt_ms(&self) -> f32 {
        self.rtt_ms
    }

    /// The peer's last reported RTT estimate.
    pub const fn peer_rtt_ms(&self) -> u8 {
        self.peer_rtt_ms
    }

    /// True while the outstanding ring is saturated and only keepalives
    /// should be sent.
    pub const fn choked(&self) -> bool {
        self.choked
    }

    /// Stream mode for a package body with the given flags. Handshake
    /// blocks are always raw; the receiver may not hold the model yet.
    pub fn body_mode(&self, flags: ContentFlags) -> StreamMode {
        if flags.contains(ContentFlags::CLIENT_INFO) {
            StreamMode::Raw
        } else {
            self.mode
        }
    }

    /// Frames and sends one package, fragmenting when it exceeds the MTU
    /// headroom. Returns the package's sequence.
    pub fn send(
        &mut self,
        flags: ContentFlags,
        body: &[u8],
        mut summary: PackageSummary,
        transport: &mut dyn Transport,
        now_ms: u64,
        resolutions: &mut Vec<Resolution>,
    ) -> SessionResult<u32> {
        while self.outstanding.is_full() {
            if let Some((_, summary)) = self.outstanding.retire_oldest() {
                self.stats.packages_lost += 1;
                resolutions.push(Resolution {
                    summary,
                    fate: PackageFate::Lost,
                });
            }
            self.choked = true;
        }

        summary.sent_ms = now_ms;
        self.out_sequence += 1;
        let sequence = self.out_sequence;
        let mut package = Vec::with_capacity(PackageHeader::BASE_SIZE + body.len());
        self.header(flags, sequence, None).encode(&mut package);
        package.extend_from_slice(body);

        let threshold = fragment_threshold(self.mtu);
        if package.len() > threshold {
            let fragments = split(&package, threshold)?;
            for index in 0..fragments.len() {
                let sub = fragment_header(to_wire(sequence), index, &fragments);
                self.out_sequence += 1;
                let fragment_sequence = self.out_sequence;
                let mut datagram = Vec::with_capacity(
                    PackageHeader::BASE_SIZE + PackageHeader::FRAGMENT_SIZE + fragments[index].len(),
                );
                self.header(
                    ContentFlags::empty().with(ContentFlags::FRAGMENT),
                    fragment_sequence,
                    Some(sub),
                )
                .encode(&mut datagram);
                datagram.extend_from_slice(fragments[index]);
                self.stats.packages_sent += 1;
                self.stats.bytes_sent += datagram.len() as u64;
                transport.send(&datagram);
                // Fragments carry no content of their own; an empty summary
                // keeps their loss from re-triggering anything.
                if let Some((_, evicted)) = self.outstanding.track(fragment_sequence, PackageSummary::default()) {
                    self.stats.packages_lost += 1;
                    resolutions.push(Resolution {
                        summary: evicted,
                        fate: PackageFate::Lost,
                    });
                }
            }
        } else {
            self.stats.packages_sent += 1;
            self.stats.bytes_sent += package.len() as u64;
            transport.send(&package);
        }

        if let Some((_, evicted)) = self.outstanding.track(sequence, summary) {
            self.stats.packages_lost += 1;
            resolutions.push(Resolution {
                summary: evicted,
                fate: PackageFate::Lost,
            });
        }
        self.last_sent_ms = now_ms;
        Ok(sequence)
    }

    /// Processes one received datagram. Ack and RTT state always advance;
    /// `Some` is returned only for packages whose content should be parsed.
    pub fn receive(
        &mut self,
        datagram: &[u8],
        now_ms: u64,
        resolutions: &mut Vec<Resolution>,
    ) -> Option<Received> {
        self.stats.bytes_received += datagram.len() as u64;
        let mut data = datagram.to_vec();
        loop {
            let Ok((header, consumed)) = PackageHeader::decode(&data) else {
                self.stats.malformed += 1;
                return None;
            };

            let ack_sequence = from_wire(header.ack_sequence, self.out_sequence);
            self.resolve_acks(ack_sequence, header.ack_mask, now_ms, resolutions);
            if let Some(rtt) = header.rtt {
                self.peer_rtt_ms = rtt;
            }
            if self.choked && !self.outstanding.is_full() {
                self.choked = false;
            }

            let reference = self.window.ack_sequence().unwrap_or(0);
            let sequence = from_wire(header.sequence, reference);
            match self.window.process(sequence) {
                PackageClass::New { lost } => {
                    self.stats.packages_received += 1;
                    self.stats.incoming_lost += u64::from(lost);
                }
                PackageClass::OutOfOrder => {
                    self.stats.packages_received += 1;
                    self.stats.out_of_order += 1;
                }
                PackageClass::Duplicate => {
                    self.stats.duplicates += 1;
                    return None;
                }
                PackageClass::Stale => {
                    self.stats.stale += 1;
                    return None;
                }
            }
            self.last_received_ms = now_ms;

            let Some(fragment) = header.fragment else {
                return Some(Received {
                    flags: header.flags,
                    body: data[consumed..].to_vec(),
                });
            };
            match self.assembler.insert(&fragment, &data[consumed..]) {
                Ok(Some(original)) => {
                    // The original package goes back through framing; its
                    // own sequence settles ordering and dedup.
                    self.stats.duplicate_fragments = self.assembler.duplicates();
                    data = original;
                }
                Ok(None) => {
                    self.stats.duplicate_fragments = self.assembler.duplicates();
                    return None;
                }
                Err(_) => {
                    self.stats.malformed += 1;
                    return None;
                }
            }
        }
    }

    fn resolve_acks(
        &mut self,
        ack_sequence: u32,
        ack_mask: u16,
        now_ms: u64,
        resolutions: &mut Vec<Resolution>,
    ) {
        let mut delivered_samples = Vec::new();
        let mut lost = 0u64;
        self.outstanding
            .process_acks(ack_sequence, ack_mask, |_sequence, summary, fate| {
                match fate {
                    PackageFate::Delivered => delivered_samples.push(summary.sent_ms),
                    PackageFate::Lost => lost += 1,
                }
                resolutions.push(Resolution { summary, fate });
            });
        self.stats.packages_lost += lost;
        for sent_ms in delivered_samples {
            let sample = now_ms.saturating_sub(sent_ms) as f32;
            if self.rtt_ms == 0.0 {
                self.rtt_ms = sample;
            } else {
                self.rtt_ms += (sample - self.rtt_ms) * RTT_GAIN;
            }
        }
    }

    fn header(&self, flags: ContentFlags, sequence: u32, fragment: Option<wire::FragmentHeader>) -> PackageHeader {
        let wire_sequence = to_wire(sequence);
        let flags = if fragment.is_some() {
            flags.with(ContentFlags::FRAGMENT)
        } else {
            flags
        };
        PackageHeader {
            flags,
            sequence: wire_sequence,
            ack_sequence: to_wire(self.window.ack_sequence().unwrap_or(0)),
            ack_mask: self.window.ack_mask(),
            rtt: carries_rtt(wire_sequence).then(|| self.rtt_ms.min(255.0) as u8),
            fragment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackLink;

    fn pump(
        from: &mut Endpoint,
        to: &mut Endpoint,
        tx: &mut dyn Transport,
        rx: &mut dyn Transport,
        body: &[u8],
        now: u64,
    ) -> Option<Received> {
        let mut resolutions = Vec::new();
        from.send(
            ContentFlags::empty().with(ContentFlags::EVENTS),
            body,
            PackageSummary::default(),
            tx,
            now,
            &mut resolutions,
        )
        .unwrap();
        let datagram = rx.recv()?;
        to.receive(&datagram, now, &mut resolutions)
    }

    #[test]
    fn body_roundtrips_through_framing() {
        let link = LoopbackLink::new();
        let (mut ta, mut tb) = link.endpoints();
        let mut a = Endpoint::new(wire::DEFAULT_MTU, 0);
        let mut b = Endpoint::new(wire::DEFAULT_MTU, 0);

        let received = pump(&mut a, &mut b, &mut ta, &mut tb, b"hello", 10).unwrap();
        assert_eq!(received.body, b"hello");
        assert!(received.flags.contains(ContentFlags::EVENTS));
        assert_eq!(b.stats.packages_received, 1);
    }

    #[test]
    fn oversized_package_fragments_and_reassembles() {
        let link = LoopbackLink::new();
        let (mut ta, mut tb) = link.endpoints();
        let mut a = Endpoint::new(wire::DEFAULT_MTU, 0);
        let mut b = Endpoint::new(wire::DEFAULT_MTU, 0);

        let body: Vec<u8> = (0..4000u32).map(|i| i as u8).collect();
        let mut resolutions = Vec::new();
        a.send(
            ContentFlags::empty().with(ContentFlags::SNAPSHOT),
            &body,
            PackageSummary::default(),
            &mut ta,
            0,
            &mut resolutions,
        )
        .unwrap();
        assert!(a.stats.packages_sent > 1);

        let mut received = None;
        while let Some(datagram) = tb.recv() {
            if let Some(package) = b.receive(&datagram, 0, &mut resolutions) {
                received = Some(package);
            }
        }
        let received = received.unwrap();
        assert_eq!(received.body, body);
        assert!(received.flags.contains(ContentFlags::SNAPSHOT));
    }

    #[test]
    fn duplicate_datagrams_are_dropped() {
        let link = LoopbackLink::new();
        link.set_duplicate_a_to_b(vec![true]);
        let (mut ta, mut tb) = link.endpoints();
        let mut a = Endpoint::new(wire::DEFAULT_MTU, 0);
        let mut b = Endpoint::new(wire::DEFAULT_MTU, 0);
        let mut resolutions = Vec::new();

        a.send(
            ContentFlags::empty(),
            b"x",
            PackageSummary::default(),
            &mut ta,
            0,
            &mut resolutions,
        )
        .unwrap();
        assert!(b.receive(&tb.recv().unwrap(), 0, &mut resolutions).is_some());
        assert!(b.receive(&tb.recv().unwrap(), 0, &mut resolutions).is_none());
        assert_eq!(b.stats.duplicates, 1);
    }

    #[test]
    fn delivery_resolves_and_samples_rtt() {
        let link = LoopbackLink::new();
        let (mut ta, mut tb) = link.endpoints();
        let mut a = Endpoint::new(wire::DEFAULT_MTU, 0);
        let mut b = Endpoint::new(wire::DEFAULT_MTU, 0);
        let mut resolutions = Vec::new();

        let summary = PackageSummary {
            max_command_tick: Some(42),
            ..PackageSummary::default()
        };
        a.send(ContentFlags::empty(), b"x", summary, &mut ta, 100, &mut resolutions)
            .unwrap();
        b.receive(&tb.recv().unwrap(), 110, &mut resolutions).unwrap();

        // The reply's header acks a's package.
        b.send(
            ContentFlags::empty(),
            b"y",
            PackageSummary::default(),
            &mut tb,
            110,
            &mut resolutions,
        )
        .unwrap();
        resolutions.clear();
        a.receive(&ta.recv().unwrap(), 140, &mut resolutions).unwrap();

        assert_eq!(resolutions.len(), 1);
        let resolution = &resolutions[0];
        assert_eq!(resolution.fate, PackageFate::Delivered);
        assert_eq!(resolution.summary.max_command_tick, Some(42));
        assert!((a.rtt_ms() - 40.0).abs() < f32::EPSILON);
    }

    #[test]
    fn full_ring_chokes_and_acks_release() {
        let link = LoopbackLink::new();
        let (mut ta, _tb) = link.endpoints();
        let mut a = Endpoint::new(wire::DEFAULT_MTU, 0);
        let mut resolutions = Vec::new();

        for i in 0..wire::OUTSTANDING_PACKAGES as u64 + 3 {
            a.send(
                ContentFlags::empty(),
                b"x",
                PackageSummary::default(),
                &mut ta,
                i,
                &mut resolutions,
            )
            .unwrap();
        }
        assert!(a.choked());
        assert_eq!(a.stats.packages_lost, 3);
        assert_eq!(resolutions.len(), 3);
    }
}
