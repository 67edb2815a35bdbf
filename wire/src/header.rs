//! Package header encoding and decoding.
//!
//! Every package starts with a one-byte content-flags field, the sender's
//! sequence, and the ack pair. An RTT sample byte rides along on every third
//! sequence, and fragmented packages carry a small sub-header describing
//! their place in the original package.

use crate::error::{WireError, WireResult};

/// Content-flags byte. Bit positions are shared between directions and
/// reinterpreted: bit 1 is client-info server to client and client-config
/// client to server; bit 2 is map-info server to client and commands client
/// to server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContentFlags(u8);

impl ContentFlags {
    /// Events block present.
    pub const EVENTS: u8 = 0x01;
    /// Client-info block (server to client).
    pub const CLIENT_INFO: u8 = 0x02;
    /// Client-config block (client to server).
    pub const CLIENT_CONFIG: u8 = 0x02;
    /// Map-info block (server to client).
    pub const MAP_INFO: u8 = 0x04;
    /// Commands block (client to server).
    pub const COMMANDS: u8 = 0x04;
    /// Snapshot block (server to client).
    pub const SNAPSHOT: u8 = 0x08;
    /// Snapshot-ack block (client to server): the newest snapshot tick the
    /// client has fully processed.
    pub const SNAPSHOT_ACK: u8 = 0x10;
    /// This package is a fragment of a larger one.
    pub const FRAGMENT: u8 = 0x80;

    /// Creates empty flags.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Creates flags from a raw byte.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    /// Returns the raw byte.
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Returns these flags with `bit` set.
    #[must_use]
    pub const fn with(self, bit: u8) -> Self {
        Self(self.0 | bit)
    }

    /// Returns true if `bit` is set.
    #[must_use]
    pub const fn contains(self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    /// Returns true when no bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Sub-header carried by each fragment of an oversized package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentHeader {
    /// Sequence of the original, unfragmented package.
    pub original_sequence: u16,
    /// This fragment's index.
    pub index: u8,
    /// Total fragment count.
    pub count: u8,
    /// This fragment's payload size in bytes.
    pub size: u16,
}

/// Decoded package header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageHeader {
    /// Content flags.
    pub flags: ContentFlags,
    /// Sender's wire sequence.
    pub sequence: u16,
    /// Highest sequence of ours the sender has seen.
    pub ack_sequence: u16,
    /// Receipt bits for the 16 sequences before `ack_sequence`.
    pub ack_mask: u16,
    /// RTT sample in milliseconds, present on every third sequence.
    pub rtt: Option<u8>,
    /// Fragment sub-header, present when the fragment flag is set.
    pub fragment: Option<FragmentHeader>,
}

/// Sequences between RTT sample bytes.
pub const RTT_SAMPLE_INTERVAL: u16 = 3;

/// Returns true when a package with this sequence carries an RTT byte.
#[must_use]
pub const fn carries_rtt(sequence: u16) -> bool {
    sequence % RTT_SAMPLE_INTERVAL == 0
}

impl PackageHeader {
    /// Fixed header bytes before the optional RTT and fragment parts.
    pub const BASE_SIZE: usize = 7;

    /// Bytes of the fragment sub-header.
    pub const FRAGMENT_SIZE: usize = 6;

    /// Appends the encoded header to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.flags.raw());
        out.extend_from_slice(&self.sequence.to_le_bytes());
        out.extend_from_slice(&self.ack_sequence.to_le_bytes());
        out.extend_from_slice(&self.ack_mask.to_le_bytes());
        if carries_rtt(self.sequence) {
            out.push(self.rtt.unwrap_or(0));
        }
        if let Some(fragment) = &self.fragment {
            out.extend_from_slice(&fragment.original_sequence.to_le_bytes());
            out.push(fragment.index);
            out.push(fragment.count);
            out.extend_from_slice(&fragment.size.to_le_bytes());
        }
    }

    /// Decodes a header, returning it and the bytes consumed.
    pub fn decode(data: &[u8]) -> WireResult<(Self, usize)> {
        if data.len() < Self::BASE_SIZE {
            return Err(WireError::TruncatedHeader {
                needed: Self::BASE_SIZE,
                available: data.len(),
            });
        }
        let flags = ContentFlags::from_raw(data[0]);
        let sequence = u16::from_le_bytes([data[1], data[2]]);
        let ack_sequence = u16::from_le_bytes([data[3], data[4]]);
        let ack_mask = u16::from_le_bytes([data[5], data[6]]);
        let mut offset = Self::BASE_SIZE;

        let rtt = if carries_rtt(sequence) {
            let byte = *data.get(offset).ok_or(WireError::TruncatedHeader {
                needed: offset + 1,
                available: data.len(),
            })?;
            offset += 1;
            Some(byte)
        } else {
            None
        };

        let fragment = if flags.contains(ContentFlags::FRAGMENT) {
            if data.len() < offset + Self::FRAGMENT_SIZE {
                return Err(WireError::TruncatedHeader {
                    needed: offset + Self::FRAGMENT_SIZE,
                    available: data.len(),
                });
            }
            let header = FragmentHeader {
                original_sequence: u16::from_le_bytes([data[offset], data[offset + 1]]),
                index: data[offset + 2],
                count: data[offset + 3],
                size: u16::from_le_bytes([data[offset + 4], data[offset + 5]]),
            };
            offset += Self::FRAGMENT_SIZE;
            Some(header)
        } else {
            None
        };

        Ok((
            Self {
                flags,
                sequence,
                ack_sequence,
                ack_mask,
                rtt,
                fragment,
            },
            offset,
        ))
    }
}
