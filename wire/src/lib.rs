//! Package framing, sequencing, fragmentation, and acknowledgment tracking
//! for repnet.
//!
//! This crate is the transport-adjacent layer: it knows about package
//! headers, 16-bit wire sequences, the ack mask, fragments, and outstanding
//! package bookkeeping, but nothing about schemas, snapshots, or entities.
//!
//! # Design Principles
//!
//! - **Fixed-size state** - Every structure here is a bounded ring or a
//!   small counter set; nothing grows with uptime.
//! - **Exactly-once resolution** - A tracked package resolves as delivered
//!   or lost precisely once, however acks arrive.
//! - **Degrade, don't fail** - Stale, duplicate, and overflow conditions
//!   are counted and dropped, never surfaced as connection errors.

mod ack;
mod error;
mod fragment;
mod header;
mod limits;
mod seqbuf;
mod sequence;
mod window;

pub use ack::{OutstandingRing, PackageFate};
pub use error::{WireError, WireResult};
pub use fragment::{fragment_header, split, FragmentAssembler};
pub use header::{carries_rtt, ContentFlags, FragmentHeader, PackageHeader, RTT_SAMPLE_INTERVAL};
pub use limits::{
    fragment_threshold, ACK_MASK_BITS, CLIENT_ACK_CACHE_SIZE, COMMAND_BUFFER_SIZE, DEFAULT_MTU,
    FRAGMENT_HEADROOM, MAX_FRAGMENTS, OUTSTANDING_PACKAGES, SNAPSHOT_CACHE_SIZE,
};
pub use seqbuf::SequenceBuffer;
pub use sequence::{from_wire, to_wire};
pub use window::{PackageClass, ReceiveWindow};
