//! Client/server replication sessions for repnet.
//!
//! This crate ties the lower layers together: [`Server`] owns the
//! authoritative world and generates per-client delta snapshots; [`Client`]
//! mirrors the replicated entity set and feeds commands back. Both sides
//! run over any datagram [`Transport`] and tolerate loss, duplication, and
//! reordering without retransmitting state.
//!
//! # Design Principles
//!
//! - **State over messages** - Entity state is never retransmitted; a lost
//!   snapshot just means the next delta reaches further back.
//! - **Self-describing wire** - Schemas, the entropy model, and the map
//!   announcement all travel in-band; a stock client can join any server
//!   with a matching command layout.
//! - **Polled, not called back** - Each update call returns the events that
//!   occurred; the session never calls into the game outside `update`.

mod client;
mod commands;
mod config;
mod connection;
mod context;
mod error;
mod events;
mod server;
mod stats;
mod traits;
mod transport;

pub use client::{Client, ClientEvent, ClientState};
pub use config::{Config, PROTOCOL_VERSION};
pub use error::{SessionError, SessionResult};
pub use events::Event;
pub use server::{Server, ServerEvent};
pub use stats::ConnectionStats;
pub use traits::{
    CommandProcessor, ConnectionId, EntityId, SnapshotConsumer, SnapshotGenerator, Transport,
};
pub use transport::{LoopbackEndpoint, LoopbackLink};
