//! Error types for the connection layer.

use bitio::{BitError, ModelError};
use codec::CodecError;
use schema::SchemaError;
use std::fmt;
use wire::WireError;

/// Errors surfaced by client and server sessions.
///
/// Protocol violations disconnect the offending connection only; they are
/// never allowed to panic or to take down other connections.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    /// An underlying bit-level read or write failed.
    Bit(BitError),

    /// Schema construction or marshaling failed.
    Schema(SchemaError),

    /// Delta or prediction coding failed.
    Codec(CodecError),

    /// Package framing or reassembly failed.
    Wire(WireError),

    /// The handshake model blob could not be restored.
    Model(ModelError),

    /// The peer speaks a different protocol version.
    ProtocolVersion {
        /// Our version.
        ours: u16,
        /// The peer's version.
        theirs: u16,
    },

    /// The peer's command schema layout disagrees with ours.
    CommandSchemaMismatch {
        /// Our layout hash.
        ours: u64,
        /// The peer's layout hash.
        theirs: u64,
    },

    /// The debug consistency hash diverged between peers.
    SnapshotHashMismatch {
        /// Snapshot tick.
        tick: u64,
        /// Hash computed locally.
        computed: u64,
        /// Hash the sender reported.
        reported: u64,
    },

    /// A snapshot referenced an entity type this end never learned.
    UnknownEntityType {
        /// The unknown type id.
        type_id: u16,
    },

    /// An event referenced a type whose schema was never received.
    UnknownEventType {
        /// The unknown event type id.
        type_id: u16,
    },

    /// A snapshot referenced an entity this end does not hold.
    UnknownEntity {
        /// The unknown entity id.
        entity_id: u32,
    },

    /// A snapshot named a baseline tick this end no longer retains.
    MissingBaseline {
        /// Entity the baseline was for.
        entity_id: u32,
        /// The missing tick.
        tick: u64,
    },

    /// A block field decoded to a value outside the bounds the protocol
    /// allows.
    MalformedBlock {
        /// The offending field.
        what: &'static str,
    },

    /// The server refused the connection.
    ConnectionRefused {
        /// Human-readable refusal reason.
        reason: &'static str,
    },

    /// An operation required a connected session.
    NotConnected,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bit(err) => write!(f, "bit-level error: {err}"),
            Self::Schema(err) => write!(f, "schema error: {err}"),
            Self::Codec(err) => write!(f, "codec error: {err}"),
            Self::Wire(err) => write!(f, "wire error: {err}"),
            Self::Model(err) => write!(f, "compression model error: {err}"),
            Self::ProtocolVersion { ours, theirs } => {
                write!(f, "protocol version mismatch: ours {ours}, peer {theirs}")
            }
            Self::CommandSchemaMismatch { ours, theirs } => write!(
                f,
                "command schema mismatch: ours {ours:#018x}, peer {theirs:#018x}"
            ),
            Self::SnapshotHashMismatch {
                tick,
                computed,
                reported,
            } => write!(
                f,
                "snapshot hash mismatch at tick {tick}: computed {computed:#x}, reported {reported:#x}"
            ),
            Self::UnknownEntityType { type_id } => write!(f, "unknown entity type {type_id}"),
            Self::UnknownEventType { type_id } => write!(f, "unknown event type {type_id}"),
            Self::UnknownEntity { entity_id } => write!(f, "unknown entity {entity_id}"),
            Self::MissingBaseline { entity_id, tick } => {
                write!(f, "missing baseline tick {tick} for entity {entity_id}")
            }
            Self::MalformedBlock { what } => {
                write!(f, "malformed package: {what} out of range")
            }
            Self::ConnectionRefused { reason } => write!(f, "connection refused: {reason}"),
            Self::NotConnected => write!(f, "session is not connected"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bit(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::Codec(err) => Some(err),
            Self::Wire(err) => Some(err),
            Self::Model(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BitError> for SessionError {
    fn from(err: BitError) -> Self {
        Self::Bit(err)
    }
}

impl From<SchemaError> for SessionError {
    fn from(err: SchemaError) -> Self {
        Self::Schema(err)
    }
}

impl From<CodecError> for SessionError {
    fn from(err: CodecError) -> Self {
        Self::Codec(err)
    }
}

impl From<WireError> for SessionError {
    fn from(err: WireError) -> Self {
        Self::Wire(err)
    }
}

impl From<ModelError> for SessionError {
    fn from(err: ModelError) -> Self {
        Self::Model(err)
    }
}

/// Convenience alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_stable() {
        let err = SessionError::ProtocolVersion { ours: 1, theirs: 2 };
        assert_eq!(err.to_string(), "protocol version mismatch: ours 1, peer 2");
    }

    #[test]
    fn wraps_layer_errors() {
        let err: SessionError = BitError::InvalidPacked.into();
        assert!(matches!(err, SessionError::Bit(_)));
        let err: SessionError = WireError::EmptyPayload.into();
        assert!(matches!(err, SessionError::Wire(_)));
    }
}
