//! Error types for the delta and prediction codec.

use bitio::BitError;
use schema::SchemaError;
use std::fmt;

/// Errors returned by delta encoding, decoding, and baseline bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    /// An underlying bit-level read or write failed.
    Bit(BitError),

    /// Schema-driven marshaling failed.
    Schema(SchemaError),

    /// More baselines were supplied than the predictor supports.
    TooManyBaselines {
        /// Supplied baseline count.
        count: usize,
        /// Maximum supported.
        max: usize,
    },

    /// A value buffer does not match the schema's fixed layout.
    BufferMismatch {
        /// Words required by the layout.
        needed: usize,
        /// Words in the supplied buffer.
        available: usize,
    },

    /// Two baselines share the same tick, which the predictor cannot use.
    DuplicateBaselineTick {
        /// The repeated tick.
        tick: u64,
    },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bit(err) => write!(f, "bit-level error: {err}"),
            Self::Schema(err) => write!(f, "schema error: {err}"),
            Self::TooManyBaselines { count, max } => {
                write!(f, "{count} baselines supplied, predictor supports {max}")
            }
            Self::BufferMismatch { needed, available } => {
                write!(f, "buffer holds {available} words, layout needs {needed}")
            }
            Self::DuplicateBaselineTick { tick } => {
                write!(f, "duplicate baseline tick {tick}")
            }
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bit(err) => Some(err),
            Self::Schema(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BitError> for CodecError {
    fn from(err: BitError) -> Self {
        Self::Bit(err)
    }
}

impl From<SchemaError> for CodecError {
    fn from(err: SchemaError) -> Self {
        Self::Schema(err)
    }
}

/// Convenience alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
