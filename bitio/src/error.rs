//! Error types for bit-level encoding and decoding.

use std::fmt;

/// Result type for bit-level operations.
pub type BitResult<T> = Result<T, BitError>;

/// Errors that can occur during bit-level encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BitError {
    /// Attempted to read past the end of the buffer.
    EndOfBuffer {
        /// Number of bits requested.
        requested: usize,
        /// Number of bits available.
        available: usize,
    },

    /// Invalid bit count for the operation.
    InvalidBitCount {
        /// The invalid bit count provided.
        bits: usize,
        /// Maximum allowed bits for this operation.
        max_bits: usize,
    },

    /// Value exceeds the range representable by the specified number of bits.
    ValueOutOfRange {
        /// The value that was out of range.
        value: u64,
        /// Number of bits available.
        bits: usize,
    },

    /// Byte-aligned access attempted at a misaligned bit position.
    MisalignedAccess {
        /// The offending bit position.
        bit_position: usize,
    },

    /// Alignment padding bits were not zero.
    ///
    /// Writers pad with zeros; anything else indicates a desynchronized or
    /// corrupted stream.
    NonZeroPadding {
        /// Bit position where the non-zero padding was found.
        bit_position: usize,
    },

    /// A packed integer prefix ran past the end of the buffer or exceeded
    /// the largest bucket.
    InvalidPacked,

    /// A Huffman code did not resolve to any symbol in the context model.
    InvalidSymbol {
        /// Context the symbol was read in.
        context: u16,
    },
}

impl fmt::Display for BitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndOfBuffer {
                requested,
                available,
            } => {
                write!(
                    f,
                    "attempted to read {requested} bits but only {available} bits available"
                )
            }
            Self::InvalidBitCount { bits, max_bits } => {
                write!(f, "invalid bit count {bits}, maximum allowed is {max_bits}")
            }
            Self::ValueOutOfRange { value, bits } => {
                write!(f, "value {value} cannot be represented in {bits} bits")
            }
            Self::MisalignedAccess { bit_position } => {
                write!(f, "byte-aligned access at bit position {bit_position}")
            }
            Self::NonZeroPadding { bit_position } => {
                write!(f, "non-zero padding at bit position {bit_position}")
            }
            Self::InvalidPacked => write!(f, "invalid packed integer prefix"),
            Self::InvalidSymbol { context } => {
                write!(f, "unresolvable symbol in context {context}")
            }
        }
    }
}

impl std::error::Error for BitError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_end_of_buffer() {
        let err = BitError::EndOfBuffer {
            requested: 8,
            available: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("8 bits"), "should mention requested bits");
        assert!(msg.contains("3 bits"), "should mention available bits");
    }

    #[test]
    fn error_display_non_zero_padding() {
        let err = BitError::NonZeroPadding { bit_position: 13 };
        assert!(err.to_string().contains("13"));
    }

    #[test]
    fn error_display_invalid_symbol() {
        let err = BitError::InvalidSymbol { context: 7 };
        assert!(err.to_string().contains("context 7"));
    }

    #[test]
    fn error_equality_and_clone() {
        let err = BitError::ValueOutOfRange {
            value: 256,
            bits: 8,
        };
        assert_eq!(err.clone(), err);
        assert_ne!(
            err,
            BitError::ValueOutOfRange {
                value: 257,
                bits: 8
            }
        );
    }

    #[test]
    fn error_is_std_error() {
        fn assert_error<E: std::error::Error>() {}
        assert_error::<BitError>();
    }
}
