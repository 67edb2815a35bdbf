//! Error types for package framing and reassembly.

use std::fmt;

/// Errors returned by header parsing and fragmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum WireError {
    /// The buffer ended before the header did.
    TruncatedHeader {
        /// Bytes the header needed.
        needed: usize,
        /// Bytes available.
        available: usize,
    },

    /// A package would split into more fragments than allowed.
    TooManyFragments {
        /// Required fragment count.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// A fragment's index is outside its declared count.
    InvalidFragmentIndex {
        /// Fragment index.
        index: u8,
        /// Declared fragment count.
        count: u8,
    },

    /// A fragment's declared geometry disagrees with earlier fragments of
    /// the same package.
    FragmentMismatch {
        /// Original sequence of the package being reassembled.
        original_sequence: u16,
    },

    /// A fragment payload does not match its declared size.
    FragmentSizeMismatch {
        /// Declared size.
        declared: usize,
        /// Actual payload size.
        actual: usize,
    },

    /// An empty package cannot be fragmented.
    EmptyPayload,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TruncatedHeader { needed, available } => {
                write!(f, "header needs {needed} bytes, got {available}")
            }
            Self::TooManyFragments { count, max } => {
                write!(f, "package needs {count} fragments, maximum is {max}")
            }
            Self::InvalidFragmentIndex { index, count } => {
                write!(f, "fragment index {index} outside count {count}")
            }
            Self::FragmentMismatch { original_sequence } => {
                write!(f, "fragment geometry mismatch for package {original_sequence}")
            }
            Self::FragmentSizeMismatch { declared, actual } => {
                write!(f, "fragment declares {declared} bytes, carries {actual}")
            }
            Self::EmptyPayload => write!(f, "cannot fragment an empty package"),
        }
    }
}

impl std::error::Error for WireError {}

/// Convenience alias for wire operations.
pub type WireResult<T> = Result<T, WireError>;
