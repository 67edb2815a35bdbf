//! Error types for schema construction, marshaling, and wire decoding.

use bitio::BitError;
use std::fmt;

use crate::field::FieldKind;

/// Errors returned by schema validation and value marshaling.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaError {
    /// An underlying bit-level read or write failed.
    Bit(BitError),

    /// The schema declares more fields than the protocol allows.
    TooManyFields {
        /// Declared field count.
        count: usize,
        /// Maximum allowed field count.
        max: usize,
    },

    /// An integer field declares an unsupported bit width.
    InvalidBitWidth {
        /// Index of the offending field.
        field: usize,
        /// Declared width.
        bits: u8,
    },

    /// A field declares a quantization precision beyond the supported range.
    InvalidPrecision {
        /// Index of the offending field.
        field: usize,
        /// Declared precision in decimal digits.
        precision: u8,
    },

    /// A string or bytes field declares an invalid slot size, or a non-array
    /// field declares one at all.
    InvalidArraySize {
        /// Index of the offending field.
        field: usize,
        /// Declared slot size in bytes.
        size: usize,
    },

    /// A wire schema names a field kind this build does not know.
    UnknownFieldKind {
        /// Raw kind tag from the wire.
        raw: u8,
    },

    /// A value was written or read under the wrong field kind.
    WrongFieldKind {
        /// Index of the field being accessed.
        field: usize,
        /// Kind declared by the schema.
        expected: FieldKind,
        /// Kind of the attempted access.
        found: FieldKind,
    },

    /// The writer or reader finished before visiting every field.
    MissingFields {
        /// Fields visited.
        visited: usize,
        /// Fields declared by the schema.
        expected: usize,
    },

    /// A value buffer is smaller than the schema's fixed layout.
    BufferTooSmall {
        /// Words required by the layout.
        needed: usize,
        /// Words available in the buffer.
        available: usize,
    },

    /// A string slot holds a length beyond its capacity or invalid UTF-8.
    InvalidStringData {
        /// Index of the offending field.
        field: usize,
    },

    /// A bytes value exceeds the field's fixed slot size.
    ValueTooLong {
        /// Index of the offending field.
        field: usize,
        /// Length of the supplied value.
        len: usize,
        /// Slot capacity in bytes.
        max: usize,
    },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bit(err) => write!(f, "bit-level error: {err}"),
            Self::TooManyFields { count, max } => {
                write!(f, "schema declares {count} fields, maximum is {max}")
            }
            Self::InvalidBitWidth { field, bits } => {
                write!(f, "field {field} declares invalid bit width {bits}")
            }
            Self::InvalidPrecision { field, precision } => {
                write!(f, "field {field} declares invalid precision {precision}")
            }
            Self::InvalidArraySize { field, size } => {
                write!(f, "field {field} declares invalid array size {size}")
            }
            Self::UnknownFieldKind { raw } => write!(f, "unknown field kind tag {raw}"),
            Self::WrongFieldKind {
                field,
                expected,
                found,
            } => write!(
                f,
                "field {field} is {expected:?}, accessed as {found:?}"
            ),
            Self::MissingFields { visited, expected } => {
                write!(f, "visited {visited} of {expected} schema fields")
            }
            Self::BufferTooSmall { needed, available } => {
                write!(f, "buffer holds {available} words, layout needs {needed}")
            }
            Self::InvalidStringData { field } => {
                write!(f, "field {field} holds invalid string data")
            }
            Self::ValueTooLong { field, len, max } => {
                write!(f, "field {field} value is {len} bytes, slot holds {max}")
            }
        }
    }
}

impl std::error::Error for SchemaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bit(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BitError> for SchemaError {
    fn from(err: BitError) -> Self {
        Self::Bit(err)
    }
}

/// Convenience alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_stable() {
        let err = SchemaError::TooManyFields { count: 200, max: 128 };
        assert_eq!(err.to_string(), "schema declares 200 fields, maximum is 128");

        let err = SchemaError::WrongFieldKind {
            field: 3,
            expected: FieldKind::Float,
            found: FieldKind::Bool,
        };
        assert!(err.to_string().contains("field 3"));
    }

    #[test]
    fn bit_errors_convert() {
        let err: SchemaError = BitError::InvalidPacked.into();
        assert!(matches!(err, SchemaError::Bit(_)));
    }
}
