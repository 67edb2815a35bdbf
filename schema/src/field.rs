//! Field kinds and per-field wire options.

/// The value kind of a schema field.
///
/// Scalars occupy one buffer word, vectors two to four, strings and byte
/// arrays a length word plus their fixed slot rounded up to whole words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum FieldKind {
    /// Single bit.
    Bool = 0,
    /// Signed integer, up to 32 bits.
    Int = 1,
    /// Unsigned integer, up to 32 bits.
    UInt = 2,
    /// 32-bit float, optionally quantized to fixed decimal digits.
    Float = 3,
    /// Two floats, each coded like [`FieldKind::Float`].
    Vector2 = 4,
    /// Three floats.
    Vector3 = 5,
    /// Four floats. Components are coded independently and the decoded
    /// quaternion is not renormalized.
    Quaternion = 6,
    /// UTF-8 string in a fixed byte slot, nullable.
    String = 7,
    /// Raw bytes in a fixed byte slot.
    Bytes = 8,
}

impl FieldKind {
    /// Parses a field kind from its wire tag.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Bool),
            1 => Some(Self::Int),
            2 => Some(Self::UInt),
            3 => Some(Self::Float),
            4 => Some(Self::Vector2),
            5 => Some(Self::Vector3),
            6 => Some(Self::Quaternion),
            7 => Some(Self::String),
            8 => Some(Self::Bytes),
            _ => None,
        }
    }

    /// Returns the wire tag for this kind.
    #[must_use]
    pub const fn raw(self) -> u8 {
        self as u8
    }

    /// Returns true for kinds with a fixed byte-array slot.
    #[must_use]
    pub const fn is_array(self) -> bool {
        matches!(self, Self::String | Self::Bytes)
    }

    /// Returns the number of float components, or zero for non-float kinds.
    #[must_use]
    pub const fn components(self) -> usize {
        match self {
            Self::Float => 1,
            Self::Vector2 => 2,
            Self::Vector3 => 3,
            Self::Quaternion => 4,
            _ => 0,
        }
    }

    /// Returns the fixed buffer footprint in 32-bit words.
    #[must_use]
    pub const fn word_count(self, array_size: usize) -> usize {
        match self {
            Self::Bool | Self::Int | Self::UInt | Self::Float => 1,
            Self::Vector2 => 2,
            Self::Vector3 => 3,
            Self::Quaternion => 4,
            Self::String | Self::Bytes => 1 + array_size.div_ceil(4),
        }
    }
}

/// One typed, named field of a schema.
///
/// The name is local documentation only; it never crosses the wire and does
/// not participate in the schema hash.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldDescriptor {
    /// Field name, for logs and debugging.
    pub name: String,
    /// Value kind.
    pub kind: FieldKind,
    /// Bit width for integer kinds, 1 to 32.
    pub bits: u8,
    /// Quantization precision in decimal digits for float kinds, 0 to 3.
    /// Zero transmits the raw 32-bit pattern.
    pub precision: u8,
    /// Whether changed values are delta-coded against the baseline.
    pub delta: bool,
    /// Fixed slot size in bytes for string and bytes kinds.
    pub array_size: usize,
    /// Field-mask bits restricting which viewers receive the field.
    /// Zero sends to every viewer.
    pub mask: u8,
    /// Entropy-coder context for this field, assigned at registration.
    pub context: u16,
}

impl FieldDescriptor {
    /// Creates a descriptor with default options.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            bits: 32,
            precision: 0,
            delta: false,
            array_size: 0,
            mask: 0,
            context: 0,
        }
    }

    /// Sets the integer bit width.
    #[must_use]
    pub const fn with_bits(mut self, bits: u8) -> Self {
        self.bits = bits;
        self
    }

    /// Sets the float quantization precision in decimal digits.
    #[must_use]
    pub const fn with_precision(mut self, precision: u8) -> Self {
        self.precision = precision;
        self
    }

    /// Enables delta coding against the baseline.
    #[must_use]
    pub const fn with_delta(mut self) -> Self {
        self.delta = true;
        self
    }

    /// Sets the fixed slot size in bytes for string and bytes fields.
    #[must_use]
    pub const fn with_array_size(mut self, array_size: usize) -> Self {
        self.array_size = array_size;
        self
    }

    /// Sets the field-mask bits.
    #[must_use]
    pub const fn with_mask(mut self, mask: u8) -> Self {
        self.mask = mask;
        self
    }

    /// Returns the fixed buffer footprint in 32-bit words.
    #[must_use]
    pub const fn word_count(&self) -> usize {
        self.kind.word_count(self.array_size)
    }
}
