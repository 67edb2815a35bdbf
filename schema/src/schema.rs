//! Schema construction, validation, and fixed buffer layout.

use crate::error::{SchemaError, SchemaResult};
use crate::field::{FieldDescriptor, FieldKind};

/// Schema identifier, unique within one registration space.
pub type SchemaId = u16;

/// Maximum fields one schema may declare.
pub const MAX_FIELDS: usize = 128;

/// Maximum quantization precision in decimal digits.
pub const MAX_PRECISION: u8 = 3;

/// Maximum fixed slot size in bytes for string and bytes fields.
pub const MAX_ARRAY_BYTES: usize = 1024;

/// Resolved buffer position of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    /// Word offset of the field's slot.
    pub offset: usize,
    /// Slot size in words.
    pub words: usize,
}

/// An ordered, validated field list with a fixed per-entity buffer layout.
///
/// A schema is immutable once constructed. Both peers must hold layout-equal
/// schemas for an id; the handshake verifies this via [`crate::schema_hash`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    id: SchemaId,
    fields: Vec<FieldDescriptor>,
    layout: Vec<FieldLayout>,
    words: usize,
}

impl Schema {
    /// Validates the fields and computes the fixed layout.
    pub fn new(id: SchemaId, fields: Vec<FieldDescriptor>) -> SchemaResult<Self> {
        if fields.len() > MAX_FIELDS {
            return Err(SchemaError::TooManyFields {
                count: fields.len(),
                max: MAX_FIELDS,
            });
        }
        for (index, field) in fields.iter().enumerate() {
            match field.kind {
                FieldKind::Int | FieldKind::UInt => {
                    if field.bits == 0 || field.bits > 32 {
                        return Err(SchemaError::InvalidBitWidth {
                            field: index,
                            bits: field.bits,
                        });
                    }
                }
                FieldKind::Float | FieldKind::Vector2 | FieldKind::Vector3
                | FieldKind::Quaternion => {
                    if field.precision > MAX_PRECISION {
                        return Err(SchemaError::InvalidPrecision {
                            field: index,
                            precision: field.precision,
                        });
                    }
                }
                FieldKind::Bool => {}
                FieldKind::String | FieldKind::Bytes => {
                    if field.array_size == 0 || field.array_size > MAX_ARRAY_BYTES {
                        return Err(SchemaError::InvalidArraySize {
                            field: index,
                            size: field.array_size,
                        });
                    }
                }
            }
            if !field.kind.is_array() && field.array_size != 0 {
                return Err(SchemaError::InvalidArraySize {
                    field: index,
                    size: field.array_size,
                });
            }
        }

        let mut layout = Vec::with_capacity(fields.len());
        let mut offset = 0usize;
        for field in &fields {
            let words = field.word_count();
            layout.push(FieldLayout { offset, words });
            offset += words;
        }

        Ok(Self {
            id,
            fields,
            layout,
            words: offset,
        })
    }

    /// Returns the schema id.
    #[must_use]
    pub const fn id(&self) -> SchemaId {
        self.id
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Returns the fields in schema order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Returns one field descriptor.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    /// Returns one field's buffer position.
    #[must_use]
    pub fn layout(&self, index: usize) -> Option<FieldLayout> {
        self.layout.get(index).copied()
    }

    /// Returns the fixed per-entity buffer size in 32-bit words.
    #[must_use]
    pub const fn word_count(&self) -> usize {
        self.words
    }

    /// Returns a copy with entropy-coder contexts assigned sequentially
    /// from `base`, one per field.
    #[must_use]
    pub fn with_context_base(mut self, base: u16) -> Self {
        for (index, field) in self.fields.iter_mut().enumerate() {
            field.context = base.wrapping_add(index as u16);
        }
        self
    }

    /// Returns the context just past this schema's last field, given its base.
    #[must_use]
    pub fn context_span(&self) -> u16 {
        self.fields.len() as u16
    }
}
