//! Schema (de)serialization over the wire.
//!
//! A peer that has never seen a schema bootstraps its layout knowledge from
//! these bytes alone, so client and server builds never need a shared
//! compile-time registry. Field names stay local; received fields are given
//! placeholder names.

use bitio::{InputStream, OutputStream};

use crate::error::{SchemaError, SchemaResult};
use crate::field::{FieldDescriptor, FieldKind};
use crate::schema::{Schema, SchemaId, MAX_FIELDS};

const KIND_BITS: u8 = 4;
const WIDTH_BITS: u8 = 6;
const PRECISION_BITS: u8 = 2;
const MASK_BITS: u8 = 8;

/// Writes a schema's id and field list.
pub fn write_schema(schema: &Schema, out: &mut OutputStream<'_>) -> SchemaResult<()> {
    out.write_packed_uint(0, u64::from(schema.id()))?;
    out.write_packed_uint(0, schema.field_count() as u64)?;
    for field in schema.fields() {
        out.write_raw_bits(u32::from(field.kind.raw()), KIND_BITS)?;
        out.write_bool(field.delta);
        out.write_raw_bits(u32::from(field.bits), WIDTH_BITS)?;
        out.write_raw_bits(u32::from(field.precision), PRECISION_BITS)?;
        out.write_raw_bits(u32::from(field.mask), MASK_BITS)?;
        if field.kind.is_array() {
            out.write_packed_uint(0, field.array_size as u64)?;
        }
    }
    Ok(())
}

/// Reads a schema written by [`write_schema`], validating as it goes.
pub fn read_schema(input: &mut InputStream<'_>) -> SchemaResult<Schema> {
    let id = input.read_packed_uint(0)? as SchemaId;
    let count = input.read_packed_uint(0)? as usize;
    if count > MAX_FIELDS {
        return Err(SchemaError::TooManyFields {
            count,
            max: MAX_FIELDS,
        });
    }

    let mut fields = Vec::with_capacity(count);
    for index in 0..count {
        let raw_kind = input.read_raw_bits(KIND_BITS)? as u8;
        let kind = FieldKind::from_raw(raw_kind)
            .ok_or(SchemaError::UnknownFieldKind { raw: raw_kind })?;
        let delta = input.read_bool()?;
        let bits = input.read_raw_bits(WIDTH_BITS)? as u8;
        let precision = input.read_raw_bits(PRECISION_BITS)? as u8;
        let mask = input.read_raw_bits(MASK_BITS)? as u8;
        let array_size = if kind.is_array() {
            input.read_packed_uint(0)? as usize
        } else {
            0
        };

        let mut field = FieldDescriptor::new(format!("field_{index}"), kind)
            .with_bits(bits)
            .with_precision(precision)
            .with_array_size(array_size)
            .with_mask(mask);
        field.delta = delta;
        fields.push(field);
    }

    Schema::new(id, fields)
}
