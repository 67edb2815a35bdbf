//! Replication schemas for repnet.
//!
//! A [`Schema`] is an ordered, validated list of typed fields with a fixed
//! per-entity word-buffer layout. Schemas describe entity state, events, and
//! commands; they can be serialized over the wire so a freshly connected
//! peer bootstraps layout knowledge without out-of-band coordination, and
//! hashed so the handshake can verify both ends agree.
//!
//! # Design Principles
//!
//! - **Validate on construction** - A [`Schema`] that exists is well-formed.
//! - **Fixed layout** - Every field has a fixed word slot; buffers never
//!   resize per value.
//! - **Ordered access** - [`FieldWriter`]/[`FieldReader`] enforce schema
//!   order so writer and reader code cannot drift apart silently.

mod error;
mod field;
mod hash;
mod schema;
mod values;
mod wire;

pub use error::{SchemaError, SchemaResult};
pub use field::{FieldDescriptor, FieldKind};
pub use hash::{schema_hash, schema_set_hash};
pub use schema::{FieldLayout, Schema, SchemaId, MAX_ARRAY_BYTES, MAX_FIELDS, MAX_PRECISION};
pub use values::{
    copy_fields_to_stream, copy_fields_from_stream, dequantize, quantize, skip_fields,
    FieldReader, FieldWriter, NULL_LENGTH,
};
pub use wire::{read_schema, write_schema};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_api_exports() {
        let schema = Schema::new(
            0,
            vec![FieldDescriptor::new("hp", FieldKind::UInt).with_bits(10)],
        )
        .unwrap();
        assert_eq!(schema.word_count(), 1);
        let _ = schema_hash(&schema);
        let _: SchemaResult<()> = Ok(());
    }
}
