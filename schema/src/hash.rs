//! Deterministic schema layout hashing.
//!
//! The hash covers exactly the attributes that determine wire layout: field
//! count, kinds, bit widths, precisions, delta flags, array sizes, and mask
//! bits. Names, ids, and locally assigned contexts are excluded, so two
//! builds that declare the same layout under different names still agree.

use crate::schema::Schema;

/// Computes the 64-bit layout hash of a schema.
#[must_use]
pub fn schema_hash(schema: &Schema) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(schema.field_count() as u32).to_le_bytes());
    for field in schema.fields() {
        hasher.update(&[
            field.kind.raw(),
            field.bits,
            field.precision,
            u8::from(field.delta),
            field.mask,
        ]);
        hasher.update(&(field.array_size as u32).to_le_bytes());
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Folds several schemas into one hash, order-sensitive.
#[must_use]
pub fn schema_set_hash(schemas: &[Schema]) -> u64 {
    let mut hasher = blake3::Hasher::new();
    for schema in schemas {
        hasher.update(&schema_hash(schema).to_le_bytes());
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldDescriptor, FieldKind};

    fn schema(delta: bool) -> Schema {
        Schema::new(
            3,
            vec![
                FieldDescriptor::new("health", FieldKind::UInt).with_bits(16),
                {
                    let mut f = FieldDescriptor::new("pos", FieldKind::Vector3).with_precision(2);
                    f.delta = delta;
                    f
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn hash_ignores_names_ids_and_contexts() {
        let a = Schema::new(
            1,
            vec![FieldDescriptor::new("x", FieldKind::Int).with_bits(8)],
        )
        .unwrap();
        let b = Schema::new(
            2,
            vec![FieldDescriptor::new("y", FieldKind::Int).with_bits(8)],
        )
        .unwrap()
        .with_context_base(500);
        assert_eq!(schema_hash(&a), schema_hash(&b));
    }

    #[test]
    fn hash_covers_layout_attributes() {
        assert_ne!(schema_hash(&schema(false)), schema_hash(&schema(true)));
    }

    #[test]
    fn set_hash_is_order_sensitive() {
        let a = schema(false);
        let b = schema(true);
        assert_ne!(
            schema_set_hash(&[a.clone(), b.clone()]),
            schema_set_hash(&[b, a])
        );
    }
}
