//! Entropy-coder context assignment.
//!
//! Context 0 is shared structural state (counts, ids, bitmap chunks). Each
//! schema gets a block of eight field contexts derived from its id, the same
//! derivation on both peers, so field statistics are modeled separately
//! without shipping context ids over the wire. Distinct schema ids can
//! collide into the same block; that only merges their statistics.

use schema::{Schema, SchemaResult};

/// Contexts in every session compression model.
pub const MODEL_CONTEXTS: usize = 1024;

const CONTEXTS_PER_SCHEMA: u16 = 8;

/// Context block base for a schema id.
#[must_use]
pub fn context_base(schema_id: u16) -> u16 {
    1 + (u32::from(schema_id) * u32::from(CONTEXTS_PER_SCHEMA)
        % (MODEL_CONTEXTS as u32 - u32::from(CONTEXTS_PER_SCHEMA))) as u16
}

/// Rebuilds a schema with its wire contexts assigned from its id.
///
/// Fields past the block width share the block's last context.
pub fn assign_contexts(schema: &Schema) -> SchemaResult<Schema> {
    let base = context_base(schema.id());
    let fields = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let mut field = field.clone();
            field.context = base + (index as u16).min(CONTEXTS_PER_SCHEMA - 1);
            field
        })
        .collect();
    Schema::new(schema.id(), fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::{FieldDescriptor, FieldKind};

    #[test]
    fn contexts_stay_in_model_range() {
        for id in [0u16, 1, 63, 64, 1000, u16::MAX] {
            let base = context_base(id);
            assert!(base >= 1);
            assert!(usize::from(base) + 7 < MODEL_CONTEXTS, "id {id}");
        }
    }

    #[test]
    fn assignment_is_deterministic_and_capped() {
        let fields: Vec<_> = (0..12)
            .map(|i| FieldDescriptor::new(format!("f{i}"), FieldKind::UInt))
            .collect();
        let schema = Schema::new(7, fields).unwrap();
        let assigned = assign_contexts(&schema).unwrap();
        let again = assign_contexts(&schema).unwrap();
        assert_eq!(assigned, again);
        let base = context_base(7);
        assert_eq!(assigned.field(0).unwrap().context, base);
        assert_eq!(assigned.field(7).unwrap().context, base + 7);
        // Fields beyond the block share the last context.
        assert_eq!(assigned.field(11).unwrap().context, base + 7);
    }
}
