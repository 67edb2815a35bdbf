//! Collaborator interfaces between the replication core and the game layer.

use schema::{FieldReader, FieldWriter, SchemaResult};

/// Identifies one connected client on the server.
pub type ConnectionId = u32;

/// Identifies one replicated entity while it is alive.
pub type EntityId = u32;

/// Supplies per-entity field values each server tick.
///
/// The writer is laid out by the entity type's schema; the generator must
/// write every field in schema order.
pub trait SnapshotGenerator {
    /// Fills in the entity's current field values.
    fn generate(&mut self, entity: EntityId, writer: &mut FieldWriter<'_>) -> SchemaResult<()>;

    /// Debug name for the entity, used in logs only.
    fn entity_name(&mut self, _entity: EntityId) -> Option<String> {
        None
    }
}

/// Consumes replicated state changes on the client.
///
/// For each processed snapshot the session reports every spawn exactly once,
/// then every update exactly once, then all despawns in one call, in that
/// order, even when the underlying package was delivered more than once.
pub trait SnapshotConsumer {
    /// A new entity became visible.
    fn entity_spawn(&mut self, time_ms: u64, entity: EntityId, type_id: u16);

    /// An entity's fields changed; the reader is laid out by its schema.
    fn entity_update(
        &mut self,
        time_ms: u64,
        entity: EntityId,
        reader: &mut FieldReader<'_>,
    ) -> SchemaResult<()>;

    /// Entities left the replicated set.
    fn entity_despawns(&mut self, time_ms: u64, entities: &[EntityId]);
}

/// Consumes decoded player commands on the server.
pub trait CommandProcessor {
    /// One command from `connection`, issued for simulation tick `tick`.
    fn process_command(
        &mut self,
        connection: ConnectionId,
        tick: u64,
        reader: &mut FieldReader<'_>,
    ) -> SchemaResult<()>;
}

/// Datagram transport for one peer pair. UDP sockets, loopback queues, and
/// test harnesses all implement this; the session never opens sockets
/// itself.
pub trait Transport {
    /// Sends one datagram, fire and forget.
    fn send(&mut self, data: &[u8]);

    /// Receives the next pending datagram, if any.
    fn recv(&mut self) -> Option<Vec<u8>>;
}
