//! Schema-typed event channel.
//!
//! Events are small one-shot messages outside the snapshot state. Each
//! event type has a schema; the schema rides along with the event until the
//! sender knows the receiver holds it, so either peer can introduce new
//! event types mid-session. Unreliable events are fire-and-forget; reliable
//! events are re-queued when the package that carried them is lost.

use std::collections::{HashMap, HashSet, VecDeque};

use bitio::{InputStream, OutputStream};
use schema::{
    copy_fields_from_stream, copy_fields_to_stream, read_schema, write_schema, FieldDescriptor,
    Schema,
};

use crate::connection::PackageSummary;
use crate::context::assign_contexts;
use crate::error::{SessionError, SessionResult};

/// Events per package; the rest stay queued for the next one.
const MAX_EVENTS_PER_PACKAGE: usize = 16;

const STRUCT_CONTEXT: u16 = 0;

/// One typed event, in either direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event type id, keyed to a registered schema.
    pub type_id: u16,
    /// Re-send if the carrying package is lost.
    pub reliable: bool,
    /// Value buffer laid out by the type's schema.
    pub payload: Vec<u32>,
}

/// Known event types on one peer. Locally registered and wire-learned
/// schemas land in the same table.
#[derive(Debug, Default)]
pub(crate) struct EventRegistry {
    schemas: HashMap<u16, Schema>,
}

impl EventRegistry {
    pub fn register(&mut self, type_id: u16, fields: Vec<FieldDescriptor>) -> SessionResult<()> {
        let schema = assign_contexts(&Schema::new(type_id, fields)?)?;
        self.schemas.insert(type_id, schema);
        Ok(())
    }

    pub fn get(&self, type_id: u16) -> Option<&Schema> {
        self.schemas.get(&type_id)
    }

    fn learn(&mut self, schema: Schema) -> SessionResult<()> {
        let schema = assign_contexts(&schema)?;
        self.schemas.insert(schema.id(), schema);
        Ok(())
    }
}

/// Outgoing event state for one connection.
#[derive(Debug, Default)]
pub(crate) struct EventChannel {
    outgoing: VecDeque<Event>,
    /// Types whose schema the peer has acknowledged receiving.
    acked_types: HashSet<u16>,
}

impl EventChannel {
    pub fn queue(&mut self, event: Event) {
        self.outgoing.push_back(event);
    }

    pub fn has_pending(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Writes queued events into a package body and records what the
    /// package now carries in its summary.
    pub fn write_block(
        &mut self,
        registry: &EventRegistry,
        out: &mut OutputStream<'_>,
        summary: &mut PackageSummary,
    ) -> SessionResult<()> {
        let count = self.outgoing.len().min(MAX_EVENTS_PER_PACKAGE);
        out.write_packed_uint(STRUCT_CONTEXT, count as u64)?;
        for _ in 0..count {
            let event = self
                .outgoing
                .pop_front()
                .ok_or(SessionError::NotConnected)?;
            let schema = registry
                .get(event.type_id)
                .ok_or(SessionError::UnknownEventType {
                    type_id: event.type_id,
                })?;
            out.write_packed_uint(STRUCT_CONTEXT, u64::from(event.type_id))?;
            let attach_schema = !self.acked_types.contains(&event.type_id);
            out.write_bool(attach_schema);
            if attach_schema {
                write_schema(schema, out)?;
                summary.event_schema_types.push(event.type_id);
            }
            copy_fields_to_stream(schema, &event.payload, out)?;
            if event.reliable {
                summary.reliable_events.push(event);
            }
        }
        Ok(())
    }

    /// The carrying package arrived; the peer now holds these schemas.
    pub fn on_delivered(&mut self, summary: &PackageSummary) {
        self.acked_types.extend(summary.event_schema_types.iter());
    }

    /// The carrying package was lost; reliable events go back to the front
    /// of the queue in their original order.
    pub fn on_lost(&mut self, summary: &mut PackageSummary) -> u64 {
        let resent = summary.reliable_events.len() as u64;
        for event in summary.reliable_events.drain(..).rev() {
            self.outgoing.push_front(event);
        }
        resent
    }
}

/// Reads one events block, learning attached schemas as they appear.
pub(crate) fn read_block(
    registry: &mut EventRegistry,
    input: &mut InputStream<'_>,
) -> SessionResult<Vec<Event>> {
    let count = input.read_packed_uint(STRUCT_CONTEXT)? as usize;
    let mut events = Vec::with_capacity(count.min(MAX_EVENTS_PER_PACKAGE));
    for _ in 0..count {
        let type_id = input.read_packed_uint(STRUCT_CONTEXT)? as u16;
        if input.read_bool()? {
            registry.learn(read_schema(input)?)?;
        }
        let schema = registry
            .get(type_id)
            .ok_or(SessionError::UnknownEventType { type_id })?;
        let mut payload = vec![0u32; schema.word_count()];
        copy_fields_from_stream(schema, &mut payload, input)?;
        events.push(Event {
            type_id,
            reliable: false,
            payload,
        });
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitio::{CompressionModel, StreamMode};
    use schema::{FieldKind, FieldWriter};

    use crate::context::MODEL_CONTEXTS;

    fn damage_fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("target", FieldKind::UInt).with_bits(16),
            FieldDescriptor::new("amount", FieldKind::Int),
        ]
    }

    fn damage_event(registry: &EventRegistry, target: u32, amount: i32) -> Event {
        let schema = registry.get(3).unwrap();
        let mut payload = vec![0u32; schema.word_count()];
        let mut writer = FieldWriter::new(schema, &mut payload).unwrap();
        writer.write_uint(target).unwrap();
        writer.write_int(amount).unwrap();
        writer.finish().unwrap();
        Event {
            type_id: 3,
            reliable: true,
            payload,
        }
    }

    #[test]
    fn block_roundtrips_and_teaches_schema() {
        let model = CompressionModel::uniform(MODEL_CONTEXTS);
        let mut sender_registry = EventRegistry::default();
        sender_registry.register(3, damage_fields()).unwrap();
        let mut channel = EventChannel::default();
        channel.queue(damage_event(&sender_registry, 7, -25));

        let mut summary = PackageSummary::default();
        let mut out = OutputStream::new(StreamMode::Raw, &model);
        channel
            .write_block(&sender_registry, &mut out, &mut summary)
            .unwrap();
        let bytes = out.finish();
        assert_eq!(summary.event_schema_types, vec![3]);
        assert_eq!(summary.reliable_events.len(), 1);

        // Receiver starts with no knowledge of type 3.
        let mut receiver_registry = EventRegistry::default();
        let mut input = InputStream::new(StreamMode::Raw, &model, &bytes);
        let events = read_block(&mut receiver_registry, &mut input).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].type_id, 3);
        assert_eq!(events[0].payload, summary.reliable_events[0].payload);
        assert!(receiver_registry.get(3).is_some());
    }

    #[test]
    fn schema_stops_riding_after_delivery() {
        let model = CompressionModel::uniform(MODEL_CONTEXTS);
        let mut registry = EventRegistry::default();
        registry.register(3, damage_fields()).unwrap();
        let mut channel = EventChannel::default();

        channel.queue(damage_event(&registry, 1, -1));
        let mut first = PackageSummary::default();
        let mut out = OutputStream::new(StreamMode::Raw, &model);
        channel.write_block(&registry, &mut out, &mut first).unwrap();
        let first_bytes = out.finish();
        channel.on_delivered(&first);

        channel.queue(damage_event(&registry, 1, -1));
        let mut second = PackageSummary::default();
        let mut out = OutputStream::new(StreamMode::Raw, &model);
        channel.write_block(&registry, &mut out, &mut second).unwrap();
        let second_bytes = out.finish();

        assert!(second.event_schema_types.is_empty());
        assert!(second_bytes.len() < first_bytes.len());
    }

    #[test]
    fn lost_package_requeues_reliable_events() {
        let model = CompressionModel::uniform(MODEL_CONTEXTS);
        let mut registry = EventRegistry::default();
        registry.register(3, damage_fields()).unwrap();
        let mut channel = EventChannel::default();

        channel.queue(damage_event(&registry, 1, -1));
        channel.queue(Event {
            type_id: 3,
            reliable: false,
            payload: damage_event(&registry, 2, -2).payload,
        });
        let mut summary = PackageSummary::default();
        let mut out = OutputStream::new(StreamMode::Raw, &model);
        channel.write_block(&registry, &mut out, &mut summary).unwrap();
        assert!(!channel.has_pending());

        // Only the reliable event comes back.
        let resent = channel.on_lost(&mut summary.clone());
        assert_eq!(resent, 1);
    }
}
