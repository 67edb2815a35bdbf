//! Client-to-server command replication.
//!
//! The client keeps a small ring of recent commands and resends the whole
//! tail in every package until the server acknowledges it, so commands
//! survive package loss without a retransmission protocol. Within one
//! block, each command is delta-coded against the previous one; commands
//! between adjacent ticks rarely differ much.

use std::collections::VecDeque;

use bitio::{InputStream, OutputStream};
use codec::{read_delta, write_delta, ChangeBitmap, SnapshotHash};
use schema::Schema;
use wire::COMMAND_BUFFER_SIZE;

use crate::error::{SessionError, SessionResult};
use crate::traits::{CommandProcessor, ConnectionId};

const STRUCT_CONTEXT: u16 = 0;
const ALL_VIEWERS: u8 = 0xFF;

/// Unacknowledged outgoing commands on the client.
#[derive(Debug)]
pub(crate) struct CommandBuffer {
    commands: VecDeque<(u64, Vec<u32>)>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self {
            commands: VecDeque::with_capacity(COMMAND_BUFFER_SIZE),
        }
    }

    /// Queues one command. Commands must arrive in tick order; a command
    /// for an already-buffered tick replaces it. When the ring is full the
    /// oldest command gives way.
    pub fn queue(&mut self, tick: u64, values: Vec<u32>) {
        if let Some(back) = self.commands.back_mut() {
            if back.0 == tick {
                back.1 = values;
                return;
            }
        }
        if self.commands.len() == COMMAND_BUFFER_SIZE {
            self.commands.pop_front();
        }
        self.commands.push_back((tick, values));
    }

    pub fn has_pending(&self) -> bool {
        !self.commands.is_empty()
    }

    /// Drops commands the server has confirmed processing up to `tick`.
    pub fn prune(&mut self, tick: u64) {
        while self.commands.front().is_some_and(|(t, _)| *t <= tick) {
            self.commands.pop_front();
        }
    }

    /// Writes the whole buffered tail as one self-contained block.
    /// Returns the highest tick included.
    pub fn write_block(
        &self,
        schema: &Schema,
        out: &mut OutputStream<'_>,
    ) -> SessionResult<Option<u64>> {
        out.write_packed_uint(STRUCT_CONTEXT, self.commands.len() as u64)?;
        let zero = vec![0u32; schema.word_count()];
        let mut previous = zero.as_slice();
        let mut previous_tick = 0u64;
        let mut hash = SnapshotHash::new();
        let no_prediction = ChangeBitmap::new();
        for (index, (tick, values)) in self.commands.iter().enumerate() {
            if index == 0 {
                out.write_packed_uint(STRUCT_CONTEXT, *tick)?;
            } else {
                out.write_packed_uint(STRUCT_CONTEXT, tick - previous_tick)?;
            }
            write_delta(
                schema,
                values,
                previous,
                previous,
                &no_prediction,
                ALL_VIEWERS,
                out,
                &mut hash,
            )?;
            previous = values;
            previous_tick = *tick;
        }
        Ok(self.commands.back().map(|(tick, _)| *tick))
    }
}

/// Reads one commands block on the server, handing commands newer than
/// `last_processed` to the processor in tick order. Returns the new
/// `last_processed` value.
pub(crate) fn read_block(
    schema: &Schema,
    input: &mut InputStream<'_>,
    last_processed: u64,
    connection: ConnectionId,
    processor: &mut dyn CommandProcessor,
) -> SessionResult<u64> {
    let count = input.read_packed_uint(STRUCT_CONTEXT)? as usize;
    let zero = vec![0u32; schema.word_count()];
    let mut previous = zero.clone();
    let mut current = zero;
    let mut tick = 0u64;
    let mut processed_up_to = last_processed;
    let mut hash = SnapshotHash::new();
    let no_prediction = ChangeBitmap::new();
    for index in 0..count {
        let delta = input.read_packed_uint(STRUCT_CONTEXT)?;
        tick = if index == 0 {
            delta
        } else {
            tick.checked_add(delta)
                .ok_or(SessionError::MalformedBlock {
                    what: "command tick",
                })?
        };
        read_delta(
            schema,
            &previous,
            &previous,
            &no_prediction,
            ALL_VIEWERS,
            input,
            &mut current,
            &mut hash,
        )?;
        // Resends repeat commands already handled; only new ticks go to
        // the game.
        if tick > processed_up_to {
            let mut reader = schema::FieldReader::new(schema, &current)?;
            processor.process_command(connection, tick, &mut reader)?;
            processed_up_to = tick;
        }
        std::mem::swap(&mut previous, &mut current);
    }
    Ok(processed_up_to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitio::{CompressionModel, StreamMode};
    use schema::{FieldDescriptor, FieldKind, FieldReader, FieldWriter};

    use crate::context::{assign_contexts, MODEL_CONTEXTS};

    fn move_schema() -> Schema {
        let fields = vec![
            FieldDescriptor::new("forward", FieldKind::Int).with_delta(),
            FieldDescriptor::new("jump", FieldKind::Bool),
        ];
        assign_contexts(&Schema::new(0, fields).unwrap()).unwrap()
    }

    fn command(schema: &Schema, forward: i32, jump: bool) -> Vec<u32> {
        let mut values = vec![0u32; schema.word_count()];
        let mut writer = FieldWriter::new(schema, &mut values).unwrap();
        writer.write_int(forward).unwrap();
        writer.write_bool(jump).unwrap();
        writer.finish().unwrap();
        values
    }

    struct Collector {
        seen: Vec<(u64, i32, bool)>,
    }

    impl CommandProcessor for Collector {
        fn process_command(
            &mut self,
            _connection: ConnectionId,
            tick: u64,
            reader: &mut FieldReader<'_>,
        ) -> schema::SchemaResult<()> {
            let forward = reader.read_int()?;
            let jump = reader.read_bool()?;
            self.seen.push((tick, forward, jump));
            Ok(())
        }
    }

    fn roundtrip(buffer: &CommandBuffer, schema: &Schema, last_processed: u64) -> Vec<(u64, i32, bool)> {
        let model = CompressionModel::uniform(MODEL_CONTEXTS);
        let mut out = OutputStream::new(StreamMode::Raw, &model);
        buffer.write_block(schema, &mut out).unwrap();
        let bytes = out.finish();
        let mut input = InputStream::new(StreamMode::Raw, &model, &bytes);
        let mut collector = Collector { seen: Vec::new() };
        read_block(schema, &mut input, last_processed, 1, &mut collector).unwrap();
        collector.seen
    }

    #[test]
    fn buffered_tail_replays_in_tick_order() {
        let schema = move_schema();
        let mut buffer = CommandBuffer::new();
        buffer.queue(10, command(&schema, 1, false));
        buffer.queue(11, command(&schema, 1, true));
        buffer.queue(12, command(&schema, -2, false));

        let seen = roundtrip(&buffer, &schema, 0);
        assert_eq!(seen, vec![(10, 1, false), (11, 1, true), (12, -2, false)]);
    }

    #[test]
    fn resent_commands_are_processed_once() {
        let schema = move_schema();
        let mut buffer = CommandBuffer::new();
        buffer.queue(10, command(&schema, 1, false));
        buffer.queue(11, command(&schema, 2, false));

        // The server already processed tick 10 from an earlier package.
        let seen = roundtrip(&buffer, &schema, 10);
        assert_eq!(seen, vec![(11, 2, false)]);
    }

    #[test]
    fn prune_drops_acknowledged_commands() {
        let schema = move_schema();
        let mut buffer = CommandBuffer::new();
        for tick in 1..=5 {
            buffer.queue(tick, command(&schema, tick as i32, false));
        }
        buffer.prune(3);
        let seen = roundtrip(&buffer, &schema, 0);
        assert_eq!(seen.first().map(|(t, _, _)| *t), Some(4));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn overflowing_tick_delta_is_rejected() {
        let schema = move_schema();
        let model = CompressionModel::uniform(MODEL_CONTEXTS);
        let zero = vec![0u32; schema.word_count()];
        let no_prediction = ChangeBitmap::new();
        let mut hash = SnapshotHash::new();

        // A crafted block: first tick at the top of the range, then any
        // nonzero delta pushes the running tick past it.
        let mut out = OutputStream::new(StreamMode::Raw, &model);
        out.write_packed_uint(STRUCT_CONTEXT, 2).unwrap();
        out.write_packed_uint(STRUCT_CONTEXT, u64::MAX).unwrap();
        write_delta(
            &schema,
            &zero,
            &zero,
            &zero,
            &no_prediction,
            ALL_VIEWERS,
            &mut out,
            &mut hash,
        )
        .unwrap();
        out.write_packed_uint(STRUCT_CONTEXT, 1).unwrap();
        let bytes = out.finish();

        let mut input = InputStream::new(StreamMode::Raw, &model, &bytes);
        let mut collector = Collector { seen: Vec::new() };
        let err = read_block(&schema, &mut input, 0, 1, &mut collector).unwrap_err();
        assert!(matches!(err, SessionError::MalformedBlock { .. }));
    }

    #[test]
    fn ring_keeps_the_newest_commands() {
        let schema = move_schema();
        let mut buffer = CommandBuffer::new();
        for tick in 0..COMMAND_BUFFER_SIZE as u64 + 4 {
            buffer.queue(tick, command(&schema, 0, false));
        }
        let seen = roundtrip(&buffer, &schema, 0);
        assert_eq!(seen.len(), COMMAND_BUFFER_SIZE);
        assert_eq!(seen.first().map(|(t, _, _)| *t), Some(4));
    }
}
