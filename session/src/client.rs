//! Client session: handshake, snapshot consumption, command sending.
//!
//! The client learns everything it needs over the wire: entity and event
//! schemas ride along until acknowledged, the entropy model arrives in the
//! handshake, and per-entity baselines mirror the server's bookkeeping so
//! delta decoding stays in lockstep without any extra round trips.

use std::collections::HashMap;

use bitio::{CompressionModel, InputStream, StreamMode};
use codec::{
    predict, read_delta, Baseline, BaselineWindow, ChangeBitmap, SnapshotHash, MAX_BASELINES,
};
use log::{debug, info, warn};
use schema::{
    copy_fields_from_stream, read_schema, schema_hash, FieldDescriptor, FieldReader, FieldWriter,
    Schema,
};
use wire::{
    fragment_threshold, ContentFlags, PackageFate, CLIENT_ACK_CACHE_SIZE, MAX_FRAGMENTS,
};

use crate::commands::CommandBuffer;
use crate::config::{Config, PROTOCOL_VERSION};
use crate::connection::{Endpoint, PackageSummary, Resolution};
use crate::context::assign_contexts;
use crate::error::{SessionError, SessionResult};
use crate::events::{self, Event, EventChannel, EventRegistry};
use crate::server::COMMAND_SCHEMA_ID;
use crate::stats::ConnectionStats;
use crate::traits::{SnapshotConsumer, Transport};

const STRUCT_CONTEXT: u16 = 0;

/// Things that happened on the client since the last update call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The handshake completed.
    Connected,
    /// The session ended.
    Disconnected {
        /// Why it ended.
        reason: String,
    },
    /// The server sent an event.
    Event(Event),
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No session.
    Disconnected,
    /// Config sent, waiting for the server's client-info block.
    Connecting,
    /// Handshake complete; snapshots flow.
    Connected,
}

struct EntityType {
    schema: Schema,
    default_values: Vec<u32>,
}

struct Entity {
    type_id: u16,
    window: BaselineWindow,
}

/// The replica-side replication endpoint.
pub struct Client {
    config: Config,
    command_schema: Schema,
    command_hash: u64,
    transport: Box<dyn Transport>,
    endpoint: Endpoint,
    state: ClientState,
    client_id: Option<u32>,
    server_tick_rate: u32,
    debug_hash: bool,
    last_connect_attempt_ms: Option<u64>,
    entity_types: HashMap<u16, EntityType>,
    entities: HashMap<u32, Entity>,
    last_snapshot_tick: u64,
    commands: CommandBuffer,
    events_out: EventChannel,
    event_registry: EventRegistry,
    map: Option<(u32, String)>,
    pending: Vec<ClientEvent>,
}

impl Client {
    /// Creates a client speaking the given command layout over `transport`.
    /// The layout must hash-match the server's or the handshake fails.
    pub fn new(
        config: Config,
        command_fields: Vec<FieldDescriptor>,
        transport: Box<dyn Transport>,
    ) -> SessionResult<Self> {
        let command_schema = assign_contexts(&Schema::new(COMMAND_SCHEMA_ID, command_fields)?)?;
        let command_hash = schema_hash(&command_schema);
        let mtu = config.mtu;
        Ok(Self {
            config,
            command_schema,
            command_hash,
            transport,
            endpoint: Endpoint::new(mtu, 0),
            state: ClientState::Disconnected,
            client_id: None,
            server_tick_rate: 0,
            debug_hash: false,
            last_connect_attempt_ms: None,
            entity_types: HashMap::new(),
            entities: HashMap::new(),
            last_snapshot_tick: 0,
            commands: CommandBuffer::new(),
            events_out: EventChannel::default(),
            event_registry: EventRegistry::default(),
            map: None,
            pending: Vec::new(),
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ClientState {
        self.state
    }

    /// Our id on the server, once connected.
    #[must_use]
    pub const fn client_id(&self) -> Option<u32> {
        self.client_id
    }

    /// The server's advertised tick rate, once connected.
    #[must_use]
    pub const fn server_tick_rate(&self) -> u32 {
        self.server_tick_rate
    }

    /// Tick of the newest processed snapshot.
    #[must_use]
    pub const fn snapshot_tick(&self) -> u64 {
        self.last_snapshot_tick
    }

    /// The current map announcement, if any.
    #[must_use]
    pub fn map(&self) -> Option<(u32, &str)> {
        self.map.as_ref().map(|(sequence, name)| (*sequence, name.as_str()))
    }

    /// Connection counters.
    #[must_use]
    pub const fn stats(&self) -> &ConnectionStats {
        &self.endpoint.stats
    }

    /// Smoothed RTT in milliseconds.
    #[must_use]
    pub fn rtt_ms(&self) -> f32 {
        self.endpoint.rtt_ms()
    }

    /// The server's own RTT estimate, as last reported in a package header.
    #[must_use]
    pub const fn peer_rtt_ms(&self) -> u8 {
        self.endpoint.peer_rtt_ms()
    }

    /// The command layout, for building command values.
    #[must_use]
    pub const fn command_schema(&self) -> &Schema {
        &self.command_schema
    }

    /// Starts connecting. The config block is resent every
    /// [`Config::connect_retry_ms`] until the server answers.
    pub fn connect(&mut self) {
        if self.state == ClientState::Disconnected {
            self.state = ClientState::Connecting;
            self.last_connect_attempt_ms = None;
            info!("connecting");
        }
    }

    /// Registers an event type for sending.
    pub fn register_event_type(
        &mut self,
        type_id: u16,
        fields: Vec<FieldDescriptor>,
    ) -> SessionResult<()> {
        self.event_registry.register(type_id, fields)
    }

    /// Queues a command for simulation tick `tick`. Commands are resent
    /// until the server confirms processing them.
    pub fn queue_command<F>(&mut self, tick: u64, fill: F) -> SessionResult<()>
    where
        F: FnOnce(&mut FieldWriter<'_>) -> schema::SchemaResult<()>,
    {
        let mut values = vec![0u32; self.command_schema.word_count()];
        let mut writer = FieldWriter::new(&self.command_schema, &mut values)?;
        fill(&mut writer)?;
        writer.finish()?;
        self.commands.queue(tick, values);
        Ok(())
    }

    /// Queues an event to the server.
    pub fn queue_event(&mut self, event: Event) -> SessionResult<()> {
        let schema = self
            .event_registry
            .get(event.type_id)
            .ok_or(SessionError::UnknownEventType {
                type_id: event.type_id,
            })?;
        if event.payload.len() < schema.word_count() {
            return Err(SessionError::Schema(schema::SchemaError::BufferTooSmall {
                needed: schema.word_count(),
                available: event.payload.len(),
            }));
        }
        self.events_out.queue(event);
        Ok(())
    }

    /// Pumps the session: processes received packages, reports state
    /// changes through `consumer`, sends one package, and returns what
    /// happened.
    pub fn update(
        &mut self,
        now_ms: u64,
        consumer: &mut dyn SnapshotConsumer,
    ) -> Vec<ClientEvent> {
        if self.state == ClientState::Disconnected {
            return std::mem::take(&mut self.pending);
        }

        let mut resolutions = Vec::new();
        while let Some(datagram) = self.transport.recv() {
            let Some(received) = self.endpoint.receive(&datagram, now_ms, &mut resolutions) else {
                continue;
            };
            if let Err(err) = self.process_package(received.flags, &received.body, now_ms, consumer)
            {
                warn!("disconnecting after error: {err}");
                self.disconnect(err.to_string());
                return std::mem::take(&mut self.pending);
            }
        }
        self.apply_resolutions(resolutions);

        if self.state == ClientState::Connected
            && now_ms.saturating_sub(self.endpoint.last_received_ms)
                > self.config.disconnect_timeout_ms
        {
            self.disconnect("timed out".to_owned());
            return std::mem::take(&mut self.pending);
        }

        if let Err(err) = self.send_package(now_ms) {
            warn!("send failed: {err}");
            self.disconnect(err.to_string());
        }
        std::mem::take(&mut self.pending)
    }

    fn disconnect(&mut self, reason: String) {
        self.state = ClientState::Disconnected;
        self.entities.clear();
        self.pending.push(ClientEvent::Disconnected { reason });
    }

    fn apply_resolutions(&mut self, resolutions: Vec<Resolution>) {
        for mut resolution in resolutions {
            match resolution.fate {
                PackageFate::Delivered => {
                    self.events_out.on_delivered(&resolution.summary);
                    if let Some(tick) = resolution.summary.max_command_tick {
                        self.commands.prune(tick);
                    }
                }
                PackageFate::Lost => {
                    let resent = self.events_out.on_lost(&mut resolution.summary);
                    self.endpoint.stats.events_resent += resent;
                }
            }
        }
    }

    fn process_package(
        &mut self,
        flags: ContentFlags,
        body: &[u8],
        now_ms: u64,
        consumer: &mut dyn SnapshotConsumer,
    ) -> SessionResult<()> {
        if flags.contains(ContentFlags::CLIENT_INFO) {
            return self.process_client_info(body);
        }
        if self.state != ClientState::Connected {
            return Ok(());
        }

        let mode = self.endpoint.body_mode(flags);
        let mut input = InputStream::new(mode, &self.endpoint.model, body);
        if flags.contains(ContentFlags::MAP_INFO) {
            let sequence = input.read_packed_uint(STRUCT_CONTEXT)? as u32;
            let length = input.read_packed_uint(STRUCT_CONTEXT)? as usize;
            if length > MAX_FRAGMENTS * fragment_threshold(self.config.mtu) {
                // Cannot fit in a reassembled package; do not allocate for it.
                return Err(SessionError::MalformedBlock {
                    what: "map name length",
                });
            }
            let mut bytes = vec![0u8; length];
            input.read_raw_bytes(&mut bytes)?;
            let name = String::from_utf8_lossy(&bytes).into_owned();
            if self.map.as_ref().map(|(s, _)| *s) != Some(sequence) {
                // A new map invalidates every replicated entity.
                info!("map changed to {name:?}, resetting world");
                self.entities.clear();
                self.last_snapshot_tick = 0;
                self.map = Some((sequence, name));
            }
        }
        if flags.contains(ContentFlags::EVENTS) {
            for event in events::read_block(&mut self.event_registry, &mut input)? {
                self.pending.push(ClientEvent::Event(event));
            }
        }
        if flags.contains(ContentFlags::SNAPSHOT) {
            read_snapshot_block(
                &mut self.entities,
                &mut self.entity_types,
                &mut self.last_snapshot_tick,
                self.debug_hash,
                now_ms,
                &mut input,
                consumer,
            )?;
        }
        Ok(())
    }

    fn process_client_info(&mut self, body: &[u8]) -> SessionResult<()> {
        let mut input = InputStream::new(StreamMode::Raw, &self.endpoint.model, body);
        let client_id = input.read_packed_uint(STRUCT_CONTEXT)? as u32;
        let version = input.read_packed_uint(STRUCT_CONTEXT)? as u16;
        if version != PROTOCOL_VERSION {
            return Err(SessionError::ProtocolVersion {
                ours: PROTOCOL_VERSION,
                theirs: version,
            });
        }
        let tick_rate = input.read_packed_uint(STRUCT_CONTEXT)? as u32;
        let debug_hash = input.read_bool()?;
        let raw_mode = input.read_raw_bits(8)? as u8;
        let mode = StreamMode::from_raw(raw_mode).ok_or(SessionError::ConnectionRefused {
            reason: "unknown stream mode",
        })?;
        if mode == StreamMode::Huffman {
            let length = input.read_packed_uint(STRUCT_CONTEXT)? as usize;
            if length > MAX_FRAGMENTS * fragment_threshold(self.config.mtu) {
                return Err(SessionError::MalformedBlock {
                    what: "model blob length",
                });
            }
            let mut blob = vec![0u8; length];
            input.read_raw_bytes(&mut blob)?;
            self.endpoint.model = CompressionModel::from_bytes(&blob)?;
        }

        self.client_id = Some(client_id);
        self.server_tick_rate = tick_rate;
        self.debug_hash = debug_hash;
        self.endpoint.mode = mode;
        if self.state == ClientState::Connecting {
            self.state = ClientState::Connected;
            info!("connected as client {client_id}, tick rate {tick_rate}");
            self.pending.push(ClientEvent::Connected);
        }
        Ok(())
    }

    fn send_package(&mut self, now_ms: u64) -> SessionResult<()> {
        let mut resolutions = Vec::new();
        if self.endpoint.choked() {
            if now_ms.saturating_sub(self.endpoint.last_sent_ms)
                >= self.config.keepalive_interval_ms
            {
                self.endpoint.stats.choked_sends += 1;
                self.endpoint.send(
                    ContentFlags::empty(),
                    &[],
                    PackageSummary::default(),
                    self.transport.as_mut(),
                    now_ms,
                    &mut resolutions,
                )?;
            }
            self.apply_resolutions(resolutions);
            return Ok(());
        }

        match self.state {
            ClientState::Disconnected => Ok(()),
            ClientState::Connecting => {
                let due = self
                    .last_connect_attempt_ms
                    .is_none_or(|t| now_ms.saturating_sub(t) >= self.config.connect_retry_ms);
                if !due {
                    return Ok(());
                }
                self.last_connect_attempt_ms = Some(now_ms);
                let flags = ContentFlags::empty().with(ContentFlags::CLIENT_CONFIG);
                let mut out = bitio::OutputStream::new(StreamMode::Raw, &self.endpoint.model);
                out.write_packed_uint(STRUCT_CONTEXT, u64::from(PROTOCOL_VERSION))?;
                out.write_raw_bits((self.command_hash >> 32) as u32, 32)?;
                out.write_raw_bits(self.command_hash as u32, 32)?;
                let body = out.finish();
                self.endpoint.send(
                    flags,
                    &body,
                    PackageSummary::default(),
                    self.transport.as_mut(),
                    now_ms,
                    &mut resolutions,
                )?;
                self.apply_resolutions(resolutions);
                Ok(())
            }
            ClientState::Connected => {
                let mut summary = PackageSummary::default();
                let mut flags = ContentFlags::empty();
                if self.last_snapshot_tick > 0 {
                    flags = flags.with(ContentFlags::SNAPSHOT_ACK);
                }
                if self.commands.has_pending() {
                    flags = flags.with(ContentFlags::COMMANDS);
                }
                if self.events_out.has_pending() {
                    flags = flags.with(ContentFlags::EVENTS);
                }
                let mut out = bitio::OutputStream::new(
                    self.endpoint.body_mode(flags),
                    &self.endpoint.model,
                );
                if flags.contains(ContentFlags::SNAPSHOT_ACK) {
                    out.write_packed_uint(STRUCT_CONTEXT, self.last_snapshot_tick)?;
                }
                if flags.contains(ContentFlags::COMMANDS) {
                    summary.max_command_tick =
                        self.commands.write_block(&self.command_schema, &mut out)?;
                }
                if flags.contains(ContentFlags::EVENTS) {
                    self.events_out
                        .write_block(&self.event_registry, &mut out, &mut summary)?;
                }
                let body = out.finish();
                self.endpoint.send(
                    flags,
                    &body,
                    summary,
                    self.transport.as_mut(),
                    now_ms,
                    &mut resolutions,
                )?;
                self.apply_resolutions(resolutions);
                Ok(())
            }
        }
    }
}

#[allow(clippy::too_many_lines)]
fn read_snapshot_block(
    entities: &mut HashMap<u32, Entity>,
    entity_types: &mut HashMap<u16, EntityType>,
    last_snapshot_tick: &mut u64,
    verify_hash: bool,
    now_ms: u64,
    input: &mut InputStream<'_>,
    consumer: &mut dyn SnapshotConsumer,
) -> SessionResult<()> {
    let tick = input.read_packed_uint(STRUCT_CONTEXT)?;
    if tick <= *last_snapshot_tick && *last_snapshot_tick != 0 {
        // An older snapshot arriving late; the block is the last thing in
        // the package, so parsing can simply stop here.
        debug!("skipping stale snapshot tick {tick}");
        return Ok(());
    }

    let baseline_count = input.read_packed_uint(STRUCT_CONTEXT)? as usize;
    if baseline_count > MAX_BASELINES {
        // The server never lists more than MAX_BASELINES ticks.
        return Err(SessionError::MalformedBlock {
            what: "snapshot baseline count",
        });
    }
    let mut baselines = Vec::with_capacity(baseline_count);
    for _ in 0..baseline_count {
        let delta = input.read_packed_uint(STRUCT_CONTEXT)?;
        let baseline_tick = tick
            .checked_sub(delta)
            .ok_or(SessionError::MalformedBlock {
                what: "snapshot baseline tick",
            })?;
        baselines.push(baseline_tick);
    }

    let schema_count = input.read_packed_uint(STRUCT_CONTEXT)? as usize;
    for _ in 0..schema_count {
        let schema = assign_contexts(&read_schema(input)?)?;
        let mut default_values = vec![0u32; schema.word_count()];
        copy_fields_from_stream(&schema, &mut default_values, input)?;
        entity_types.insert(
            schema.id(),
            EntityType {
                schema,
                default_values,
            },
        );
    }

    let spawn_count = input.read_packed_uint(STRUCT_CONTEXT)? as usize;
    // Counts come off the wire; cap reservations and let the reads run dry.
    let mut spawns = Vec::with_capacity(spawn_count.min(CLIENT_ACK_CACHE_SIZE));
    for _ in 0..spawn_count {
        let entity_id = input.read_packed_uint(STRUCT_CONTEXT)? as u32;
        let type_id = input.read_packed_uint(STRUCT_CONTEXT)? as u16;
        let ty = entity_types
            .get(&type_id)
            .ok_or(SessionError::UnknownEntityType { type_id })?;
        // The server resends a spawn until it sees our ack; only the first
        // receipt creates the entity.
        if !entities.contains_key(&entity_id) {
            entities.insert(
                entity_id,
                Entity {
                    type_id,
                    window: BaselineWindow::new(CLIENT_ACK_CACHE_SIZE, ty.schema.word_count()),
                },
            );
            spawns.push((entity_id, type_id));
        }
    }

    let despawn_count = input.read_packed_uint(STRUCT_CONTEXT)? as usize;
    let mut despawns = Vec::with_capacity(despawn_count.min(CLIENT_ACK_CACHE_SIZE));
    for _ in 0..despawn_count {
        despawns.push(input.read_packed_uint(STRUCT_CONTEXT)? as u32);
    }

    let update_count = input.read_packed_uint(STRUCT_CONTEXT)? as usize;
    let mut updates: Vec<(u32, Vec<u32>)> =
        Vec::with_capacity(update_count.min(CLIENT_ACK_CACHE_SIZE));
    let mut hash = SnapshotHash::new();
    let mut predicted = Vec::new();
    for _ in 0..update_count {
        let entity_id = input.read_packed_uint(STRUCT_CONTEXT)? as u32;
        let viewer_mask = input.read_raw_bits(8)? as u8;
        let use_bits = if baselines.is_empty() {
            0
        } else {
            input.read_raw_bits(baselines.len() as u8)?
        };
        let entity = entities
            .get_mut(&entity_id)
            .ok_or(SessionError::UnknownEntity { entity_id })?;
        let ty = entity_types
            .get(&entity.type_id)
            .ok_or(SessionError::UnknownEntityType {
                type_id: entity.type_id,
            })?;
        let schema = &ty.schema;

        let mut usable = Vec::with_capacity(MAX_BASELINES);
        for (bit, &baseline_tick) in baselines.iter().enumerate() {
            if use_bits & (1 << bit) == 0 {
                continue;
            }
            let buffer = entity
                .window
                .get(baseline_tick)
                .ok_or(SessionError::MissingBaseline {
                    entity_id,
                    tick: baseline_tick,
                })?;
            usable.push(Baseline::new(baseline_tick, buffer));
        }

        let mut current = vec![0u32; schema.word_count()];
        predicted.clear();
        predicted.resize(schema.word_count(), 0);
        if usable.is_empty() {
            predicted.copy_from_slice(&ty.default_values);
            let no_prediction = ChangeBitmap::new();
            read_delta(
                schema,
                &ty.default_values,
                &predicted,
                &no_prediction,
                viewer_mask,
                input,
                &mut current,
                &mut hash,
            )?;
        } else {
            let predicted_changed = predict(schema, &usable, tick, &mut predicted)?;
            read_delta(
                schema,
                usable[0].buffer,
                &predicted,
                &predicted_changed,
                viewer_mask,
                input,
                &mut current,
                &mut hash,
            )?;
        }
        entity.window.insert(tick, &current);
        updates.push((entity_id, current));
    }

    if verify_hash {
        let high = input.read_raw_bits(32)?;
        let low = input.read_raw_bits(32)?;
        let reported = (u64::from(high) << 32) | u64::from(low);
        let computed = hash.value();
        if computed != reported {
            return Err(SessionError::SnapshotHashMismatch {
                tick,
                computed,
                reported,
            });
        }
    }

    // Notify in a fixed order: spawns, updates, despawns.
    for (entity_id, type_id) in spawns {
        consumer.entity_spawn(now_ms, entity_id, type_id);
    }
    for (entity_id, buffer) in &updates {
        let Some(entity) = entities.get(entity_id) else {
            continue;
        };
        let schema = &entity_types[&entity.type_id].schema;
        let mut reader = FieldReader::new(schema, buffer)?;
        consumer.entity_update(now_ms, *entity_id, &mut reader)?;
    }
    let mut removed = Vec::new();
    for entity_id in despawns {
        if entities.remove(&entity_id).is_some() {
            removed.push(entity_id);
        }
    }
    if !removed.is_empty() {
        consumer.entity_despawns(now_ms, &removed);
    }

    *last_snapshot_tick = tick;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitio::OutputStream;

    use crate::context::MODEL_CONTEXTS;

    struct NullConsumer;

    impl SnapshotConsumer for NullConsumer {
        fn entity_spawn(&mut self, _time_ms: u64, _entity: u32, _type_id: u16) {}

        fn entity_update(
            &mut self,
            _time_ms: u64,
            _entity: u32,
            _reader: &mut FieldReader<'_>,
        ) -> schema::SchemaResult<()> {
            Ok(())
        }

        fn entity_despawns(&mut self, _time_ms: u64, _entities: &[u32]) {}
    }

    fn decode_snapshot(body: &[u8]) -> SessionResult<()> {
        let model = CompressionModel::uniform(MODEL_CONTEXTS);
        let mut input = InputStream::new(StreamMode::Raw, &model, body);
        let mut entities = HashMap::new();
        let mut entity_types = HashMap::new();
        let mut last_tick = 0u64;
        read_snapshot_block(
            &mut entities,
            &mut entity_types,
            &mut last_tick,
            false,
            0,
            &mut input,
            &mut NullConsumer,
        )
    }

    #[test]
    fn baseline_reaching_before_tick_zero_is_rejected() {
        let model = CompressionModel::uniform(MODEL_CONTEXTS);
        let mut out = OutputStream::new(StreamMode::Raw, &model);
        out.write_packed_uint(STRUCT_CONTEXT, 5).unwrap();
        out.write_packed_uint(STRUCT_CONTEXT, 1).unwrap();
        // A baseline delta larger than the snapshot tick itself.
        out.write_packed_uint(STRUCT_CONTEXT, 100).unwrap();
        let err = decode_snapshot(&out.finish()).unwrap_err();
        assert!(matches!(err, SessionError::MalformedBlock { .. }));
    }

    #[test]
    fn oversized_baseline_list_is_rejected() {
        let model = CompressionModel::uniform(MODEL_CONTEXTS);
        let mut out = OutputStream::new(StreamMode::Raw, &model);
        out.write_packed_uint(STRUCT_CONTEXT, 5).unwrap();
        out.write_packed_uint(STRUCT_CONTEXT, 256).unwrap();
        let err = decode_snapshot(&out.finish()).unwrap_err();
        assert!(matches!(err, SessionError::MalformedBlock { .. }));
    }
}
