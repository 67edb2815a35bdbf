//! Server session: world registry, per-client replication, handshakes.
//!
//! The server owns the authoritative tick counter and a value-buffer
//! history per entity. Each connected client tracks which snapshot ticks
//! that client has fully processed; every outgoing snapshot is delta-coded
//! against up to three of those ticks, so a lost package never needs
//! retransmission, only a delta against an older baseline.

use std::collections::{HashMap, HashSet};

use bitio::{CompressionModel, FrequencyCapture, OutputStream, StreamMode};
use codec::{
    predict, write_delta, Baseline, BaselineWindow, ChangeBitmap, SnapshotHash, MASK_NOT_PREDICTING,
    MASK_PREDICTING, MAX_BASELINES,
};
use log::{debug, info, warn};
use schema::{
    copy_fields_to_stream, schema_hash, write_schema, FieldDescriptor, FieldWriter, Schema,
};
use wire::{ContentFlags, PackageFate, SNAPSHOT_CACHE_SIZE};

use crate::commands;
use crate::config::{Config, PROTOCOL_VERSION};
use crate::connection::{Endpoint, PackageSummary, Resolution};
use crate::context::assign_contexts;
use crate::error::{SessionError, SessionResult};
use crate::events::{self, Event, EventChannel, EventRegistry};
use crate::stats::ConnectionStats;
use crate::traits::{CommandProcessor, ConnectionId, EntityId, SnapshotGenerator, Transport};

const STRUCT_CONTEXT: u16 = 0;

/// Schema id reserved for the command layout.
pub(crate) const COMMAND_SCHEMA_ID: u16 = 0;

/// Ticks a despawned entity's id stays quarantined before reuse, on top of
/// every client acknowledging the despawn.
const ID_RECYCLE_DELAY: u64 = 128;

/// Things that happened on the server since the last update call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A client completed the handshake.
    Connected(ConnectionId),
    /// A client was disconnected.
    Disconnected {
        /// The connection that ended.
        connection: ConnectionId,
        /// Why it ended.
        reason: String,
    },
    /// A client sent an event.
    Event {
        /// The sending connection.
        connection: ConnectionId,
        /// The decoded event.
        event: Event,
    },
}

struct EntityType {
    schema: Schema,
    /// Baseline for entities the client has no acknowledged history for.
    default_values: Vec<u32>,
}

struct EntityRecord {
    type_id: u16,
    spawn_tick: u64,
    despawn_tick: Option<u64>,
    history: BaselineWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    AwaitingConfig,
    Connected,
}

struct Connection {
    id: ConnectionId,
    transport: Box<dyn Transport>,
    endpoint: Endpoint,
    state: ConnectionState,
    /// Client holds our client-info block.
    handshake_acked: bool,
    map_acked: bool,
    acked_entity_types: HashSet<u16>,
    /// Snapshot ticks the client has fully processed, ascending, at most
    /// [`MAX_BASELINES`].
    acked_snapshot_ticks: Vec<u64>,
    last_processed_command_tick: u64,
    events: EventChannel,
    predicted_entities: HashSet<EntityId>,
    dead: Option<String>,
}

impl Connection {
    fn newest_acked_tick(&self) -> Option<u64> {
        self.acked_snapshot_ticks.last().copied()
    }
}

/// The authoritative replication endpoint.
pub struct Server {
    config: Config,
    command_schema: Schema,
    command_hash: u64,
    entity_types: HashMap<u16, EntityType>,
    event_registry: EventRegistry,
    entities: HashMap<EntityId, EntityRecord>,
    free_entity_ids: Vec<EntityId>,
    next_entity_id: EntityId,
    tick: u64,
    map: Option<(u32, String)>,
    model: CompressionModel,
    capture: Option<FrequencyCapture>,
    connections: Vec<Connection>,
    next_connection_id: ConnectionId,
    pending: Vec<ServerEvent>,
}

impl Server {
    /// Creates a server speaking the given command layout.
    pub fn new(config: Config, command_fields: Vec<FieldDescriptor>) -> SessionResult<Self> {
        let command_schema = assign_contexts(&Schema::new(COMMAND_SCHEMA_ID, command_fields)?)?;
        let command_hash = schema_hash(&command_schema);
        Ok(Self {
            config,
            command_schema,
            command_hash,
            entity_types: HashMap::new(),
            event_registry: EventRegistry::default(),
            entities: HashMap::new(),
            free_entity_ids: Vec::new(),
            next_entity_id: 1,
            tick: 0,
            map: None,
            model: CompressionModel::uniform(crate::context::MODEL_CONTEXTS),
            capture: None,
            connections: Vec::new(),
            next_connection_id: 1,
            pending: Vec::new(),
        })
    }

    /// Current server tick; advances with each generated snapshot.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Registers a replicated entity type. New entities of this type start
    /// from a zeroed value buffer as the client-side default baseline.
    pub fn register_entity_type(
        &mut self,
        type_id: u16,
        fields: Vec<FieldDescriptor>,
    ) -> SessionResult<()> {
        let schema = assign_contexts(&Schema::new(type_id, fields)?)?;
        let default_values = vec![0u32; schema.word_count()];
        self.entity_types.insert(
            type_id,
            EntityType {
                schema,
                default_values,
            },
        );
        Ok(())
    }

    /// Registers an event type for either direction.
    pub fn register_event_type(
        &mut self,
        type_id: u16,
        fields: Vec<FieldDescriptor>,
    ) -> SessionResult<()> {
        self.event_registry.register(type_id, fields)
    }

    /// Replaces the compression model used for Huffman-coded packages.
    /// Affects connections added afterwards.
    pub fn set_compression_model(&mut self, model: CompressionModel) {
        self.model = model;
    }

    /// Starts recording symbol frequencies from outgoing packages.
    pub fn start_capture(&mut self) {
        self.capture = Some(FrequencyCapture::new(crate::context::MODEL_CONTEXTS));
    }

    /// Stops recording and builds a model from the captured frequencies.
    pub fn finish_capture(&mut self) -> Option<CompressionModel> {
        self.capture.take().map(|capture| capture.build_model())
    }

    /// Announces the current map. Clients receive it reliably; a new map
    /// resets their world state.
    pub fn set_map(&mut self, name: &str) {
        let sequence = self.map.as_ref().map_or(1, |(s, _)| s + 1);
        self.map = Some((sequence, name.to_owned()));
        for connection in &mut self.connections {
            connection.map_acked = false;
        }
    }

    /// Adds a client on its own transport. The connection completes once
    /// the client's config block arrives and validates.
    pub fn add_connection(
        &mut self,
        transport: Box<dyn Transport>,
        now_ms: u64,
    ) -> SessionResult<ConnectionId> {
        let active = self.connections.iter().filter(|c| c.dead.is_none()).count();
        if active >= self.config.max_clients {
            return Err(SessionError::ConnectionRefused {
                reason: "server full",
            });
        }
        let id = self.next_connection_id;
        self.next_connection_id += 1;
        let mut endpoint = Endpoint::new(self.config.mtu, now_ms);
        endpoint.mode = self.config.stream_mode;
        endpoint.model = self.model.clone();
        self.connections.push(Connection {
            id,
            transport,
            endpoint,
            state: ConnectionState::AwaitingConfig,
            handshake_acked: false,
            map_acked: self.map.is_none(),
            acked_entity_types: HashSet::new(),
            acked_snapshot_ticks: Vec::new(),
            last_processed_command_tick: 0,
            events: EventChannel::default(),
            predicted_entities: HashSet::new(),
            dead: None,
        });
        info!("connection {id} added");
        Ok(id)
    }

    /// Disconnects a client.
    pub fn remove_connection(&mut self, connection: ConnectionId) {
        if let Some(c) = self.connections.iter_mut().find(|c| c.id == connection) {
            if c.dead.is_none() {
                c.dead = Some("removed by server".to_owned());
            }
        }
    }

    /// Spawns a replicated entity; it first appears in the next generated
    /// snapshot.
    pub fn register_entity(&mut self, type_id: u16) -> SessionResult<EntityId> {
        let words = self
            .entity_types
            .get(&type_id)
            .ok_or(SessionError::UnknownEntityType { type_id })?
            .schema
            .word_count();
        let id = self.free_entity_ids.pop().unwrap_or_else(|| {
            let id = self.next_entity_id;
            self.next_entity_id += 1;
            id
        });
        self.entities.insert(
            id,
            EntityRecord {
                type_id,
                spawn_tick: self.tick + 1,
                despawn_tick: None,
                history: BaselineWindow::new(SNAPSHOT_CACHE_SIZE, words),
            },
        );
        debug!("entity {id} registered, type {type_id}");
        Ok(id)
    }

    /// Despawns an entity as of the next generated snapshot. Its id is
    /// reused only after every client has acknowledged the despawn and a
    /// quarantine of [`ID_RECYCLE_DELAY`] ticks has passed.
    pub fn despawn_entity(&mut self, entity: EntityId) -> SessionResult<()> {
        let record = self
            .entities
            .get_mut(&entity)
            .ok_or(SessionError::UnknownEntity { entity_id: entity })?;
        if record.despawn_tick.is_none() {
            record.despawn_tick = Some(self.tick + 1);
        }
        Ok(())
    }

    /// Marks whether `connection` predicts `entity`, selecting which
    /// field-mask bits that client receives.
    pub fn set_predicted_entity(
        &mut self,
        connection: ConnectionId,
        entity: EntityId,
        predicted: bool,
    ) {
        if let Some(c) = self.connections.iter_mut().find(|c| c.id == connection) {
            if predicted {
                c.predicted_entities.insert(entity);
            } else {
                c.predicted_entities.remove(&entity);
            }
        }
    }

    /// Queues an event to one client.
    pub fn queue_event(&mut self, connection: ConnectionId, event: Event) -> SessionResult<()> {
        Self::check_event(&self.event_registry, &event)?;
        let c = self
            .connections
            .iter_mut()
            .find(|c| c.id == connection && c.dead.is_none())
            .ok_or(SessionError::NotConnected)?;
        c.events.queue(event);
        Ok(())
    }

    /// Queues an event to every connected client.
    pub fn broadcast_event(&mut self, event: Event) -> SessionResult<()> {
        Self::check_event(&self.event_registry, &event)?;
        for c in &mut self.connections {
            if c.dead.is_none() && c.state == ConnectionState::Connected {
                c.events.queue(event.clone());
            }
        }
        Ok(())
    }

    fn check_event(registry: &EventRegistry, event: &Event) -> SessionResult<()> {
        let schema = registry
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
        Ok(())
    }

    /// Connection counters, while the connection exists.
    #[must_use]
    pub fn stats(&self, connection: ConnectionId) -> Option<&ConnectionStats> {
        self.connections
            .iter()
            .find(|c| c.id == connection)
            .map(|c| &c.endpoint.stats)
    }

    /// Smoothed RTT for one connection in milliseconds.
    #[must_use]
    pub fn rtt_ms(&self, connection: ConnectionId) -> Option<f32> {
        self.connections
            .iter()
            .find(|c| c.id == connection)
            .map(|c| c.endpoint.rtt_ms())
    }

    /// The client's own RTT estimate, as last reported in a package header.
    #[must_use]
    pub fn peer_rtt_ms(&self, connection: ConnectionId) -> Option<u8> {
        self.connections
            .iter()
            .find(|c| c.id == connection)
            .map(|c| c.endpoint.peer_rtt_ms())
    }

    /// Advances the tick and captures every live entity's field values.
    pub fn generate_snapshot(
        &mut self,
        generator: &mut dyn SnapshotGenerator,
    ) -> SessionResult<u64> {
        self.tick += 1;
        let tick = self.tick;
        let mut buffer = Vec::new();
        for (&id, record) in &mut self.entities {
            if record.spawn_tick > tick || record.despawn_tick.is_some_and(|d| d <= tick) {
                continue;
            }
            let schema = &self
                .entity_types
                .get(&record.type_id)
                .ok_or(SessionError::UnknownEntityType {
                    type_id: record.type_id,
                })?
                .schema;
            buffer.clear();
            buffer.resize(schema.word_count(), 0);
            let mut writer = FieldWriter::new(schema, &mut buffer)?;
            generator.generate(id, &mut writer)?;
            writer.finish()?;
            record.history.insert(tick, &buffer);
        }
        self.recycle_entity_ids();
        Ok(tick)
    }

    fn recycle_entity_ids(&mut self) {
        let tick = self.tick;
        let floor: Option<u64> = self
            .connections
            .iter()
            .filter(|c| c.dead.is_none() && c.state == ConnectionState::Connected)
            .map(|c| c.newest_acked_tick().unwrap_or(0))
            .min();
        let mut freed = Vec::new();
        self.entities.retain(|&id, record| {
            let Some(despawn) = record.despawn_tick else {
                return true;
            };
            let aged = tick.saturating_sub(despawn) >= ID_RECYCLE_DELAY;
            let acked_everywhere = floor.is_none_or(|f| f >= despawn);
            if aged && acked_everywhere {
                freed.push(id);
                false
            } else {
                true
            }
        });
        for id in freed {
            debug!("entity id {id} recycled");
            self.free_entity_ids.push(id);
        }
    }

    /// Pumps every connection: receives and processes client packages,
    /// feeds commands to `processor`, sends one package per connection,
    /// and returns everything that happened.
    pub fn update(
        &mut self,
        now_ms: u64,
        processor: &mut dyn CommandProcessor,
    ) -> Vec<ServerEvent> {
        for index in 0..self.connections.len() {
            self.pump_connection(index, now_ms, processor);
        }
        self.sweep_dead_connections();
        std::mem::take(&mut self.pending)
    }

    fn pump_connection(&mut self, index: usize, now_ms: u64, processor: &mut dyn CommandProcessor) {
        let mut resolutions = Vec::new();
        loop {
            let connection = &mut self.connections[index];
            if connection.dead.is_some() {
                return;
            }
            let Some(datagram) = connection.transport.recv() else {
                break;
            };
            let Some(received) = connection
                .endpoint
                .receive(&datagram, now_ms, &mut resolutions)
            else {
                continue;
            };
            if let Err(err) = self.process_package(index, received.flags, &received.body, processor)
            {
                let connection = &mut self.connections[index];
                warn!("connection {}: dropping after error: {err}", connection.id);
                connection.dead = Some(err.to_string());
                return;
            }
        }
        self.apply_resolutions(index, resolutions);

        let connection = &mut self.connections[index];
        if now_ms.saturating_sub(connection.endpoint.last_received_ms)
            > self.config.disconnect_timeout_ms
        {
            connection.dead = Some("timed out".to_owned());
            return;
        }
        if let Err(err) = self.send_package(index, now_ms) {
            let connection = &mut self.connections[index];
            warn!("connection {}: send failed: {err}", connection.id);
            connection.dead = Some(err.to_string());
        }
    }

    fn apply_resolutions(&mut self, index: usize, resolutions: Vec<Resolution>) {
        let connection = &mut self.connections[index];
        for mut resolution in resolutions {
            match resolution.fate {
                PackageFate::Delivered => {
                    connection.events.on_delivered(&resolution.summary);
                    connection
                        .acked_entity_types
                        .extend(resolution.summary.entity_schema_types.iter());
                    if resolution.summary.client_info {
                        connection.handshake_acked = true;
                    }
                    if resolution.summary.map_info {
                        connection.map_acked = true;
                    }
                }
                PackageFate::Lost => {
                    let resent = connection.events.on_lost(&mut resolution.summary);
                    connection.endpoint.stats.events_resent += resent;
                }
            }
        }
    }

    fn record_acked_tick(acked: &mut Vec<u64>, tick: u64) {
        if acked.last().is_some_and(|&t| t >= tick) {
            return;
        }
        acked.push(tick);
        if acked.len() > MAX_BASELINES {
            acked.remove(0);
        }
    }

    fn process_package(
        &mut self,
        index: usize,
        flags: ContentFlags,
        body: &[u8],
        processor: &mut dyn CommandProcessor,
    ) -> SessionResult<()> {
        let connection = &mut self.connections[index];
        let mode = connection.endpoint.body_mode(flags);
        let mut input = bitio::InputStream::new(mode, &connection.endpoint.model, body);

        if flags.contains(ContentFlags::CLIENT_CONFIG) {
            let version = input.read_packed_uint(STRUCT_CONTEXT)? as u16;
            let hash_high = input.read_raw_bits(32)?;
            let hash_low = input.read_raw_bits(32)?;
            let theirs = (u64::from(hash_high) << 32) | u64::from(hash_low);
            if version != PROTOCOL_VERSION {
                return Err(SessionError::ProtocolVersion {
                    ours: PROTOCOL_VERSION,
                    theirs: version,
                });
            }
            if theirs != self.command_hash {
                return Err(SessionError::CommandSchemaMismatch {
                    ours: self.command_hash,
                    theirs,
                });
            }
            if connection.state == ConnectionState::AwaitingConfig {
                connection.state = ConnectionState::Connected;
                info!("connection {} completed handshake", connection.id);
                self.pending.push(ServerEvent::Connected(connection.id));
            }
            return Ok(());
        }

        if connection.state != ConnectionState::Connected {
            // Content before the handshake; ignore rather than guess.
            return Ok(());
        }
        if flags.contains(ContentFlags::SNAPSHOT_ACK) {
            // The newest snapshot the client has fully decoded. Package
            // delivery alone cannot prove this: a delivered snapshot may
            // still be skipped client-side as stale.
            let tick = input.read_packed_uint(STRUCT_CONTEXT)?;
            Self::record_acked_tick(&mut connection.acked_snapshot_ticks, tick);
        }
        if flags.contains(ContentFlags::COMMANDS) {
            connection.last_processed_command_tick = commands::read_block(
                &self.command_schema,
                &mut input,
                connection.last_processed_command_tick,
                connection.id,
                processor,
            )?;
        }
        if flags.contains(ContentFlags::EVENTS) {
            let id = connection.id;
            for event in events::read_block(&mut self.event_registry, &mut input)? {
                self.pending.push(ServerEvent::Event {
                    connection: id,
                    event,
                });
            }
        }
        Ok(())
    }

    fn send_package(&mut self, index: usize, now_ms: u64) -> SessionResult<()> {
        let connection = &mut self.connections[index];
        if connection.state == ConnectionState::AwaitingConfig {
            return Ok(());
        }
        let mut resolutions = Vec::new();
        if connection.endpoint.choked() {
            if now_ms.saturating_sub(connection.endpoint.last_sent_ms)
                >= self.config.keepalive_interval_ms
            {
                connection.endpoint.stats.choked_sends += 1;
                connection.endpoint.send(
                    ContentFlags::empty(),
                    &[],
                    PackageSummary::default(),
                    connection.transport.as_mut(),
                    now_ms,
                    &mut resolutions,
                )?;
            }
            self.apply_resolutions(index, resolutions);
            return Ok(());
        }

        let mut summary = PackageSummary::default();
        let mut flags = ContentFlags::empty();
        let body = if connection.handshake_acked {
            if self.map.is_some() && !connection.map_acked {
                flags = flags.with(ContentFlags::MAP_INFO);
                summary.map_info = true;
            }
            if connection.events.has_pending() {
                flags = flags.with(ContentFlags::EVENTS);
            }
            if self.tick > 0 {
                flags = flags.with(ContentFlags::SNAPSHOT);
            }
            let mut out = bitio::OutputStream::new(
                connection.endpoint.body_mode(flags),
                &connection.endpoint.model,
            );
            if let Some(capture) = self.capture.as_mut() {
                out.attach_capture(capture);
            }
            if flags.contains(ContentFlags::MAP_INFO) {
                if let Some((sequence, name)) = &self.map {
                    write_map_info(*sequence, name, &mut out)?;
                }
            }
            if flags.contains(ContentFlags::EVENTS) {
                connection
                    .events
                    .write_block(&self.event_registry, &mut out, &mut summary)?;
            }
            if flags.contains(ContentFlags::SNAPSHOT) {
                write_snapshot_block(
                    self.tick,
                    self.config.debug_hash,
                    &self.entities,
                    &self.entity_types,
                    connection,
                    &mut out,
                    &mut summary,
                )?;
            }
            out.finish()
        } else {
            // Handshake packages are raw-coded and carry nothing else; the
            // client cannot decode entropy-coded content yet.
            flags = flags.with(ContentFlags::CLIENT_INFO);
            summary.client_info = true;
            let mut out =
                bitio::OutputStream::new(StreamMode::Raw, &connection.endpoint.model);
            write_client_info(
                connection.id,
                &self.config,
                &connection.endpoint.model,
                &mut out,
            )?;
            out.finish()
        };

        connection.endpoint.send(
            flags,
            &body,
            summary,
            connection.transport.as_mut(),
            now_ms,
            &mut resolutions,
        )?;
        self.apply_resolutions(index, resolutions);
        Ok(())
    }

    fn sweep_dead_connections(&mut self) {
        let pending = &mut self.pending;
        self.connections.retain(|connection| {
            if let Some(reason) = &connection.dead {
                info!("connection {} closed: {reason}", connection.id);
                pending.push(ServerEvent::Disconnected {
                    connection: connection.id,
                    reason: reason.clone(),
                });
                false
            } else {
                true
            }
        });
    }
}

fn write_client_info(
    connection: ConnectionId,
    config: &Config,
    model: &CompressionModel,
    out: &mut OutputStream<'_>,
) -> SessionResult<()> {
    out.write_packed_uint(STRUCT_CONTEXT, u64::from(connection))?;
    out.write_packed_uint(STRUCT_CONTEXT, u64::from(PROTOCOL_VERSION))?;
    out.write_packed_uint(STRUCT_CONTEXT, u64::from(config.tick_rate))?;
    out.write_bool(config.debug_hash);
    out.write_raw_bits(u32::from(config.stream_mode.raw()), 8)?;
    if config.stream_mode == StreamMode::Huffman {
        let blob = model.to_bytes();
        out.write_packed_uint(STRUCT_CONTEXT, blob.len() as u64)?;
        out.write_raw_bytes(&blob)?;
    }
    Ok(())
}

fn write_map_info(sequence: u32, name: &str, out: &mut OutputStream<'_>) -> SessionResult<()> {
    out.write_packed_uint(STRUCT_CONTEXT, u64::from(sequence))?;
    out.write_packed_uint(STRUCT_CONTEXT, name.len() as u64)?;
    out.write_raw_bytes(name.as_bytes())?;
    Ok(())
}

fn write_snapshot_block(
    tick: u64,
    debug_hash: bool,
    entities: &HashMap<EntityId, EntityRecord>,
    entity_types: &HashMap<u16, EntityType>,
    connection: &Connection,
    out: &mut OutputStream<'_>,
    summary: &mut PackageSummary,
) -> SessionResult<()> {
    out.write_packed_uint(STRUCT_CONTEXT, tick)?;

    // Baseline ticks the client is known to have processed, newest first.
    let baselines: Vec<u64> = connection
        .acked_snapshot_ticks
        .iter()
        .rev()
        .copied()
        .filter(|&t| t < tick)
        .collect();
    out.write_packed_uint(STRUCT_CONTEXT, baselines.len() as u64)?;
    for &baseline_tick in &baselines {
        out.write_packed_uint(STRUCT_CONTEXT, tick - baseline_tick)?;
    }
    let newest_acked = baselines.first().copied();

    // Schemas the client has not acknowledged yet ride along with their
    // default baseline values.
    let mut unacked_types: Vec<u16> = entity_types
        .keys()
        .copied()
        .filter(|id| !connection.acked_entity_types.contains(id))
        .collect();
    unacked_types.sort_unstable();
    out.write_packed_uint(STRUCT_CONTEXT, unacked_types.len() as u64)?;
    for type_id in unacked_types {
        let ty = &entity_types[&type_id];
        write_schema(&ty.schema, out)?;
        copy_fields_to_stream(&ty.schema, &ty.default_values, out)?;
        summary.entity_schema_types.push(type_id);
    }

    // Classify every entity relative to what this client has processed.
    let mut ids: Vec<EntityId> = entities.keys().copied().collect();
    ids.sort_unstable();
    let mut spawns = Vec::new();
    let mut despawns = Vec::new();
    let mut updates = Vec::new();
    for id in ids {
        let record = &entities[&id];
        let alive = record.despawn_tick.is_none_or(|d| d > tick);
        if record.spawn_tick > tick {
            continue;
        }
        if record.despawn_tick.is_some_and(|d| newest_acked.is_some_and(|b| d <= b)) {
            continue;
        }
        let known = newest_acked.is_some_and(|b| record.spawn_tick <= b);
        match (known, alive) {
            (true, true) => updates.push(id),
            (true, false) => despawns.push(id),
            (false, true) => {
                spawns.push(id);
                updates.push(id);
            }
            // Spawned and despawned entirely between the client's baseline
            // and now; it never needs to hear about this entity.
            (false, false) => {}
        }
    }

    out.write_packed_uint(STRUCT_CONTEXT, spawns.len() as u64)?;
    for id in &spawns {
        out.write_packed_uint(STRUCT_CONTEXT, u64::from(*id))?;
        out.write_packed_uint(STRUCT_CONTEXT, u64::from(entities[id].type_id))?;
    }
    out.write_packed_uint(STRUCT_CONTEXT, despawns.len() as u64)?;
    for id in &despawns {
        out.write_packed_uint(STRUCT_CONTEXT, u64::from(*id))?;
    }

    let mut hash = SnapshotHash::new();
    out.write_packed_uint(STRUCT_CONTEXT, updates.len() as u64)?;
    let mut predicted = Vec::new();
    for id in updates {
        let record = &entities[&id];
        let ty = entity_types
            .get(&record.type_id)
            .ok_or(SessionError::UnknownEntityType {
                type_id: record.type_id,
            })?;
        let schema = &ty.schema;
        let current = record
            .history
            .get(tick)
            .ok_or(SessionError::MissingBaseline {
                entity_id: id,
                tick,
            })?;

        out.write_packed_uint(STRUCT_CONTEXT, u64::from(id))?;
        let viewer_mask = if connection.predicted_entities.contains(&id) {
            MASK_PREDICTING
        } else {
            MASK_NOT_PREDICTING
        };
        out.write_raw_bits(u32::from(viewer_mask), 8)?;

        // Which of the listed global baselines this entity's history still
        // holds; the client uses exactly these.
        let mut use_bits = 0u32;
        let mut usable = Vec::with_capacity(MAX_BASELINES);
        for (bit, &baseline_tick) in baselines.iter().enumerate() {
            if usable.len() == MAX_BASELINES {
                break;
            }
            if let Some(buffer) = record.history.get(baseline_tick) {
                use_bits |= 1 << bit;
                usable.push(Baseline::new(baseline_tick, buffer));
            }
        }
        if !baselines.is_empty() {
            out.write_raw_bits(use_bits, baselines.len() as u8)?;
        }

        predicted.clear();
        predicted.resize(schema.word_count(), 0);
        if usable.is_empty() {
            predicted.copy_from_slice(&ty.default_values);
            let no_prediction = ChangeBitmap::new();
            write_delta(
                schema,
                current,
                &ty.default_values,
                &predicted,
                &no_prediction,
                viewer_mask,
                out,
                &mut hash,
            )?;
        } else {
            let predicted_changed = predict(schema, &usable, tick, &mut predicted)?;
            write_delta(
                schema,
                current,
                usable[0].buffer,
                &predicted,
                &predicted_changed,
                viewer_mask,
                out,
                &mut hash,
            )?;
        }
    }

    if debug_hash {
        let value = hash.value();
        out.write_raw_bits((value >> 32) as u32, 32)?;
        out.write_raw_bits(value as u32, 32)?;
    }
    Ok(())
}
