//! Deterministic client/server replication demo over a loopback link.
//!
//! Runs one server and one client in a single process, steps a seeded toy
//! world, and prints a wire-cost summary. With `--huffman` a Raw training
//! pass builds an entropy model first and the measured pass runs
//! Huffman-coded, model delivery included.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use bitio::{CompressionModel, StreamMode};
use clap::Parser;
use demo_schema::{
    chat_fields, command_fields, player_fields, PlayerState, World, CHAT_EVENT, PLAYER_TYPE,
};
use log::info;
use schema::{FieldReader, FieldWriter, Schema, SchemaResult};
use serde::Serialize;
use session::{
    Client, ClientEvent, ClientState, CommandProcessor, Config, ConnectionId, EntityId, Event,
    LoopbackLink, Server, ServerEvent, SnapshotConsumer, SnapshotGenerator,
};

const STEP_MS: u64 = 16;
const CHURN_INTERVAL: u64 = 200;
const CLIENT_CHAT_INTERVAL: u64 = 97;
const SERVER_CHAT_INTERVAL: u64 = 120;
const FLUSH_TICKS: u64 = 60;

#[derive(Parser)]
#[command(
    name = "demo-sim",
    version,
    about = "Deterministic loopback replication demo"
)]
struct Cli {
    /// Number of simulated players.
    #[arg(long, default_value_t = 8)]
    players: u32,
    /// Ticks to simulate after the handshake.
    #[arg(long, default_value_t = 600)]
    ticks: u64,
    /// RNG seed for deterministic results.
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Drop every Nth datagram in both directions.
    #[arg(long)]
    drop_every: Option<usize>,
    /// Train an entropy model, then run the measured pass Huffman-coded.
    #[arg(long)]
    huffman: bool,
    /// Length of the Raw training pass in ticks.
    #[arg(long, default_value_t = 200)]
    train_ticks: u64,
    /// Attach and verify per-snapshot debug hashes.
    #[arg(long)]
    debug_hash: bool,
    /// Write the run summary as JSON to this path instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let model = if cli.huffman {
        info!("training entropy model over {} raw ticks", cli.train_ticks);
        Some(train_model(&cli)?)
    } else {
        None
    };

    let summary = run_pass(&cli, cli.ticks, model, false)?.summary;
    let json = serde_json::to_string_pretty(&summary).context("serialize summary")?;
    match &cli.out {
        Some(path) => {
            fs::write(path, &json).with_context(|| format!("write {}", path.display()))?;
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn train_model(cli: &Cli) -> Result<CompressionModel> {
    let outcome = run_pass(cli, cli.train_ticks, None, true)?;
    outcome.model.context("training pass produced no model")
}

struct PassOutcome {
    summary: Summary,
    model: Option<CompressionModel>,
}

#[allow(clippy::too_many_lines)]
fn run_pass(
    cli: &Cli,
    ticks: u64,
    model: Option<CompressionModel>,
    train: bool,
) -> Result<PassOutcome> {
    let mode = if model.is_some() {
        StreamMode::Huffman
    } else {
        StreamMode::Raw
    };
    let server_config = Config {
        stream_mode: mode,
        debug_hash: cli.debug_hash,
        ..Config::default()
    };

    let link = LoopbackLink::new();
    if let Some(n) = cli.drop_every.filter(|&n| n > 0) {
        let mut pattern = vec![false; n];
        pattern[n - 1] = true;
        link.set_drop_a_to_b(pattern.clone());
        link.set_drop_b_to_a(pattern);
    }
    let (server_end, client_end) = link.endpoints();

    let mut server = Server::new(server_config, command_fields())
        .context("create server")?;
    server
        .register_entity_type(PLAYER_TYPE, player_fields())
        .context("register player type")?;
    server
        .register_event_type(CHAT_EVENT, chat_fields())
        .context("register chat event")?;
    server.set_map("arena");
    if let Some(model) = model {
        server.set_compression_model(model);
    }
    if train {
        server.start_capture();
    }
    let connection = server.add_connection(Box::new(server_end), 0)?;

    let mut client = Client::new(Config::default(), command_fields(), Box::new(client_end))
        .context("create client")?;
    client
        .register_event_type(CHAT_EVENT, chat_fields())
        .context("register chat event")?;
    client.connect();

    let chat_schema = Schema::new(CHAT_EVENT, chat_fields()).context("chat schema")?;
    let mut world = World::new(cli.seed);
    let mut replica = Replica::default();
    let mut commands = CommandCounter::default();
    let mut now_ms = 0;
    let mut chat_to_client = 0u64;
    let mut chat_to_server = 0u64;

    // Handshake before the measured ticks start.
    for _ in 0..100 {
        now_ms += STEP_MS;
        server.update(now_ms, &mut commands);
        drain_client(&mut client, now_ms, &mut replica, &mut chat_to_client)?;
        if client.state() == ClientState::Connected {
            break;
        }
    }
    if client.state() != ClientState::Connected {
        bail!("handshake did not complete");
    }

    for idx in 0..cli.players {
        let id = server.register_entity(PLAYER_TYPE)?;
        world.spawn(id);
        if idx == 0 {
            server.set_predicted_entity(connection, id, true);
        }
    }

    for tick in 1..=ticks + FLUSH_TICKS {
        if tick == ticks {
            // Lossless tail so the replica can be checked for convergence.
            link.set_drop_a_to_b(Vec::new());
            link.set_drop_b_to_a(Vec::new());
        }
        now_ms += STEP_MS;
        world.step();

        if tick < ticks && tick % CHURN_INTERVAL == 0 && world.len() > 1 {
            let oldest = world.players().next().map(|(id, _)| id);
            if let Some(id) = oldest {
                server.despawn_entity(id)?;
                world.despawn(id);
            }
            let id = server.register_entity(PLAYER_TYPE)?;
            world.spawn(id);
        }

        server.generate_snapshot(&mut WorldGenerator { world: &world })?;
        for event in server.update(now_ms, &mut commands) {
            if matches!(event, ServerEvent::Event { .. }) {
                chat_to_server += 1;
            }
        }
        if tick % SERVER_CHAT_INTERVAL == 0 {
            server.broadcast_event(chat_event(&chat_schema, 0, "tick marker")?)?;
        }

        client.queue_command(tick, |writer| {
            writer.write_int((tick % 5) as i32 - 2)?;
            writer.write_int((tick % 7) as i32 - 3)?;
            writer.write_uint(u32::from(tick % 3 == 0))
        })?;
        if tick % CLIENT_CHAT_INTERVAL == 0 {
            client.queue_event(chat_event(&chat_schema, 1, "hello from the client")?)?;
        }
        drain_client(&mut client, now_ms, &mut replica, &mut chat_to_client)?;
    }

    verify_replica(&world, &replica)?;
    if commands.processed == 0 {
        bail!("no commands reached the server");
    }

    let server_stats = *server
        .stats(connection)
        .context("connection disappeared")?;
    let client_stats = *client.stats();
    let summary = Summary {
        mode: match mode {
            StreamMode::Raw => "raw",
            StreamMode::Huffman => "huffman",
        },
        players: cli.players,
        ticks,
        seed: cli.seed,
        server_packages_sent: server_stats.packages_sent,
        server_bytes_sent: server_stats.bytes_sent,
        avg_package_bytes: server_stats.bytes_sent / server_stats.packages_sent.max(1),
        client_packages_sent: client_stats.packages_sent,
        client_bytes_sent: client_stats.bytes_sent,
        datagrams_dropped: link.dropped_a_to_b() + link.dropped_b_to_a(),
        packages_lost: server_stats.packages_lost + client_stats.packages_lost,
        commands_processed: commands.processed,
        chat_to_server,
        chat_to_client,
        rtt_ms: client.rtt_ms(),
        server_reported_rtt_ms: client.peer_rtt_ms(),
    };
    info!(
        "{} pass done: {} snapshot packages, {} bytes, rtt {:.1} ms",
        summary.mode, summary.server_packages_sent, summary.server_bytes_sent, summary.rtt_ms
    );

    let model = if train { server.finish_capture() } else { None };
    Ok(PassOutcome { summary, model })
}

fn drain_client(
    client: &mut Client,
    now_ms: u64,
    replica: &mut Replica,
    chat_to_client: &mut u64,
) -> Result<()> {
    for event in client.update(now_ms, replica) {
        match event {
            ClientEvent::Event(_) => *chat_to_client += 1,
            ClientEvent::Disconnected { reason } => bail!("client disconnected: {reason}"),
            ClientEvent::Connected => {}
        }
    }
    Ok(())
}

fn chat_event(schema: &Schema, channel: u32, text: &str) -> Result<Event> {
    let mut payload = vec![0u32; schema.word_count()];
    let mut writer = FieldWriter::new(schema, &mut payload).context("chat writer")?;
    writer.write_uint(channel).context("chat channel")?;
    writer.write_string(Some(text)).context("chat text")?;
    writer.finish().context("chat payload")?;
    Ok(Event {
        type_id: CHAT_EVENT,
        reliable: true,
        payload,
    })
}

fn verify_replica(world: &World, replica: &Replica) -> Result<()> {
    if replica.players.len() != world.len() {
        bail!(
            "replica has {} players, world has {}",
            replica.players.len(),
            world.len()
        );
    }
    for (id, state) in world.players() {
        let Some(mirrored) = replica.players.get(&id) else {
            bail!("player {id} missing from replica");
        };
        let expected = state.quantized();
        if *mirrored != expected {
            bail!("player {id} diverged: {mirrored:?} != {expected:?}");
        }
    }
    Ok(())
}

struct WorldGenerator<'a> {
    world: &'a World,
}

impl SnapshotGenerator for WorldGenerator<'_> {
    fn generate(&mut self, entity: EntityId, writer: &mut FieldWriter<'_>) -> SchemaResult<()> {
        let state = self.world.get(entity).copied().unwrap_or_default();
        state.write(writer)
    }
}

#[derive(Default)]
struct Replica {
    players: HashMap<EntityId, PlayerState>,
}

impl SnapshotConsumer for Replica {
    fn entity_spawn(&mut self, _time_ms: u64, entity: EntityId, _type_id: u16) {
        self.players.insert(entity, PlayerState::default());
    }

    fn entity_update(
        &mut self,
        _time_ms: u64,
        entity: EntityId,
        reader: &mut FieldReader<'_>,
    ) -> SchemaResult<()> {
        let state = PlayerState::read(reader)?;
        self.players.insert(entity, state);
        Ok(())
    }

    fn entity_despawns(&mut self, _time_ms: u64, entities: &[EntityId]) {
        for entity in entities {
            self.players.remove(entity);
        }
    }
}

#[derive(Default)]
struct CommandCounter {
    processed: u64,
}

impl CommandProcessor for CommandCounter {
    fn process_command(
        &mut self,
        _connection: ConnectionId,
        _tick: u64,
        reader: &mut FieldReader<'_>,
    ) -> SchemaResult<()> {
        let _move_x = reader.read_int()?;
        let _move_z = reader.read_int()?;
        let _buttons = reader.read_uint()?;
        self.processed += 1;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    mode: &'static str,
    players: u32,
    ticks: u64,
    seed: u64,
    server_packages_sent: u64,
    server_bytes_sent: u64,
    avg_package_bytes: u64,
    client_packages_sent: u64,
    client_bytes_sent: u64,
    datagrams_dropped: u64,
    packages_lost: u64,
    commands_processed: u64,
    chat_to_server: u64,
    chat_to_client: u64,
    rtt_ms: f32,
    server_reported_rtt_ms: u8,
}
