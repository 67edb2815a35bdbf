//! Shared schemas and a deterministic toy world for the repnet demo.
//!
//! Both `demo-sim` and integration tests step the same world from the same
//! seed, so captures and wire sizes are reproducible run to run.

use schema::{FieldDescriptor, FieldKind, FieldReader, FieldWriter, SchemaResult};

/// Entity type id of the demo player.
pub const PLAYER_TYPE: u16 = 1;

/// Event type id of the demo chat message.
pub const CHAT_EVENT: u16 = 1;

/// Half extent of the square arena players bounce around in.
pub const ARENA_HALF_EXTENT: f32 = 512.0;

/// Speed cap in units per tick.
pub const MAX_SPEED: f32 = 8.0;

/// Field layout of [`PLAYER_TYPE`] entities.
#[must_use]
pub fn player_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::new("health", FieldKind::UInt)
            .with_bits(10)
            .with_delta(),
        FieldDescriptor::new("position", FieldKind::Vector3)
            .with_precision(2)
            .with_delta(),
        FieldDescriptor::new("velocity", FieldKind::Vector3)
            .with_precision(2)
            .with_delta(),
        FieldDescriptor::new("facing", FieldKind::UInt)
            .with_bits(12)
            .with_delta(),
        FieldDescriptor::new("sprinting", FieldKind::Bool),
    ]
}

/// Field layout of the per-tick player command.
#[must_use]
pub fn command_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::new("move_x", FieldKind::Int).with_delta(),
        FieldDescriptor::new("move_z", FieldKind::Int).with_delta(),
        FieldDescriptor::new("buttons", FieldKind::UInt).with_bits(8),
    ]
}

/// Field layout of [`CHAT_EVENT`] events.
#[must_use]
pub fn chat_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::new("channel", FieldKind::UInt).with_bits(4),
        FieldDescriptor::new("text", FieldKind::String).with_array_size(64),
    ]
}

/// One player's replicated state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerState {
    pub health: u32,
    pub position: [f32; 3],
    pub velocity: [f32; 3],
    pub facing: u16,
    pub sprinting: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            health: 100,
            position: [0.0; 3],
            velocity: [0.0; 3],
            facing: 0,
            sprinting: false,
        }
    }
}

impl PlayerState {
    /// Writes every field in [`player_fields`] order.
    pub fn write(&self, writer: &mut FieldWriter<'_>) -> SchemaResult<()> {
        writer.write_uint(self.health)?;
        writer.write_vector3(self.position)?;
        writer.write_vector3(self.velocity)?;
        writer.write_uint(u32::from(self.facing))?;
        writer.write_bool(self.sprinting)
    }

    /// Reads every field in [`player_fields`] order.
    pub fn read(reader: &mut FieldReader<'_>) -> SchemaResult<Self> {
        Ok(Self {
            health: reader.read_uint()?,
            position: reader.read_vector3()?,
            velocity: reader.read_vector3()?,
            facing: reader.read_uint()? as u16,
            sprinting: reader.read_bool()?,
        })
    }

    /// Returns this state as it survives the wire, with vector components
    /// rounded to the schema's fixed precision. Replicas are compared
    /// against this, not the raw state.
    #[must_use]
    pub fn quantized(&self) -> Self {
        let round = |v: f32| schema::dequantize(schema::quantize(v, 2), 2);
        Self {
            position: self.position.map(round),
            velocity: self.velocity.map(round),
            ..*self
        }
    }
}

/// Small deterministic generator, same sequence on every platform.
#[derive(Debug, Clone)]
pub struct Rng {
    state: u64,
}

impl Rng {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1);
        (self.state >> 32) as u32
    }

    /// Uniform float in `[-1, 1]`.
    pub fn unit(&mut self) -> f32 {
        (self.next_u32() as f32 / u32::MAX as f32).mul_add(2.0, -1.0)
    }
}

/// The authoritative toy world: players bouncing around an arena.
#[derive(Debug)]
pub struct World {
    players: Vec<(u32, PlayerState)>,
    rng: Rng,
}

impl World {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            players: Vec::new(),
            rng: Rng::new(seed),
        }
    }

    /// Adds a player under the given entity id at a seeded position.
    pub fn spawn(&mut self, id: u32) {
        let state = PlayerState {
            position: [
                self.rng.unit() * ARENA_HALF_EXTENT * 0.5,
                0.0,
                self.rng.unit() * ARENA_HALF_EXTENT * 0.5,
            ],
            velocity: [self.rng.unit() * MAX_SPEED, 0.0, self.rng.unit() * MAX_SPEED],
            facing: (self.rng.next_u32() % 4096) as u16,
            ..PlayerState::default()
        };
        self.players.push((id, state));
    }

    /// Removes a player.
    pub fn despawn(&mut self, id: u32) {
        self.players.retain(|(pid, _)| *pid != id);
    }

    #[must_use]
    pub fn get(&self, id: u32) -> Option<&PlayerState> {
        self.players
            .iter()
            .find(|(pid, _)| *pid == id)
            .map(|(_, state)| state)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut PlayerState> {
        self.players
            .iter_mut()
            .find(|(pid, _)| *pid == id)
            .map(|(_, state)| state)
    }

    /// Iterates players in spawn order.
    pub fn players(&self) -> impl Iterator<Item = (u32, &PlayerState)> {
        self.players.iter().map(|(id, state)| (*id, state))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Advances one tick: integrate positions, bounce off arena walls,
    /// drift facing, occasionally nudge velocity and toggle sprint.
    pub fn step(&mut self) {
        for (_, state) in &mut self.players {
            if self.rng.next_u32() % 20 == 0 {
                state.velocity[0] =
                    (state.velocity[0] + self.rng.unit()).clamp(-MAX_SPEED, MAX_SPEED);
                state.velocity[2] =
                    (state.velocity[2] + self.rng.unit()).clamp(-MAX_SPEED, MAX_SPEED);
            }
            for axis in [0, 2] {
                state.position[axis] += state.velocity[axis];
                if state.position[axis].abs() > ARENA_HALF_EXTENT {
                    state.position[axis] =
                        state.position[axis].clamp(-ARENA_HALF_EXTENT, ARENA_HALF_EXTENT);
                    state.velocity[axis] = -state.velocity[axis];
                }
            }
            state.facing = ((u32::from(state.facing) + self.rng.next_u32() % 13) % 4096) as u16;
            if self.rng.next_u32() % 50 == 0 {
                state.sprinting = !state.sprinting;
            }
            if self.rng.next_u32() % 100 == 0 && state.health > 10 {
                state.health -= 10;
            }
        }
    }
}
